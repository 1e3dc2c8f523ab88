use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A counted synchronizer pausing a peer's read loop while the server
/// drains a raw byte stream directly off that peer's connection.
///
/// The transport calls [`SuspensionLatch::arm`] when it delivers a
/// [`crate::Rpc::Stream`] notification, so the read loop stalls instead of
/// racing the server for the following bytes. The server calls
/// [`SuspensionLatch::release`] exactly once, on every exit path, after it
/// has consumed the stream (including error paths) — a missing release
/// deadlocks that peer's read loop forever, and a second release on an
/// already-released latch panics.
#[derive(Debug, Clone)]
pub struct SuspensionLatch {
    count: Arc<AtomicI64>,
    notify: Arc<Notify>,
}

impl Default for SuspensionLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspensionLatch {
    pub fn new() -> Self {
        Self { count: Arc::new(AtomicI64::new(0)), notify: Arc::new(Notify::new()) }
    }

    /// Raise the suspend count by one. Called by the transport before
    /// handing a [`crate::Rpc::Stream`] to the server.
    pub fn arm(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Lower the suspend count by one and wake any waiter if it reached
    /// zero.
    ///
    /// # Panics
    ///
    /// Panics if the count would go negative: this indicates a release with
    /// no matching `arm`, a programming error in the server.
    pub fn release(&self) {
        let prev = self.count.fetch_sub(1, Ordering::SeqCst);
        if prev <= 0 {
            self.count.fetch_add(1, Ordering::SeqCst);
            panic!("SuspensionLatch released without a matching arm");
        }
        if prev == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Block until the suspend count is zero.
    pub async fn wait_until_clear(&self) {
        loop {
            // Register for notification before checking the count: `Notify`
            // only buffers a permit for a future created before the matching
            // `notify_waiters()` call, so checking first and subscribing
            // after would let a `release()` landing in between go unseen
            // forever.
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) <= 0 {
                return;
            }
            notified.await;
        }
    }

    /// Current suspend count, for tests and diagnostics.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}
