use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::latch::SuspensionLatch;
use crate::rpc::{Payload, KIND_MESSAGE, KIND_STREAM};

/// Negotiates whether a freshly-dialed or freshly-accepted connection may
/// proceed. Runs once per connection before the peer is registered.
#[async_trait]
pub trait Handshake: Send + Sync {
    async fn handshake(&self, stream: &mut TcpStream) -> Result<(), TransportError>;
}

/// Accepts every connection without negotiation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopHandshake;

#[async_trait]
impl Handshake for NopHandshake {
    async fn handshake(&self, _stream: &mut TcpStream) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A handle to one live peer connection.
///
/// The underlying [`TcpStream`] is split so the per-connection read loop
/// (owns the read half) and whichever task sends control messages or
/// writes stream bytes (owns the write half) never contend on the same
/// lock. Each half is still wrapped in a [`Mutex`] because the server may
/// hold a handle from more than one task (e.g. fanning STORE out to every
/// peer concurrently).
#[derive(Debug)]
pub struct Peer {
    addr: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    pub(crate) latch: SuspensionLatch,
}

impl Peer {
    pub(crate) fn new(addr: SocketAddr, stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            addr,
            reader: Mutex::new(read),
            writer: Mutex::new(write),
            latch: SuspensionLatch::new(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Exclusive access to the read half. Reserved for the transport's own
    /// read loop, which is the sole reader of any given peer.
    pub(crate) async fn reader_lock(&self) -> tokio::sync::MutexGuard<'_, OwnedReadHalf> {
        self.reader.lock().await
    }

    /// Send a control message as a `0x01 | len | bytes` frame.
    pub async fn send(&self, payload: &Payload) -> Result<(), TransportError> {
        let bytes = payload.encode();
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        let mut w = self.writer.lock().await;
        w.write_u8(KIND_MESSAGE).await?;
        w.write_u32(len).await?;
        w.write_all(&bytes).await?;
        w.flush().await?;
        Ok(())
    }

    /// Announce and then stream `total_len` raw bytes to this peer as a
    /// `0x02` frame, after the caller has already sent whatever control
    /// message describes the stream.
    pub async fn send_stream(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut w = self.writer.lock().await;
        w.write_u8(KIND_STREAM).await?;
        w.write_all(bytes).await?;
        w.flush().await?;
        Ok(())
    }

    /// Announce a stream and prefix it with an 8-byte little-endian
    /// length written directly onto the connection, outside the normal
    /// framing rules. This mirrors the GET-response wire format carried
    /// over from the source implementation (see the wire protocol section
    /// of the design notes): the receiver must read those 8 bytes itself
    /// via [`Peer::copy_stream_to`] before reading the body.
    pub async fn send_stream_with_len_prefix(&self, len: u64, bytes: &[u8]) -> Result<(), TransportError> {
        let mut w = self.writer.lock().await;
        w.write_u8(KIND_STREAM).await?;
        w.write_u64_le(len).await?;
        w.write_all(bytes).await?;
        w.flush().await?;
        Ok(())
    }

    /// Read exactly `len` raw stream bytes directly off this peer's
    /// connection. The caller must have armed [`SuspensionLatch`] (done by
    /// the transport's read loop before delivering the matching
    /// [`crate::Rpc::Stream`]) and must call [`Peer::close_stream`]
    /// afterwards on every exit path, including errors.
    pub async fn copy_stream_to(&self, len: u64) -> Result<Vec<u8>, TransportError> {
        let mut r = self.reader.lock().await;
        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Release the suspension latch armed for this peer's paused read
    /// loop. Must be called exactly once per [`crate::Rpc::Stream`]
    /// notification.
    pub fn close_stream(&self) {
        self.latch.release();
    }

    /// Shut down the write half, signalling EOF to the peer.
    pub async fn close(&self) {
        let mut w = self.writer.lock().await;
        let _ = w.shutdown().await;
    }
}
