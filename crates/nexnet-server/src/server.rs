use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nexnet_crypto::{hash_key, EncryptionKey};
use nexnet_store::Store;
use nexnet_transport::{Payload, Peer, Rpc, TcpTransport, TransportError};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::ServerError;

/// How long a GET call waits for any peer to respond before giving up.
///
/// Replaces the source implementation's fixed 500ms sleep with an explicit
/// bound: the call resolves as soon as the first peer responds, or fails
/// with [`ServerError::NotFound`] if this elapses first.
const GET_TIMEOUT: Duration = Duration::from_secs(5);

/// How long STORE waits for a peer's [`Payload::StoreAck`] before giving up
/// on fanning the stream out to it. Replaces the source implementation's
/// fixed 5ms sleep.
const STORE_ACK_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingStore {
    owner_id: String,
    hashed_key: String,
    size: u64,
}

/// Coordinates the first-response-wins GET race across every peer queried.
///
/// Every peer that answers drains its own stream bytes (keeping that
/// connection's framing intact); only the first to do so gets its bytes
/// written to the local store and returned to the caller.
struct GetResponder {
    satisfied: AtomicBool,
    owner_id: String,
    key: String,
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Drives STORE/GET/REMOVE across a peer mesh and owns the local CAS and
/// encryption key.
///
/// Constructed over a [`TcpTransport`]; `run()` spawns the central dispatch
/// loop that consumes RPCs delivered by the transport and services
/// `StoreFile`/`StoreAck`/`GetFile`/`DeleteFile` control messages.
pub struct FileServer {
    transport: Arc<TcpTransport>,
    store: Store,
    enc_key: EncryptionKey,
    node_id: String,
    pending_stores: Mutex<HashMap<SocketAddr, PendingStore>>,
    pending_store_acks: Mutex<HashMap<(SocketAddr, String), oneshot::Sender<()>>>,
    pending_gets: Mutex<HashMap<SocketAddr, Arc<GetResponder>>>,
}

impl FileServer {
    pub fn new(transport: Arc<TcpTransport>, store: Store, enc_key: EncryptionKey, node_id: String) -> Arc<Self> {
        Arc::new(Self {
            transport,
            store,
            enc_key,
            node_id,
            pending_stores: Mutex::new(HashMap::new()),
            pending_store_acks: Mutex::new(HashMap::new()),
            pending_gets: Mutex::new(HashMap::new()),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Dial every address in `bootstrap`, logging (never failing on) dial
    /// errors.
    pub async fn bootstrap(self: &Arc<Self>, bootstrap: &[SocketAddr]) {
        for &addr in bootstrap {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                if let Err(e) = transport.dial(addr).await {
                    warn!(%addr, error = %e, "bootstrap dial failed");
                }
            });
        }
    }

    /// Spawn the central dispatch loop. Handler execution is serialised:
    /// at most one RPC is being handled at a time, so the store is never
    /// concurrently mutated by two inbound streams.
    pub fn run(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(rpc) = this.transport.consume().await {
                if let Err(e) = this.handle(rpc).await {
                    warn!(error = %e, "dispatch handler error");
                }
            }
            info!("dispatch loop exiting: transport closed");
        });
    }

    async fn handle(&self, rpc: Rpc) -> Result<(), ServerError> {
        match rpc {
            Rpc::Message { from, payload } => self.handle_message(from, payload).await,
            Rpc::Stream { from } => self.handle_stream(from).await,
        }
    }

    async fn handle_message(&self, from: SocketAddr, payload: Payload) -> Result<(), ServerError> {
        match payload {
            Payload::StoreFile { owner_id, hashed_key, size } => {
                self.pending_stores.lock().await.insert(from, PendingStore { owner_id, hashed_key: hashed_key.clone(), size });
                let peer = self.transport.peer(from).await?;
                peer.send(&Payload::StoreAck { hashed_key }).await?;
                Ok(())
            }
            Payload::StoreAck { hashed_key } => {
                if let Some(tx) = self.pending_store_acks.lock().await.remove(&(from, hashed_key)) {
                    let _ = tx.send(());
                }
                Ok(())
            }
            Payload::GetFile { owner_id, hashed_key } => {
                self.respond_to_get(from, &owner_id, &hashed_key).await
            }
            Payload::DeleteFile { owner_id, hashed_key } => {
                // Informational only (§1 Non-goals: no deletion propagation
                // guarantees; §4.5: "the broadcast is informational"). REMOVE
                // is local-only; acting on this would wipe the very replica a
                // subsequent GET needs to recover the file from.
                debug!(%from, owner_id, hashed_key, "received informational DeleteFile, not deleting replica");
                Ok(())
            }
        }
    }

    async fn respond_to_get(&self, from: SocketAddr, owner_id: &str, hashed_key: &str) -> Result<(), ServerError> {
        let peer = self.transport.peer(from).await?;
        let (size, mut file) = match self.store.read(owner_id, hashed_key) {
            Ok(v) => v,
            Err(e) => {
                warn!(%from, owner_id, hashed_key, error = %e, "GetFile for unknown key");
                return Ok(());
            }
        };
        let mut plaintext = Vec::with_capacity(size as usize);
        std::io::Read::read_to_end(&mut file, &mut plaintext)?;

        // The store holds plaintext; the requester's stream handler always
        // runs `write_decrypt` on what it receives (mirroring STORE), so the
        // response must be re-encrypted the same way STORE's fan-out is.
        let mut ciphertext = Vec::new();
        nexnet_crypto::copy_encrypt(&self.enc_key, plaintext.as_slice(), &mut ciphertext)?;
        peer.send_stream_with_len_prefix(ciphertext.len() as u64, &ciphertext).await?;
        Ok(())
    }

    /// Handle a raw stream notification: either the body of an inbound
    /// STORE (we are a replica) or a response to a GET we broadcast. Every
    /// path below releases the peer's suspension latch exactly once.
    async fn handle_stream(&self, from: SocketAddr) -> Result<(), ServerError> {
        let peer = self.transport.peer(from).await?;

        let pending_store = self.pending_stores.lock().await.remove(&from);
        if let Some(PendingStore { owner_id, hashed_key, size }) = pending_store {
            let result = async {
                let bytes = peer.copy_stream_to(size).await?;
                self.store
                    .write_decrypt(&self.enc_key, Cursor::new(bytes), &owner_id, &hashed_key)
                    .map_err(ServerError::from)
            }
            .await;
            peer.close_stream();
            return result.map(|_| ());
        }

        let pending_get = self.pending_gets.lock().await.remove(&from);
        if let Some(responder) = pending_get {
            let result = self.drain_get_response(&peer, &responder).await;
            peer.close_stream();
            return result;
        }

        warn!(%from, "stream notification with no pending STORE or GET, dropping connection");
        peer.close_stream();
        Err(ServerError::Transport(TransportError::Closed))
    }

    async fn drain_get_response(
        &self,
        peer: &Peer,
        responder: &GetResponder,
    ) -> Result<(), ServerError> {
        let size_bytes = peer.copy_stream_to(8).await?;
        let size = u64::from_le_bytes(size_bytes.try_into().unwrap_or([0; 8]));
        let body = peer.copy_stream_to(size).await?;

        if responder.satisfied.swap(true, Ordering::SeqCst) {
            debug!(peer = %peer.addr(), "discarding late GET response, already satisfied");
            return Ok(());
        }

        self.store.write_decrypt(&self.enc_key, Cursor::new(body), &responder.owner_id, &responder.key)?;
        if let Some(tx) = responder.tx.lock().await.take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    /// `STORE(key, data)`: write locally, then fan the ciphertext out to
    /// every connected peer. Succeeds as soon as the local write succeeds,
    /// regardless of peer delivery outcome.
    pub async fn store(&self, key: &str, data: &[u8]) -> Result<u64, ServerError> {
        let n = self.store.write(data, &self.node_id, key)?;

        let mut ciphertext = Vec::new();
        nexnet_crypto::copy_encrypt(&self.enc_key, data, &mut ciphertext)?;

        let hashed = hash_key(key);
        for addr in self.transport.peer_addrs().await {
            if let Err(e) = self.store_to_peer(addr, &hashed, &ciphertext).await {
                warn!(%addr, key, error = %e, "STORE fan-out to peer failed");
            }
        }
        Ok(n)
    }

    async fn store_to_peer(&self, addr: SocketAddr, hashed_key: &str, ciphertext: &[u8]) -> Result<(), ServerError> {
        let peer = self.transport.peer(addr).await?;
        let (tx, rx) = oneshot::channel();
        self.pending_store_acks.lock().await.insert((addr, hashed_key.to_string()), tx);

        peer.send(&Payload::StoreFile {
            owner_id: self.node_id.clone(),
            hashed_key: hashed_key.to_string(),
            size: ciphertext.len() as u64,
        })
        .await?;

        if tokio::time::timeout(STORE_ACK_TIMEOUT, rx).await.is_err() {
            self.pending_store_acks.lock().await.remove(&(addr, hashed_key.to_string()));
            error!(%addr, "peer did not ack StoreFile in time, skipping fan-out");
            return Ok(());
        }

        peer.send_stream(ciphertext).await?;
        Ok(())
    }

    /// `GET(key)`: serve locally if present, otherwise broadcast and race
    /// every peer's response. Returns [`ServerError::NotFound`] if no peer
    /// answers within [`GET_TIMEOUT`].
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, ServerError> {
        if self.store.has(&self.node_id, key)? {
            let (_, mut file) = self.store.read(&self.node_id, key)?;
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut file, &mut buf)?;
            return Ok(buf);
        }

        let hashed = hash_key(key);
        let (tx, rx) = oneshot::channel();
        let responder = Arc::new(GetResponder {
            satisfied: AtomicBool::new(false),
            owner_id: self.node_id.clone(),
            key: key.to_string(),
            tx: Mutex::new(Some(tx)),
        });

        let peer_addrs = self.transport.peer_addrs().await;
        {
            let mut pending = self.pending_gets.lock().await;
            for &addr in &peer_addrs {
                pending.insert(addr, Arc::clone(&responder));
            }
        }
        for &addr in &peer_addrs {
            if let Ok(peer) = self.transport.peer(addr).await {
                let payload = Payload::GetFile { owner_id: self.node_id.clone(), hashed_key: hashed.clone() };
                if let Err(e) = peer.send(&payload).await {
                    warn!(%addr, error = %e, "GetFile broadcast failed");
                }
            }
        }

        if tokio::time::timeout(GET_TIMEOUT, rx).await.is_err() {
            return Err(ServerError::NotFound);
        }

        match self.store.read(&self.node_id, key) {
            Ok((_, mut file)) => {
                let mut buf = Vec::new();
                std::io::Read::read_to_end(&mut file, &mut buf)?;
                Ok(buf)
            }
            Err(_) => Err(ServerError::NotFound),
        }
    }

    /// `REMOVE(key)`: delete locally, then broadcast an informational
    /// `DeleteFile`. Local delete errors are fatal to the call; broadcast
    /// failures are logged only.
    pub async fn remove(&self, key: &str) -> Result<(), ServerError> {
        self.store.delete(&self.node_id, key)?;

        let hashed = hash_key(key);
        let payload = Payload::DeleteFile { owner_id: self.node_id.clone(), hashed_key: hashed };
        for addr in self.transport.peer_addrs().await {
            if let Ok(peer) = self.transport.peer(addr).await {
                if let Err(e) = peer.send(&payload).await {
                    warn!(%addr, error = %e, "DeleteFile broadcast failed");
                }
            }
        }
        Ok(())
    }

    /// Bind the listen address, spawn the accept loop, and start the
    /// dispatch loop.
    pub async fn listen_and_serve(self: &Arc<Self>) -> Result<(), ServerError> {
        self.transport.listen().await?;
        self.run();
        Ok(())
    }
}
