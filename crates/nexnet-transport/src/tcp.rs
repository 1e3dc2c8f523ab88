use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::peer::{Handshake, NopHandshake, Peer};
use crate::rpc::{Payload, Rpc, KIND_MESSAGE, KIND_STREAM};

type PeerMap = Arc<RwLock<HashMap<SocketAddr, Arc<Peer>>>>;

/// Notified once per accepted or dialed connection, after the handshake
/// succeeds and before the peer is registered. Returning `Err` drops the
/// connection without registering it.
#[async_trait]
pub trait OnPeer: Send + Sync {
    async fn on_peer(&self, addr: SocketAddr) -> Result<(), TransportError>;
}

/// Accepts every peer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopOnPeer;

#[async_trait]
impl OnPeer for NopOnPeer {
    async fn on_peer(&self, _addr: SocketAddr) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Construction options for [`TcpTransport`].
pub struct TransportOpts {
    pub listen_addr: SocketAddr,
    pub handshake: Arc<dyn Handshake>,
    pub on_peer: Arc<dyn OnPeer>,
}

impl TransportOpts {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self { listen_addr, handshake: Arc::new(NopHandshake), on_peer: Arc::new(NopOnPeer) }
    }
}

/// A TCP-backed implementation of the framed message + stream transport.
///
/// Wire format per connection, chosen once per frame:
/// `0x01 | u32 big-endian length | length bytes` for a control message, or
/// `0x02` for a stream announcement (the byte length of the following raw
/// stream is carried out-of-band by whatever [`Payload`] preceded it, e.g.
/// `Payload::StoreFile.size`).
pub struct TcpTransport {
    opts: TransportOpts,
    peers: PeerMap,
    rpc_tx: mpsc::UnboundedSender<Rpc>,
    rpc_rx: Mutex<mpsc::UnboundedReceiver<Rpc>>,
}

impl TcpTransport {
    pub fn new(opts: TransportOpts) -> Arc<Self> {
        let (rpc_tx, rpc_rx) = mpsc::unbounded_channel();
        Arc::new(Self { opts, peers: Arc::new(RwLock::new(HashMap::new())), rpc_tx, rpc_rx: Mutex::new(rpc_rx) })
    }

    /// Bind the listen address and spawn the accept loop. Returns once
    /// bound; the accept loop runs for the lifetime of the returned task.
    pub async fn listen(self: &Arc<Self>) -> Result<(), TransportError> {
        let listener = TcpListener::bind(self.opts.listen_addr).await?;
        info!(addr = %self.opts.listen_addr, "listening");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let this = Arc::clone(&this);
                        tokio::spawn(async move {
                            if let Err(e) = this.accept_connection(stream, addr).await {
                                warn!(%addr, error = %e, "inbound connection rejected");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                }
            }
        });
        Ok(())
    }

    /// Dial a remote peer, handshake, and register it like an inbound
    /// connection.
    pub async fn dial(self: &Arc<Self>, addr: SocketAddr) -> Result<(), TransportError> {
        let stream = TcpStream::connect(addr).await?;
        self.accept_connection(stream, addr).await
    }

    async fn accept_connection(
        self: &Arc<Self>,
        mut stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<(), TransportError> {
        self.opts
            .handshake
            .handshake(&mut stream)
            .await
            .map_err(|_| TransportError::HandshakeFailed(addr))?;

        self.opts.on_peer.on_peer(addr).await.map_err(|_| TransportError::OnPeerFailed(addr))?;

        let peer = Arc::new(Peer::new(addr, stream));
        self.peers.write().await.insert(addr, Arc::clone(&peer));
        debug!(%addr, "peer registered");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.read_loop(addr).await;
            this.peers.write().await.remove(&addr);
            debug!(%addr, "peer removed");
        });
        Ok(())
    }

    /// Drain this peer's connection one frame at a time, forwarding each
    /// decoded control message as [`Rpc::Message`] and each stream
    /// announcement as [`Rpc::Stream`] (after arming its suspension latch
    /// and waiting for the server to clear it).
    async fn read_loop(self: &Arc<Self>, addr: SocketAddr) {
        loop {
            let peer = match self.peers.read().await.get(&addr).cloned() {
                Some(p) => p,
                None => return,
            };

            let kind = {
                let mut guard = peer_reader_lock(&peer).await;
                match guard.read_u8().await {
                    Ok(k) => k,
                    Err(_) => return,
                }
            };

            match kind {
                KIND_MESSAGE => {
                    let len = {
                        let mut guard = peer_reader_lock(&peer).await;
                        match guard.read_u32().await {
                            Ok(n) => n,
                            Err(_) => return,
                        }
                    };
                    let mut buf = vec![0u8; len as usize];
                    {
                        let mut guard = peer_reader_lock(&peer).await;
                        if guard.read_exact(&mut buf).await.is_err() {
                            return;
                        }
                    }
                    let payload = match Payload::decode(&buf) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(%addr, error = %e, "dropping undecodable frame");
                            continue;
                        }
                    };
                    if self.rpc_tx.send(Rpc::Message { from: addr, payload }).is_err() {
                        return;
                    }
                }
                KIND_STREAM => {
                    peer.latch.arm();
                    if self.rpc_tx.send(Rpc::Stream { from: addr }).is_err() {
                        peer.latch.release();
                        return;
                    }
                    peer.latch.wait_until_clear().await;
                }
                other => {
                    warn!(%addr, kind = other, "unknown frame kind, closing connection");
                    return;
                }
            }
        }
    }

    /// Pull the next [`Rpc`] delivered by any peer's read loop.
    pub async fn consume(&self) -> Option<Rpc> {
        self.rpc_rx.lock().await.recv().await
    }

    /// A snapshot of the currently connected peer addresses.
    pub async fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.peers.read().await.keys().copied().collect()
    }

    /// Look up a connected peer by address.
    pub async fn peer(&self, addr: SocketAddr) -> Result<Arc<Peer>, TransportError> {
        self.peers.read().await.get(&addr).cloned().ok_or(TransportError::PeerNotFound(addr))
    }

    /// Send a control message to a specific connected peer.
    pub async fn send_to(&self, addr: SocketAddr, payload: &Payload) -> Result<(), TransportError> {
        self.peer(addr).await?.send(payload).await
    }

    /// Close every connected peer's write half and drop them from the
    /// peer map.
    pub async fn close(&self) {
        let mut peers = self.peers.write().await;
        for (_, peer) in peers.drain() {
            peer.close().await;
        }
    }
}

async fn peer_reader_lock(
    peer: &Arc<Peer>,
) -> tokio::sync::MutexGuard<'_, tokio::net::tcp::OwnedReadHalf> {
    // Exposed only within this module: Peer keeps its reader private, but
    // the read loop is the sole owner of it, so we reach in through a
    // crate-internal accessor rather than a public API.
    peer.reader_lock().await
}
