use thiserror::Error;

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying IO failure (connect, accept, read, write).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// A control frame failed to decode into a [`crate::Payload`].
    #[error("decode: {0}")]
    Decode(#[from] Box<bincode::ErrorKind>),
    /// The handshake function rejected a connection.
    #[error("handshake rejected by peer {0}")]
    HandshakeFailed(std::net::SocketAddr),
    /// `on_peer` registration rejected a connection.
    #[error("on_peer hook rejected peer {0}")]
    OnPeerFailed(std::net::SocketAddr),
    /// No peer with this address is currently connected.
    #[error("peer not found: {0}")]
    PeerNotFound(std::net::SocketAddr),
    /// The connection was closed by the transport or the remote end.
    #[error("connection closed")]
    Closed,
}
