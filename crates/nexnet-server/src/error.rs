use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced by [`crate::FileServer`] STORE/GET/REMOVE calls and the
/// dispatch loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store: {0}")]
    Store(#[from] nexnet_store::StoreError),
    #[error("crypto: {0}")]
    Crypto(#[from] nexnet_crypto::CryptoError),
    #[error("transport: {0}")]
    Transport(#[from] nexnet_transport::TransportError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer not found: {0}")]
    PeerNotFound(SocketAddr),
    /// No peer responded to a GET broadcast within the configured timeout.
    ///
    /// Replaces the source implementation's behavior of sleeping and then
    /// attempting to open a file that may not exist.
    #[error("no peer had the requested key")]
    NotFound,
    #[error("config: {0}")]
    Config(String),
}
