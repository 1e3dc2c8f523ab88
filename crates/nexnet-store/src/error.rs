use thiserror::Error;

/// Errors raised by the content-addressed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying IO failure (other than not-found, which callers typically
    /// fold into `Has` returning `false`).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Failure in the decrypt-on-write path.
    #[error("decrypt: {0}")]
    Crypto(#[from] nexnet_crypto::CryptoError),
}
