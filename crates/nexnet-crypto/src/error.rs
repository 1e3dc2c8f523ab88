use thiserror::Error;

/// Errors raised by the cryptography layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Underlying IO failure while streaming ciphertext/plaintext.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The source stream ended before a full 16-byte IV could be read.
    #[error("truncated stream: expected a 16-byte IV prefix")]
    TruncatedIv,
}
