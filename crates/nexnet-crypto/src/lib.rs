//! Symmetric cryptography for nexnet: stream cipher, key generation, and
//! key fingerprinting.
//!
//! Files travel the wire as `IV (16 bytes) || AES-256-CTR(plaintext)`. The
//! IV is generated fresh per [`stream::copy_encrypt`] call and is not a
//! secret; it only needs to be unique per (key, message).

#![deny(unsafe_code)]

mod error;
mod fingerprint;
mod key;
mod stream;

pub use error::CryptoError;
pub use fingerprint::hash_key;
pub use key::{new_id, new_key, EncryptionKey, IV_SIZE, KEY_SIZE};
pub use stream::{copy_decrypt, copy_encrypt};
