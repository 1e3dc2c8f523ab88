use rand::RngCore;

/// Size in bytes of an [`EncryptionKey`] and of the IV prepended to every
/// encrypted stream.
pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

/// Fixed-width symmetric key used for AES-256-CTR. Generated uniformly at
/// random at node startup, or loaded from config; never rotated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Wrap raw key bytes (e.g. loaded from config).
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Wrap a key loaded from config, failing if it isn't exactly
    /// [`KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Generate a new 32-byte key from a cryptographically secure RNG.
pub fn new_key() -> EncryptionKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    EncryptionKey(bytes)
}

/// Generate a fresh `NodeId`: 32 random bytes, hex-encoded.
///
/// Used to namespace a node's files inside a shared [`nexnet_store`] root
/// and stamped into outgoing control messages so recipients write to the
/// *originator's* namespace.
pub fn new_id() -> String {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_key_is_full_width() {
        let k = new_key();
        assert_eq!(k.as_bytes().len(), KEY_SIZE);
    }

    #[test]
    fn new_id_is_64_hex_chars() {
        let id = new_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_are_not_trivially_repeated() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(EncryptionKey::from_slice(&[0u8; 31]).is_none());
        assert!(EncryptionKey::from_slice(&[0u8; 32]).is_some());
    }

    #[test]
    fn from_slice_round_trips_with_as_bytes() {
        let k = new_key();
        let round = EncryptionKey::from_slice(k.as_bytes()).unwrap();
        assert_eq!(round, k);
    }
}
