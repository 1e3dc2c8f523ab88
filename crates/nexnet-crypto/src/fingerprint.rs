use md5::{Digest, Md5};

/// Blind a logical key for the wire: hex-encoded MD5 of `key`.
///
/// This is a **fingerprint**, not a security boundary — it keeps the literal
/// key string off the wire but collides as easily as MD5 does. Callers must
/// still trust peer identity through other means (symmetric key possession).
pub fn hash_key(key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_is_deterministic() {
        assert_eq!(hash_key("mybestpic"), hash_key("mybestpic"));
    }

    #[test]
    fn hash_key_is_32_hex_chars() {
        let h = hash_key("anything");
        assert_eq!(h.len(), 32);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_keys_usually_differ() {
        assert_ne!(hash_key("a"), hash_key("b"));
    }
}
