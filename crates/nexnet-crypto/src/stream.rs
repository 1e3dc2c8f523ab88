use std::io::{Read, Write};

use aes::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

use crate::error::CryptoError;
use crate::key::{EncryptionKey, IV_SIZE};

/// AES-256-CTR with a big-endian 128-bit counter.
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

const CHUNK_SIZE: usize = 32 * 1024;

/// Generate a random 16-byte IV, write it to `dst`, then stream-encrypt
/// `src` into `dst` under AES-256-CTR keyed by `enc_key`.
///
/// Returns the total number of bytes written to `dst` (IV + ciphertext).
pub fn copy_encrypt<R: Read, W: Write>(
    enc_key: &EncryptionKey,
    mut src: R,
    mut dst: W,
) -> Result<usize, CryptoError> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    dst.write_all(&iv)?;

    let mut cipher = Aes256Ctr::new(enc_key.as_bytes().into(), (&iv).into());
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = IV_SIZE;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        cipher.apply_keystream(&mut buf[..n]);
        dst.write_all(&buf[..n])?;
        total += n;
    }
    Ok(total)
}

/// Read a 16-byte IV from the front of `src`, then stream-decrypt the
/// remainder into `dst`.
///
/// Returns the total number of bytes written to `dst` (IV length +
/// plaintext length), mirroring [`copy_encrypt`]'s counter so that
/// peer-level byte accounting balances.
pub fn copy_decrypt<R: Read, W: Write>(
    enc_key: &EncryptionKey,
    mut src: R,
    mut dst: W,
) -> Result<usize, CryptoError> {
    let mut iv = [0u8; IV_SIZE];
    src.read_exact(&mut iv).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CryptoError::TruncatedIv
        } else {
            CryptoError::Io(e)
        }
    })?;

    let mut cipher = Aes256Ctr::new(enc_key.as_bytes().into(), (&iv).into());
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = IV_SIZE;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        cipher.apply_keystream(&mut buf[..n]);
        dst.write_all(&buf[..n])?;
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::new_key;

    #[test]
    fn round_trip_matches_go_reference_scenario() {
        let payload = b"AP is here";
        let key = new_key();
        let mut ciphertext = Vec::new();
        let n = copy_encrypt(&key, &payload[..], &mut ciphertext).unwrap();
        assert_eq!(n, 26); // 16 (iv) + 10 (payload)

        let mut plaintext = Vec::new();
        let m = copy_decrypt(&key, ciphertext.as_slice(), &mut plaintext).unwrap();
        assert_eq!(m, 26);
        assert_eq!(plaintext, payload);
    }

    #[test]
    fn empty_payload_round_trips() {
        let key = new_key();
        let mut ciphertext = Vec::new();
        let n = copy_encrypt(&key, &b""[..], &mut ciphertext).unwrap();
        assert_eq!(n, IV_SIZE);

        let mut plaintext = Vec::new();
        let m = copy_decrypt(&key, ciphertext.as_slice(), &mut plaintext).unwrap();
        assert_eq!(m, IV_SIZE);
        assert!(plaintext.is_empty());
    }

    #[test]
    fn wrong_key_yields_wrong_plaintext() {
        let key_a = new_key();
        let key_b = new_key();
        let mut ciphertext = Vec::new();
        copy_encrypt(&key_a, &b"secret payload"[..], &mut ciphertext).unwrap();

        let mut plaintext = Vec::new();
        copy_decrypt(&key_b, ciphertext.as_slice(), &mut plaintext).unwrap();
        assert_ne!(plaintext, b"secret payload");
    }

    #[test]
    fn truncated_iv_is_rejected() {
        let key = new_key();
        let mut plaintext = Vec::new();
        let err = copy_decrypt(&key, &[0u8; 4][..], &mut plaintext).unwrap_err();
        assert!(matches!(err, CryptoError::TruncatedIv));
    }

    proptest::proptest! {
        #[test]
        fn round_trip_is_identity(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4096)) {
            let key = new_key();
            let mut ciphertext = Vec::new();
            let n = copy_encrypt(&key, payload.as_slice(), &mut ciphertext).unwrap();

            let mut out = Vec::new();
            let m = copy_decrypt(&key, ciphertext.as_slice(), &mut out).unwrap();

            proptest::prop_assert_eq!(n, m);
            proptest::prop_assert_eq!(out, payload);
        }
    }
}
