use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use nexnet_crypto::EncryptionKey;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::path_key::{cas_transform, PathKey};

/// Default root directory name when none is configured.
const DEFAULT_ROOT: &str = "nexnet_network";

/// A function deriving a [`PathKey`] from a logical key string. Defaults to
/// [`cas_transform`]; callers may inject a different layout for tests.
pub type PathTransformFn = fn(&str) -> PathKey;

/// Content-addressed, per-owner-namespaced on-disk store.
///
/// A file for `(owner_id, key)` lives at
/// `{root}/{owner_id}/{dir_path}/{filename}`, where `dir_path`/`filename`
/// come from the configured path transform applied to `key`.
pub struct Store {
    root: PathBuf,
    transform: PathTransformFn,
}

impl Store {
    /// Build a store rooted at `root`, using the default CAS/SHA-1 path
    /// transform.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_transform(root, cas_transform)
    }

    /// Build a store rooted at `root` with an explicit path transform.
    pub fn with_transform(root: impl Into<PathBuf>, transform: PathTransformFn) -> Self {
        let root = root.into();
        let root = if root.as_os_str().is_empty() { PathBuf::from(DEFAULT_ROOT) } else { root };
        Self { root, transform }
    }

    fn owner_dir(&self, owner_id: &str) -> PathBuf {
        self.root.join(owner_id)
    }

    fn full_path(&self, owner_id: &str, key: &str) -> (PathKey, PathBuf) {
        let path_key = (self.transform)(key);
        let full = self.owner_dir(owner_id).join(path_key.full_path());
        (path_key, full)
    }

    /// Does a file for `(owner_id, key)` exist?
    ///
    /// Absence is reported as `false`; any other IO error propagates.
    pub fn has(&self, owner_id: &str, key: &str) -> Result<bool, StoreError> {
        let (_, full) = self.full_path(owner_id, key);
        match fs::metadata(&full) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Stream-copy `reader` to disk under `(owner_id, key)`. Returns the
    /// number of bytes copied.
    pub fn write<R: Read>(
        &self,
        reader: R,
        owner_id: &str,
        key: &str,
    ) -> Result<u64, StoreError> {
        self.write_with(reader, owner_id, key, |src, dst| {
            io_copy_u64(src, dst).map_err(StoreError::Io)
        })
    }

    /// Like [`Store::write`], but the input stream is decrypted on the way
    /// to disk: the first 16 bytes are the IV, the remainder is ciphertext.
    pub fn write_decrypt<R: Read>(
        &self,
        enc_key: &EncryptionKey,
        reader: R,
        owner_id: &str,
        key: &str,
    ) -> Result<u64, StoreError> {
        self.write_with(reader, owner_id, key, |src, dst| {
            nexnet_crypto::copy_decrypt(enc_key, src, dst)
                .map(|n| n as u64)
                .map_err(StoreError::from)
        })
    }

    fn write_with<R: Read>(
        &self,
        mut reader: R,
        owner_id: &str,
        key: &str,
        copy: impl FnOnce(&mut R, &mut fs::File) -> Result<u64, StoreError>,
    ) -> Result<u64, StoreError> {
        let (path_key, full) = self.full_path(owner_id, key);
        let dir = self.owner_dir(owner_id).join(&path_key.dir_path);
        create_dir_all_0755(&dir)?;

        let tmp = dir.join(format!(".{}.tmp", path_key.filename));
        let n = {
            let mut f = fs::File::create(&tmp)?;
            let n = copy(&mut reader, &mut f)?;
            f.sync_all()?;
            n
        };
        fs::rename(&tmp, &full)?;
        debug!(owner_id, key, bytes = n, path = %full.display(), "wrote blob");
        Ok(n)
    }

    /// Open `(owner_id, key)` for reading, returning its size and a
    /// readable handle. The caller is responsible for closing the handle
    /// (dropping it, in Rust).
    pub fn read(&self, owner_id: &str, key: &str) -> Result<(u64, fs::File), StoreError> {
        let (_, full) = self.full_path(owner_id, key);
        let file = fs::File::open(&full)?;
        let size = file.metadata()?.len();
        Ok((size, file))
    }

    /// Recursively remove everything under the first path segment for
    /// `(owner_id, key)`. Non-existence is not an error.
    pub fn delete(&self, owner_id: &str, key: &str) -> Result<(), StoreError> {
        let (path_key, _) = self.full_path(owner_id, key);
        let first = self.owner_dir(owner_id).join(path_key.first_segment());
        match fs::remove_dir_all(&first) {
            Ok(()) => {
                debug!(owner_id, key, path = %first.display(), "deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(owner_id, key, "delete of missing key: treated as success");
                Ok(())
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Remove the entire store root.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

fn io_copy_u64(src: &mut impl Read, dst: &mut impl Write) -> std::io::Result<u64> {
    std::io::copy(src, dst)
}

#[cfg(unix)]
fn create_dir_all_0755(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all_0755(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        (dir, store)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = store();
        let n = store.write(&b"hello world"[..], "owner-a", "k1").unwrap();
        assert_eq!(n, 11);

        assert!(store.has("owner-a", "k1").unwrap());
        let (size, mut f) = store.read("owner-a", "k1").unwrap();
        assert_eq!(size, 11);
        let mut out = Vec::new();
        f.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn has_is_false_for_missing_key() {
        let (_dir, store) = store();
        assert!(!store.has("owner-a", "nope").unwrap());
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        store.write(&b"x"[..], "owner-a", "k1").unwrap();
        store.delete("owner-a", "k1").unwrap();
        assert!(!store.has("owner-a", "k1").unwrap());
        // deleting again must not error
        store.delete("owner-a", "k1").unwrap();
    }

    #[test]
    fn namespace_isolation() {
        let (_dir, store) = store();
        store.write(&b"a's secret"[..], "owner-a", "shared-key").unwrap();
        assert!(!store.has("owner-b", "shared-key").unwrap());
    }

    #[test]
    fn write_decrypt_round_trips_with_copy_encrypt() {
        let (_dir, store) = store();
        let key = nexnet_crypto::new_key();
        let mut ciphertext = Vec::new();
        nexnet_crypto::copy_encrypt(&key, &b"top secret payload"[..], &mut ciphertext).unwrap();

        store.write_decrypt(&key, ciphertext.as_slice(), "owner-a", "k1").unwrap();
        let (_, mut f) = store.read("owner-a", "k1").unwrap();
        let mut out = Vec::new();
        f.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"top secret payload");
    }

    #[test]
    fn clear_removes_everything() {
        let (_dir, store) = store();
        store.write(&b"x"[..], "owner-a", "k1").unwrap();
        store.clear().unwrap();
        assert!(!store.has("owner-a", "k1").unwrap());
    }
}
