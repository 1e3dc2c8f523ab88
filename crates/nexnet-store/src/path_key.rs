use sha1::{Digest, Sha1};

/// Number of hex characters per `dir_path` segment.
const BLOCK_SIZE: usize = 5;

/// A deterministic `(dir_path, filename)` pair derived from a logical key.
///
/// `dir_path` never has a trailing slash: it is the `/`-joined segments,
/// with no segment for a trailing remainder shorter than [`BLOCK_SIZE`]
/// (impossible for a 40-char SHA-1 hex digest, which divides evenly into
/// eight 5-char blocks, but the splitting logic below is written generically
/// over `hash.len() / BLOCK_SIZE` blocks so it never panics on shorter
/// inputs either).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey {
    pub dir_path: String,
    pub filename: String,
}

impl PathKey {
    /// The full path under a store root: `dir_path/filename`.
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.dir_path, self.filename)
    }

    /// The first directory component of `dir_path`, used for recursive
    /// delete (`Store::delete` removes everything under this segment).
    pub fn first_segment(&self) -> &str {
        self.dir_path.split('/').next().unwrap_or("")
    }
}

/// The default path transform: content-addressed storage over SHA-1.
///
/// `hash.len() / BLOCK_SIZE` groups of `BLOCK_SIZE` hex chars each, joined
/// by `/`; `filename` is the full hex digest.
pub fn cas_transform(key: &str) -> PathKey {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let hash = hex::encode(digest);

    let block_count = hash.len() / BLOCK_SIZE;
    let segments: Vec<&str> = (0..block_count)
        .map(|i| &hash[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE])
        .collect();

    PathKey { dir_path: segments.join("/"), filename: hash }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mybestpic_matches_reference_scenario() {
        let pk = cas_transform("mybestpic");
        assert_eq!(pk.dir_path, "1b150/aae86/eedae/268f6/589f4/0fb48/b2a0d/47ff4");
        assert_eq!(pk.filename, "1b150aae86eedae268f6589f40fb48b2a0d47ff4");
    }

    #[test]
    fn dir_path_has_eight_segments_of_five_hex_chars() {
        let pk = cas_transform("anything at all");
        let segments: Vec<&str> = pk.dir_path.split('/').collect();
        assert_eq!(segments.len(), 8);
        for seg in segments {
            assert_eq!(seg.len(), 5);
            assert!(seg.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn filename_is_full_forty_char_hash() {
        let pk = cas_transform("mybestpic");
        assert_eq!(pk.filename.len(), 40);
    }

    #[test]
    fn no_trailing_slash_in_dir_path() {
        let pk = cas_transform("x");
        assert!(!pk.dir_path.ends_with('/'));
    }

    #[test]
    fn first_segment_is_leading_block() {
        let pk = cas_transform("mybestpic");
        assert_eq!(pk.first_segment(), "1b150");
    }

    #[test]
    fn deterministic() {
        assert_eq!(cas_transform("same key"), cas_transform("same key"));
    }

    proptest::proptest! {
        #[test]
        fn determinism_holds_for_arbitrary_keys(key in ".*") {
            proptest::prop_assert_eq!(cas_transform(&key), cas_transform(&key));
        }
    }
}
