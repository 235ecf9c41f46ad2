//! Content fingerprinting for cache keys.
//!
//! A fingerprint is the SHA-256 hex digest of the raw image bytes, computed
//! once per incoming image and used only as a cache key. SHA-256 is bit-stable
//! across platforms, unlike the default hasher, so a fingerprint written on
//! one device matches the same bytes anywhere.

use std::fmt;

use sha2::{Digest, Sha256};

/// Fixed-length hex digest of raw image bytes. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageFingerprint(String);

impl ImageFingerprint {
    /// Full 64-character lowercase hex digest.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log fields.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ImageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of an image.
///
/// Pure function; any byte sequence (including empty) yields a deterministic
/// digest. Callers reject empty images before reaching this stage.
pub fn fingerprint(bytes: &[u8]) -> ImageFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ImageFingerprint(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_fingerprint() {
        let a = fingerprint(b"mango photo bytes");
        let b = fingerprint(b"mango photo bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_fingerprint() {
        let a = fingerprint(b"photo one");
        let b = fingerprint(b"photo two");
        assert_ne!(a, b);
    }

    #[test]
    fn single_bit_flip_changes_fingerprint() {
        let mut bytes = vec![0u8; 256];
        let a = fingerprint(&bytes);
        bytes[128] ^= 0x01;
        let b = fingerprint(&bytes);
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_lowercase_hex_64() {
        let fp = fingerprint(b"anything");
        assert_eq!(fp.as_hex().len(), 64);
        assert!(fp
            .as_hex()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_input_yields_known_sha256() {
        // SHA-256 of the empty string — fixed by the standard.
        let fp = fingerprint(b"");
        assert_eq!(
            fp.as_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn short_form_is_prefix() {
        let fp = fingerprint(b"some image");
        assert_eq!(fp.short().len(), 12);
        assert!(fp.as_hex().starts_with(fp.short()));
    }
}
