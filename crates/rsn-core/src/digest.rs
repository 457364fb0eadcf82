//! # Content-Addressed Digests
//!
//! Defines [`ContentDigest`] and [`DigestAlgorithm`]. Block hashes, parent
//! links, and proof commitments are all algorithm-tagged digests so that a
//! future circuit-friendly hash can be introduced without invalidating
//! existing chain references.
//!
//! ## Security Invariant
//!
//! Digests are only computed from [`CanonicalBytes`][crate::CanonicalBytes]
//! via [`sha256_digest`]. This ensures every digest in the system was produced
//! from properly canonicalized data.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

/// The hash algorithm used to compute a content-addressed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256 — standard content addressing.
    Sha256,
}

/// A content-addressed digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a SHA-256 content digest from raw bytes.
    pub fn sha256(bytes: [u8; 32]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            bytes,
        }
    }

    /// Return the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a SHA-256 digest from a 64-character lowercase hex string.
    pub fn from_hex(hex: &str) -> Result<Self, ValidationError> {
        if hex.len() != 64 {
            return Err(ValidationError::InvalidDigestHex(hex.to_string()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk)
                .map_err(|_| ValidationError::InvalidDigestHex(hex.to_string()))?;
            bytes[i] = u8::from_str_radix(s, 16)
                .map_err(|_| ValidationError::InvalidDigestHex(hex.to_string()))?;
        }
        Ok(Self::sha256(bytes))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute the SHA-256 digest of canonical bytes.
///
/// The only digest entry point in the workspace. Taking [`CanonicalBytes`]
/// rather than `&[u8]` makes it impossible to hash uncanonicalized data.
pub fn sha256_digest(bytes: &CanonicalBytes) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_bytes());
    let out = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&out);
    ContentDigest::sha256(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_is_deterministic() {
        let a = sha256_digest(&CanonicalBytes::new(&json!({"h": 5})).unwrap());
        let b = sha256_digest(&CanonicalBytes::new(&json!({"h": 5})).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn digest_changes_with_content() {
        let a = sha256_digest(&CanonicalBytes::new(&json!({"h": 5})).unwrap());
        let b = sha256_digest(&CanonicalBytes::new(&json!({"h": 6})).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn hex_roundtrip() {
        let d = sha256_digest(&CanonicalBytes::new(&json!("genesis")).unwrap());
        let hex = d.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ContentDigest::from_hex(&hex).unwrap(), d);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("abc").is_err());
        assert!(ContentDigest::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn display_carries_algorithm_tag() {
        let d = ContentDigest::sha256([0u8; 32]);
        assert!(format!("{d}").starts_with("Sha256:"));
    }
}
