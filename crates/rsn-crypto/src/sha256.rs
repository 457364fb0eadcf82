//! # SHA-256 Digest Computation
//!
//! Computes [`ContentDigest`] values from [`CanonicalBytes`]. This is the
//! only sanctioned path for producing content-addressed digests.
//!
//! ## Security Invariant
//!
//! The function signature requires `CanonicalBytes` — not raw `&[u8]`.
//! This ensures that every digest was computed from properly canonicalized
//! data, keeping independent validators byte-compatible.

use rsn_core::{sha256_digest as core_sha256_digest, CanonicalBytes, ContentDigest};

/// Compute a SHA-256 content digest from canonical bytes.
///
/// Delegates to [`rsn_core::sha256_digest()`] — the single implementation
/// in the workspace.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    core_sha256_digest(data)
}
