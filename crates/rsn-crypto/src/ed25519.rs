//! # Ed25519 Signing and Verification
//!
//! Digital signatures for validator votes and settlement block approvals.
//!
//! ## Security Invariant
//!
//! Signing operations take [`CanonicalBytes`](rsn_core::CanonicalBytes) to
//! ensure the signed payload was properly canonicalized. This prevents
//! signature malleability from non-canonical serialization.
//!
//! Keys and signatures cross node boundaries as lowercase hex strings, the
//! transport form used in peer messages and block signature maps.

use ed25519_dalek::{Signer, Verifier};
use rsn_core::CanonicalBytes;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// An Ed25519 digital signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Construct from raw signature bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse from a 128-character lowercase hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&hex_to_bytes(hex)?)
    }

    /// Access the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Return the signature as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        bytes_to_hex(&self.0)
    }
}

/// An Ed25519 signing (private) key.
///
/// Wraps `ed25519_dalek::SigningKey`. The seed is zeroized when the wrapper
/// is dropped.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a new random key using the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut rand_core::OsRng),
        }
    }

    /// Create from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Create from a 64-character hex-encoded seed.
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex_to_bytes(hex)?;
        let mut seed: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSigningKey(format!(
                "expected 32-byte seed (64 hex chars), got {} hex chars",
                hex.len()
            ))
        })?;
        let key = Self::from_seed(&seed);
        seed.zeroize();
        Ok(key)
    }

    /// Sign canonicalized data.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.inner.sign(data.as_bytes()).to_bytes())
    }

    /// Return the corresponding verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }
}

/// An Ed25519 verifying (public) key.
///
/// Distributed in node manifests as hex; every validator knows every other
/// validator's verifying key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Construct from raw 32-byte compressed point encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey(format!("{} bytes", bytes.len())))?;
        let inner = ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse from a 64-character lowercase hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&hex_to_bytes(hex)?)
    }

    /// Return the key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        bytes_to_hex(self.inner.as_bytes())
    }

    /// Verify a signature over canonicalized data.
    pub fn verify(
        &self,
        data: &CanonicalBytes,
        signature: &Ed25519Signature,
    ) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        self.inner
            .verify(data.as_bytes(), &sig)
            .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
    }
}

/// Decode a lowercase or uppercase hex string into bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, CryptoError> {
    if hex.len() % 2 != 0 {
        return Err(CryptoError::HexDecode(format!(
            "odd length {}",
            hex.len()
        )));
    }
    hex.as_bytes()
        .chunks(2)
        .map(|chunk| {
            let s = std::str::from_utf8(chunk)
                .map_err(|_| CryptoError::HexDecode("non-utf8 input".to_string()))?;
            u8::from_str_radix(s, 16)
                .map_err(|_| CryptoError::HexDecode(format!("invalid hex pair \"{s}\"")))
        })
        .collect()
}

/// Encode bytes as a lowercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_and_verify() {
        let key = SigningKey::generate();
        let data = CanonicalBytes::new(&json!({"vote": "approve", "height": 3})).unwrap();
        let sig = key.sign(&data);
        assert!(key.verifying_key().verify(&data, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let key = SigningKey::generate();
        let data = CanonicalBytes::new(&json!({"height": 3})).unwrap();
        let tampered = CanonicalBytes::new(&json!({"height": 4})).unwrap();
        let sig = key.sign(&data);
        assert!(key.verifying_key().verify(&tampered, &sig).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let key = SigningKey::generate();
        let other = SigningKey::generate();
        let data = CanonicalBytes::new(&json!({"height": 3})).unwrap();
        let sig = key.sign(&data);
        assert!(other.verifying_key().verify(&data, &sig).is_err());
    }

    #[test]
    fn seed_is_deterministic() {
        let a = SigningKey::from_seed(&[7u8; 32]);
        let b = SigningKey::from_seed(&[7u8; 32]);
        assert_eq!(a.verifying_key(), b.verifying_key());
    }

    #[test]
    fn seed_hex_roundtrip() {
        let key = SigningKey::from_seed_hex(&"ab".repeat(32)).unwrap();
        let direct = SigningKey::from_seed(&[0xab; 32]);
        assert_eq!(key.verifying_key(), direct.verifying_key());
    }

    #[test]
    fn seed_hex_rejects_bad_input() {
        assert!(SigningKey::from_seed_hex("abcd").is_err());
        assert!(SigningKey::from_seed_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn signature_hex_roundtrip() {
        let key = SigningKey::generate();
        let data = CanonicalBytes::new(&json!("payload")).unwrap();
        let sig = key.sign(&data);
        let parsed = Ed25519Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn verifying_key_hex_roundtrip() {
        let key = SigningKey::generate();
        let vk = key.verifying_key();
        let parsed = VerifyingKey::from_hex(&vk.to_hex()).unwrap();
        assert_eq!(parsed, vk);
    }

    #[test]
    fn signature_length_enforced() {
        let err = Ed25519Signature::from_bytes(&[0u8; 63]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidSignatureLength(63)));
    }

    #[test]
    fn signing_key_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SigningKey>();
        assert_send_sync::<VerifyingKey>();
    }
}
