#![deny(missing_docs)]

//! # rsn-crypto — Cryptographic Primitives for the Settlement Network
//!
//! This crate provides the cryptographic building blocks used throughout
//! the workspace:
//!
//! - **Ed25519** signing and verification for validator votes and
//!   settlement block signatures.
//! - **SHA-256 digest computation** from
//!   [`CanonicalBytes`](rsn_core::CanonicalBytes), producing
//!   [`ContentDigest`](rsn_core::ContentDigest) values.
//!
//! ## Security Invariants
//!
//! - Signing input is `&CanonicalBytes`, never raw bytes. Two validators
//!   that sign "the same block" must sign the same bytes.
//! - Seed material is zeroized on drop.

pub mod ed25519;
pub mod error;
pub mod sha256;

// Re-export primary types.
pub use ed25519::{Ed25519Signature, SigningKey, VerifyingKey};
pub use error::CryptoError;
pub use sha256::sha256_digest;
