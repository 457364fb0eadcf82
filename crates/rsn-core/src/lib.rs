#![deny(missing_docs)]

//! # rsn-core — Foundational Types for the Roaming Settlement Network
//!
//! This crate defines the foundational types that every other crate in the
//! workspace depends on. It has no internal crate dependencies — only `serde`,
//! `serde_json`, `thiserror`, `chrono`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a distinct
//!    type. You cannot pass an [`OperatorId`] where a [`RecordId`] is expected,
//!    and an [`OperatorPair`] is unordered by construction.
//!
//! 2. **[`CanonicalBytes`] is the sole path to digest computation.** Every
//!    content-addressed digest and every signature input in the network flows
//!    through `CanonicalBytes::new()`, which applies JCS-compatible
//!    canonicalization with settlement-specific coercion rules (float
//!    rejection, datetime normalization). Independent validator nodes must
//!    hash byte-identical representations or consensus cannot form.
//!
//! 3. **Integer minor units only.** All monetary amounts are cents carried as
//!    integers. Floats are rejected at the canonicalization boundary, so a
//!    float amount cannot even be hashed, let alone settled.
//!
//! 4. **Structured errors with `thiserror`.** No `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod canonical;
pub mod currency;
pub mod digest;
pub mod error;
pub mod operator;
pub mod record;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use currency::CurrencyCode;
pub use digest::{sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ValidationError};
pub use operator::{Imsi, OperatorId, OperatorPair, RecordId, ValidatorId};
pub use record::{BceRecord, RateCard, SettlementStatus, StatusTransitionError, UsageMetrics};
pub use temporal::Timestamp;
