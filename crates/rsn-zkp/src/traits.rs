//! # Proof System Trait (Sealed)
//!
//! The core abstraction for aggregate proof backends.
//!
//! ## Sealed Trait
//!
//! The `ProofSystem` trait is **sealed**: only implementations defined
//! within the `rsn-zkp` crate can exist. External crates cannot implement
//! it. A settlement block's proof is trusted by validators that cannot see
//! the underlying records, so an unauthorized backend slipped into one node
//! would undermine every counterparty's verification.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use rsn_core::CanonicalBytes;

/// Error during proof generation.
///
/// Returned by [`ProofSystem::prove`] when proof generation cannot proceed.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The circuit inputs are invalid or inconsistent with the statement.
    #[error("invalid circuit inputs: {0}")]
    InvalidInputs(String),
    /// Proof generation failed internally.
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),
    /// Proof generation exceeded its time budget.
    #[error("proof generation timed out after {0} seconds")]
    TimedOut(u64),
}

/// Error during proof verification.
///
/// Returned by [`ProofSystem::verify`] when verification cannot proceed or
/// when the proof is structurally invalid.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof is structurally malformed.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The proof was produced by a different backend than the verifier.
    #[error("proof system mismatch: expected {expected}, got {got}")]
    SystemMismatch {
        /// The backend this verifier implements.
        expected: String,
        /// The backend tag carried by the proof.
        got: String,
    },
    /// Verification failed internally.
    #[error("proof verification failed: {0}")]
    VerificationFailed(String),
}

/// Private module that seals the [`ProofSystem`] trait.
mod private {
    /// Sealing marker trait. Not accessible outside `rsn-zkp`.
    pub trait Sealed {}
}

/// Sealed trait defining the interface for an aggregate proof system.
///
/// Each implementation provides its own proof, key, and circuit types via
/// associated types. The trait requires `Send + Sync` to support concurrent
/// proof generation and verification in the node.
///
/// ## Contract
///
/// - **Complete**: a proof generated by `prove` over a consistent circuit
///   verifies against that circuit's public statement.
/// - **Sound**: `verify` returns `Ok(false)` for any proof over a different
///   statement, within the guarantees of the backend.
/// - **Deterministic verification**: `verify` is a pure function of the
///   proof and the statement bytes.
pub trait ProofSystem: private::Sealed + Send + Sync {
    /// The proof type produced by this system.
    type Proof: Serialize + DeserializeOwned + Clone + std::fmt::Debug;
    /// The verifying key type.
    type VerifyingKey: Clone;
    /// The proving key type.
    type ProvingKey;
    /// The circuit type that defines the proof statement and witness.
    type Circuit: Clone;

    /// Generate a proof that the prover knows a witness satisfying the
    /// circuit constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidInputs`] if the witness does not
    /// satisfy the circuit, [`ProofError::GenerationFailed`] on internal
    /// failure.
    fn prove(
        &self,
        pk: &Self::ProvingKey,
        circuit: &Self::Circuit,
    ) -> Result<Self::Proof, ProofError>;

    /// Verify a proof against the canonical bytes of its public statement.
    ///
    /// Returns `Ok(true)` if the proof is valid for the statement,
    /// `Ok(false)` if it is well-formed but does not match.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MalformedProof`] if the proof is structurally
    /// invalid (wrong length, corrupt encoding).
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &CanonicalBytes,
    ) -> Result<bool, VerifyError>;
}

// ---- Sealed trait implementations for authorized proof systems ----

impl private::Sealed for crate::mock::MockProofSystem {}
