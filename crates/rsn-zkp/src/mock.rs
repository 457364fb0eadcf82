//! # Mock Proof System (Phase 1)
//!
//! A deterministic, transparent proof backend. Proofs are domain-tagged
//! SHA-256 commitments to the public statement, generated only after the
//! private witness has been checked against the circuit constraints.
//!
//! The backend is complete and sound for its digest-equality semantics: a
//! proof generated for a statement verifies against exactly that statement
//! and no other. It provides no zero-knowledge hiding beyond the fact that
//! the witness never appears in the proof.

use serde::{Deserialize, Serialize};

use rsn_core::{sha256_digest, CanonicalBytes};

use crate::statement::AggregateChargeCircuit;
use crate::traits::{ProofError, ProofSystem, VerifyError};

/// Domain separation tag mixed into every mock proof.
const PROOF_DOMAIN: &str = "rsn.aggregate-charge.mock.v1";

/// A mock proof — deterministic domain-tagged digest of the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockProof {
    /// Hex-encoded commitment digest.
    pub proof_hex: String,
}

/// Mock verifying key — the backend is transparent, so there is no key
/// material; the type exists to satisfy the [`ProofSystem`] shape real
/// backends need.
#[derive(Debug, Clone, Default)]
pub struct MockVerifyingKey;

/// Mock proving key — no secrets in Phase 1.
#[derive(Debug, Clone, Default)]
pub struct MockProvingKey;

/// The deterministic Phase 1 proof backend.
#[derive(Debug, Clone, Default)]
pub struct MockProofSystem;

impl MockProofSystem {
    fn commitment_hex(public_inputs: &CanonicalBytes) -> Result<String, ProofError> {
        let statement_digest = sha256_digest(public_inputs);
        let tagged = CanonicalBytes::new(&(PROOF_DOMAIN, statement_digest.to_hex()))
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        Ok(sha256_digest(&tagged).to_hex())
    }
}

impl ProofSystem for MockProofSystem {
    type Proof = MockProof;
    type VerifyingKey = MockVerifyingKey;
    type ProvingKey = MockProvingKey;
    type Circuit = AggregateChargeCircuit;

    fn prove(
        &self,
        _pk: &Self::ProvingKey,
        circuit: &Self::Circuit,
    ) -> Result<Self::Proof, ProofError> {
        // Witness consistency is the completeness half of the contract:
        // a proof exists only for a statement the witness actually supports.
        circuit
            .check_constraints()
            .map_err(ProofError::InvalidInputs)?;

        let public_inputs = circuit
            .statement
            .canonical_bytes()
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        Ok(MockProof {
            proof_hex: Self::commitment_hex(&public_inputs)?,
        })
    }

    fn verify(
        &self,
        _vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &CanonicalBytes,
    ) -> Result<bool, VerifyError> {
        if proof.proof_hex.len() != 64
            || !proof.proof_hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(VerifyError::MalformedProof(format!(
                "expected 64 hex chars, got {}",
                proof.proof_hex.len()
            )));
        }

        let expected = Self::commitment_hex(public_inputs)
            .map_err(|e| VerifyError::VerificationFailed(e.to_string()))?;
        Ok(proof.proof_hex == expected)
    }
}
