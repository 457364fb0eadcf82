//! # Attestation Gateway
//!
//! The seam between the settlement path and the proof backend. Block
//! building and block validation call the gateway; which [`ProofSystem`]
//! sits behind it is a deployment decision.
//!
//! The gateway is injectable so tests can substitute a failing or slow
//! backend, which is how the proof-timeout abort path is exercised.

use serde::{Deserialize, Serialize};

use crate::mock::{MockProofSystem, MockProvingKey, MockVerifyingKey};
use crate::statement::{AggregateChargeCircuit, AggregateStatement};
use crate::traits::{ProofError, ProofSystem, VerifyError};

/// The opaque proof artifact embedded in settlement blocks.
///
/// Carries a backend tag so a verifier can refuse proofs from a system it
/// does not implement instead of misinterpreting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateProof {
    /// Identifier of the proof backend that produced this artifact.
    pub system: String,
    /// Hex-encoded proof payload.
    pub proof_hex: String,
}

/// Gateway for attesting and verifying aggregate charge statements.
///
/// Implementations must be cheap to call concurrently; the node wraps
/// calls in a bounded timeout.
pub trait AttestationGateway: Send + Sync {
    /// Produce a proof for the circuit's statement.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidInputs`] when the witness does not
    /// support the statement; the caller must abort the settlement round.
    fn attest(&self, circuit: &AggregateChargeCircuit) -> Result<AggregateProof, ProofError>;

    /// Verify a proof against a statement.
    ///
    /// Deterministic: the same proof and statement always produce the same
    /// answer on every node.
    fn verify(
        &self,
        proof: &AggregateProof,
        statement: &AggregateStatement,
    ) -> Result<bool, VerifyError>;

    /// Backend identifier written into produced proofs.
    fn system_id(&self) -> &str;
}

/// Gateway backed by the in-process [`MockProofSystem`].
#[derive(Debug, Default)]
pub struct LocalProofGateway {
    system: MockProofSystem,
}

impl LocalProofGateway {
    /// Create a gateway over the Phase 1 mock backend.
    pub fn new() -> Self {
        Self {
            system: MockProofSystem,
        }
    }
}

const MOCK_SYSTEM_ID: &str = "mock-sha256-v1";

impl AttestationGateway for LocalProofGateway {
    fn attest(&self, circuit: &AggregateChargeCircuit) -> Result<AggregateProof, ProofError> {
        let proof = self.system.prove(&MockProvingKey, circuit)?;
        Ok(AggregateProof {
            system: MOCK_SYSTEM_ID.to_string(),
            proof_hex: proof.proof_hex,
        })
    }

    fn verify(
        &self,
        proof: &AggregateProof,
        statement: &AggregateStatement,
    ) -> Result<bool, VerifyError> {
        if proof.system != MOCK_SYSTEM_ID {
            return Err(VerifyError::SystemMismatch {
                expected: MOCK_SYSTEM_ID.to_string(),
                got: proof.system.clone(),
            });
        }
        let inputs = statement
            .canonical_bytes()
            .map_err(|e| VerifyError::VerificationFailed(e.to_string()))?;
        let mock_proof = crate::mock::MockProof {
            proof_hex: proof.proof_hex.clone(),
        };
        self.system.verify(&MockVerifyingKey, &mock_proof, &inputs)
    }

    fn system_id(&self) -> &str {
        MOCK_SYSTEM_ID
    }
}
