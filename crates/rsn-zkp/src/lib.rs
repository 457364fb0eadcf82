#![deny(missing_docs)]

//! # rsn-zkp — Aggregate Proof System
//!
//! Provides the proof boundary between private billing records and the
//! public settlement chain. A settlement block carries net positions and an
//! [`AggregateProof`]; the records that produced those positions never leave
//! the nodes that ingested them. The proof is what lets a validator without
//! the records vote for the block anyway.
//!
//! ## Architecture
//!
//! The [`ProofSystem`] trait defines the interface for all proof backends.
//! Phase 1 ships with [`MockProofSystem`] — deterministic digest commitments
//! with no zero-knowledge guarantees, but the same soundness/completeness
//! contract real backends must satisfy. Real backends (Groth16, PLONK) are
//! activated via Cargo feature flags when integrated.
//!
//! The settlement path talks to [`AttestationGateway`], not to a proof
//! system directly, so swapping the backend never touches consensus code.

pub mod gateway;
pub mod mock;
pub mod statement;
pub mod traits;

// Re-export primary types.
pub use gateway::{AggregateProof, AttestationGateway, LocalProofGateway};
pub use mock::MockProofSystem;
pub use statement::{AggregateChargeCircuit, AggregateStatement, DebtWitness};
pub use traits::{ProofError, ProofSystem, VerifyError};
