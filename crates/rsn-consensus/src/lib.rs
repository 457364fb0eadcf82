//! # RSN Consensus
//!
//! Settlement block construction, append-only chain validation, and the
//! propose-vote-commit round coordinator for the roaming settlement
//! network.
//!
//! ## Design
//!
//! - **Deterministic blocks.** [`SettlementBlockBuilder`] is a pure
//!   function of its inputs apart from proof generation; two validators
//!   given the same snapshot produce byte-identical unsigned blocks.
//! - **Validation before trust.** [`SettlementChain::append`] re-derives
//!   every claim a block makes (conservation, record disjointness, proof,
//!   quorum signatures) before persisting it.
//! - **Rotation, not election.** The proposer for height `h` is position
//!   `h % n` in the sorted validator list. Conflicting proposals resolve
//!   without communication.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod builder;
pub mod chain;
pub mod coordinator;
pub mod error;
pub mod messages;

pub use block::{genesis_parent_digest, SettlementBlock};
pub use builder::SettlementBlockBuilder;
pub use chain::SettlementChain;
pub use coordinator::{ConsensusConfig, ConsensusCoordinator, TickOutcome};
pub use error::ConsensusError;
pub use messages::{BlockCommit, BlockProposal, BlockVote};
