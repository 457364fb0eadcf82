//! # Peer Messages
//!
//! Wire types exchanged between validator nodes during a settlement round.
//!
//! A vote's signature covers the candidate block's canonical unsigned
//! bytes, the same payload the committed block's signature set is checked
//! against. The proposer can therefore move quorum vote signatures into
//! the block unchanged, and a vote can never be replayed for a different
//! block or height.

use serde::{Deserialize, Serialize};

use rsn_core::{ContentDigest, ValidatorId};

use crate::block::SettlementBlock;

/// A candidate block broadcast by the round's proposer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockProposal {
    /// The unsigned candidate block.
    pub block: SettlementBlock,
}

/// An approval vote for a candidate block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockVote {
    /// Height of the round being voted on.
    pub height: u64,
    /// Hash of the candidate block the vote approves.
    pub block_hash: ContentDigest,
    /// The voting validator.
    pub validator: ValidatorId,
    /// Hex-encoded Ed25519 signature over the candidate's signing bytes.
    pub signature: String,
}

/// A quorum-signed block announced as committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCommit {
    /// The committed block, carrying its quorum signature set.
    pub block: SettlementBlock,
}
