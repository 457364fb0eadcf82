//! Consensus and chain validation errors.
//!
//! Every rejection reason is a distinct variant so peer handlers can log
//! and report exactly why a block or vote was refused.

use thiserror::Error;

use rsn_core::{ContentDigest, RecordId, ValidatorId};
use rsn_crypto::CryptoError;
use rsn_ledger::{LedgerError, StoreError};
use rsn_netting::NettingError;
use rsn_zkp::{ProofError, VerifyError};

/// Errors from block validation, chain append, and round coordination.
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// The block's height does not extend the chain head.
    #[error("height mismatch: chain expects {expected}, block claims {got}")]
    HeightMismatch {
        /// Next height the chain will accept.
        expected: u64,
        /// Height carried by the rejected block.
        got: u64,
    },

    /// The block's parent digest does not match the chain head hash.
    #[error("parent digest mismatch at height {height}")]
    ParentMismatch {
        /// Height of the rejected block.
        height: u64,
    },

    /// The block was produced by a validator out of rotation.
    #[error("validator {got} is not the proposer for height {height}, expected {expected}")]
    NotProposer {
        /// Height of the rejected proposal.
        height: u64,
        /// The rotation-correct proposer.
        expected: ValidatorId,
        /// The validator that actually proposed.
        got: ValidatorId,
    },

    /// Net positions do not sum to zero or transfers fail to realize them.
    #[error("conservation violation: {0}")]
    ConservationViolation(String),

    /// A record identifier already appears in a committed block.
    #[error("record {0} is already settled in an earlier block")]
    RecordReuse(RecordId),

    /// The block's record set digest does not match its record ids.
    #[error("record set digest mismatch at height {height}")]
    RecordSetDigestMismatch {
        /// Height of the rejected block.
        height: u64,
    },

    /// The block's currency differs from the zone currency.
    #[error("currency mismatch: zone settles {expected}, block carries {got}")]
    CurrencyMismatch {
        /// The zone's configured currency code.
        expected: String,
        /// The currency carried by the rejected block.
        got: String,
    },

    /// The aggregate proof did not verify against the block's statement.
    #[error("aggregate proof rejected at height {height}")]
    ProofRejected {
        /// Height of the rejected block.
        height: u64,
    },

    /// The block carries fewer valid signatures than the quorum requires.
    #[error("insufficient signatures: {got} of {required} required")]
    InsufficientSignatures {
        /// Signatures needed for commit.
        required: usize,
        /// Valid signatures present.
        got: usize,
    },

    /// A signature or vote names a validator outside the zone set.
    #[error("unknown validator {0}")]
    UnknownValidator(ValidatorId),

    /// The chain was constructed with no validators; no proposer exists.
    #[error("validator set is empty")]
    EmptyValidatorSet,

    /// A vote or proposal arrived for a height with no open round.
    #[error("no open round at height {0}")]
    NoOpenRound(u64),

    /// A vote references a different block than the open round's candidate.
    #[error("vote for block {got} but round candidate is {expected}")]
    VoteHashMismatch {
        /// Hash of the round's candidate block.
        expected: ContentDigest,
        /// Hash carried by the rejected vote.
        got: ContentDigest,
    },

    /// Signature verification failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Proof generation failed or timed out.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// Proof verification failed structurally.
    #[error(transparent)]
    ProofVerify(#[from] VerifyError),

    /// Multilateral netting rejected the debt set.
    #[error(transparent)]
    Netting(#[from] NettingError),

    /// The ledger rejected a settlement-side operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Canonical serialization of a block or vote failed.
    #[error(transparent)]
    Canonicalization(#[from] rsn_core::CanonicalizationError),

    /// A stored block could not be decoded.
    #[error("stored block at height {height} is malformed: {reason}")]
    MalformedStoredBlock {
        /// Height of the unreadable block.
        height: u64,
        /// Decoder error text.
        reason: String,
    },
}
