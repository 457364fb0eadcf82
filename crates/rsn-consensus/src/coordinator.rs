//! # Round Coordinator
//!
//! Drives the propose-vote-commit cycle for one validator node.
//!
//! ## Round Lifecycle
//!
//! The node's periodic tick opens a round when it is the rotation-correct
//! proposer and the ledger has due pairs: it snapshots the debts, builds
//! and proposes a candidate block, and collects votes. Peers answer a
//! valid proposal with a signed vote; the proposer assembles a quorum into
//! a committed block and announces it. A round that outlives the voting
//! window aborts and releases its captured pairs.
//!
//! Proof generation runs on a blocking task under a deadline. A round
//! whose proof misses the deadline aborts the same way a stale round
//! does; the pairs return to due and the next tick retries.
//!
//! ## Security Invariant
//!
//! At most one open round exists per node, and a node signs at most one
//! candidate per height. Commits are idempotent: re-announcing a
//! committed block is a no-op, never a double settlement.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rsn_core::{ContentDigest, CurrencyCode, OperatorPair, Timestamp, ValidatorId};
use rsn_crypto::{Ed25519Signature, SigningKey};
use rsn_ledger::{LocalLedger, SettlementCommit};
use rsn_zkp::{AttestationGateway, ProofError};

use crate::block::SettlementBlock;
use crate::builder::SettlementBlockBuilder;
use crate::chain::SettlementChain;
use crate::error::ConsensusError;
use crate::messages::{BlockCommit, BlockProposal, BlockVote};

/// Static parameters of the consensus layer.
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// This node's validator identity.
    pub node_id: ValidatorId,
    /// The zone's settlement currency.
    pub currency: CurrencyCode,
    /// Seconds an open round may wait for quorum before aborting.
    pub voting_window_secs: u64,
    /// Seconds proof generation may take before the round aborts.
    pub proof_timeout_secs: u64,
}

/// What a periodic tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing to do.
    Idle,
    /// A candidate block was built; broadcast the proposal.
    Proposed(BlockProposal),
    /// Quorum was already satisfied locally; broadcast the commit.
    Committed(BlockCommit),
    /// An open round was abandoned and its pairs released.
    Aborted {
        /// Height of the abandoned round.
        height: u64,
    },
}

struct Round {
    height: u64,
    block: SettlementBlock,
    block_hash: ContentDigest,
    votes: BTreeMap<ValidatorId, String>,
    pairs: Vec<OperatorPair>,
    started_at: Timestamp,
    proposed_locally: bool,
}

/// Per-node consensus driver.
pub struct ConsensusCoordinator {
    config: ConsensusConfig,
    signing_key: SigningKey,
    ledger: Arc<LocalLedger>,
    chain: Arc<SettlementChain>,
    gateway: Arc<dyn AttestationGateway>,
    round: Mutex<Option<Round>>,
}

impl ConsensusCoordinator {
    /// Wire up a coordinator over the node's ledger, chain, and gateway.
    pub fn new(
        config: ConsensusConfig,
        signing_key: SigningKey,
        ledger: Arc<LocalLedger>,
        chain: Arc<SettlementChain>,
        gateway: Arc<dyn AttestationGateway>,
    ) -> Self {
        Self {
            config,
            signing_key,
            ledger,
            chain,
            gateway,
            round: Mutex::new(None),
        }
    }

    /// This node's validator identity.
    pub fn node_id(&self) -> &ValidatorId {
        &self.config.node_id
    }

    /// Height of the currently open round, if any.
    pub async fn open_round_height(&self) -> Option<u64> {
        self.round.lock().await.as_ref().map(|r| r.height)
    }

    /// Advance the round state machine.
    ///
    /// Expires a stale open round, or opens a new one when this node is
    /// the proposer for the next height and the ledger has due pairs.
    pub async fn tick(&self, now: Timestamp) -> Result<TickOutcome, ConsensusError> {
        let mut round = self.round.lock().await;

        if let Some(open) = round.as_ref() {
            if now.seconds_since(&open.started_at) > self.config.voting_window_secs {
                let height = open.height;
                warn!(height, "voting window expired, aborting round");
                self.ledger.release_pending(&open.pairs)?;
                *round = None;
                return Ok(TickOutcome::Aborted { height });
            }
            return Ok(TickOutcome::Idle);
        }

        let height = self.chain.next_height()?;
        if self.chain.proposer_for(height)? != self.config.node_id {
            return Ok(TickOutcome::Idle);
        }
        if !self.ledger.has_due_pairs()? {
            return Ok(TickOutcome::Idle);
        }

        let due = self.ledger.due_snapshot()?;
        if due.is_empty() {
            return Ok(TickOutcome::Idle);
        }
        let pairs: Vec<OperatorPair> = due.iter().map(|d| d.pair.clone()).collect();

        let block = match self.build_with_deadline(height, now, &due).await {
            Ok(block) => block,
            Err(err) => {
                warn!(height, error = %err, "block construction failed, releasing pairs");
                self.ledger.release_pending(&pairs)?;
                return match err {
                    ConsensusError::Proof(ProofError::TimedOut(_)) => {
                        Ok(TickOutcome::Aborted { height })
                    }
                    other => Err(other),
                };
            }
        };

        let block_hash = block.block_hash()?;
        let own_vote = self.signing_key.sign(&block.signing_bytes()?);
        let mut votes = BTreeMap::new();
        votes.insert(self.config.node_id.clone(), own_vote.to_hex());

        info!(height, hash = %block_hash.to_hex(), pairs = pairs.len(), "proposing settlement block");

        let open = Round {
            height,
            block: block.clone(),
            block_hash,
            votes,
            pairs,
            started_at: now,
            proposed_locally: true,
        };

        if open.votes.len() >= self.chain.quorum() {
            let commit = self.commit_round(&open)?;
            return Ok(TickOutcome::Committed(commit));
        }

        *round = Some(open);
        Ok(TickOutcome::Proposed(BlockProposal { block }))
    }

    async fn build_with_deadline(
        &self,
        height: u64,
        now: Timestamp,
        due: &[rsn_ledger::DueDebt],
    ) -> Result<SettlementBlock, ConsensusError> {
        let parent = self.chain.head_digest()?;
        let proposer = self.config.node_id.clone();
        let currency = self.config.currency.clone();
        let gateway = Arc::clone(&self.gateway);
        let due = due.to_vec();
        let budget = self.config.proof_timeout_secs;

        let task = tokio::task::spawn_blocking(move || {
            SettlementBlockBuilder::new(currency).build(
                height,
                parent,
                proposer,
                now,
                &due,
                gateway.as_ref(),
            )
        });

        match tokio::time::timeout(Duration::from_secs(budget), task).await {
            Err(_) => Err(ProofError::TimedOut(budget).into()),
            Ok(Err(join)) => Err(ProofError::GenerationFailed(join.to_string()).into()),
            Ok(Ok(result)) => result,
        }
    }

    /// Handle a candidate block from a peer proposer.
    ///
    /// Returns this node's vote when the candidate validates. A candidate
    /// conflicting with an already-open round at the same height is
    /// refused without a vote; one of the two rounds will reach quorum
    /// elsewhere and the other expires.
    pub async fn handle_proposal(
        &self,
        proposal: BlockProposal,
    ) -> Result<Option<BlockVote>, ConsensusError> {
        let mut round = self.round.lock().await;
        let block = proposal.block;
        let height = block.height;
        let hash = block.block_hash()?;

        if self.chain.contains(height, &hash)? {
            debug!(height, "proposal for an already committed block");
            return Ok(None);
        }

        if let Some(open) = round.as_ref() {
            if open.height == height && open.block_hash != hash {
                warn!(
                    height,
                    ours = %open.block_hash.to_hex(),
                    theirs = %hash.to_hex(),
                    "conflicting proposal at open round height, refusing to vote"
                );
                return Ok(None);
            }
            if open.height == height && open.block_hash == hash {
                // Re-delivered proposal; answer with the same vote.
                let signature = self.signing_key.sign(&block.signing_bytes()?);
                return Ok(Some(BlockVote {
                    height,
                    block_hash: hash,
                    validator: self.config.node_id.clone(),
                    signature: signature.to_hex(),
                }));
            }
        }

        self.chain.validate(&block)?;

        let signature = self.signing_key.sign(&block.signing_bytes()?);
        let vote = BlockVote {
            height,
            block_hash: hash.clone(),
            validator: self.config.node_id.clone(),
            signature: signature.to_hex(),
        };

        debug!(height, hash = %hash.to_hex(), "voting for candidate block");
        *round = Some(Round {
            height,
            block,
            block_hash: hash,
            votes: BTreeMap::new(),
            pairs: Vec::new(),
            started_at: Timestamp::now(),
            proposed_locally: false,
        });

        Ok(Some(vote))
    }

    /// Handle a vote from a peer.
    ///
    /// Only the round's proposer accumulates votes. Reaching quorum
    /// commits the block locally and returns the commit announcement to
    /// broadcast.
    pub async fn handle_vote(
        &self,
        vote: BlockVote,
    ) -> Result<Option<BlockCommit>, ConsensusError> {
        let mut round = self.round.lock().await;
        let Some(open) = round.as_mut() else {
            return Err(ConsensusError::NoOpenRound(vote.height));
        };
        if open.height != vote.height {
            return Err(ConsensusError::NoOpenRound(vote.height));
        }
        if !open.proposed_locally {
            debug!(height = vote.height, "ignoring vote, not the proposer");
            return Ok(None);
        }
        if vote.block_hash != open.block_hash {
            return Err(ConsensusError::VoteHashMismatch {
                expected: open.block_hash.clone(),
                got: vote.block_hash,
            });
        }

        let Some(key) = self.chain.validator_key(&vote.validator) else {
            warn!(validator = %vote.validator, "vote from outside the validator set");
            return Err(ConsensusError::UnknownValidator(vote.validator));
        };
        let signature = Ed25519Signature::from_hex(&vote.signature)?;
        key.verify(&open.block.signing_bytes()?, &signature)?;

        open.votes.insert(vote.validator.clone(), vote.signature);
        debug!(
            height = open.height,
            votes = open.votes.len(),
            quorum = self.chain.quorum(),
            "vote recorded"
        );

        if open.votes.len() >= self.chain.quorum() {
            let commit = self.commit_round(open)?;
            *round = None;
            return Ok(Some(commit));
        }
        Ok(None)
    }

    /// Handle a commit announcement from a peer.
    ///
    /// Idempotent: a block already on the chain is acknowledged without
    /// re-applying it.
    pub async fn handle_commit(&self, commit: BlockCommit) -> Result<(), ConsensusError> {
        let mut round = self.round.lock().await;
        let block = commit.block;
        let height = block.height;
        let hash = block.block_hash()?;

        if self.chain.contains(height, &hash)? {
            debug!(height, "commit for an already committed block");
            if round.as_ref().is_some_and(|r| r.height == height) {
                *round = None;
            }
            return Ok(());
        }

        self.chain.append(block.clone())?;
        self.apply_committed(&block)?;

        if let Some(open) = round.take() {
            if open.height == height {
                // A competing local candidate lost; free its captured pairs.
                if open.proposed_locally && !open.pairs.is_empty() {
                    self.ledger.release_pending(&open.pairs)?;
                }
            } else {
                *round = Some(open);
            }
        }
        Ok(())
    }

    fn commit_round(&self, open: &Round) -> Result<BlockCommit, ConsensusError> {
        let mut block = open.block.clone();
        block.signatures = open.votes.clone();
        self.chain.append(block.clone())?;
        self.apply_committed(&block)?;
        info!(height = block.height, "round reached quorum and committed");
        Ok(BlockCommit { block })
    }

    fn apply_committed(&self, block: &SettlementBlock) -> Result<(), ConsensusError> {
        let refires = self.ledger.apply_settlement(&SettlementCommit {
            height: block.height,
            proof_ref: block.proof.proof_hex.clone(),
            settled_pairs: block.settled_pairs.clone(),
            record_ids: block.included_record_ids.clone(),
        })?;
        for trigger in refires {
            debug!(pair = %trigger.pair, "pair immediately due again after settlement");
        }
        Ok(())
    }
}
