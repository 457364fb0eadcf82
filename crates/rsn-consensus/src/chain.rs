//! # Settlement Chain
//!
//! Append-only chain of committed settlement blocks, persisted through the
//! injected ledger store.
//!
//! ## Security Invariant
//!
//! `append` trusts nothing the block claims. Height, parent link, record
//! set digest, conservation, record disjointness, the aggregate proof, and
//! the quorum signature set are all re-derived locally before the block is
//! persisted. A block that fails any check leaves the store untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use rsn_core::{ContentDigest, CurrencyCode, OperatorId, RecordId, ValidatorId};
use rsn_crypto::{Ed25519Signature, VerifyingKey};
use rsn_ledger::{LedgerStore, WriteBatch};
use rsn_zkp::{AggregateStatement, AttestationGateway};

use crate::block::{genesis_parent_digest, SettlementBlock};
use crate::error::ConsensusError;

/// The local replica of the zone's settlement chain.
pub struct SettlementChain {
    store: Arc<dyn LedgerStore>,
    validator_keys: BTreeMap<ValidatorId, VerifyingKey>,
    quorum: usize,
    currency: CurrencyCode,
    gateway: Arc<dyn AttestationGateway>,
}

impl SettlementChain {
    /// Create a chain replica over an injected store.
    ///
    /// `validator_keys` is the zone's closed validator set; `quorum` is the
    /// number of signatures a block needs to commit.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        validator_keys: BTreeMap<ValidatorId, VerifyingKey>,
        quorum: usize,
        currency: CurrencyCode,
        gateway: Arc<dyn AttestationGateway>,
    ) -> Self {
        Self {
            store,
            validator_keys,
            quorum,
            currency,
            gateway,
        }
    }

    /// The height the next committed block must carry.
    pub fn next_height(&self) -> Result<u64, ConsensusError> {
        Ok(self.store.blocks()?.len() as u64)
    }

    /// Hash the next block's parent link must match.
    pub fn head_digest(&self) -> Result<ContentDigest, ConsensusError> {
        match self.head()? {
            Some(head) => Ok(head.block_hash()?),
            None => Ok(genesis_parent_digest()),
        }
    }

    /// The most recently committed block, if any.
    pub fn head(&self) -> Result<Option<SettlementBlock>, ConsensusError> {
        let next = self.next_height()?;
        if next == 0 {
            return Ok(None);
        }
        match self.block(next - 1)? {
            Some(block) => Ok(Some(block)),
            None => Err(ConsensusError::MalformedStoredBlock {
                height: next - 1,
                reason: "head missing from contiguous chain".to_string(),
            }),
        }
    }

    /// Fetch the committed block at `height`.
    pub fn block(&self, height: u64) -> Result<Option<SettlementBlock>, ConsensusError> {
        match self.store.block(height)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ConsensusError::MalformedStoredBlock {
                    height,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// All committed blocks in height order.
    pub fn blocks(&self) -> Result<Vec<SettlementBlock>, ConsensusError> {
        self.store
            .blocks()?
            .into_iter()
            .enumerate()
            .map(|(height, value)| {
                serde_json::from_value(value).map_err(|e| ConsensusError::MalformedStoredBlock {
                    height: height as u64,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Whether a block with this height and hash is already committed.
    pub fn contains(&self, height: u64, hash: &ContentDigest) -> Result<bool, ConsensusError> {
        match self.block(height)? {
            Some(block) => Ok(&block.block_hash()? == hash),
            None => Ok(false),
        }
    }

    /// The rotation-correct proposer for `height`.
    ///
    /// Validator ids sort lexicographically; the proposer is position
    /// `height % n`. Every honest node derives the same answer offline.
    pub fn proposer_for(&self, height: u64) -> Result<ValidatorId, ConsensusError> {
        let ids: Vec<&ValidatorId> = self.validator_keys.keys().collect();
        if ids.is_empty() {
            return Err(ConsensusError::EmptyValidatorSet);
        }
        Ok(ids[(height % ids.len() as u64) as usize].clone())
    }

    /// The verifying key of a zone validator, if known.
    pub fn validator_key(&self, id: &ValidatorId) -> Option<&VerifyingKey> {
        self.validator_keys.get(id)
    }

    /// Signatures required to commit a block.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Validate a block against the current chain state without appending.
    pub fn validate(&self, block: &SettlementBlock) -> Result<(), ConsensusError> {
        if block.currency != self.currency {
            return Err(ConsensusError::CurrencyMismatch {
                expected: self.currency.as_str().to_string(),
                got: block.currency.as_str().to_string(),
            });
        }

        let expected_height = self.next_height()?;
        if block.height != expected_height {
            return Err(ConsensusError::HeightMismatch {
                expected: expected_height,
                got: block.height,
            });
        }

        if block.parent_digest != self.head_digest()? {
            return Err(ConsensusError::ParentMismatch {
                height: block.height,
            });
        }

        let expected_proposer = self.proposer_for(block.height)?;
        if block.proposer != expected_proposer {
            return Err(ConsensusError::NotProposer {
                height: block.height,
                expected: expected_proposer,
                got: block.proposer.clone(),
            });
        }

        if SettlementBlock::digest_record_set(&block.included_record_ids) != block.record_set_digest
        {
            return Err(ConsensusError::RecordSetDigestMismatch {
                height: block.height,
            });
        }

        self.check_conservation(block)?;
        self.check_record_disjointness(&block.included_record_ids)?;

        let statement = AggregateStatement {
            height: block.height,
            currency: block.currency.clone(),
            net_positions: block.net_positions.clone(),
            record_set_digest: block.record_set_digest.clone(),
        };
        if !self.gateway.verify(&block.proof, &statement)? {
            return Err(ConsensusError::ProofRejected {
                height: block.height,
            });
        }

        Ok(())
    }

    /// Validate a commit-ready block, including its signature set, and
    /// persist it as the new head.
    pub fn append(&self, block: SettlementBlock) -> Result<(), ConsensusError> {
        self.validate(&block)?;
        self.check_signatures(&block)?;

        let height = block.height;
        let hash = block.block_hash()?;
        let value = serde_json::to_value(&block).map_err(rsn_ledger::StoreError::from)?;

        let mut batch = WriteBatch::new();
        batch.blocks.push((height, value));
        self.store.apply(batch)?;

        info!(height, hash = %hash.to_hex(), "settlement block committed");
        Ok(())
    }

    fn check_conservation(&self, block: &SettlementBlock) -> Result<(), ConsensusError> {
        let sum = block
            .net_positions
            .values()
            .try_fold(0i64, |acc, v| acc.checked_add(*v))
            .ok_or_else(|| {
                ConsensusError::ConservationViolation("net position sum overflow".to_string())
            })?;
        if sum != 0 {
            return Err(ConsensusError::ConservationViolation(format!(
                "net positions sum to {sum}, not zero"
            )));
        }

        // paid minus received must equal the negated net position per operator.
        let mut flow: BTreeMap<&OperatorId, i64> = BTreeMap::new();
        let mut net_total = 0i64;
        for transfer in &block.transfers {
            if transfer.amount_cents <= 0 {
                return Err(ConsensusError::ConservationViolation(format!(
                    "non-positive transfer of {} from {} to {}",
                    transfer.amount_cents, transfer.from, transfer.to
                )));
            }
            let overflow = || ConsensusError::ConservationViolation("flow overflow".to_string());
            let paid = flow.entry(&transfer.from).or_insert(0);
            *paid = paid.checked_add(transfer.amount_cents).ok_or_else(overflow)?;
            let received = flow.entry(&transfer.to).or_insert(0);
            *received = received
                .checked_sub(transfer.amount_cents)
                .ok_or_else(overflow)?;
            net_total = net_total
                .checked_add(transfer.amount_cents)
                .ok_or_else(overflow)?;
        }

        for (op, net) in &block.net_positions {
            let expected = net.checked_neg().ok_or_else(|| {
                ConsensusError::ConservationViolation("net position overflow".to_string())
            })?;
            if flow.get(op).copied().unwrap_or(0) != expected {
                return Err(ConsensusError::ConservationViolation(format!(
                    "transfers do not realize the net position of {op}"
                )));
            }
        }
        for op in flow.keys() {
            if !block.net_positions.contains_key(*op) {
                return Err(ConsensusError::ConservationViolation(format!(
                    "transfer names operator {op} outside the net position set"
                )));
            }
        }

        if net_total != block.net_cents {
            return Err(ConsensusError::ConservationViolation(format!(
                "declared net {} but transfers move {net_total}",
                block.net_cents
            )));
        }
        if block.net_cents > block.gross_cents {
            return Err(ConsensusError::ConservationViolation(format!(
                "net {} exceeds gross {}",
                block.net_cents, block.gross_cents
            )));
        }

        Ok(())
    }

    fn check_record_disjointness(
        &self,
        incoming: &BTreeSet<RecordId>,
    ) -> Result<(), ConsensusError> {
        for prior in self.blocks()? {
            if let Some(reused) = prior.included_record_ids.intersection(incoming).next() {
                return Err(ConsensusError::RecordReuse(reused.clone()));
            }
        }
        Ok(())
    }

    fn check_signatures(&self, block: &SettlementBlock) -> Result<(), ConsensusError> {
        let payload = block.signing_bytes()?;
        let mut valid = 0usize;

        for (validator, sig_hex) in &block.signatures {
            let Some(key) = self.validator_keys.get(validator) else {
                warn!(height = block.height, %validator, "signature from outside the validator set");
                return Err(ConsensusError::UnknownValidator(validator.clone()));
            };
            let signature = Ed25519Signature::from_hex(sig_hex)?;
            key.verify(&payload, &signature)?;
            valid += 1;
        }

        if valid < self.quorum {
            return Err(ConsensusError::InsufficientSignatures {
                required: self.quorum,
                got: valid,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SettlementBlockBuilder;
    use rsn_core::{OperatorPair, Timestamp};
    use rsn_crypto::SigningKey;
    use rsn_ledger::{DueDebt, MemoryStore};
    use rsn_zkp::LocalProofGateway;

    fn op(s: &str) -> OperatorId {
        OperatorId::new(s).unwrap()
    }

    fn validator(s: &str) -> ValidatorId {
        ValidatorId::new(s).unwrap()
    }

    struct Fixture {
        chain: SettlementChain,
        keys: BTreeMap<ValidatorId, SigningKey>,
        gateway: LocalProofGateway,
    }

    fn fixture(quorum: usize) -> Fixture {
        let mut keys = BTreeMap::new();
        let mut verifying = BTreeMap::new();
        for (i, name) in ["op-x", "op-y", "op-z"].iter().enumerate() {
            let key = SigningKey::from_seed(&[i as u8 + 1; 32]);
            verifying.insert(validator(name), key.verifying_key());
            keys.insert(validator(name), key);
        }
        let chain = SettlementChain::new(
            Arc::new(MemoryStore::new()),
            verifying,
            quorum,
            CurrencyCode::new("EUR").unwrap(),
            Arc::new(LocalProofGateway::new()),
        );
        Fixture {
            chain,
            keys,
            gateway: LocalProofGateway::new(),
        }
    }

    fn due(debtor: &str, creditor: &str, amount: u64, ids: &[&str]) -> DueDebt {
        let pair = OperatorPair::new(op(debtor), op(creditor)).unwrap();
        let net = if &op(creditor) == pair.first() {
            amount as i64
        } else {
            -(amount as i64)
        };
        DueDebt {
            pair,
            debtor: op(debtor),
            creditor: op(creditor),
            amount_cents: amount,
            net_cents: net,
            record_ids: ids.iter().map(|s| RecordId::new(*s).unwrap()).collect(),
        }
    }

    fn signed_block(fx: &Fixture, height: u64, due_debts: &[DueDebt]) -> SettlementBlock {
        let builder = SettlementBlockBuilder::new(CurrencyCode::new("EUR").unwrap());
        let proposer = fx.chain.proposer_for(height).unwrap();
        let mut block = builder
            .build(
                height,
                fx.chain.head_digest().unwrap(),
                proposer,
                Timestamp::parse("2026-02-01T00:00:00Z").unwrap(),
                due_debts,
                &fx.gateway,
            )
            .unwrap();
        let payload = block.signing_bytes().unwrap();
        for (validator, key) in &fx.keys {
            block
                .signatures
                .insert(validator.clone(), key.sign(&payload).to_hex());
        }
        block
    }

    #[test]
    fn append_accepts_a_valid_block() {
        let fx = fixture(2);
        let block = signed_block(&fx, 0, &[due("op-x", "op-y", 14_462, &["r1"])]);
        fx.chain.append(block.clone()).unwrap();

        assert_eq!(fx.chain.next_height().unwrap(), 1);
        let head = fx.chain.head().unwrap().unwrap();
        assert_eq!(head.block_hash().unwrap(), block.block_hash().unwrap());
        assert!(fx
            .chain
            .contains(0, &block.block_hash().unwrap())
            .unwrap());
    }

    #[test]
    fn append_rejects_wrong_height() {
        let fx = fixture(2);
        let block = signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]);
        fx.chain.append(block).unwrap();

        // A second block still claiming height 0.
        let stale = signed_block(&fx, 0, &[due("op-y", "op-z", 700, &["r2"])]);
        assert!(matches!(
            fx.chain.append(stale),
            Err(ConsensusError::HeightMismatch {
                expected: 1,
                got: 0
            })
        ));
    }

    #[test]
    fn append_rejects_tampered_positions() {
        let fx = fixture(2);
        let mut block = signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]);
        block.net_positions.insert(op("op-x"), -400);
        assert!(matches!(
            fx.chain.append(block),
            Err(ConsensusError::ConservationViolation(_))
        ));
    }

    #[test]
    fn append_rejects_record_reuse() {
        let fx = fixture(2);
        fx.chain
            .append(signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]))
            .unwrap();
        let reuse = signed_block(&fx, 1, &[due("op-y", "op-z", 700, &["r1"])]);
        assert!(matches!(
            fx.chain.append(reuse),
            Err(ConsensusError::RecordReuse(_))
        ));
    }

    #[test]
    fn append_rejects_insufficient_signatures() {
        let fx = fixture(3);
        let mut block = signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]);
        block.signatures.remove(&validator("op-z"));
        assert!(matches!(
            fx.chain.append(block),
            Err(ConsensusError::InsufficientSignatures {
                required: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn append_rejects_unknown_signer() {
        let fx = fixture(2);
        let mut block = signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]);
        block
            .signatures
            .insert(validator("op-intruder"), "ab".repeat(64));
        assert!(matches!(
            fx.chain.append(block),
            Err(ConsensusError::UnknownValidator(_))
        ));
    }

    #[test]
    fn append_rejects_forged_signature() {
        let fx = fixture(2);
        let mut block = signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]);
        let forged = SigningKey::from_seed(&[99; 32])
            .sign(&block.signing_bytes().unwrap())
            .to_hex();
        block.signatures.insert(validator("op-x"), forged);
        assert!(matches!(
            fx.chain.append(block),
            Err(ConsensusError::Crypto(_))
        ));
    }

    #[test]
    fn append_rejects_tampered_proof_statement() {
        let fx = fixture(2);
        let mut block = signed_block(
            &fx,
            0,
            &[
                due("op-x", "op-y", 500, &["r1"]),
                due("op-y", "op-z", 500, &["r2"]),
            ],
        );
        // Shift value between operators but keep the sum at zero and the
        // transfers consistent; only the proof can catch this.
        block.net_positions.insert(op("op-x"), -400);
        block.net_positions.insert(op("op-z"), 400);
        block.transfers[0].amount_cents = 400;
        block.net_cents = 400;
        assert!(matches!(
            fx.chain.append(block),
            Err(ConsensusError::ProofRejected { height: 0 })
        ));
    }

    #[test]
    fn proposer_rotation_is_deterministic() {
        let fx = fixture(2);
        assert_eq!(fx.chain.proposer_for(0).unwrap(), validator("op-x"));
        assert_eq!(fx.chain.proposer_for(1).unwrap(), validator("op-y"));
        assert_eq!(fx.chain.proposer_for(2).unwrap(), validator("op-z"));
        assert_eq!(fx.chain.proposer_for(3).unwrap(), validator("op-x"));
    }

    #[test]
    fn empty_validator_set_has_no_proposer() {
        let chain = SettlementChain::new(
            Arc::new(MemoryStore::new()),
            BTreeMap::new(),
            1,
            CurrencyCode::new("EUR").unwrap(),
            Arc::new(LocalProofGateway::new()),
        );
        assert!(matches!(
            chain.proposer_for(0),
            Err(ConsensusError::EmptyValidatorSet)
        ));
        assert!(matches!(
            chain.proposer_for(7),
            Err(ConsensusError::EmptyValidatorSet)
        ));
    }

    #[test]
    fn parent_links_chain_heights() {
        let fx = fixture(2);
        let b0 = signed_block(&fx, 0, &[due("op-x", "op-y", 500, &["r1"])]);
        fx.chain.append(b0.clone()).unwrap();
        let b1 = signed_block(&fx, 1, &[due("op-y", "op-z", 700, &["r2"])]);
        assert_eq!(b1.parent_digest, b0.block_hash().unwrap());
        fx.chain.append(b1).unwrap();
        assert_eq!(fx.chain.next_height().unwrap(), 2);
    }
}
