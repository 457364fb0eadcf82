//! # Block Builder
//!
//! Turns a ledger snapshot of due pairs into an unsigned settlement block.
//!
//! The builder is deterministic: netting iterates sorted maps, record ids
//! live in ordered sets, and the proposal time is an input rather than a
//! clock read. Proof generation is the only call that leaves this module.

use std::collections::BTreeSet;

use rsn_core::{ContentDigest, CurrencyCode, RecordId, Timestamp, ValidatorId};
use rsn_ledger::DueDebt;
use rsn_netting::{BilateralDebt, NettingEngine};
use rsn_zkp::{AggregateChargeCircuit, AggregateStatement, AttestationGateway, DebtWitness};

use crate::block::SettlementBlock;
use crate::error::ConsensusError;

/// Builds settlement blocks from due-pair snapshots.
pub struct SettlementBlockBuilder {
    currency: CurrencyCode,
}

impl SettlementBlockBuilder {
    /// Create a builder for the zone's settlement currency.
    pub fn new(currency: CurrencyCode) -> Self {
        Self { currency }
    }

    /// Build the unsigned block for `height` from a snapshot of due debts.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot is empty, netting rejects the debt set, or
    /// the gateway cannot produce a proof. The caller aborts the round and
    /// releases the captured pairs in all three cases.
    pub fn build(
        &self,
        height: u64,
        parent_digest: ContentDigest,
        proposer: ValidatorId,
        created_at: Timestamp,
        due: &[DueDebt],
        gateway: &dyn AttestationGateway,
    ) -> Result<SettlementBlock, ConsensusError> {
        let mut engine = NettingEngine::new();
        let mut record_ids: BTreeSet<RecordId> = BTreeSet::new();
        let mut witnesses = Vec::with_capacity(due.len());

        for debt in due {
            let amount = i64::try_from(debt.amount_cents)
                .map_err(|_| rsn_netting::NettingError::ArithmeticOverflow)?;
            engine.add_debt(BilateralDebt {
                debtor: debt.debtor.clone(),
                creditor: debt.creditor.clone(),
                amount_cents: amount,
            })?;
            witnesses.push(DebtWitness {
                debtor: debt.debtor.clone(),
                creditor: debt.creditor.clone(),
                amount_cents: amount,
            });
            record_ids.extend(debt.record_ids.iter().cloned());
        }

        let outcome = engine.compute()?;
        let record_set_digest = SettlementBlock::digest_record_set(&record_ids);

        let statement = AggregateStatement {
            height,
            currency: self.currency.clone(),
            net_positions: outcome.net_positions.clone(),
            record_set_digest: record_set_digest.clone(),
        };
        let circuit = AggregateChargeCircuit {
            statement,
            debts: witnesses,
        };
        let proof = gateway.attest(&circuit)?;

        Ok(SettlementBlock {
            height,
            parent_digest,
            created_at,
            proposer,
            currency: self.currency.clone(),
            net_positions: outcome.net_positions,
            transfers: outcome.transfers,
            settled_pairs: due.iter().map(|d| d.pair.clone()).collect(),
            included_record_ids: record_ids,
            record_set_digest,
            gross_cents: outcome.gross_cents,
            net_cents: outcome.net_cents,
            proof,
            signatures: Default::default(),
        })
    }
}
