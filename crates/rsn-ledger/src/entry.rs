//! # Bilateral Ledger Entries
//!
//! One entry per unordered operator pair, kept in net form: a single signed
//! amount rather than two gross columns. The sign convention is relative to
//! the pair's normalized ordering, never to which operator happened to
//! submit a record first.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rsn_core::{OperatorId, OperatorPair, RecordId};

/// Threshold trigger state of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    /// Below threshold, or re-armed after settlement.
    Armed,
    /// Threshold crossed; waiting to be picked up by a settlement round.
    Due,
    /// Captured by an in-flight settlement proposal.
    PendingProposal,
}

/// Arithmetic failure updating an entry.
#[derive(Error, Debug)]
#[error("bilateral entry for {pair} overflowed applying {amount_cents} cents")]
pub struct EntryOverflow {
    /// The affected pair.
    pub pair: OperatorPair,
    /// The charge that could not be applied.
    pub amount_cents: u64,
}

/// The net debt between two operators.
///
/// `net_cents` is signed relative to the normalized pair ordering:
/// positive means `pair.second()` owes `pair.first()`, negative means
/// `pair.first()` owes `pair.second()`. Zero means the pair is square.
///
/// Invariant: `net_cents` equals the oriented sum of the wholesale charges
/// of `unsettled_record_ids`. The ledger updates both in one critical
/// section and persists them in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilateralLedgerEntry {
    /// The normalized operator pair.
    pub pair: OperatorPair,
    /// Signed net debt in minor units.
    pub net_cents: i64,
    /// Records accumulated since the last settlement.
    pub unsettled_record_ids: BTreeSet<RecordId>,
    /// Threshold trigger state.
    pub trigger: TriggerState,
    /// Height of the last block that settled this pair.
    pub last_settlement_height: Option<u64>,
}

impl BilateralLedgerEntry {
    /// Create a square entry for a pair.
    pub fn new(pair: OperatorPair) -> Self {
        Self {
            pair,
            net_cents: 0,
            unsettled_record_ids: BTreeSet::new(),
            trigger: TriggerState::Armed,
            last_settlement_height: None,
        }
    }

    /// Apply one record's wholesale charge.
    ///
    /// Billing convention: the visited operator owes the home operator for
    /// wholesale charges incurred serving the home operator's subscriber.
    /// This method is the only place the convention is encoded.
    pub fn apply_charge(
        &mut self,
        home: &OperatorId,
        visited: &OperatorId,
        amount_cents: u64,
    ) -> Result<(), EntryOverflow> {
        let amount = i64::try_from(amount_cents).map_err(|_| EntryOverflow {
            pair: self.pair.clone(),
            amount_cents,
        })?;

        // Creditor is home. Positive net = second owes first.
        let signed = if home == self.pair.first() {
            debug_assert!(visited == self.pair.second());
            amount
        } else {
            debug_assert!(home == self.pair.second() && visited == self.pair.first());
            -amount
        };

        self.net_cents = self.net_cents.checked_add(signed).ok_or(EntryOverflow {
            pair: self.pair.clone(),
            amount_cents,
        })?;
        Ok(())
    }

    /// Magnitude of the net debt.
    pub fn net_abs_cents(&self) -> u64 {
        self.net_cents.unsigned_abs()
    }

    /// The operator currently owing, or `None` when square.
    pub fn debtor(&self) -> Option<&OperatorId> {
        match self.net_cents {
            0 => None,
            n if n > 0 => Some(self.pair.second()),
            _ => Some(self.pair.first()),
        }
    }

    /// The operator currently owed, or `None` when square.
    pub fn creditor(&self) -> Option<&OperatorId> {
        match self.net_cents {
            0 => None,
            n if n > 0 => Some(self.pair.first()),
            _ => Some(self.pair.second()),
        }
    }

    /// Discharge the settled portion after a block at `height` committed.
    ///
    /// `settled_net_cents` is the signed net captured by the settlement
    /// snapshot. Records ingested between snapshot and commit stay behind:
    /// their ids remain unsettled and their contribution to the net
    /// survives the subtraction.
    pub fn settle(
        &mut self,
        height: u64,
        settled_ids: &BTreeSet<RecordId>,
        settled_net_cents: i64,
    ) -> Result<(), EntryOverflow> {
        self.net_cents = self
            .net_cents
            .checked_sub(settled_net_cents)
            .ok_or(EntryOverflow {
                pair: self.pair.clone(),
                amount_cents: settled_net_cents.unsigned_abs(),
            })?;
        self.unsettled_record_ids = self
            .unsettled_record_ids
            .difference(settled_ids)
            .cloned()
            .collect();
        self.trigger = TriggerState::Armed;
        self.last_settlement_height = Some(height);
        Ok(())
    }
}
