//! # Local Ledger
//!
//! [`LocalLedger`] composes the validator, the bilateral entries, the
//! threshold monitor, and the store into the node's transactional debt
//! ledger.
//!
//! ## Critical Sections
//!
//! Ingestion holds a shared settlement lock plus an exclusive per-pair
//! lock: two records for different pairs ingest in parallel, two for the
//! same pair serialize, and nothing ingests while a settlement-wide
//! operation (snapshot, commit, release) holds the settlement lock
//! exclusively. Every state change persists through one [`WriteBatch`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use rsn_core::{
    BceRecord, CurrencyCode, OperatorId, OperatorPair, RecordId, SettlementStatus,
    StatusTransitionError,
};

use crate::entry::{BilateralLedgerEntry, EntryOverflow, TriggerState};
use crate::store::{LedgerStore, StoreError, WriteBatch};
use crate::threshold::{SettlementTrigger, ThresholdMonitor};
use crate::validator::{RecordRejection, RecordValidator};

/// Zone parameters the ledger operates under.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// The zone's single settlement currency.
    pub currency: CurrencyCode,
    /// Settlement threshold in minor units.
    pub threshold_cents: u64,
}

/// Errors from ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The record failed admission validation.
    #[error("record rejected: {0}")]
    Rejected(#[from] RecordRejection),

    /// The storage layer failed; in-memory state was not advanced.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A debt update overflowed the amount range.
    #[error(transparent)]
    Overflow(#[from] EntryOverflow),

    /// A record's lifecycle state disagreed with the ledger's bookkeeping.
    #[error(transparent)]
    Status(#[from] StatusTransitionError),
}

/// Outcome of ingesting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The record entered the ledger.
    Accepted {
        /// Threshold trigger fired by this record, if any.
        trigger: Option<SettlementTrigger>,
    },
    /// A record with this identifier is already in the ledger; no-op.
    Duplicate,
}

/// One pair's debt captured by a settlement snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueDebt {
    /// The pair being settled.
    pub pair: OperatorPair,
    /// The owing operator.
    pub debtor: OperatorId,
    /// The owed operator.
    pub creditor: OperatorId,
    /// Debt magnitude in minor units.
    pub amount_cents: u64,
    /// Signed net relative to the pair ordering, as captured.
    pub net_cents: i64,
    /// The records backing the captured debt.
    pub record_ids: BTreeSet<RecordId>,
}

/// A committed settlement block, reduced to what the ledger needs.
///
/// Built by the consensus layer from a block it accepted; the ledger does
/// not know the block schema.
#[derive(Debug, Clone)]
pub struct SettlementCommit {
    /// Height of the committed block.
    pub height: u64,
    /// Proof reference recorded on settled records.
    pub proof_ref: String,
    /// The pairs the block settles.
    pub settled_pairs: Vec<OperatorPair>,
    /// All record identifiers the block covers.
    pub record_ids: BTreeSet<RecordId>,
}

/// The node's private bilateral debt ledger.
pub struct LocalLedger {
    store: Arc<dyn LedgerStore>,
    validator: RecordValidator,
    monitor: ThresholdMonitor,
    /// Shared for ingestion, exclusive for settlement-wide operations.
    settlement_lock: RwLock<()>,
    pair_locks: Mutex<BTreeMap<OperatorPair, Arc<Mutex<()>>>>,
}

impl LocalLedger {
    /// Create a ledger over an injected store.
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            validator: RecordValidator::new(config.currency),
            monitor: ThresholdMonitor::new(config.threshold_cents),
            settlement_lock: RwLock::new(()),
            pair_locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// The configured settlement threshold in minor units.
    pub fn threshold_cents(&self) -> u64 {
        self.monitor.threshold_cents()
    }

    fn pair_lock(&self, pair: &OperatorPair) -> Arc<Mutex<()>> {
        self.pair_locks
            .lock()
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Ingest one billing record.
    ///
    /// Validation, duplicate detection, debt update, and threshold check
    /// happen atomically with respect to other ingests for the same pair
    /// and to settlement-wide operations.
    pub fn ingest(&self, record: BceRecord) -> Result<IngestOutcome, LedgerError> {
        self.validator.validate(&record)?;

        // Distinct operators were just validated.
        let pair = record
            .pair()
            .expect("validated record has distinct operators");

        let _settlement = self.settlement_lock.read();
        let pair_lock = self.pair_lock(&pair);
        let _pair_guard = pair_lock.lock();

        if self.store.record(&record.record_id)?.is_some() {
            debug!(record_id = %record.record_id, "duplicate record ignored");
            return Ok(IngestOutcome::Duplicate);
        }

        let mut entry = self
            .store
            .entry(&pair)?
            .unwrap_or_else(|| BilateralLedgerEntry::new(pair.clone()));
        entry.apply_charge(
            &record.home_operator,
            &record.visited_operator,
            record.wholesale_charge_cents,
        )?;
        entry.unsettled_record_ids.insert(record.record_id.clone());

        let trigger = self.monitor.check(&mut entry);
        if let Some(t) = &trigger {
            info!(
                pair = %t.pair,
                debtor = %t.debtor,
                creditor = %t.creditor,
                net_cents = t.net_cents,
                "settlement threshold crossed"
            );
        }

        let mut batch = WriteBatch::new();
        batch.records.push(record);
        batch.entries.push(entry);
        self.store.apply(batch)?;

        Ok(IngestOutcome::Accepted { trigger })
    }

    /// Capture every due pair for a settlement round.
    ///
    /// Due entries move to `PendingProposal` and their records to
    /// `InSettlement`; a pair whose debt has meanwhile fallen back below
    /// threshold is re-armed instead of captured.
    pub fn due_snapshot(&self) -> Result<Vec<DueDebt>, LedgerError> {
        let _settlement = self.settlement_lock.write();

        let mut batch = WriteBatch::new();
        let mut due = Vec::new();

        for mut entry in self.store.entries()? {
            if entry.trigger != TriggerState::Due {
                continue;
            }

            if entry.net_abs_cents() < self.monitor.threshold_cents() {
                entry.trigger = TriggerState::Armed;
                batch.entries.push(entry);
                continue;
            }

            let (debtor, creditor) = match (entry.debtor(), entry.creditor()) {
                (Some(d), Some(c)) => (d.clone(), c.clone()),
                _ => continue,
            };

            let record_ids = entry.unsettled_record_ids.clone();
            for id in &record_ids {
                if let Some(mut record) = self.store.record(id)? {
                    record.mark_in_settlement()?;
                    batch.records.push(record);
                }
            }

            entry.trigger = TriggerState::PendingProposal;
            due.push(DueDebt {
                pair: entry.pair.clone(),
                debtor,
                creditor,
                amount_cents: entry.net_abs_cents(),
                net_cents: entry.net_cents,
                record_ids,
            });
            batch.entries.push(entry);
        }

        if !batch.is_empty() {
            self.store.apply(batch)?;
        }
        Ok(due)
    }

    /// Whether any pair is currently due for settlement.
    pub fn has_due_pairs(&self) -> Result<bool, LedgerError> {
        let _settlement = self.settlement_lock.read();
        Ok(self
            .store
            .entries()?
            .iter()
            .any(|e| e.trigger == TriggerState::Due))
    }

    /// Apply a committed settlement block to the local ledger.
    ///
    /// For every settled pair the node has an entry for, the locally held
    /// records covered by the block are marked settled and their oriented
    /// sum is discharged from the entry. Records ingested after the
    /// snapshot survive untouched; if they already put the pair back over
    /// threshold, a fresh trigger fires and is returned.
    pub fn apply_settlement(
        &self,
        commit: &SettlementCommit,
    ) -> Result<Vec<SettlementTrigger>, LedgerError> {
        let _settlement = self.settlement_lock.write();

        let mut batch = WriteBatch::new();
        let mut refires = Vec::new();

        for pair in &commit.settled_pairs {
            let Some(mut entry) = self.store.entry(pair)? else {
                continue;
            };

            let local_ids: BTreeSet<RecordId> = entry
                .unsettled_record_ids
                .intersection(&commit.record_ids)
                .cloned()
                .collect();
            if local_ids.is_empty() && entry.trigger != TriggerState::PendingProposal {
                continue;
            }

            let mut settled_net: i64 = 0;
            for id in &local_ids {
                let Some(mut record) = self.store.record(id)? else {
                    continue;
                };
                let amount = i64::try_from(record.wholesale_charge_cents).map_err(|_| {
                    EntryOverflow {
                        pair: pair.clone(),
                        amount_cents: record.wholesale_charge_cents,
                    }
                })?;
                // Same orientation as the ingest-side billing convention.
                settled_net = if &record.home_operator == pair.first() {
                    settled_net.checked_add(amount)
                } else {
                    settled_net.checked_sub(amount)
                }
                .ok_or(EntryOverflow {
                    pair: pair.clone(),
                    amount_cents: record.wholesale_charge_cents,
                })?;

                if record.status == SettlementStatus::Pending {
                    // This node never proposed the round; capture in place.
                    record.mark_in_settlement()?;
                }
                record.mark_settled(commit.height, commit.proof_ref.clone())?;
                batch.records.push(record);
            }

            if !local_ids.is_empty() {
                entry.settle(commit.height, &local_ids, settled_net)?;
            } else {
                entry.trigger = TriggerState::Armed;
            }

            // Records captured for the round but left out of the block go
            // back to pending; the entry has already left PendingProposal,
            // so no release pass will reach them otherwise.
            for id in &entry.unsettled_record_ids {
                if let Some(mut record) = self.store.record(id)? {
                    if record.status == SettlementStatus::InSettlement {
                        record.release_to_pending()?;
                        batch.records.push(record);
                    }
                }
            }

            if let Some(trigger) = self.monitor.check(&mut entry) {
                warn!(
                    pair = %trigger.pair,
                    net_cents = trigger.net_cents,
                    "pair back over threshold immediately after settlement"
                );
                refires.push(trigger);
            }
            batch.entries.push(entry);
        }

        if !batch.is_empty() {
            self.store.apply(batch)?;
            info!(
                height = commit.height,
                pairs = commit.settled_pairs.len(),
                records = commit.record_ids.len(),
                "settlement applied to ledger"
            );
        }
        Ok(refires)
    }

    /// Release pairs captured by a settlement round that aborted.
    ///
    /// Captured records return to `Pending`. A pair still at or above
    /// threshold goes back to `Due` and will be retried by the next round;
    /// one that fell below re-arms quietly.
    pub fn release_pending(&self, pairs: &[OperatorPair]) -> Result<(), LedgerError> {
        let _settlement = self.settlement_lock.write();

        let mut batch = WriteBatch::new();
        for pair in pairs {
            let Some(mut entry) = self.store.entry(pair)? else {
                continue;
            };
            if entry.trigger != TriggerState::PendingProposal {
                continue;
            }

            for id in &entry.unsettled_record_ids {
                if let Some(mut record) = self.store.record(id)? {
                    if record.status == SettlementStatus::InSettlement {
                        record.release_to_pending()?;
                        batch.records.push(record);
                    }
                }
            }

            entry.trigger = if entry.net_abs_cents() >= self.monitor.threshold_cents() {
                TriggerState::Due
            } else {
                TriggerState::Armed
            };
            debug!(pair = %entry.pair, state = ?entry.trigger, "released pending pair");
            batch.entries.push(entry);
        }

        if !batch.is_empty() {
            self.store.apply(batch)?;
        }
        Ok(())
    }

    /// Fetch a record by identifier.
    pub fn record(&self, id: &RecordId) -> Result<Option<BceRecord>, LedgerError> {
        Ok(self.store.record(id)?)
    }

    /// All records in the ledger.
    pub fn records(&self) -> Result<Vec<BceRecord>, LedgerError> {
        Ok(self.store.records()?)
    }

    /// Fetch the entry for a pair.
    pub fn entry(&self, pair: &OperatorPair) -> Result<Option<BilateralLedgerEntry>, LedgerError> {
        Ok(self.store.entry(pair)?)
    }

    /// All bilateral entries.
    pub fn entries(&self) -> Result<Vec<BilateralLedgerEntry>, LedgerError> {
        Ok(self.store.entries()?)
    }
}
