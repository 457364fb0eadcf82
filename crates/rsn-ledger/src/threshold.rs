//! # Threshold Monitoring
//!
//! Detects when a bilateral debt crosses the settlement threshold. The
//! monitor mutates the entry's trigger state in the same critical section
//! as the debt update that caused the crossing, which is what makes
//! "exactly one trigger per crossing" hold under concurrent ingestion.

use serde::{Deserialize, Serialize};

use rsn_core::{OperatorId, OperatorPair};

use crate::entry::{BilateralLedgerEntry, TriggerState};

/// A threshold crossing event.
///
/// Emitted at most once per crossing; the pair will not trigger again
/// until it has been settled or an aborted round released it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTrigger {
    /// The pair whose debt crossed the threshold.
    pub pair: OperatorPair,
    /// The owing operator at crossing time.
    pub debtor: OperatorId,
    /// The owed operator at crossing time.
    pub creditor: OperatorId,
    /// Magnitude of the net debt at crossing time, minor units.
    pub net_cents: u64,
}

/// Stateless threshold policy over stateful entries.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdMonitor {
    threshold_cents: u64,
}

impl ThresholdMonitor {
    /// Create a monitor with the zone's threshold in minor units.
    pub fn new(threshold_cents: u64) -> Self {
        Self { threshold_cents }
    }

    /// The configured threshold in minor units.
    pub fn threshold_cents(&self) -> u64 {
        self.threshold_cents
    }

    /// Check an entry after a debt update, firing at most one trigger.
    ///
    /// Fires only when the magnitude of the net debt is at or above the
    /// threshold AND the entry is armed. Firing moves the entry to
    /// [`TriggerState::Due`]; it stays there (or in `PendingProposal`)
    /// through any further updates, so an oscillating debt cannot trigger
    /// twice for one crossing.
    pub fn check(&self, entry: &mut BilateralLedgerEntry) -> Option<SettlementTrigger> {
        if entry.trigger != TriggerState::Armed {
            return None;
        }
        if entry.net_abs_cents() < self.threshold_cents {
            return None;
        }

        // A square entry can reach here with a zero threshold; resolve the
        // parties before mutating the trigger so a non-firing check never
        // changes the entry.
        let debtor = entry.debtor().cloned()?;
        let creditor = entry.creditor().cloned()?;

        entry.trigger = TriggerState::Due;
        Some(SettlementTrigger {
            pair: entry.pair.clone(),
            debtor,
            creditor,
            net_cents: entry.net_abs_cents(),
        })
    }
}
