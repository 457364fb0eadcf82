//! # Billing/Charging Event Records
//!
//! The [`BceRecord`] is the unit of ingestion: one roaming usage event,
//! submitted by the operator that observed it, priced in wholesale rates
//! agreed bilaterally. Records never leave the node that ingested them —
//! only netted aggregates and proofs are shared with the consortium.
//!
//! ## Lifecycle
//!
//! `Pending` → `InSettlement` (captured by a settlement proposal) →
//! `Settled` (the proposal's block committed). An aborted proposal returns
//! its records to `Pending`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::currency::CurrencyCode;
use crate::operator::{Imsi, OperatorId, OperatorPair, RecordId};
use crate::temporal::Timestamp;

/// Usage quantities for one roaming event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Voice minutes consumed.
    pub call_minutes: u64,
    /// Data megabytes consumed.
    pub data_mb: u64,
    /// SMS messages sent.
    pub sms_count: u64,
}

/// Wholesale rates applied to one record, in minor units per usage unit.
///
/// Carried per record so that every validator can cross-check the declared
/// charge against usage without access to the bilateral rate agreement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateCard {
    /// Minor units per voice minute.
    pub call_rate_cents: u64,
    /// Minor units per data megabyte.
    pub data_rate_cents: u64,
    /// Minor units per SMS.
    pub sms_rate_cents: u64,
}

impl RateCard {
    /// Compute the wholesale charge for the given usage, in minor units.
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn charge_for(&self, usage: &UsageMetrics) -> Option<u64> {
        let calls = self.call_rate_cents.checked_mul(usage.call_minutes)?;
        let data = self.data_rate_cents.checked_mul(usage.data_mb)?;
        let sms = self.sms_rate_cents.checked_mul(usage.sms_count)?;
        calls.checked_add(data)?.checked_add(sms)
    }
}

/// Settlement lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementStatus {
    /// Ingested, counted in the bilateral debt, not yet in any proposal.
    Pending,
    /// Captured by an in-flight settlement proposal.
    InSettlement,
    /// Included in a committed settlement block.
    Settled,
}

/// Rejected settlement status transitions.
#[derive(Error, Debug)]
#[error("record {record_id}: invalid status transition from {from:?} to {to:?}")]
pub struct StatusTransitionError {
    /// The record whose transition was rejected.
    pub record_id: RecordId,
    /// Status at the time of the attempt.
    pub from: SettlementStatus,
    /// The attempted target status.
    pub to: SettlementStatus,
}

/// A billing/charging event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BceRecord {
    /// Operator-assigned identifier, unique per node.
    pub record_id: RecordId,
    /// Subscriber identity, audit-only.
    pub imsi: Imsi,
    /// The operator whose subscriber roamed.
    pub home_operator: OperatorId,
    /// The operator whose network served the roaming subscriber.
    pub visited_operator: OperatorId,
    /// Usage quantities.
    pub usage: UsageMetrics,
    /// Wholesale rates applied.
    pub rates: RateCard,
    /// Declared wholesale charge in minor units.
    pub wholesale_charge_cents: u64,
    /// Currency of the charge.
    pub currency: CurrencyCode,
    /// When the usage occurred.
    pub occurred_at: Timestamp,
    /// Settlement lifecycle state, managed by the ledger.
    pub status: SettlementStatus,
    /// Height of the block that settled this record, once settled.
    pub settled_in_height: Option<u64>,
    /// Reference to the aggregate proof covering this record, once settled.
    pub proof_ref: Option<String>,
}

impl BceRecord {
    /// The bilateral pair this record belongs to.
    ///
    /// Home and visited operators are validated distinct at ingestion, so
    /// this cannot fail for a record the ledger accepted.
    pub fn pair(&self) -> Option<OperatorPair> {
        OperatorPair::new(self.home_operator.clone(), self.visited_operator.clone()).ok()
    }

    /// Move the record into an in-flight settlement proposal.
    pub fn mark_in_settlement(&mut self) -> Result<(), StatusTransitionError> {
        match self.status {
            SettlementStatus::Pending => {
                self.status = SettlementStatus::InSettlement;
                Ok(())
            }
            from => Err(self.transition_error(from, SettlementStatus::InSettlement)),
        }
    }

    /// Finalize the record as settled by the block at `height`.
    pub fn mark_settled(
        &mut self,
        height: u64,
        proof_ref: String,
    ) -> Result<(), StatusTransitionError> {
        match self.status {
            SettlementStatus::InSettlement => {
                self.status = SettlementStatus::Settled;
                self.settled_in_height = Some(height);
                self.proof_ref = Some(proof_ref);
                Ok(())
            }
            from => Err(self.transition_error(from, SettlementStatus::Settled)),
        }
    }

    /// Return the record to the pending pool after an aborted proposal.
    pub fn release_to_pending(&mut self) -> Result<(), StatusTransitionError> {
        match self.status {
            SettlementStatus::InSettlement => {
                self.status = SettlementStatus::Pending;
                Ok(())
            }
            from => Err(self.transition_error(from, SettlementStatus::Pending)),
        }
    }

    fn transition_error(
        &self,
        from: SettlementStatus,
        to: SettlementStatus,
    ) -> StatusTransitionError {
        StatusTransitionError {
            record_id: self.record_id.clone(),
            from,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> BceRecord {
        BceRecord {
            record_id: RecordId::new("bce-001").unwrap(),
            imsi: Imsi::new("262011234567890").unwrap(),
            home_operator: OperatorId::new("vodafone-uk").unwrap(),
            visited_operator: OperatorId::new("tmobile-de").unwrap(),
            usage: UsageMetrics {
                call_minutes: 120,
                data_mb: 500,
                sms_count: 10,
            },
            rates: RateCard {
                call_rate_cents: 25,
                data_rate_cents: 8,
                sms_rate_cents: 12,
            },
            wholesale_charge_cents: 7120,
            currency: CurrencyCode::new("EUR").unwrap(),
            occurred_at: Timestamp::parse("2026-01-15T12:00:00Z").unwrap(),
            status: SettlementStatus::Pending,
            settled_in_height: None,
            proof_ref: None,
        }
    }

    #[test]
    fn rate_card_charge_computation() {
        let r = sample_record();
        // 120*25 + 500*8 + 10*12 = 3000 + 4000 + 120
        assert_eq!(r.rates.charge_for(&r.usage), Some(7120));
    }

    #[test]
    fn rate_card_overflow_is_none() {
        let rates = RateCard {
            call_rate_cents: u64::MAX,
            data_rate_cents: 0,
            sms_rate_cents: 0,
        };
        let usage = UsageMetrics {
            call_minutes: 2,
            data_mb: 0,
            sms_count: 0,
        };
        assert_eq!(rates.charge_for(&usage), None);
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut r = sample_record();
        r.mark_in_settlement().unwrap();
        assert_eq!(r.status, SettlementStatus::InSettlement);
        r.mark_settled(7, "proof-abc".to_string()).unwrap();
        assert_eq!(r.status, SettlementStatus::Settled);
        assert_eq!(r.settled_in_height, Some(7));
        assert_eq!(r.proof_ref.as_deref(), Some("proof-abc"));
    }

    #[test]
    fn lifecycle_abort_path() {
        let mut r = sample_record();
        r.mark_in_settlement().unwrap();
        r.release_to_pending().unwrap();
        assert_eq!(r.status, SettlementStatus::Pending);
        assert_eq!(r.settled_in_height, None);
    }

    #[test]
    fn settle_requires_in_settlement() {
        let mut r = sample_record();
        let err = r.mark_settled(1, "p".to_string()).unwrap_err();
        assert_eq!(err.from, SettlementStatus::Pending);
    }

    #[test]
    fn double_capture_rejected() {
        let mut r = sample_record();
        r.mark_in_settlement().unwrap();
        assert!(r.mark_in_settlement().is_err());
    }

    #[test]
    fn pair_is_normalized() {
        let r = sample_record();
        let pair = r.pair().unwrap();
        assert_eq!(pair.first().as_str(), "tmobile-de");
        assert_eq!(pair.second().as_str(), "vodafone-uk");
    }
}
