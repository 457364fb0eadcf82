//! # Record Admission Validation
//!
//! Pure checks a billing record must pass before it touches the ledger.
//! Format validity (identifier shapes, currency code syntax) is already
//! guaranteed by the `rsn-core` newtypes; the validator checks the
//! semantic rules that need zone context.

use thiserror::Error;

use rsn_core::{BceRecord, CurrencyCode};

/// Allowed gap between the declared wholesale charge and the charge
/// recomputed from usage and rates, in minor units. Absorbs bilateral
/// rounding conventions for partial usage units.
pub const CHARGE_TOLERANCE_CENTS: u64 = 50;

/// Reasons a record is refused admission.
///
/// Every variant maps to a stable machine-readable code surfaced at the
/// ingestion boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    /// Home and visited operator are the same network.
    #[error("home and visited operator are both \"{0}\"; roaming requires distinct networks")]
    SelfRoaming(String),

    /// The record is denominated in a currency the zone does not settle.
    #[error("currency mismatch: zone settles {expected}, record is {got}")]
    CurrencyMismatch {
        /// The zone's settlement currency.
        expected: CurrencyCode,
        /// The record's currency.
        got: CurrencyCode,
    },

    /// Declared charge disagrees with usage times rates beyond tolerance.
    #[error("charge mismatch: usage and rates give {computed_cents} cents, record declares {declared_cents} cents")]
    ChargeMismatch {
        /// The charge recomputed from usage and rates.
        computed_cents: u64,
        /// The charge the record declares.
        declared_cents: u64,
    },

    /// Usage times rates overflows the amount range.
    #[error("charge computation overflows: usage and rates exceed the representable amount range")]
    ChargeOverflow,

    /// The record carries no charge to settle.
    #[error("wholesale charge is zero; nothing to settle")]
    ZeroCharge,
}

impl RecordRejection {
    /// Stable machine-readable rejection code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfRoaming(_) => "SELF_ROAMING",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::ChargeMismatch { .. } => "CHARGE_MISMATCH",
            Self::ChargeOverflow => "CHARGE_OVERFLOW",
            Self::ZeroCharge => "ZERO_CHARGE",
        }
    }
}

/// Stateless record validator for one settlement zone.
#[derive(Debug, Clone)]
pub struct RecordValidator {
    currency: CurrencyCode,
}

impl RecordValidator {
    /// Create a validator for the zone's settlement currency.
    pub fn new(currency: CurrencyCode) -> Self {
        Self { currency }
    }

    /// Check a record against the zone's admission rules.
    ///
    /// Duplicate detection is not here: it needs ledger state and is
    /// handled transactionally by the ledger itself.
    pub fn validate(&self, record: &BceRecord) -> Result<(), RecordRejection> {
        if record.home_operator == record.visited_operator {
            return Err(RecordRejection::SelfRoaming(
                record.home_operator.as_str().to_string(),
            ));
        }

        if record.currency != self.currency {
            return Err(RecordRejection::CurrencyMismatch {
                expected: self.currency.clone(),
                got: record.currency.clone(),
            });
        }

        if record.wholesale_charge_cents == 0 {
            return Err(RecordRejection::ZeroCharge);
        }

        let computed = record
            .rates
            .charge_for(&record.usage)
            .ok_or(RecordRejection::ChargeOverflow)?;
        if computed.abs_diff(record.wholesale_charge_cents) > CHARGE_TOLERANCE_CENTS {
            return Err(RecordRejection::ChargeMismatch {
                computed_cents: computed,
                declared_cents: record.wholesale_charge_cents,
            });
        }

        Ok(())
    }
}
