//! # Aggregate Charge Statement
//!
//! The statement a settlement block's proof attests to: "the published net
//! positions are the correct netting of a set of valid billing records whose
//! identifiers hash to the published commitment."
//!
//! Public inputs are exactly what a block already discloses. The witness is
//! the private debt set, which never leaves the proposing node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rsn_core::{CanonicalBytes, CanonicalizationError, ContentDigest, CurrencyCode, OperatorId};

/// Public inputs of an aggregate charge proof.
///
/// Everything here appears in the settlement block in the clear; the proof
/// binds these fields together without revealing the records behind them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatement {
    /// Height of the settlement block the proof belongs to.
    pub height: u64,
    /// Settlement currency of the zone.
    pub currency: CurrencyCode,
    /// Net position per operator, minor units. Must sum to zero.
    pub net_positions: BTreeMap<OperatorId, i64>,
    /// Digest of the sorted record identifier set covered by the round.
    pub record_set_digest: ContentDigest,
}

impl AggregateStatement {
    /// Canonical bytes of the statement, the verification input.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }
}

/// One private debt in the witness: `debtor` owes `creditor` the net of the
/// wholesale charges on their unsettled records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtWitness {
    /// The owing operator.
    pub debtor: OperatorId,
    /// The owed operator.
    pub creditor: OperatorId,
    /// Amount in minor units.
    pub amount_cents: i64,
}

/// Circuit tying the public statement to the private debt set.
///
/// Constraints (enforced structurally by the mock backend, arithmetically
/// by real backends):
///
/// 1. Every witness debt amount is positive.
/// 2. The witness debts net to exactly the public `net_positions`.
/// 3. The public net positions sum to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateChargeCircuit {
    /// Public inputs, disclosed in the block.
    pub statement: AggregateStatement,
    /// Private witness, known only to the proposer.
    pub debts: Vec<DebtWitness>,
}

impl AggregateChargeCircuit {
    /// Check the circuit constraints, returning a description of the first
    /// violation found.
    pub fn check_constraints(&self) -> Result<(), String> {
        let mut computed: BTreeMap<OperatorId, i64> = BTreeMap::new();
        for debt in &self.debts {
            if debt.amount_cents <= 0 {
                return Err(format!(
                    "witness debt {} -> {} has non-positive amount {}",
                    debt.debtor, debt.creditor, debt.amount_cents
                ));
            }
            if debt.debtor == debt.creditor {
                return Err(format!("witness debt from {} to itself", debt.debtor));
            }
            let out = computed.entry(debt.debtor.clone()).or_insert(0);
            *out = out
                .checked_sub(debt.amount_cents)
                .ok_or_else(|| "witness arithmetic overflow".to_string())?;
            let inn = computed.entry(debt.creditor.clone()).or_insert(0);
            *inn = inn
                .checked_add(debt.amount_cents)
                .ok_or_else(|| "witness arithmetic overflow".to_string())?;
        }

        if computed != self.statement.net_positions {
            return Err("witness debts do not net to the stated positions".to_string());
        }

        let sum: i64 = self.statement.net_positions.values().sum();
        if sum != 0 {
            return Err(format!("net positions sum to {sum}, expected 0"));
        }

        Ok(())
    }
}
