//! # Netting Engine
//!
//! Netting runs once per settlement round, over the snapshot of bilateral
//! debts whose thresholds have fired. Debts below threshold stay in the
//! ledger and carry forward to a later round.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rsn_core::OperatorId;

/// Errors from netting operations.
#[derive(Error, Debug)]
pub enum NettingError {
    /// No debts to net.
    #[error("no debts provided")]
    EmptyDebtSet,

    /// Debt amount is non-positive.
    #[error("debt amount must be positive: got {amount_cents} for {debtor} -> {creditor}")]
    NonPositiveDebt {
        /// The owing operator.
        debtor: OperatorId,
        /// The owed operator.
        creditor: OperatorId,
        /// The invalid amount.
        amount_cents: i64,
    },

    /// Debtor and creditor are the same operator.
    #[error("operator \"{0}\" cannot owe itself")]
    SelfDebt(OperatorId),

    /// A second debt was added for a pair already present.
    ///
    /// The ledger nets each pair to a single directed amount before the
    /// snapshot, so a repeated pair means the caller double-collected.
    #[error("duplicate debt for pair {debtor} -> {creditor}")]
    DuplicateDebt {
        /// The owing operator.
        debtor: OperatorId,
        /// The owed operator.
        creditor: OperatorId,
    },

    /// Arithmetic overflow during position computation.
    #[error("arithmetic overflow computing net positions — debt amounts exceed i64 range")]
    ArithmeticOverflow,
}

/// A directed bilateral debt due for settlement.
///
/// `debtor` owes `amount_cents` minor units to `creditor`. By the time a
/// debt reaches the engine it is already net per pair, so at most one entry
/// exists per unordered operator pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilateralDebt {
    /// The operator that owes.
    pub debtor: OperatorId,
    /// The operator that is owed.
    pub creditor: OperatorId,
    /// Amount in minor units of the settlement currency.
    pub amount_cents: i64,
}

/// A single payment in the netted settlement plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTransfer {
    /// Paying operator.
    pub from: OperatorId,
    /// Receiving operator.
    pub to: OperatorId,
    /// Amount in minor units.
    pub amount_cents: i64,
}

/// The result of netting one settlement round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettingOutcome {
    /// Net position per operator. Positive = net receiver, negative = net
    /// payer. Values sum to exactly zero.
    pub net_positions: BTreeMap<OperatorId, i64>,
    /// Minimal payment set realizing the net positions.
    pub transfers: Vec<SettlementTransfer>,
    /// Sum of all input debt amounts.
    pub gross_cents: i64,
    /// Sum of all transfer amounts.
    pub net_cents: i64,
}

impl NettingOutcome {
    /// Netting efficiency in basis points: 10000 means everything cancelled.
    ///
    /// Integer arithmetic only; reporting convenience, never settled on.
    pub fn reduction_bps(&self) -> u32 {
        if self.gross_cents <= 0 {
            return 0;
        }
        let saved = self.gross_cents.saturating_sub(self.net_cents).max(0) as u128;
        ((saved * 10_000) / self.gross_cents as u128) as u32
    }
}

/// The multilateral netting engine.
///
/// ## Determinism
///
/// All internal state is BTree-ordered by operator identifier. Two runs with
/// the same debt set produce byte-identical output regardless of insertion
/// order.
///
/// ## Duplicate Detection
///
/// Debts are keyed by (debtor, creditor); adding a second debt for a pair
/// already present returns [`NettingError::DuplicateDebt`] to prevent
/// double-settlement.
#[derive(Debug, Default)]
pub struct NettingEngine {
    debts: BTreeMap<(OperatorId, OperatorId), i64>,
}

impl NettingEngine {
    /// Create a new empty netting engine.
    pub fn new() -> Self {
        Self {
            debts: BTreeMap::new(),
        }
    }

    /// Add a due debt to the netting set.
    pub fn add_debt(&mut self, debt: BilateralDebt) -> Result<(), NettingError> {
        if debt.amount_cents <= 0 {
            return Err(NettingError::NonPositiveDebt {
                debtor: debt.debtor,
                creditor: debt.creditor,
                amount_cents: debt.amount_cents,
            });
        }
        if debt.debtor == debt.creditor {
            return Err(NettingError::SelfDebt(debt.debtor));
        }
        let key = (debt.debtor.clone(), debt.creditor.clone());
        if self.debts.contains_key(&key) {
            return Err(NettingError::DuplicateDebt {
                debtor: debt.debtor,
                creditor: debt.creditor,
            });
        }
        self.debts.insert(key, debt.amount_cents);
        Ok(())
    }

    /// Return the number of debts in the set.
    pub fn debt_count(&self) -> usize {
        self.debts.len()
    }

    /// Compute net positions: inbound offset against outbound per operator.
    ///
    /// Operators whose position nets to exactly zero still appear in the
    /// map; the block records every operator the round touched.
    pub fn compute_net_positions(
        &self,
    ) -> Result<BTreeMap<OperatorId, i64>, NettingError> {
        let mut positions: BTreeMap<OperatorId, i64> = BTreeMap::new();
        for ((debtor, creditor), amount) in &self.debts {
            let out = positions.entry(debtor.clone()).or_insert(0);
            *out = out
                .checked_sub(*amount)
                .ok_or(NettingError::ArithmeticOverflow)?;
            let inn = positions.entry(creditor.clone()).or_insert(0);
            *inn = inn
                .checked_add(*amount)
                .ok_or(NettingError::ArithmeticOverflow)?;
        }
        Ok(positions)
    }

    /// Generate transfers by matching payers and receivers.
    ///
    /// Payers (net < 0) and receivers (net > 0) are walked in sorted
    /// operator order. An exact-magnitude pass runs first: a payer whose
    /// open amount equals a receiver's retires both sides with one
    /// transfer, so disjoint debtor/creditor pairs never fragment across
    /// unrelated operators. The remainder is matched greedily, taking the
    /// smaller of the two open amounts each step; every step retires at
    /// least one side, so the plan has at most N-1 transfers for N
    /// operators with nonzero positions.
    fn generate_transfers(net_positions: &BTreeMap<OperatorId, i64>) -> Vec<SettlementTransfer> {
        let mut payers: Vec<(OperatorId, i64)> = Vec::new();
        let mut receivers: Vec<(OperatorId, i64)> = Vec::new();

        // BTreeMap iteration is already sorted by operator id.
        for (op, net) in net_positions {
            if *net < 0 {
                payers.push((op.clone(), -net));
            } else if *net > 0 {
                receivers.push((op.clone(), *net));
            }
        }

        let mut transfers = Vec::new();

        // Exact matches first, each payer to the first equal receiver in
        // sorted order so the plan stays deterministic.
        let mut matched = vec![false; receivers.len()];
        for (payer, open) in payers.iter_mut() {
            if let Some(i) =
                (0..receivers.len()).find(|&i| !matched[i] && receivers[i].1 == *open)
            {
                transfers.push(SettlementTransfer {
                    from: payer.clone(),
                    to: receivers[i].0.clone(),
                    amount_cents: *open,
                });
                matched[i] = true;
                *open = 0;
            }
        }
        payers.retain(|(_, open)| *open > 0);
        let mut receivers: Vec<(OperatorId, i64)> = receivers
            .into_iter()
            .zip(matched)
            .filter(|(_, used)| !*used)
            .map(|(r, _)| r)
            .collect();

        let mut pi = 0;
        let mut ri = 0;

        while pi < payers.len() && ri < receivers.len() {
            let amount = payers[pi].1.min(receivers[ri].1);
            if amount > 0 {
                transfers.push(SettlementTransfer {
                    from: payers[pi].0.clone(),
                    to: receivers[ri].0.clone(),
                    amount_cents: amount,
                });
            }

            payers[pi].1 -= amount;
            receivers[ri].1 -= amount;

            if payers[pi].1 == 0 {
                pi += 1;
            }
            if ri < receivers.len() && receivers[ri].1 == 0 {
                ri += 1;
            }
        }

        transfers
    }

    /// Compute the complete netting outcome for the round.
    pub fn compute(&self) -> Result<NettingOutcome, NettingError> {
        if self.debts.is_empty() {
            return Err(NettingError::EmptyDebtSet);
        }

        let net_positions = self.compute_net_positions()?;
        let transfers = Self::generate_transfers(&net_positions);

        let gross_cents = self
            .debts
            .values()
            .try_fold(0i64, |acc, a| acc.checked_add(*a))
            .ok_or(NettingError::ArithmeticOverflow)?;
        let net_cents = transfers
            .iter()
            .try_fold(0i64, |acc, t| acc.checked_add(t.amount_cents))
            .ok_or(NettingError::ArithmeticOverflow)?;

        Ok(NettingOutcome {
            net_positions,
            transfers,
            gross_cents,
            net_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(s: &str) -> OperatorId {
        OperatorId::new(s).unwrap()
    }

    fn debt(from: &str, to: &str, amount: i64) -> BilateralDebt {
        BilateralDebt {
            debtor: op(from),
            creditor: op(to),
            amount_cents: amount,
        }
    }

    #[test]
    fn single_debt_passes_through() {
        let mut engine = NettingEngine::new();
        engine.add_debt(debt("op-x", "op-y", 14_462)).unwrap();

        let outcome = engine.compute().unwrap();
        assert_eq!(outcome.net_positions[&op("op-x")], -14_462);
        assert_eq!(outcome.net_positions[&op("op-y")], 14_462);
        assert_eq!(outcome.transfers.len(), 1);
        assert_eq!(outcome.transfers[0].amount_cents, 14_462);
        assert_eq!(outcome.gross_cents, 14_462);
        assert_eq!(outcome.net_cents, 14_462);
        assert_eq!(outcome.reduction_bps(), 0);
    }

    #[test]
    fn circular_debts_compress() {
        let mut engine = NettingEngine::new();
        // a -> b 100, b -> c 80, c -> a 60
        engine.add_debt(debt("op-a", "op-b", 100)).unwrap();
        engine.add_debt(debt("op-b", "op-c", 80)).unwrap();
        engine.add_debt(debt("op-c", "op-a", 60)).unwrap();

        let outcome = engine.compute().unwrap();
        assert_eq!(outcome.net_positions[&op("op-a")], -40);
        assert_eq!(outcome.net_positions[&op("op-b")], 20);
        assert_eq!(outcome.net_positions[&op("op-c")], 20);
        assert_eq!(outcome.gross_cents, 240);
        assert_eq!(outcome.net_cents, 40);
        assert!(outcome.reduction_bps() > 8_000);
    }

    #[test]
    fn positions_sum_to_zero() {
        let mut engine = NettingEngine::new();
        engine.add_debt(debt("op-a", "op-b", 1_000)).unwrap();
        engine.add_debt(debt("op-b", "op-c", 800)).unwrap();
        engine.add_debt(debt("op-c", "op-d", 600)).unwrap();
        engine.add_debt(debt("op-d", "op-a", 400)).unwrap();

        let outcome = engine.compute().unwrap();
        let sum: i64 = outcome.net_positions.values().sum();
        assert_eq!(sum, 0);
    }

    #[test]
    fn transfer_count_bounded_by_operators_minus_one() {
        let mut engine = NettingEngine::new();
        engine.add_debt(debt("op-a", "op-e", 500)).unwrap();
        engine.add_debt(debt("op-b", "op-e", 400)).unwrap();
        engine.add_debt(debt("op-c", "op-e", 300)).unwrap();
        engine.add_debt(debt("op-d", "op-e", 200)).unwrap();

        let outcome = engine.compute().unwrap();
        let nonzero = outcome.net_positions.values().filter(|v| **v != 0).count();
        assert!(outcome.transfers.len() <= nonzero.saturating_sub(1).max(1));
    }

    #[test]
    fn disjoint_pairs_settle_pairwise() {
        let mut engine = NettingEngine::new();
        // Two debts over four operators that share nobody.
        engine.add_debt(debt("op-c", "op-b", 1)).unwrap();
        engine.add_debt(debt("op-d", "op-a", 2)).unwrap();

        let outcome = engine.compute().unwrap();
        // Exact matching keeps the plan at one transfer per debt instead
        // of splitting a payer across unrelated receivers.
        assert_eq!(outcome.transfers.len(), 2);
        assert_eq!(
            outcome.transfers[0],
            SettlementTransfer {
                from: op("op-c"),
                to: op("op-b"),
                amount_cents: 1,
            }
        );
        assert_eq!(
            outcome.transfers[1],
            SettlementTransfer {
                from: op("op-d"),
                to: op("op-a"),
                amount_cents: 2,
            }
        );
    }

    #[test]
    fn perfectly_offsetting_pair_produces_no_transfers() {
        let mut engine = NettingEngine::new();
        engine.add_debt(debt("op-a", "op-b", 100)).unwrap();
        engine.add_debt(debt("op-b", "op-a", 100)).unwrap();

        let outcome = engine.compute().unwrap();
        assert!(outcome.transfers.is_empty());
        assert_eq!(outcome.net_cents, 0);
        assert_eq!(outcome.reduction_bps(), 10_000);
        // Both operators still appear, at zero.
        assert_eq!(outcome.net_positions[&op("op-a")], 0);
        assert_eq!(outcome.net_positions[&op("op-b")], 0);
    }

    #[test]
    fn empty_debt_set_rejected() {
        let engine = NettingEngine::new();
        assert!(matches!(engine.compute(), Err(NettingError::EmptyDebtSet)));
    }

    #[test]
    fn non_positive_amounts_rejected() {
        let mut engine = NettingEngine::new();
        assert!(matches!(
            engine.add_debt(debt("op-a", "op-b", 0)),
            Err(NettingError::NonPositiveDebt { .. })
        ));
        assert!(matches!(
            engine.add_debt(debt("op-a", "op-b", -5)),
            Err(NettingError::NonPositiveDebt { .. })
        ));
    }

    #[test]
    fn self_debt_rejected() {
        let mut engine = NettingEngine::new();
        assert!(matches!(
            engine.add_debt(debt("op-a", "op-a", 10)),
            Err(NettingError::SelfDebt(_))
        ));
    }

    #[test]
    fn duplicate_pair_rejected() {
        let mut engine = NettingEngine::new();
        engine.add_debt(debt("op-a", "op-b", 100)).unwrap();
        assert!(matches!(
            engine.add_debt(debt("op-a", "op-b", 50)),
            Err(NettingError::DuplicateDebt { .. })
        ));
        // Opposite direction is a distinct key.
        engine.add_debt(debt("op-b", "op-a", 30)).unwrap();
        assert_eq!(engine.debt_count(), 2);
    }

    #[test]
    fn overflow_detected() {
        let mut engine = NettingEngine::new();
        engine.add_debt(debt("op-a", "op-b", i64::MAX)).unwrap();
        engine.add_debt(debt("op-c", "op-b", i64::MAX)).unwrap();
        assert!(matches!(
            engine.compute(),
            Err(NettingError::ArithmeticOverflow)
        ));
    }

    #[test]
    fn deterministic_regardless_of_insertion_order() {
        let forward = {
            let mut e = NettingEngine::new();
            e.add_debt(debt("op-a", "op-b", 100)).unwrap();
            e.add_debt(debt("op-b", "op-c", 200)).unwrap();
            e.add_debt(debt("op-c", "op-a", 300)).unwrap();
            e.compute().unwrap()
        };
        let reverse = {
            let mut e = NettingEngine::new();
            e.add_debt(debt("op-c", "op-a", 300)).unwrap();
            e.add_debt(debt("op-b", "op-c", 200)).unwrap();
            e.add_debt(debt("op-a", "op-b", 100)).unwrap();
            e.compute().unwrap()
        };
        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&reverse).unwrap()
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const OPS: [&str; 6] = ["op-a", "op-b", "op-c", "op-d", "op-e", "op-f"];

        fn arbitrary_debts() -> impl Strategy<Value = Vec<(usize, usize, i64)>> {
            proptest::collection::vec(
                (0usize..OPS.len(), 0usize..OPS.len(), 1i64..1_000_000),
                1..15,
            )
        }

        proptest! {
            #[test]
            fn net_positions_always_sum_to_zero(raw in arbitrary_debts()) {
                let mut engine = NettingEngine::new();
                for (f, t, amount) in raw {
                    if f == t {
                        continue;
                    }
                    // Duplicate pairs are rejected; skip them.
                    let _ = engine.add_debt(debt(OPS[f], OPS[t], amount));
                }
                if engine.debt_count() == 0 {
                    return Ok(());
                }
                let outcome = engine.compute().unwrap();
                let sum: i64 = outcome.net_positions.values().sum();
                prop_assert_eq!(sum, 0);
            }

            #[test]
            fn transfers_realize_net_positions(raw in arbitrary_debts()) {
                let mut engine = NettingEngine::new();
                for (f, t, amount) in raw {
                    if f == t {
                        continue;
                    }
                    let _ = engine.add_debt(debt(OPS[f], OPS[t], amount));
                }
                if engine.debt_count() == 0 {
                    return Ok(());
                }
                let outcome = engine.compute().unwrap();

                // Replaying the transfers against the net positions must
                // zero every operator's balance.
                let mut balance = outcome.net_positions.clone();
                for t in &outcome.transfers {
                    *balance.get_mut(&t.from).unwrap() += t.amount_cents;
                    *balance.get_mut(&t.to).unwrap() -= t.amount_cents;
                }
                for (_, v) in balance {
                    prop_assert_eq!(v, 0);
                }
            }

            #[test]
            fn net_never_exceeds_gross(raw in arbitrary_debts()) {
                let mut engine = NettingEngine::new();
                for (f, t, amount) in raw {
                    if f == t {
                        continue;
                    }
                    let _ = engine.add_debt(debt(OPS[f], OPS[t], amount));
                }
                if engine.debt_count() == 0 {
                    return Ok(());
                }
                let outcome = engine.compute().unwrap();
                prop_assert!(outcome.net_cents <= outcome.gross_cents);
                // Positions sum to zero, so either none are nonzero or at
                // least two are; the plan never needs more than nonzero - 1.
                let nonzero = outcome.net_positions.values().filter(|v| **v != 0).count();
                prop_assert!(outcome.transfers.len() <= nonzero.saturating_sub(1));

                // Disjoint debts settle pairwise through exact matching, so
                // the plan also never exceeds one transfer per input debt
                // when every debt touches its own pair of operators.
                let mut seen = std::collections::BTreeSet::new();
                let disjoint = engine
                    .debts
                    .keys()
                    .all(|(d, c)| seen.insert(d.clone()) && seen.insert(c.clone()));
                if disjoint {
                    prop_assert!(outcome.transfers.len() <= engine.debt_count());
                }
            }
        }
    }
}
