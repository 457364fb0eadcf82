#![deny(missing_docs)]

//! # rsn-netting — Multilateral Netting Engine
//!
//! Compresses the bilateral roaming debts that are due for settlement into
//! net positions per operator and a minimal transfer plan.
//!
//! ## Design
//!
//! The engine operates over a set of [`BilateralDebt`]s, each the net amount
//! one operator owes another at the moment a settlement round starts. It
//! computes:
//!
//! 1. **Net positions** — inbound offset against outbound per operator.
//!    Positive means net receiver, negative means net payer. Positions
//!    always sum to exactly zero.
//! 2. **Transfers** — a greedy payer/receiver matching producing at most
//!    N-1 payments for N involved operators.
//!
//! ## Determinism
//!
//! All computations use BTreeMap/BTreeSet ordering over operator
//! identifiers, so every validator that nets the same debt set produces
//! byte-identical output. This is what makes independent recomputation of a
//! proposed settlement block meaningful.
//!
//! All amounts are integer minor units of the zone's single settlement
//! currency. There is no floating point anywhere in this crate.

pub mod engine;

pub use engine::{BilateralDebt, NettingEngine, NettingError, NettingOutcome, SettlementTransfer};
