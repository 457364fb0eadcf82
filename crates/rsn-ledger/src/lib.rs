#![deny(missing_docs)]

//! # rsn-ledger — Bilateral Debt Ledger
//!
//! Every node keeps a private ledger of the billing records it ingested and
//! the bilateral debts those records accumulate. Records never leave the
//! node; the ledger's job is to turn them into per-pair net debts, notice
//! when a debt crosses the settlement threshold, and hand consistent
//! snapshots to the settlement machinery.
//!
//! ## Layers
//!
//! - [`store`] — the pluggable persistence boundary ([`LedgerStore`]) with
//!   in-memory and JSON-file implementations.
//! - [`validator`] — pure admission checks for incoming records.
//! - [`entry`] — the per-pair net debt entry and its trigger state.
//! - [`threshold`] — threshold crossing detection.
//! - [`ledger`] — [`LocalLedger`], the transactional composition of the
//!   above.
//!
//! ## Concurrency
//!
//! Ingestion for different operator pairs proceeds in parallel; ingestion
//! for the same pair is serialized so the debt update and the threshold
//! check are a single critical section. Settlement-wide operations
//! (snapshotting due debts, applying a committed block) exclude all
//! ingestion. Locks are `parking_lot` and are never held across `.await`.

pub mod entry;
pub mod ledger;
pub mod store;
pub mod threshold;
pub mod validator;

pub use entry::{BilateralLedgerEntry, TriggerState};
pub use ledger::{
    DueDebt, IngestOutcome, LedgerConfig, LedgerError, LocalLedger, SettlementCommit,
};
pub use store::{JsonFileStore, LedgerStore, MemoryStore, StoreError, WriteBatch};
pub use threshold::{SettlementTrigger, ThresholdMonitor};
pub use validator::{RecordRejection, RecordValidator};
