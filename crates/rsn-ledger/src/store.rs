//! # Storage Boundary
//!
//! [`LedgerStore`] abstracts persistence over three logical collections:
//! billing records, bilateral ledger entries, and committed settlement
//! blocks. Blocks are stored as raw JSON documents; the consensus layer
//! owns their schema and the store stays ignorant of it.
//!
//! ## Atomicity
//!
//! Multi-key updates go through [`WriteBatch`] and [`LedgerStore::apply`].
//! A batch commits entirely or not at all — a record must never become
//! visible without the debt entry that accounts for it.
//!
//! ## Implementations
//!
//! - [`MemoryStore`] — `parking_lot`-guarded BTree maps; tests and default
//!   deployments.
//! - [`JsonFileStore`] — `MemoryStore` semantics plus a whole-state JSON
//!   snapshot written with the temp-file-and-rename pattern after every
//!   batch. Reloaded at node start.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rsn_core::{BceRecord, OperatorPair, RecordId};

use crate::entry::BilateralLedgerEntry;

/// Errors from the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization or deserialization failure.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A block was written at a height that already exists.
    #[error("block at height {0} already stored")]
    BlockExists(u64),
}

/// A multi-key write that commits atomically.
#[derive(Debug, Default)]
pub struct WriteBatch {
    /// Records to insert or overwrite.
    pub records: Vec<BceRecord>,
    /// Entries to insert or overwrite.
    pub entries: Vec<BilateralLedgerEntry>,
    /// Blocks to append, keyed by height.
    pub blocks: Vec<(u64, serde_json::Value)>,
}

impl WriteBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch carries no writes.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.entries.is_empty() && self.blocks.is_empty()
    }
}

/// The pluggable persistence boundary of a settlement node.
///
/// Implementations must be `Send + Sync`; the ledger serializes logically
/// conflicting calls above this trait, so implementations only need
/// per-call consistency.
pub trait LedgerStore: Send + Sync {
    /// Fetch a record by identifier.
    fn record(&self, id: &RecordId) -> Result<Option<BceRecord>, StoreError>;

    /// All records, ordered by identifier.
    fn records(&self) -> Result<Vec<BceRecord>, StoreError>;

    /// Fetch the ledger entry for a pair.
    fn entry(&self, pair: &OperatorPair) -> Result<Option<BilateralLedgerEntry>, StoreError>;

    /// All ledger entries, ordered by pair.
    fn entries(&self) -> Result<Vec<BilateralLedgerEntry>, StoreError>;

    /// Fetch a stored block document by height.
    fn block(&self, height: u64) -> Result<Option<serde_json::Value>, StoreError>;

    /// All stored block documents in height order.
    fn blocks(&self) -> Result<Vec<serde_json::Value>, StoreError>;

    /// Apply a batch atomically.
    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    records: BTreeMap<RecordId, BceRecord>,
    entries: Vec<BilateralLedgerEntry>,
    blocks: BTreeMap<u64, serde_json::Value>,
}

impl StoreState {
    fn entry_map(&self) -> BTreeMap<OperatorPair, BilateralLedgerEntry> {
        self.entries
            .iter()
            .map(|e| (e.pair.clone(), e.clone()))
            .collect()
    }
}

/// In-memory store over `parking_lot`-guarded BTree maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordId, BceRecord>>,
    entries: RwLock<BTreeMap<OperatorPair, BilateralLedgerEntry>>,
    blocks: RwLock<BTreeMap<u64, serde_json::Value>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn record(&self, id: &RecordId) -> Result<Option<BceRecord>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn records(&self) -> Result<Vec<BceRecord>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn entry(&self, pair: &OperatorPair) -> Result<Option<BilateralLedgerEntry>, StoreError> {
        Ok(self.entries.read().get(pair).cloned())
    }

    fn entries(&self) -> Result<Vec<BilateralLedgerEntry>, StoreError> {
        Ok(self.entries.read().values().cloned().collect())
    }

    fn block(&self, height: u64) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.blocks.read().get(&height).cloned())
    }

    fn blocks(&self) -> Result<Vec<serde_json::Value>, StoreError> {
        Ok(self.blocks.read().values().cloned().collect())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        // Take all three write guards before mutating anything so the batch
        // is momentarily exclusive and never partially visible.
        let mut records = self.records.write();
        let mut entries = self.entries.write();
        let mut blocks = self.blocks.write();

        for (height, _) in &batch.blocks {
            if blocks.contains_key(height) {
                return Err(StoreError::BlockExists(*height));
            }
        }

        for record in batch.records {
            records.insert(record.record_id.clone(), record);
        }
        for entry in batch.entries {
            entries.insert(entry.pair.clone(), entry);
        }
        for (height, block) in batch.blocks {
            blocks.insert(height, block);
        }
        Ok(())
    }
}

/// File-backed store: in-memory maps snapshotted to one JSON document.
///
/// Every applied batch rewrites the snapshot through a temp file in the
/// same directory followed by an atomic rename, so a crash leaves either
/// the old snapshot or the new one, never a torn file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_guard: parking_lot::Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading the existing snapshot if present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = MemoryStore::new();

        if path.exists() {
            let raw = std::fs::read(&path)?;
            let state: StoreState = serde_json::from_slice(&raw)?;
            let mut batch = WriteBatch::new();
            batch.records = state.records.values().cloned().collect();
            batch.entries = state.entry_map().into_values().collect();
            batch.blocks = state.blocks.clone().into_iter().collect();
            inner.apply(batch)?;
        }

        Ok(Self {
            path,
            inner,
            write_guard: parking_lot::Mutex::new(()),
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let state = StoreState {
            records: self.inner.records.read().clone(),
            entries: self.inner.entries.read().values().cloned().collect(),
            blocks: self.inner.blocks.read().clone(),
        };

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn record(&self, id: &RecordId) -> Result<Option<BceRecord>, StoreError> {
        self.inner.record(id)
    }

    fn records(&self) -> Result<Vec<BceRecord>, StoreError> {
        self.inner.records()
    }

    fn entry(&self, pair: &OperatorPair) -> Result<Option<BilateralLedgerEntry>, StoreError> {
        self.inner.entry(pair)
    }

    fn entries(&self) -> Result<Vec<BilateralLedgerEntry>, StoreError> {
        self.inner.entries()
    }

    fn block(&self, height: u64) -> Result<Option<serde_json::Value>, StoreError> {
        self.inner.block(height)
    }

    fn blocks(&self) -> Result<Vec<serde_json::Value>, StoreError> {
        self.inner.blocks()
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let _guard = self.write_guard.lock();

        // Capture prior values so a failed snapshot write can be undone;
        // the in-memory state must never outrun the file, or the next
        // successful batch would persist a write the caller saw fail.
        let mut prior_records = Vec::with_capacity(batch.records.len());
        for r in &batch.records {
            prior_records.push((r.record_id.clone(), self.inner.record(&r.record_id)?));
        }
        let mut prior_entries = Vec::with_capacity(batch.entries.len());
        for e in &batch.entries {
            prior_entries.push((e.pair.clone(), self.inner.entry(&e.pair)?));
        }
        let block_heights: Vec<u64> = batch.blocks.iter().map(|(h, _)| *h).collect();

        self.inner.apply(batch)?;

        if let Err(err) = self.persist() {
            let mut records = self.inner.records.write();
            for (id, prior) in prior_records {
                match prior {
                    Some(r) => records.insert(id, r),
                    None => records.remove(&id),
                };
            }
            let mut entries = self.inner.entries.write();
            for (pair, prior) in prior_entries {
                match prior {
                    Some(e) => entries.insert(pair, e),
                    None => entries.remove(&pair),
                };
            }
            // Duplicate heights never reach this point, so every batch
            // block was newly inserted.
            let mut blocks = self.inner.blocks.write();
            for height in block_heights {
                blocks.remove(&height);
            }
            return Err(err);
        }
        Ok(())
    }
}
