//! # Bilateral Ledger Reads
//!
//! - `GET /v1/ledger/pairs` — every bilateral entry the node tracks.
//! - `GET /v1/ledger/pairs/:a/:b` — one pair, order-insensitive.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use rsn_core::{OperatorId, OperatorPair};
use rsn_ledger::{BilateralLedgerEntry, TriggerState};

use crate::error::AppError;
use crate::state::AppState;

/// Build the ledger router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/ledger/pairs", get(list_pairs))
        .route("/v1/ledger/pairs/:a/:b", get(get_pair))
}

/// One bilateral entry as reported by the API.
#[derive(Debug, Serialize)]
pub struct PairView {
    /// Lexicographically smaller operator of the pair.
    pub first: String,
    /// Lexicographically larger operator of the pair.
    pub second: String,
    /// Signed net in minor units relative to the pair ordering.
    pub net_cents: i64,
    /// The owing operator, absent when the pair is square.
    pub debtor: Option<String>,
    /// The owed operator, absent when the pair is square.
    pub creditor: Option<String>,
    /// Debt magnitude in minor units.
    pub amount_cents: u64,
    /// Threshold trigger state.
    pub trigger: TriggerState,
    /// Records not yet settled for this pair.
    pub unsettled_records: usize,
    /// Height of the last block that settled this pair.
    pub last_settlement_height: Option<u64>,
}

impl From<BilateralLedgerEntry> for PairView {
    fn from(entry: BilateralLedgerEntry) -> Self {
        Self {
            first: entry.pair.first().as_str().to_string(),
            second: entry.pair.second().as_str().to_string(),
            net_cents: entry.net_cents,
            debtor: entry.debtor().map(|op| op.as_str().to_string()),
            creditor: entry.creditor().map(|op| op.as_str().to_string()),
            amount_cents: entry.net_abs_cents(),
            trigger: entry.trigger,
            unsettled_records: entry.unsettled_record_ids.len(),
            last_settlement_height: entry.last_settlement_height,
        }
    }
}

/// Pair listing response.
#[derive(Debug, Serialize)]
pub struct PairListResponse {
    /// Number of tracked pairs.
    pub count: usize,
    /// The entries.
    pub pairs: Vec<PairView>,
}

/// GET /v1/ledger/pairs
async fn list_pairs(State(state): State<AppState>) -> Result<Json<PairListResponse>, AppError> {
    let pairs: Vec<PairView> = state
        .ledger
        .entries()?
        .into_iter()
        .map(PairView::from)
        .collect();
    Ok(Json(PairListResponse {
        count: pairs.len(),
        pairs,
    }))
}

/// GET /v1/ledger/pairs/:a/:b
async fn get_pair(
    State(state): State<AppState>,
    Path((a, b)): Path<(String, String)>,
) -> Result<Json<PairView>, AppError> {
    let pair = OperatorPair::new(OperatorId::new(a)?, OperatorId::new(b)?)?;
    state
        .ledger
        .entry(&pair)?
        .map(|entry| Json(PairView::from(entry)))
        .ok_or_else(|| AppError::NotFound(format!("no ledger entry for pair {pair}")))
}
