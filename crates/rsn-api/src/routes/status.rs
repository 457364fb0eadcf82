//! # Node Status
//!
//! `GET /v1/node/status` — a single diagnostic view of the node: chain
//! position, ledger pressure, and the open consensus round if any.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use rsn_core::SettlementStatus;
use rsn_ledger::TriggerState;

use crate::error::AppError;
use crate::state::AppState;

/// Build the status router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/node/status", get(node_status))
}

/// Node status response.
#[derive(Debug, Serialize)]
pub struct NodeStatus {
    /// This node's validator identity.
    pub node_id: String,
    /// Number of committed settlement blocks.
    pub chain_height: u64,
    /// Hash of the latest block, absent before the first commit.
    pub head_hash: Option<String>,
    /// Ledger pairs at or past the settlement threshold.
    pub due_pairs: usize,
    /// Records not yet settled by any block.
    pub pending_records: usize,
    /// Height of the consensus round in flight, if one is open.
    pub open_round_height: Option<u64>,
    /// Configured netting trigger threshold, minor units.
    pub threshold_cents: u64,
    /// When this node started.
    pub started_at: String,
}

/// GET /v1/node/status
async fn node_status(State(state): State<AppState>) -> Result<Json<NodeStatus>, AppError> {
    let head_hash = match state.chain.head()? {
        Some(block) => Some(
            block
                .block_hash()
                .map_err(|e| AppError::Internal(e.to_string()))?
                .to_hex(),
        ),
        None => None,
    };

    let due_pairs = state
        .ledger
        .entries()?
        .iter()
        .filter(|entry| !matches!(entry.trigger, TriggerState::Armed))
        .count();
    let pending_records = state
        .ledger
        .records()?
        .iter()
        .filter(|record| record.status != SettlementStatus::Settled)
        .count();

    Ok(Json(NodeStatus {
        node_id: state.node_id.as_str().to_string(),
        chain_height: state.chain.next_height()?,
        head_hash,
        due_pairs,
        pending_records,
        open_round_height: state.coordinator.open_round_height().await,
        threshold_cents: state.ledger.threshold_cents(),
        started_at: state.started_at.to_canonical_string(),
    }))
}
