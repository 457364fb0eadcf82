//! # Settlement Chain Reads
//!
//! - `GET /v1/chain/blocks` — block summaries in height order.
//! - `GET /v1/chain/blocks/:height` — one full block.
//! - `GET /v1/chain/head` — the latest full block.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use rsn_consensus::SettlementBlock;

use crate::error::AppError;
use crate::state::AppState;

/// Build the chain router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/chain/blocks", get(list_blocks))
        .route("/v1/chain/blocks/:height", get(get_block))
        .route("/v1/chain/head", get(get_head))
}

/// A block summary for listing.
#[derive(Debug, Serialize)]
pub struct BlockSummary {
    /// Chain position.
    pub height: u64,
    /// Block hash, hex.
    pub hash: String,
    /// Proposal time.
    pub created_at: String,
    /// The proposing validator.
    pub proposer: String,
    /// Pairs this block settled.
    pub settled_pairs: usize,
    /// Records this block settled.
    pub settled_records: usize,
    /// Gross bilateral exposure entering netting, minor units.
    pub gross_cents: i64,
    /// Transfer volume leaving netting, minor units.
    pub net_cents: i64,
    /// Validator signatures carried.
    pub signatures: usize,
}

impl BlockSummary {
    fn new(block: &SettlementBlock) -> Result<Self, AppError> {
        let hash = block
            .block_hash()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self {
            height: block.height,
            hash: hash.to_hex(),
            created_at: block.created_at.to_canonical_string(),
            proposer: block.proposer.as_str().to_string(),
            settled_pairs: block.settled_pairs.len(),
            settled_records: block.included_record_ids.len(),
            gross_cents: block.gross_cents,
            net_cents: block.net_cents,
            signatures: block.signatures.len(),
        })
    }
}

/// Chain listing response.
#[derive(Debug, Serialize)]
pub struct ChainResponse {
    /// Number of committed blocks.
    pub height: u64,
    /// Block summaries in height order.
    pub blocks: Vec<BlockSummary>,
}

/// GET /v1/chain/blocks
async fn list_blocks(State(state): State<AppState>) -> Result<Json<ChainResponse>, AppError> {
    let blocks = state.chain.blocks()?;
    let summaries = blocks
        .iter()
        .map(BlockSummary::new)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ChainResponse {
        height: blocks.len() as u64,
        blocks: summaries,
    }))
}

/// GET /v1/chain/blocks/:height
async fn get_block(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Result<Json<SettlementBlock>, AppError> {
    state
        .chain
        .block(height)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no block at height {height}")))
}

/// GET /v1/chain/head
async fn get_head(State(state): State<AppState>) -> Result<Json<SettlementBlock>, AppError> {
    state
        .chain
        .head()?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("chain is empty".to_string()))
}
