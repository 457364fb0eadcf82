//! # Validator Peer Exchange
//!
//! Routes carrying the consensus protocol between validator nodes:
//!
//! - `POST /v1/peer/propose` — receive a candidate block; the response
//!   carries this node's vote when the candidate validates.
//! - `POST /v1/peer/vote` — receive a vote on the locally proposed block.
//! - `POST /v1/peer/commit` — receive a quorum-signed commit announcement.
//!
//! All three handlers are idempotent: re-delivered messages for an already
//! committed block are acknowledged without side effects.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use rsn_consensus::{BlockCommit, BlockProposal, BlockVote};

use crate::error::AppError;
use crate::state::AppState;

/// Build the peer exchange router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/peer/propose", post(receive_proposal))
        .route("/v1/peer/vote", post(receive_vote))
        .route("/v1/peer/commit", post(receive_commit))
}

/// Response to a candidate block proposal.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProposeResponse {
    /// This node's vote, absent when the candidate was refused.
    pub vote: Option<BlockVote>,
}

/// Response to a vote delivery.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    /// Whether this vote completed the quorum and committed the block.
    pub committed: bool,
}

/// Acknowledgement of a commit announcement.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommitResponse {
    /// Height of the acknowledged block.
    pub height: u64,
}

/// POST /v1/peer/propose
async fn receive_proposal(
    State(state): State<AppState>,
    Json(proposal): Json<BlockProposal>,
) -> Result<Json<ProposeResponse>, AppError> {
    let vote = state.coordinator.handle_proposal(proposal).await?;
    Ok(Json(ProposeResponse { vote }))
}

/// POST /v1/peer/vote
async fn receive_vote(
    State(state): State<AppState>,
    Json(vote): Json<BlockVote>,
) -> Result<Json<VoteResponse>, AppError> {
    match state.coordinator.handle_vote(vote).await? {
        Some(commit) => {
            // Quorum reached: announce the committed block to the zone.
            state.peers.broadcast_commit(&commit).await;
            Ok(Json(VoteResponse { committed: true }))
        }
        None => Ok(Json(VoteResponse { committed: false })),
    }
}

/// POST /v1/peer/commit
async fn receive_commit(
    State(state): State<AppState>,
    Json(commit): Json<BlockCommit>,
) -> Result<Json<CommitResponse>, AppError> {
    let height = commit.block.height;
    state.coordinator.handle_commit(commit).await?;
    Ok(Json(CommitResponse { height }))
}
