//! # Application State
//!
//! Shared state handed to every route handler: the node's ledger, chain
//! replica, consensus coordinator, and peer client, all behind `Arc` so
//! the state clones cheaply per request.

use std::sync::Arc;

use rsn_consensus::{ConsensusCoordinator, SettlementChain};
use rsn_core::{Timestamp, ValidatorId};
use rsn_ledger::LocalLedger;

use crate::peers::PeerClient;

/// Shared application state for the Axum router.
#[derive(Clone)]
pub struct AppState {
    /// This node's validator identity.
    pub node_id: ValidatorId,
    /// The private bilateral debt ledger.
    pub ledger: Arc<LocalLedger>,
    /// The local settlement chain replica.
    pub chain: Arc<SettlementChain>,
    /// The consensus round driver.
    pub coordinator: Arc<ConsensusCoordinator>,
    /// Client for the other validators' peer endpoints.
    pub peers: Arc<PeerClient>,
    /// Process start time, reported by the status endpoint.
    pub started_at: Timestamp,
}
