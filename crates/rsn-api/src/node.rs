//! # Node Assembly
//!
//! Builds the full node from a manifest: store, ledger, chain replica,
//! consensus coordinator, and peer client, plus the background tick loop
//! that drives settlement rounds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use rsn_consensus::{
    ConsensusConfig, ConsensusCoordinator, SettlementChain, TickOutcome,
};
use rsn_core::{CurrencyCode, Timestamp, ValidatorId};
use rsn_crypto::{CryptoError, SigningKey, VerifyingKey};
use rsn_ledger::{
    JsonFileStore, LedgerConfig, LedgerStore, LocalLedger, MemoryStore, StoreError,
};
use rsn_zkp::LocalProofGateway;

use crate::config::NodeManifest;
use crate::peers::{PeerClient, PeerClientError};
use crate::state::AppState;

/// Errors assembling a node from its manifest.
#[derive(Error, Debug)]
pub enum NodeError {
    /// An identifier or currency code in the manifest is malformed.
    #[error("invalid manifest value: {0}")]
    Validation(#[from] rsn_core::ValidationError),

    /// A key in the manifest is malformed, or the signing key is missing.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The manifest names no signing key for this node.
    #[error("no signing key configured; set signing_key_hex or RSN_SIGNING_KEY_HEX")]
    MissingSigningKey,

    /// The ledger store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A peer endpoint in the manifest is unusable.
    #[error(transparent)]
    Peers(#[from] PeerClientError),
}

/// Assemble the shared application state from a validated manifest.
pub fn build_state(manifest: &NodeManifest) -> Result<AppState, NodeError> {
    let node_id = ValidatorId::new(manifest.node_id.clone())?;
    let currency = CurrencyCode::new(manifest.currency.clone())?;

    let signing_key = match &manifest.signing_key_hex {
        Some(hex) => SigningKey::from_seed_hex(hex)?,
        None => return Err(NodeError::MissingSigningKey),
    };

    let mut validator_keys = BTreeMap::new();
    let mut peer_endpoints = Vec::new();
    for entry in &manifest.validators {
        let id = ValidatorId::new(entry.id.clone())?;
        let key = VerifyingKey::from_hex(&entry.public_key_hex)?;
        if id != node_id {
            if let Some(endpoint) = &entry.endpoint {
                peer_endpoints.push((id.clone(), endpoint.clone()));
            } else {
                warn!(validator = %id, "peer has no endpoint, it will never hear from us");
            }
        }
        validator_keys.insert(id, key);
    }

    let store: Arc<dyn LedgerStore> = match &manifest.data_path {
        Some(path) => {
            info!(path = %path.display(), "opening ledger snapshot");
            Arc::new(JsonFileStore::open(path)?)
        }
        None => {
            info!("no data_path configured, ledger is in-memory");
            Arc::new(MemoryStore::new())
        }
    };

    let ledger = Arc::new(LocalLedger::new(
        store.clone(),
        LedgerConfig {
            currency: currency.clone(),
            threshold_cents: manifest.threshold_cents,
        },
    ));

    let gateway = Arc::new(LocalProofGateway::new());
    let chain = Arc::new(SettlementChain::new(
        store,
        validator_keys,
        manifest.quorum_size(),
        currency.clone(),
        gateway.clone(),
    ));

    let coordinator = Arc::new(ConsensusCoordinator::new(
        ConsensusConfig {
            node_id: node_id.clone(),
            currency,
            voting_window_secs: manifest.voting_window_secs,
            proof_timeout_secs: manifest.proof_timeout_secs,
        },
        signing_key,
        ledger.clone(),
        chain.clone(),
        gateway,
    ));

    let peers = Arc::new(PeerClient::new(peer_endpoints, manifest.auth_token.clone())?);

    Ok(AppState {
        node_id,
        ledger,
        chain,
        coordinator,
        peers,
        started_at: Timestamp::now(),
    })
}

/// Spawn the background consensus tick loop.
///
/// Each tick may propose a block (which is then broadcast, votes fed back,
/// and the resulting commit announced) or commit directly in a
/// single-validator zone. Tick errors are logged and the loop keeps going.
pub fn spawn_tick_loop(state: AppState, tick_interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(tick_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.coordinator.tick(Timestamp::now()).await {
                Ok(TickOutcome::Idle) => {}
                Ok(TickOutcome::Aborted { height }) => {
                    warn!(height, "consensus round abandoned, debts stay due");
                }
                Ok(TickOutcome::Committed(commit)) => {
                    state.peers.broadcast_commit(&commit).await;
                }
                Ok(TickOutcome::Proposed(proposal)) => {
                    drive_round(&state, proposal).await;
                }
                Err(e) => error!(error = %e, "consensus tick failed"),
            }
        }
    })
}

/// Broadcast a proposal, collect the returned votes, and announce the
/// commit if quorum is reached.
async fn drive_round(state: &AppState, proposal: rsn_consensus::BlockProposal) {
    let height = proposal.block.height;
    let votes = state.peers.broadcast_proposal(&proposal).await;
    debug!(height, votes = votes.len(), "peer votes collected");

    for vote in votes {
        match state.coordinator.handle_vote(vote).await {
            Ok(Some(commit)) => {
                state.peers.broadcast_commit(&commit).await;
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(height, error = %e, "discarding peer vote"),
        }
    }
    debug!(height, "quorum not yet reached, round stays open");
}
