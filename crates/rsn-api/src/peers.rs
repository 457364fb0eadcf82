//! # Peer Client
//!
//! Outbound half of the peer boundary: posts proposals, collects the
//! votes peers answer with, and fans out commit announcements.
//!
//! Delivery is best effort per peer. Consensus tolerates missing
//! deliveries because every peer message is idempotent and the round
//! aborts on timeout; an unreachable peer costs a vote, not correctness.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use rsn_consensus::{BlockCommit, BlockProposal, BlockVote};
use rsn_core::ValidatorId;

use crate::routes::peer::ProposeResponse;

const PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors constructing the peer client.
#[derive(Error, Debug)]
pub enum PeerClientError {
    /// A configured peer endpoint is not a valid URL.
    #[error("invalid peer endpoint for {validator}: {reason}")]
    InvalidEndpoint {
        /// The validator with the bad endpoint.
        validator: ValidatorId,
        /// Parser error text.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("cannot build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// One reachable peer validator.
#[derive(Debug, Clone)]
pub struct PeerEndpoint {
    /// The peer's validator identity.
    pub id: ValidatorId,
    /// Base URL of the peer's node API.
    pub base_url: Url,
}

/// HTTP client over the zone's peer validators.
#[derive(Debug)]
pub struct PeerClient {
    http: Client,
    peers: Vec<PeerEndpoint>,
    auth_token: Option<String>,
}

impl PeerClient {
    /// Build a client over the given peers.
    pub fn new(
        peers: Vec<(ValidatorId, String)>,
        auth_token: Option<String>,
    ) -> Result<Self, PeerClientError> {
        let peers = peers
            .into_iter()
            .map(|(id, endpoint)| {
                let base_url =
                    Url::parse(&endpoint).map_err(|e| PeerClientError::InvalidEndpoint {
                        validator: id.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(PeerEndpoint { id, base_url })
            })
            .collect::<Result<Vec<_>, PeerClientError>>()?;

        let http = Client::builder().timeout(PEER_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            peers,
            auth_token,
        })
    }

    /// Number of configured peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn post(&self, peer: &PeerEndpoint, path: &str) -> Option<reqwest::RequestBuilder> {
        let url = match peer.base_url.join(path) {
            Ok(url) => url,
            Err(e) => {
                warn!(peer = %peer.id, path, error = %e, "cannot build peer url");
                return None;
            }
        };
        let mut request = self.http.post(url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        Some(request)
    }

    /// Send a proposal to every peer and collect the votes they answer with.
    pub async fn broadcast_proposal(&self, proposal: &BlockProposal) -> Vec<BlockVote> {
        let mut votes = Vec::new();
        for peer in &self.peers {
            let Some(request) = self.post(peer, "/v1/peer/propose") else {
                continue;
            };
            match request.json(proposal).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<ProposeResponse>().await {
                        Ok(body) => {
                            if let Some(vote) = body.vote {
                                debug!(peer = %peer.id, height = vote.height, "vote received");
                                votes.push(vote);
                            } else {
                                debug!(peer = %peer.id, "peer withheld its vote");
                            }
                        }
                        Err(e) => warn!(peer = %peer.id, error = %e, "malformed vote response"),
                    }
                }
                Ok(response) => {
                    warn!(peer = %peer.id, status = %response.status(), "proposal refused");
                }
                Err(e) => warn!(peer = %peer.id, error = %e, "proposal delivery failed"),
            }
        }
        votes
    }

    /// Announce a committed block to every peer.
    pub async fn broadcast_commit(&self, commit: &BlockCommit) {
        for peer in &self.peers {
            let Some(request) = self.post(peer, "/v1/peer/commit") else {
                continue;
            };
            match request.json(commit).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(peer = %peer.id, height = commit.block.height, "commit delivered");
                }
                Ok(response) => {
                    warn!(peer = %peer.id, status = %response.status(), "commit refused");
                }
                Err(e) => warn!(peer = %peer.id, error = %e, "commit delivery failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_endpoint() {
        let err = PeerClient::new(
            vec![(
                ValidatorId::new("op-y").unwrap(),
                "not a url".to_string(),
            )],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PeerClientError::InvalidEndpoint { .. }));
    }

    #[test]
    fn accepts_valid_endpoints() {
        let client = PeerClient::new(
            vec![
                (
                    ValidatorId::new("op-y").unwrap(),
                    "http://op-y.example:8350".to_string(),
                ),
                (
                    ValidatorId::new("op-z").unwrap(),
                    "http://op-z.example:8350".to_string(),
                ),
            ],
            Some("token".to_string()),
        )
        .unwrap();
        assert_eq!(client.peer_count(), 2);
    }
}
