//! # Node Manifest
//!
//! YAML configuration for a settlement node: identity, zone parameters,
//! validator set, and peer endpoints. A handful of deployment-sensitive
//! fields can be overridden through `RSN_*` environment variables so the
//! manifest itself stays free of secrets.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors loading or validating a node manifest.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("cannot read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is not valid YAML or has the wrong shape.
    #[error("cannot parse manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The manifest parsed but its content is unusable.
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// One validator in the zone's closed set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorEntry {
    /// Validator identifier, typically the operator's id.
    pub id: String,
    /// Hex-encoded Ed25519 verifying key.
    pub public_key_hex: String,
    /// Base URL of the validator's node, absent for this node itself.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// The node manifest, deserialized from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeManifest {
    /// This node's validator identity.
    pub node_id: String,
    /// Socket address the HTTP server binds.
    #[serde(default = "defaults::listen_addr")]
    pub listen_addr: String,
    /// Zone settlement currency (ISO 4217).
    #[serde(default = "defaults::currency")]
    pub currency: String,
    /// Settlement threshold in minor units.
    #[serde(default = "defaults::threshold_cents")]
    pub threshold_cents: u64,
    /// Seconds an open consensus round may wait for quorum.
    #[serde(default = "defaults::voting_window_secs")]
    pub voting_window_secs: u64,
    /// Seconds proof generation may take before the round aborts.
    #[serde(default = "defaults::proof_timeout_secs")]
    pub proof_timeout_secs: u64,
    /// Seconds between consensus ticks.
    #[serde(default = "defaults::tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Signatures required to commit a block; strict majority when absent.
    #[serde(default)]
    pub quorum: Option<usize>,
    /// Bearer token for the API; auth is disabled when absent.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Ledger snapshot path; in-memory storage when absent.
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    /// Hex seed of this node's Ed25519 signing key.
    #[serde(default)]
    pub signing_key_hex: Option<String>,
    /// The zone's validator set, including this node.
    #[serde(default)]
    pub validators: Vec<ValidatorEntry>,
}

mod defaults {
    pub fn listen_addr() -> String {
        "127.0.0.1:8350".to_string()
    }
    pub fn currency() -> String {
        "EUR".to_string()
    }
    // 100 EUR of bilateral exposure triggers settlement.
    pub fn threshold_cents() -> u64 {
        10_000
    }
    pub fn voting_window_secs() -> u64 {
        30
    }
    pub fn proof_timeout_secs() -> u64 {
        10
    }
    pub fn tick_interval_secs() -> u64 {
        5
    }
}

impl NodeManifest {
    /// Load a manifest from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Self = serde_yaml::from_str(&raw)?;
        manifest.check()?;
        Ok(manifest)
    }

    /// Parse a manifest from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let manifest: Self = serde_yaml::from_str(raw)?;
        manifest.check()?;
        Ok(manifest)
    }

    /// Apply `RSN_*` environment overrides for deployment-sensitive fields.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("RSN_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Ok(key) = std::env::var("RSN_SIGNING_KEY_HEX") {
            self.signing_key_hex = Some(key);
        }
        if let Ok(addr) = std::env::var("RSN_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(path) = std::env::var("RSN_DATA_PATH") {
            self.data_path = Some(PathBuf::from(path));
        }
    }

    /// Quorum size: configured value, or a strict majority of the set.
    pub fn quorum_size(&self) -> usize {
        self.quorum.unwrap_or(self.validators.len() / 2 + 1)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.validators.is_empty() {
            return Err(ConfigError::Invalid(
                "validator set must not be empty".to_string(),
            ));
        }
        if !self.validators.iter().any(|v| v.id == self.node_id) {
            return Err(ConfigError::Invalid(format!(
                "node_id {} is not in the validator set",
                self.node_id
            )));
        }
        if let Some(quorum) = self.quorum {
            if quorum == 0 || quorum > self.validators.len() {
                return Err(ConfigError::Invalid(format!(
                    "quorum {quorum} is out of range for {} validators",
                    self.validators.len()
                )));
            }
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
