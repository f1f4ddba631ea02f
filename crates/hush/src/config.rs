//! Node configuration.
//!
//! Loadable from JSON; every field has a default, so partial files work.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hush_core::DEFAULT_TTL;
use hush_relay::RelayConfig;

use crate::error::{NodeError, Result};

/// Configuration for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    /// Relay configuration (role, minimum PoW, maximum message size).
    pub relay: RelayConfig,
    /// TTL used by `post` when the caller gives none, in seconds.
    pub default_ttl: u32,
    /// How often expired envelopes are swept, in milliseconds.
    pub sweep_interval_ms: u64,
    /// Maximum number of envelope identities kept for dedup.
    pub store_capacity: usize,
    /// Maximum number of messages queued per filter.
    pub filter_queue_capacity: usize,
    /// Upper bound for the proof-of-work search of one `post`, in seconds.
    pub max_pow_time_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            default_ttl: DEFAULT_TTL,
            sweep_interval_ms: 2_000,
            store_capacity: 65_536,
            filter_queue_capacity: 1_000,
            max_pow_time_secs: 60,
        }
    }
}

impl NodeConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.relay.min_pow.is_finite() || self.relay.min_pow < 0.0 {
            return Err(NodeError::Config("minPow must be a non-negative number".into()));
        }
        if self.relay.max_message_size == 0 {
            return Err(NodeError::Config("maxMessageSize must be positive".into()));
        }
        if self.default_ttl == 0 {
            return Err(NodeError::Config("defaultTtl must be positive".into()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(NodeError::Config("sweepIntervalMs must be positive".into()));
        }
        if self.store_capacity == 0 || self.filter_queue_capacity == 0 {
            return Err(NodeError::Config("capacities must be positive".into()));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn max_pow_time(&self) -> Duration {
        Duration::from_secs(self.max_pow_time_secs)
    }
}
