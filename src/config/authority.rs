//! Membership authority configuration.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use super::defaults::*;
use super::types::ConfigError;

/// Top-level authority configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorityFile {
    #[serde(default)]
    pub authority: AuthorityConfig,
}

impl AuthorityFile {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Membership authority settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    /// Request/reply endpoint for `rank`, `heartbeat` and `list`.
    #[serde(default = "default_authority_listen")]
    pub listen: SocketAddr,
    /// Records idle longer than this are pruned.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// How often the pruner scans.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// First rank handed out.
    #[serde(default = "default_base_rank")]
    pub base_rank: u64,
    /// Prometheus metrics HTTP port (0 disables).
    #[serde(default)]
    pub metrics_port: u16,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            listen: default_authority_listen(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            prune_interval_secs: default_prune_interval_secs(),
            base_rank: default_base_rank(),
            metrics_port: 0,
        }
    }
}

impl AuthorityConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}
