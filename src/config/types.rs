//! Core configuration types and loading.

use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Node identity and storage.
    #[serde(default)]
    pub node: NodeConfig,
    /// Inbound endpoints.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Where the membership authority lives.
    #[serde(default)]
    pub authority: AuthorityLink,
    /// Fan-out bus relay. Without it, notifications stay in-process.
    pub bus: Option<BusConfig>,
    /// How peer endpoints are addressed.
    #[serde(default)]
    pub peers: PeersConfig,
    /// Intervals and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node name as registered with the authority. Peers use it to reach us,
    /// so it must resolve (or be overridden) on every other node.
    /// Falls back to `$HOSTNAME`.
    pub name: Option<String>,
    /// Directory holding the persisted collections.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Prometheus metrics HTTP port (0 disables).
    #[serde(default)]
    pub metrics_port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: default_data_dir(),
            metrics_port: 0,
        }
    }
}

impl NodeConfig {
    /// Resolve the node name: config, then `$HOSTNAME`, then a random one.
    pub fn resolve_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|n| !n.is_empty()))
            .unwrap_or_else(|| {
                let id = uuid::Uuid::new_v4().simple().to_string();
                format!("boardd-{}", &id[..8])
            })
    }
}

/// Inbound endpoint addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Client-facing request/reply endpoint (the broker connects here).
    #[serde(default = "default_client_addr")]
    pub client: SocketAddr,
    /// Peer clock/election endpoint.
    #[serde(default = "default_sync_addr")]
    pub sync: SocketAddr,
    /// Peer replication endpoint.
    #[serde(default = "default_replication_addr")]
    pub replication: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            client: default_client_addr(),
            sync: default_sync_addr(),
            replication: default_replication_addr(),
        }
    }
}

/// Membership authority address.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityLink {
    #[serde(default = "default_authority_addr")]
    pub address: String,
}

impl Default for AuthorityLink {
    fn default() -> Self {
        Self {
            address: default_authority_addr(),
        }
    }
}

/// Fan-out bus relay addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Relay address publishers connect to.
    pub publish: String,
    /// Relay address subscribers connect to.
    pub subscribe: String,
}

/// Peer addressing: `"<name>:<port>"` unless overridden per name.
#[derive(Debug, Clone, Deserialize)]
pub struct PeersConfig {
    #[serde(default = "default_peer_sync_port")]
    pub sync_port: u16,
    #[serde(default = "default_peer_replication_port")]
    pub replication_port: u16,
    /// Explicit addresses for peers whose names do not resolve.
    #[serde(default)]
    pub overrides: HashMap<String, PeerOverride>,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            sync_port: default_peer_sync_port(),
            replication_port: default_peer_replication_port(),
            overrides: HashMap::new(),
        }
    }
}

/// Explicit endpoint addresses for one peer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerOverride {
    pub sync: String,
    pub replication: String,
}

/// Intervals and timeouts for background tasks and outbound calls.
///
/// Defaults: heartbeat every 10s, store reload every 2s, clock sync every
/// 30s, 2s per-peer timeout, 5s towards the authority and the coordinator,
/// 3s startup delay before registering.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_reload_interval_ms")]
    pub reload_interval_ms: u64,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    #[serde(default = "default_authority_timeout_ms")]
    pub authority_timeout_ms: u64,
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            reload_interval_ms: default_reload_interval_ms(),
            sync_interval_secs: default_sync_interval_secs(),
            peer_timeout_ms: default_peer_timeout_ms(),
            authority_timeout_ms: default_authority_timeout_ms(),
            sync_timeout_ms: default_sync_timeout_ms(),
            startup_delay_secs: default_startup_delay_secs(),
        }
    }
}

impl TimingConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn authority_timeout(&self) -> Duration {
        Duration::from_millis(self.authority_timeout_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}
