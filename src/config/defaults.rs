//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;
use std::path::PathBuf;

// =============================================================================
// Node Defaults
// =============================================================================

pub fn default_data_dir() -> PathBuf {
    PathBuf::from("dados")
}

pub fn default_client_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5556))
}

pub fn default_sync_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5561))
}

pub fn default_replication_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5562))
}

pub fn default_authority_addr() -> String {
    "referencia:5560".to_string()
}

pub fn default_peer_sync_port() -> u16 {
    5561
}

pub fn default_peer_replication_port() -> u16 {
    5562
}

// =============================================================================
// Timing Defaults
// =============================================================================

pub fn default_heartbeat_interval_secs() -> u64 {
    10
}

pub fn default_reload_interval_ms() -> u64 {
    2000
}

pub fn default_sync_interval_secs() -> u64 {
    30
}

pub fn default_peer_timeout_ms() -> u64 {
    2000
}

pub fn default_authority_timeout_ms() -> u64 {
    5000
}

pub fn default_sync_timeout_ms() -> u64 {
    5000
}

pub fn default_startup_delay_secs() -> u64 {
    3
}

// =============================================================================
// Authority Defaults
// =============================================================================

pub fn default_authority_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5560))
}

pub fn default_heartbeat_timeout_secs() -> u64 {
    30
}

pub fn default_prune_interval_secs() -> u64 {
    10
}

pub fn default_base_rank() -> u64 {
    1
}
