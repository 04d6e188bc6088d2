//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Server node config (Config, NodeConfig, ListenConfig, PeersConfig, TimingConfig)
//! - [`authority`]: Membership authority config (AuthorityFile, AuthorityConfig)
//! - `defaults`: serde default functions shared by both

mod authority;
mod defaults;
mod types;

pub use authority::{AuthorityConfig, AuthorityFile};
pub use types::{
    AuthorityLink, BusConfig, Config, ConfigError, ListenConfig, NodeConfig, PeerOverride,
    PeersConfig, TimingConfig,
};
