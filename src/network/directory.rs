//! Peer address resolution.

use super::traits::PeerEndpoint;
use crate::config::{PeerOverride, PeersConfig};
use dashmap::DashMap;

/// Maps a peer name to the address of one of its endpoints.
///
/// Without an override the address is `"<name>:<port>"`, relying on the
/// name resolving (container hostnames, `/etc/hosts`).
#[derive(Debug)]
pub struct PeerDirectory {
    sync_port: u16,
    replication_port: u16,
    overrides: DashMap<String, PeerOverride>,
}

impl PeerDirectory {
    pub fn new(sync_port: u16, replication_port: u16) -> Self {
        Self {
            sync_port,
            replication_port,
            overrides: DashMap::new(),
        }
    }

    pub fn from_config(config: &PeersConfig) -> Self {
        let directory = Self::new(config.sync_port, config.replication_port);
        for (name, addrs) in &config.overrides {
            directory.set_override(name.clone(), addrs.clone());
        }
        directory
    }

    /// Pin the endpoints of `name` to explicit addresses.
    pub fn set_override(&self, name: impl Into<String>, addrs: PeerOverride) {
        self.overrides.insert(name.into(), addrs);
    }

    pub fn address(&self, peer: &str, endpoint: PeerEndpoint) -> String {
        if let Some(addrs) = self.overrides.get(peer) {
            return match endpoint {
                PeerEndpoint::Sync => addrs.sync.clone(),
                PeerEndpoint::Replication => addrs.replication.clone(),
            };
        }
        let port = match endpoint {
            PeerEndpoint::Sync => self.sync_port,
            PeerEndpoint::Replication => self.replication_port,
        };
        format!("{peer}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_address_uses_name_and_port() {
        let dir = PeerDirectory::new(5561, 5562);
        assert_eq!(dir.address("server-a", PeerEndpoint::Sync), "server-a:5561");
        assert_eq!(
            dir.address("server-a", PeerEndpoint::Replication),
            "server-a:5562"
        );
    }

    #[test]
    fn override_wins() {
        let dir = PeerDirectory::new(5561, 5562);
        dir.set_override(
            "server-b",
            PeerOverride {
                sync: "127.0.0.1:9001".into(),
                replication: "127.0.0.1:9002".into(),
            },
        );
        assert_eq!(dir.address("server-b", PeerEndpoint::Sync), "127.0.0.1:9001");
        assert_eq!(
            dir.address("server-b", PeerEndpoint::Replication),
            "127.0.0.1:9002"
        );
        assert_eq!(dir.address("server-c", PeerEndpoint::Sync), "server-c:5561");
    }
}
