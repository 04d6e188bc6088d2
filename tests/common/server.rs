//! In-process cluster: one authority and any number of server nodes.

use boardd::authority::{AuthorityService, MembershipRegistry};
use boardd::config::{PeerOverride, TimingConfig};
use boardd::network::{AuthorityClient, Endpoint, EndpointKind, LocalBus, PeerDirectory, TcpPeerLink};
use boardd::state::{NodeParams, SharedClock, Store};
use boardd::sync::{election, heartbeat};
use boardd::{Node, NodeServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// A running node and the address clients reach it on.
pub struct TestNode {
    pub node: Arc<Node>,
    pub client_addr: SocketAddr,
    _dir: TempDir,
}

pub struct TestCluster {
    pub authority_addr: SocketAddr,
    pub bus: LocalBus,
    directory: Arc<PeerDirectory>,
}

impl TestCluster {
    /// Start a fresh authority.
    pub async fn start() -> anyhow::Result<Self> {
        let registry = Arc::new(MembershipRegistry::new(1, Duration::from_secs(30)));
        let endpoint = Endpoint::bind(EndpointKind::Authority, loopback()).await?;
        let authority_addr = endpoint.local_addr()?;
        tokio::spawn(AuthorityService::new(registry).run(endpoint));

        Ok(Self {
            authority_addr,
            bus: LocalBus::default(),
            // Every peer gets an override, so the default ports are never dialed.
            directory: Arc::new(PeerDirectory::new(1, 1)),
        })
    }

    /// Bind a node, register it (in call order, so ranks follow), and start
    /// serving.
    pub async fn spawn_node(&self, name: &str) -> anyhow::Result<TestNode> {
        let dir = TempDir::new()?;
        let clock = SharedClock::new();
        let timing = TimingConfig {
            startup_delay_secs: 0,
            ..TimingConfig::default()
        };
        let node = Node::new(NodeParams {
            name: name.to_string(),
            clock: clock.clone(),
            store: Arc::new(Store::open(dir.path()).await?),
            membership: Arc::new(AuthorityClient::new(
                self.authority_addr.to_string(),
                clock,
                timing.authority_timeout(),
            )),
            peers: Arc::new(TcpPeerLink::new(Arc::clone(&self.directory))),
            bus: Arc::new(self.bus.clone()),
            timing,
        });

        let listen = boardd::config::ListenConfig {
            client: loopback(),
            sync: loopback(),
            replication: loopback(),
        };
        let server = NodeServer::bind(Arc::clone(&node), &listen).await?;
        let (client_addr, sync, replication) = server.local_addrs()?;
        self.directory.set_override(
            name,
            PeerOverride {
                sync: sync.to_string(),
                replication: replication.to_string(),
            },
        );

        heartbeat::register(&node).await;
        tokio::spawn(election::monitor(Arc::clone(&node)));
        tokio::spawn(server.run());

        Ok(TestNode {
            node,
            client_addr,
            _dir: dir,
        })
    }
}
