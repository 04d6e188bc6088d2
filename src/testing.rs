//! In-process cluster for unit tests.
//!
//! Nodes share one [`MembershipRegistry`], one [`LocalBus`], and reach each
//! other through [`FakePeers`], which calls the peer handlers directly.

use crate::authority::MembershipRegistry;
use crate::config::TimingConfig;
use crate::error::TransportError;
use crate::handlers::peer::{handle_replication, handle_sync};
use crate::network::{HeartbeatStatus, LocalBus, Membership, PeerEndpoint, PeerLink};
use crate::state::{Node, NodeParams, SharedClock, Store};
use async_trait::async_trait;
use board_proto::{Announcement, Request, ServerEntry, decode_any};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub struct FakeMembership {
    registry: MembershipRegistry,
    down: AtomicBool,
}

impl FakeMembership {
    fn new() -> Self {
        Self {
            registry: MembershipRegistry::new(1, Duration::from_secs(30)),
            down: AtomicBool::new(false),
        }
    }

    /// Make every call fail as if the authority were unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Forget every registered server.
    pub fn expire_all(&self) {
        self.registry
            .prune_at(Instant::now() + Duration::from_secs(3600));
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.down.load(Ordering::SeqCst) {
            Err(TransportError::Timeout(Duration::from_millis(1)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Membership for FakeMembership {
    async fn register(&self, name: &str) -> Result<u64, TransportError> {
        self.check()?;
        Ok(self.registry.rank(name))
    }

    async fn heartbeat(&self, name: &str) -> Result<HeartbeatStatus, TransportError> {
        self.check()?;
        Ok(if self.registry.heartbeat(name) {
            HeartbeatStatus::Ok
        } else {
            HeartbeatStatus::Unknown
        })
    }

    async fn list(&self) -> Result<Vec<ServerEntry>, TransportError> {
        self.check()?;
        Ok(self.registry.list())
    }
}

/// One request seen by [`FakePeers`].
#[derive(Debug, Clone)]
pub struct PeerCall {
    pub peer: String,
    pub endpoint: PeerEndpoint,
    pub service: String,
    pub sender: Option<String>,
}

/// Routes peer calls to in-process nodes by name and records each call.
#[derive(Default)]
pub struct FakePeers {
    nodes: Mutex<HashMap<String, Weak<Node>>>,
    calls: Mutex<Vec<PeerCall>>,
}

impl FakePeers {
    fn insert(&self, node: &Arc<Node>) {
        self.nodes
            .lock()
            .insert(node.name().to_string(), Arc::downgrade(node));
    }
}

#[async_trait]
impl PeerLink for FakePeers {
    async fn call(
        &self,
        peer: &str,
        endpoint: PeerEndpoint,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError> {
        if let Ok((_, request)) = decode_any::<Request>(&payload) {
            self.calls.lock().push(PeerCall {
                peer: peer.to_string(),
                endpoint,
                service: request.service.unwrap_or_default(),
                sender: request.data.and_then(|data| data.user),
            });
        }
        let node = self.nodes.lock().get(peer).and_then(Weak::upgrade);
        let Some(node) = node else {
            return Err(TransportError::Connect {
                addr: peer.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        };
        let reply = match endpoint {
            PeerEndpoint::Sync => handle_sync(&node, &payload).await?,
            PeerEndpoint::Replication => handle_replication(&node, &payload).await?,
        };
        reply.ok_or(TransportError::Timeout(timeout))
    }
}

pub struct TestCluster {
    pub bus: LocalBus,
    pub membership: Arc<FakeMembership>,
    peers: Arc<FakePeers>,
    dirs: Mutex<Vec<TempDir>>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self {
            bus: LocalBus::default(),
            membership: Arc::new(FakeMembership::new()),
            peers: Arc::new(FakePeers::default()),
            dirs: Mutex::new(Vec::new()),
        }
    }

    /// A node with its own data directory, not yet registered.
    pub async fn node(&self, name: &str) -> Arc<Node> {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        self.dirs.lock().push(dir);

        let node = Node::new(NodeParams {
            name: name.to_string(),
            clock: SharedClock::new(),
            store: Arc::new(store),
            membership: self.membership.clone(),
            peers: self.peers.clone(),
            bus: Arc::new(self.bus.clone()),
            timing: TimingConfig::default(),
        });
        self.peers.insert(&node);
        node
    }

    /// Register a name with the authority without creating a node.
    pub fn register(&self, name: &str) -> u64 {
        self.membership.registry.rank(name)
    }

    /// Senders of every `election` challenge addressed to `peer`.
    pub fn challengers_of(&self, peer: &str) -> Vec<String> {
        self.peers
            .calls
            .lock()
            .iter()
            .filter(|call| {
                call.peer == peer
                    && call.endpoint == PeerEndpoint::Sync
                    && call.service == Announcement::ELECTION
            })
            .filter_map(|call| call.sender.clone())
            .collect()
    }

    /// A node that is registered and knows its rank.
    pub async fn joined(&self, name: &str) -> Arc<Node> {
        let node = self.node(name).await;
        let rank = self.register(name);
        node.election().set_rank(rank);
        node
    }
}
