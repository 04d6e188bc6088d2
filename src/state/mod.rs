//! Per-node state.
//!
//! [`Node`] is the context object every component works against: identity,
//! clocks, the store, election state, and the three outbound seams. It is
//! built once per process and shared as `Arc<Node>` with the request loop
//! and the background tasks.

mod clock;
pub mod persistence;
mod store;

pub use clock::{ClockOffset, SharedClock, unix_now};
pub use store::{ChannelRecord, MessageRecord, PublicationRecord, Store, UserRecord};

use crate::config::{Config, TimingConfig};
use crate::error::StoreError;
use crate::network::{
    AuthorityClient, FanoutBus, LocalBus, Membership, PeerDirectory, PeerLink, TcpBus, TcpPeerLink,
};
use crate::sync::ElectionCoordinator;
use std::sync::Arc;

/// Everything needed to build a [`Node`].
pub struct NodeParams {
    pub name: String,
    pub clock: SharedClock,
    pub store: Arc<Store>,
    pub membership: Arc<dyn Membership>,
    pub peers: Arc<dyn PeerLink>,
    pub bus: Arc<dyn FanoutBus>,
    pub timing: TimingConfig,
}

/// A server node's shared context.
pub struct Node {
    name: String,
    clock: SharedClock,
    offset: ClockOffset,
    store: Arc<Store>,
    election: ElectionCoordinator,
    membership: Arc<dyn Membership>,
    peers: Arc<dyn PeerLink>,
    bus: Arc<dyn FanoutBus>,
    timing: TimingConfig,
}

impl Node {
    pub fn new(params: NodeParams) -> Arc<Self> {
        Arc::new(Self {
            election: ElectionCoordinator::new(params.name.clone()),
            name: params.name,
            clock: params.clock,
            offset: ClockOffset::default(),
            store: params.store,
            membership: params.membership,
            peers: params.peers,
            bus: params.bus,
            timing: params.timing,
        })
    }

    /// Build a node with TCP transports from a configuration file.
    pub async fn from_config(config: &Config) -> Result<Arc<Self>, StoreError> {
        let name = config.node.resolve_name();
        let clock = SharedClock::new();
        let store = Arc::new(Store::open(&config.node.data_dir).await?);

        let membership: Arc<dyn Membership> = Arc::new(AuthorityClient::new(
            config.authority.address.clone(),
            clock.clone(),
            config.timing.authority_timeout(),
        ));
        let directory = Arc::new(PeerDirectory::from_config(&config.peers));
        let peers: Arc<dyn PeerLink> = Arc::new(TcpPeerLink::new(directory));
        let bus: Arc<dyn FanoutBus> = match &config.bus {
            Some(bus) => Arc::new(
                TcpBus::new(bus.publish.clone(), bus.subscribe.clone())
                    .with_send_timeout(config.timing.peer_timeout()),
            ),
            None => Arc::new(LocalBus::default()),
        };

        Ok(Self::new(NodeParams {
            name,
            clock,
            store,
            membership,
            peers,
            bus,
            timing: config.timing.clone(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn offset(&self) -> &ClockOffset {
        &self.offset
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn election(&self) -> &ElectionCoordinator {
        &self.election
    }

    pub fn membership(&self) -> &dyn Membership {
        self.membership.as_ref()
    }

    pub fn peers(&self) -> &dyn PeerLink {
        self.peers.as_ref()
    }

    pub fn bus(&self) -> &dyn FanoutBus {
        self.bus.as_ref()
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }
}
