//! Seams between the node and the outside world.
//!
//! Each trait has a TCP implementation for deployments and a fake in tests.

use crate::error::TransportError;
use async_trait::async_trait;
use board_proto::{Publication, ServerEntry};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

/// Answer to a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// The authority still knows this node.
    Ok,
    /// The record was pruned; the node must register again.
    Unknown,
}

/// Client side of the membership authority.
#[async_trait]
pub trait Membership: Send + Sync {
    /// Register `name` (or refresh it) and return its rank.
    async fn register(&self, name: &str) -> Result<u64, TransportError>;

    /// Refresh the heartbeat of `name`.
    async fn heartbeat(&self, name: &str) -> Result<HeartbeatStatus, TransportError>;

    /// Current live membership.
    async fn list(&self) -> Result<Vec<ServerEntry>, TransportError>;
}

/// Which peer endpoint a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerEndpoint {
    /// Clock queries and election requests.
    Sync,
    /// Replicated mutations.
    Replication,
}

impl PeerEndpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Replication => "replication",
        }
    }
}

/// Request/reply calls to other server nodes, addressed by name.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Send one encoded request and wait at most `timeout` for the reply.
    async fn call(
        &self,
        peer: &str,
        endpoint: PeerEndpoint,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError>;
}

/// Topic publish/subscribe relay.
#[async_trait]
pub trait FanoutBus: Send + Sync {
    /// Publish `payload` on `topic`. Delivery is not confirmed.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Receive every publication on any of `topics`.
    async fn subscribe(&self, topics: &[&str]) -> Result<BusSubscription, TransportError>;
}

/// Stream of publications for a subscription.
#[derive(Debug)]
pub struct BusSubscription {
    rx: mpsc::Receiver<Publication>,
}

impl BusSubscription {
    pub fn new(rx: mpsc::Receiver<Publication>) -> Self {
        Self { rx }
    }

    /// Next publication, or `None` once the bus side has gone away.
    pub async fn recv(&mut self) -> Option<Publication> {
        self.rx.recv().await
    }
}
