//! Berkeley-style clock synchronization.
//!
//! Followers periodically ask the coordinator for its time, correct the
//! answer by half the round trip, and store the difference as their offset.
//! The offset only affects what this node answers to `clock` queries.

use crate::network::PeerEndpoint;
use crate::state::{Node, unix_now};
use board_proto::{Reply, Request, RequestData, WireFormat, decode_any};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one synchronization cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// This node is the coordinator; nothing to do.
    IsCoordinator,
    /// Offset updated.
    Synced { offset: f64 },
    /// No coordinator known, or it is not in the membership list.
    NoCoordinator,
    /// The coordinator did not answer in time.
    Unreachable,
    /// Something else went wrong; retry next cycle.
    Skipped(String),
}

impl SyncOutcome {
    /// Whether this outcome calls for a new election.
    pub fn needs_election(&self) -> bool {
        matches!(self, Self::NoCoordinator | Self::Unreachable)
    }
}

/// Estimate the offset to a remote clock from one request/reply exchange.
///
/// `sent` and `received` are local times around the exchange; `remote` is
/// the time the remote reported.
pub fn estimate_offset(sent: f64, received: f64, remote: f64) -> f64 {
    let rtt = received - sent;
    (remote + rtt / 2.0) - received
}

/// Run one synchronization cycle against the current coordinator.
pub async fn sync_once(node: &Node) -> SyncOutcome {
    if node.election().is_coordinator() {
        return SyncOutcome::IsCoordinator;
    }
    let Some(coordinator) = node.election().coordinator() else {
        return SyncOutcome::NoCoordinator;
    };

    match node.membership().list().await {
        Ok(members) if members.iter().any(|m| m.name == coordinator) => {}
        Ok(_) => {
            info!(%coordinator, "Coordinator left the membership list");
            return SyncOutcome::NoCoordinator;
        }
        Err(e) => return SyncOutcome::Skipped(format!("membership unavailable: {e}")),
    }

    let sent = unix_now();
    let data = RequestData::default()
        .with_timestamp(sent)
        .with_clock(node.clock().tick());
    let payload = match WireFormat::Binary.encode(&Request::new("clock", data)) {
        Ok(payload) => Bytes::from(payload),
        Err(e) => return SyncOutcome::Skipped(e.to_string()),
    };

    let raw = match node
        .peers()
        .call(
            &coordinator,
            PeerEndpoint::Sync,
            payload,
            node.timing().sync_timeout(),
        )
        .await
    {
        Ok(raw) => raw,
        Err(e) if e.is_unreachable() => {
            warn!(%coordinator, error = %e, "Coordinator unreachable");
            return SyncOutcome::Unreachable;
        }
        Err(e) => return SyncOutcome::Skipped(e.to_string()),
    };
    let received = unix_now();

    let reply = match decode_any::<Reply>(&raw) {
        Ok((_, reply)) => reply,
        Err(e) => return SyncOutcome::Skipped(e.to_string()),
    };
    node.clock().update(reply.data.clock);
    let Some(remote) = reply.data.time else {
        return SyncOutcome::Skipped("clock reply without time".to_string());
    };

    let offset = estimate_offset(sent, received, remote);
    node.offset().set(offset);
    debug!(%coordinator, offset, "Clock synchronized");
    SyncOutcome::Synced { offset }
}

/// Synchronize every sync interval; start an election when the coordinator
/// is missing or silent.
pub async fn run(node: Arc<Node>) {
    let mut ticker = tokio::time::interval(node.timing().sync_interval());
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let outcome = sync_once(&node).await;
        if let SyncOutcome::Skipped(reason) = &outcome {
            debug!(%reason, "Clock sync skipped");
        }
        if outcome.needs_election() {
            node.election().run(&node).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCluster;

    #[test]
    fn offset_accounts_for_half_round_trip() {
        // Sent at 100, received at 102, remote said 200 -> remote now ~201.
        let offset = estimate_offset(100.0, 102.0, 200.0);
        assert!((offset - 99.0).abs() < 1e-9);
        assert_eq!(estimate_offset(5.0, 5.0, 5.0), 0.0);
    }

    #[tokio::test]
    async fn coordinator_does_not_sync() {
        let cluster = TestCluster::new();
        let node = cluster.joined("a").await;
        assert_eq!(sync_once(&node).await, SyncOutcome::IsCoordinator);
    }

    #[tokio::test]
    async fn follower_adopts_coordinator_offset() {
        let cluster = TestCluster::new();
        let a = cluster.joined("a").await;
        let b = cluster.joined("b").await;
        a.offset().set(50.0);
        b.election().on_announcement("a");

        match sync_once(&b).await {
            SyncOutcome::Synced { offset } => assert!((offset - 50.0).abs() < 1.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!((b.offset().get() - 50.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn silent_coordinator_needs_election() {
        let cluster = TestCluster::new();
        let b = cluster.joined("b").await;
        // Registered but no node answers for it.
        cluster.register("ghost");
        b.election().on_announcement("ghost");

        let outcome = sync_once(&b).await;
        assert_eq!(outcome, SyncOutcome::Unreachable);
        assert!(outcome.needs_election());
    }

    #[tokio::test]
    async fn unknown_or_departed_coordinator_needs_election() {
        let cluster = TestCluster::new();
        cluster.register("a");
        let b = cluster.joined("b").await;
        assert_eq!(sync_once(&b).await, SyncOutcome::NoCoordinator);

        b.election().on_announcement("gone");
        assert_eq!(sync_once(&b).await, SyncOutcome::NoCoordinator);
    }
}
