//! Registration with the membership authority and the heartbeat loop.

use crate::network::HeartbeatStatus;
use crate::state::Node;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Register until the authority answers; returns the assigned rank.
pub async fn register(node: &Node) -> u64 {
    loop {
        match node.membership().register(node.name()).await {
            Ok(rank) => {
                node.election().set_rank(rank);
                info!(rank, "Registered with membership authority");
                return rank;
            }
            Err(e) => {
                warn!(error = %e, "Registration failed, retrying");
                tokio::time::sleep(node.timing().heartbeat_interval()).await;
            }
        }
    }
}

/// One heartbeat. Re-registers if the authority has forgotten this node.
pub async fn beat(node: &Node) {
    match node.membership().heartbeat(node.name()).await {
        Ok(HeartbeatStatus::Ok) => debug!("Heartbeat acknowledged"),
        Ok(HeartbeatStatus::Unknown) => {
            warn!("Authority no longer knows this node, re-registering");
            match node.membership().register(node.name()).await {
                Ok(rank) => {
                    node.election().set_rank(rank);
                    info!(rank, "Re-registered with membership authority");
                }
                Err(e) => warn!(error = %e, "Re-registration failed"),
            }
        }
        Err(e) => warn!(error = %e, "Heartbeat failed"),
    }
}

/// Heartbeat every heartbeat interval for the lifetime of the process.
pub async fn run(node: Arc<Node>) {
    let mut ticker = tokio::time::interval(node.timing().heartbeat_interval());
    ticker.tick().await;
    loop {
        ticker.tick().await;
        beat(&node).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCluster;

    #[tokio::test]
    async fn register_sets_rank() {
        let cluster = TestCluster::new();
        cluster.register("other");
        let node = cluster.node("a").await;
        assert_eq!(register(&node).await, 2);
        assert_eq!(node.election().own_rank(), Some(2));
    }

    #[tokio::test]
    async fn pruned_node_gets_a_new_rank() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        assert_eq!(register(&node).await, 1);

        cluster.membership.expire_all();
        beat(&node).await;
        assert_eq!(node.election().own_rank(), Some(2));
    }

    #[tokio::test]
    async fn outage_keeps_rank() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        register(&node).await;
        cluster.membership.set_down(true);
        beat(&node).await;
        assert_eq!(node.election().own_rank(), Some(1));
    }
}
