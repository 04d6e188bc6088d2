//! Best-effort replication.
//!
//! Every accepted mutation is pushed, tagged `replicated`, to each other
//! live server. Pushes run in the background, use the peer timeout, and are
//! never retried. The receiving side applies users and channels only if
//! absent, and appends publications and messages unconditionally.

use crate::handlers::Service;
use crate::network::PeerEndpoint;
use crate::state::{MessageRecord, Node, PublicationRecord};
use board_proto::{ReplicationAck, Request, RequestData, WireFormat, decode_any};
use bytes::Bytes;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Push `data` for `service` to every other live server, in the background.
pub fn replicate(node: &Arc<Node>, service: Service, data: RequestData) {
    let request = Request::new(service.as_str(), data).replicated_copy();
    let node = Arc::clone(node);
    tokio::spawn(async move {
        push(&node, &request).await;
    });
}

/// Send `request` to every member except this node. Returns how many
/// peers acknowledged.
pub async fn push(node: &Node, request: &Request) -> usize {
    let members = match node.membership().list().await {
        Ok(members) => members,
        Err(e) => {
            warn!(error = %e, "Replication skipped: membership unavailable");
            crate::metrics::record_replication("no_membership");
            return 0;
        }
    };
    let payload = match WireFormat::Binary.encode(request) {
        Ok(payload) => Bytes::from(payload),
        Err(e) => {
            warn!(error = %e, "Failed to encode replicated request");
            return 0;
        }
    };

    let timeout = node.timing().peer_timeout();
    let sends = members
        .iter()
        .filter(|m| m.name != node.name())
        .map(|m| {
            let payload = payload.clone();
            async move {
                let result = node
                    .peers()
                    .call(&m.name, PeerEndpoint::Replication, payload, timeout)
                    .await;
                (m.name.as_str(), result)
            }
        });

    let mut acknowledged = 0;
    for (peer, result) in join_all(sends).await {
        let decoded =
            result.and_then(|raw| decode_any::<ReplicationAck>(&raw).map_err(Into::into));
        match decoded {
            Ok((_, ack)) => {
                node.clock().observe(ack.clock);
                acknowledged += 1;
                crate::metrics::record_replication("ok");
                debug!(peer, status = %ack.status, "Replicated");
            }
            Err(e) => {
                crate::metrics::record_replication("failed");
                debug!(peer, error = %e, "Replication push failed");
            }
        }
    }
    acknowledged
}

/// Apply a replicated request to the local store.
///
/// Untagged requests and services that do not mutate are ignored.
pub async fn apply(node: &Node, request: &Request) -> ReplicationAck {
    if !request.replicated {
        return ReplicationAck::ignored();
    }
    node.clock().observe(request.clock());
    let Some(service) = request.service().and_then(Service::parse) else {
        return ReplicationAck::ignored();
    };

    let data = request.data();
    let store = node.store();
    let applied = match service {
        Service::Login => match data.user {
            Some(user) => {
                store.insert_user_if_absent(&user, data.timestamp).await;
                true
            }
            None => false,
        },
        Service::Channel => match data.channel {
            Some(channel) => {
                store.insert_channel_if_absent(&channel, data.timestamp).await;
                true
            }
            None => false,
        },
        Service::Publish => match data.channel {
            Some(channel) => {
                store
                    .append_publication(PublicationRecord {
                        user: data.user,
                        channel,
                        message: data.message,
                        timestamp: data.timestamp,
                    })
                    .await;
                true
            }
            None => false,
        },
        Service::Message => match data.dst {
            Some(dst) => {
                store
                    .append_message(MessageRecord {
                        src: data.src,
                        dst,
                        message: data.message,
                        timestamp: data.timestamp,
                    })
                    .await;
                true
            }
            None => false,
        },
        Service::Users | Service::Channels => false,
    };

    if applied {
        debug!(service = service.as_str(), "Applied replicated mutation");
        ReplicationAck::ok(node.clock().tick())
    } else {
        ReplicationAck::ignored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCluster;
    use board_proto::status;

    fn replicated(service: &str, data: RequestData) -> Request {
        Request::new(service, data).replicated_copy()
    }

    #[tokio::test]
    async fn untagged_input_is_ignored() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        let req = Request::new("login", RequestData::default().with_user("alice"));
        let ack = apply(&node, &req).await;
        assert_eq!(ack.status, status::IGNORED);
        assert!(node.store().user_names().is_empty());
    }

    #[tokio::test]
    async fn login_and_channel_apply_once() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        let login = replicated("login", RequestData::default().with_user("alice"));
        let channel = replicated("channel", RequestData::default().with_channel("geral"));

        for _ in 0..2 {
            assert_eq!(apply(&node, &login).await.status, status::OK);
            assert_eq!(apply(&node, &channel).await.status, status::OK);
        }
        assert_eq!(node.store().user_names(), vec!["alice".to_string()]);
        assert_eq!(node.store().channel_names(), vec!["geral".to_string()]);
    }

    #[tokio::test]
    async fn publish_and_message_append_every_time() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        // No referential checks on the replica side.
        let publish = replicated(
            "publish",
            RequestData::default()
                .with_user("alice")
                .with_channel("geral")
                .with_message("hi"),
        );
        let message = replicated(
            "message",
            RequestData::default()
                .with_src("alice")
                .with_dst("bob")
                .with_message("psst"),
        );
        for _ in 0..2 {
            apply(&node, &publish).await;
            apply(&node, &message).await;
        }
        assert_eq!(node.store().publications().len(), 2);
        assert_eq!(node.store().messages().len(), 2);
    }

    #[tokio::test]
    async fn ack_clock_follows_sender() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        let req = replicated(
            "login",
            RequestData::default().with_user("alice").with_clock(41),
        );
        let ack = apply(&node, &req).await;
        assert_eq!(ack.clock, Some(42));
    }

    #[tokio::test]
    async fn reads_are_not_replicable() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        let ack = apply(&node, &replicated("users", RequestData::default())).await;
        assert_eq!(ack.status, status::IGNORED);
    }

    #[tokio::test]
    async fn push_reaches_every_other_member() {
        let cluster = TestCluster::new();
        let a = cluster.joined("a").await;
        let b = cluster.joined("b").await;
        let c = cluster.joined("c").await;
        // Listed but absent: counted as a failed push.
        cluster.register("d");

        let req = replicated("login", RequestData::default().with_user("alice"));
        assert_eq!(push(&a, &req).await, 2);
        assert_eq!(b.store().user_names(), vec!["alice".to_string()]);
        assert_eq!(c.store().user_names(), vec!["alice".to_string()]);
        assert!(a.store().user_names().is_empty());
    }
}
