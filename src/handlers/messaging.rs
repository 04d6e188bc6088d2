//! `publish` and `message`.
//!
//! Both persist the record, fan a notification out on the bus (channel name
//! or recipient name as topic), then replicate.

use super::Service;
use crate::error::{ServiceError, ServiceResult};
use crate::state::{MessageRecord, Node, PublicationRecord, unix_now};
use crate::sync::replication;
use board_proto::{Notification, Reply, Request, WireFormat, status};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Post to a channel.
pub async fn publish(node: &Arc<Node>, request: &Request) -> ServiceResult {
    let data = request.data();
    let channel = data
        .channel
        .clone()
        .ok_or(ServiceError::MissingField("channel"))?;

    node.store()
        .add_publication(PublicationRecord {
            user: data.user.clone(),
            channel: channel.clone(),
            message: data.message.clone(),
            timestamp: data.timestamp,
        })
        .await?;

    let notification = Notification::channel(&data, &channel, node.clock().tick());
    notify(node, &channel, &notification).await;
    debug!(%channel, "Published");
    replication::replicate(node, Service::Publish, data);

    Ok(Reply::new(Service::Publish.as_str(), node.clock().tick(), unix_now())
        .with_status(status::OK))
}

/// Send a private message to a registered user.
pub async fn message(node: &Arc<Node>, request: &Request) -> ServiceResult {
    let data = request.data();
    let dst = data.dst.clone().ok_or(ServiceError::MissingField("dst"))?;

    node.store()
        .add_message(MessageRecord {
            src: data.src.clone(),
            dst: dst.clone(),
            message: data.message.clone(),
            timestamp: data.timestamp,
        })
        .await?;

    let notification = Notification::private(&data, &dst, node.clock().tick());
    notify(node, &dst, &notification).await;
    debug!(src = ?data.src, %dst, "Message delivered");
    replication::replicate(node, Service::Message, data);

    Ok(Reply::new(Service::Message.as_str(), node.clock().tick(), unix_now())
        .with_status(status::OK))
}

/// Bus failures do not fail the request.
async fn notify(node: &Node, topic: &str, notification: &Notification) {
    let payload = match WireFormat::Binary.encode(notification) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(topic, error = %e, "Failed to encode notification");
            return;
        }
    };
    if let Err(e) = node.bus().publish(topic, Bytes::from(payload)).await {
        warn!(topic, error = %e, "Failed to publish notification");
    }
}
