//! `channel` and `channels`.

use super::Service;
use crate::error::{ServiceError, ServiceResult};
use crate::state::{Node, unix_now};
use crate::sync::replication;
use board_proto::{Reply, Request, status};
use std::sync::Arc;
use tracing::info;

pub async fn create(node: &Arc<Node>, request: &Request) -> ServiceResult {
    let data = request.data();
    let channel = data
        .channel
        .clone()
        .ok_or(ServiceError::MissingField("channel"))?;

    node.store().add_channel(&channel, data.timestamp).await?;
    info!(%channel, "Channel created");
    replication::replicate(node, Service::Channel, data);

    Ok(
        Reply::new(Service::Channel.as_str(), node.clock().tick(), unix_now())
            .with_status(status::SUCCESS),
    )
}

pub fn list(node: &Node) -> Reply {
    let channels = node.store().channel_names();
    Reply::new(Service::Channels.as_str(), node.clock().tick(), unix_now()).with_channels(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_proto::RequestData;
    use crate::testing::TestCluster;

    #[tokio::test]
    async fn duplicate_channel_fails_with_description() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        let req = Request::new("channel", RequestData::default().with_channel("geral"));
        create(&node, &req).await.unwrap();

        let err = create(&node, &req).await.unwrap_err();
        let reply = err.to_reply("channel", 1, 0.0);
        assert_eq!(reply.data.description.as_deref(), Some(status::CHANNEL_EXISTS));
        assert_eq!(list(&node).data.channels, Some(vec!["geral".to_string()]));
    }
}
