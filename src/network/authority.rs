//! TCP client for the membership authority.

use super::client::RequestClient;
use super::traits::{HeartbeatStatus, Membership};
use crate::error::TransportError;
use crate::state::{SharedClock, unix_now};
use async_trait::async_trait;
use board_proto::{Reply, Request, RequestData, ServerEntry, WireFormat, decode_any, status};
use bytes::Bytes;
use std::time::Duration;
use tracing::trace;

/// Talks to the authority over one pooled connection.
///
/// Every request carries this node's clock after a tick, and every reply's
/// clock is folded back in.
pub struct AuthorityClient {
    client: RequestClient,
    clock: SharedClock,
    timeout: Duration,
}

impl AuthorityClient {
    pub fn new(addr: impl Into<String>, clock: SharedClock, timeout: Duration) -> Self {
        Self {
            client: RequestClient::new(addr),
            clock,
            timeout,
        }
    }

    async fn request(&self, service: &str, name: Option<&str>) -> Result<Reply, TransportError> {
        let mut data = RequestData::default()
            .with_timestamp(unix_now())
            .with_clock(self.clock.tick());
        if let Some(name) = name {
            data = data.with_user(name);
        }
        let payload = WireFormat::Binary.encode(&Request::new(service, data))?;

        let raw = self.client.call(Bytes::from(payload), self.timeout).await?;
        let (_, reply): (_, Reply) = decode_any(&raw)?;
        self.clock.update(reply.data.clock);
        trace!(service, clock = reply.data.clock, "Authority replied");

        if reply.status() == Some(status::ERROR) {
            return Err(TransportError::UnexpectedReply(
                reply.data.message.unwrap_or_else(|| status::ERROR.to_string()),
            ));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Membership for AuthorityClient {
    async fn register(&self, name: &str) -> Result<u64, TransportError> {
        let reply = self.request("rank", Some(name)).await?;
        reply
            .data
            .rank
            .ok_or_else(|| TransportError::UnexpectedReply("rank reply without rank".into()))
    }

    async fn heartbeat(&self, name: &str) -> Result<HeartbeatStatus, TransportError> {
        let reply = self.request("heartbeat", Some(name)).await?;
        match reply.status() {
            Some(status::OK) => Ok(HeartbeatStatus::Ok),
            Some(status::UNKNOWN) => Ok(HeartbeatStatus::Unknown),
            other => Err(TransportError::UnexpectedReply(format!(
                "heartbeat status {other:?}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<ServerEntry>, TransportError> {
        let reply = self.request("list", None).await?;
        Ok(reply.data.list.unwrap_or_default())
    }
}
