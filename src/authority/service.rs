//! Request handling for the membership authority.

use super::registry::MembershipRegistry;
use crate::network::Endpoint;
use crate::state::{SharedClock, unix_now};
use crate::telemetry::{RequestTimer, spans};
use board_proto::{ProtocolError, Reply, Request, decode_request, status};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Serves `rank`, `heartbeat` and `list`.
#[derive(Clone)]
pub struct AuthorityService {
    registry: Arc<MembershipRegistry>,
    clock: SharedClock,
}

impl AuthorityService {
    pub fn new(registry: Arc<MembershipRegistry>) -> Self {
        Self {
            registry,
            clock: SharedClock::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MembershipRegistry> {
        &self.registry
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Handle one raw request. Undecodable payloads get no reply.
    pub async fn handle(&self, payload: &[u8]) -> Result<Option<Bytes>, ProtocolError> {
        let Some((format, request)) = decode_request(payload).into_parts() else {
            debug!(len = payload.len(), "Dropping undecodable authority request");
            crate::metrics::record_request_error("authority", "undecodable");
            return Ok(None);
        };
        self.clock.observe(request.clock());

        let service = request.service().unwrap_or(status::UNKNOWN).to_string();
        let label = match service.as_str() {
            "rank" => "rank",
            "heartbeat" => "heartbeat",
            "list" => "list",
            _ => "unknown",
        };
        let reply = {
            let _timer = RequestTimer::new(label);
            spans::request(label, format.as_str()).in_scope(|| self.route(&service, &request))
        };

        Ok(Some(Bytes::from(format.encode(&reply)?)))
    }

    fn route(&self, service: &str, request: &Request) -> Reply {
        let name = request.data().user.filter(|name| !name.trim().is_empty());
        let reply = Reply::new(service, self.clock.tick(), unix_now());

        match (service, name) {
            ("rank", Some(name)) => reply.with_rank(self.registry.rank(&name)),
            ("heartbeat", Some(name)) => {
                if self.registry.heartbeat(&name) {
                    reply.with_status(status::OK)
                } else {
                    debug!(server = %name, "Heartbeat from unknown server");
                    reply.with_status(status::UNKNOWN)
                }
            }
            ("rank" | "heartbeat", None) => {
                crate::metrics::record_request_error(service_label(service), "missing_name");
                reply
                    .with_status(status::ERROR)
                    .with_message(status::MISSING_NAME)
            }
            ("list", _) => reply.with_list(self.registry.list()),
            _ => {
                crate::metrics::record_request_error("unknown", "unknown_service");
                reply
                    .with_status(status::ERROR)
                    .with_message(status::UNRECOGNIZED_SERVICE)
            }
        }
    }

    /// Serve `endpoint` until its listener stops.
    pub async fn run(self, endpoint: Endpoint) {
        let mut inbound = endpoint.spawn(256);
        while let Some(request) = inbound.recv().await {
            let reply = match self.handle(&request.payload).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Failed to encode authority reply");
                    None
                }
            };
            request.respond(reply);
        }
        info!("Authority endpoint closed");
    }

    /// Prune idle servers every `interval`.
    pub fn spawn_pruner(&self, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for name in registry.prune() {
                    info!(server = %name, "Pruned idle server");
                }
            }
        })
    }
}

fn service_label(service: &str) -> &'static str {
    if service == "rank" { "rank" } else { "heartbeat" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_proto::{RequestData, WireFormat};

    fn service() -> AuthorityService {
        AuthorityService::new(Arc::new(MembershipRegistry::new(
            1,
            Duration::from_secs(30),
        )))
    }

    async fn call(service: &AuthorityService, name: &str, user: Option<&str>) -> Reply {
        let mut data = RequestData::default().with_clock(3);
        if let Some(user) = user {
            data = data.with_user(user);
        }
        let raw = service
            .handle(&WireFormat::Binary.encode(&Request::new(name, data)).unwrap())
            .await
            .unwrap()
            .unwrap();
        WireFormat::Binary.decode(&raw).unwrap()
    }

    #[tokio::test]
    async fn rank_then_list() {
        let service = service();
        assert_eq!(call(&service, "rank", Some("A")).await.data.rank, Some(1));
        assert_eq!(call(&service, "rank", Some("B")).await.data.rank, Some(2));

        let list = call(&service, "list", None).await.data.list.unwrap();
        let names: Vec<_> = list.iter().map(|e| (e.name.as_str(), e.rank)).collect();
        assert_eq!(names, vec![("A", 1), ("B", 2)]);
    }

    #[tokio::test]
    async fn heartbeat_reports_unknown_servers() {
        let service = service();
        let reply = call(&service, "heartbeat", Some("A")).await;
        assert_eq!(reply.status(), Some(status::UNKNOWN));

        call(&service, "rank", Some("A")).await;
        let reply = call(&service, "heartbeat", Some("A")).await;
        assert_eq!(reply.status(), Some(status::OK));
    }

    #[tokio::test]
    async fn missing_name_is_an_error() {
        let service = service();
        let reply = call(&service, "rank", None).await;
        assert_eq!(reply.status(), Some(status::ERROR));
        assert_eq!(reply.data.message.as_deref(), Some(status::MISSING_NAME));
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn unknown_service_and_clock() {
        let service = service();
        let reply = call(&service, "election", Some("A")).await;
        assert_eq!(reply.service, "election");
        assert_eq!(
            reply.data.message.as_deref(),
            Some(status::UNRECOGNIZED_SERVICE)
        );
        // Observed 3, then ticked once for the reply.
        assert_eq!(reply.data.clock, 4);
    }

    #[tokio::test]
    async fn json_request_gets_json_reply() {
        let service = service();
        let raw = service
            .handle(br#"{"service":"rank","data":{"user":"A"}}"#)
            .await
            .unwrap()
            .unwrap();
        let reply: Reply = serde_json::from_slice(&raw).unwrap();
        assert_eq!(reply.data.rank, Some(1));
    }
}
