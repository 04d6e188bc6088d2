//! Request handlers.
//!
//! [`Dispatcher`] serves the client-facing endpoint: it detects the wire
//! format, folds the request clock in, routes by service name, and encodes
//! the reply in the format the request arrived in. The [`peer`] module
//! serves the sync and replication endpoints.

mod account;
mod channel;
mod messaging;
pub mod peer;

use crate::error::{ServiceError, ServiceResult};
use crate::state::{Node, unix_now};
use crate::telemetry::{RequestTimer, spans};
use board_proto::{ProtocolError, Request, decode_request};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Client-facing services, including historical aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Login,
    Users,
    Channel,
    Channels,
    Publish,
    Message,
}

impl Service {
    /// Resolve a service name or one of its aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "login" => Some(Self::Login),
            "users" | "listar" => Some(Self::Users),
            "channel" | "cadastrarCanal" => Some(Self::Channel),
            "channels" | "listarCanal" => Some(Self::Channels),
            "publish" => Some(Self::Publish),
            "message" => Some(Self::Message),
            _ => None,
        }
    }

    /// Canonical name, echoed in replies and used for replication.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Users => "users",
            Self::Channel => "channel",
            Self::Channels => "channels",
            Self::Publish => "publish",
            Self::Message => "message",
        }
    }
}

/// Routes decoded client requests to their service handler.
#[derive(Clone)]
pub struct Dispatcher {
    node: Arc<Node>,
}

impl Dispatcher {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    /// Handle one raw client request.
    ///
    /// Returns `Ok(None)` when the payload is in neither wire format; such
    /// requests are dropped without a reply.
    pub async fn handle(&self, payload: &[u8]) -> Result<Option<Bytes>, ProtocolError> {
        let Some((format, request)) = decode_request(payload).into_parts() else {
            debug!(len = payload.len(), "Dropping undecodable request");
            crate::metrics::record_request_error("unknown", "undecodable");
            return Ok(None);
        };

        self.node.clock().observe(request.clock());

        let service = request.service().and_then(Service::parse);
        let label = service.map_or("unknown", Service::as_str);
        let span = spans::request(label, format.as_str());
        let reply_service = match (service, request.service()) {
            (Some(service), _) => service.as_str().to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => "unknown".to_string(),
        };

        let result = {
            let _timer = RequestTimer::new(label);
            self.route(service, &request).instrument(span).await
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                crate::metrics::record_request_error(label, e.error_code());
                debug!(service = %reply_service, error = %e, "Request rejected");
                e.to_reply(&reply_service, self.node.clock().tick(), unix_now())
            }
        };

        Ok(Some(Bytes::from(format.encode(&reply)?)))
    }

    async fn route(&self, service: Option<Service>, request: &Request) -> ServiceResult {
        let node = &self.node;
        match service {
            Some(Service::Login) => account::login(node, request).await,
            Some(Service::Users) => Ok(account::users(node)),
            Some(Service::Channel) => channel::create(node, request).await,
            Some(Service::Channels) => Ok(channel::list(node)),
            Some(Service::Publish) => messaging::publish(node, request).await,
            Some(Service::Message) => messaging::message(node, request).await,
            None => Err(ServiceError::UnknownService(
                request.service().unwrap_or("unknown").to_string(),
            )),
        }
    }
}
