//! Unified error handling for boardd.
//!
//! Three families, matching how failures are surfaced:
//! - [`ServiceError`]: domain errors, answered to the client as `status=erro`.
//! - [`TransportError`]: timeouts and connection failures, logged and absorbed
//!   by the background task that hit them.
//! - [`StoreError`]: persistence failures, logged at the store boundary.

use board_proto::{ProtocolError, Reply, status};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Service Errors (request handling)
// ============================================================================

/// Errors a client-facing service can answer with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("user already registered: {0}")]
    UserExists(String),

    #[error("channel already exists: {0}")]
    ChannelExists(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("no such user: {0}")]
    NoSuchUser(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unknown service: {0}")]
    UnknownService(String),
}

impl ServiceError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserExists(_) => "user_exists",
            Self::ChannelExists(_) => "channel_exists",
            Self::NoSuchChannel(_) => "no_such_channel",
            Self::NoSuchUser(_) => "no_such_user",
            Self::MissingField(_) => "missing_field",
            Self::UnknownService(_) => "unknown_service",
        }
    }

    /// Convert to the error reply sent back to the client.
    ///
    /// `login`/`channel` errors carry a `description`; `publish`/`message`
    /// errors carry a `message`, as existing clients expect.
    pub fn to_reply(&self, service: &str, clock: u64, timestamp: f64) -> Reply {
        let reply = Reply::new(service, clock, timestamp).with_status(status::ERROR);
        match self {
            Self::UserExists(_) => reply.with_description(status::USER_EXISTS),
            Self::ChannelExists(_) => reply.with_description(status::CHANNEL_EXISTS),
            Self::NoSuchChannel(_) => reply.with_message(status::NO_SUCH_CHANNEL),
            Self::NoSuchUser(_) => reply.with_message(status::NO_SUCH_USER),
            Self::MissingField(field) => {
                reply.with_description(format!("Campo obrigatorio ausente: {field}"))
            }
            Self::UnknownService(_) => reply.with_description(status::UNKNOWN_SERVICE),
        }
    }
}

/// Result type for service handlers.
pub type ServiceResult = Result<Reply, ServiceError>;

// ============================================================================
// Transport Errors (outbound calls)
// ============================================================================

/// Failures talking to the authority, a peer, or the bus.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by remote")]
    Closed,

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl TransportError {
    /// Whether the remote should be considered dead for this cycle.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connect { .. } | Self::Closed
        )
    }

    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Connect { .. } => "connect",
            Self::Io(_) => "io",
            Self::Protocol(_) => "protocol",
            Self::Closed => "closed",
            Self::UnexpectedReply(_) => "unexpected_reply",
        }
    }
}

// ============================================================================
// Store Errors (persisted documents)
// ============================================================================

/// Failures reading or writing a persisted collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_codes() {
        assert_eq!(ServiceError::UserExists("a".into()).error_code(), "user_exists");
        assert_eq!(
            ServiceError::UnknownService("x".into()).error_code(),
            "unknown_service"
        );
    }

    #[test]
    fn test_login_error_uses_description() {
        let reply = ServiceError::UserExists("alice".into()).to_reply("login", 4, 1.0);
        assert_eq!(reply.status(), Some("erro"));
        assert_eq!(reply.data.description.as_deref(), Some("Usuário já cadastrado"));
        assert!(reply.data.message.is_none());
        assert_eq!(reply.data.clock, 4);
    }

    #[test]
    fn test_message_error_uses_message_field() {
        let reply = ServiceError::NoSuchUser("bob".into()).to_reply("message", 2, 1.0);
        assert_eq!(reply.data.message.as_deref(), Some("Usuario nao existe"));
        assert!(reply.data.description.is_none());
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(TransportError::Timeout(Duration::from_secs(2)).is_unreachable());
        assert!(TransportError::Closed.is_unreachable());
        assert!(!TransportError::UnexpectedReply("x".into()).is_unreachable());
    }
}
