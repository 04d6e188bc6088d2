//! Typed envelopes for every message that crosses the wire.
//!
//! All envelopes are plain serde types; the same struct is encoded as a
//! MessagePack map or as a JSON object depending on the [`WireFormat`]
//! chosen by the caller.
//!
//! Field aliases keep older clients working: `opcao`/`dados` for the
//! request envelope and `canal` for the channel name.
//!
//! [`WireFormat`]: crate::WireFormat

use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A request to a server node, the membership authority, or a peer endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Service name (`login`, `publish`, `rank`, `clock`, ...).
    #[serde(default, alias = "opcao", skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Service payload.
    #[serde(default, alias = "dados", skip_serializing_if = "Option::is_none")]
    pub data: Option<RequestData>,
    /// Set on copies pushed by the replication manager.
    #[serde(default, skip_serializing_if = "is_false")]
    pub replicated: bool,
}

impl Request {
    /// Build a request for `service` carrying `data`.
    pub fn new(service: impl Into<String>, data: RequestData) -> Self {
        Self {
            service: Some(service.into()),
            data: Some(data),
            replicated: false,
        }
    }

    /// The service name, if present.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// The payload, or an empty payload when the request carried none.
    pub fn data(&self) -> RequestData {
        self.data.clone().unwrap_or_default()
    }

    /// The clock value carried in the payload, if any.
    pub fn clock(&self) -> Option<u64> {
        self.data.as_ref().and_then(|d| d.clock)
    }

    /// A copy of this request tagged for replication.
    #[must_use]
    pub fn replicated_copy(&self) -> Self {
        Self {
            replicated: true,
            ..self.clone()
        }
    }
}

/// Payload of a [`Request`].
///
/// Every field is optional; each service reads the subset it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestData {
    /// User name (`login`, `publish`) or server name (`rank`, `heartbeat`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Channel name.
    #[serde(alias = "canal", skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Private message sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Private message recipient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    /// Sender wall-clock time, seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Sender Lamport clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<u64>,
}

impl RequestData {
    /// Set `user`.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set `channel`.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Set `message`.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set `src`.
    #[must_use]
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    /// Set `dst`.
    #[must_use]
    pub fn with_dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = Some(dst.into());
        self
    }

    /// Set `timestamp`.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: u64) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// One live server as reported by the membership authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Server name.
    pub name: String,
    /// Election priority; higher wins.
    pub rank: u64,
}

/// A reply from any request/reply endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Echo of the service that was handled.
    pub service: String,
    /// Reply payload.
    #[serde(default)]
    pub data: ReplyData,
}

/// Payload of a [`Reply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyData {
    /// Outcome (`sucesso`, `OK`, `erro`, `unknown`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Human-readable error message (used by `publish`/`message`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `users` listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    /// `channels` listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
    /// Rank assigned by the authority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    /// Live membership.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<ServerEntry>>,
    /// Adjusted physical time for clock synchronization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Election acknowledgement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub election: Option<String>,
    /// Server-local wall-clock time of the reply.
    pub timestamp: f64,
    /// Lamport clock after the replier's tick.
    pub clock: u64,
}

impl Reply {
    /// Start a reply for `service` stamped with `clock` and `timestamp`.
    pub fn new(service: impl Into<String>, clock: u64, timestamp: f64) -> Self {
        Self {
            service: service.into(),
            data: ReplyData {
                timestamp,
                clock,
                ..ReplyData::default()
            },
        }
    }

    /// Set `status`.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.data.status = Some(status.into());
        self
    }

    /// Set `description`.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.data.description = Some(description.into());
        self
    }

    /// Set `message`.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.data.message = Some(message.into());
        self
    }

    /// Set `users`.
    #[must_use]
    pub fn with_users(mut self, users: Vec<String>) -> Self {
        self.data.users = Some(users);
        self
    }

    /// Set `channels`.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.data.channels = Some(channels);
        self
    }

    /// Set `rank`.
    #[must_use]
    pub fn with_rank(mut self, rank: u64) -> Self {
        self.data.rank = Some(rank);
        self
    }

    /// Set `list`.
    #[must_use]
    pub fn with_list(mut self, list: Vec<ServerEntry>) -> Self {
        self.data.list = Some(list);
        self
    }

    /// Set `time`.
    #[must_use]
    pub fn with_time(mut self, time: f64) -> Self {
        self.data.time = Some(time);
        self
    }

    /// Set `election`.
    #[must_use]
    pub fn with_election(mut self, election: impl Into<String>) -> Self {
        self.data.election = Some(election.into());
        self
    }

    /// The reply status, if any.
    pub fn status(&self) -> Option<&str> {
        self.data.status.as_deref()
    }
}

/// Acknowledgement returned by a replication endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationAck {
    /// `OK` when applied, `ignored` when the input was not a replica.
    pub status: String,
    /// Receiver clock after its tick (absent on `ignored`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<u64>,
}

impl ReplicationAck {
    /// An `OK` acknowledgement.
    pub fn ok(clock: u64) -> Self {
        Self {
            status: crate::status::OK.to_string(),
            clock: Some(clock),
        }
    }

    /// An `ignored` acknowledgement.
    pub fn ignored() -> Self {
        Self {
            status: crate::status::IGNORED.to_string(),
            clock: None,
        }
    }
}

/// Coordinator announcement published on the `servers` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Message kind; `election` for coordinator announcements.
    #[serde(rename = "type")]
    pub kind: String,
    /// Bus topic the announcement was published on.
    #[serde(default)]
    pub topic: String,
    /// Service name; mirrors `kind`.
    #[serde(default)]
    pub service: String,
    /// Announcement payload.
    #[serde(default)]
    pub data: AnnouncementData,
}

/// Payload of an [`Announcement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementData {
    /// Name of the new coordinator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<String>,
    /// Wall-clock time of the announcement.
    pub timestamp: f64,
    /// Announcer clock after its tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<u64>,
}

impl Announcement {
    /// Kind and service value of a coordinator announcement.
    pub const ELECTION: &'static str = "election";

    /// Announce `coordinator` as the winner of an election.
    pub fn election(coordinator: impl Into<String>, timestamp: f64, clock: u64) -> Self {
        Self {
            kind: Self::ELECTION.to_string(),
            topic: crate::SERVERS_TOPIC.to_string(),
            service: Self::ELECTION.to_string(),
            data: AnnouncementData {
                coordinator: Some(coordinator.into()),
                timestamp,
                clock: Some(clock),
            },
        }
    }

    /// The announced coordinator, if this is an election announcement.
    pub fn coordinator(&self) -> Option<&str> {
        if self.kind == Self::ELECTION {
            self.data.coordinator.as_deref()
        } else {
            None
        }
    }
}

/// Channel publication or private message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// `channel` or `user`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Channel name or recipient user name.
    pub topic: String,
    /// Publisher (channel publications).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Channel (channel publications).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Sender (private messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Recipient (private messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    /// Message body.
    #[serde(default)]
    pub message: Option<String>,
    /// Publisher's timestamp from the original request.
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// Server clock after its tick.
    pub clock: u64,
}

impl Notification {
    /// A publication to `channel`.
    pub fn channel(data: &RequestData, channel: &str, clock: u64) -> Self {
        Self {
            kind: "channel".to_string(),
            topic: channel.to_string(),
            user: data.user.clone(),
            channel: Some(channel.to_string()),
            src: None,
            dst: None,
            message: data.message.clone(),
            timestamp: data.timestamp,
            clock,
        }
    }

    /// A private message to `dst`.
    pub fn private(data: &RequestData, dst: &str, clock: u64) -> Self {
        Self {
            kind: "user".to_string(),
            topic: dst.to_string(),
            user: None,
            channel: None,
            src: data.src.clone(),
            dst: Some(dst.to_string()),
            message: data.message.clone(),
            timestamp: data.timestamp,
            clock,
        }
    }
}
