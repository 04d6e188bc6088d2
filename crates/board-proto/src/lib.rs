//! # board-proto
//!
//! Wire protocol shared by the bulletin-board server nodes, the membership
//! authority and their clients.
//!
//! ## Features
//!
//! - Lamport logical clock carried by every message
//! - Typed request, reply, announcement and notification envelopes
//! - Dual wire encoding: MessagePack (preferred) with a JSON fallback,
//!   auto-detected per message and mirrored on the reply
//! - Fan-out bus frames (subscribe / unsubscribe / publication)
//! - Optional Tokio codec for length-delimited request/reply framing
//!
//! ## Quick Start
//!
//! ```rust
//! use board_proto::{decode_request, encode, Decoded, Request, RequestData};
//!
//! let request = Request::new("login", RequestData::default().with_user("alice"));
//! let bytes = encode(board_proto::WireFormat::Binary, &request).unwrap();
//!
//! match decode_request(&bytes) {
//!     Decoded::Binary(req) => assert_eq!(req.service(), Some("login")),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod bus;
pub mod clock;
pub mod codec;
pub mod error;
#[cfg(feature = "tokio")]
pub mod frame;
pub mod message;
pub mod status;

pub use self::bus::{BusFrame, Publication};
pub use self::clock::LamportClock;
pub use self::codec::{decode_any, decode_as, decode_request, encode, Decoded, WireFormat};
pub use self::error::{ProtocolError, Result};
#[cfg(feature = "tokio")]
pub use self::frame::{frame_codec, MAX_FRAME_LEN};
pub use self::message::{
    Announcement, AnnouncementData, Notification, Reply, ReplyData, ReplicationAck, Request,
    RequestData, ServerEntry,
};

/// Topic on which coordinator announcements travel.
pub const SERVERS_TOPIC: &str = "servers";
