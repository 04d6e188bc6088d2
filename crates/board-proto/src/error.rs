//! Error types for the board protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Protocol-level failures: encoding, decoding and framing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A payload could not be encoded as MessagePack.
    #[error("msgpack encode error: {0}")]
    EncodeBinary(#[from] rmp_serde::encode::Error),

    /// A payload could not be decoded as MessagePack.
    #[error("msgpack decode error: {0}")]
    DecodeBinary(#[from] rmp_serde::decode::Error),

    /// A payload could not be encoded or decoded as JSON.
    #[error("json error: {0}")]
    Text(#[from] serde_json::Error),

    /// Neither decoder accepted the payload.
    #[error("unrecognized payload ({len} bytes)")]
    Unrecognized {
        /// Payload length, for diagnostics.
        len: usize,
    },

    /// A bus frame was empty or carried an unknown kind byte.
    #[error("invalid bus frame kind: {0:?}")]
    InvalidFrameKind(Option<u8>),

    /// A bus frame was shorter than its header claims.
    #[error("truncated bus frame")]
    TruncatedFrame,

    /// A topic was not valid UTF-8.
    #[error("topic is not valid utf-8")]
    InvalidTopic(#[from] std::str::Utf8Error),

    /// A topic exceeds the 16-bit length field.
    #[error("topic too long: {0} bytes")]
    TopicTooLong(usize),
}
