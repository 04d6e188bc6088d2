//! Dual-format payload codec.
//!
//! Clients may speak either MessagePack (compact binary object encoding) or
//! JSON (textual object encoding). Decoding runs an ordered list of decoders
//! and tags the result with the format that matched, so the reply can be
//! encoded in kind.

use crate::error::{ProtocolError, Result};
use crate::message::Request;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encoding used for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// MessagePack with named fields.
    Binary,
    /// UTF-8 JSON.
    Text,
}

/// Decoders in the order they are attempted.
const DECODE_ORDER: [WireFormat; 2] = [WireFormat::Binary, WireFormat::Text];

impl WireFormat {
    /// Decode `bytes` strictly in this format.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Self::Binary => Ok(rmp_serde::from_slice(bytes)?),
            Self::Text => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// Encode `value` in this format.
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Binary => Ok(rmp_serde::to_vec_named(value)?),
            Self::Text => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "msgpack",
            Self::Text => "json",
        }
    }
}

/// Outcome of auto-detecting a payload's encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T = Request> {
    /// Decoded as MessagePack.
    Binary(T),
    /// Decoded as JSON.
    Text(T),
    /// No decoder accepted the payload.
    Unrecognized,
}

impl<T> Decoded<T> {
    /// The matched format, if any.
    pub fn format(&self) -> Option<WireFormat> {
        match self {
            Self::Binary(_) => Some(WireFormat::Binary),
            Self::Text(_) => Some(WireFormat::Text),
            Self::Unrecognized => None,
        }
    }

    /// Split into the matched format and value.
    pub fn into_parts(self) -> Option<(WireFormat, T)> {
        match self {
            Self::Binary(value) => Some((WireFormat::Binary, value)),
            Self::Text(value) => Some((WireFormat::Text, value)),
            Self::Unrecognized => None,
        }
    }

    fn tagged(format: WireFormat, value: T) -> Self {
        match format {
            WireFormat::Binary => Self::Binary(value),
            WireFormat::Text => Self::Text(value),
        }
    }
}

/// Decode `bytes` as `T`, trying MessagePack first and JSON second.
pub fn decode_as<T: DeserializeOwned>(bytes: &[u8]) -> Decoded<T> {
    for format in DECODE_ORDER {
        if let Ok(value) = format.decode::<T>(bytes) {
            return Decoded::tagged(format, value);
        }
    }
    Decoded::Unrecognized
}

/// Decode a client request with format auto-detection.
pub fn decode_request(bytes: &[u8]) -> Decoded<Request> {
    decode_as(bytes)
}

/// Encode `value` in `format`.
pub fn encode<T: Serialize + ?Sized>(format: WireFormat, value: &T) -> Result<Vec<u8>> {
    format.encode(value)
}

/// Decode `bytes` as `T`, failing with [`ProtocolError::Unrecognized`]
/// when neither format matches.
pub fn decode_any<T: DeserializeOwned>(bytes: &[u8]) -> Result<(WireFormat, T)> {
    decode_as(bytes)
        .into_parts()
        .ok_or(ProtocolError::Unrecognized { len: bytes.len() })
}
