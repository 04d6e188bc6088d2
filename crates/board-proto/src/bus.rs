//! Fan-out bus frames.
//!
//! The bus relay speaks a tiny frame vocabulary inside the same
//! length-delimited framing used for request/reply:
//!
//! | kind   | layout                                   |
//! |--------|------------------------------------------|
//! | `0x00` | unsubscribe: `topic`                     |
//! | `0x01` | subscribe: `topic`                       |
//! | `0x02` | publication: `u16 topic_len, topic, payload` |
//!
//! Publications flow in both directions: publishers send them to the relay
//! and the relay delivers them to every subscriber of the topic.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const KIND_UNSUBSCRIBE: u8 = 0x00;
const KIND_SUBSCRIBE: u8 = 0x01;
const KIND_PUBLICATION: u8 = 0x02;

/// A payload published on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Topic name (channel, user name, or `servers`).
    pub topic: String,
    /// Opaque payload, usually a MessagePack envelope.
    pub payload: Bytes,
}

impl Publication {
    /// Create a publication.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// One frame exchanged with the bus relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusFrame {
    /// Start receiving publications on a topic.
    Subscribe(String),
    /// Stop receiving publications on a topic.
    Unsubscribe(String),
    /// A publication.
    Publish(Publication),
}

impl BusFrame {
    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Self::Subscribe(topic) => {
                dst.reserve(1 + topic.len());
                dst.put_u8(KIND_SUBSCRIBE);
                dst.put_slice(topic.as_bytes());
            }
            Self::Unsubscribe(topic) => {
                dst.reserve(1 + topic.len());
                dst.put_u8(KIND_UNSUBSCRIBE);
                dst.put_slice(topic.as_bytes());
            }
            Self::Publish(publication) => {
                let topic = publication.topic.as_bytes();
                let topic_len =
                    u16::try_from(topic.len()).map_err(|_| ProtocolError::TopicTooLong(topic.len()))?;
                dst.reserve(3 + topic.len() + publication.payload.len());
                dst.put_u8(KIND_PUBLICATION);
                dst.put_u16(topic_len);
                dst.put_slice(topic);
                dst.put_slice(&publication.payload);
            }
        }
        Ok(())
    }

    /// Decode one complete frame.
    pub fn decode(mut src: Bytes) -> Result<Self> {
        if src.is_empty() {
            return Err(ProtocolError::InvalidFrameKind(None));
        }
        match src.get_u8() {
            KIND_SUBSCRIBE => Ok(Self::Subscribe(topic_from(&src)?)),
            KIND_UNSUBSCRIBE => Ok(Self::Unsubscribe(topic_from(&src)?)),
            KIND_PUBLICATION => {
                if src.remaining() < 2 {
                    return Err(ProtocolError::TruncatedFrame);
                }
                let topic_len = usize::from(src.get_u16());
                if src.remaining() < topic_len {
                    return Err(ProtocolError::TruncatedFrame);
                }
                let topic = src.split_to(topic_len);
                Ok(Self::Publish(Publication {
                    topic: topic_from(&topic)?,
                    payload: src,
                }))
            }
            other => Err(ProtocolError::InvalidFrameKind(Some(other))),
        }
    }
}

fn topic_from(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_layout() {
        let bytes = BusFrame::Subscribe("servers".into()).to_bytes().unwrap();
        assert_eq!(&bytes[..], b"\x01servers");
    }

    #[test]
    fn test_publication_keeps_payload_intact() {
        let payload = Bytes::from_static(b"\x82\xa4type\xa7channel");
        let frame = BusFrame::Publish(Publication::new("geral", payload.clone()));
        let decoded = BusFrame::decode(frame.to_bytes().unwrap()).unwrap();
        match decoded {
            BusFrame::Publish(p) => {
                assert_eq!(p.topic, "geral");
                assert_eq!(p.payload, payload);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_empty_payload_publication() {
        let frame = BusFrame::Publish(Publication::new("t", Bytes::new()));
        let decoded = BusFrame::decode(frame.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_truncated_publication_is_rejected() {
        let bytes = Bytes::from_static(b"\x02\x00\x09abc");
        assert!(matches!(
            BusFrame::decode(bytes),
            Err(ProtocolError::TruncatedFrame)
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(matches!(
            BusFrame::decode(Bytes::from_static(b"\x07x")),
            Err(ProtocolError::InvalidFrameKind(Some(7)))
        ));
        assert!(matches!(
            BusFrame::decode(Bytes::new()),
            Err(ProtocolError::InvalidFrameKind(None))
        ));
    }
}
