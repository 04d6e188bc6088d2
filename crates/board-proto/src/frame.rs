//! Length-delimited framing for request/reply connections.
//!
//! Each frame is a 4-byte big-endian length followed by the payload. A
//! connection carries strictly alternating request and reply frames.

use tokio_util::codec::LengthDelimitedCodec;

/// Upper bound on a single frame; larger frames are rejected by the codec.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Build the codec used by every endpoint and client.
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}
