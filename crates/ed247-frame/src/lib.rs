//! ED-247 channel frame and stream payload codec.
//!
//! A channel frame is one datagram carrying samples of every stream that
//! shares the channel:
//! - An optional 12-byte header (producer id, sequence number, transport
//!   timestamp), big-endian
//! - One segment per stream (`uid`, `size`, payload), or a bare payload on
//!   simple channels
//!
//! Stream payloads pack samples back to back with an optional data
//! timestamp and a size prefix whose width depends on the stream kind.

pub mod assembler;
pub mod codec;
pub mod error;
pub mod kind;
pub mod payload;
pub mod timestamp;

pub use assembler::FrameAssembler;
pub use codec::{
    decode_frame, DecodedFrame, FrameHeader, FrameLayout, Segment, HEADER_SIZE,
    MAX_DATAGRAM_SIZE, SEGMENT_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use kind::{DataTimestampMode, NadType, SizePrefix, StreamKind, StreamLayout};
pub use payload::{decode_stream_payload, Append, DecodedSample, StreamEncoder};
pub use timestamp::Timestamp;
