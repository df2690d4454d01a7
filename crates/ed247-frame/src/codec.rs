use bytes::{Buf, BufMut, Bytes};

use crate::error::{FrameError, Result};
use crate::timestamp::Timestamp;

/// Frame header: component id (2) + sequence (2) + transport timestamp (8).
pub const HEADER_SIZE: usize = 12;

/// Segment prefix on multiplexed channels: stream uid (2) + size (2).
pub const SEGMENT_PREFIX_SIZE: usize = 4;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Channel frame header.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬──────────────┐
/// │ Component id │ Sequence     │ Epoch s      │ Offset ns    │
/// │ (2B BE)      │ (2B BE)      │ (4B BE)      │ (4B BE)      │
/// └──────────────┴──────────────┴──────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub component_identifier: u16,
    pub sequence_number: u16,
    pub transport_timestamp: Timestamp,
}

impl FrameHeader {
    pub fn encode(&self, mut dst: impl BufMut) {
        dst.put_u16(self.component_identifier);
        dst.put_u16(self.sequence_number);
        self.transport_timestamp.put(&mut dst);
    }

    pub fn decode(mut src: impl Buf) -> Result<Self> {
        if src.remaining() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: HEADER_SIZE,
                available: src.remaining(),
            });
        }
        let component_identifier = src.get_u16();
        let sequence_number = src.get_u16();
        let transport_timestamp = Timestamp::get(&mut src);
        Ok(Self {
            component_identifier,
            sequence_number,
            transport_timestamp,
        })
    }
}

/// Shape of a channel's frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Frames start with a [`FrameHeader`].
    pub header: bool,
    /// Streams are wrapped in uid/size segments. Simple channels carry one
    /// bare stream payload instead.
    pub multiplexed: bool,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            header: true,
            multiplexed: true,
        }
    }
}

/// One stream's slice of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Stream uid, `None` on simple channels.
    pub uid: Option<u16>,
    pub payload: Bytes,
}

/// A fully parsed channel frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub header: Option<FrameHeader>,
    pub segments: Vec<Segment>,
}

/// Parse a whole channel frame.
///
/// The frame is split completely before returning, so a caller never acts
/// on the first segments of a frame whose tail is corrupt. Segment payloads
/// share the frame's buffer.
pub fn decode_frame(frame: Bytes, layout: FrameLayout) -> Result<DecodedFrame> {
    let mut src = frame;

    let header = if layout.header {
        let header = FrameHeader::decode(&src[..])?;
        src.advance(HEADER_SIZE);
        Some(header)
    } else {
        None
    };

    let mut segments = Vec::new();
    if !layout.multiplexed {
        segments.push(Segment {
            uid: None,
            payload: src,
        });
        return Ok(DecodedFrame { header, segments });
    }

    while src.has_remaining() {
        if src.remaining() < SEGMENT_PREFIX_SIZE {
            return Err(FrameError::Truncated {
                needed: SEGMENT_PREFIX_SIZE,
                available: src.remaining(),
            });
        }
        let uid = src.get_u16();
        let size = usize::from(src.get_u16());
        if src.remaining() < size {
            return Err(FrameError::Truncated {
                needed: size,
                available: src.remaining(),
            });
        }
        segments.push(Segment {
            uid: Some(uid),
            payload: src.split_to(size),
        });
    }

    Ok(DecodedFrame { header, segments })
}
