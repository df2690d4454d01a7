use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::codec::{FrameHeader, FrameLayout, HEADER_SIZE, SEGMENT_PREFIX_SIZE};
use crate::error::{FrameError, Result};
use crate::kind::StreamLayout;
use crate::payload::StreamEncoder;

/// Builds outgoing channel frames one stream at a time.
///
/// The header slot is reserved by [`begin`](Self::begin) and only filled by
/// [`finish`](Self::finish), so a sequence number is allocated only for
/// frames that actually carry samples.
#[derive(Debug)]
pub struct FrameAssembler {
    layout: FrameLayout,
    max_frame_size: usize,
    buf: BytesMut,
    segments: usize,
}

impl FrameAssembler {
    pub fn new(layout: FrameLayout, max_frame_size: usize) -> Self {
        Self {
            layout,
            max_frame_size,
            buf: BytesMut::with_capacity(max_frame_size),
            segments: 0,
        }
    }

    /// Start a new frame, discarding anything not yet finished.
    pub fn begin(&mut self) {
        self.buf.clear();
        self.segments = 0;
        if self.layout.header {
            self.buf.put_bytes(0, HEADER_SIZE);
        }
    }

    /// Encode one stream's samples into the frame.
    ///
    /// `fill` offers samples to the encoder until it defers one or runs out.
    /// Returns the number of samples written; a stream that wrote nothing
    /// leaves no trace in the frame.
    pub fn encode_stream<F>(&mut self, uid: u16, layout: &StreamLayout, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut StreamEncoder<'_>) -> Result<()>,
    {
        if !self.layout.multiplexed && self.segments > 0 {
            return Err(FrameError::SimpleChannelOverflow);
        }

        let start = self.buf.len();
        if self.layout.multiplexed {
            if start + SEGMENT_PREFIX_SIZE > self.max_frame_size {
                return Ok(0);
            }
            self.buf.put_u16(uid);
            self.buf.put_u16(0);
        }

        let budget = self
            .max_frame_size
            .saturating_sub(self.buf.len())
            .min(u16::MAX as usize);
        let (written, samples) = {
            let mut encoder = StreamEncoder::new(layout, &mut self.buf, budget);
            fill(&mut encoder)?;
            (encoder.written(), encoder.samples())
        };

        if samples == 0 {
            self.buf.truncate(start);
            return Ok(0);
        }
        if self.layout.multiplexed {
            self.buf[start + 2..start + SEGMENT_PREFIX_SIZE]
                .copy_from_slice(&(written as u16).to_be_bytes());
        }
        self.segments += 1;
        trace!(uid, samples, bytes = written, "stream encoded into frame");
        Ok(samples)
    }

    /// Whether no stream has been written since [`begin`](Self::begin).
    pub fn is_empty(&self) -> bool {
        self.segments == 0
    }

    /// Number of streams in the frame so far.
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Complete the frame. Returns `None` if it carries no stream.
    pub fn finish(&mut self, header: FrameHeader) -> Option<Bytes> {
        if self.segments == 0 {
            return None;
        }
        if self.layout.header {
            header.encode(&mut self.buf[..HEADER_SIZE]);
        }
        self.segments = 0;
        Some(self.buf.split().freeze())
    }
}
