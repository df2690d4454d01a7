use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::{DataTimestampMode, SizePrefix, StreamLayout};
use crate::timestamp::Timestamp;

/// Outcome of offering a sample to a [`StreamEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// The sample is part of the payload.
    Written,
    /// The sample does not fit this payload and must wait for the next frame.
    Deferred,
}

/// Packs samples of one stream into a payload.
///
/// Wire format of each sample:
/// ```text
/// ┌──────────────────────┬──────────────┬──────────────┐
/// │ Data timestamp       │ Size         │ Data         │
/// │ 8B first, 4B offset  │ 0, 1 or 2B   │ (Size bytes) │
/// │ or none              │ (BE)         │              │
/// └──────────────────────┴──────────────┴──────────────┘
/// ```
#[derive(Debug)]
pub struct StreamEncoder<'a> {
    layout: &'a StreamLayout,
    dst: &'a mut BytesMut,
    budget: usize,
    written: usize,
    samples: usize,
    base: Timestamp,
}

impl<'a> StreamEncoder<'a> {
    /// Append into `dst`, writing at most `budget` bytes.
    pub fn new(layout: &'a StreamLayout, dst: &'a mut BytesMut, budget: usize) -> Self {
        Self {
            layout,
            dst,
            budget,
            written: 0,
            samples: 0,
            base: Timestamp::ZERO,
        }
    }

    /// Offer one sample.
    ///
    /// A sample with no data timestamp is stamped with zero when the stream
    /// carries timestamps.
    pub fn append(&mut self, data: &[u8], data_timestamp: Option<Timestamp>) -> Result<Append> {
        let layout = self.layout;
        if layout.kind.is_fixed_size() && data.len() != layout.sample_max_size {
            return Err(FrameError::SampleSizeMismatch {
                size: data.len(),
                expected: layout.sample_max_size,
            });
        }
        if data.len() > layout.sample_max_size {
            return Err(FrameError::SampleTooLarge {
                size: data.len(),
                max: layout.sample_max_size,
            });
        }
        if self.samples > 0 && layout.single_sample_per_payload() {
            return Ok(Append::Deferred);
        }

        let timestamp = data_timestamp.unwrap_or_default();
        let first = self.samples == 0;
        let mut offset = None;
        let ts_len = match layout.data_timestamp {
            DataTimestampMode::Disabled => 0,
            _ if first => Timestamp::SIZE,
            DataTimestampMode::Enabled => 0,
            DataTimestampMode::SampleOffset => match timestamp.offset_from(&self.base) {
                Some(value) => {
                    offset = Some(value);
                    4
                }
                None => return Ok(Append::Deferred),
            },
        };

        let prefix = layout.size_prefix();
        let needed = ts_len + prefix.len() + data.len();
        if self.written + needed > self.budget {
            return Ok(Append::Deferred);
        }

        if ts_len == Timestamp::SIZE {
            timestamp.put(&mut *self.dst);
            self.base = timestamp;
        } else if let Some(offset) = offset {
            self.dst.put_i32(offset);
        }
        match prefix {
            SizePrefix::None => {}
            SizePrefix::U8 => self.dst.put_u8(data.len() as u8),
            SizePrefix::U16 => self.dst.put_u16(data.len() as u16),
        }
        self.dst.put_slice(data);

        self.written += needed;
        self.samples += 1;
        Ok(Append::Written)
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Samples written so far.
    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// One sample recovered from a stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSample {
    pub data: Bytes,
    pub data_timestamp: Option<Timestamp>,
}

/// Split a stream payload back into samples.
///
/// Every declared size is checked against the bytes left and against the
/// stream bound before anything is returned.
pub fn decode_stream_payload(layout: &StreamLayout, payload: Bytes) -> Result<Vec<DecodedSample>> {
    if layout.kind.is_fixed_size() && layout.sample_max_size == 0 {
        return Err(FrameError::Malformed(format!(
            "{} stream with zero sample size",
            layout.kind
        )));
    }

    let mut src = payload;
    let mut samples = Vec::new();
    let mut base = Timestamp::ZERO;

    while src.has_remaining() {
        if layout.single_sample_per_payload() && !samples.is_empty() {
            break;
        }
        let first = samples.is_empty();
        let data_timestamp = match layout.data_timestamp {
            DataTimestampMode::Disabled => None,
            _ if first => {
                ensure(&src, Timestamp::SIZE)?;
                base = Timestamp::get(&mut src);
                Some(base)
            }
            DataTimestampMode::Enabled => Some(base),
            DataTimestampMode::SampleOffset => {
                ensure(&src, 4)?;
                Some(base.add_offset(src.get_i32()))
            }
        };

        let size = match layout.size_prefix() {
            SizePrefix::U8 => {
                ensure(&src, 1)?;
                usize::from(src.get_u8())
            }
            SizePrefix::U16 => {
                ensure(&src, 2)?;
                usize::from(src.get_u16())
            }
            SizePrefix::None if layout.kind.is_fixed_size() => layout.sample_max_size,
            SizePrefix::None => src.remaining(),
        };
        if size > layout.sample_max_size {
            return Err(FrameError::Malformed(format!(
                "{} sample of {size} bytes exceeds bound {}",
                layout.kind, layout.sample_max_size
            )));
        }
        ensure(&src, size)?;
        let data = src.split_to(size);
        samples.push(DecodedSample {
            data,
            data_timestamp,
        });
    }

    if src.has_remaining() {
        return Err(FrameError::Malformed(format!(
            "{} trailing bytes after single-message payload",
            src.remaining()
        )));
    }

    Ok(samples)
}

fn ensure(src: &Bytes, needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: src.remaining(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::StreamKind;

    fn encode(layout: &StreamLayout, samples: &[(&[u8], Option<Timestamp>)]) -> (Bytes, usize) {
        let mut buf = BytesMut::new();
        let mut enc = StreamEncoder::new(layout, &mut buf, usize::MAX);
        for (data, ts) in samples {
            if enc.append(data, *ts).unwrap() == Append::Deferred {
                break;
            }
        }
        let count = enc.samples();
        (buf.freeze(), count)
    }

    #[test]
    fn a429_samples_are_bare_words() {
        let layout = StreamLayout::new(StreamKind::A429, 4);
        let (bytes, n) = encode(&layout, &[(&[1, 2, 3, 4], None), (&[5, 6, 7, 8], None)]);
        assert_eq!(n, 2);
        assert_eq!(bytes.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        let samples = decode_stream_payload(&layout, bytes).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].data.as_ref(), &[5, 6, 7, 8]);
        assert_eq!(samples[1].data_timestamp, None);
    }

    #[test]
    fn fixed_size_kind_rejects_short_sample() {
        let layout = StreamLayout::new(StreamKind::Discrete, 4);
        let mut buf = BytesMut::new();
        let mut enc = StreamEncoder::new(&layout, &mut buf, usize::MAX);
        let err = enc.append(&[1, 2], None).expect_err("short sample should fail");
        assert!(matches!(
            err,
            FrameError::SampleSizeMismatch {
                size: 2,
                expected: 4
            }
        ));
    }

    #[test]
    fn a825_uses_one_byte_size() {
        let layout = StreamLayout::new(StreamKind::A825, 8);
        let (bytes, _) = encode(&layout, &[(&[0xAA, 0xBB], None)]);
        assert_eq!(bytes.as_ref(), &[2, 0xAA, 0xBB]);
    }

    #[test]
    fn serial_uses_big_endian_size() {
        let layout = StreamLayout::new(StreamKind::Serial, 300);
        let data = vec![7u8; 258];
        let (bytes, _) = encode(&layout, &[(&data, None)]);
        assert_eq!(&bytes[..2], &[0x01, 0x02]);
        let samples = decode_stream_payload(&layout, bytes).unwrap();
        assert_eq!(samples[0].data.len(), 258);
    }

    #[test]
    fn a664_without_message_size_holds_one_sample() {
        let layout = StreamLayout::new(StreamKind::A664, 16).with_message_size(false);
        let (bytes, n) = encode(&layout, &[(b"first", None), (b"second", None)]);
        assert_eq!(n, 1);
        assert_eq!(bytes.as_ref(), b"first");
        let samples = decode_stream_payload(&layout, bytes).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].data.as_ref(), b"first");
    }

    #[test]
    fn timestamp_enabled_later_samples_inherit_first() {
        let layout = StreamLayout::new(StreamKind::Serial, 8)
            .with_data_timestamp(DataTimestampMode::Enabled);
        let t0 = Timestamp::new(10, 5);
        let t1 = Timestamp::new(11, 0);
        let (bytes, _) = encode(&layout, &[(b"a", Some(t0)), (b"b", Some(t1))]);
        assert_eq!(bytes.len(), 8 + 2 + 1 + 2 + 1);
        let samples = decode_stream_payload(&layout, bytes).unwrap();
        assert_eq!(samples[0].data_timestamp, Some(t0));
        assert_eq!(samples[1].data_timestamp, Some(t0));
    }

    #[test]
    fn sample_offset_mode_preserves_each_timestamp() {
        let layout = StreamLayout::new(StreamKind::A429, 4)
            .with_data_timestamp(DataTimestampMode::SampleOffset);
        let t0 = Timestamp::new(10, 900_000_000);
        let t1 = Timestamp::new(11, 100_000_000);
        let t2 = Timestamp::new(10, 800_000_000);
        let (bytes, n) = encode(
            &layout,
            &[(&[0; 4], Some(t0)), (&[1; 4], Some(t1)), (&[2; 4], Some(t2))],
        );
        assert_eq!(n, 3);
        assert_eq!(bytes.len(), (8 + 4) + (4 + 4) + (4 + 4));
        let samples = decode_stream_payload(&layout, bytes).unwrap();
        let stamps: Vec<_> = samples.iter().map(|s| s.data_timestamp.unwrap()).collect();
        assert_eq!(stamps, vec![t0, t1, t2]);
    }

    #[test]
    fn sample_offset_out_of_range_is_deferred() {
        let layout = StreamLayout::new(StreamKind::A429, 4)
            .with_data_timestamp(DataTimestampMode::SampleOffset);
        let (_, n) = encode(
            &layout,
            &[
                (&[0; 4], Some(Timestamp::new(0, 0))),
                (&[1; 4], Some(Timestamp::new(100, 0))),
            ],
        );
        assert_eq!(n, 1);
    }

    #[test]
    fn budget_defers_overflowing_sample() {
        let layout = StreamLayout::new(StreamKind::Serial, 16);
        let mut buf = BytesMut::new();
        let mut enc = StreamEncoder::new(&layout, &mut buf, 10);
        assert_eq!(enc.append(b"12345678", None).unwrap(), Append::Written);
        assert_eq!(enc.append(b"x", None).unwrap(), Append::Deferred);
        assert_eq!(enc.written(), 10);
    }

    #[test]
    fn declared_size_past_end_is_truncated() {
        let layout = StreamLayout::new(StreamKind::Serial, 16);
        let err = decode_stream_payload(&layout, Bytes::from_static(&[0, 5, 1, 2]))
            .expect_err("short payload should fail");
        assert!(matches!(
            err,
            FrameError::Truncated {
                needed: 5,
                available: 2
            }
        ));
    }

    #[test]
    fn declared_size_over_bound_is_malformed() {
        let layout = StreamLayout::new(StreamKind::Vnad, 2);
        let err = decode_stream_payload(&layout, Bytes::from_static(&[0, 3, 1, 2, 3]))
            .expect_err("oversized sample should fail");
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[test]
    fn fixed_kind_partial_trailing_sample_is_truncated() {
        let layout = StreamLayout::new(StreamKind::A429, 4);
        let err = decode_stream_payload(&layout, Bytes::from_static(&[1, 2, 3, 4, 5]))
            .expect_err("partial word should fail");
        assert!(matches!(err, FrameError::Truncated { .. }));
    }

    #[test]
    fn missing_timestamp_is_truncated() {
        let layout = StreamLayout::new(StreamKind::A429, 4)
            .with_data_timestamp(DataTimestampMode::Enabled);
        let err = decode_stream_payload(&layout, Bytes::from_static(&[0, 0, 0]))
            .expect_err("partial timestamp should fail");
        assert!(matches!(err, FrameError::Truncated { needed: 8, .. }));
    }
}
