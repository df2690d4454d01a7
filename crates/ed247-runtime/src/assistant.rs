//! Signal (de)composition over the samples of a signal-bearing stream.
//!
//! Values are in host order at this API and big-endian inside samples.
//! Discrete, analog and NAD streams use one sample-sized buffer in which each
//! signal owns a fixed byte range. VNAD streams keep one value per signal and
//! serialize them as `[u16 BE size][elements]` in position order.

use std::sync::Arc;

use bytes::BufMut;
use ed247_frame::{StreamKind, Timestamp};

use crate::error::{Ed247Error, Result};
use crate::sample::{PoppedSample, PushOutcome};
use crate::signal::{swap_copy, Signal, SignalValue};
use crate::stream::Stream;

#[derive(Debug)]
enum Buffers {
    /// Sample-sized buffer, wire order.
    Fixed(Vec<u8>),
    Vnad {
        /// Signal slots in serialization order.
        order: Vec<usize>,
        /// Current value of each signal, host order, indexed by slot.
        values: Vec<Vec<u8>>,
        /// Last sample pushed or popped, wire order.
        wire: Vec<u8>,
    },
}

/// Reads and writes individual signals of a stream's samples.
#[derive(Debug)]
pub struct StreamAssistant {
    stream: Arc<Stream>,
    buffers: Buffers,
}

impl StreamAssistant {
    pub fn new(stream: Arc<Stream>) -> Result<Self> {
        if !stream.is_signal_based() {
            return Err(Ed247Error::NotSignalBased(stream.name().to_string()));
        }
        let buffers = if stream.kind() == StreamKind::Vnad {
            let signals = stream.signal_list();
            let mut order: Vec<usize> = (0..signals.len()).collect();
            order.sort_by_key(|&slot| signals[slot].position());
            Buffers::Vnad {
                order,
                values: signals
                    .iter()
                    .map(|signal| Vec::with_capacity(signal.sample_max_size()))
                    .collect(),
                wire: Vec::with_capacity(stream.sample_max_size()),
            }
        } else {
            Buffers::Fixed(stream.allocate_sample())
        };
        Ok(Self { stream, buffers })
    }

    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    fn check(&self, signal: &Signal) -> Result<()> {
        let owned = self
            .stream
            .signal_list()
            .iter()
            .any(|own| std::ptr::eq(own.as_ref(), signal));
        if !owned {
            return Err(Ed247Error::ForeignSignal {
                signal: signal.name().to_string(),
                stream: self.stream.name().to_string(),
            });
        }
        Ok(())
    }

    /// Set a signal from host-order bytes.
    ///
    /// `data` must hold whole elements and at most the signal's maximum
    /// size. On fixed layouts only the signal's leading bytes are touched.
    pub fn write_signal(&mut self, signal: &Signal, data: &[u8]) -> Result<()> {
        self.check(signal)?;
        let element = signal.element_size();
        if data.len() > signal.sample_max_size() || data.len() % element != 0 {
            return Err(Ed247Error::SignalValue {
                signal: signal.name().to_string(),
                reason: format!(
                    "{} bytes is not a whole number of {} elements up to {} bytes",
                    data.len(),
                    signal.nad_type(),
                    signal.sample_max_size()
                ),
            });
        }
        match &mut self.buffers {
            Buffers::Fixed(buffer) => {
                let start = signal.byte_offset();
                swap_copy(data, &mut buffer[start..start + data.len()], element);
            }
            Buffers::Vnad { values, .. } => {
                let value = &mut values[signal.slot()];
                value.clear();
                value.extend_from_slice(data);
            }
        }
        Ok(())
    }

    /// Current host-order value of a signal. A VNAD signal with no value
    /// yields an empty vector.
    pub fn read_signal(&self, signal: &Signal) -> Result<Vec<u8>> {
        self.check(signal)?;
        match &self.buffers {
            Buffers::Fixed(buffer) => {
                let start = signal.byte_offset();
                let wire = &buffer[start..start + signal.sample_max_size()];
                let mut host = vec![0; wire.len()];
                swap_copy(wire, &mut host, signal.element_size());
                Ok(host)
            }
            Buffers::Vnad { values, .. } => Ok(values[signal.slot()].clone()),
        }
    }

    /// Set a signal to a single element.
    pub fn write_value(&mut self, signal: &Signal, value: SignalValue) -> Result<()> {
        if value.nad_type() != signal.nad_type() {
            return Err(Ed247Error::SignalValue {
                signal: signal.name().to_string(),
                reason: format!(
                    "expected {} value, got {}",
                    signal.nad_type(),
                    value.nad_type()
                ),
            });
        }
        self.write_signal(signal, &value.to_ne_bytes())
    }

    /// First element of a signal, `None` for an empty VNAD signal.
    pub fn read_value(&self, signal: &Signal) -> Result<Option<SignalValue>> {
        let bytes = self.read_signal(signal)?;
        let element = signal.element_size();
        if bytes.len() < element {
            return Ok(None);
        }
        Ok(SignalValue::from_ne_bytes(signal.nad_type(), &bytes[..element]))
    }

    /// Push the composed sample on the stream.
    ///
    /// VNAD values are cleared once serialized.
    pub fn push(&mut self, data_timestamp: Option<Timestamp>) -> Result<PushOutcome> {
        match &mut self.buffers {
            Buffers::Fixed(buffer) => self.stream.push(buffer, data_timestamp),
            Buffers::Vnad {
                order,
                values,
                wire,
            } => {
                let signals = self.stream.signal_list();
                wire.clear();
                for &slot in order.iter() {
                    let value = &values[slot];
                    wire.put_u16(value.len() as u16);
                    let start = wire.len();
                    wire.resize(start + value.len(), 0);
                    swap_copy(value, &mut wire[start..], signals[slot].element_size());
                }
                let outcome = self.stream.push(wire, data_timestamp)?;
                values.iter_mut().for_each(Vec::clear);
                Ok(outcome)
            }
        }
    }

    /// Pop the oldest received sample and decompose it into signals.
    pub fn pop(&mut self) -> Result<Option<PoppedSample>> {
        let Some(sample) = self.stream.pop()? else {
            return Ok(None);
        };
        match &mut self.buffers {
            Buffers::Fixed(buffer) => {
                if sample.data.len() != buffer.len() {
                    return Err(Ed247Error::SizeMismatch {
                        stream: self.stream.name().to_string(),
                        size: sample.data.len(),
                        max: buffer.len(),
                    });
                }
                buffer.copy_from_slice(&sample.data);
            }
            Buffers::Vnad {
                order,
                values,
                wire,
            } => {
                let signals = self.stream.signal_list();
                let mut rest = &sample.data[..];
                // Validate the whole sample before touching any value.
                let mut fields = Vec::with_capacity(order.len());
                for &slot in order.iter() {
                    let signal = &signals[slot];
                    let invalid = |reason: String| Ed247Error::SignalValue {
                        signal: signal.name().to_string(),
                        reason,
                    };
                    if rest.len() < 2 {
                        return Err(invalid("sample ends before the size field".into()));
                    }
                    let size = usize::from(u16::from_be_bytes([rest[0], rest[1]]));
                    rest = &rest[2..];
                    if size > signal.sample_max_size() || size % signal.element_size() != 0 {
                        return Err(invalid(format!("invalid VNAD size {size}")));
                    }
                    if size > rest.len() {
                        return Err(invalid(format!(
                            "size {size} exceeds the {} bytes left",
                            rest.len()
                        )));
                    }
                    fields.push((slot, &rest[..size]));
                    rest = &rest[size..];
                }
                for (slot, field) in fields {
                    let value = &mut values[slot];
                    value.clear();
                    value.resize(field.len(), 0);
                    swap_copy(field, value, signals[slot].element_size());
                }
                wire.clear();
                wire.extend_from_slice(&sample.data);
            }
        }
        Ok(Some(sample))
    }

    /// The current sample in wire order.
    pub fn buffer(&self) -> &[u8] {
        match &self.buffers {
            Buffers::Fixed(buffer) => buffer,
            Buffers::Vnad { wire, .. } => wire,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ed247_frame::{DecodedSample, NadType};

    use super::*;
    use crate::channel::ChannelId;
    use crate::config::{Direction, SignalConfig, StreamConfig};
    use crate::sample::SampleInfo;
    use crate::signal::SignalId;
    use crate::stream::StreamId;

    fn signal_config(name: &str, offset: Option<usize>, nad_type: Option<NadType>) -> SignalConfig {
        SignalConfig {
            name: name.into(),
            comment: String::new(),
            unit: None,
            byte_offset: offset,
            nad_type,
            dimensions: Vec::new(),
            position: None,
            max_number: None,
        }
    }

    fn build(kind: StreamKind, size: usize, signals: Vec<SignalConfig>) -> Arc<Stream> {
        let config = StreamConfig {
            name: "S".into(),
            uid: 1,
            kind,
            direction: Direction::InOut,
            sample_max_size: size,
            sample_max_number: 4,
            data_timestamp: Default::default(),
            message_size: true,
            comment: String::new(),
            icd: String::new(),
            signals,
        };
        let id = StreamId(3);
        let handles = config
            .signals
            .iter()
            .enumerate()
            .map(|(slot, s)| {
                Arc::new(Signal::from_config(SignalId(slot), id, slot, kind, "S", s).unwrap())
            })
            .collect();
        Arc::new(Stream::from_config(id, ChannelId(0), &config, handles))
    }

    fn loop_back(stream: &Stream) {
        let layout = *stream.layout();
        let mut buf = bytes::BytesMut::new();
        let mut encoder = ed247_frame::StreamEncoder::new(&layout, &mut buf, 1024);
        stream.encode_pending(&mut encoder).unwrap();
        let samples = ed247_frame::decode_stream_payload(&layout, buf.freeze()).unwrap();
        stream.deliver(samples, SampleInfo::default(), None);
    }

    #[test]
    fn analog_write_touches_only_its_range() {
        let stream = build(
            StreamKind::Analog,
            8,
            vec![
                signal_config("A", Some(0), None),
                signal_config("B", Some(4), None),
            ],
        );
        let a = stream.get_signal("A").unwrap();
        let b = stream.get_signal("B").unwrap();
        let mut assistant = stream.assistant().unwrap();

        assistant.write_value(&b, SignalValue::F32(1.5)).unwrap();
        assert_eq!(assistant.buffer()[..4], [0, 0, 0, 0]);
        assert_eq!(assistant.buffer()[4..], 1.5f32.to_be_bytes());

        assistant.write_value(&a, SignalValue::F32(-2.0)).unwrap();
        assert_eq!(assistant.read_value(&b).unwrap(), Some(SignalValue::F32(1.5)));
        assert_eq!(assistant.read_value(&a).unwrap(), Some(SignalValue::F32(-2.0)));
    }

    #[test]
    fn nad_push_pop_round_trip() {
        let mut config = signal_config("Grid", Some(0), Some(NadType::Int16));
        config.dimensions = vec![3];
        let stream = build(StreamKind::Nad, 6, vec![config]);
        let grid = stream.get_signal("Grid").unwrap();

        let mut writer = stream.assistant().unwrap();
        let host: Vec<u8> = [1i16, -2, 300].iter().flat_map(|v| v.to_ne_bytes()).collect();
        writer.write_signal(&grid, &host).unwrap();
        writer.push(None).unwrap();
        assert_eq!(writer.buffer(), &[0, 1, 0xff, 0xfe, 0x01, 0x2c]);
        loop_back(&stream);

        let mut reader = stream.assistant().unwrap();
        assert!(reader.pop().unwrap().is_some());
        assert_eq!(reader.read_signal(&grid).unwrap(), host);
    }

    #[test]
    fn vnad_serializes_in_position_order_and_clears() {
        let mut first = signal_config("Late", None, Some(NadType::Uint16));
        first.position = Some(1);
        first.max_number = Some(2);
        let mut second = signal_config("Early", None, Some(NadType::Uint8));
        second.position = Some(0);
        second.max_number = Some(3);
        let stream = build(StreamKind::Vnad, 16, vec![first, second]);
        let late = stream.get_signal("Late").unwrap();
        let early = stream.get_signal("Early").unwrap();

        let mut writer = stream.assistant().unwrap();
        writer.write_signal(&late, &0x0102u16.to_ne_bytes()).unwrap();
        writer.write_signal(&early, &[7, 8]).unwrap();
        writer.push(None).unwrap();
        assert_eq!(writer.buffer(), &[0, 2, 7, 8, 0, 2, 1, 2]);
        assert!(writer.read_signal(&late).unwrap().is_empty());
        assert_eq!(writer.read_value(&late).unwrap(), None);

        loop_back(&stream);
        let mut reader = stream.assistant().unwrap();
        reader.pop().unwrap().expect("sample should be queued");
        assert_eq!(reader.read_value(&late).unwrap(), Some(SignalValue::U16(0x0102)));
        assert_eq!(reader.read_signal(&early).unwrap(), vec![7, 8]);
    }

    #[test]
    fn vnad_oversized_signal_is_rejected_on_pop() {
        let mut config = signal_config("V", None, Some(NadType::Uint8));
        config.max_number = Some(2);
        let stream = build(StreamKind::Vnad, 8, vec![config]);
        stream.deliver(
            vec![DecodedSample {
                data: Bytes::from_static(&[0, 3, 1, 2, 3]),
                data_timestamp: None,
            }],
            SampleInfo::default(),
            None,
        );
        let mut reader = stream.assistant().unwrap();
        let err = reader.pop().expect_err("size 3 exceeds max_number 2");
        assert!(matches!(err, Ed247Error::SignalValue { .. }));
    }

    #[test]
    fn malformed_vnad_sample_leaves_values_untouched() {
        let mut first = signal_config("First", None, Some(NadType::Uint8));
        first.position = Some(0);
        first.max_number = Some(2);
        let mut second = signal_config("Second", None, Some(NadType::Uint8));
        second.position = Some(1);
        second.max_number = Some(2);
        let stream = build(StreamKind::Vnad, 16, vec![first, second]);
        let first = stream.get_signal("First").unwrap();
        let second = stream.get_signal("Second").unwrap();

        let mut reader = stream.assistant().unwrap();
        let good = Bytes::from_static(&[0, 1, 5, 0, 1, 6]);
        let bad = Bytes::from_static(&[0, 2, 9, 9, 0, 3, 1, 2, 3]);
        for data in [good, bad] {
            stream.deliver(
                vec![DecodedSample {
                    data,
                    data_timestamp: None,
                }],
                SampleInfo::default(),
                None,
            );
        }
        reader.pop().unwrap().expect("well-formed sample queued");
        assert!(reader.pop().is_err());
        assert_eq!(reader.read_signal(&first).unwrap(), vec![5]);
        assert_eq!(reader.read_signal(&second).unwrap(), vec![6]);
        assert_eq!(reader.buffer(), &[0, 1, 5, 0, 1, 6]);
    }

    #[test]
    fn signal_of_sibling_stream_with_same_id_is_foreign() {
        let config = || vec![signal_config("A", Some(0), None), signal_config("B", Some(1), None)];
        let ours = build(StreamKind::Discrete, 2, config());
        let theirs = build(StreamKind::Discrete, 2, config());
        assert_eq!(ours.id(), theirs.id());

        let other = theirs.get_signal("B").unwrap();
        let mut assistant = ours.assistant().unwrap();
        assert!(matches!(
            assistant.write_signal(&other, &[1]),
            Err(Ed247Error::ForeignSignal { .. })
        ));
        assert!(matches!(
            assistant.read_signal(&other),
            Err(Ed247Error::ForeignSignal { .. })
        ));
    }

    #[test]
    fn wrong_type_and_foreign_signal_are_refused() {
        let stream = build(StreamKind::Analog, 4, vec![signal_config("A", Some(0), None)]);
        let a = stream.get_signal("A").unwrap();
        let mut assistant = stream.assistant().unwrap();

        assert!(matches!(
            assistant.write_value(&a, SignalValue::U8(1)),
            Err(Ed247Error::SignalValue { .. })
        ));
        assert!(matches!(
            assistant.write_signal(&a, &[0; 3]),
            Err(Ed247Error::SignalValue { .. })
        ));

        let foreign = Signal::from_config(
            SignalId(9),
            StreamId(4),
            0,
            StreamKind::Discrete,
            "D",
            &signal_config("D", Some(0), None),
        )
        .unwrap();
        assert!(matches!(
            assistant.read_signal(&foreign),
            Err(Ed247Error::ForeignSignal { .. })
        ));
    }

    #[test]
    fn non_signal_stream_has_no_assistant() {
        let stream = build(StreamKind::A429, 4, Vec::new());
        assert!(matches!(
            stream.assistant(),
            Err(Ed247Error::NotSignalBased(_))
        ));
    }
}
