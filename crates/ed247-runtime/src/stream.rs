use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ed247_frame::{Append, DecodedSample, StreamEncoder, StreamKind, StreamLayout, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{trace, warn};

use crate::assistant::StreamAssistant;
use crate::channel::ChannelId;
use crate::config::{Direction, StreamConfig};
use crate::error::{Ed247Error, Result};
use crate::handle::HandleCollection;
use crate::pattern::full_match;
use crate::sample::{
    PoppedSample, PushOutcome, ReceiveQueue, ReceivedSample, SampleInfo, SendQueue,
};
use crate::signal::Signal;

/// Index of a stream in its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub(crate) usize);

impl StreamId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Per-stream counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub pushed: u64,
    pub sent: u64,
    pub received: u64,
    pub popped: u64,
    /// Received samples dropped because the consumer fell behind.
    pub overwritten: u64,
}

/// A typed data flow inside a channel.
///
/// Holds a bounded send queue filled by [`push`](Self::push) and drained by
/// the channel on flush, and a bounded receive queue filled by the channel
/// and drained by [`pop`](Self::pop). Neither operation performs I/O.
pub struct Stream {
    id: StreamId,
    channel: ChannelId,
    name: String,
    comment: String,
    icd: String,
    uid: u16,
    direction: Direction,
    layout: StreamLayout,
    sample_max_number: usize,
    signals: Vec<Arc<Signal>>,
    outgoing: Mutex<SendQueue>,
    incoming: Mutex<ReceiveQueue>,
    pushed: AtomicU64,
    sent: AtomicU64,
    received: AtomicU64,
    popped: AtomicU64,
    overwritten: AtomicU64,
}

impl Stream {
    pub(crate) fn from_config(
        id: StreamId,
        channel: ChannelId,
        config: &StreamConfig,
        signals: Vec<Arc<Signal>>,
    ) -> Self {
        Self {
            id,
            channel,
            name: config.name.clone(),
            comment: config.comment.clone(),
            icd: config.icd.clone(),
            uid: config.uid,
            direction: config.direction,
            layout: config.layout(),
            sample_max_number: config.sample_max_number,
            signals,
            outgoing: Mutex::new(SendQueue::new(
                config.sample_max_number,
                config.sample_max_size,
            )),
            incoming: Mutex::new(ReceiveQueue::new(config.sample_max_number)),
            pushed: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The channel carrying this stream.
    pub fn channel_id(&self) -> ChannelId {
        self.channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn icd(&self) -> &str {
        &self.icd
    }

    /// Identifier of the stream inside its channel's frames.
    pub fn uid(&self) -> u16 {
        self.uid
    }

    pub fn kind(&self) -> StreamKind {
        self.layout.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    pub fn sample_max_size(&self) -> usize {
        self.layout.sample_max_size
    }

    /// Depth of the send and receive queues.
    pub fn sample_max_number(&self) -> usize {
        self.sample_max_number
    }

    pub fn is_signal_based(&self) -> bool {
        self.layout.kind.is_signal_based()
    }

    /// A zeroed buffer of the stream's maximum sample size.
    pub fn allocate_sample(&self) -> Vec<u8> {
        vec![0; self.layout.sample_max_size]
    }

    /// Queue a sample for the next flush of the channel.
    ///
    /// Fixed-size kinds take exactly `sample_max_size` bytes, the others at
    /// most that. A full queue refuses the sample.
    pub fn push(&self, data: &[u8], data_timestamp: Option<Timestamp>) -> Result<PushOutcome> {
        if !self.direction.can_send() {
            return Err(Ed247Error::WrongDirection {
                stream: self.name.clone(),
                expected: "output",
            });
        }
        let max = self.layout.sample_max_size;
        let fits = if self.layout.kind.is_fixed_size() {
            data.len() == max
        } else {
            data.len() <= max
        };
        if !fits {
            return Err(Ed247Error::SizeMismatch {
                stream: self.name.clone(),
                size: data.len(),
                max,
            });
        }

        let queue_full = {
            let mut queue = self.outgoing.lock();
            if !queue.push(data, data_timestamp) {
                return Err(Ed247Error::QueueFull {
                    stream: self.name.clone(),
                    capacity: queue.capacity(),
                });
            }
            queue.is_full()
        };
        self.pushed.fetch_add(1, Ordering::Relaxed);
        trace!(stream = %self.name, size = data.len(), queue_full, "sample pushed");
        Ok(PushOutcome { queue_full })
    }

    /// Take the oldest received sample, `None` when the queue is empty.
    pub fn pop(&self) -> Result<Option<PoppedSample>> {
        if !self.direction.can_receive() {
            return Err(Ed247Error::WrongDirection {
                stream: self.name.clone(),
                expected: "input",
            });
        }
        let (sample, remaining) = {
            let mut queue = self.incoming.lock();
            match queue.pop() {
                Some(sample) => (sample, queue.len()),
                None => return Ok(None),
            }
        };
        self.popped.fetch_add(1, Ordering::Relaxed);
        Ok(Some(PoppedSample {
            data: sample.data,
            data_timestamp: sample.data_timestamp,
            recv_timestamp: sample.recv_timestamp,
            info: sample.info,
            remaining,
        }))
    }

    /// Samples waiting to be popped.
    pub fn incoming_len(&self) -> usize {
        self.incoming.lock().len()
    }

    /// Samples waiting to be sent.
    pub fn outgoing_len(&self) -> usize {
        self.outgoing.lock().len()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
        }
    }

    /// Signals of this stream, in declaration order.
    pub fn signals(&self) -> HandleCollection<'_, Vec<Arc<Signal>>> {
        HandleCollection::wrap(&self.signals)
    }

    /// Signals whose whole name matches `pattern`.
    pub fn find_signals(
        &self,
        pattern: &str,
    ) -> Result<HandleCollection<'static, Vec<Arc<Signal>>>> {
        let re = full_match(pattern)?;
        let found = self
            .signals
            .iter()
            .filter(|signal| re.is_match(signal.name()))
            .cloned()
            .collect();
        Ok(HandleCollection::from_owned(found))
    }

    pub fn get_signal(&self, name: &str) -> Result<Arc<Signal>> {
        self.signals
            .iter()
            .find(|signal| signal.name() == name)
            .cloned()
            .ok_or_else(|| Ed247Error::NotFound {
                kind: "signal",
                name: name.to_string(),
            })
    }

    pub(crate) fn signal_list(&self) -> &[Arc<Signal>] {
        &self.signals
    }

    /// Signal (de)composition helper for signal-bearing streams.
    pub fn assistant(self: &Arc<Self>) -> Result<StreamAssistant> {
        StreamAssistant::new(self.clone())
    }

    /// Move queued samples into a frame until the encoder defers one.
    pub(crate) fn encode_pending(
        &self,
        encoder: &mut StreamEncoder<'_>,
    ) -> ed247_frame::Result<usize> {
        let mut queue = self.outgoing.lock();
        let mut written = 0;
        while let Some(sample) = queue.front() {
            match encoder.append(&sample.data, sample.data_timestamp)? {
                Append::Written => {
                    queue.pop_front();
                    written += 1;
                }
                Append::Deferred => break,
            }
        }
        self.sent.fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    /// Enqueue decoded samples and report how many made it in.
    pub(crate) fn deliver(
        &self,
        samples: Vec<DecodedSample>,
        info: SampleInfo,
        recv_timestamp: Option<Timestamp>,
    ) -> usize {
        let count = samples.len();
        let mut overwritten = 0;
        {
            let mut queue = self.incoming.lock();
            for sample in samples {
                let dropped = queue.push(ReceivedSample {
                    data: sample.data,
                    data_timestamp: sample.data_timestamp,
                    recv_timestamp,
                    info,
                });
                if dropped {
                    overwritten += 1;
                }
            }
        }
        self.received.fetch_add(count as u64, Ordering::Relaxed);
        if overwritten > 0 {
            self.overwritten.fetch_add(overwritten, Ordering::Relaxed);
            warn!(
                stream = %self.name,
                overwritten,
                "receive queue full, oldest samples overwritten"
            );
        }
        trace!(stream = %self.name, count, seq = info.sequence_number, "samples delivered");
        count
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .field("kind", &self.layout.kind)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use ed247_frame::DataTimestampMode;

    use super::*;

    fn stream(kind: StreamKind, direction: Direction, size: usize, depth: usize) -> Stream {
        let config = StreamConfig {
            name: "S".into(),
            uid: 5,
            kind,
            direction,
            sample_max_size: size,
            sample_max_number: depth,
            data_timestamp: DataTimestampMode::Disabled,
            message_size: true,
            comment: String::new(),
            icd: String::new(),
            signals: Vec::new(),
        };
        Stream::from_config(StreamId(0), ChannelId(0), &config, Vec::new())
    }

    #[test]
    fn allocate_sample_is_zeroed() {
        let s = stream(StreamKind::A429, Direction::Out, 4, 1);
        assert_eq!(s.allocate_sample(), vec![0; 4]);
    }

    #[test]
    fn push_checks_size_per_kind() {
        let fixed = stream(StreamKind::A429, Direction::Out, 4, 4);
        assert!(matches!(
            fixed.push(&[1, 2], None),
            Err(Ed247Error::SizeMismatch { size: 2, max: 4, .. })
        ));
        fixed.push(&[1, 2, 3, 4], None).expect("exact size should push");

        let variable = stream(StreamKind::Serial, Direction::Out, 4, 4);
        variable.push(&[1], None).expect("shorter sample should push");
        assert!(matches!(
            variable.push(&[0; 5], None),
            Err(Ed247Error::SizeMismatch { size: 5, .. })
        ));
    }

    #[test]
    fn full_queue_fails_loudly() {
        let s = stream(StreamKind::Serial, Direction::Out, 4, 2);
        assert!(!s.push(b"a", None).unwrap().queue_full);
        assert!(s.push(b"b", None).unwrap().queue_full);
        let err = s.push(b"c", None).expect_err("third push should fail");
        assert!(matches!(err, Ed247Error::QueueFull { capacity: 2, .. }));
        assert_eq!(s.outgoing_len(), 2);
    }

    #[test]
    fn direction_is_enforced() {
        let input = stream(StreamKind::Serial, Direction::In, 4, 1);
        assert!(matches!(
            input.push(b"a", None),
            Err(Ed247Error::WrongDirection { expected: "output", .. })
        ));
        let output = stream(StreamKind::Serial, Direction::Out, 4, 1);
        assert!(matches!(
            output.pop(),
            Err(Ed247Error::WrongDirection { expected: "input", .. })
        ));
    }

    #[test]
    fn pop_empty_is_none() {
        let s = stream(StreamKind::Serial, Direction::In, 4, 1);
        assert!(s.pop().unwrap().is_none());
    }

    #[test]
    fn deliver_then_pop_in_order() {
        let s = stream(StreamKind::Serial, Direction::InOut, 4, 3);
        let info = SampleInfo {
            component_identifier: 9,
            sequence_number: 3,
            transport_timestamp: Timestamp::ZERO,
        };
        let samples = vec![
            DecodedSample {
                data: Bytes::from_static(b"x"),
                data_timestamp: None,
            },
            DecodedSample {
                data: Bytes::from_static(b"y"),
                data_timestamp: None,
            },
        ];
        assert_eq!(s.deliver(samples, info, Some(Timestamp::new(1, 0))), 2);

        let first = s.pop().unwrap().unwrap();
        assert_eq!(first.data.as_ref(), b"x");
        assert_eq!(first.info, info);
        assert_eq!(first.recv_timestamp, Some(Timestamp::new(1, 0)));
        assert_eq!(first.remaining, 1);
        assert!(s.pop().unwrap().unwrap().is_last());
    }

    #[test]
    fn receive_overflow_is_counted() {
        let s = stream(StreamKind::Serial, Direction::In, 4, 1);
        let sample = |b: &'static [u8]| DecodedSample {
            data: Bytes::from_static(b),
            data_timestamp: None,
        };
        s.deliver(vec![sample(b"1"), sample(b"2")], SampleInfo::default(), None);
        assert_eq!(s.stats().overwritten, 1);
        assert_eq!(s.pop().unwrap().unwrap().data.as_ref(), b"2");
    }

    #[test]
    fn encode_pending_stops_at_deferred_sample() {
        let s = stream(StreamKind::Serial, Direction::Out, 4, 3);
        s.push(b"aaaa", None).unwrap();
        s.push(b"bbbb", None).unwrap();
        s.push(b"cccc", None).unwrap();

        let layout = *s.layout();
        let mut buf = BytesMut::new();
        let mut encoder = StreamEncoder::new(&layout, &mut buf, 12);
        assert_eq!(s.encode_pending(&mut encoder).unwrap(), 2);
        assert_eq!(s.outgoing_len(), 1);
        assert_eq!(s.stats().sent, 2);
    }
}
