use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ed247_frame::{
    decode_frame, decode_stream_payload, FrameAssembler, FrameHeader, FrameLayout, Timestamp,
};
use ed247_transport::{LinkConfig, TransportLink};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::{ChannelConfig, HeaderConfig};
use crate::error::Result;
use crate::handle::HandleCollection;
use crate::sample::SampleInfo;
use crate::sequence::{SequenceTracker, Verdict};
use crate::stream::Stream;
use crate::time::TimeSource;
use crate::wait::WaitGate;

/// Index of a channel in its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub(crate) usize);

impl ChannelId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Snapshot of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Inbound frames that could not be decoded.
    pub frames_dropped: u64,
    /// Segments discarded as duplicate or stale.
    pub duplicates: u64,
    pub missed_frames: u64,
    pub samples_delivered: u64,
    pub send_failures: u64,
    pub receive_failures: u64,
    /// Frames dropped because their source exceeded the tracking table.
    pub rejected_sources: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    duplicates: AtomicU64,
    missed_frames: AtomicU64,
    samples_delivered: AtomicU64,
    send_failures: AtomicU64,
    receive_failures: AtomicU64,
    rejected_sources: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// Which half of the send path a channel is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Sending,
}

/// An opened link and what its endpoints allow.
#[derive(Debug, Clone)]
pub(crate) struct LinkSlot {
    pub link: Arc<dyn TransportLink>,
    pub can_send: bool,
    pub can_receive: bool,
}

impl LinkSlot {
    pub fn new(link: Arc<dyn TransportLink>, config: &LinkConfig) -> Self {
        Self {
            can_send: config.can_send(),
            can_receive: link.can_receive(),
            link,
        }
    }
}

/// Component-wide state every channel shares.
#[derive(Debug, Clone)]
pub(crate) struct ChannelContext {
    pub component_identifier: u16,
    pub max_tracked_sources: usize,
    pub gate: Arc<WaitGate>,
    pub receive_clock: Arc<TimeSource>,
    pub transport_clock: Arc<TimeSource>,
}

struct SendState {
    assembler: FrameAssembler,
    next_sequence: u16,
}

/// A multiplexed flow of frames over a primary link and an optional backup.
pub struct Channel {
    id: ChannelId,
    name: String,
    comment: String,
    layout: FrameLayout,
    header: HeaderConfig,
    max_frame_size: usize,
    streams: BTreeMap<u16, Arc<Stream>>,
    links: Vec<LinkSlot>,
    send_state: Mutex<SendState>,
    transmit: Mutex<()>,
    sending: AtomicBool,
    tracker: Mutex<SequenceTracker>,
    counters: Counters,
    context: ChannelContext,
}

impl Channel {
    pub(crate) fn new(
        id: ChannelId,
        config: &ChannelConfig,
        streams: BTreeMap<u16, Arc<Stream>>,
        links: Vec<LinkSlot>,
        context: ChannelContext,
    ) -> Self {
        let layout = config.frame_layout();
        Self {
            id,
            name: config.name.clone(),
            comment: config.comment.clone(),
            layout,
            header: config.header,
            max_frame_size: config.max_frame_size,
            streams,
            links,
            send_state: Mutex::new(SendState {
                assembler: FrameAssembler::new(layout, config.max_frame_size),
                next_sequence: 0,
            }),
            transmit: Mutex::new(()),
            sending: AtomicBool::new(false),
            tracker: Mutex::new(SequenceTracker::new(context.max_tracked_sources)),
            counters: Counters::default(),
            context,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn frame_layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn header(&self) -> HeaderConfig {
        self.header
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn has_backup(&self) -> bool {
        self.links.len() > 1
    }

    /// Human-readable description of each link, primary first.
    pub fn links(&self) -> Vec<String> {
        self.links.iter().map(|slot| slot.link.describe()).collect()
    }

    /// Streams of this channel, ordered by uid.
    pub fn streams(&self) -> HandleCollection<'_, BTreeMap<u16, Arc<Stream>>> {
        HandleCollection::wrap(&self.streams)
    }

    pub fn stream_by_uid(&self, uid: u16) -> Option<&Arc<Stream>> {
        self.streams.get(&uid)
    }

    pub fn send_phase(&self) -> SendPhase {
        if self.sending.load(Ordering::Acquire) {
            SendPhase::Sending
        } else {
            SendPhase::Idle
        }
    }

    pub fn stats(&self) -> ChannelStats {
        let c = &self.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ChannelStats {
            frames_sent: load(&c.frames_sent),
            frames_received: load(&c.frames_received),
            frames_dropped: load(&c.frames_dropped),
            duplicates: load(&c.duplicates),
            missed_frames: load(&c.missed_frames),
            samples_delivered: load(&c.samples_delivered),
            send_failures: load(&c.send_failures),
            receive_failures: load(&c.receive_failures),
            rejected_sources: load(&c.rejected_sources),
        }
    }

    /// Send every queued outbound sample.
    ///
    /// Emits as many frames as needed and returns how many were sent. On a
    /// link failure the current frame is still tried on the other links,
    /// then the first error is returned and the remaining samples stay
    /// queued.
    pub fn flush(&self) -> Result<usize> {
        let _transmit = self.transmit.lock();
        self.sending.store(true, Ordering::Release);
        let result = self.flush_frames();
        self.sending.store(false, Ordering::Release);
        result
    }

    fn flush_frames(&self) -> Result<usize> {
        let mut frames = 0;
        while let Some(frame) = self.assemble()? {
            self.transmit(&frame)?;
            frames += 1;
        }
        if frames > 0 {
            debug!(channel = %self.name, frames, "channel flushed");
        }
        Ok(frames)
    }

    /// Build the next frame under the send lock. `None` when nothing is
    /// queued; sequence numbers are only spent on non-empty frames.
    fn assemble(&self) -> Result<Option<Bytes>> {
        let mut state = self.send_state.lock();
        let SendState {
            assembler,
            next_sequence,
        } = &mut *state;

        assembler.begin();
        for stream in self.streams.values() {
            if !stream.direction().can_send() || stream.outgoing_len() == 0 {
                continue;
            }
            assembler.encode_stream(stream.uid(), stream.layout(), |encoder| {
                stream.encode_pending(encoder).map(|_| ())
            })?;
        }
        if assembler.is_empty() {
            return Ok(None);
        }

        let mut transport_timestamp = Timestamp::ZERO;
        if self.header.transport_timestamp {
            self.context
                .transport_clock
                .update_timestamp(&mut transport_timestamp);
        }
        let header = FrameHeader {
            component_identifier: self.context.component_identifier,
            sequence_number: *next_sequence,
            transport_timestamp,
        };
        let frame = assembler.finish(header);
        if frame.is_some() {
            *next_sequence = next_sequence.wrapping_add(1);
        }
        Ok(frame)
    }

    fn transmit(&self, frame: &[u8]) -> Result<()> {
        let mut first_error = None;
        for slot in self.links.iter().filter(|slot| slot.can_send) {
            if let Err(err) = slot.link.send(frame) {
                bump(&self.counters.send_failures, 1);
                warn!(
                    channel = %self.name,
                    link = %slot.link.describe(),
                    error = %err,
                    "frame send failed"
                );
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => {
                bump(&self.counters.frames_sent, 1);
                trace!(channel = %self.name, len = frame.len(), "frame sent");
                Ok(())
            }
        }
    }

    /// Decode an inbound frame and enqueue its samples. Returns the number
    /// of samples delivered.
    pub(crate) fn deliver(&self, frame: Bytes) -> usize {
        bump(&self.counters.frames_received, 1);
        let len = frame.len();
        let decoded = match decode_frame(frame, self.layout) {
            Ok(decoded) => decoded,
            Err(err) => {
                bump(&self.counters.frames_dropped, 1);
                warn!(channel = %self.name, len, error = %err, "malformed frame dropped");
                return 0;
            }
        };

        let mut batch = Vec::with_capacity(decoded.segments.len());
        for segment in decoded.segments {
            let stream = match segment.uid {
                Some(uid) => self.streams.get(&uid),
                None => self.streams.values().next(),
            };
            let Some(stream) = stream else {
                trace!(channel = %self.name, uid = ?segment.uid, "segment for unknown stream skipped");
                continue;
            };
            if !stream.direction().can_receive() {
                continue;
            }
            match decode_stream_payload(stream.layout(), segment.payload) {
                Ok(samples) => batch.push((stream, samples)),
                Err(err) => {
                    bump(&self.counters.frames_dropped, 1);
                    warn!(
                        channel = %self.name,
                        stream = %stream.name(),
                        error = %err,
                        "malformed stream payload, frame dropped"
                    );
                    return 0;
                }
            }
        }

        let info = decoded
            .header
            .map(|header| SampleInfo {
                component_identifier: header.component_identifier,
                sequence_number: header.sequence_number,
                transport_timestamp: header.transport_timestamp,
            })
            .unwrap_or_default();

        // Held until the batch is queued: primary and backup receivers must
        // not interleave between the sequence check and the enqueue.
        let mut tracker = self.tracker.lock();
        if let Some(header) = decoded.header {
            let source = header.component_identifier;
            let seq = header.sequence_number;
            if !tracker.admit(source) {
                drop(tracker);
                bump(&self.counters.rejected_sources, 1);
                warn!(
                    channel = %self.name,
                    source,
                    limit = self.context.max_tracked_sources,
                    "too many sources, frame dropped"
                );
                return 0;
            }
            let mut missed = 0u16;
            let mut discarded = 0u64;
            batch.retain(|(stream, _)| match tracker.check(source, stream.uid(), seq) {
                Verdict::Accept { missed: gap } => {
                    missed = missed.max(gap);
                    true
                }
                Verdict::Duplicate => {
                    discarded += 1;
                    debug!(channel = %self.name, stream = %stream.name(), source, seq, "duplicate segment discarded");
                    false
                }
                Verdict::Stale => {
                    discarded += 1;
                    warn!(channel = %self.name, stream = %stream.name(), source, seq, "stale segment discarded");
                    false
                }
            });
            bump(&self.counters.duplicates, discarded);
            if missed > 0 {
                bump(&self.counters.missed_frames, u64::from(missed));
                warn!(channel = %self.name, source, seq, missed, "frames missed");
            }
        }

        let recv_timestamp = self.context.receive_clock.now();
        let delivered: usize = batch
            .into_iter()
            .map(|(stream, samples)| stream.deliver(samples, info, recv_timestamp))
            .sum();
        drop(tracker);
        if delivered > 0 {
            bump(&self.counters.samples_delivered, delivered as u64);
            self.context.gate.notify();
        }
        delivered
    }

    /// Links this channel can read from.
    pub(crate) fn receive_links(&self) -> impl Iterator<Item = &Arc<dyn TransportLink>> {
        self.links
            .iter()
            .filter(|slot| slot.can_receive)
            .map(|slot| &slot.link)
    }

    pub(crate) fn record_receive_failure(&self) {
        bump(&self.counters.receive_failures, 1);
    }

    /// Drain every receivable link without blocking. Returns the number of
    /// frames handled; read errors are counted and the first one returned
    /// once every link was drained.
    pub(crate) fn poll(&self, buf: &mut [u8]) -> Result<usize> {
        let mut frames = 0;
        let mut first_error = None;
        for link in self.receive_links() {
            loop {
                match link.recv(buf, Duration::ZERO) {
                    Ok(Some(len)) => {
                        self.deliver(Bytes::copy_from_slice(&buf[..len]));
                        frames += 1;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        self.record_receive_failure();
                        warn!(channel = %self.name, link = %link.describe(), error = %err, "receive failed");
                        first_error.get_or_insert(err);
                        break;
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(frames),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("streams", &self.streams.len())
            .field("links", &self.links())
            .finish_non_exhaustive()
    }
}
