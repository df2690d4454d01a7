use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ed247_frame::Timestamp;
use ed247_transport::{LinkFactory, UdpLinkFactory};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelContext, ChannelId, LinkSlot};
use crate::config::{ComponentConfig, RuntimeConfig};
use crate::error::{Ed247Error, Result};
use crate::handle::HandleCollection;
use crate::pattern::full_match;
use crate::receiver::ReceiverSet;
use crate::sample::{PoppedSample, PushOutcome};
use crate::signal::{Signal, SignalId};
use crate::stream::{Stream, StreamId};
use crate::time::TimeSource;
use crate::wait::WaitGate;

/// Caller-owned list of streams.
pub type StreamList = HandleCollection<'static, Vec<Arc<Stream>>>;

/// A loaded component: its channels, streams and signals, the links they
/// use, and the clocks stamping what it sends and receives.
///
/// Every stream, channel and signal is created at load and lives as long as
/// the component. Handles are `Arc`s, so they stay usable after
/// [`unload`](Self::unload) but no longer move data.
pub struct Component {
    name: String,
    identifier: u16,
    comment: String,
    runtime: RuntimeConfig,
    channels: Vec<(String, Arc<Channel>)>,
    streams: Vec<Arc<Stream>>,
    signals: Vec<Arc<Signal>>,
    gate: Arc<WaitGate>,
    receive_clock: Arc<TimeSource>,
    transport_clock: Arc<TimeSource>,
    receivers: Mutex<Option<ReceiverSet>>,
    poll_buffer: Mutex<Vec<u8>>,
}

impl Component {
    /// Load a component over UDP with default runtime options.
    pub fn load(config: &ComponentConfig) -> Result<Self> {
        Self::load_with(config, &UdpLinkFactory, RuntimeConfig::default())
    }

    /// Parse, validate and load a JSON topology over UDP.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::load(&ComponentConfig::from_json(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(&ComponentConfig::from_path(path)?)
    }

    /// Validate the topology, build every entity and open every link.
    ///
    /// Nothing is returned on failure: links opened so far are closed.
    pub fn load_with(
        config: &ComponentConfig,
        factory: &dyn LinkFactory,
        runtime: RuntimeConfig,
    ) -> Result<Self> {
        config.validate()?;

        let gate = Arc::new(WaitGate::default());
        let receive_clock = Arc::new(TimeSource::monotonic());
        let transport_clock = Arc::new(TimeSource::monotonic());
        let context = ChannelContext {
            component_identifier: config.identifier,
            max_tracked_sources: runtime.max_tracked_sources,
            gate: gate.clone(),
            receive_clock: receive_clock.clone(),
            transport_clock: transport_clock.clone(),
        };

        let mut channels = Vec::with_capacity(config.channels.len());
        let mut streams = Vec::new();
        let mut signals = Vec::new();

        for (index, channel_config) in config.channels.iter().enumerate() {
            let channel_id = ChannelId(index);
            let mut channel_streams = BTreeMap::new();
            for stream_config in &channel_config.streams {
                let stream_id = StreamId(streams.len());
                let mut stream_signals = Vec::with_capacity(stream_config.signals.len());
                for (slot, signal_config) in stream_config.signals.iter().enumerate() {
                    let signal = Arc::new(Signal::from_config(
                        SignalId(signals.len()),
                        stream_id,
                        slot,
                        stream_config.kind,
                        &stream_config.name,
                        signal_config,
                    )?);
                    signals.push(signal.clone());
                    stream_signals.push(signal);
                }
                let stream = Arc::new(Stream::from_config(
                    stream_id,
                    channel_id,
                    stream_config,
                    stream_signals,
                ));
                streams.push(stream.clone());
                channel_streams.insert(stream_config.uid, stream);
            }

            let mut links = vec![LinkSlot::new(
                factory.open(&channel_config.link)?,
                &channel_config.link,
            )];
            if let Some(backup) = &channel_config.backup {
                links.push(LinkSlot::new(factory.open(backup)?, backup));
            }
            let channel = Channel::new(
                channel_id,
                channel_config,
                channel_streams,
                links,
                context.clone(),
            );
            debug!(channel = %channel.name(), links = ?channel.links(), "channel opened");
            channels.push((channel_config.name.clone(), Arc::new(channel)));
        }

        info!(
            component = %config.name,
            identifier = config.identifier,
            channels = channels.len(),
            streams = streams.len(),
            signals = signals.len(),
            "component loaded"
        );

        Ok(Self {
            name: config.name.clone(),
            identifier: config.identifier,
            comment: config.comment.clone(),
            poll_buffer: Mutex::new(vec![0; runtime.receive_buffer_size]),
            runtime,
            channels,
            streams,
            signals,
            gate,
            receive_clock,
            transport_clock,
            receivers: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Written in the header of every frame this component sends.
    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime
    }

    // Enumeration

    /// Every stream, in declaration order.
    pub fn streams(&self) -> HandleCollection<'_, Vec<Arc<Stream>>> {
        HandleCollection::wrap(&self.streams)
    }

    /// Every channel, in declaration order.
    pub fn channels(&self) -> HandleCollection<'_, Vec<(String, Arc<Channel>)>> {
        HandleCollection::wrap(&self.channels)
    }

    /// Streams whose whole name matches `pattern`.
    pub fn find_streams(&self, pattern: &str) -> Result<StreamList> {
        let re = full_match(pattern)?;
        Ok(HandleCollection::from_owned(
            self.streams
                .iter()
                .filter(|stream| re.is_match(stream.name()))
                .cloned()
                .collect(),
        ))
    }

    pub fn find_channels(
        &self,
        pattern: &str,
    ) -> Result<HandleCollection<'static, Vec<Arc<Channel>>>> {
        let re = full_match(pattern)?;
        Ok(HandleCollection::from_owned(
            self.channels
                .iter()
                .filter(|(name, _)| re.is_match(name))
                .map(|(_, channel)| channel.clone())
                .collect(),
        ))
    }

    /// Signals, across every stream, whose whole name matches `pattern`.
    pub fn find_signals(
        &self,
        pattern: &str,
    ) -> Result<HandleCollection<'static, Vec<Arc<Signal>>>> {
        let re = full_match(pattern)?;
        Ok(HandleCollection::from_owned(
            self.signals
                .iter()
                .filter(|signal| re.is_match(signal.name()))
                .cloned()
                .collect(),
        ))
    }

    pub fn get_stream(&self, name: &str) -> Result<Arc<Stream>> {
        self.streams
            .iter()
            .find(|stream| stream.name() == name)
            .cloned()
            .ok_or_else(|| not_found("stream", name))
    }

    pub fn get_channel(&self, name: &str) -> Result<Arc<Channel>> {
        self.channels
            .iter()
            .find(|(channel, _)| channel == name)
            .map(|(_, channel)| channel.clone())
            .ok_or_else(|| not_found("channel", name))
    }

    pub fn get_signal(&self, name: &str) -> Result<Arc<Signal>> {
        self.signals
            .iter()
            .find(|signal| signal.name() == name)
            .cloned()
            .ok_or_else(|| not_found("signal", name))
    }

    pub fn stream(&self, id: StreamId) -> Option<&Arc<Stream>> {
        self.streams.get(id.index())
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Arc<Channel>> {
        self.channels.get(id.index()).map(|(_, channel)| channel)
    }

    pub fn signal(&self, id: SignalId) -> Option<&Arc<Signal>> {
        self.signals.get(id.index())
    }

    fn owning_channel(&self, stream: &Stream) -> Result<&Arc<Channel>> {
        match self.stream(stream.id()) {
            Some(own) if std::ptr::eq(own.as_ref(), stream) => self
                .channel(stream.channel_id())
                .ok_or_else(|| not_found("channel", &stream.channel_id().index().to_string())),
            _ => Err(not_found("stream", stream.name())),
        }
    }

    // Samples

    /// Queue a sample on an output stream.
    ///
    /// When the push fills the stream's send queue and
    /// [`RuntimeConfig::flush_on_full`] is set, the stream's channel is
    /// flushed before returning.
    ///
    /// An error from that flush is returned even though the sample itself
    /// was accepted: it counts in [`Stream::stats`] as pushed, and it is lost
    /// along with the frame whose send failed. Errors raised before the
    /// sample is queued leave the stream untouched.
    pub fn push_sample(
        &self,
        stream: &Stream,
        data: &[u8],
        data_timestamp: Option<Timestamp>,
    ) -> Result<PushOutcome> {
        let channel = self.owning_channel(stream)?;
        let outcome = stream.push(data, data_timestamp)?;
        if outcome.queue_full && self.runtime.flush_on_full {
            debug!(stream = %stream.name(), "send queue full, flushing channel");
            channel.flush()?;
        }
        Ok(outcome)
    }

    /// Take the oldest received sample of an input stream.
    pub fn pop_sample(&self, stream: &Stream) -> Result<Option<PoppedSample>> {
        self.owning_channel(stream)?;
        stream.pop()
    }

    /// Flush every channel. All channels are attempted; the first error is
    /// returned. Returns the number of frames sent.
    pub fn send_pushed_samples(&self) -> Result<usize> {
        let mut frames = 0;
        let mut first_error = None;
        for (_, channel) in &self.channels {
            match channel.flush() {
                Ok(sent) => frames += sent,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(frames),
        }
    }

    /// Flush one channel.
    pub fn send_channel(&self, channel: &Channel) -> Result<usize> {
        channel.flush()
    }

    // Reception

    /// Block until one of `streams` has a sample or `timeout` elapses.
    ///
    /// Returns the ready streams. Only frames handled by a running receiver
    /// (see [`start_receiver`](Self::start_receiver)) can wake the wait.
    pub fn wait_frame(&self, streams: &[Arc<Stream>], timeout: Duration) -> Result<StreamList> {
        self.gate
            .wait_until(timeout, || ready(streams.iter()))
            .map(HandleCollection::from_owned)
            .ok_or(Ed247Error::Timeout(timeout))
    }

    /// [`wait_frame`](Self::wait_frame) over every input stream.
    pub fn wait_any(&self, timeout: Duration) -> Result<StreamList> {
        let inputs = self.input_streams();
        self.wait_frame(&inputs, timeout)
    }

    /// Let the full `duration` pass, then report every input stream holding
    /// samples.
    pub fn wait_during(&self, duration: Duration) -> Result<StreamList> {
        thread::sleep(duration);
        ready(self.input_streams().iter())
            .map(HandleCollection::from_owned)
            .ok_or(Ed247Error::Timeout(duration))
    }

    fn input_streams(&self) -> Vec<Arc<Stream>> {
        self.streams
            .iter()
            .filter(|stream| stream.direction().can_receive())
            .cloned()
            .collect()
    }

    /// Drain every link without blocking. Returns the number of frames
    /// handled; the first read error is returned after every channel was
    /// drained.
    pub fn poll_receive(&self) -> Result<usize> {
        let mut buf = self.poll_buffer.lock();
        let mut frames = 0;
        let mut first_error = None;
        for (_, channel) in &self.channels {
            match channel.poll(&mut buf) {
                Ok(handled) => frames += handled,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(frames),
        }
    }

    /// Start one receiver thread per receivable link. Does nothing if they
    /// already run.
    pub fn start_receiver(&self) -> Result<()> {
        let mut receivers = self.receivers.lock();
        if receivers.is_some() {
            return Ok(());
        }
        let channels: Vec<Arc<Channel>> = self
            .channels
            .iter()
            .map(|(_, channel)| channel.clone())
            .collect();
        let set = ReceiverSet::start(
            &channels,
            self.runtime.receive_poll_interval,
            self.runtime.receive_buffer_size,
        )?;
        debug!(component = %self.name, threads = set.len(), "receiver threads running");
        *receivers = Some(set);
        Ok(())
    }

    /// Stop and join the receiver threads.
    pub fn stop_receiver(&self) -> Result<()> {
        let set = self.receivers.lock().take();
        match set {
            Some(set) => set.stop(),
            None => Ok(()),
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.receivers.lock().is_some()
    }

    // Clocks

    /// Clock stamping received samples.
    pub fn receive_clock(&self) -> &TimeSource {
        &self.receive_clock
    }

    /// Clock stamping frame headers.
    pub fn transport_clock(&self) -> &TimeSource {
        &self.transport_clock
    }

    /// Stop receivers and release every link.
    pub fn unload(self) -> Result<()> {
        let result = self.stop_receiver();
        info!(component = %self.name, "component unloaded");
        result
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        if let Some(set) = self.receivers.get_mut().take() {
            if let Err(err) = set.stop() {
                warn!(component = %self.name, error = %err, "receiver shutdown failed");
            }
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field("channels", &self.channels.len())
            .field("streams", &self.streams.len())
            .field("signals", &self.signals.len())
            .finish_non_exhaustive()
    }
}

fn ready<'a>(streams: impl Iterator<Item = &'a Arc<Stream>>) -> Option<Vec<Arc<Stream>>> {
    let ready: Vec<Arc<Stream>> = streams
        .filter(|stream| stream.incoming_len() > 0)
        .cloned()
        .collect();
    (!ready.is_empty()).then_some(ready)
}

fn not_found(kind: &'static str, name: &str) -> Ed247Error {
    Ed247Error::NotFound {
        kind,
        name: name.to_string(),
    }
}
