//! Component topology and runtime options.
//!
//! The topology (channels, streams, signals) is loaded from JSON and checked
//! as a whole by [`ComponentConfig::validate`] before anything is opened.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use ed247_frame::{
    DataTimestampMode, FrameLayout, NadType, StreamKind, StreamLayout, HEADER_SIZE,
    MAX_DATAGRAM_SIZE, SEGMENT_PREFIX_SIZE,
};
use ed247_transport::LinkConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Ed247Error, Result};

/// Default maximum number of producers tracked per channel.
pub const DEFAULT_MAX_TRACKED_SOURCES: usize = 64;

/// Stream direction, seen from the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "in")]
    In,
    #[serde(rename = "out")]
    Out,
    #[serde(rename = "inout")]
    InOut,
}

impl Direction {
    pub fn can_send(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }

    pub fn can_receive(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::InOut => "inout",
        }
    }
}

/// A component and everything it exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    pub name: String,
    /// Written in the header of every frame this component sends.
    pub identifier: u16,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Frame header options of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Stamp frames with the transport clock.
    #[serde(default)]
    pub transport_timestamp: bool,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport_timestamp: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub header: HeaderConfig,
    /// One stream, sent without the uid/size segment prefix.
    #[serde(default)]
    pub simple: bool,
    pub link: LinkConfig,
    /// Redundant path carrying the same frames.
    #[serde(default)]
    pub backup: Option<LinkConfig>,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    pub streams: Vec<StreamConfig>,
}

impl ChannelConfig {
    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout {
            header: self.header.enabled,
            multiplexed: !self.simple,
        }
    }

    /// Bytes a frame spends before the first sample of a stream.
    fn frame_overhead(&self) -> usize {
        let header = if self.header.enabled { HEADER_SIZE } else { 0 };
        let prefix = if self.simple { 0 } else { SEGMENT_PREFIX_SIZE };
        header + prefix
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: String,
    pub uid: u16,
    pub kind: StreamKind,
    pub direction: Direction,
    pub sample_max_size: usize,
    /// Depth of the send and receive queues.
    #[serde(default = "default_sample_max_number")]
    pub sample_max_number: usize,
    #[serde(default)]
    pub data_timestamp: DataTimestampMode,
    /// A664 only.
    #[serde(default = "default_true")]
    pub message_size: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub icd: String,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
}

impl StreamConfig {
    pub fn layout(&self) -> StreamLayout {
        StreamLayout::new(self.kind, self.sample_max_size)
            .with_data_timestamp(self.data_timestamp)
            .with_message_size(self.message_size)
    }
}

/// A named field of a signal-bearing stream.
///
/// Discrete and analog signals only need a `byte_offset`. NAD signals add a
/// `nad_type` and `dimensions`. VNAD signals use `nad_type`, `max_number`
/// and `position` instead of an offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalConfig {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub byte_offset: Option<usize>,
    #[serde(default)]
    pub nad_type: Option<NadType>,
    #[serde(default)]
    pub dimensions: Vec<usize>,
    #[serde(default)]
    pub position: Option<usize>,
    #[serde(default)]
    pub max_number: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_sample_max_number() -> usize {
    1
}

fn default_max_frame_size() -> usize {
    MAX_DATAGRAM_SIZE
}

/// Options that are not part of the topology.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long a receiver thread blocks on a link before re-checking its
    /// stop flag.
    pub receive_poll_interval: Duration,
    /// Size of the per-link receive buffer.
    pub receive_buffer_size: usize,
    /// Producers tracked per channel before new sources are dropped.
    pub max_tracked_sources: usize,
    /// Flush a channel as soon as a push fills one of its send queues.
    pub flush_on_full: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            receive_poll_interval: Duration::from_millis(50),
            receive_buffer_size: 65_536,
            max_tracked_sources: DEFAULT_MAX_TRACKED_SOURCES,
            flush_on_full: true,
        }
    }
}

/// Resolved shape of one signal, shared by validation and the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignalShape {
    pub nad_type: NadType,
    pub byte_offset: usize,
    pub dimensions: Vec<usize>,
    pub position: usize,
    pub max_number: usize,
}

impl SignalShape {
    /// Bytes the signal occupies in a sample (VNAD: at its maximum).
    pub fn size(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Vnad => self.nad_type.size() * self.max_number,
            _ => self.nad_type.size() * self.dimensions.iter().product::<usize>(),
        }
    }
}

impl SignalConfig {
    pub(crate) fn shape(&self, kind: StreamKind, index: usize, stream: &str) -> Result<SignalShape> {
        let missing = |field: &str| {
            Ed247Error::config(format!(
                "signal [{}] of {kind} stream [{stream}] requires '{field}'",
                self.name
            ))
        };
        let nad_type = match kind {
            StreamKind::Discrete => NadType::Uint8,
            StreamKind::Analog => NadType::Float32,
            StreamKind::Nad | StreamKind::Vnad => self.nad_type.ok_or_else(|| missing("nad_type"))?,
            other => {
                return Err(Ed247Error::config(format!(
                    "stream [{stream}] of kind {other} cannot carry signal [{}]",
                    self.name
                )))
            }
        };
        let byte_offset = match kind {
            StreamKind::Vnad => 0,
            _ => self.byte_offset.ok_or_else(|| missing("byte_offset"))?,
        };
        let dimensions = match kind {
            StreamKind::Nad if !self.dimensions.is_empty() => self.dimensions.clone(),
            _ => vec![1],
        };
        if dimensions.contains(&0) {
            return Err(Ed247Error::config(format!(
                "signal [{}] of stream [{stream}] has a zero dimension",
                self.name
            )));
        }
        let max_number = match kind {
            StreamKind::Vnad => self.max_number.ok_or_else(|| missing("max_number"))?,
            _ => 1,
        };
        if max_number == 0 {
            return Err(Ed247Error::config(format!(
                "signal [{}] of stream [{stream}] has max_number 0",
                self.name
            )));
        }
        Ok(SignalShape {
            nad_type,
            byte_offset,
            dimensions,
            position: self.position.unwrap_or(index),
            max_number,
        })
    }
}

impl ComponentConfig {
    /// Parse a JSON document. The result still has to be validated.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Ed247Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check the whole topology. The first inconsistency is reported with
    /// the entity and container it involves.
    pub fn validate(&self) -> Result<()> {
        let mut channel_names = HashSet::new();
        let mut stream_names: HashMap<&str, &str> = HashMap::new();
        let mut signal_names: HashMap<&str, &str> = HashMap::new();

        for channel in &self.channels {
            if channel.name.is_empty() {
                return Err(Ed247Error::config(format!(
                    "component [{}] declares a channel without a name",
                    self.name
                )));
            }
            if !channel_names.insert(channel.name.as_str()) {
                return Err(Ed247Error::config(format!(
                    "channel [{}] already exists in component [{}]",
                    channel.name, self.name
                )));
            }
            validate_channel(channel)?;

            let mut uids: HashMap<u16, &str> = HashMap::new();
            for stream in &channel.streams {
                if let Some(first) = uids.insert(stream.uid, stream.name.as_str()) {
                    return Err(Ed247Error::config(format!(
                        "stream [{}] uses UID {} already registered in channel [{}] by stream [{first}]",
                        stream.name, stream.uid, channel.name
                    )));
                }
                if let Some(other) = stream_names.insert(stream.name.as_str(), channel.name.as_str())
                {
                    return Err(Ed247Error::config(format!(
                        "stream [{}] of channel [{}] already exists in channel [{other}]",
                        stream.name, channel.name
                    )));
                }
                validate_stream(channel, stream)?;
                for signal in &stream.signals {
                    if let Some(other) =
                        signal_names.insert(signal.name.as_str(), stream.name.as_str())
                    {
                        return Err(Ed247Error::config(format!(
                            "signal [{}] of stream [{}] already exists in stream [{other}]",
                            signal.name, stream.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_channel(channel: &ChannelConfig) -> Result<()> {
    let name = &channel.name;
    if channel.streams.is_empty() {
        return Err(Ed247Error::config(format!("channel [{name}] has no stream")));
    }
    if channel.simple && channel.streams.len() != 1 {
        return Err(Ed247Error::config(format!(
            "simple channel [{name}] must carry exactly one stream ({} declared)",
            channel.streams.len()
        )));
    }
    if channel.backup.is_some() && !channel.header.enabled {
        return Err(Ed247Error::config(format!(
            "channel [{name}] has a backup link but no frame header to detect duplicates"
        )));
    }
    for link in std::iter::once(&channel.link).chain(channel.backup.as_ref()) {
        if !link.can_send() && !link.can_receive() {
            return Err(Ed247Error::config(format!(
                "channel [{name}] link has neither a local nor a remote endpoint"
            )));
        }
    }
    if channel.max_frame_size > MAX_DATAGRAM_SIZE || channel.max_frame_size <= channel.frame_overhead()
    {
        return Err(Ed247Error::config(format!(
            "channel [{name}] max_frame_size {} outside ({}, {MAX_DATAGRAM_SIZE}]",
            channel.max_frame_size,
            channel.frame_overhead()
        )));
    }
    Ok(())
}

fn validate_stream(channel: &ChannelConfig, stream: &StreamConfig) -> Result<()> {
    let name = &stream.name;
    let kind = stream.kind;
    if stream.sample_max_size == 0 {
        return Err(Ed247Error::config(format!(
            "stream [{name}] has sample_max_size 0"
        )));
    }
    if stream.sample_max_size > kind.max_sample_size() {
        return Err(Ed247Error::config(format!(
            "stream [{name}]: {kind} samples cannot exceed {} bytes ({} declared)",
            kind.max_sample_size(),
            stream.sample_max_size
        )));
    }
    if stream.sample_max_number == 0 {
        return Err(Ed247Error::config(format!(
            "stream [{name}] has sample_max_number 0"
        )));
    }
    let first_sample = channel.frame_overhead() + stream.layout().max_first_sample_size();
    if first_sample > channel.max_frame_size {
        return Err(Ed247Error::config(format!(
            "stream [{name}]: one sample ({first_sample} bytes framed) does not fit channel [{}] frames of {} bytes",
            channel.name, channel.max_frame_size
        )));
    }
    if !kind.is_signal_based() {
        if let Some(signal) = stream.signals.first() {
            return Err(Ed247Error::config(format!(
                "stream [{name}] of kind {kind} cannot carry signal [{}]",
                signal.name
            )));
        }
        return Ok(());
    }

    let mut positions = HashSet::new();
    let mut vnad_total = 0usize;
    for (index, signal) in stream.signals.iter().enumerate() {
        let shape = signal.shape(kind, index, name)?;
        let size = shape.size(kind);
        if kind == StreamKind::Vnad {
            if !positions.insert(shape.position) {
                return Err(Ed247Error::config(format!(
                    "signal [{}] reuses position {} in stream [{name}]",
                    signal.name, shape.position
                )));
            }
            vnad_total += 2 + size;
        } else if shape.byte_offset + size > stream.sample_max_size {
            return Err(Ed247Error::config(format!(
                "signal [{}] ({size} bytes at offset {}) overflows stream [{name}] of {} bytes",
                signal.name, shape.byte_offset, stream.sample_max_size
            )));
        }
    }
    if vnad_total > stream.sample_max_size {
        return Err(Ed247Error::config(format!(
            "signals of stream [{name}] need {vnad_total} bytes, sample_max_size is {}",
            stream.sample_max_size
        )));
    }
    Ok(())
}
