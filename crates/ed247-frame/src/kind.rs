//! Stream kinds and the payload layout they imply.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Sub-protocol carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamKind {
    /// ARINC 429 labeled words.
    A429,
    /// ARINC 664 (AFDX) messages.
    A664,
    /// ARINC 825 CAN frames.
    A825,
    /// Serial line frames.
    Serial,
    /// Discrete signals, one byte each.
    Discrete,
    /// Analog signals, float32 each.
    Analog,
    /// Named application data (typed arrays).
    Nad,
    /// Variable-length named application data.
    Vnad,
}

impl StreamKind {
    /// Every sample has exactly the stream's `sample_max_size`.
    pub fn is_fixed_size(self) -> bool {
        matches!(self, Self::A429 | Self::Discrete | Self::Analog | Self::Nad)
    }

    /// The stream decomposes into named signals.
    pub fn is_signal_based(self) -> bool {
        matches!(self, Self::Discrete | Self::Analog | Self::Nad | Self::Vnad)
    }

    /// Largest sample the wire format can describe for this kind.
    pub fn max_sample_size(self) -> usize {
        match self {
            Self::A825 => u8::MAX as usize,
            _ => u16::MAX as usize,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::A429 => "A429",
            Self::A664 => "A664",
            Self::A825 => "A825",
            Self::Serial => "SERIAL",
            Self::Discrete => "DISCRETE",
            Self::Analog => "ANALOG",
            Self::Nad => "NAD",
            Self::Vnad => "VNAD",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of NAD and VNAD signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NadType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl NadType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for NadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether samples carry a producer data timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTimestampMode {
    /// No data timestamp on the wire.
    #[default]
    Disabled,
    /// The first sample of a payload carries the timestamp, the others
    /// inherit it.
    Enabled,
    /// The first sample carries the timestamp, the others a signed 32-bit
    /// nanosecond offset from it.
    SampleOffset,
}

impl DataTimestampMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Width of the per-sample size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePrefix {
    None,
    U8,
    U16,
}

impl SizePrefix {
    pub fn len(self) -> usize {
        match self {
            Self::None => 0,
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }
}

/// Everything the codec needs to know about a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    pub kind: StreamKind,
    pub sample_max_size: usize,
    pub data_timestamp: DataTimestampMode,
    /// A664 only: samples carry a u16 size. Without it a payload holds a
    /// single message.
    pub message_size: bool,
}

impl StreamLayout {
    pub fn new(kind: StreamKind, sample_max_size: usize) -> Self {
        Self {
            kind,
            sample_max_size,
            data_timestamp: DataTimestampMode::Disabled,
            message_size: true,
        }
    }

    pub fn with_data_timestamp(mut self, mode: DataTimestampMode) -> Self {
        self.data_timestamp = mode;
        self
    }

    pub fn with_message_size(mut self, enabled: bool) -> Self {
        self.message_size = enabled;
        self
    }

    pub fn size_prefix(&self) -> SizePrefix {
        match self.kind {
            StreamKind::A825 => SizePrefix::U8,
            StreamKind::Serial | StreamKind::Vnad => SizePrefix::U16,
            StreamKind::A664 if self.message_size => SizePrefix::U16,
            _ => SizePrefix::None,
        }
    }

    /// A payload can only hold one sample (A664 without message size).
    pub fn single_sample_per_payload(&self) -> bool {
        self.kind == StreamKind::A664 && !self.message_size
    }

    /// Encoded size of the first sample of a payload at the stream bound.
    pub fn max_first_sample_size(&self) -> usize {
        let ts = if self.data_timestamp.is_enabled() {
            Timestamp::SIZE
        } else {
            0
        };
        ts + self.size_prefix().len() + self.sample_max_size
    }
}
