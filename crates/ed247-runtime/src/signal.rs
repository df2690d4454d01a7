use std::fmt;

use ed247_frame::{NadType, StreamKind};

use crate::config::{SignalConfig, SignalShape};
use crate::error::{Ed247Error, Result};
use crate::stream::StreamId;

/// Index of a signal in its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(pub(crate) usize);

impl SignalId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Signal type, derived from the kind of the owning stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Discrete,
    Analog,
    Nad,
    Vnad,
}

impl SignalKind {
    pub fn from_stream_kind(kind: StreamKind) -> Option<Self> {
        match kind {
            StreamKind::Discrete => Some(Self::Discrete),
            StreamKind::Analog => Some(Self::Analog),
            StreamKind::Nad => Some(Self::Nad),
            StreamKind::Vnad => Some(Self::Vnad),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discrete => "DISCRETE",
            Self::Analog => "ANALOG",
            Self::Nad => "NAD",
            Self::Vnad => "VNAD",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named sub-field of a signal-bearing stream.
#[derive(Debug)]
pub struct Signal {
    id: SignalId,
    stream: StreamId,
    /// Index in the owning stream's signal list.
    slot: usize,
    name: String,
    comment: String,
    unit: Option<String>,
    kind: SignalKind,
    nad_type: NadType,
    byte_offset: usize,
    dimensions: Vec<usize>,
    position: usize,
    max_number: usize,
}

impl Signal {
    pub(crate) fn from_config(
        id: SignalId,
        stream: StreamId,
        slot: usize,
        stream_kind: StreamKind,
        stream_name: &str,
        config: &SignalConfig,
    ) -> Result<Self> {
        let SignalShape {
            nad_type,
            byte_offset,
            dimensions,
            position,
            max_number,
        } = config.shape(stream_kind, slot, stream_name)?;
        let kind = SignalKind::from_stream_kind(stream_kind).ok_or_else(|| {
            Ed247Error::config(format!(
                "stream [{stream_name}] of kind {stream_kind} cannot carry signal [{}]",
                config.name
            ))
        })?;
        Ok(Self {
            id,
            stream,
            slot,
            name: config.name.clone(),
            comment: config.comment.clone(),
            unit: config.unit.clone(),
            kind,
            nad_type,
            byte_offset,
            dimensions,
            position,
            max_number,
        })
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    /// The stream this signal belongs to.
    pub fn stream_id(&self) -> StreamId {
        self.stream
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Element type. Discrete signals are `uint8`, analog ones `float32`.
    pub fn nad_type(&self) -> NadType {
        self.nad_type
    }

    /// Byte offset inside the sample (fixed-layout kinds).
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Serialization order inside a VNAD sample.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Maximum element count of a VNAD signal.
    pub fn max_number(&self) -> usize {
        self.max_number
    }

    /// Bytes of one element.
    pub fn element_size(&self) -> usize {
        self.nad_type.size()
    }

    /// Maximum number of elements.
    pub fn element_count(&self) -> usize {
        match self.kind {
            SignalKind::Vnad => self.max_number,
            _ => self.dimensions.iter().product(),
        }
    }

    /// Maximum size of the signal value in bytes.
    pub fn sample_max_size(&self) -> usize {
        self.element_size() * self.element_count()
    }
}

/// A single typed signal element, in host representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl SignalValue {
    pub fn nad_type(&self) -> NadType {
        match self {
            Self::I8(_) => NadType::Int8,
            Self::I16(_) => NadType::Int16,
            Self::I32(_) => NadType::Int32,
            Self::I64(_) => NadType::Int64,
            Self::U8(_) => NadType::Uint8,
            Self::U16(_) => NadType::Uint16,
            Self::U32(_) => NadType::Uint32,
            Self::U64(_) => NadType::Uint64,
            Self::F32(_) => NadType::Float32,
            Self::F64(_) => NadType::Float64,
        }
    }

    /// Host-order bytes.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match *self {
            Self::I8(v) => v.to_ne_bytes().to_vec(),
            Self::I16(v) => v.to_ne_bytes().to_vec(),
            Self::I32(v) => v.to_ne_bytes().to_vec(),
            Self::I64(v) => v.to_ne_bytes().to_vec(),
            Self::U8(v) => v.to_ne_bytes().to_vec(),
            Self::U16(v) => v.to_ne_bytes().to_vec(),
            Self::U32(v) => v.to_ne_bytes().to_vec(),
            Self::U64(v) => v.to_ne_bytes().to_vec(),
            Self::F32(v) => v.to_ne_bytes().to_vec(),
            Self::F64(v) => v.to_ne_bytes().to_vec(),
        }
    }

    /// Decode one host-order element. `None` if `bytes` is not exactly one
    /// element of `nad_type`.
    pub fn from_ne_bytes(nad_type: NadType, bytes: &[u8]) -> Option<Self> {
        Some(match nad_type {
            NadType::Int8 => Self::I8(i8::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Int16 => Self::I16(i16::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Int32 => Self::I32(i32::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Int64 => Self::I64(i64::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Uint8 => Self::U8(u8::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Uint16 => Self::U16(u16::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Uint32 => Self::U32(u32::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Uint64 => Self::U64(u64::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Float32 => Self::F32(f32::from_ne_bytes(bytes.try_into().ok()?)),
            NadType::Float64 => Self::F64(f64::from_ne_bytes(bytes.try_into().ok()?)),
        })
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Copy `src` into `dst` element by element, converting between host and
/// network (big-endian) order. The conversion is its own inverse.
pub(crate) fn swap_copy(src: &[u8], dst: &mut [u8], element_size: usize) {
    debug_assert_eq!(src.len(), dst.len());
    if element_size <= 1 || cfg!(target_endian = "big") {
        dst.copy_from_slice(src);
        return;
    }
    for (from, to) in src
        .chunks_exact(element_size)
        .zip(dst.chunks_exact_mut(element_size))
    {
        to.copy_from_slice(from);
        to.reverse();
    }
}
