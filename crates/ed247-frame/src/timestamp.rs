use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Wire timestamp: seconds since the epoch plus nanoseconds in the second.
///
/// Ordering is chronological for normalized values (`offset_ns` below one
/// second), which is what every constructor here produces.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    pub epoch_s: u32,
    pub offset_ns: u32,
}

impl Timestamp {
    /// Encoded size: two big-endian `u32`.
    pub const SIZE: usize = 8;

    pub const ZERO: Self = Self {
        epoch_s: 0,
        offset_ns: 0,
    };

    /// Build a timestamp, carrying whole seconds out of `offset_ns`.
    pub fn new(epoch_s: u32, offset_ns: u32) -> Self {
        Self::from_nanos(u64::from(epoch_s) * NANOS_PER_SEC + u64::from(offset_ns))
    }

    /// Build from total nanoseconds since the epoch, saturating at the
    /// largest representable second.
    pub fn from_nanos(nanos: u64) -> Self {
        let secs = nanos / NANOS_PER_SEC;
        if secs > u64::from(u32::MAX) {
            return Self {
                epoch_s: u32::MAX,
                offset_ns: (NANOS_PER_SEC - 1) as u32,
            };
        }
        Self {
            epoch_s: secs as u32,
            offset_ns: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self::from_nanos(since.as_nanos().min(u128::from(u64::MAX)) as u64)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Total nanoseconds since the epoch.
    pub fn as_nanos(&self) -> u64 {
        u64::from(self.epoch_s) * NANOS_PER_SEC + u64::from(self.offset_ns)
    }

    /// Signed nanosecond offset from `base`, if it fits 32 bits.
    pub fn offset_from(&self, base: &Timestamp) -> Option<i32> {
        let diff = i128::from(self.as_nanos()) - i128::from(base.as_nanos());
        i32::try_from(diff).ok()
    }

    /// `self` moved by a signed nanosecond offset, clamped at the epoch.
    pub fn add_offset(&self, offset_ns: i32) -> Self {
        let total = i128::from(self.as_nanos()) + i128::from(offset_ns);
        Self::from_nanos(total.clamp(0, i128::from(u64::MAX)) as u64)
    }

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_u32(self.epoch_s);
        dst.put_u32(self.offset_ns);
    }

    pub(crate) fn get(src: &mut impl Buf) -> Self {
        let epoch_s = src.get_u32();
        let offset_ns = src.get_u32();
        Self { epoch_s, offset_ns }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.epoch_s, self.offset_ns)
    }
}
