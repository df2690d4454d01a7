//! Pluggable clocks for receive and transport timestamps.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ed247_frame::Timestamp;
use parking_lot::RwLock;

/// A clock callback.
pub type TimeHandler = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// An injectable clock.
///
/// Each component owns one for receive timestamps and one for transport
/// timestamps. The handler can be swapped at any time, including while
/// other threads read it.
pub struct TimeSource {
    handler: RwLock<Option<TimeHandler>>,
}

impl TimeSource {
    /// A source with no handler bound.
    pub fn unbound() -> Self {
        Self {
            handler: RwLock::new(None),
        }
    }

    /// A source bound to a fresh [`MonotonicClock`].
    pub fn monotonic() -> Self {
        let clock = MonotonicClock::new();
        let source = Self::unbound();
        source.set_handler(move || clock.now());
        source
    }

    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn() -> Timestamp + Send + Sync + 'static,
    {
        *self.handler.write() = Some(Arc::new(handler));
    }

    pub fn clear_handler(&self) {
        *self.handler.write() = None;
    }

    /// Whether a handler is bound.
    pub fn is_valid(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Overwrite `timestamp` with the current time.
    ///
    /// Leaves `timestamp` untouched and returns `false` when no handler is
    /// bound.
    pub fn update_timestamp(&self, timestamp: &mut Timestamp) -> bool {
        match self.now() {
            Some(now) => {
                *timestamp = now;
                true
            }
            None => false,
        }
    }

    /// The current time, if a handler is bound.
    pub fn now(&self) -> Option<Timestamp> {
        let handler = self.handler.read().clone()?;
        Some(handler())
    }
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::monotonic()
    }
}

impl fmt::Debug for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSource")
            .field("bound", &self.is_valid())
            .finish()
    }
}

/// Wall-clock time that never goes backwards.
///
/// Anchored once to the system clock, then advanced by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_ns: u64,
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor_ns: Timestamp::now().as_nanos(),
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        let elapsed = self.start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
        Timestamp::from_nanos(self.anchor_ns.saturating_add(elapsed))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
