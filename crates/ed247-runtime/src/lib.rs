//! ED-247 component runtime.
//!
//! A [`Component`] is loaded from a [`ComponentConfig`] topology. It owns
//! channels (frames over a primary and optional backup link), streams
//! (typed sample queues multiplexed in those frames) and signals (named
//! fields of discrete, analog, NAD and VNAD samples).
//!
//! Sending is explicit: samples are pushed on streams, then
//! [`Component::send_pushed_samples`] packs them into frames. Receiving
//! runs on background threads ([`Component::start_receiver`]) or on demand
//! ([`Component::poll_receive`]); applications pop samples or block in
//! [`Component::wait_frame`].
//!
//! ```no_run
//! use std::time::Duration;
//! use ed247_runtime::Component;
//!
//! let component = Component::from_path("probe.json")?;
//! let temp = component.get_stream("Temperature")?;
//! component.push_sample(&temp, &[0, 42], None)?;
//! component.send_pushed_samples()?;
//!
//! component.start_receiver()?;
//! let ready = component.wait_any(Duration::from_millis(100))?;
//! for stream in ready.iter() {
//!     while let Some(sample) = stream.pop()? {
//!         println!("{}: {:?}", stream.name(), sample.data);
//!     }
//! }
//! # Ok::<(), ed247_runtime::Ed247Error>(())
//! ```

pub mod assistant;
pub mod channel;
pub mod component;
pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
mod pattern;
mod receiver;
pub mod sample;
mod sequence;
pub mod signal;
pub mod status;
pub mod stream;
pub mod time;
mod wait;

pub use assistant::StreamAssistant;
pub use channel::{Channel, ChannelId, ChannelStats, SendPhase};
pub use component::{Component, StreamList};
pub use config::{
    ChannelConfig, ComponentConfig, Direction, HeaderConfig, RuntimeConfig, SignalConfig,
    StreamConfig, DEFAULT_MAX_TRACKED_SOURCES,
};
pub use error::{Ed247Error, ErrorCategory, Result};
pub use handle::{HandleCollection, HandleSource};
pub use logging::{LogLevel, ParseLogLevelError, LOG_LEVEL_ENV};
pub use sample::{PoppedSample, PushOutcome, SampleInfo};
pub use signal::{Signal, SignalId, SignalKind, SignalValue};
pub use status::{clear_last_error, last_error, poll_status, status, IntoStatus, Status};
pub use stream::{Stream, StreamId, StreamStats};
pub use time::{MonotonicClock, TimeHandler, TimeSource};

pub use ed247_frame::{DataTimestampMode, NadType, StreamKind, Timestamp};
pub use ed247_transport::{LinkConfig, LinkFactory, MemoryNetwork, TransportLink, UdpLinkFactory};
