//! ED-247 avionics data exchange.
//!
//! A component exchanges ARINC 429, ARINC 664, ARINC 825, serial, discrete,
//! analog, NAD and VNAD samples with other components over UDP channels,
//! each channel multiplexing several streams into one datagram.
//!
//! # Crate Structure
//!
//! - [`transport`]: UDP and in-memory links
//! - [`frame`]: frame header, segment codec and per-kind sample layouts
//! - [`runtime`]: components, channels, streams, signals and waits
//!
//! The most used runtime types are re-exported at the crate root.

/// Re-export transport types.
pub mod transport {
    pub use ed247_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ed247_frame::*;
}

/// Re-export runtime types.
pub mod runtime {
    pub use ed247_runtime::*;
}

pub use ed247_runtime::{
    Channel, Component, ComponentConfig, Ed247Error, ErrorCategory, PoppedSample, RuntimeConfig,
    Signal, Stream, StreamAssistant, StreamKind, Timestamp,
};
