//! Datagram link abstraction for ED-247 channels.
//!
//! Provides a unified interface over the transports a channel may ride on:
//! - UDP unicast and multicast (via `socket2`)
//! - An in-memory network with datagram semantics, used by tests and demos
//!
//! This is the lowest layer of ed247. Channels only ever see the
//! [`TransportLink`] trait provided here.

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;
pub mod udp;

pub use config::LinkConfig;
pub use error::{Result, TransportError};
pub use memory::{MemoryLink, MemoryLinkFactory, MemoryNetwork};
pub use traits::{LinkFactory, TransportLink};
pub use udp::{UdpLink, UdpLinkFactory};
