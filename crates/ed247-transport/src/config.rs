use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Endpoint description of one link.
///
/// `local` is where the link receives, `remote` is where it sends. A link
/// used only to emit frames may leave `local` unset; it is then bound to an
/// ephemeral port. A link used only to listen may leave `remote` unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// Receive endpoint. A multicast address joins the group.
    #[serde(default)]
    pub local: Option<SocketAddr>,
    /// Destination endpoint (unicast or multicast).
    #[serde(default)]
    pub remote: Option<SocketAddr>,
    /// Interface used for multicast join and emission.
    #[serde(default)]
    pub multicast_interface: Option<Ipv4Addr>,
    /// Multicast TTL for emitted frames.
    #[serde(default)]
    pub multicast_ttl: Option<u32>,
}

impl LinkConfig {
    /// A link that sends to `remote` and does not listen.
    pub fn sender(remote: SocketAddr) -> Self {
        Self {
            local: None,
            remote: Some(remote),
            multicast_interface: None,
            multicast_ttl: None,
        }
    }

    /// A link that listens on `local` and does not send.
    pub fn receiver(local: SocketAddr) -> Self {
        Self {
            local: Some(local),
            remote: None,
            multicast_interface: None,
            multicast_ttl: None,
        }
    }

    /// A link that listens on `local` and sends to `remote`.
    pub fn duplex(local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            local: Some(local),
            remote: Some(remote),
            multicast_interface: None,
            multicast_ttl: None,
        }
    }

    /// Whether the link can receive.
    pub fn can_receive(&self) -> bool {
        self.local.is_some()
    }

    /// Whether the link can send.
    pub fn can_send(&self) -> bool {
        self.remote.is_some()
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.local, self.remote) {
            (Some(local), Some(remote)) => write!(f, "{local} -> {remote}"),
            (Some(local), None) => write!(f, "{local} (rx)"),
            (None, Some(remote)) => write!(f, "-> {remote}"),
            (None, None) => f.write_str("(unconnected)"),
        }
    }
}
