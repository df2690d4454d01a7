use std::net::SocketAddr;

/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the local endpoint.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to join a multicast group.
    #[error("failed to join multicast group {group}: {source}")]
    Multicast {
        group: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to send a datagram.
    #[error("failed to send {len} bytes to {remote}: {source}")]
    Send {
        remote: SocketAddr,
        len: usize,
        source: std::io::Error,
    },

    /// The datagram was sent only partially.
    #[error("short send to {remote} ({sent} of {len} bytes)")]
    ShortSend {
        remote: SocketAddr,
        sent: usize,
        len: usize,
    },

    /// The link has no remote endpoint and cannot send.
    #[error("link {0} has no remote endpoint")]
    NoRemote(String),

    /// The link has no local endpoint and cannot receive.
    #[error("link {0} has no local endpoint")]
    NoLocal(String),

    /// The received datagram did not fit the receive buffer.
    #[error("datagram truncated (buffer of {capacity} bytes)")]
    Truncated { capacity: usize },

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been shut down.
    #[error("link shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
