use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LinkConfig;
use crate::error::Result;

/// A datagram link carrying whole channel frames.
///
/// One call to [`send`](TransportLink::send) emits exactly one frame and one
/// successful [`recv`](TransportLink::recv) yields exactly one frame. Links
/// are shared between the application thread (sending) and the receive role
/// (a receiver thread or a polling caller), so both take `&self`.
pub trait TransportLink: Send + Sync + fmt::Debug {
    /// Emit one frame.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Receive one frame into `buf`.
    ///
    /// Blocks for at most `timeout`; a zero timeout polls. Returns
    /// `Ok(None)` when nothing arrived in time.
    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>>;

    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;

    /// Whether the link has a receive endpoint.
    fn can_receive(&self) -> bool;
}

/// Opens links from their configuration.
///
/// The runtime asks the factory for every primary and backup link while a
/// component loads; swapping the factory swaps the transport.
pub trait LinkFactory {
    fn open(&self, config: &LinkConfig) -> Result<Arc<dyn TransportLink>>;
}
