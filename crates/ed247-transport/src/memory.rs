//! In-memory datagram network.
//!
//! Emulates UDP between links living in the same process: a frame sent to an
//! address lands in the mailbox of every link listening on that address, and
//! is silently lost when nobody listens. Used by tests and demos to run
//! components back to back without sockets.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::config::LinkConfig;
use crate::error::{Result, TransportError};
use crate::traits::{LinkFactory, TransportLink};

#[derive(Debug, Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Bytes>>,
    ready: Condvar,
}

impl Mailbox {
    fn post(&self, frame: Bytes) {
        self.queue.lock().push_back(frame);
        self.ready.notify_one();
    }
}

/// A shared in-memory network.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<SocketAddr, Vec<Weak<Mailbox>>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a link on this network.
    pub fn link(&self, config: &LinkConfig) -> MemoryLink {
        let mailbox = config.local.map(|local| {
            let mailbox = Arc::new(Mailbox::default());
            self.listeners
                .lock()
                .entry(local)
                .or_default()
                .push(Arc::downgrade(&mailbox));
            mailbox
        });
        MemoryLink {
            network: self.clone(),
            local: config.local,
            remote: config.remote,
            mailbox,
            fail_sends: AtomicBool::new(false),
        }
    }

    /// A factory opening links on this network.
    pub fn factory(&self) -> MemoryLinkFactory {
        MemoryLinkFactory {
            network: self.clone(),
            opened: Arc::default(),
        }
    }

    fn deliver(&self, remote: SocketAddr, frame: &[u8]) -> usize {
        let mut listeners = self.listeners.lock();
        let Some(boxes) = listeners.get_mut(&remote) else {
            return 0;
        };
        boxes.retain(|mailbox| mailbox.strong_count() > 0);
        let frame = Bytes::copy_from_slice(frame);
        let mut delivered = 0;
        for mailbox in boxes.iter().filter_map(Weak::upgrade) {
            mailbox.post(frame.clone());
            delivered += 1;
        }
        delivered
    }
}

/// One endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryLink {
    network: MemoryNetwork,
    local: Option<SocketAddr>,
    remote: Option<SocketAddr>,
    mailbox: Option<Arc<Mailbox>>,
    fail_sends: AtomicBool,
}

impl MemoryLink {
    /// Make every following `send` fail with a broken-pipe error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Number of frames waiting in this link's mailbox.
    pub fn pending(&self) -> usize {
        self.mailbox.as_ref().map_or(0, |m| m.queue.lock().len())
    }
}

impl TransportLink for MemoryLink {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let remote = self
            .remote
            .ok_or_else(|| TransportError::NoRemote(self.describe()))?;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send {
                remote,
                len: frame.len(),
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "link failure"),
            });
        }
        let delivered = self.network.deliver(remote, frame);
        trace!(%remote, len = frame.len(), delivered, "memory datagram sent");
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        let mailbox = self
            .mailbox
            .as_ref()
            .ok_or_else(|| TransportError::NoLocal(self.describe()))?;
        let deadline = Instant::now().checked_add(timeout);
        let mut queue = mailbox.queue.lock();
        loop {
            if let Some(frame) = queue.pop_front() {
                if frame.len() > buf.len() {
                    return Err(TransportError::Truncated {
                        capacity: buf.len(),
                    });
                }
                buf[..frame.len()].copy_from_slice(&frame);
                return Ok(Some(frame.len()));
            }
            if timeout.is_zero() {
                return Ok(None);
            }
            let Some(deadline) = deadline else {
                mailbox.ready.wait(&mut queue);
                continue;
            };
            if mailbox.ready.wait_until(&mut queue, deadline).timed_out() && queue.is_empty() {
                return Ok(None);
            }
        }
    }

    fn describe(&self) -> String {
        let config = LinkConfig {
            local: self.local,
            remote: self.remote,
            multicast_interface: None,
            multicast_ttl: None,
        };
        format!("mem {config}")
    }

    fn can_receive(&self) -> bool {
        self.mailbox.is_some()
    }
}

/// Opens [`MemoryLink`]s and remembers them so tests can reach in and
/// inject failures.
#[derive(Debug, Clone)]
pub struct MemoryLinkFactory {
    network: MemoryNetwork,
    opened: Arc<Mutex<Vec<Arc<MemoryLink>>>>,
}

impl MemoryLinkFactory {
    /// Every link opened so far, in opening order.
    pub fn opened(&self) -> Vec<Arc<MemoryLink>> {
        self.opened.lock().clone()
    }
}

impl LinkFactory for MemoryLinkFactory {
    fn open(&self, config: &LinkConfig) -> Result<Arc<dyn TransportLink>> {
        let link = Arc::new(self.network.link(config));
        self.opened.lock().push(link.clone());
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn datagram_reaches_every_listener() {
        let net = MemoryNetwork::new();
        let a = net.link(&LinkConfig::receiver(addr(1)));
        let b = net.link(&LinkConfig::receiver(addr(1)));
        let tx = net.link(&LinkConfig::sender(addr(1)));

        tx.send(b"hello").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(a.recv(&mut buf, Duration::ZERO).unwrap(), Some(5));
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(b.recv(&mut buf, Duration::ZERO).unwrap(), Some(5));
    }

    #[test]
    fn unbounded_recv_waits_for_datagram() {
        let net = MemoryNetwork::new();
        let rx = net.link(&LinkConfig::receiver(addr(3)));
        let tx = net.link(&LinkConfig::sender(addr(3)));
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(b"late").unwrap();
        });

        let mut buf = [0u8; 8];
        assert_eq!(rx.recv(&mut buf, Duration::MAX).unwrap(), Some(4));
        sender.join().unwrap();
    }

    #[test]
    fn datagram_without_listener_is_lost() {
        let net = MemoryNetwork::new();
        let tx = net.link(&LinkConfig::sender(addr(2)));
        tx.send(b"nobody").expect("send to nobody should still succeed");
        let late = net.link(&LinkConfig::receiver(addr(2)));
        assert_eq!(late.pending(), 0);
    }

    #[test]
    fn recv_waits_for_a_late_frame() {
        let net = MemoryNetwork::new();
        let rx = net.link(&LinkConfig::receiver(addr(3)));
        let tx = net.link(&LinkConfig::sender(addr(3)));

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(b"late").unwrap();
        });

        let mut buf = [0u8; 8];
        let got = rx.recv(&mut buf, Duration::from_secs(2)).unwrap();
        assert_eq!(got, Some(4));
        sender.join().unwrap();
    }

    #[test]
    fn recv_times_out() {
        let net = MemoryNetwork::new();
        let rx = net.link(&LinkConfig::receiver(addr(4)));
        let start = Instant::now();
        let mut buf = [0u8; 8];
        assert_eq!(rx.recv(&mut buf, Duration::from_millis(30)).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn injected_send_failure() {
        let net = MemoryNetwork::new();
        let tx = net.link(&LinkConfig::sender(addr(5)));
        tx.set_fail_sends(true);
        let err = tx.send(b"x").expect_err("send should fail");
        assert!(matches!(err, TransportError::Send { .. }));
    }

    #[test]
    fn oversized_frame_is_reported() {
        let net = MemoryNetwork::new();
        let rx = net.link(&LinkConfig::receiver(addr(6)));
        net.link(&LinkConfig::sender(addr(6)))
            .send(&[0u8; 32])
            .unwrap();
        let mut buf = [0u8; 8];
        let err = rx.recv(&mut buf, Duration::ZERO).expect_err("frame should not fit");
        assert!(matches!(err, TransportError::Truncated { capacity: 8 }));
    }
}
