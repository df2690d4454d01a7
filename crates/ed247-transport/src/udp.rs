use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::{Result, TransportError};
use crate::traits::{LinkFactory, TransportLink};

/// How the socket currently waits on `recv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    Unset,
    Poll,
    Blocking(Duration),
}

/// UDP link (unicast or multicast).
///
/// The socket is opened with `SO_REUSEADDR` so several components on one
/// host can listen on the same multicast endpoint. A multicast `local`
/// address binds the wildcard address on that port and joins the group.
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    local: Option<SocketAddr>,
    remote: Option<SocketAddr>,
    read_mode: Mutex<ReadMode>,
}

impl UdpLink {
    /// Open a link from its configuration.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let bind_addr = match config.local {
            Some(SocketAddr::V4(addr)) if addr.ip().is_multicast() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port())
            }
            Some(addr) => addr,
            None => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        };

        let socket = Self::bind_socket(bind_addr).map_err(|source| TransportError::Bind {
            addr: bind_addr,
            source,
        })?;

        if let Some(SocketAddr::V4(group)) = config.local {
            if group.ip().is_multicast() {
                let iface = config.multicast_interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
                socket
                    .join_multicast_v4(group.ip(), &iface)
                    .map_err(|source| TransportError::Multicast {
                        group: SocketAddr::V4(group),
                        source,
                    })?;
                debug!(%group, %iface, "joined multicast group");
            }
        }

        if let Some(SocketAddr::V4(remote)) = config.remote {
            if remote.ip().is_multicast() {
                if let Some(ttl) = config.multicast_ttl {
                    socket.set_multicast_ttl_v4(ttl)?;
                }
                if let Some(iface) = config.multicast_interface {
                    let raw = Socket::from(socket.try_clone()?);
                    raw.set_multicast_if_v4(&iface)?;
                }
            }
        }

        info!(link = %config, "opened udp link");

        Ok(Self {
            socket,
            local: config.local,
            remote: config.remote,
            read_mode: Mutex::new(ReadMode::Unset),
        })
    }

    fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
        let domain = match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        Ok(socket.into())
    }

    /// The address the socket is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn set_read_mode(&self, timeout: Duration) -> io::Result<()> {
        let wanted = if timeout.is_zero() {
            ReadMode::Poll
        } else {
            ReadMode::Blocking(timeout)
        };
        let mut mode = self.read_mode.lock();
        if *mode == wanted {
            return Ok(());
        }
        match wanted {
            ReadMode::Poll => self.socket.set_nonblocking(true)?,
            ReadMode::Blocking(timeout) => {
                self.socket.set_nonblocking(false)?;
                self.socket.set_read_timeout(Some(timeout))?;
            }
            ReadMode::Unset => {}
        }
        *mode = wanted;
        Ok(())
    }
}

impl TransportLink for UdpLink {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let remote = self
            .remote
            .ok_or_else(|| TransportError::NoRemote(self.describe()))?;
        let sent = self
            .socket
            .send_to(frame, remote)
            .map_err(|source| TransportError::Send {
                remote,
                len: frame.len(),
                source,
            })?;
        if sent != frame.len() {
            return Err(TransportError::ShortSend {
                remote,
                sent,
                len: frame.len(),
            });
        }
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        if self.local.is_none() {
            return Err(TransportError::NoLocal(self.describe()));
        }
        self.set_read_mode(timeout)?;
        match self.socket.recv_from(buf) {
            Ok((len, _from)) => Ok(Some(len)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        LinkConfig {
            local: self.local,
            remote: self.remote,
            multicast_interface: None,
            multicast_ttl: None,
        }
        .to_string()
    }

    fn can_receive(&self) -> bool {
        self.local.is_some()
    }
}

/// Opens [`UdpLink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpLinkFactory;

impl LinkFactory for UdpLinkFactory {
    fn open(&self, config: &LinkConfig) -> Result<Arc<dyn TransportLink>> {
        Ok(Arc::new(UdpLink::open(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_receiver() -> UdpLink {
        UdpLink::open(&LinkConfig::receiver("127.0.0.1:0".parse().unwrap()))
            .expect("receiver should bind")
    }

    #[test]
    fn send_and_receive_datagram() {
        let rx = loopback_receiver();
        let addr = rx.local_addr().expect("bound address should be known");
        let tx = UdpLink::open(&LinkConfig::sender(addr)).expect("sender should open");

        tx.send(b"frame").expect("send should succeed");

        let mut buf = [0u8; 64];
        let len = rx
            .recv(&mut buf, Duration::from_secs(2))
            .expect("recv should succeed")
            .expect("datagram should arrive");
        assert_eq!(&buf[..len], b"frame");
    }

    #[test]
    fn poll_returns_none_when_idle() {
        let rx = loopback_receiver();
        let mut buf = [0u8; 16];
        let got = rx.recv(&mut buf, Duration::ZERO).expect("poll should succeed");
        assert!(got.is_none());
    }

    #[test]
    fn blocking_recv_times_out() {
        let rx = loopback_receiver();
        let mut buf = [0u8; 16];
        let got = rx
            .recv(&mut buf, Duration::from_millis(20))
            .expect("recv should succeed");
        assert!(got.is_none());
    }

    #[test]
    fn send_without_remote_is_an_error() {
        let rx = loopback_receiver();
        let err = rx.send(b"x").expect_err("send should fail without remote");
        assert!(matches!(err, TransportError::NoRemote(_)));
    }

    #[test]
    fn recv_without_local_is_an_error() {
        let tx = UdpLink::open(&LinkConfig::sender("127.0.0.1:9".parse().unwrap()))
            .expect("sender should open");
        assert!(!tx.can_receive());
        let mut buf = [0u8; 4];
        let err = tx
            .recv(&mut buf, Duration::ZERO)
            .expect_err("recv should fail without local");
        assert!(matches!(err, TransportError::NoLocal(_)));
    }
}
