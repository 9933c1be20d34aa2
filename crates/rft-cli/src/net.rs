//! UDP implementation of the channel seam.
//!
//! One socket per peer, bound to a local port and addressed at the fixed
//! relay endpoint. The read timeout is set per call so the sender's
//! shrinking round deadline maps directly onto the socket.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use rft_core::{ChannelError, DatagramChannel};
use rft_proto::MAX_DATAGRAM;

pub struct UdpChannel {
    socket: UdpSocket,
    relay: SocketAddr,
    buf: [u8; MAX_DATAGRAM],
}

impl UdpChannel {
    /// Bind `local_port` on all interfaces and resolve the relay address.
    pub fn bind(local_port: u16, relay: impl ToSocketAddrs) -> io::Result<Self> {
        let relay = relay.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "relay address did not resolve")
        })?;
        let socket = UdpSocket::bind(("0.0.0.0", local_port))?;
        Ok(Self {
            socket,
            relay,
            buf: [0; MAX_DATAGRAM],
        })
    }
}

impl DatagramChannel for UdpChannel {
    fn send(&mut self, frame: &[u8]) -> Result<(), ChannelError> {
        self.socket.send_to(frame, self.relay)?;
        Ok(())
    }

    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, ChannelError> {
        self.socket.set_read_timeout(timeout)?;
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, _from)) => Ok(Some(self.buf[..n].to_vec())),
            // Platform-dependent: timeouts surface as either kind.
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(err) => Err(ChannelError::Io(err)),
        }
    }
}
