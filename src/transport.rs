//! Transport layer for FINS communication.
//!
//! The transport only moves byte buffers between endpoints; it knows nothing
//! about FINS framing. The protocol layer ([`Session`](crate::Session) and
//! [`Slave`](crate::Slave)) is generic over [`Transport`].
//!
//! - [`UdpTransport`]: connectionless, explicit peer per send
//! - [`TcpTransport`](crate::TcpTransport): connection-oriented FINS/TCP
//!
//! # Constants
//!
//! - [`DEFAULT_FINS_PORT`] - Default FINS port (9600)
//! - [`DEFAULT_TIMEOUT`] - Default response timeout (2 seconds)
//! - [`MAX_PACKET_SIZE`] - Receive buffer size (2048 bytes)
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use fins_core::{Transport, UdpTransport};
//!
//! let mut a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
//! let mut b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
//!
//! a.send(b.local_endpoint().unwrap(), &[0x80, 0x00, 0x02]).unwrap();
//! let (from, frame) = b.receive(Duration::from_secs(1)).unwrap();
//! assert_eq!(from, a.local_endpoint().unwrap());
//! assert_eq!(frame, vec![0x80, 0x00, 0x02]);
//! ```

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::trace;

use crate::error::{FinsError, Result};

/// Default FINS UDP/TCP port.
pub const DEFAULT_FINS_PORT: u16 = 9600;

/// Default timeout for a request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum FINS packet size.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Shortest read timeout handed to a socket; a zero timeout means "block forever".
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Byte-buffer transport between FINS endpoints.
pub trait Transport: Send {
    /// Sends one frame to `peer`.
    ///
    /// Connection-oriented transports send to their connected peer and
    /// ignore `peer`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if the underlying write fails.
    fn send(&mut self, peer: SocketAddr, frame: &[u8]) -> Result<()>;

    /// Waits up to `timeout` for one frame.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Timeout` if nothing arrives in time and
    /// `FinsError::Transport` on I/O failure.
    fn receive(&mut self, timeout: Duration) -> Result<(SocketAddr, Vec<u8>)>;

    /// Returns the local address, if bound.
    fn local_endpoint(&self) -> Option<SocketAddr>;
}

/// A transport with an explicit connection lifecycle.
pub trait ConnectedTransport: Transport {
    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if the connection cannot be established.
    fn connect(&mut self) -> Result<()>;

    /// Closes the connection. Closing an unconnected transport is a no-op.
    fn disconnect(&mut self);

    /// Returns whether the transport is connected.
    fn is_connected(&self) -> bool;
}

pub(crate) fn timeout_or_io(err: io::Error) -> FinsError {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => FinsError::Timeout,
        _ => FinsError::Transport(err),
    }
}

pub(crate) fn socket_timeout(timeout: Duration) -> Duration {
    timeout.max(MIN_SOCKET_TIMEOUT)
}

/// UDP transport for FINS communication.
///
/// Unconnected: every send names its peer and every receive reports its
/// sender, so one socket can serve as a client or as a slave.
pub struct UdpTransport {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl UdpTransport {
    /// Binds a UDP socket to `local`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if the socket cannot be bound.
    pub fn bind(local: SocketAddr) -> Result<Self> {
        Ok(Self::from_socket(UdpSocket::bind(local)?))
    }

    /// Binds to an ephemeral port on all interfaces.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if the socket cannot be bound.
    pub fn ephemeral() -> Result<Self> {
        Ok(Self::from_socket(UdpSocket::bind("0.0.0.0:0")?))
    }

    /// Wraps an already bound socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            buffer: vec![0u8; MAX_PACKET_SIZE],
        }
    }

    /// Returns a reference to the underlying socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, peer: SocketAddr, frame: &[u8]) -> Result<()> {
        trace!(%peer, frame = %hex::encode(frame), "udp send");
        self.socket.send_to(frame, peer)?;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<(SocketAddr, Vec<u8>)> {
        self.socket.set_read_timeout(Some(socket_timeout(timeout)))?;
        let (size, peer) = self
            .socket
            .recv_from(&mut self.buffer)
            .map_err(timeout_or_io)?;
        let frame = self.buffer[..size].to_vec();
        trace!(%peer, frame = %hex::encode(&frame), "udp receive");
        Ok((peer, frame))
    }

    fn local_endpoint(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.socket.local_addr().ok())
            .finish()
    }
}
