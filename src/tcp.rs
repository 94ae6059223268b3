//! FINS/TCP encapsulation and the connection-oriented transport.
//!
//! Over TCP every FINS frame travels inside a 16-byte encapsulation header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic `"FINS"` |
//! | 4 | 4 | Length of everything after this field |
//! | 8 | 4 | Command |
//! | 12 | 4 | Error code |
//! | 16 | n | Payload |
//!
//! Commands:
//!
//! | Code | Direction | Payload |
//! |------|-----------|---------|
//! | 0 | client → server | client node (0 = let the server assign) |
//! | 1 | server → client | client node, server node |
//! | 2 | both | one FINS frame |
//! | 3 | server → client | none; the error code field says why |
//!
//! All fields are big-endian.
//!
//! # Example
//!
//! ```
//! use fins_core::tcp::{TcpCommand, TcpPacket};
//!
//! let packet = TcpPacket::frame(vec![0x80, 0x00, 0x02]);
//! let bytes = packet.encode();
//! assert_eq!(&bytes[..4], b"FINS");
//! assert_eq!(&bytes[4..8], &[0, 0, 0, 11]);
//!
//! let decoded = TcpPacket::read_from(&mut &bytes[..]).unwrap();
//! assert_eq!(decoded.command, TcpCommand::Frame.code());
//! assert_eq!(decoded.payload, vec![0x80, 0x00, 0x02]);
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{FinsError, Result};
use crate::transport::{
    socket_timeout, timeout_or_io, ConnectedTransport, Transport, DEFAULT_TIMEOUT, MAX_PACKET_SIZE,
};

/// Encapsulation magic.
pub const TCP_MAGIC: [u8; 4] = *b"FINS";

/// Encapsulation header size in bytes.
pub const TCP_HEADER_SIZE: usize = 16;

/// Bytes counted by the length field besides the payload (command + error code).
const LENGTH_OVERHEAD: usize = 8;

/// Encapsulation command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpCommand {
    /// Client node address request.
    NodeAddressRequest,
    /// Server reply with both node addresses.
    NodeAddressResponse,
    /// Encapsulated FINS frame.
    Frame,
    /// Connection-level error notification.
    Error,
}

impl TcpCommand {
    /// Returns the 4-byte command code.
    pub fn code(self) -> u32 {
        match self {
            TcpCommand::NodeAddressRequest => 0,
            TcpCommand::NodeAddressResponse => 1,
            TcpCommand::Frame => 2,
            TcpCommand::Error => 3,
        }
    }

    /// Looks up a command by code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(TcpCommand::NodeAddressRequest),
            1 => Some(TcpCommand::NodeAddressResponse),
            2 => Some(TcpCommand::Frame),
            3 => Some(TcpCommand::Error),
            _ => None,
        }
    }
}

/// One encapsulated FINS/TCP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpPacket {
    /// Raw command code.
    pub command: u32,
    /// Error code (0 = none).
    pub error_code: u32,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl TcpPacket {
    /// Creates a packet.
    pub fn new(command: TcpCommand, error_code: u32, payload: Vec<u8>) -> Self {
        Self {
            command: command.code(),
            error_code,
            payload,
        }
    }

    /// Wraps a FINS frame.
    pub fn frame(frame: Vec<u8>) -> Self {
        Self::new(TcpCommand::Frame, 0, frame)
    }

    /// Builds the client's node address request.
    pub fn node_request(client_node: u8) -> Self {
        Self::new(
            TcpCommand::NodeAddressRequest,
            0,
            u32::from(client_node).to_be_bytes().to_vec(),
        )
    }

    /// Builds the server's node address reply.
    pub fn node_response(client_node: u8, server_node: u8) -> Self {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&u32::from(client_node).to_be_bytes());
        payload.extend_from_slice(&u32::from(server_node).to_be_bytes());
        Self::new(TcpCommand::NodeAddressResponse, 0, payload)
    }

    /// Returns the decoded command, if known.
    pub fn kind(&self) -> Option<TcpCommand> {
        TcpCommand::from_code(self.command)
    }

    /// Serializes the packet with its header.
    pub fn encode(&self) -> Vec<u8> {
        let length = (LENGTH_OVERHEAD + self.payload.len()) as u32;
        let mut bytes = Vec::with_capacity(TCP_HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&TCP_MAGIC);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&self.command.to_be_bytes());
        bytes.extend_from_slice(&self.error_code.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decodes one packet from the front of `bytes`.
    ///
    /// Returns `None` until a whole packet is present, otherwise the packet
    /// and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` on a bad magic or an implausible length, as
    /// soon as the header is complete.
    pub fn decode(bytes: &[u8]) -> Result<Option<(Self, usize)>> {
        if bytes.len() < TCP_HEADER_SIZE {
            return Ok(None);
        }
        if bytes[..4] != TCP_MAGIC {
            return Err(FinsError::invalid_response(format!(
                "bad FINS/TCP magic {}",
                hex::encode(&bytes[..4])
            )));
        }
        let length = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if !(LENGTH_OVERHEAD..=LENGTH_OVERHEAD + MAX_PACKET_SIZE).contains(&length) {
            return Err(FinsError::invalid_response(format!(
                "FINS/TCP length {length} out of range"
            )));
        }
        let total = TCP_HEADER_SIZE + length - LENGTH_OVERHEAD;
        if bytes.len() < total {
            return Ok(None);
        }

        let packet = Self {
            command: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            error_code: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            payload: bytes[TCP_HEADER_SIZE..total].to_vec(),
        };
        Ok(Some((packet, total)))
    }

    /// Reads one packet from `reader`.
    ///
    /// Bytes of a partly received packet are lost if the read times out; use
    /// a [`PacketBuffer`] on streams with short read timeouts.
    ///
    /// # Errors
    ///
    /// - `InvalidResponse` on a bad magic or an implausible length
    /// - `Timeout` if the reader's timeout expires
    /// - `Transport` on other I/O failures, including EOF
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        PacketBuffer::new().read_packet(reader)
    }

    /// Writes the packet to `writer`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if the write fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a 4-byte big-endian node number from the payload at `offset`.
    fn node_at(&self, offset: usize) -> Option<u8> {
        self.payload
            .get(offset..offset + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u8)
    }
}

/// Receive buffer for one FINS/TCP stream.
///
/// Holds the bytes of a partly received packet across read timeouts so the
/// stream stays in step with the packet boundaries.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    bytes: Vec<u8>,
}

impl PacketBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered bytes not yet decoded.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Takes the next complete packet out of the buffer, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the buffered header is malformed; the
    /// buffer is cleared since the stream can no longer be framed.
    pub fn next_packet(&mut self) -> Result<Option<TcpPacket>> {
        match TcpPacket::decode(&self.bytes) {
            Ok(Some((packet, used))) => {
                self.bytes.drain(..used);
                Ok(Some(packet))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.bytes.clear();
                Err(err)
            }
        }
    }

    /// Performs one read from `reader` and appends whatever arrived.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the reader's timeout expires; buffered bytes are kept
    /// - `Transport` on EOF (`UnexpectedEof`) and other I/O failures
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut chunk = [0u8; 512];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => {
                    return Err(FinsError::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "FINS/TCP stream closed",
                    )))
                }
                Ok(n) => {
                    self.bytes.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(timeout_or_io(err)),
            }
        }
    }

    /// Reads from `reader` until a whole packet is buffered and returns it.
    ///
    /// # Errors
    ///
    /// See [`next_packet`](Self::next_packet) and [`fill_from`](Self::fill_from).
    pub fn read_packet<R: Read>(&mut self, reader: &mut R) -> Result<TcpPacket> {
        loop {
            if let Some(packet) = self.next_packet()? {
                return Ok(packet);
            }
            self.fill_from(reader)?;
        }
    }
}

/// Server side of the node address handshake.
///
/// Reads the client's request through `buffer` and replies with the client
/// node (the requested one, or `assign` when the client asked for 0) and
/// `server_node`. Returns the client node. Anything the client sent after the
/// request stays in `buffer`.
///
/// # Errors
///
/// Returns `FinsError::InvalidResponse` if the first packet is not a node
/// address request, plus any read/write error.
pub fn accept_handshake<S: Read + Write>(
    stream: &mut S,
    buffer: &mut PacketBuffer,
    server_node: u8,
    assign: u8,
) -> Result<u8> {
    let request = buffer.read_packet(stream)?;
    if request.kind() != Some(TcpCommand::NodeAddressRequest) {
        return Err(FinsError::invalid_response(format!(
            "expected node address request, got command {}",
            request.command
        )));
    }
    let client_node = match request.node_at(0).unwrap_or(0) {
        0 => assign,
        node => node,
    };
    TcpPacket::node_response(client_node, server_node).write_to(stream)?;
    Ok(client_node)
}

/// FINS/TCP transport.
///
/// [`connect`](ConnectedTransport::connect) opens the stream and performs the
/// node address handshake; the assigned nodes are then available from
/// [`client_node`](Self::client_node) and [`server_node`](Self::server_node)
/// for use in the session's FINS headers.
#[derive(Debug)]
pub struct TcpTransport {
    remote: SocketAddr,
    requested_node: u8,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    buffer: PacketBuffer,
    client_node: u8,
    server_node: u8,
}

impl TcpTransport {
    /// Creates an unconnected transport for `remote`.
    ///
    /// `client_node` 0 asks the server to assign one.
    pub fn new(remote: SocketAddr, client_node: u8) -> Self {
        Self {
            remote,
            requested_node: client_node,
            connect_timeout: DEFAULT_TIMEOUT,
            stream: None,
            buffer: PacketBuffer::new(),
            client_node: 0,
            server_node: 0,
        }
    }

    /// Sets the connect and handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the remote address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Client node agreed in the handshake (0 before connecting).
    pub fn client_node(&self) -> u8 {
        self.client_node
    }

    /// Server node reported in the handshake (0 before connecting).
    pub fn server_node(&self) -> u8 {
        self.server_node
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(not_connected)
    }

    fn handshake(&mut self) -> Result<()> {
        let requested = self.requested_node;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        TcpPacket::node_request(requested).write_to(stream)?;
        let reply = self.buffer.read_packet(stream)?;

        match reply.kind() {
            Some(TcpCommand::NodeAddressResponse) => {}
            Some(TcpCommand::Error) => {
                return Err(FinsError::invalid_response(format!(
                    "handshake rejected with error code 0x{:08X}",
                    reply.error_code
                )))
            }
            _ => {
                return Err(FinsError::invalid_response(format!(
                    "unexpected handshake reply command {}",
                    reply.command
                )))
            }
        }
        let (client, server) = reply
            .node_at(0)
            .zip(reply.node_at(4))
            .ok_or_else(|| FinsError::invalid_response("short node address reply"))?;
        self.client_node = client;
        self.server_node = server;
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, _peer: SocketAddr, frame: &[u8]) -> Result<()> {
        trace!(peer = %self.remote, frame = %hex::encode(frame), "tcp send");
        TcpPacket::frame(frame.to_vec()).write_to(self.stream()?)
    }

    fn receive(&mut self, timeout: Duration) -> Result<(SocketAddr, Vec<u8>)> {
        let remote = self.remote;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let deadline = Instant::now() + timeout;

        let packet = loop {
            if let Some(packet) = self.buffer.next_packet()? {
                break packet;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FinsError::Timeout);
            }
            stream.set_read_timeout(Some(socket_timeout(remaining)))?;
            self.buffer.fill_from(stream)?;
        };

        match packet.kind() {
            Some(TcpCommand::Frame) => {
                trace!(peer = %remote, frame = %hex::encode(&packet.payload), "tcp receive");
                Ok((remote, packet.payload))
            }
            Some(TcpCommand::Error) => {
                warn!(peer = %remote, error_code = packet.error_code, "FINS/TCP error packet");
                Err(FinsError::invalid_response(format!(
                    "FINS/TCP error code 0x{:08X}",
                    packet.error_code
                )))
            }
            _ => Err(FinsError::invalid_response(format!(
                "unexpected FINS/TCP command {}",
                packet.command
            ))),
        }
    }

    fn local_endpoint(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl ConnectedTransport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect_timeout(&self.remote, socket_timeout(self.connect_timeout))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(socket_timeout(self.connect_timeout)))?;
        self.stream = Some(stream);
        self.buffer.clear();

        if let Err(err) = self.handshake() {
            self.disconnect();
            return Err(err);
        }
        debug!(
            peer = %self.remote,
            client_node = self.client_node,
            server_node = self.server_node,
            "FINS/TCP connected"
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(peer = %self.remote, "FINS/TCP disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

fn not_connected() -> FinsError {
    FinsError::Transport(io::Error::new(
        io::ErrorKind::NotConnected,
        "FINS/TCP transport is not connected",
    ))
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;

    #[test]
    fn test_encode_header() {
        let bytes = TcpPacket::node_request(0x0C).encode();
        assert_eq!(
            hex::encode(&bytes),
            "46494e53\
             0000000c\
             00000000\
             00000000\
             0000000c"
        );
        assert_eq!(bytes.len(), 20);
    }

    #[test]
    fn test_node_response_payload() {
        let packet = TcpPacket::node_response(0x0C, 0x01);
        assert_eq!(packet.kind(), Some(TcpCommand::NodeAddressResponse));
        assert_eq!(packet.node_at(0), Some(0x0C));
        assert_eq!(packet.node_at(4), Some(0x01));
        assert_eq!(packet.node_at(8), None);
    }

    #[test]
    fn test_read_bad_magic() {
        let mut bytes = TcpPacket::frame(vec![1]).encode();
        bytes[0] = b'X';
        let err = TcpPacket::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FinsError::InvalidResponse { .. }));
    }

    #[test]
    fn test_read_bad_length() {
        let mut bytes = TcpPacket::frame(vec![]).encode();
        bytes[7] = 4;
        assert!(TcpPacket::read_from(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_read_eof_is_transport_error() {
        let bytes = TcpPacket::frame(vec![1, 2, 3]).encode();
        let err = TcpPacket::read_from(&mut Cursor::new(&bytes[..17])).unwrap_err();
        assert!(matches!(err, FinsError::Transport(_)));
    }

    #[test]
    fn test_decode_waits_for_whole_packet() {
        let bytes = TcpPacket::frame(vec![1, 2, 3]).encode();
        assert_eq!(TcpPacket::decode(&bytes[..8]).unwrap(), None);
        assert_eq!(TcpPacket::decode(&bytes[..18]).unwrap(), None);

        let mut two = bytes.clone();
        two.extend_from_slice(&bytes);
        let (packet, used) = TcpPacket::decode(&two).unwrap().unwrap();
        assert_eq!(used, 19);
        assert_eq!(packet.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_partial_packet_survives_timeout() {
        let bytes = TcpPacket::frame(vec![0xC0, 0x00, 0x02]).encode();
        let mut reader = Scripted::new(vec![
            Ok(bytes[..8].to_vec()),
            Err(io::ErrorKind::WouldBlock),
            Ok(bytes[8..].to_vec()),
        ]);
        let mut buffer = PacketBuffer::new();

        assert!(matches!(buffer.read_packet(&mut reader), Err(FinsError::Timeout)));
        assert_eq!(buffer.len(), 8);

        let packet = buffer.read_packet(&mut reader).unwrap();
        assert_eq!(packet.payload, vec![0xC0, 0x00, 0x02]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_bad_magic_clears_buffer() {
        let mut bytes = TcpPacket::frame(vec![1]).encode();
        bytes[1] = b'X';
        let mut buffer = PacketBuffer::new();
        buffer.fill_from(&mut Cursor::new(bytes)).unwrap();
        assert!(buffer.next_packet().is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_accept_handshake_keeps_following_frame() {
        let mut input = TcpPacket::node_request(0x0C).encode();
        input.extend_from_slice(&TcpPacket::frame(vec![0x80, 0x00]).encode());
        let mut input = Cursor::new(input);
        let mut stream = ReadWrite {
            input: &mut input,
            output: Vec::new(),
        };
        let mut buffer = PacketBuffer::new();

        assert_eq!(accept_handshake(&mut stream, &mut buffer, 0x01, 0x22).unwrap(), 0x0C);
        let frame = buffer.read_packet(&mut stream).unwrap();
        assert_eq!(frame.kind(), Some(TcpCommand::Frame));
        assert_eq!(frame.payload, vec![0x80, 0x00]);
    }

    #[test]
    fn test_accept_handshake_assigns_node() {
        let mut input = Cursor::new(TcpPacket::node_request(0).encode());
        let mut stream = ReadWrite {
            input: &mut input,
            output: Vec::new(),
        };
        let node = accept_handshake(&mut stream, &mut PacketBuffer::new(), 0x01, 0x22).unwrap();
        assert_eq!(node, 0x22);

        let reply = TcpPacket::read_from(&mut Cursor::new(stream.output)).unwrap();
        assert_eq!(reply.node_at(0), Some(0x22));
        assert_eq!(reply.node_at(4), Some(0x01));
    }

    #[test]
    fn test_connect_handshake_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buffer = PacketBuffer::new();
            let node = accept_handshake(&mut stream, &mut buffer, 0x01, 0x10).unwrap();
            let packet = buffer.read_packet(&mut stream).unwrap();
            TcpPacket::frame(packet.payload).write_to(&mut stream).unwrap();
            node
        });

        let mut transport = TcpTransport::new(addr, 0x0C);
        assert!(!transport.is_connected());
        transport.connect().unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.client_node(), 0x0C);
        assert_eq!(transport.server_node(), 0x01);

        transport.send(addr, &[0xAA, 0xBB]).unwrap();
        let (peer, frame) = transport.receive(Duration::from_secs(1)).unwrap();
        assert_eq!(peer, addr);
        assert_eq!(frame, vec![0xAA, 0xBB]);

        transport.disconnect();
        assert!(!transport.is_connected());
        assert_eq!(server.join().unwrap(), 0x0C);
    }

    #[test]
    fn test_receive_packet_split_across_timeouts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            accept_handshake(&mut stream, &mut PacketBuffer::new(), 0x01, 0x10).unwrap();
            let bytes = TcpPacket::frame(vec![0xC0, 0x00, 0x02, 0x00]).encode();
            stream.write_all(&bytes[..8]).unwrap();
            std::thread::sleep(Duration::from_millis(200));
            stream.write_all(&bytes[8..]).unwrap();
            std::thread::sleep(Duration::from_millis(200));
        });

        let mut transport = TcpTransport::new(addr, 0x0C);
        transport.connect().unwrap();
        assert!(matches!(
            transport.receive(Duration::from_millis(50)),
            Err(FinsError::Timeout)
        ));

        let mut received = None;
        for _ in 0..40 {
            match transport.receive(Duration::from_millis(50)) {
                Ok((_, frame)) => {
                    received = Some(frame);
                    break;
                }
                Err(FinsError::Timeout) => continue,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(received, Some(vec![0xC0, 0x00, 0x02, 0x00]));
        server.join().unwrap();
    }

    #[test]
    fn test_send_without_connect() {
        let mut transport = TcpTransport::new("127.0.0.1:9600".parse().unwrap(), 0);
        assert!(matches!(
            transport.send("127.0.0.1:9600".parse().unwrap(), &[1]),
            Err(FinsError::Transport(_))
        ));
    }

    /// Reader that replays a fixed sequence of chunks and errors.
    struct Scripted {
        steps: std::collections::VecDeque<std::result::Result<Vec<u8>, io::ErrorKind>>,
    }

    impl Scripted {
        fn new(steps: Vec<std::result::Result<Vec<u8>, io::ErrorKind>>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(kind)) => Err(io::Error::from(kind)),
                None => Ok(0),
            }
        }
    }

    struct ReadWrite<'a> {
        input: &'a mut Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for ReadWrite<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ReadWrite<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
