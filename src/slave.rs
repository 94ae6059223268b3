//! Reference slave: answers memory area read/write requests from a [`MemoryStore`].
//!
//! The dispatcher is purely reactive. Each request frame yields one response
//! frame, and the only state carried between requests is the store contents.
//!
//! | Request | Response |
//! |---------|----------|
//! | read, word address | `count` words, big-endian |
//! | read, bit address | `count` consecutive bits, one byte each |
//! | write, word address | words applied, empty data |
//! | write, bit address | bit set or cleared from payload byte 0, empty data |
//! | other command | end code 0x0401, empty data |
//! | unknown area code | end code 0x1101, empty data |
//!
//! Out-of-range words read as 0 and out-of-range writes are dropped.
//!
//! # Example
//!
//! ```
//! use fins_core::{build_read, parse_response, Address, DenseMemory, NodeAddress, Slave};
//!
//! let mut slave = Slave::new(DenseMemory::with_pattern(100, |_, i| i as u16));
//! let request = build_read(NodeAddress::node(1), NodeAddress::node(0x0C), 7, "D10".parse().unwrap(), 2);
//!
//! let reply = slave.handle(&request).unwrap();
//! let response = parse_response(&reply).unwrap();
//! assert_eq!(response.header.sid, 7);
//! assert_eq!(response.to_words().unwrap(), vec![10, 11]);
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::address::Address;
use crate::cancel::CancelToken;
use crate::command::{
    command_code, parse_request, FinsRequest, MemoryCommand, MAX_WORDS_PER_COMMAND, MIN_REQUEST_SIZE,
};
use crate::error::{FinsError, Result};
use crate::header::FinsHeader;
use crate::response::{
    build_response, END_CODE_ADDRESS_RANGE, END_CODE_COMMAND_TOO_SHORT, END_CODE_NO_AREA,
    END_CODE_RANGE_EXCEEDED, END_CODE_SUCCESS, END_CODE_UNSUPPORTED_COMMAND,
};
use crate::store::MemoryStore;
use crate::tcp::{accept_handshake, PacketBuffer, TcpCommand, TcpPacket};
use crate::transport::{Transport, DEFAULT_TIMEOUT};

/// How long a serve loop waits for input before checking its cancel token.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// FINS/TCP error code: command not supported.
const TCP_ERROR_UNSUPPORTED: u32 = 0x03;

/// Node number the slave reports when none is configured.
pub const DEFAULT_SLAVE_NODE: u8 = 0x01;

/// FINS slave backed by a memory store.
#[derive(Debug)]
pub struct Slave<S> {
    store: S,
    node: u8,
}

impl<S: MemoryStore> Slave<S> {
    /// Creates a slave serving `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            node: DEFAULT_SLAVE_NODE,
        }
    }

    /// Sets the node number reported in the FINS/TCP handshake.
    pub fn with_node(mut self, node: u8) -> Self {
        self.node = node;
        self
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the store mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the slave, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Handles one raw request, returning the response frame.
    ///
    /// Returns `None` for buffers too short to answer (under 12 bytes) and
    /// for frames that are themselves responses.
    pub fn handle(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.len() < MIN_REQUEST_SIZE {
            warn!(len = frame.len(), "ignoring short FINS frame");
            return None;
        }
        if FinsHeader::from_bytes(frame).is_ok_and(FinsHeader::is_response) {
            debug!("ignoring FINS response frame");
            return None;
        }

        let (end_code, data) = match parse_request(frame) {
            Ok(request) => self.dispatch(&request),
            Err(err) => {
                let end_code = rejection_code(&err);
                warn!(
                    command = ?command_code(frame).map(|c| format!("0x{c:04X}")),
                    end_code = %format!("0x{end_code:04X}"),
                    error = %err,
                    "rejecting FINS request"
                );
                (end_code, Vec::new())
            }
        };

        match build_response(frame, end_code, &data) {
            Ok(response) => Some(response),
            Err(err) => {
                warn!(error = %err, "cannot build FINS response");
                None
            }
        }
    }

    fn dispatch(&mut self, request: &FinsRequest) -> (u16, Vec<u8>) {
        let FinsRequest {
            header,
            command,
            address,
            count,
            payload,
        } = request;
        debug!(
            sid = header.sid,
            command = ?command,
            address = %address,
            count,
            "dispatching FINS request"
        );

        if *count > MAX_WORDS_PER_COMMAND {
            return (END_CODE_RANGE_EXCEEDED, Vec::new());
        }

        match command {
            MemoryCommand::Read if address.is_bit() => {
                (END_CODE_SUCCESS, self.read_bits(*address, *count))
            }
            MemoryCommand::Read => (END_CODE_SUCCESS, self.read_words(*address, *count)),
            MemoryCommand::Write if address.is_bit() => match payload.first() {
                Some(&value) => {
                    self.store
                        .set_bit(address.area, usize::from(address.word), address.bit, value != 0);
                    (END_CODE_SUCCESS, Vec::new())
                }
                None => (END_CODE_COMMAND_TOO_SHORT, Vec::new()),
            },
            MemoryCommand::Write => {
                let words: Vec<u16> = payload
                    .chunks_exact(2)
                    .take(usize::from(*count))
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                self.store
                    .write_words(address.area, usize::from(address.word), &words);
                (END_CODE_SUCCESS, Vec::new())
            }
        }
    }

    fn read_words(&self, address: Address, count: u16) -> Vec<u8> {
        self.store
            .read_words(address.area, usize::from(address.word), usize::from(count))
            .into_iter()
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    /// Reads `count` bits starting at `address`, carrying into the next word
    /// after bit 15.
    fn read_bits(&self, address: Address, count: u16) -> Vec<u8> {
        let start = usize::from(address.word) * 16 + usize::from(address.bit);
        (start..start + usize::from(count))
            .map(|position| {
                let bit = (position % 16) as u8;
                u8::from(self.store.get_bit(address.area, position / 16, bit))
            })
            .collect()
    }

    /// Runs one receive-dispatch-send cycle.
    ///
    /// Returns `Ok(false)` if nothing arrived within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if receiving or sending fails.
    pub fn serve_once<T: Transport>(&mut self, transport: &mut T, timeout: Duration) -> Result<bool> {
        let (peer, frame) = match transport.receive(timeout) {
            Ok(received) => received,
            Err(FinsError::Timeout) => return Ok(false),
            Err(err) => return Err(err),
        };
        trace!(%peer, frame = %hex::encode(&frame), "slave receive");

        if let Some(response) = self.handle(&frame) {
            transport.send(peer, &response)?;
        }
        Ok(true)
    }

    /// Serves requests on `transport` until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the first transport error.
    pub fn run<T: Transport>(&mut self, transport: &mut T, cancel: &CancelToken) -> Result<()> {
        info!(local = ?transport.local_endpoint(), "FINS slave started");
        while !cancel.is_cancelled() {
            self.serve_once(transport, POLL_INTERVAL)?;
        }
        info!("FINS slave stopped");
        Ok(())
    }

    /// Accepts FINS/TCP connections on `listener` until `cancel` fires.
    ///
    /// Connections are served one at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails. Errors on a single connection
    /// are logged and end that connection only.
    pub fn serve_tcp(&mut self, listener: &TcpListener, cancel: &CancelToken) -> Result<()> {
        listener.set_nonblocking(true)?;
        info!(local = ?listener.local_addr().ok(), "FINS/TCP slave started");

        while !cancel.is_cancelled() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "FINS/TCP client connected");
                    if let Err(err) = self.serve_tcp_connection(stream, peer, cancel) {
                        warn!(%peer, error = %err, "FINS/TCP connection ended with error");
                    }
                    info!(%peer, "FINS/TCP client disconnected");
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(err.into()),
            }
        }
        info!("FINS/TCP slave stopped");
        Ok(())
    }

    /// Serves one FINS/TCP connection until the peer closes it or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns handshake and I/O errors other than an orderly close.
    pub fn serve_tcp_connection(
        &mut self,
        mut stream: TcpStream,
        peer: SocketAddr,
        cancel: &CancelToken,
    ) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(DEFAULT_TIMEOUT))?;

        let mut buffer = PacketBuffer::new();
        let client_node =
            accept_handshake(&mut stream, &mut buffer, self.node, assigned_node(peer))?;
        debug!(%peer, client_node, server_node = self.node, "FINS/TCP handshake done");
        stream.set_read_timeout(Some(POLL_INTERVAL))?;

        while !cancel.is_cancelled() {
            let packet = match buffer.read_packet(&mut stream) {
                Ok(packet) => packet,
                Err(FinsError::Timeout) => continue,
                Err(FinsError::Transport(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(())
                }
                Err(err) => return Err(err),
            };

            match packet.kind() {
                Some(TcpCommand::Frame) => {
                    if let Some(response) = self.handle(&packet.payload) {
                        TcpPacket::frame(response).write_to(&mut stream)?;
                    }
                }
                _ => {
                    warn!(%peer, command = packet.command, "unsupported FINS/TCP command");
                    TcpPacket::new(TcpCommand::Error, TCP_ERROR_UNSUPPORTED, Vec::new())
                        .write_to(&mut stream)?;
                }
            }
        }
        Ok(())
    }
}

/// End code sent back for a request that failed to parse.
fn rejection_code(err: &FinsError) -> u16 {
    match err {
        FinsError::UnsupportedCommand { .. } => END_CODE_UNSUPPORTED_COMMAND,
        FinsError::UnknownArea { .. } => END_CODE_NO_AREA,
        FinsError::AddressOutOfRange { .. } => END_CODE_ADDRESS_RANGE,
        _ => END_CODE_COMMAND_TOO_SHORT,
    }
}

/// Node handed to a TCP client that asked for automatic assignment: the last
/// octet of its IPv4 address.
fn assigned_node(peer: SocketAddr) -> u8 {
    match peer.ip() {
        IpAddr::V4(ip) => match ip.octets()[3] {
            0 => 0xEF,
            octet => octet,
        },
        IpAddr::V6(_) => 0xEF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{build_read, build_write};
    use crate::header::NodeAddress;
    use crate::memory::MemoryArea;
    use crate::response::parse_response;
    use crate::store::{DenseMemory, SparseMemory};

    fn dest() -> NodeAddress {
        NodeAddress::node(1)
    }

    fn src() -> NodeAddress {
        NodeAddress::node(0x0C)
    }

    fn slave() -> Slave<DenseMemory> {
        Slave::new(DenseMemory::with_pattern(5000, |area, i| match area {
            MemoryArea::DM => i as u16,
            _ => 0,
        }))
    }

    fn read(slave: &mut Slave<DenseMemory>, address: &str, count: u16) -> crate::FinsResponse {
        let request = build_read(dest(), src(), 0x23, address.parse().unwrap(), count);
        parse_response(&slave.handle(&request).unwrap()).unwrap()
    }

    #[test]
    fn test_read_words() {
        let mut slave = slave();
        let response = read(&mut slave, "D100", 3);
        assert!(response.is_success());
        assert_eq!(response.to_words().unwrap(), vec![100, 101, 102]);
        assert_eq!(response.header.destination(), src());
        assert_eq!(response.header.source(), dest());
    }

    #[test]
    fn test_read_out_of_range_is_zero() {
        let mut slave = slave();
        let response = read(&mut slave, "D4998", 4);
        assert!(response.is_success());
        assert_eq!(response.to_words().unwrap(), vec![4998, 4999, 0, 0]);

        let response = read(&mut slave, "D65535", 2);
        assert_eq!(response.to_words().unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_write_words() {
        let mut slave = slave();
        let request = build_write(
            dest(),
            src(),
            0x10,
            Address::word(MemoryArea::HR, 5),
            &[0x12, 0x34, 0xAB, 0xCD],
        )
        .unwrap();
        let response = parse_response(&slave.handle(&request).unwrap()).unwrap();

        assert!(response.is_success());
        assert!(response.data.is_empty());
        assert_eq!(slave.store().read_words(MemoryArea::HR, 5, 2), vec![0x1234, 0xABCD]);
    }

    #[test]
    fn test_write_out_of_range_ignored() {
        let mut slave = slave();
        let request = build_write(
            dest(),
            src(),
            0x10,
            Address::word(MemoryArea::DM, 4999),
            &[0, 7, 0, 8],
        )
        .unwrap();
        let response = parse_response(&slave.handle(&request).unwrap()).unwrap();
        assert!(response.is_success());
        assert_eq!(slave.store().get_word(MemoryArea::DM, 4999), 7);
    }

    #[test]
    fn test_write_bit_preserves_siblings() {
        let mut slave = slave();
        slave.store_mut().set_word(MemoryArea::WR, 0, 0xFFFF);

        let request = build_write(dest(), src(), 1, "W0.3".parse().unwrap(), &[0x00]).unwrap();
        let response = parse_response(&slave.handle(&request).unwrap()).unwrap();
        assert!(response.is_success());
        assert_eq!(slave.store().get_word(MemoryArea::WR, 0), 0xFFF7);
    }

    #[test]
    fn test_read_bits() {
        let mut slave = slave();
        slave.store_mut().set_word(MemoryArea::CIO, 10, 0b1000_0000_0000_0010);
        slave.store_mut().set_word(MemoryArea::CIO, 11, 0b0000_0000_0000_0001);

        assert_eq!(read(&mut slave, "C10.1", 1).data, vec![1]);
        assert_eq!(read(&mut slave, "C10.2", 1).data, vec![0]);
        assert_eq!(read(&mut slave, "C10.14", 4).data, vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_unsupported_command() {
        let mut slave = slave();
        let mut request = build_read(dest(), src(), 0x23, Address::word(MemoryArea::DM, 0), 1);
        request[10] = 0x01;
        request[11] = 0x03;

        let response = parse_response(&slave.handle(&request).unwrap()).unwrap();
        assert_eq!(response.end_code, 0x0401);
        assert!(response.data.is_empty());
        assert_eq!(response.command, 0x0103);
        assert_eq!(response.header.sid, 0x23);
    }

    #[test]
    fn test_unsupported_command_header_only() {
        let mut slave = slave();
        let request = build_read(dest(), src(), 0x05, Address::word(MemoryArea::DM, 0), 1);
        let mut short = request[..12].to_vec();
        short[11] = 0x03;

        let response = parse_response(&slave.handle(&short).unwrap()).unwrap();
        assert_eq!(response.end_code, END_CODE_UNSUPPORTED_COMMAND);
    }

    #[test]
    fn test_unknown_area() {
        let mut slave = slave();
        let mut request = build_read(dest(), src(), 0x23, Address::word(MemoryArea::DM, 0), 1);
        request[12] = 0x99;

        let response = parse_response(&slave.handle(&request).unwrap()).unwrap();
        assert_eq!(response.end_code, 0x1101);
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_short_body() {
        let mut slave = slave();
        let request = build_read(dest(), src(), 0x23, Address::word(MemoryArea::DM, 0), 1);
        let response = parse_response(&slave.handle(&request[..15]).unwrap()).unwrap();
        assert_eq!(response.end_code, END_CODE_COMMAND_TOO_SHORT);
    }

    #[test]
    fn test_count_too_large() {
        let mut slave = slave();
        let response = read(&mut slave, "D0", 1000);
        assert_eq!(response.end_code, END_CODE_RANGE_EXCEEDED);
    }

    #[test]
    fn test_ignores_short_and_response_frames() {
        let mut slave = slave();
        assert!(slave.handle(&[0x80, 0x00, 0x02]).is_none());

        let request = build_read(dest(), src(), 0x23, Address::word(MemoryArea::DM, 0), 1);
        let response = slave.handle(&request).unwrap();
        assert!(slave.handle(&response).is_none());
    }

    #[test]
    fn test_sparse_store() {
        let mut slave = Slave::new(SparseMemory::new(100));
        let request = build_write(dest(), src(), 1, "A99.15".parse().unwrap(), &[0x01]).unwrap();
        slave.handle(&request).unwrap();
        assert_eq!(slave.into_store().get_word(MemoryArea::AR, 99), 0x8000);
    }

    #[test]
    fn test_assigned_node() {
        assert_eq!(assigned_node("192.168.1.42:9600".parse().unwrap()), 42);
        assert_eq!(assigned_node("10.0.0.0:9600".parse().unwrap()), 0xEF);
        assert_eq!(assigned_node("[::1]:9600".parse().unwrap()), 0xEF);
    }

    #[test]
    fn test_serve_once_timeout() {
        let mut transport = crate::UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let served = slave()
            .serve_once(&mut transport, Duration::from_millis(10))
            .unwrap();
        assert!(!served);
    }
}
