//! Request side of the frame codec.
//!
//! Builds memory area read (`0x0101`) and write (`0x0102`) request frames and
//! parses raw request buffers back into their fields.
//!
//! # Request Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 10 | [`FinsHeader`] |
//! | 10 | 2 | Command code |
//! | 12 | 1 | Area code |
//! | 13 | 2 | Word offset (big-endian) |
//! | 15 | 1 | Bit offset |
//! | 16 | 2 | Count (bits when the bit offset is nonzero, else words) |
//! | 18 | n | Write payload |
//!
//! # Example
//!
//! ```
//! use fins_core::{build_read, parse_request, Address, NodeAddress};
//!
//! let addr: Address = "D200.1".parse().unwrap();
//! let frame = build_read(NodeAddress::node(1), NodeAddress::node(0x0C), 0x23, addr, 1);
//! assert_eq!(frame.len(), 18);
//! assert_eq!(&frame[13..15], &[0x00, 0xC8]);
//! assert_eq!(frame[15], 0x01);
//!
//! let request = parse_request(&frame).unwrap();
//! assert_eq!(request.address, addr);
//! assert_eq!(request.count, 1);
//! ```

use crate::address::{Address, MAX_BIT};
use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, NodeAddress, FINS_HEADER_SIZE};
use crate::memory::MemoryArea;

/// Memory Area Read command code.
pub const CMD_MEMORY_READ: u16 = 0x0101;
/// Memory Area Write command code.
pub const CMD_MEMORY_WRITE: u16 = 0x0102;

/// Header plus command code.
pub const MIN_REQUEST_SIZE: usize = FINS_HEADER_SIZE + 2;
/// Header, command, area, address, bit and count.
pub const MEMORY_REQUEST_SIZE: usize = MIN_REQUEST_SIZE + 6;

/// Maximum number of words that can be read/written in a single command.
pub const MAX_WORDS_PER_COMMAND: u16 = 999;

/// Memory area commands understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCommand {
    /// Memory Area Read (`0x0101`).
    Read,
    /// Memory Area Write (`0x0102`).
    Write,
}

impl MemoryCommand {
    /// Returns the 2-byte command code.
    pub fn code(self) -> u16 {
        match self {
            MemoryCommand::Read => CMD_MEMORY_READ,
            MemoryCommand::Write => CMD_MEMORY_WRITE,
        }
    }

    /// Looks up a command by code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            CMD_MEMORY_READ => Some(MemoryCommand::Read),
            CMD_MEMORY_WRITE => Some(MemoryCommand::Write),
            _ => None,
        }
    }
}

/// Command for reading words or bits from device memory.
#[derive(Debug, Clone)]
pub struct MemoryReadCommand {
    header: FinsHeader,
    address: Address,
    count: u16,
}

impl MemoryReadCommand {
    /// Creates a new read command.
    ///
    /// `count` is in bits when `address` has a nonzero bit offset, else in words.
    pub fn new(
        destination: NodeAddress,
        source: NodeAddress,
        sid: u8,
        address: Address,
        count: u16,
    ) -> Self {
        Self {
            header: FinsHeader::new_command(destination, source, sid),
            address,
            count,
        }
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MEMORY_REQUEST_SIZE);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&CMD_MEMORY_READ.to_be_bytes());
        bytes.extend_from_slice(&self.address.to_bytes());
        bytes.extend_from_slice(&self.count.to_be_bytes());
        bytes
    }
}

/// Command for writing words or a single bit to device memory.
#[derive(Debug, Clone)]
pub struct MemoryWriteCommand {
    header: FinsHeader,
    address: Address,
    count: u16,
    payload: Vec<u8>,
}

impl MemoryWriteCommand {
    /// Creates a new write command.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::PayloadLengthInvalid` if a bit write does not carry
    /// exactly one byte, or a word write carries an empty or odd-length payload
    /// or more words than the 16-bit count field can express.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::{Address, MemoryArea, MemoryWriteCommand, NodeAddress};
    ///
    /// let cmd = MemoryWriteCommand::new(
    ///     NodeAddress::node(1),
    ///     NodeAddress::node(0x0C),
    ///     0x01,
    ///     Address::word(MemoryArea::DM, 100),
    ///     &[0x12, 0x34, 0x56, 0x78],
    /// ).unwrap();
    /// assert_eq!(cmd.to_bytes().len(), 22);
    /// ```
    pub fn new(
        destination: NodeAddress,
        source: NodeAddress,
        sid: u8,
        address: Address,
        payload: &[u8],
    ) -> Result<Self> {
        let invalid = || FinsError::PayloadLengthInvalid {
            length: payload.len(),
            bit_access: address.is_bit(),
        };
        let count = if address.is_bit() {
            if payload.len() != 1 {
                return Err(invalid());
            }
            1
        } else {
            if payload.is_empty() || payload.len() % 2 != 0 {
                return Err(invalid());
            }
            u16::try_from(payload.len() / 2).map_err(|_| invalid())?
        };

        Ok(Self {
            header: FinsHeader::new_command(destination, source, sid),
            address,
            count,
            payload: payload.to_vec(),
        })
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Returns the count field: one bit for bit writes, else payload words.
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MEMORY_REQUEST_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&CMD_MEMORY_WRITE.to_be_bytes());
        bytes.extend_from_slice(&self.address.to_bytes());
        bytes.extend_from_slice(&self.count().to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Builds a memory area read request frame.
pub fn build_read(
    destination: NodeAddress,
    source: NodeAddress,
    sid: u8,
    address: Address,
    count: u16,
) -> Vec<u8> {
    MemoryReadCommand::new(destination, source, sid, address, count).to_bytes()
}

/// Builds a memory area write request frame.
///
/// # Errors
///
/// See [`MemoryWriteCommand::new`].
pub fn build_write(
    destination: NodeAddress,
    source: NodeAddress,
    sid: u8,
    address: Address,
    payload: &[u8],
) -> Result<Vec<u8>> {
    Ok(MemoryWriteCommand::new(destination, source, sid, address, payload)?.to_bytes())
}

/// A decoded memory area request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinsRequest {
    /// Request header.
    pub header: FinsHeader,
    /// Read or write.
    pub command: MemoryCommand,
    /// Target address.
    pub address: Address,
    /// Count field as sent.
    pub count: u16,
    /// Write payload (empty for reads).
    pub payload: Vec<u8>,
}

/// Returns the command code of a raw request, if it is long enough to carry one.
pub fn command_code(frame: &[u8]) -> Option<u16> {
    frame
        .get(FINS_HEADER_SIZE..MIN_REQUEST_SIZE)
        .map(|code| u16::from_be_bytes([code[0], code[1]]))
}

/// Parses a raw memory area request.
///
/// # Errors
///
/// - `TruncatedFrame` if the buffer is shorter than the header and command, or
///   shorter than the memory area body
/// - `UnsupportedCommand` if the command is neither read nor write
/// - `UnknownArea` if the area code is not a supported area
/// - `AddressOutOfRange` if the bit offset exceeds 15
pub fn parse_request(frame: &[u8]) -> Result<FinsRequest> {
    let header = FinsHeader::from_bytes(frame)?;
    let code = command_code(frame).ok_or_else(|| FinsError::truncated(MIN_REQUEST_SIZE, frame.len()))?;
    let command =
        MemoryCommand::from_code(code).ok_or(FinsError::UnsupportedCommand { command: code })?;

    if frame.len() < MEMORY_REQUEST_SIZE {
        return Err(FinsError::truncated(MEMORY_REQUEST_SIZE, frame.len()));
    }

    let area_code = frame[12];
    let area = MemoryArea::from_code(area_code)
        .ok_or_else(|| FinsError::unknown_area(format!("0x{area_code:02X}")))?;
    let word = u16::from_be_bytes([frame[13], frame[14]]);
    let bit = frame[15];
    if bit > MAX_BIT {
        return Err(FinsError::address_out_of_range(
            format!("{}{}.{}", area.letter(), word, bit),
            "bit must be 0-15",
        ));
    }
    let count = u16::from_be_bytes([frame[16], frame[17]]);
    let payload = match command {
        MemoryCommand::Read => Vec::new(),
        MemoryCommand::Write => frame[MEMORY_REQUEST_SIZE..].to_vec(),
    };

    Ok(FinsRequest {
        header,
        command,
        address: Address { area, word, bit },
        count,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> NodeAddress {
        NodeAddress::node(1)
    }

    fn src() -> NodeAddress {
        NodeAddress::node(0x0C)
    }

    #[test]
    fn test_build_read_bytes() {
        let addr = Address::parse("D200.1").unwrap();
        let frame = build_read(dest(), src(), 0x23, addr, 1);

        assert_eq!(
            hex::encode(&frame),
            "800002000100000c0023010182 00c8 01 0001".replace(' ', "")
        );
    }

    #[test]
    fn test_build_read_word_count() {
        let frame = build_read(dest(), src(), 0x01, Address::word(MemoryArea::HR, 10), 10);
        assert_eq!(&frame[10..12], &[0x01, 0x01]);
        assert_eq!(frame[12], 0xB1);
        assert_eq!(&frame[16..18], &[0x00, 0x0A]);
    }

    #[test]
    fn test_build_write_words() {
        let frame = build_write(
            dest(),
            src(),
            0x02,
            Address::word(MemoryArea::DM, 100),
            &[0x12, 0x34, 0x56, 0x78],
        )
        .unwrap();

        assert_eq!(&frame[10..12], &[0x01, 0x02]);
        assert_eq!(&frame[12..16], &[0x82, 0x00, 0x64, 0x00]);
        assert_eq!(&frame[16..18], &[0x00, 0x02]);
        assert_eq!(&frame[18..], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_build_write_bit() {
        let addr = Address::parse("C10.3").unwrap();
        let frame = build_write(dest(), src(), 0x02, addr, &[0x01]).unwrap();

        assert_eq!(frame.len(), 19);
        assert_eq!(&frame[16..18], &[0x00, 0x01]);
        assert_eq!(frame[18], 0x01);
    }

    #[test]
    fn test_build_write_payload_length_invalid() {
        let word = Address::word(MemoryArea::DM, 0);
        let bit = Address::parse("D0.4").unwrap();

        for (addr, payload) in [
            (word, &[0x01u8, 0x02, 0x03][..]),
            (word, &[][..]),
            (bit, &[0x01, 0x00][..]),
            (bit, &[][..]),
        ] {
            let err = build_write(dest(), src(), 0, addr, payload).unwrap_err();
            assert!(matches!(err, FinsError::PayloadLengthInvalid { .. }));
        }
    }

    #[test]
    fn test_build_write_count_field_limit() {
        let word = Address::word(MemoryArea::DM, 0);

        let largest = vec![0u8; 2 * usize::from(u16::MAX)];
        let frame = build_write(dest(), src(), 0, word, &largest).unwrap();
        assert_eq!(&frame[16..18], &[0xFF, 0xFF]);

        let too_large = vec![0u8; 2 * (usize::from(u16::MAX) + 1)];
        assert!(matches!(
            build_write(dest(), src(), 0, word, &too_large),
            Err(FinsError::PayloadLengthInvalid {
                length: 131072,
                bit_access: false
            })
        ));
    }

    #[test]
    fn test_parse_request_read_symmetry() {
        let addr = Address::parse("W321.9").unwrap();
        let frame = build_read(dest(), src(), 0x44, addr, 3);
        let request = parse_request(&frame).unwrap();

        assert_eq!(request.command, MemoryCommand::Read);
        assert_eq!(request.address, addr);
        assert_eq!(request.count, 3);
        assert_eq!(request.header.sid, 0x44);
        assert!(request.payload.is_empty());
    }

    #[test]
    fn test_parse_request_write() {
        let addr = Address::word(MemoryArea::AR, 5);
        let frame = build_write(dest(), src(), 0x10, addr, &[0xAB, 0xCD]).unwrap();
        let request = parse_request(&frame).unwrap();

        assert_eq!(request.command, MemoryCommand::Write);
        assert_eq!(request.count, 1);
        assert_eq!(request.payload, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_parse_request_truncated() {
        let frame = build_read(dest(), src(), 0x01, Address::word(MemoryArea::DM, 0), 1);

        assert!(matches!(
            parse_request(&frame[..9]),
            Err(FinsError::TruncatedFrame { expected: 10, .. })
        ));
        assert!(matches!(
            parse_request(&frame[..11]),
            Err(FinsError::TruncatedFrame { expected: 12, .. })
        ));
        assert!(matches!(
            parse_request(&frame[..17]),
            Err(FinsError::TruncatedFrame { expected: 18, .. })
        ));
    }

    #[test]
    fn test_parse_request_unsupported_command() {
        let mut frame = build_read(dest(), src(), 0x01, Address::word(MemoryArea::DM, 0), 1);
        frame[11] = 0x03;

        assert!(matches!(
            parse_request(&frame),
            Err(FinsError::UnsupportedCommand { command: 0x0103 })
        ));
    }

    #[test]
    fn test_parse_request_unknown_area() {
        let mut frame = build_read(dest(), src(), 0x01, Address::word(MemoryArea::DM, 0), 1);
        frame[12] = 0xB2;

        match parse_request(&frame) {
            Err(FinsError::UnknownArea { area }) => assert_eq!(area, "0xB2"),
            other => panic!("Expected UnknownArea, got {other:?}"),
        }
    }
}
