//! Response side of the frame codec.
//!
//! # Response Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 10 bytes | request header with response flags set and addresses swapped |
//! | Command | 2 bytes | echo of the request command |
//! | End code | 2 bytes | 0x0000 = success |
//! | Data | Variable | read data (empty for writes and errors) |
//!
//! # Example
//!
//! ```
//! use fins_core::{build_read, build_response, parse_response, Address, NodeAddress};
//!
//! let request = build_read(NodeAddress::node(1), NodeAddress::node(0x0C), 0x23, "D100".parse().unwrap(), 2);
//! let bytes = build_response(&request, 0x0000, &[0x12, 0x34, 0x56, 0x78]).unwrap();
//!
//! let response = parse_response(&bytes).unwrap();
//! assert!(response.is_success());
//! assert_eq!(response.to_words().unwrap(), vec![0x1234, 0x5678]);
//! ```

use crate::command::MIN_REQUEST_SIZE;
use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, FINS_HEADER_SIZE};

/// Minimum response size: header (10) + command (2) + end code (2) = 14 bytes.
pub const MIN_RESPONSE_SIZE: usize = FINS_HEADER_SIZE + 4;

/// End code for normal completion.
pub const END_CODE_SUCCESS: u16 = 0x0000;
/// End code for an undefined or unsupported command.
pub const END_CODE_UNSUPPORTED_COMMAND: u16 = 0x0401;
/// End code for a request whose body is shorter than its command requires.
pub const END_CODE_COMMAND_TOO_SHORT: u16 = 0x1002;
/// End code for a request naming no known memory area.
pub const END_CODE_NO_AREA: u16 = 0x1101;
/// End code for a bit offset outside 0-15.
pub const END_CODE_ADDRESS_RANGE: u16 = 0x1103;
/// End code for a count above the per-command limit.
pub const END_CODE_RANGE_EXCEEDED: u16 = 0x1104;

/// Builds the response frame for a raw request.
///
/// Copies the request header with the response flags set and source and
/// destination swapped, echoes the command code and service ID, then appends
/// the end code and `data`.
///
/// # Errors
///
/// Returns `FinsError::TruncatedFrame` if `request` is shorter than its header
/// plus command code.
pub fn build_response(request: &[u8], end_code: u16, data: &[u8]) -> Result<Vec<u8>> {
    if request.len() < MIN_REQUEST_SIZE {
        return Err(FinsError::truncated(MIN_REQUEST_SIZE, request.len()));
    }
    let header = FinsHeader::from_bytes(request)?.response();

    let mut bytes = Vec::with_capacity(MIN_RESPONSE_SIZE + data.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&request[FINS_HEADER_SIZE..MIN_REQUEST_SIZE]);
    bytes.extend_from_slice(&end_code.to_be_bytes());
    bytes.extend_from_slice(data);
    Ok(bytes)
}

/// Parses a raw response frame.
///
/// # Errors
///
/// Returns `FinsError::TruncatedFrame` if the buffer is shorter than 14 bytes.
pub fn parse_response(frame: &[u8]) -> Result<FinsResponse> {
    FinsResponse::from_bytes(frame)
}

/// Parsed FINS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinsResponse {
    /// Response header.
    pub header: FinsHeader,
    /// Echoed command code.
    pub command: u16,
    /// End code (0x0000 = success).
    pub end_code: u16,
    /// Response data (if any).
    pub data: Vec<u8>,
}

impl FinsResponse {
    /// Parses a FINS response from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::TruncatedFrame` if the response is too short.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_RESPONSE_SIZE {
            return Err(FinsError::truncated(MIN_RESPONSE_SIZE, data.len()));
        }

        Ok(Self {
            header: FinsHeader::from_bytes(data)?,
            command: u16::from_be_bytes([data[10], data[11]]),
            end_code: u16::from_be_bytes([data[12], data[13]]),
            data: data[MIN_RESPONSE_SIZE..].to_vec(),
        })
    }

    /// Returns whether the end code is 0x0000.
    pub fn is_success(&self) -> bool {
        self.end_code == END_CODE_SUCCESS
    }

    /// Returns an error if the device reported a nonzero end code.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::RemoteDeviceError` carrying the raw end code.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::FinsResponse;
    ///
    /// let bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x0C, 0x00, 0x00, 0x01, 0x00, 0x01,
    ///     0x01, 0x01, 0x11, 0x03,
    /// ];
    /// let response = FinsResponse::from_bytes(&bytes).unwrap();
    /// assert_eq!(response.check_end_code().unwrap_err().end_code(), Some(0x1103));
    /// ```
    pub fn check_end_code(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(FinsError::RemoteDeviceError {
                end_code: self.end_code,
            })
        }
    }

    /// Converts response data to words (big-endian u16 values).
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidResponse` if the data length is odd.
    pub fn to_words(&self) -> Result<Vec<u16>> {
        if self.data.len() % 2 != 0 {
            return Err(FinsError::invalid_response(
                "data length must be even for word conversion",
            ));
        }

        Ok(self
            .data
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect())
    }

    /// Converts response data to bit values, one byte per bit.
    pub fn to_bits(&self) -> Vec<bool> {
        self.data.iter().map(|&b| b != 0).collect()
    }

    /// Converts response data to a single bit value.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidResponse` if there is no data.
    pub fn to_bit(&self) -> Result<bool> {
        self.data
            .first()
            .map(|&b| b != 0)
            .ok_or_else(|| FinsError::invalid_response("no data for bit conversion"))
    }
}
