//! Error types for the FINS protocol.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for FINS operations.
pub type Result<T> = std::result::Result<T, FinsError>;

/// Operation a session was performing when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Memory area read of whole words.
    ReadWords,
    /// Memory area write of whole words.
    WriteWords,
    /// Single bit read.
    ReadBit,
    /// Single bit write.
    WriteBit,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ReadWords => write!(f, "read"),
            Operation::WriteWords => write!(f, "write"),
            Operation::ReadBit => write!(f, "bit read"),
            Operation::WriteBit => write!(f, "bit write"),
        }
    }
}

/// Errors that can occur during FINS encoding, decoding and communication.
#[derive(Debug, Error)]
pub enum FinsError {
    /// Address string does not match `<Area><word>[.<bit>]`.
    #[error("Invalid address '{address}'")]
    InvalidAddress {
        /// The rejected address string.
        address: String,
    },

    /// Area letter or area code is not one of the supported memory areas.
    #[error("Unknown memory area '{area}'")]
    UnknownArea {
        /// The unrecognised area letter or code.
        area: String,
    },

    /// Word or bit part of an address is outside its range.
    #[error("Address '{address}' out of range: {reason}")]
    AddressOutOfRange {
        /// The rejected address.
        address: String,
        /// Which part overflowed.
        reason: String,
    },

    /// Write payload has a length the frame cannot carry.
    #[error("Invalid payload length {length} for {} write", access_kind(*.bit_access))]
    PayloadLengthInvalid {
        /// Payload length in bytes.
        length: usize,
        /// Whether the write was bit-addressed.
        bit_access: bool,
    },

    /// A word sequence has the wrong length for the requested type.
    #[error("Word count mismatch: expected {expected}, got {actual}")]
    WordCountMismatch {
        /// Words the type or request requires.
        expected: usize,
        /// Words supplied.
        actual: usize,
    },

    /// Buffer is shorter than the frame layout requires.
    #[error("Truncated frame: expected at least {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Minimum length for this frame kind.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// Request carries a command other than memory area read/write.
    #[error("Unsupported command 0x{command:04X}")]
    UnsupportedCommand {
        /// The 2-byte command code.
        command: u16,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Response was well framed but its content is unusable.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// Underlying send/receive primitive failed.
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// No matching response within the configured window.
    #[error("Communication timeout")]
    Timeout,

    /// The wait for a response was cancelled by the caller.
    #[error("Exchange cancelled")]
    Cancelled,

    /// The remote device rejected the request with a nonzero end code.
    #[error("Remote device error: end code 0x{end_code:04X} ({})", end_code_description(*.end_code))]
    RemoteDeviceError {
        /// Raw 2-byte end code from the response.
        end_code: u16,
    },

    /// An error annotated with the session operation and address that caused it.
    #[error("{operation} {address} failed: {source}")]
    Operation {
        /// What the session was doing.
        operation: Operation,
        /// Address string the caller supplied.
        address: String,
        /// Underlying error.
        #[source]
        source: Box<FinsError>,
    },
}

impl FinsError {
    /// Creates a new `InvalidAddress` error.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::FinsError;
    ///
    /// let err = FinsError::invalid_address("Q12");
    /// assert_eq!(err.to_string(), "Invalid address 'Q12'");
    /// ```
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
        }
    }

    /// Creates a new `UnknownArea` error.
    pub fn unknown_area(area: impl Into<String>) -> Self {
        Self::UnknownArea { area: area.into() }
    }

    /// Creates a new `AddressOutOfRange` error.
    pub fn address_out_of_range(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressOutOfRange {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::FinsError;
    ///
    /// let err = FinsError::invalid_parameter("count", "must be greater than 0");
    /// ```
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `TruncatedFrame` error.
    pub fn truncated(expected: usize, actual: usize) -> Self {
        Self::TruncatedFrame { expected, actual }
    }

    /// Creates a new `WordCountMismatch` error.
    pub fn word_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::WordCountMismatch { expected, actual }
    }

    /// Wraps this error with the operation and address it belongs to.
    ///
    /// Errors that already carry context are returned unchanged.
    pub fn context(self, operation: Operation, address: impl Into<String>) -> Self {
        match self {
            err @ Self::Operation { .. } => err,
            err => Self::Operation {
                operation,
                address: address.into(),
                source: Box::new(err),
            },
        }
    }

    /// Returns the underlying error, looking through any `Operation` context.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::{FinsError, Operation};
    ///
    /// let err = FinsError::Timeout.context(Operation::ReadWords, "D100");
    /// assert!(matches!(err.root(), FinsError::Timeout));
    /// ```
    pub fn root(&self) -> &FinsError {
        match self {
            Self::Operation { source, .. } => source.root(),
            err => err,
        }
    }

    /// Returns the remote end code if this is (or wraps) a `RemoteDeviceError`.
    pub fn end_code(&self) -> Option<u16> {
        match self.root() {
            Self::RemoteDeviceError { end_code } => Some(*end_code),
            _ => None,
        }
    }

    /// Returns the main response code (high byte) of a remote end code.
    pub fn main_code(&self) -> Option<u8> {
        self.end_code().map(|code| (code >> 8) as u8)
    }

    /// Returns the sub response code (low byte) of a remote end code.
    pub fn sub_code(&self) -> Option<u8> {
        self.end_code().map(|code| (code & 0xFF) as u8)
    }
}

fn access_kind(bit_access: bool) -> &'static str {
    if bit_access {
        "bit"
    } else {
        "word"
    }
}

/// Returns a short description of a FINS end code.
///
/// The network relay bits (0x80 of the main code, 0x40/0x80 of the sub code)
/// are masked off before lookup.
///
/// # Example
///
/// ```
/// use fins_core::end_code_description;
///
/// assert_eq!(end_code_description(0x0000), "Normal completion");
/// assert_eq!(end_code_description(0x0401), "Undefined command");
/// ```
pub fn end_code_description(end_code: u16) -> &'static str {
    match end_code & 0x7F3F {
        0x0000 => "Normal completion",
        0x0001 => "Service canceled",
        0x0101 => "Local node not in network",
        0x0102 => "Token timeout",
        0x0103 => "Retries failed",
        0x0201 => "Destination node not in network",
        0x0205 => "Response timeout",
        0x0401 => "Undefined command",
        0x0402 => "Not supported by model/version",
        0x1001 => "Command too long",
        0x1002 => "Command too short",
        0x1003 => "Elements/data don't match",
        0x1101 => "No area designated",
        0x1103 => "Address range designation error",
        0x1104 => "Address range exceeded",
        0x2101 => "Area read-only",
        0x2102 => "Area protected",
        _ => "Device-specific error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_device_error_display() {
        let err = FinsError::RemoteDeviceError { end_code: 0x0401 };
        assert_eq!(
            err.to_string(),
            "Remote device error: end code 0x0401 (Undefined command)"
        );
        assert_eq!(err.main_code(), Some(0x04));
        assert_eq!(err.sub_code(), Some(0x01));
    }

    #[test]
    fn test_payload_length_display() {
        let err = FinsError::PayloadLengthInvalid {
            length: 3,
            bit_access: false,
        };
        assert_eq!(err.to_string(), "Invalid payload length 3 for word write");
    }

    #[test]
    fn test_timeout_display() {
        let err = FinsError::Timeout;
        assert_eq!(err.to_string(), "Communication timeout");
    }

    #[test]
    fn test_context_wraps_once() {
        let err = FinsError::RemoteDeviceError { end_code: 0x1103 }
            .context(Operation::WriteWords, "D200")
            .context(Operation::ReadWords, "D999");

        assert_eq!(
            err.to_string(),
            "write D200 failed: Remote device error: end code 0x1103 (Address range designation error)"
        );
        assert_eq!(err.end_code(), Some(0x1103));
    }

    #[test]
    fn test_root_of_plain_error() {
        let err = FinsError::truncated(14, 3);
        assert!(matches!(
            err.root(),
            FinsError::TruncatedFrame {
                expected: 14,
                actual: 3
            }
        ));
        assert_eq!(err.end_code(), None);
    }

    #[test]
    fn test_end_code_description_masks_relay_bits() {
        assert_eq!(end_code_description(0x8401), "Undefined command");
        assert_eq!(end_code_description(0x0040), "Normal completion");
        assert_eq!(end_code_description(0x3333), "Device-specific error");
    }
}
