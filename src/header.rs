//! FINS header structures and node addressing.
//!
//! This module defines the 10-byte header that precedes every FINS request and
//! response, and the network/node/unit triple used to route frames.
//!
//! # FINS Header Structure
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | ICF | Information Control Field (bit 7 set on responses) |
//! | 1 | RSV | Reserved (always 0x00) |
//! | 2 | GCT | Gateway Count (0x02) |
//! | 3 | DNA | Destination Network Address |
//! | 4 | DA1 | Destination Node Address |
//! | 5 | DA2 | Destination Unit Address |
//! | 6 | SNA | Source Network Address |
//! | 7 | SA1 | Source Node Address |
//! | 8 | SA2 | Source Unit Address |
//! | 9 | SID | Service ID |
//!
//! # Example
//!
//! ```
//! use fins_core::{FinsHeader, NodeAddress};
//!
//! let source = NodeAddress::node(0x0C);
//! let destination = NodeAddress::node(0x01);
//!
//! let header = FinsHeader::new_command(destination, source, 0x23);
//! let reply = header.response();
//! assert_eq!(reply.destination(), source);
//! assert_eq!(reply.source(), destination);
//! assert_eq!(reply.sid, 0x23);
//! ```

use crate::error::{FinsError, Result};

/// FINS header size in bytes.
pub const FINS_HEADER_SIZE: usize = 10;

/// ICF value for requests.
pub const ICF_COMMAND: u8 = 0x80;

/// Bits OR-ed into the ICF of a response.
///
/// Bit 7 marks the frame as a response for this crate's peers; bit 6 is the
/// response bit standard FINS devices check.
pub const ICF_RESPONSE_FLAGS: u8 = 0xC0;

/// Gateway count used on every request.
pub const GATEWAY_COUNT: u8 = 0x02;

/// Node address for FINS communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeAddress {
    /// Network address (0 = local network).
    pub network: u8,
    /// Node address.
    pub node: u8,
    /// Unit address (0 = CPU unit).
    pub unit: u8,
}

impl NodeAddress {
    /// Creates a new node address.
    pub fn new(network: u8, node: u8, unit: u8) -> Self {
        Self {
            network,
            node,
            unit,
        }
    }

    /// Creates an address for `node` on the local network, CPU unit.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::NodeAddress;
    ///
    /// let plc = NodeAddress::node(1);
    /// assert_eq!(plc, NodeAddress::new(0, 1, 0));
    /// ```
    pub fn node(node: u8) -> Self {
        Self::new(0, node, 0)
    }
}

/// FINS command/response header (10 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinsHeader {
    /// Information Control Field.
    pub icf: u8,
    /// Reserved byte (always 0x00).
    pub rsv: u8,
    /// Gateway Count.
    pub gct: u8,
    /// Destination Network Address.
    pub dna: u8,
    /// Destination Node Address.
    pub da1: u8,
    /// Destination Unit Address.
    pub da2: u8,
    /// Source Network Address.
    pub sna: u8,
    /// Source Node Address.
    pub sa1: u8,
    /// Source Unit Address.
    pub sa2: u8,
    /// Service ID (used to match responses with requests).
    pub sid: u8,
}

impl FinsHeader {
    /// Creates a new request header.
    pub fn new_command(destination: NodeAddress, source: NodeAddress, sid: u8) -> Self {
        Self {
            icf: ICF_COMMAND,
            rsv: 0x00,
            gct: GATEWAY_COUNT,
            dna: destination.network,
            da1: destination.node,
            da2: destination.unit,
            sna: source.network,
            sa1: source.node,
            sa2: source.unit,
            sid,
        }
    }

    /// Builds the header of the response to this request.
    ///
    /// Sets the response flags, swaps destination and source so the reply
    /// routes back to the sender, and keeps the service ID.
    pub fn response(self) -> Self {
        Self {
            icf: self.icf | ICF_RESPONSE_FLAGS,
            dna: self.sna,
            da1: self.sa1,
            da2: self.sa2,
            sna: self.dna,
            sa1: self.da1,
            sa2: self.da2,
            ..self
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(self) -> [u8; FINS_HEADER_SIZE] {
        [
            self.icf, self.rsv, self.gct, self.dna, self.da1, self.da2, self.sna, self.sa1,
            self.sa2, self.sid,
        ]
    }

    /// Parses a header from the first 10 bytes of `data`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::TruncatedFrame` if the slice is shorter than 10 bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::FinsHeader;
    ///
    /// let bytes = [0xC0, 0x00, 0x02, 0x00, 0x0C, 0x00, 0x00, 0x01, 0x00, 0x23];
    /// let header = FinsHeader::from_bytes(&bytes).unwrap();
    /// assert!(header.is_response());
    /// assert_eq!(header.sid, 0x23);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < FINS_HEADER_SIZE {
            return Err(FinsError::truncated(FINS_HEADER_SIZE, data.len()));
        }

        Ok(Self {
            icf: data[0],
            rsv: data[1],
            gct: data[2],
            dna: data[3],
            da1: data[4],
            da2: data[5],
            sna: data[6],
            sa1: data[7],
            sa2: data[8],
            sid: data[9],
        })
    }

    /// Returns whether this is a response header (ICF bit 7 set on a frame
    /// whose bit 6 is also set).
    pub fn is_response(self) -> bool {
        self.icf & ICF_RESPONSE_FLAGS == ICF_RESPONSE_FLAGS
    }

    /// Returns the destination node address.
    pub fn destination(self) -> NodeAddress {
        NodeAddress::new(self.dna, self.da1, self.da2)
    }

    /// Returns the source node address.
    pub fn source(self) -> NodeAddress {
        NodeAddress::new(self.sna, self.sa1, self.sa2)
    }
}
