//! # FINS Core
//!
//! A Rust library for the Omron FINS (Factory Interface Network Service)
//! memory-access protocol: frame encoding and decoding, address parsing,
//! typed value marshalling, a client session with request/response
//! correlation, and a reference slave that emulates device memory.
//!
//! Each session call produces exactly one request and one response (two for
//! a bit write at offset `.0`). No automatic retries, caching, or reconnection.
//!
//! ## Features
//!
//! - **Pure codec**: request and response frames built and parsed from explicit fields
//! - **Typed values**: 16/32/64-bit integers, `f32`/`f64`, strings and bits
//! - **Configurable word order**: low-word-first (default) or high-word-first
//! - **Two transports**: FINS/UDP and FINS/TCP behind one [`Transport`] trait
//! - **Reference slave**: answers read/write requests from a [`MemoryStore`]
//! - **Observable**: frame-sent / frame-received events via [`FrameObserver`]
//! - **No panics**: all errors returned as `Result<T, FinsError>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use fins_core::{Session, SessionConfig};
//!
//! fn main() -> fins_core::Result<()> {
//!     // destination node 1, source node 0x0C
//!     let config = SessionConfig::new(0x01, 0x0C);
//!     let session = Session::udp("192.168.1.250:9600".parse().unwrap(), config)?;
//!
//!     // Read 10 words from DM100
//!     let data = session.read_words("D100", 10)?;
//!     println!("DM100-109: {:?}", data);
//!
//!     // Write values to DM200
//!     session.write_words("D200", &[0x1234, 0x5678])?;
//!
//!     // Read and write a single bit of CIO 0
//!     let bit = session.read_bit("C0.5")?;
//!     session.write_bit("C0.5", !bit)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Addresses
//!
//! Addresses are written `<Area><word>[.<bit>]`, case-insensitive:
//!
//! | Letter | Area | Code |
//! |:------:|------|:----:|
//! | `D` | [`MemoryArea::DM`] Data Memory | 0x82 |
//! | `C` | [`MemoryArea::CIO`] Core I/O | 0x30 |
//! | `W` | [`MemoryArea::WR`] Work | 0x31 |
//! | `H` | [`MemoryArea::HR`] Holding | 0xB1 |
//! | `A` | [`MemoryArea::AR`] Auxiliary | 0xB0 |
//!
//! ```
//! use fins_core::{Address, MemoryArea};
//!
//! let addr: Address = "D200.1".parse().unwrap();
//! assert_eq!(addr.area, MemoryArea::DM);
//! assert_eq!(addr.word, 200);
//! assert_eq!(addr.bit, 1);
//! ```
//!
//! ## Typed Values
//!
//! ```no_run
//! # use fins_core::{Session, SessionConfig};
//! # let session = Session::udp("192.168.1.250:9600".parse().unwrap(), SessionConfig::default()).unwrap();
//! // f32 (REAL) - 2 words
//! let temp: f32 = session.read_value("D100")?;
//! session.write_value("D100", 3.14159f32)?;
//!
//! // f64 (LREAL) - 4 words
//! session.write_value("D110", 3.141592653589793f64)?;
//!
//! // i32 (DINT) - 2 words, arrays of values
//! session.write_values("D120", &[-123456i32, 42])?;
//! let pair: Vec<i32> = session.read_values("D120", 2)?;
//!
//! // String (ASCII) - 2 chars per word
//! session.write_string("D200", "PRODUCT-001")?;
//! let code = session.read_string("D200", 6)?;
//! # Ok::<(), fins_core::FinsError>(())
//! ```
//!
//! ## Reference Slave
//!
//! ```no_run
//! use fins_core::{CancelToken, DenseMemory, Slave, UdpTransport};
//!
//! let mut transport = UdpTransport::bind("0.0.0.0:9600".parse().unwrap())?;
//! let mut slave = Slave::new(DenseMemory::with_pattern(5000, |_, i| i as u16));
//! slave.run(&mut transport, &CancelToken::new())?;
//! # Ok::<(), fins_core::FinsError>(())
//! ```
//!
//! ## Error Handling
//!
//! Session errors carry the attempted operation and address; [`FinsError::root`]
//! returns the underlying kind.
//!
//! ```no_run
//! use fins_core::{FinsError, Session, SessionConfig};
//!
//! let session = Session::udp("192.168.1.250:9600".parse().unwrap(), SessionConfig::default())?;
//!
//! match session.read_words("D100", 10) {
//!     Ok(data) => println!("Data: {:?}", data),
//!     Err(e) => match e.root() {
//!         FinsError::Timeout => println!("Communication timeout"),
//!         FinsError::RemoteDeviceError { end_code } => {
//!             println!("PLC error 0x{:04X}: {}", end_code, e);
//!         }
//!         _ => println!("Error: {}", e),
//!     },
//! }
//! # Ok::<(), FinsError>(())
//! ```
//!
//! ## Logging
//!
//! The library logs through [`tracing`]; install a subscriber in the
//! application to see exchanges, discarded frames and slave dispatch.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod address;
mod cancel;
mod command;
mod error;
pub mod event;
mod header;
mod marshal;
mod memory;
mod response;
mod session;
mod slave;
mod store;
pub mod tcp;
mod transport;
pub mod utils;

// Public re-exports
pub use address::{Address, MAX_BIT};
pub use cancel::CancelToken;
pub use command::{
    build_read, build_write, command_code, parse_request, FinsRequest, MemoryCommand,
    MemoryReadCommand, MemoryWriteCommand, CMD_MEMORY_READ, CMD_MEMORY_WRITE,
    MAX_WORDS_PER_COMMAND, MEMORY_REQUEST_SIZE, MIN_REQUEST_SIZE,
};
pub use error::{end_code_description, FinsError, Operation, Result};
pub use event::{FrameDirection, FrameEvent, FrameObserver};
pub use header::{FinsHeader, NodeAddress, FINS_HEADER_SIZE};
pub use marshal::{
    string_to_words, string_to_words_fixed, words_to_string, Marshaller, StringEncoding,
    WordOrder, WordValue,
};
pub use memory::MemoryArea;
pub use response::{
    build_response, parse_response, FinsResponse, END_CODE_ADDRESS_RANGE,
    END_CODE_COMMAND_TOO_SHORT, END_CODE_NO_AREA, END_CODE_RANGE_EXCEEDED, END_CODE_SUCCESS,
    END_CODE_UNSUPPORTED_COMMAND, MIN_RESPONSE_SIZE,
};
pub use session::{Session, SessionConfig, SessionState};
pub use slave::{Slave, DEFAULT_SLAVE_NODE, POLL_INTERVAL};
pub use store::{DenseMemory, MemoryStore, SharedMemory, SparseMemory};
pub use tcp::TcpTransport;
pub use transport::{
    ConnectedTransport, Transport, UdpTransport, DEFAULT_FINS_PORT, DEFAULT_TIMEOUT,
    MAX_PACKET_SIZE,
};
