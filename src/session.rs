//! Client session: one request/response exchange at a time over a transport.
//!
//! A [`Session`] builds request frames from address strings, sends them to
//! its peer, waits for the response with the matching service ID, checks the
//! end code and decodes the data with its [`Marshaller`].
//!
//! # Exchange
//!
//! 1. Observers see the request (`FrameDirection::Sent`).
//! 2. The frame is sent to the peer.
//! 3. Frames are received until one matches or the timeout expires. A frame
//!    matches when it comes from the peer, carries the request's service ID
//!    and echoes its command code; the ICF response bits are not checked, so
//!    peers that only set bit 7 are understood. Anything else is discarded.
//! 4. A nonzero end code fails with `RemoteDeviceError`.
//! 5. Observers see the response (`FrameDirection::Received`).
//!
//! Nothing is retried.
//!
//! # Concurrency
//!
//! Exchanges on one session are serialized: a second caller blocks until the
//! first exchange has finished, so requests and responses never interleave.
//!
//! # Example
//!
//! ```no_run
//! use fins_core::{Session, SessionConfig};
//!
//! let config = SessionConfig::new(0x01, 0x0C);
//! let session = Session::udp("192.168.1.250:9600".parse().unwrap(), config)?;
//!
//! let words = session.read_words("D100", 10)?;
//! session.write_value("D200", 123456i32)?;
//! let temperature: f32 = session.read_value("D300")?;
//! let running = session.read_bit("C0.05")?;
//! session.write_string("D400", "PRODUCT-001")?;
//! # Ok::<(), fins_core::FinsError>(())
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::address::Address;
use crate::cancel::CancelToken;
use crate::command::{build_read, build_write, command_code, MAX_WORDS_PER_COMMAND, MIN_REQUEST_SIZE};
use crate::error::{FinsError, Operation, Result};
use crate::event::{FrameDirection, FrameEvent, FrameObserver};
use crate::header::{FinsHeader, NodeAddress};
use crate::marshal::{Marshaller, StringEncoding, WordOrder, WordValue};
use crate::response::FinsResponse;
use crate::tcp::TcpTransport;
use crate::transport::{ConnectedTransport, Transport, UdpTransport, DEFAULT_TIMEOUT};
use crate::utils::{get_bit, set_bit};

/// Longest single receive wait, so cancellation is noticed promptly.
const RECEIVE_SLICE: Duration = Duration::from_millis(50);

/// Configuration for a client session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Destination node address (the device).
    pub destination: NodeAddress,
    /// Source node address (this client).
    pub source: NodeAddress,
    /// Service ID of the first request; later requests take the following IDs.
    pub service_id: u8,
    /// Word order of multi-word values.
    pub word_order: WordOrder,
    /// Encoding of string values.
    pub string_encoding: StringEncoding,
    /// How long to wait for a matching response.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            destination: NodeAddress::node(0x01),
            source: NodeAddress::node(0x0C),
            service_id: 0x23,
            word_order: WordOrder::default(),
            string_encoding: StringEncoding::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for the given destination and source nodes on
    /// the local network.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::{SessionConfig, WordOrder};
    ///
    /// let config = SessionConfig::new(0x01, 0x0C);
    /// assert_eq!(config.service_id, 0x23);
    /// assert_eq!(config.word_order, WordOrder::LowWordFirst);
    /// ```
    pub fn new(dest_node: u8, src_node: u8) -> Self {
        Self {
            destination: NodeAddress::node(dest_node),
            source: NodeAddress::node(src_node),
            ..Self::default()
        }
    }

    /// Sets the destination node address.
    pub fn with_destination(mut self, destination: NodeAddress) -> Self {
        self.destination = destination;
        self
    }

    /// Sets the source node address.
    pub fn with_source(mut self, source: NodeAddress) -> Self {
        self.source = source;
        self
    }

    /// Sets the source network.
    pub fn with_source_network(mut self, network: u8) -> Self {
        self.source.network = network;
        self
    }

    /// Sets the destination network.
    pub fn with_dest_network(mut self, network: u8) -> Self {
        self.destination.network = network;
        self
    }

    /// Sets the first service ID.
    pub fn with_service_id(mut self, service_id: u8) -> Self {
        self.service_id = service_id;
        self
    }

    /// Sets the word order of multi-word values.
    pub fn with_word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    /// Selects high-word-first (`true`) or low-word-first (`false`) order.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::{SessionConfig, WordOrder};
    ///
    /// let config = SessionConfig::default().with_high_word_first(true);
    /// assert_eq!(config.word_order, WordOrder::HighWordFirst);
    /// ```
    pub fn with_high_word_first(mut self, high_word_first: bool) -> Self {
        self.word_order = WordOrder::from_high_word_first(high_word_first);
        self
    }

    /// Sets the string encoding.
    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }

    /// Sets the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the marshaller this configuration describes.
    pub fn marshaller(&self) -> Marshaller {
        Marshaller::new(self.word_order, self.string_encoding)
    }
}

/// Where a session is in its exchange cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No exchange in flight.
    Idle,
    /// Request sent, waiting for its response.
    AwaitingResponse,
    /// The last exchange failed; the next one starts from `Idle`.
    Failed,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::AwaitingResponse,
            2 => SessionState::Failed,
            _ => SessionState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::AwaitingResponse => 1,
            SessionState::Failed => 2,
        }
    }
}

/// FINS client session over a transport.
pub struct Session<T> {
    config: SessionConfig,
    marshaller: Marshaller,
    peer: SocketAddr,
    endpoint: String,
    transport: Mutex<T>,
    observers: Vec<Box<dyn FrameObserver>>,
    state: AtomicU8,
    next_sid: AtomicU8,
}

impl Session<UdpTransport> {
    /// Opens a UDP session to `peer` from an ephemeral local port.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Transport` if no socket can be bound.
    pub fn udp(peer: SocketAddr, config: SessionConfig) -> Result<Self> {
        Ok(Self::new(UdpTransport::ephemeral()?, peer, config))
    }
}

impl Session<TcpTransport> {
    /// Connects a FINS/TCP session to `peer`.
    ///
    /// The node numbers agreed in the handshake replace the source and
    /// destination nodes of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    pub fn tcp(peer: SocketAddr, mut config: SessionConfig) -> Result<Self> {
        let mut transport =
            TcpTransport::new(peer, config.source.node).with_connect_timeout(config.timeout);
        transport.connect()?;
        config.source.node = transport.client_node();
        config.destination.node = transport.server_node();
        Ok(Self::new(transport, peer, config))
    }
}

impl<T: ConnectedTransport> Session<T> {
    /// Opens the transport connection.
    ///
    /// # Errors
    ///
    /// Returns the transport's connect error.
    pub fn connect(&self) -> Result<()> {
        self.lock_transport().connect()
    }

    /// Closes the transport connection.
    pub fn disconnect(&self) {
        self.lock_transport().disconnect();
    }

    /// Returns whether the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.lock_transport().is_connected()
    }
}

impl<T: Transport> Session<T> {
    /// Creates a session that exchanges frames with `peer` over `transport`.
    pub fn new(transport: T, peer: SocketAddr, config: SessionConfig) -> Self {
        Self {
            marshaller: config.marshaller(),
            next_sid: AtomicU8::new(config.service_id),
            config,
            peer,
            endpoint: peer.to_string(),
            transport: Mutex::new(transport),
            observers: Vec::new(),
            state: AtomicU8::new(SessionState::Idle.as_u8()),
        }
    }

    /// Adds an observer of sent and received frames.
    ///
    /// # Example
    ///
    /// ```
    /// use fins_core::event::{FrameEvent, TracingObserver};
    /// use fins_core::{Session, SessionConfig, UdpTransport};
    ///
    /// let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    /// let session = Session::new(transport, "127.0.0.1:9600".parse().unwrap(), SessionConfig::default())
    ///     .with_observer(TracingObserver)
    ///     .with_observer(|event: &FrameEvent| println!("{event}"));
    /// ```
    pub fn with_observer<O: FrameObserver + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the peer address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the marshaller used for typed values.
    pub fn marshaller(&self) -> Marshaller {
        self.marshaller
    }

    /// Returns the current exchange state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Locks the transport for direct access.
    ///
    /// Blocks while an exchange is in flight.
    pub fn lock_transport(&self) -> MutexGuard<'_, T> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consumes the session, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the service ID for the next request.
    fn next_sid(&self) -> u8 {
        self.next_sid.fetch_add(1, Ordering::Relaxed)
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn notify(&self, direction: FrameDirection, frame: &[u8]) {
        if self.observers.is_empty() {
            return;
        }
        let event = FrameEvent::new(direction, self.endpoint.as_str(), frame);
        for observer in &self.observers {
            observer.on_frame(&event);
        }
    }

    /// Sends `request` and waits for its response.
    ///
    /// # Errors
    ///
    /// - `TruncatedFrame` if `request` has no header and command code, or the
    ///   response is malformed
    /// - `Transport` if sending or receiving fails
    /// - `Timeout` if no matching response arrives in time
    /// - `RemoteDeviceError` if the response carries a nonzero end code
    pub fn exchange(&self, request: &[u8]) -> Result<FinsResponse> {
        self.exchange_with_cancel(request, &CancelToken::new())
    }

    /// Like [`exchange`](Self::exchange), but gives up with
    /// `FinsError::Cancelled` once `cancel` fires.
    ///
    /// A response arriving after cancellation is left unread and will be
    /// discarded by the service ID check of a later exchange.
    ///
    /// # Errors
    ///
    /// See [`exchange`](Self::exchange).
    pub fn exchange_with_cancel(&self, request: &[u8], cancel: &CancelToken) -> Result<FinsResponse> {
        let sid = FinsHeader::from_bytes(request)?.sid;
        let command = command_code(request)
            .ok_or_else(|| FinsError::truncated(MIN_REQUEST_SIZE, request.len()))?;
        let mut transport = self.lock_transport();

        self.set_state(SessionState::AwaitingResponse);
        let result = self.await_response(&mut *transport, request, sid, command, cancel);
        match &result {
            Ok(response) => {
                debug!(sid, peer = %self.peer, bytes = response.data.len(), "FINS exchange complete");
                self.set_state(SessionState::Idle);
            }
            Err(err) => {
                debug!(sid, peer = %self.peer, error = %err, "FINS exchange failed");
                self.set_state(SessionState::Failed);
            }
        }
        result
    }

    fn await_response(
        &self,
        transport: &mut T,
        request: &[u8],
        sid: u8,
        command: u16,
        cancel: &CancelToken,
    ) -> Result<FinsResponse> {
        self.notify(FrameDirection::Sent, request);
        transport.send(self.peer, request)?;
        let deadline = Instant::now() + self.config.timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(FinsError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(FinsError::Timeout);
            }

            let (from, frame) = match transport.receive((deadline - now).min(RECEIVE_SLICE)) {
                Ok(received) => received,
                Err(FinsError::Timeout) => continue,
                Err(err) => return Err(err),
            };
            if from != self.peer {
                warn!(%from, expected = %self.peer, "discarding frame from foreign endpoint");
                continue;
            }

            let response = FinsResponse::from_bytes(&frame)?;
            if response.header.sid != sid {
                warn!(
                    expected = sid,
                    received = response.header.sid,
                    "discarding response with stale service ID"
                );
                continue;
            }
            if response.command != command {
                debug!(
                    expected = %format!("0x{command:04X}"),
                    received = %format!("0x{:04X}", response.command),
                    "discarding frame that does not echo the request command"
                );
                continue;
            }

            response.check_end_code()?;
            self.notify(FrameDirection::Received, &frame);
            return Ok(response);
        }
    }

    fn read_words_at(&self, address: Address, count: u16) -> Result<Vec<u16>> {
        require_word_address(address)?;
        validate_count(usize::from(count))?;

        let request = build_read(
            self.config.destination,
            self.config.source,
            self.next_sid(),
            address,
            count,
        );
        let words = self.exchange(&request)?.to_words()?;
        if words.len() != usize::from(count) {
            return Err(FinsError::word_count_mismatch(usize::from(count), words.len()));
        }
        Ok(words)
    }

    fn write_words_at(&self, address: Address, words: &[u16]) -> Result<()> {
        require_word_address(address)?;
        validate_count(words.len())?;

        let payload: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        let request = build_write(
            self.config.destination,
            self.config.source,
            self.next_sid(),
            address,
            &payload,
        )?;
        self.exchange(&request)?;
        Ok(())
    }

    /// Reads `count` words (1-999) starting at a word address.
    ///
    /// # Errors
    ///
    /// Address errors, `InvalidParameter` for a bad count or a bit address,
    /// and any exchange error, each wrapped with the operation and address.
    pub fn read_words(&self, address: &str, count: u16) -> Result<Vec<u16>> {
        Address::parse(address)
            .and_then(|addr| self.read_words_at(addr, count))
            .map_err(|err| err.context(Operation::ReadWords, address))
    }

    /// Writes 1-999 words starting at a word address.
    ///
    /// # Errors
    ///
    /// See [`read_words`](Self::read_words).
    pub fn write_words(&self, address: &str, words: &[u16]) -> Result<()> {
        Address::parse(address)
            .and_then(|addr| self.write_words_at(addr, words))
            .map_err(|err| err.context(Operation::WriteWords, address))
    }

    /// Reads one bit.
    ///
    /// Offset `.0` cannot be expressed as a bit request, so `"C10"` and
    /// `"C10.0"` read the word and return bit 0.
    ///
    /// # Errors
    ///
    /// Address errors and any exchange error, wrapped with the operation and
    /// address.
    pub fn read_bit(&self, address: &str) -> Result<bool> {
        Address::parse(address)
            .and_then(|addr| self.read_bit_at(addr))
            .map_err(|err| err.context(Operation::ReadBit, address))
    }

    fn read_bit_at(&self, address: Address) -> Result<bool> {
        if !address.is_bit() {
            let word = self.read_words_at(address, 1)?;
            return Ok(get_bit(word[0], 0));
        }
        let request = build_read(
            self.config.destination,
            self.config.source,
            self.next_sid(),
            address,
            1,
        );
        self.exchange(&request)?.to_bit()
    }

    /// Writes one bit.
    ///
    /// At offset `.0` this reads the word, changes bit 0 and writes the word
    /// back: two exchanges, not atomic with respect to other writers.
    ///
    /// # Errors
    ///
    /// See [`read_bit`](Self::read_bit).
    pub fn write_bit(&self, address: &str, value: bool) -> Result<()> {
        Address::parse(address)
            .and_then(|addr| self.write_bit_at(addr, value))
            .map_err(|err| err.context(Operation::WriteBit, address))
    }

    fn write_bit_at(&self, address: Address, value: bool) -> Result<()> {
        if !address.is_bit() {
            let word = self.read_words_at(address, 1)?;
            return self.write_words_at(address, &[set_bit(word[0], 0, value)]);
        }
        let request = build_write(
            self.config.destination,
            self.config.source,
            self.next_sid(),
            address,
            &[u8::from(value)],
        )?;
        self.exchange(&request)?;
        Ok(())
    }

    /// Reads one typed value.
    ///
    /// # Errors
    ///
    /// See [`read_words`](Self::read_words).
    pub fn read_value<V: WordValue>(&self, address: &str) -> Result<V> {
        Address::parse(address)
            .and_then(|addr| self.read_words_at(addr, V::WORDS as u16))
            .and_then(|words| self.marshaller.decode(&words))
            .map_err(|err| err.context(Operation::ReadWords, address))
    }

    /// Writes one typed value.
    ///
    /// # Errors
    ///
    /// See [`write_words`](Self::write_words).
    pub fn write_value<V: WordValue>(&self, address: &str, value: V) -> Result<()> {
        self.write_words(address, &self.marshaller.encode(value))
    }

    /// Reads `count` consecutive typed values.
    ///
    /// # Errors
    ///
    /// See [`read_words`](Self::read_words); the total word count must be 1-999.
    pub fn read_values<V: WordValue>(&self, address: &str, count: usize) -> Result<Vec<V>> {
        Address::parse(address)
            .and_then(|addr| {
                let words = word_count(count.saturating_mul(V::WORDS))?;
                self.read_words_at(addr, words)
            })
            .and_then(|words| self.marshaller.decode_slice(&words))
            .map_err(|err| err.context(Operation::ReadWords, address))
    }

    /// Writes consecutive typed values.
    ///
    /// # Errors
    ///
    /// See [`write_words`](Self::write_words).
    pub fn write_values<V: WordValue>(&self, address: &str, values: &[V]) -> Result<()> {
        self.write_words(address, &self.marshaller.encode_slice(values))
    }

    /// Reads a string from `word_count` words, stopping at the first zero byte.
    ///
    /// # Errors
    ///
    /// See [`read_words`](Self::read_words).
    pub fn read_string(&self, address: &str, word_count: u16) -> Result<String> {
        self.read_words(address, word_count)
            .map(|words| self.marshaller.decode_str(&words))
    }

    /// Writes a string, two characters per word.
    ///
    /// An empty string writes a single zero word.
    ///
    /// # Errors
    ///
    /// See [`write_words`](Self::write_words).
    pub fn write_string(&self, address: &str, value: &str) -> Result<()> {
        let mut words = self.marshaller.encode_str(value);
        if words.is_empty() {
            words.push(0);
        }
        self.write_words(address, &words)
    }

    /// Writes a string into a fixed field of `word_count` words, zero-filling
    /// the remainder.
    ///
    /// # Errors
    ///
    /// `WordCountMismatch` if the string does not fit, plus the errors of
    /// [`write_words`](Self::write_words).
    pub fn write_string_fixed(&self, address: &str, value: &str, word_count: u16) -> Result<()> {
        self.marshaller
            .encode_str_fixed(value, usize::from(word_count))
            .map_err(|err| err.context(Operation::WriteWords, address))
            .and_then(|words| self.write_words(address, &words))
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .field("state", &SessionState::from_u8(self.state.load(Ordering::SeqCst)))
            .finish_non_exhaustive()
    }
}

fn require_word_address(address: Address) -> Result<()> {
    if address.is_bit() {
        return Err(FinsError::invalid_parameter(
            "address",
            "word access requires bit offset 0",
        ));
    }
    Ok(())
}

fn validate_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(FinsError::invalid_parameter("count", "must be greater than 0"));
    }
    if count > usize::from(MAX_WORDS_PER_COMMAND) {
        return Err(FinsError::invalid_parameter(
            "count",
            format!("must not exceed {MAX_WORDS_PER_COMMAND} words"),
        ));
    }
    Ok(())
}

fn word_count(count: usize) -> Result<u16> {
    validate_count(count)?;
    u16::try_from(count).map_err(|_| FinsError::invalid_parameter("count", "too large"))
}
