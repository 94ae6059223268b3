//! Frame-sent and frame-received notifications.
//!
//! A [`Session`](crate::Session) reports every frame it transmits and every
//! matched response to the observers it was constructed with. Observers have
//! no effect on the exchange.
//!
//! # Example
//!
//! ```
//! use std::sync::mpsc;
//! use fins_core::event::{channel_observer, FrameDirection, FrameEvent, FrameObserver};
//!
//! let (tx, rx) = mpsc::channel();
//! let observer = channel_observer(tx);
//! observer.on_frame(&FrameEvent::new(FrameDirection::Sent, "127.0.0.1:9600", &[0x80, 0x00]));
//!
//! let event = rx.try_recv().unwrap();
//! assert_eq!(event.direction, FrameDirection::Sent);
//! assert_eq!(event.frame, vec![0x80, 0x00]);
//! ```

use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::utils::format_frame;

/// Whether a frame left or arrived at the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameDirection {
    /// Request transmitted.
    Sent,
    /// Matching response received.
    Received,
}

impl fmt::Display for FrameDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDirection::Sent => write!(f, "sent"),
            FrameDirection::Received => write!(f, "received"),
        }
    }
}

/// A frame observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameEvent {
    /// Sent or received.
    pub direction: FrameDirection,
    /// When the frame was observed.
    pub timestamp: DateTime<Utc>,
    /// Remote endpoint, as `ip:port`.
    pub endpoint: String,
    /// Raw frame bytes.
    pub frame: Vec<u8>,
}

impl FrameEvent {
    /// Creates an event stamped with the current time.
    pub fn new(direction: FrameDirection, endpoint: impl Into<String>, frame: &[u8]) -> Self {
        Self {
            direction,
            timestamp: Utc::now(),
            endpoint: endpoint.into(),
            frame: frame.to_vec(),
        }
    }
}

impl fmt::Display for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.direction,
            self.endpoint,
            format_frame(&self.frame)
        )
    }
}

/// Receives frame events from a session.
pub trait FrameObserver: Send + Sync {
    /// Called once per observed frame.
    fn on_frame(&self, event: &FrameEvent);
}

impl<F> FrameObserver for F
where
    F: Fn(&FrameEvent) + Send + Sync,
{
    fn on_frame(&self, event: &FrameEvent) {
        self(event)
    }
}

/// Observer that forwards events into an mpsc channel.
///
/// A disconnected receiver is ignored.
pub struct ChannelObserver {
    sender: Mutex<Sender<FrameEvent>>,
}

impl FrameObserver for ChannelObserver {
    fn on_frame(&self, event: &FrameEvent) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(event.clone());
        }
    }
}

impl fmt::Debug for ChannelObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelObserver").finish_non_exhaustive()
    }
}

/// Wraps a channel sender as a [`FrameObserver`].
pub fn channel_observer(sender: Sender<FrameEvent>) -> ChannelObserver {
    ChannelObserver {
        sender: Mutex::new(sender),
    }
}

/// Observer that logs each frame at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FrameObserver for TracingObserver {
    fn on_frame(&self, event: &FrameEvent) {
        debug!(
            direction = %event.direction,
            endpoint = %event.endpoint,
            len = event.frame.len(),
            frame = %hex::encode(&event.frame),
            "FINS frame"
        );
    }
}
