//! Collaborator seams.
//!
//! The relay engine never touches a socket or a broker directly. The daemon
//! plugs concrete transports in behind these traits; tests plug in recorders.
//! Failures come back as typed errors, and the gateway folds them into counters
//! and logs. None of them stops the relay loop.

use std::sync::Arc;

/// The radio medium.
pub trait RadioTransport: Send {
    /// Send one frame. Implementations reject empty or >255 byte frames.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError>;
}

/// The pub/sub bus client.
pub trait BusTransport: Send + Sync {
    fn connected(&self) -> bool;

    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError>;

    fn subscribe(&self, pattern: &str) -> Result<(), BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for Arc<T> {
    fn connected(&self) -> bool {
        (**self).connected()
    }

    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        (**self).publish(topic, payload, retain)
    }

    fn subscribe(&self, pattern: &str) -> Result<(), BusError> {
        (**self).subscribe(pattern)
    }
}

/// Whatever hosts the gateway process.
pub trait HostControl: Send {
    fn request_restart(&self);
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("refusing to transmit an empty frame")]
    Empty,

    #[error("frame of {0} bytes exceeds the 255 byte limit")]
    TooLong(usize),

    #[error("radio I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus is not connected")]
    Disconnected,

    #[error("invalid topic {0:?}")]
    InvalidTopic(String),
}
