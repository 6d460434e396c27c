//! # Transport boundary
//!
//! The wireless link is an external collaborator. This module defines what the
//! rest of the crate needs from it and ships two implementations:
//!
//! ```text
//! transport/
//! ├── gatt.rs  - device protocol over a characteristic read/write link
//! └── sim.rs   - in-process device model for dry runs and tests
//! ```
//!
//! Every transmitted scalar is an unsigned byte. The transport must tolerate
//! interleaved calls: axis, channel and command sends are issued concurrently on
//! the same handle.

pub mod gatt;
pub mod sim;

use crate::control::{Channel, Command};
use async_trait::async_trait;
use thiserror::Error;

pub use gatt::{GattLink, GattProfile, GattTransport};
pub use sim::SimulatedTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device refused the write because its control path is not usable.
    #[error("device control path unavailable")]
    ControlUnavailable,

    #[error("no link to the device")]
    NotConnected,

    #[error("not supported by this transport: {0}")]
    Unsupported(String),

    #[error("transport operation timed out")]
    Timeout,

    #[error("link error: {0}")]
    Link(String),
}

impl TransportError {
    /// Whether the failure says continuous control is currently pointless.
    pub fn indicates_unusable(&self) -> bool {
        matches!(self, TransportError::ControlUnavailable)
    }
}

/// Primitives the control core consumes from the wireless link.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn poll_usability(&self) -> Result<bool, TransportError>;

    async fn send_axes(&self, x: u8, y: u8, r: u8) -> Result<(), TransportError>;

    async fn send_channel_value(&self, channel: Channel, value: u8) -> Result<(), TransportError>;

    async fn send_command(&self, command: Command) -> Result<(), TransportError>;
}
