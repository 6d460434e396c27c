//! Operator input primitives
//!
//! Pure, clock-free building blocks that turn raw operator input into protocol
//! values:
//!
//! 1. [`axis`] - 8-bit axis encoding and the shared X/Y/R state
//! 2. [`pointer`] - multi-contact arbitration for the on-screen joystick
//! 3. [`channel`] - last-write-wins debounce per slider channel
//! 4. [`command`] - debounced one-shot commands
//!
//! # Data Flow
//!
//! ```text
//! pointer events ──► PointerArbiter ──► AxisState ──► (session dispatcher)
//! slider events  ──► ChannelQueue   ──────────────► (session channel sends)
//! button events  ──► CommandInvoker ──────────────► (session command sends)
//! ```
//!
//! Timing is always passed in by the caller, so everything here is driven
//! deterministically by [`crate::session::Session`].

pub mod axis;
pub mod channel;
pub mod command;
pub mod pointer;

pub use axis::{encode, AxisState, AxisTriple, AXIS_CENTER};
pub use channel::{Channel, ChannelQueue};
pub use command::{Command, CommandInvoker, CommandRejection};
pub use pointer::{ContactId, JoystickGeometry, Point, PointerArbiter};
