//! Real-time bridge from operator input to the arm controller's byte protocol.
//!
//! ```text
//! control/    - encoding, pointer arbitration, debounce primitives
//! session/    - sans-IO session core and its periodic tasks
//! link/       - connection supervisor worker and link lifecycle
//! transport/  - transport boundary, GATT adapter, simulated device
//! config.rs   - TOML configuration
//! ```

pub mod config;
pub mod control;
pub mod link;
pub mod session;
pub mod transport;
