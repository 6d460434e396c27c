//! In-process stand-in for the arm controller.
//!
//! Records everything it is asked to transmit and can be configured to lose axis
//! frames, refuse connects, or fail polls. The binary uses it for dry runs; the
//! supervisor tests use it as their device.

use super::{Transport, TransportError};
use crate::control::{AxisTriple, Channel, Command};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct DeviceLog {
    connected: Option<String>,
    connects: u32,
    disconnects: u32,
    polls: u32,
    // Every frame the core asked to send, and the subset that arrived.
    sent_axes: Vec<AxisTriple>,
    received_axes: Vec<AxisTriple>,
    channels: Vec<(Channel, u8)>,
    commands: Vec<Command>,
}

#[derive(Debug)]
pub struct SimulatedTransport {
    log: Mutex<DeviceLog>,
    usable: AtomicBool,
    fail_connect: AtomicBool,
    fail_poll: AtomicBool,
    fail_disconnect: AtomicBool,
    // Drop every Nth axis frame; 0 disables loss.
    axis_loss_every: u32,
    connect_delay: Duration,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(DeviceLog::default()),
            usable: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
            fail_poll: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            axis_loss_every: 0,
            connect_delay: Duration::ZERO,
        }
    }

    /// Makes every connect take `delay` before it answers.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Silently loses every `n`th axis frame after reporting success.
    pub fn with_axis_loss(mut self, every: u32) -> Self {
        self.axis_loss_every = every;
        self
    }

    fn log(&self) -> MutexGuard<'_, DeviceLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_usable(&self, usable: bool) {
        self.usable.store(usable, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_poll(&self, fail: bool) {
        self.fail_poll.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.log().connected.is_some()
    }

    pub fn connected_address(&self) -> Option<String> {
        self.log().connected.clone()
    }

    pub fn connect_count(&self) -> u32 {
        self.log().connects
    }

    pub fn disconnect_count(&self) -> u32 {
        self.log().disconnects
    }

    pub fn poll_count(&self) -> u32 {
        self.log().polls
    }

    pub fn sent_axes(&self) -> Vec<AxisTriple> {
        self.log().sent_axes.clone()
    }

    pub fn received_axes(&self) -> Vec<AxisTriple> {
        self.log().received_axes.clone()
    }

    pub fn channel_writes(&self) -> Vec<(Channel, u8)> {
        self.log().channels.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log().commands.clone()
    }

    fn require_link(&self) -> Result<(), TransportError> {
        if self.log().connected.is_some() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Link(format!("{address} did not answer")));
        }
        let mut log = self.log();
        log.connects += 1;
        log.connected = Some(address.to_string());
        info!("Simulated device {} connected", address);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(TransportError::Link("disconnect refused".into()));
        }
        let mut log = self.log();
        log.disconnects += 1;
        log.connected = None;
        info!("Simulated device disconnected");
        Ok(())
    }

    async fn poll_usability(&self) -> Result<bool, TransportError> {
        self.require_link()?;
        self.log().polls += 1;
        if self.fail_poll.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(self.usable.load(Ordering::SeqCst))
    }

    async fn send_axes(&self, x: u8, y: u8, r: u8) -> Result<(), TransportError> {
        self.require_link()?;
        if !self.usable.load(Ordering::SeqCst) {
            return Err(TransportError::ControlUnavailable);
        }

        let triple = AxisTriple::new(x, y, r);
        let mut log = self.log();
        log.sent_axes.push(triple);
        let lost = self.axis_loss_every > 0
            && log.sent_axes.len() % self.axis_loss_every as usize == 0;
        if lost {
            debug!("Simulated loss of axis frame {}", triple);
        } else {
            log.received_axes.push(triple);
        }
        Ok(())
    }

    async fn send_channel_value(&self, channel: Channel, value: u8) -> Result<(), TransportError> {
        self.require_link()?;
        self.log().channels.push((channel, value));
        Ok(())
    }

    async fn send_command(&self, command: Command) -> Result<(), TransportError> {
        self.require_link()?;
        self.log().commands.push(command);
        Ok(())
    }
}
