//! Link lifecycle with compile-time state safety via statum.
//!
//! Only an `Established` link can be closed, and only a `Dialing` link can be
//! established or abandoned, so the supervisor cannot skip a step.

use chrono::{DateTime, Local};
use statum::{machine, state};
use tracing::{debug, info};

#[state]
#[derive(Debug, Clone)]
pub enum LinkPhase {
    Idle,        // No device, nothing in progress
    Dialing,     // Transport connect in flight
    Established, // Device connected, session running
}

#[machine]
pub struct Link<S: LinkPhase> {
    address: String,
    attempts: u32,
    established_at: Option<DateTime<Local>>,
}

impl<S: LinkPhase> Link<S> {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Dial attempts made over this link's lifetime.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn established_at(&self) -> Option<DateTime<Local>> {
        self.established_at
    }
}

impl Link<Idle> {
    pub fn create() -> Self {
        Self::new(String::new(), 0, None)
    }

    pub fn dial(mut self, address: &str) -> Link<Dialing> {
        self.attempts += 1;
        self.address = address.to_string();
        info!("Dialing {} (attempt {})", self.address, self.attempts);
        self.transition()
    }
}

impl Link<Dialing> {
    pub fn establish(mut self) -> Link<Established> {
        self.established_at = Some(Local::now());
        info!("Link to {} established", self.address);
        self.transition()
    }

    /// Gives up on the attempt, either because it failed or was cancelled.
    pub fn abandon(self) -> Link<Idle> {
        debug!("Abandoning dial to {}", self.address);
        self.transition()
    }
}

impl Link<Established> {
    pub fn close(mut self) -> Link<Idle> {
        info!("Link to {} closed", self.address);
        self.established_at = None;
        self.transition()
    }
}
