use super::cadence::Cadence;
use crate::transport::TransportError;
use std::time::{Duration, Instant};
use tracing::warn;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Periodic usability check. At most one poll is outstanding.
#[derive(Debug, Clone)]
pub struct UsabilityPoller {
    cadence: Cadence,
    in_flight: bool,
}

impl UsabilityPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            cadence: Cadence::new(interval),
            in_flight: false,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.cadence.start(now);
    }

    pub fn stop(&mut self) {
        self.cadence.stop();
        self.in_flight = false;
    }

    pub fn is_running(&self) -> bool {
        self.cadence.is_running()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.cadence.next_due()
    }

    /// Returns `true` when a poll should be issued now.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.cadence.fire(now) || self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Turns a poll result into the usability flag. Failures read as unusable.
    pub fn complete(&mut self, result: &Result<bool, TransportError>) -> bool {
        self.in_flight = false;
        match result {
            Ok(usable) => *usable,
            Err(e) => {
                warn!("Usability poll failed: {}", e);
                false
            }
        }
    }
}

impl Default for UsabilityPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
