//! Fixed-rate transmission of the X/Y/R triple.
//!
//! On every tick the dispatcher sends the current triple if it differs from what
//! was last delivered, or if it is the center triple and stop-resend budget is
//! left. Only one axis send may be in flight; ticks that land while a send is
//! outstanding are skipped.

use super::cadence::Cadence;
use crate::control::{AxisState, AxisTriple};
use std::time::{Duration, Instant};
use tracing::trace;

pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub struct AxisDispatcher {
    cadence: Cadence,
    in_flight: Option<AxisTriple>,
}

impl AxisDispatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            cadence: Cadence::new(interval),
            in_flight: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.cadence.start(now);
    }

    /// Stops ticking and forgets any outstanding send.
    pub fn stop(&mut self) {
        self.cadence.stop();
        self.in_flight = None;
    }

    pub fn is_running(&self) -> bool {
        self.cadence.is_running()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.cadence.next_due()
    }

    pub fn in_flight(&self) -> Option<AxisTriple> {
        self.in_flight
    }

    /// Runs one tick. Returns the triple to transmit, if any.
    pub fn tick(&mut self, now: Instant, axes: &AxisState, permitted: bool) -> Option<AxisTriple> {
        if !self.cadence.fire(now) || !permitted || self.in_flight.is_some() {
            return None;
        }

        let current = axes.current();
        let changed = current != axes.last_sent();
        let resend_stop = current.is_center() && axes.zero_resend_budget() > 0;
        if !changed && !resend_stop {
            return None;
        }

        trace!(
            "Dispatching {} (changed: {}, stop budget: {})",
            current,
            changed,
            axes.zero_resend_budget()
        );
        self.in_flight = Some(current);
        Some(current)
    }

    /// Settles the outstanding send. Only a successful send counts as delivered.
    pub fn complete(&mut self, axes: &mut AxisState, delivered: bool) {
        if let Some(sent) = self.in_flight.take() {
            if delivered {
                axes.record_sent(sent);
            }
        }
    }
}

impl Default for AxisDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_INTERVAL)
    }
}
