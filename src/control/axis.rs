//! Axis encoding and the shared X/Y/R state that the dispatcher transmits.
//!
//! All axis values on the wire are single bytes. `0x7F` is the centered ("stop")
//! value; see [`encode`] for how normalized positions land on that scale.

use std::fmt;
use tracing::trace;

/// Wire value of a centered axis.
pub const AXIS_CENTER: u8 = 0x7F;

/// Number of guaranteed center retransmissions after the stick is released.
pub const DEFAULT_ZERO_RESEND_BUDGET: u32 = 5;

/// Maps a normalized position in `[-1, 1]` onto the 8-bit axis scale.
///
/// `value = round((position + 1) * 127.5)` with ties rounded down, which puts the
/// exact center on `0x7F` and keeps the function monotonic. Out-of-range input is
/// clamped; non-finite input encodes to center.
pub fn encode(position: f32) -> u8 {
    if !position.is_finite() {
        return AXIS_CENTER;
    }

    let scaled = (position.clamp(-1.0, 1.0) + 1.0) * 127.5;
    (scaled - 0.5).ceil().clamp(0.0, 255.0) as u8
}

/// One X/Y/R sample as it goes out to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisTriple {
    pub x: u8,
    pub y: u8,
    pub r: u8,
}

impl AxisTriple {
    pub const CENTER: Self = Self {
        x: AXIS_CENTER,
        y: AXIS_CENTER,
        r: AXIS_CENTER,
    };

    pub const fn new(x: u8, y: u8, r: u8) -> Self {
        Self { x, y, r }
    }

    pub fn is_center(&self) -> bool {
        *self == Self::CENTER
    }
}

impl Default for AxisTriple {
    fn default() -> Self {
        Self::CENTER
    }
}

impl fmt::Display for AxisTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.r)
    }
}

/// Current axis values plus what was last delivered and the stop-resend budget.
#[derive(Debug, Clone)]
pub struct AxisState {
    current: AxisTriple,
    last_sent: AxisTriple,
    zero_resend_budget: u32,
    budget_refill: u32,
}

impl AxisState {
    /// Centered state with a full resend budget.
    pub fn new(zero_resend_budget: u32) -> Self {
        Self {
            current: AxisTriple::CENTER,
            last_sent: AxisTriple::CENTER,
            zero_resend_budget,
            budget_refill: zero_resend_budget,
        }
    }

    pub fn current(&self) -> AxisTriple {
        self.current
    }

    pub fn last_sent(&self) -> AxisTriple {
        self.last_sent
    }

    pub fn zero_resend_budget(&self) -> u32 {
        self.zero_resend_budget
    }

    /// Returns `true` if the joystick axes actually changed.
    pub fn set_xy(&mut self, x: u8, y: u8) -> bool {
        if self.current.x == x && self.current.y == y {
            return false;
        }
        self.current.x = x;
        self.current.y = y;
        trace!("Axis state now {}", self.current);
        true
    }

    /// Returns `true` if the rotation axis actually changed. Returning it to
    /// center refills the stop-resend budget.
    pub fn set_r(&mut self, r: u8) -> bool {
        if self.current.r == r {
            return false;
        }
        self.current.r = r;
        if r == AXIS_CENTER {
            self.zero_resend_budget = self.budget_refill;
        }
        trace!("Axis state now {}", self.current);
        true
    }

    /// Centers all three axes and refills the stop-resend budget.
    pub fn reset_to_center(&mut self) {
        self.current = AxisTriple::CENTER;
        self.zero_resend_budget = self.budget_refill;
    }

    /// Records a delivered sample. Delivering the center consumes one unit of budget.
    pub fn record_sent(&mut self, sent: AxisTriple) {
        self.last_sent = sent;
        if sent.is_center() {
            self.zero_resend_budget = self.zero_resend_budget.saturating_sub(1);
        }
    }
}

impl Default for AxisState {
    fn default() -> Self {
        Self::new(DEFAULT_ZERO_RESEND_BUDGET)
    }
}
