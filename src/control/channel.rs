//! Per-channel coalescing for the continuous slider controls.
//!
//! A slider can emit dozens of values per second. Each channel keeps at most one
//! pending value and a single debounce timer: the first submit arms the timer,
//! later submits overwrite the pending value, and on expiry only the most recent
//! value is released.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_CHANNEL_DEBOUNCE: Duration = Duration::from_millis(40);

/// Slider channels understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Claw,
    A,
    B,
    C,
    End,
}

impl Channel {
    pub const ALL: [Channel; 5] = [Channel::Claw, Channel::A, Channel::B, Channel::C, Channel::End];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Claw => "claw",
            Channel::A => "a",
            Channel::B => "b",
            Channel::C => "c",
            Channel::End => "end",
        };
        f.write_str(name)
    }
}

/// Last-write-wins debounce slot for one channel.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    window: Duration,
    pending: Option<u8>,
    deadline: Option<Instant>,
}

impl ChannelQueue {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    pub fn submit(&mut self, value: u8, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
        self.pending = Some(value);
    }

    pub fn timer_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn pending(&self) -> Option<u8> {
        self.pending
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms the timer and hands out the pending value once the window has passed.
    pub fn expire(&mut self, now: Instant) -> Option<u8> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Disarms the timer and discards whatever was pending.
    pub fn cancel(&mut self) -> Option<u8> {
        self.deadline = None;
        self.pending.take()
    }
}

impl Default for ChannelQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_inside_one_window_releases_last_value_once() {
        let start = Instant::now();
        let mut queue = ChannelQueue::default();

        queue.submit(10, start);
        queue.submit(20, start + Duration::from_millis(15));
        queue.submit(30, start + Duration::from_millis(39));

        assert_eq!(queue.expire(start + Duration::from_millis(39)), None);
        assert_eq!(queue.expire(start + Duration::from_millis(40)), Some(30));
        assert_eq!(queue.expire(start + Duration::from_millis(80)), None);
        assert!(!queue.timer_armed());
    }

    #[test]
    fn late_submits_do_not_extend_the_window() {
        let start = Instant::now();
        let mut queue = ChannelQueue::default();
        queue.submit(1, start);
        queue.submit(2, start + Duration::from_millis(35));
        assert_eq!(queue.deadline(), Some(start + Duration::from_millis(40)));
    }

    #[test]
    fn next_submit_after_expiry_opens_a_new_window() {
        let start = Instant::now();
        let mut queue = ChannelQueue::default();
        queue.submit(1, start);
        queue.expire(start + Duration::from_millis(40));

        let later = start + Duration::from_millis(100);
        queue.submit(2, later);
        assert_eq!(queue.deadline(), Some(later + Duration::from_millis(40)));
        assert_eq!(queue.pending(), Some(2));
    }

    #[test]
    fn cancel_drops_pending_value() {
        let start = Instant::now();
        let mut queue = ChannelQueue::default();
        queue.submit(99, start);
        assert_eq!(queue.cancel(), Some(99));
        assert_eq!(queue.expire(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn channel_names_are_lowercase() {
        let names: Vec<String> = Channel::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["claw", "a", "b", "c", "end"]);
    }
}
