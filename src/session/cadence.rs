use std::time::{Duration, Instant};

/// Shortest interval a cadence runs at. Zero would make every run due again
/// immediately.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Fixed-rate schedule for a periodic task.
///
/// Missed periods are not replayed: if the caller falls behind, the next run is
/// scheduled one interval after the late run instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            next_due: None,
        }
    }

    /// Starts the schedule with the first run due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns `true` if a run is due at `now` and advances the schedule.
    pub fn fire(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let next = due + self.interval;
        self.next_due = Some(if next > now { next } else { now + self.interval });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn stopped_cadence_never_fires() {
        let mut cadence = Cadence::new(30 * MS);
        assert!(!cadence.fire(Instant::now()));
        assert_eq!(cadence.next_due(), None);
    }

    #[test]
    fn fires_on_start_then_every_interval() {
        let start = Instant::now();
        let mut cadence = Cadence::new(30 * MS);
        cadence.start(start);

        assert!(cadence.fire(start));
        assert!(!cadence.fire(start + 29 * MS));
        assert!(cadence.fire(start + 30 * MS));
        assert_eq!(cadence.next_due(), Some(start + 60 * MS));
    }

    #[test]
    fn late_run_does_not_burst() {
        let start = Instant::now();
        let mut cadence = Cadence::new(30 * MS);
        cadence.start(start);
        cadence.fire(start);

        let late = start + 100 * MS;
        assert!(cadence.fire(late));
        assert_eq!(cadence.next_due(), Some(late + 30 * MS));
        assert!(!cadence.fire(late));
    }

    #[test]
    fn zero_interval_fires_once_per_instant() {
        let start = Instant::now();
        let mut cadence = Cadence::new(Duration::ZERO);
        assert_eq!(cadence.interval(), MIN_INTERVAL);
        cadence.start(start);

        let fired = (0..1000).filter(|_| cadence.fire(start)).count();
        assert_eq!(fired, 1);
        assert_eq!(cadence.next_due(), Some(start + MIN_INTERVAL));
    }
}
