//! Time sources for the session scheduler.

use std::time::Instant;

/// Source of the instants fed to the session. The supervisor sleeps on tokio
/// timers derived from it, so it must advance with tokio's clock.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Follows tokio's clock, so a paused test runtime drives the session too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock;
        let start = clock.now();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now().duration_since(start), Duration::from_millis(250));
    }
}
