//! Session timing
//!
//! Monotonic clock anchored to a wall-clock epoch so a capture session can
//! report both elapsed time and absolute timestamps from a single source.

use tokio::time::Instant;

/// Current wall-clock time in epoch milliseconds
pub fn epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Monotonic clock for one capture session
///
/// Elapsed values come from the tokio clock, so they follow paused time in
/// tests. Absolute timestamps are the start epoch plus the monotonic elapsed
/// time, which keeps them consistent with durations even if the wall clock
/// jumps mid-session.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
    start_epoch_ms: i64,
}

impl SessionClock {
    /// Start a clock at the current instant
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            start_epoch_ms: epoch_ms(),
        }
    }

    /// Start a clock from an explicit anchor
    pub fn from_parts(start: Instant, start_epoch_ms: i64) -> Self {
        Self {
            start,
            start_epoch_ms,
        }
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }

    pub fn start_epoch_ms(&self) -> i64 {
        self.start_epoch_ms
    }

    /// Milliseconds elapsed since the clock started
    #[inline]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms_at(Instant::now())
    }

    /// Milliseconds between the start and `instant`, zero if `instant` is earlier
    #[inline]
    pub fn elapsed_ms_at(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(self.start).as_millis() as u64
    }

    /// Epoch milliseconds corresponding to `instant`
    pub fn epoch_ms_at(&self, instant: Instant) -> i64 {
        self.start_epoch_ms + self.elapsed_ms_at(instant) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_follows_tokio_clock() {
        let clock = SessionClock::from_parts(Instant::now(), 1_000);
        assert_eq!(clock.elapsed_ms(), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(clock.elapsed_ms(), 250);
        assert_eq!(clock.epoch_ms_at(Instant::now()), 1_250);
    }

    #[test]
    fn test_earlier_instant_saturates() {
        let now = Instant::now();
        let clock = SessionClock::from_parts(now + Duration::from_secs(1), 0);
        assert_eq!(clock.elapsed_ms_at(now), 0);
        assert_eq!(clock.epoch_ms_at(now), 0);
    }

    #[test]
    fn test_epoch_ms_is_recent() {
        // 2020-01-01 in epoch ms
        assert!(epoch_ms() > 1_577_836_800_000);
    }
}
