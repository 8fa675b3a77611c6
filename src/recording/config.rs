//! Recording limits

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RecordingSettings;

/// Time limits for one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingLimits {
    /// Sessions are stopped automatically once this much time has elapsed
    pub max_duration_ms: u64,
    /// How often elapsed time and progress are sampled
    pub tick_interval_ms: u64,
}

impl RecordingLimits {
    pub fn new(max_duration_ms: u64, tick_interval_ms: u64) -> Self {
        Self {
            max_duration_ms,
            tick_interval_ms,
        }
    }

    /// Set the maximum session length
    pub fn with_max_duration_ms(mut self, max_duration_ms: u64) -> Self {
        self.max_duration_ms = max_duration_ms;
        self
    }

    /// Set the progress sampling interval
    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    /// Tick period, never zero
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Fraction of the maximum duration covered by `elapsed_ms`, in `[0, 1]`
    pub fn progress(&self, elapsed_ms: u64) -> f64 {
        if self.max_duration_ms == 0 {
            return 1.0;
        }
        (elapsed_ms as f64 / self.max_duration_ms as f64).min(1.0)
    }

    pub fn is_exhausted(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.max_duration_ms
    }
}

impl Default for RecordingLimits {
    fn default() -> Self {
        Self::from(&RecordingSettings::default())
    }
}

impl From<&RecordingSettings> for RecordingLimits {
    fn from(settings: &RecordingSettings) -> Self {
        Self::new(settings.max_duration_ms, settings.tick_interval_ms)
    }
}
