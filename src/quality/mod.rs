/// Quality tier policy
///
/// Maps a measured throughput to one of the fixed quality tiers and a tier to
/// the capture constraints requested from the device. Pure, no state.
use serde::{Deserialize, Serialize};

use crate::types::{CaptureConstraints, QualityTier};

/// Throughput floors (Mbps) separating the tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// At or above this, at least Medium
    pub medium_floor_mbps: f64,
    /// At or above this, High
    pub high_floor_mbps: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            medium_floor_mbps: 2.0,
            high_floor_mbps: 5.0,
        }
    }
}

impl QualityThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if !self.medium_floor_mbps.is_finite() || !self.high_floor_mbps.is_finite() {
            return Err("Quality thresholds must be finite".to_string());
        }
        if self.medium_floor_mbps < 0.0 {
            return Err("Medium floor must not be negative".to_string());
        }
        if self.medium_floor_mbps > self.high_floor_mbps {
            return Err("Medium floor must not exceed high floor".to_string());
        }
        Ok(())
    }
}

/// Throughput → tier → constraints mapping
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityPolicy {
    thresholds: QualityThresholds,
}

impl QualityPolicy {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> QualityThresholds {
        self.thresholds
    }

    /// Pick the tier a throughput measurement can sustain.
    ///
    /// NaN, infinite and negative readings are treated as no bandwidth.
    pub fn tier_for_throughput(&self, mbps: f64) -> QualityTier {
        if !mbps.is_finite() || mbps < 0.0 {
            return QualityTier::Low;
        }
        if mbps < self.thresholds.medium_floor_mbps {
            QualityTier::Low
        } else if mbps < self.thresholds.high_floor_mbps {
            QualityTier::Medium
        } else {
            QualityTier::High
        }
    }

    pub fn constraints_for_tier(&self, tier: QualityTier) -> CaptureConstraints {
        tier.constraints()
    }
}
