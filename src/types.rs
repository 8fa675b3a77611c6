//! Core data types shared across the capture pipeline

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ClipError;

/// Discrete capture quality level, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "360p")]
    Low,
    #[serde(rename = "720p")]
    Medium,
    #[serde(rename = "1080p")]
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];

    /// Display label, also the persisted form
    pub fn label(self) -> &'static str {
        match self {
            QualityTier::Low => "360p",
            QualityTier::Medium => "720p",
            QualityTier::High => "1080p",
        }
    }

    /// Capture constraints bound to this tier
    pub fn constraints(self) -> CaptureConstraints {
        match self {
            QualityTier::Low => CaptureConstraints::new(640, 480, 15),
            QualityTier::Medium => CaptureConstraints::new(1280, 720, 30),
            QualityTier::High => CaptureConstraints::new(1920, 1080, 60),
        }
    }
}

impl Default for QualityTier {
    fn default() -> Self {
        QualityTier::Medium
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for QualityTier {
    type Err = ClipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "360p" => Ok(QualityTier::Low),
            "medium" | "720p" => Ok(QualityTier::Medium),
            "high" | "1080p" => Ok(QualityTier::High),
            other => Err(ClipError::Config(format!("unknown quality tier: {}", other))),
        }
    }
}

/// Target resolution and frame rate requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl CaptureConstraints {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }
}

impl fmt::Display for CaptureConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.frame_rate)
    }
}

/// A camera the capture device can record from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoInput {
    /// Stable device identifier
    pub id: String,
    pub label: String,
}

impl VideoInput {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for VideoInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

/// One throughput measurement and the tier it maps to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthSample {
    pub throughput_mbps: f64,
    pub quality: QualityTier,
}

/// A finished, immutable video clip.
///
/// The payload is raw binary here; the store owns the text form it is
/// persisted as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRecord {
    pub id: Uuid,
    pub payload: Bytes,
    pub captured_at_ms: i64,
    pub duration_ms: u64,
    pub quality: QualityTier,
}

impl ClipRecord {
    /// Payload size in bytes
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Age relative to `now_ms`, zero for clips stamped in the future
    pub fn age_ms(&self, now_ms: i64) -> u64 {
        now_ms.saturating_sub(self.captured_at_ms).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(QualityTier::Low < QualityTier::Medium);
        assert!(QualityTier::Medium < QualityTier::High);
    }

    #[test]
    fn test_tier_labels_roundtrip_through_serde() {
        for tier in QualityTier::ALL {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier.label()));
            let back: QualityTier = serde_json::from_str(&json).unwrap();
            assert_eq!(back, tier);
        }
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("low".parse::<QualityTier>().unwrap(), QualityTier::Low);
        assert_eq!("720p".parse::<QualityTier>().unwrap(), QualityTier::Medium);
        assert_eq!(" HIGH ".parse::<QualityTier>().unwrap(), QualityTier::High);
        assert!("4k".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_constraints_table() {
        assert_eq!(QualityTier::Low.constraints(), CaptureConstraints::new(640, 480, 15));
        assert_eq!(QualityTier::Medium.constraints(), CaptureConstraints::new(1280, 720, 30));
        assert_eq!(QualityTier::High.constraints(), CaptureConstraints::new(1920, 1080, 60));
        assert_eq!(QualityTier::High.constraints().to_string(), "1920x1080@60");
    }

    #[test]
    fn test_clip_age() {
        let clip = ClipRecord {
            id: Uuid::new_v4(),
            payload: Bytes::from_static(b"abc"),
            captured_at_ms: 1_000,
            duration_ms: 10,
            quality: QualityTier::Low,
        };
        assert_eq!(clip.age_ms(1_500), 500);
        assert_eq!(clip.age_ms(500), 0);
        assert_eq!(clip.size_bytes(), 3);
    }
}
