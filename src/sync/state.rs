//! Observable clip state and its selectors

use uuid::Uuid;

use crate::types::{BandwidthSample, ClipRecord, QualityTier};

/// Everything observers can see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipState {
    /// Durably saved clips, oldest first
    pub recordings: Vec<ClipRecord>,
    pub bandwidth: Option<BandwidthSample>,
    pub selected_quality: QualityTier,
    pub loading: bool,
    /// Last failed mutation, cleared by the next successful one
    pub error: Option<String>,
}

impl ClipState {
    pub fn recordings(&self) -> &[ClipRecord] {
        &self.recordings
    }

    pub fn recording_count(&self) -> usize {
        self.recordings.len()
    }

    pub fn find(&self, id: Uuid) -> Option<&ClipRecord> {
        self.recordings.iter().find(|r| r.id == id)
    }

    /// Most recently captured clip
    pub fn latest_recording(&self) -> Option<&ClipRecord> {
        self.recordings.iter().max_by_key(|r| r.captured_at_ms)
    }

    pub fn bandwidth(&self) -> Option<BandwidthSample> {
        self.bandwidth
    }

    pub fn selected_quality(&self) -> QualityTier {
        self.selected_quality
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
