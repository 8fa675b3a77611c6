//! Persistent clip store
//!
//! Keeps the whole clip collection as one JSON array under a single medium
//! key. Every mutation is a read-modify-write of that array, serialized by an
//! async lock and committed by exactly one write, so eviction and insertion
//! either land together or not at all.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::codec::{decode_payload, encode_payload};
use super::medium::StorageMedium;
use super::retention::{apply_retention, oldest_index, Retainable, RetentionPolicy, SweepReport};
use crate::assert_invariant;
use crate::errors::ClipError;
use crate::invariant_ppt::invariants;
use crate::timing::epoch_ms;
use crate::types::{ClipRecord, QualityTier};

/// Medium key the collection lives under
pub const STORAGE_KEY: &str = "recorded_videos";

/// Persisted form of a clip: payload carried as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredClip {
    pub id: Uuid,
    pub payload: String,
    pub captured_at_ms: i64,
    pub duration_ms: u64,
    pub quality: QualityTier,
}

impl StoredClip {
    pub fn encode(record: &ClipRecord) -> Self {
        Self {
            id: record.id,
            payload: encode_payload(&record.payload),
            captured_at_ms: record.captured_at_ms,
            duration_ms: record.duration_ms,
            quality: record.quality,
        }
    }

    pub fn decode(&self) -> Result<ClipRecord, ClipError> {
        Ok(ClipRecord {
            id: self.id,
            payload: decode_payload(&self.payload)?,
            captured_at_ms: self.captured_at_ms,
            duration_ms: self.duration_ms,
            quality: self.quality,
        })
    }
}

impl Retainable for StoredClip {
    fn captured_at_ms(&self) -> i64 {
        self.captured_at_ms
    }
}

impl Retainable for ClipRecord {
    fn captured_at_ms(&self) -> i64 {
        self.captured_at_ms
    }
}

/// Result of a successful save
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Clips evicted to make room
    pub evicted: Vec<Uuid>,
    /// A clip with the same id was overwritten
    pub replaced: bool,
    /// The store was full of newer clips, so this one was not kept
    pub rejected: bool,
}

pub struct VideoStore<M> {
    medium: M,
    policy: RetentionPolicy,
    key: String,
    lock: Mutex<()>,
}

impl<M: StorageMedium> VideoStore<M> {
    pub fn new(medium: M, policy: RetentionPolicy) -> Self {
        Self::with_key(medium, policy, STORAGE_KEY)
    }

    pub fn with_key(medium: M, policy: RetentionPolicy, key: impl Into<String>) -> Self {
        Self {
            medium,
            policy,
            key: key.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Durably save a clip, evicting the oldest ones first if at capacity.
    ///
    /// The new clip competes for its slot like any other: when it is older
    /// than everything already stored at capacity it is not kept, and the
    /// outcome says so. On error nothing was written; the caller must treat
    /// the clip as unsaved.
    pub async fn save(&self, record: &ClipRecord) -> Result<SaveOutcome, ClipError> {
        let _guard = self.lock.lock().await;
        let (mut clips, _) = self.read_collection().await?;
        let mut outcome = SaveOutcome::default();

        let encoded = StoredClip::encode(record);
        if let Some(existing) = clips.iter_mut().find(|c| c.id == record.id) {
            *existing = encoded;
            outcome.replaced = true;
        } else {
            clips.push(encoded);
            while clips.len() > self.policy.capacity() {
                let Some(index) = oldest_index(&clips) else {
                    break;
                };
                let evicted = clips.remove(index);
                if evicted.id == record.id {
                    log::info!(
                        "Not keeping clip {} captured at {}: every stored clip is newer",
                        evicted.id,
                        evicted.captured_at_ms
                    );
                    outcome.rejected = true;
                } else {
                    log::info!(
                        "Evicting clip {} captured at {} to make room",
                        evicted.id,
                        evicted.captured_at_ms
                    );
                    outcome.evicted.push(evicted.id);
                }
            }
        }

        if outcome.rejected && outcome.evicted.is_empty() {
            return Ok(outcome);
        }

        self.write_collection(&clips).await?;

        assert_invariant!(
            clips.len() <= self.policy.capacity(),
            invariants::STORE_CAPACITY,
            "storage::save"
        );
        log::debug!(
            "Saved clip {} ({} bytes, {} stored)",
            record.id,
            record.size_bytes(),
            clips.len()
        );
        Ok(outcome)
    }

    /// Load every decodable clip and apply retention.
    ///
    /// Never fails: an unreadable medium yields an empty list, undecodable
    /// entries are dropped, and a failed write-back of the sweep is logged.
    pub async fn load_all(&self) -> Vec<ClipRecord> {
        self.load_all_at(epoch_ms()).await
    }

    pub async fn load_all_at(&self, now_ms: i64) -> Vec<ClipRecord> {
        let _guard = self.lock.lock().await;
        let (stored, corrupt) = match self.read_collection().await {
            Ok(read) => read,
            Err(e) => {
                log::warn!("Treating clip store as empty: {}", e);
                return Vec::new();
            }
        };

        let mut decoded = Vec::with_capacity(stored.len());
        let mut undecodable = 0;
        for clip in stored {
            match clip.decode() {
                Ok(record) => decoded.push((clip, record)),
                Err(e) => {
                    log::warn!("Dropping clip {} with corrupt payload: {}", clip.id, e);
                    undecodable += 1;
                }
            }
        }

        let (kept, mut report) = apply_retention(decoded, now_ms, &self.policy);
        report.corrupt = corrupt + undecodable;

        if !report.is_empty() {
            log::info!(
                "Retention removed {} clips ({} expired, {} over capacity, {} corrupt)",
                report.removed(),
                report.expired,
                report.over_capacity,
                report.corrupt
            );
            let survivors: Vec<StoredClip> = kept.iter().map(|(stored, _)| stored.clone()).collect();
            if let Err(e) = self.write_collection(&survivors).await {
                log::warn!("Failed to persist retention sweep: {}", e);
            }
        }

        kept.into_iter().map(|(_, record)| record).collect()
    }

    /// Remove a clip. Returns whether it existed; unknown ids are a no-op.
    pub async fn delete(&self, id: Uuid) -> Result<bool, ClipError> {
        let _guard = self.lock.lock().await;
        let (mut clips, _) = self.read_collection().await?;

        let before = clips.len();
        clips.retain(|c| c.id != id);
        if clips.len() == before {
            log::debug!("Delete of unknown clip {} ignored", id);
            return Ok(false);
        }

        self.write_collection(&clips).await?;
        log::info!("Deleted clip {}", id);
        Ok(true)
    }

    /// Apply retention to the stored collection without decoding payloads.
    pub async fn sweep(&self) -> Result<SweepReport, ClipError> {
        self.sweep_at(epoch_ms()).await
    }

    pub async fn sweep_at(&self, now_ms: i64) -> Result<SweepReport, ClipError> {
        let _guard = self.lock.lock().await;
        let (clips, corrupt) = self.read_collection().await?;

        let (kept, mut report) = apply_retention(clips, now_ms, &self.policy);
        report.corrupt = corrupt;
        if !report.is_empty() {
            self.write_collection(&kept).await?;
            log::info!("Sweep removed {} clips", report.removed());
        }
        Ok(report)
    }

    /// Number of clips currently stored, zero if the medium is unreadable
    pub async fn len(&self) -> usize {
        let _guard = self.lock.lock().await;
        self.read_collection()
            .await
            .map(|(clips, _)| clips.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Read the raw collection.
    ///
    /// Only a medium failure is an error. Unparseable contents count as an
    /// empty collection; malformed or duplicate entries are skipped and
    /// counted.
    async fn read_collection(&self) -> Result<(Vec<StoredClip>, usize), ClipError> {
        let Some(text) = self.medium.get_item(&self.key).await? else {
            return Ok((Vec::new(), 0));
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Clip collection is not a JSON array, ignoring it: {}", e);
                return Ok((Vec::new(), 0));
            }
        };

        let mut seen = HashSet::with_capacity(entries.len());
        let mut clips = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for entry in entries {
            match serde_json::from_value::<StoredClip>(entry) {
                Ok(clip) if seen.insert(clip.id) => clips.push(clip),
                Ok(clip) => {
                    log::warn!("Skipping duplicate stored clip {}", clip.id);
                    skipped += 1;
                }
                Err(e) => {
                    log::warn!("Skipping malformed stored clip: {}", e);
                    skipped += 1;
                }
            }
        }

        Ok((clips, skipped))
    }

    async fn write_collection(&self, clips: &[StoredClip]) -> Result<(), ClipError> {
        let mut ids = HashSet::with_capacity(clips.len());
        assert_invariant!(
            clips.iter().all(|c| ids.insert(c.id)),
            invariants::STORE_UNIQUE_IDS,
            "storage::write_collection"
        );

        let text = serde_json::to_string(clips)
            .map_err(|e| ClipError::StorageWrite(format!("Failed to serialize clips: {}", e)))?;
        self.medium.set_item(&self.key, &text).await
    }
}
