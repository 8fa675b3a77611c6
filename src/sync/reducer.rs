//! Commands, effects and events
//!
//! `plan` decides what a command needs from the outside world, the container
//! runs that effect against the store, and `reduce` folds the outcome into
//! the next state. Both functions are pure.

use uuid::Uuid;

use super::state::ClipState;
use crate::types::{BandwidthSample, ClipRecord, QualityTier};

/// Requests accepted by the state container
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadClips,
    AddClip(ClipRecord),
    DeleteClip(Uuid),
    SetBandwidth(BandwidthSample),
    SetQuality(QualityTier),
}

/// Work a command needs before the state can change
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Load,
    Save(ClipRecord),
    Delete(Uuid),
    /// No I/O, apply the event directly
    Publish(Event),
}

/// Facts folded into the state
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoadStarted,
    ClipsLoaded(Vec<ClipRecord>),
    /// `rejected`: the store kept newer clips instead of this one
    ClipSaved {
        record: ClipRecord,
        evicted: Vec<Uuid>,
        rejected: bool,
    },
    SaveFailed(String),
    ClipDeleted(Uuid),
    DeleteFailed(String),
    BandwidthMeasured(BandwidthSample),
    QualitySelected(QualityTier),
}

pub fn plan(state: &ClipState, command: &Command) -> Effect {
    match command {
        Command::LoadClips => Effect::Load,
        Command::AddClip(record) => Effect::Save(record.clone()),
        Command::DeleteClip(id) => Effect::Delete(*id),
        Command::SetBandwidth(sample) => Effect::Publish(Event::BandwidthMeasured(*sample)),
        Command::SetQuality(tier) if *tier == state.selected_quality => Effect::None,
        Command::SetQuality(tier) => Effect::Publish(Event::QualitySelected(*tier)),
    }
}

pub fn reduce(state: &ClipState, event: &Event) -> ClipState {
    let mut next = state.clone();
    match event {
        Event::LoadStarted => {
            next.loading = true;
        }
        Event::ClipsLoaded(clips) => {
            next.recordings = clips.clone();
            next.loading = false;
        }
        Event::ClipSaved {
            record,
            evicted,
            rejected,
        } => {
            next.recordings
                .retain(|r| r.id != record.id && !evicted.contains(&r.id));
            if !rejected {
                next.recordings.push(record.clone());
            }
            next.error = None;
        }
        Event::SaveFailed(message) | Event::DeleteFailed(message) => {
            next.error = Some(message.clone());
        }
        Event::ClipDeleted(id) => {
            next.recordings.retain(|r| r.id != *id);
            next.error = None;
        }
        Event::BandwidthMeasured(sample) => {
            next.bandwidth = Some(*sample);
        }
        Event::QualitySelected(tier) => {
            next.selected_quality = *tier;
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_clip;

    #[test]
    fn test_plan_is_pure_routing() {
        let state = ClipState::default();
        let clip = synthetic_clip(1, QualityTier::Low);

        assert_eq!(plan(&state, &Command::LoadClips), Effect::Load);
        assert_eq!(
            plan(&state, &Command::AddClip(clip.clone())),
            Effect::Save(clip.clone())
        );
        assert_eq!(plan(&state, &Command::DeleteClip(clip.id)), Effect::Delete(clip.id));
        assert_eq!(plan(&state, &Command::SetQuality(QualityTier::Medium)), Effect::None);
        assert_eq!(
            plan(&state, &Command::SetQuality(QualityTier::High)),
            Effect::Publish(Event::QualitySelected(QualityTier::High))
        );
    }

    #[test]
    fn test_saved_clip_replaces_evicted() {
        let old = synthetic_clip(1, QualityTier::Low);
        let kept = synthetic_clip(2, QualityTier::Low);
        let state = ClipState {
            recordings: vec![old.clone(), kept.clone()],
            error: Some("earlier failure".to_string()),
            ..Default::default()
        };

        let new = synthetic_clip(3, QualityTier::High);
        let next = reduce(
            &state,
            &Event::ClipSaved {
                record: new.clone(),
                evicted: vec![old.id],
                rejected: false,
            },
        );

        assert_eq!(next.recordings, vec![kept, new]);
        assert_eq!(next.error, None);
        // Input untouched
        assert_eq!(state.recording_count(), 2);
    }

    #[test]
    fn test_resaving_same_id_does_not_duplicate() {
        let clip = synthetic_clip(5, QualityTier::Medium);
        let state = ClipState {
            recordings: vec![clip.clone()],
            ..Default::default()
        };
        let next = reduce(
            &state,
            &Event::ClipSaved {
                record: clip.clone(),
                evicted: vec![],
                rejected: false,
            },
        );
        assert_eq!(next.recording_count(), 1);
    }

    #[test]
    fn test_rejected_clip_stays_hidden() {
        let kept = synthetic_clip(10, QualityTier::Low);
        let state = ClipState {
            recordings: vec![kept.clone()],
            ..Default::default()
        };
        let next = reduce(
            &state,
            &Event::ClipSaved {
                record: synthetic_clip(1, QualityTier::Low),
                evicted: vec![],
                rejected: true,
            },
        );
        assert_eq!(next.recordings, vec![kept]);
    }

    #[test]
    fn test_failures_set_error_only() {
        let clip = synthetic_clip(5, QualityTier::Medium);
        let state = ClipState {
            recordings: vec![clip],
            ..Default::default()
        };
        let next = reduce(&state, &Event::SaveFailed("quota exceeded".to_string()));
        assert_eq!(next.error(), Some("quota exceeded"));
        assert_eq!(next.recordings, state.recordings);
    }

    #[test]
    fn test_load_cycle() {
        let state = reduce(&ClipState::default(), &Event::LoadStarted);
        assert!(state.is_loading());

        let clips = vec![synthetic_clip(1, QualityTier::Low), synthetic_clip(9, QualityTier::High)];
        let state = reduce(&state, &Event::ClipsLoaded(clips.clone()));
        assert!(!state.is_loading());
        assert_eq!(state.latest_recording(), Some(&clips[1]));
    }
}
