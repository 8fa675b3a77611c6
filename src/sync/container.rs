//! The state owner
//!
//! Serializes commands, runs their effects against the store and publishes
//! every new state on a `watch` channel.

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::reducer::{plan, reduce, Command, Effect, Event};
use super::state::ClipState;
use crate::bandwidth::{BandwidthEstimator, ProbeTransport};
use crate::errors::ClipError;
use crate::recording::ClipSink;
use crate::storage::{StorageMedium, VideoStore};
use crate::types::{BandwidthSample, ClipRecord, QualityTier};

pub struct ClipStateContainer<M> {
    store: VideoStore<M>,
    state: watch::Sender<ClipState>,
    dispatch_lock: Mutex<()>,
    fallback_mbps: f64,
}

impl<M: StorageMedium> ClipStateContainer<M> {
    pub fn new(store: VideoStore<M>) -> Self {
        let (state, _) = watch::channel(ClipState::default());
        Self {
            store,
            state,
            dispatch_lock: Mutex::new(()),
            fallback_mbps: 0.0,
        }
    }

    /// Throughput reported when a bandwidth measurement fails
    pub fn with_fallback_mbps(mut self, fallback_mbps: f64) -> Self {
        self.fallback_mbps = fallback_mbps;
        self
    }

    pub fn store(&self) -> &VideoStore<M> {
        &self.store
    }

    /// Snapshot of the current state
    pub fn get_state(&self) -> ClipState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every published state
    pub fn subscribe(&self) -> watch::Receiver<ClipState> {
        self.state.subscribe()
    }

    fn apply(&self, event: Event) {
        self.state.send_modify(|state| *state = reduce(state, &event));
    }

    /// Run one command to completion.
    ///
    /// Store failures are recorded in the state's `error` and also returned.
    pub async fn dispatch(&self, command: Command) -> Result<(), ClipError> {
        let _guard = self.dispatch_lock.lock().await;

        match plan(&self.get_state(), &command) {
            Effect::None => Ok(()),
            Effect::Publish(event) => {
                self.apply(event);
                Ok(())
            }
            Effect::Load => {
                self.apply(Event::LoadStarted);
                let clips = self.store.load_all().await;
                log::info!("Loaded {} saved clips", clips.len());
                self.apply(Event::ClipsLoaded(clips));
                Ok(())
            }
            Effect::Save(record) => match self.store.save(&record).await {
                Ok(outcome) => {
                    if outcome.rejected {
                        log::warn!("Clip {} is older than every stored clip, dropped", record.id);
                    }
                    self.apply(Event::ClipSaved {
                        record,
                        evicted: outcome.evicted,
                        rejected: outcome.rejected,
                    });
                    Ok(())
                }
                Err(e) => {
                    log::error!("Failed to save clip {}: {}", record.id, e);
                    self.apply(Event::SaveFailed(e.to_string()));
                    Err(e)
                }
            },
            Effect::Delete(id) => match self.store.delete(id).await {
                Ok(found) => {
                    if !found {
                        log::debug!("Delete of unknown clip {} ignored", id);
                    }
                    self.apply(Event::ClipDeleted(id));
                    Ok(())
                }
                Err(e) => {
                    log::error!("Failed to delete clip {}: {}", id, e);
                    self.apply(Event::DeleteFailed(e.to_string()));
                    Err(e)
                }
            },
        }
    }

    /// Measure once and publish the result.
    ///
    /// A failed measurement falls back to `Medium` at the configured
    /// fallback throughput.
    pub async fn measure_bandwidth<T: ProbeTransport>(
        &self,
        estimator: &BandwidthEstimator<T>,
    ) -> Result<BandwidthSample, ClipError> {
        let sample = match estimator.measure().await {
            Ok(sample) => sample,
            Err(e) => {
                log::warn!(
                    "Bandwidth measurement failed, using {}: {}",
                    QualityTier::Medium,
                    e
                );
                BandwidthSample {
                    throughput_mbps: self.fallback_mbps,
                    quality: QualityTier::Medium,
                }
            }
        };

        self.dispatch(Command::SetBandwidth(sample)).await?;
        self.dispatch(Command::SetQuality(sample.quality)).await?;
        Ok(sample)
    }
}

#[async_trait]
impl<M: StorageMedium> ClipSink for ClipStateContainer<M> {
    /// Saved first, visible second: a clip that fails to save never appears
    async fn clip_finalized(&self, record: ClipRecord) -> Result<(), ClipError> {
        self.dispatch(Command::AddClip(record)).await
    }
}
