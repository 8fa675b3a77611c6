//! Application wiring
//!
//! Startup order: load saved clips, probe bandwidth once, then spawn the
//! recording controller at the selected tier. A bridge task forwards every
//! later tier selection from the shared state to the controller.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bandwidth::{BandwidthEstimator, ProbeTransport};
use crate::config::CrabClipConfig;
use crate::errors::ClipError;
use crate::recording::{CaptureDevice, ControllerHandle, RecordingController, RecordingLimits};
use crate::storage::{FileMedium, RetentionPolicy, StorageMedium, VideoStore};
use crate::sync::{ClipState, ClipStateContainer, Command};
use crate::types::QualityTier;

/// Clip store over the configured root directory
pub fn open_file_store(config: &CrabClipConfig) -> VideoStore<FileMedium> {
    VideoStore::new(
        FileMedium::new(&config.storage.root_directory),
        RetentionPolicy::from(&config.storage),
    )
}

/// A running recorder: shared state plus the controller task
pub struct CrabClipApp<M> {
    state: Arc<ClipStateContainer<M>>,
    controller: ControllerHandle,
    controller_task: JoinHandle<()>,
    bridge_task: JoinHandle<()>,
}

impl<M: StorageMedium + 'static> CrabClipApp<M> {
    pub async fn start<D, T>(
        config: &CrabClipConfig,
        store: VideoStore<M>,
        device: D,
        estimator: &BandwidthEstimator<T>,
    ) -> Result<Self, ClipError>
    where
        D: CaptureDevice + 'static,
        D::Stream: 'static,
        T: ProbeTransport,
    {
        config.validate().map_err(ClipError::Config)?;

        let state = Arc::new(
            ClipStateContainer::new(store).with_fallback_mbps(config.bandwidth.fallback_mbps),
        );
        state.dispatch(Command::LoadClips).await?;
        let sample = state.measure_bandwidth(estimator).await?;
        log::info!(
            "Starting recorder at {} ({:.2} Mbps)",
            sample.quality,
            sample.throughput_mbps
        );

        let tier = state.get_state().selected_quality;
        let controller = RecordingController::new(
            device,
            Arc::clone(&state),
            RecordingLimits::from(&config.recording),
            tier,
        );
        let (controller, controller_task) = controller.spawn();
        let bridge_task = tokio::spawn(forward_quality(
            state.subscribe(),
            controller.clone(),
            tier,
        ));

        Ok(Self {
            state,
            controller,
            controller_task,
            bridge_task,
        })
    }

    pub fn state(&self) -> &Arc<ClipStateContainer<M>> {
        &self.state
    }

    pub fn snapshot(&self) -> ClipState {
        self.state.get_state()
    }

    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    pub fn start_recording(&self) {
        self.controller.start_recording();
    }

    pub fn stop_recording(&self) {
        self.controller.stop_recording();
    }

    /// Record from another camera, after the current clip if one is running
    pub fn switch_input(&self, id: impl Into<String>) {
        self.controller.switch_input(id);
    }

    /// Select a tier; the controller picks it up through the bridge
    pub async fn select_quality(&self, tier: QualityTier) -> Result<(), ClipError> {
        self.state.dispatch(Command::SetQuality(tier)).await
    }

    pub async fn delete_clip(&self, id: Uuid) -> Result<(), ClipError> {
        self.state.dispatch(Command::DeleteClip(id)).await
    }

    /// Stop the controller, discarding any session in progress
    pub async fn shutdown(self) {
        self.controller.shutdown();
        if let Err(e) = self.controller_task.await {
            log::error!("Controller task ended abnormally: {}", e);
        }
        self.bridge_task.abort();
    }
}

/// Forward tier changes from the shared state to the controller
async fn forward_quality(
    mut state: watch::Receiver<ClipState>,
    controller: ControllerHandle,
    mut current: QualityTier,
) {
    loop {
        let selected = state.borrow_and_update().selected_quality;
        if selected != current {
            log::debug!("Forwarding tier change {} -> {}", current, selected);
            controller.set_quality_tier(selected);
            current = selected;
        }
        if state.changed().await.is_err() {
            break;
        }
    }
}
