//! Recording controller
//!
//! Owns the device stream and at most one capture session, and drives the
//! `Idle -> Armed -> Recording -> Finalizing -> Idle` cycle. The controller
//! can be driven directly (every operation is an `async fn` on `&mut self`)
//! or spawned as a task and driven through a [`ControllerHandle`].

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::RecordingLimits;
use super::device::{CaptureDevice, DeviceStream};
use super::session::CaptureSession;
use crate::assert_invariant;
use crate::errors::ClipError;
use crate::invariant_ppt::invariants;
use crate::types::{ClipRecord, QualityTier, VideoInput};

/// Where finalized clips go
#[async_trait]
pub trait ClipSink: Send + Sync {
    async fn clip_finalized(&self, record: ClipRecord) -> Result<(), ClipError>;
}

#[async_trait]
impl<S: ClipSink + ?Sized> ClipSink for Arc<S> {
    async fn clip_finalized(&self, record: ClipRecord) -> Result<(), ClipError> {
        (**self).clip_finalized(record).await
    }
}

#[async_trait]
impl ClipSink for mpsc::UnboundedSender<ClipRecord> {
    async fn clip_finalized(&self, record: ClipRecord) -> Result<(), ClipError> {
        self.send(record)
            .map_err(|_| ClipError::InvalidState("Clip receiver dropped".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// No usable stream
    Idle,
    /// Stream acquired, ready to record
    Armed,
    Recording,
    /// Sink closed, clip being assembled
    Finalizing,
}

/// Snapshot published on every state change and tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    /// Tier of the current stream or session
    pub tier: QualityTier,
    /// Tier to apply once the current session ends
    pub pending_tier: Option<QualityTier>,
    /// Camera selected through `switch_input`, `None` for the device default
    pub input: Option<String>,
    /// Camera to switch to once the current session ends
    pub pending_input: Option<String>,
    pub elapsed_ms: u64,
    /// Elapsed time as a fraction of the maximum duration
    pub progress: f64,
    /// Most recent device error, cleared by a successful arm
    pub last_error: Option<String>,
}

impl ControllerStatus {
    fn idle(tier: QualityTier) -> Self {
        Self {
            state: ControllerState::Idle,
            tier,
            pending_tier: None,
            input: None,
            pending_input: None,
            elapsed_ms: 0,
            progress: 0.0,
            last_error: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == ControllerState::Recording
    }
}

pub struct RecordingController<D: CaptureDevice, S> {
    device: D,
    sink: S,
    limits: RecordingLimits,
    state: ControllerState,
    tier: QualityTier,
    pending_tier: Option<QualityTier>,
    input: Option<String>,
    pending_input: Option<String>,
    stream: Option<D::Stream>,
    session: Option<CaptureSession>,
    last_error: Option<String>,
    status_tx: watch::Sender<ControllerStatus>,
}

impl<D: CaptureDevice, S: ClipSink> RecordingController<D, S> {
    pub fn new(device: D, sink: S, limits: RecordingLimits, tier: QualityTier) -> Self {
        let (status_tx, _) = watch::channel(ControllerStatus::idle(tier));
        Self {
            device,
            sink,
            limits,
            state: ControllerState::Idle,
            tier,
            pending_tier: None,
            input: None,
            pending_input: None,
            stream: None,
            session: None,
            last_error: None,
            status_tx,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn limits(&self) -> RecordingLimits {
        self.limits
    }

    pub fn status(&self) -> ControllerStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status_tx.subscribe()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn publish(&self) {
        let (elapsed_ms, tier) = match &self.session {
            Some(session) => (session.elapsed_ms(), session.tier()),
            None => (0, self.tier),
        };
        let status = ControllerStatus {
            state: self.state,
            tier,
            pending_tier: self.pending_tier,
            input: self.input.clone(),
            pending_input: self.pending_input.clone(),
            elapsed_ms,
            progress: self.limits.progress(elapsed_ms),
            last_error: self.last_error.clone(),
        };
        self.status_tx.send_replace(status);
    }

    async fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release().await;
            log::debug!("Released device stream");
        }
    }

    /// Acquire a stream for the current tier, releasing any previous one first.
    ///
    /// On failure the controller stays `Idle` with the error recorded in its
    /// status; arming again retries.
    pub async fn arm(&mut self) -> Result<(), ClipError> {
        if self.session.is_some() {
            return Err(ClipError::InvalidState(
                "Cannot re-arm while a session is active".to_string(),
            ));
        }

        self.release_stream().await;
        self.state = ControllerState::Idle;

        let constraints = self.tier.constraints();
        match self.device.acquire(constraints).await {
            Ok(stream) => {
                log::info!("Device armed at {} ({})", self.tier, constraints);
                self.stream = Some(stream);
                self.state = ControllerState::Armed;
                self.last_error = None;
                self.publish();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to acquire device at {}: {}", constraints, e);
                let e = match e {
                    ClipError::Device(_) => e,
                    other => ClipError::Device(other.to_string()),
                };
                self.last_error = Some(e.to_string());
                self.publish();
                Err(e)
            }
        }
    }

    /// Change the capture tier.
    ///
    /// Outside a session the device is re-armed immediately. During a session
    /// the change is queued and applied once the clip is finalized; the
    /// running session keeps the tier it started with.
    pub async fn set_quality_tier(&mut self, tier: QualityTier) -> Result<(), ClipError> {
        if self.session.is_some() {
            log::info!("Quality change to {} deferred until the session ends", tier);
            self.pending_tier = Some(tier);
            self.publish();
            return Ok(());
        }

        if tier == self.tier && self.state == ControllerState::Armed {
            log::debug!("Already armed at {}", tier);
            return Ok(());
        }

        log::info!("Reconfiguring device: {} -> {}", self.tier, tier);
        self.tier = tier;
        self.arm().await
    }

    /// Cameras the device can record from
    pub async fn list_inputs(&mut self) -> Result<Vec<VideoInput>, ClipError> {
        self.device.list_inputs().await
    }

    /// Record from another camera.
    ///
    /// Follows the same rules as a tier change: immediate outside a session,
    /// queued until finalization during one. An unknown id fails with
    /// `Device` and leaves the current stream untouched.
    pub async fn switch_input(&mut self, id: &str) -> Result<(), ClipError> {
        if self.session.is_some() {
            log::info!("Camera switch to {} deferred until the session ends", id);
            self.pending_input = Some(id.to_string());
            self.publish();
            return Ok(());
        }

        if self.input.as_deref() == Some(id) && self.state == ControllerState::Armed {
            log::debug!("Already recording from {}", id);
            return Ok(());
        }

        self.device.select_input(id)?;
        log::info!("Switching camera to {}", id);
        self.input = Some(id.to_string());
        self.arm().await
    }

    /// Begin a capture session.
    ///
    /// A no-op while already recording. Fails with `InvalidState` when no
    /// stream is armed.
    pub async fn start_recording(&mut self) -> Result<(), ClipError> {
        match self.state {
            ControllerState::Recording | ControllerState::Finalizing => {
                log::warn!("start_recording ignored: session already in progress");
                return Ok(());
            }
            ControllerState::Idle => {
                return Err(ClipError::InvalidState("Device is not armed".to_string()));
            }
            ControllerState::Armed => {}
        }

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ClipError::InvalidState("Armed without a stream".to_string()))?;

        let chunks = match stream.open_sink() {
            Ok(chunks) => chunks,
            Err(e) => {
                log::error!("Failed to open capture sink: {}", e);
                self.release_stream().await;
                self.state = ControllerState::Idle;
                self.last_error = Some(e.to_string());
                self.publish();
                return Err(e);
            }
        };

        assert_invariant!(
            self.session.is_none(),
            invariants::SINGLE_SESSION,
            "RecordingController::start_recording"
        );
        self.session = Some(CaptureSession::begin(
            self.tier,
            chunks,
            self.limits.tick_interval(),
        ));
        self.state = ControllerState::Recording;
        log::info!(
            "Recording started at {} (max {}ms)",
            self.tier,
            self.limits.max_duration_ms
        );
        self.publish();
        Ok(())
    }

    /// Buffer a chunk delivered by the stream; dropped outside a session
    pub fn push_chunk(&mut self, chunk: Bytes) {
        match (&mut self.session, self.state) {
            (Some(session), ControllerState::Recording) => session.append(chunk),
            _ => log::trace!("Dropping {} byte chunk outside a session", chunk.len()),
        }
    }

    /// Sample elapsed time; stops the session once the maximum is reached.
    ///
    /// Returns the finalized clip when this tick forced the stop.
    pub async fn tick(&mut self) -> Result<Option<ClipRecord>, ClipError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        if self.state != ControllerState::Recording {
            return Ok(None);
        }

        let elapsed = session.sample_elapsed();
        if self.limits.is_exhausted(elapsed) {
            log::info!("Maximum duration reached after {}ms", elapsed);
            return self.stop_recording().await;
        }

        self.publish();
        Ok(None)
    }

    /// Stop the session, assemble the clip and hand it to the sink.
    ///
    /// The controller is back to `Idle` (and re-armed at the pending or
    /// current tier) whether or not the sink accepts the clip. A sink failure
    /// is returned; the clip is not retained here. A no-op outside a session.
    pub async fn stop_recording(&mut self) -> Result<Option<ClipRecord>, ClipError> {
        if self.state != ControllerState::Recording {
            log::debug!("stop_recording ignored in state {:?}", self.state);
            return Ok(None);
        }
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        let stopped_at = Instant::now();
        self.state = ControllerState::Finalizing;
        self.publish();

        let final_chunk = match self.stream.as_mut() {
            Some(stream) => stream.close_sink().await,
            None => None,
        };
        session.seal(final_chunk);

        let chunk_count = session.chunk_count();
        let record = session.finalize(stopped_at);
        log::info!(
            "Recording finalized: {} ({} chunks, {} bytes, {}ms at {})",
            record.id,
            chunk_count,
            record.size_bytes(),
            record.duration_ms,
            record.quality
        );

        self.release_stream().await;
        self.state = ControllerState::Idle;
        self.publish();

        let emitted = self.sink.clip_finalized(record.clone()).await;
        if let Err(e) = &emitted {
            log::error!("Clip {} was not accepted: {}", record.id, e);
        }

        if let Some(tier) = self.pending_tier.take() {
            self.tier = tier;
        }
        if let Some(id) = self.pending_input.take() {
            match self.device.select_input(&id) {
                Ok(()) => self.input = Some(id),
                Err(e) => log::warn!("Deferred camera switch failed: {}", e),
            }
        }
        if let Err(e) = self.arm().await {
            log::warn!("Re-arm after recording failed: {}", e);
        }

        emitted.map(|_| Some(record))
    }

    /// Discard any partial session and release the device
    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(stream) = self.stream.as_mut() {
                let _ = stream.close_sink().await;
            }
            session.seal(None);
            log::info!(
                "Discarding partial recording ({} chunks, {} bytes)",
                session.chunk_count(),
                session.buffered_bytes()
            );
        }
        self.pending_tier = None;
        self.pending_input = None;
        self.release_stream().await;
        self.state = ControllerState::Idle;
        self.publish();
        log::info!("Recording controller shut down");
    }
}

/// Commands accepted by a spawned controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    Arm,
    Start,
    Stop,
    SetQuality(QualityTier),
    SwitchInput(String),
    Shutdown,
}

enum LoopEvent {
    Command(Option<ControllerCommand>),
    Chunk(Option<Bytes>),
    Tick,
}

impl<D, S> RecordingController<D, S>
where
    D: CaptureDevice + 'static,
    D::Stream: 'static,
    S: ClipSink + 'static,
{
    /// Run the controller on its own task.
    ///
    /// The task arms the device first, then serves commands until
    /// [`ControllerHandle::shutdown`] or until every handle is dropped.
    pub fn spawn(self) -> (ControllerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ControllerHandle {
            commands: tx,
            status: self.subscribe(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ControllerCommand>) {
        if let Err(e) = self.arm().await {
            log::warn!("Initial arm failed: {}", e);
        }

        loop {
            let event = match self.session.as_mut() {
                Some(session) => {
                    let chunks_open = session.chunks_open;
                    tokio::select! {
                        biased;
                        command = commands.recv() => LoopEvent::Command(command),
                        chunk = session.chunks.recv(), if chunks_open => LoopEvent::Chunk(chunk),
                        _ = session.ticker.tick() => LoopEvent::Tick,
                    }
                }
                None => LoopEvent::Command(commands.recv().await),
            };

            match event {
                LoopEvent::Command(None) | LoopEvent::Command(Some(ControllerCommand::Shutdown)) => {
                    self.shutdown().await;
                    break;
                }
                LoopEvent::Command(Some(command)) => self.handle_command(command).await,
                LoopEvent::Chunk(Some(chunk)) => self.push_chunk(chunk),
                LoopEvent::Chunk(None) => {
                    log::warn!("Device closed the chunk sink mid-session");
                    if let Some(session) = self.session.as_mut() {
                        session.chunks_open = false;
                    }
                }
                LoopEvent::Tick => {
                    if let Err(e) = self.tick().await {
                        log::debug!("Tick-driven stop reported: {}", e);
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: ControllerCommand) {
        let result = match &command {
            ControllerCommand::Arm => self.arm().await,
            ControllerCommand::Start => self.start_recording().await,
            ControllerCommand::Stop => self.stop_recording().await.map(|_| ()),
            ControllerCommand::SetQuality(tier) => self.set_quality_tier(*tier).await,
            ControllerCommand::SwitchInput(id) => self.switch_input(id).await,
            ControllerCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("{:?} failed: {}", command, e);
        }
    }
}

/// Cloneable front end for a spawned controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<ControllerCommand>,
    status: watch::Receiver<ControllerStatus>,
}

impl ControllerHandle {
    fn send(&self, command: ControllerCommand) {
        if let Err(rejected) = self.commands.send(command) {
            log::debug!("Controller gone; dropped {:?}", rejected.0);
        }
    }

    pub fn start_recording(&self) {
        self.send(ControllerCommand::Start);
    }

    pub fn stop_recording(&self) {
        self.send(ControllerCommand::Stop);
    }

    pub fn set_quality_tier(&self, tier: QualityTier) {
        self.send(ControllerCommand::SetQuality(tier));
    }

    pub fn switch_input(&self, id: impl Into<String>) {
        self.send(ControllerCommand::SwitchInput(id.into()));
    }

    /// Try to acquire the device again after a failure
    pub fn retry_arm(&self) {
        self.send(ControllerCommand::Arm);
    }

    pub fn shutdown(&self) {
        self.send(ControllerCommand::Shutdown);
    }

    /// Latest published status
    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    /// Wait until the published status satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ControllerStatus, ClipError>
    where
        F: FnMut(&ControllerStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|status| predicate(status))
            .await
            .map_err(|_| ClipError::InvalidState("Controller stopped".to_string()))?;
        Ok(status.clone())
    }
}
