//! Synthetic capture device
//!
//! Produces one deterministic chunk per interval while the sink is open.
//! Counters are shared through [`DeviceStats`] so they stay observable after
//! the device has been moved into a controller.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::synthetic_data::synthetic_chunk;
use crate::errors::ClipError;
use crate::recording::{CaptureDevice, ChunkReceiver, DeviceStream};
use crate::types::{CaptureConstraints, VideoInput};

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    max_live: AtomicUsize,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
    fail_next: AtomicUsize,
    last_constraints: Mutex<Option<CaptureConstraints>>,
    last_input: Mutex<Option<String>>,
}

/// Shared view of a synthetic device's activity
#[derive(Debug, Clone, Default)]
pub struct DeviceStats {
    inner: Arc<Counters>,
}

impl DeviceStats {
    /// Streams currently held
    pub fn live_handles(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Highest number of streams ever held at once
    pub fn max_live_handles(&self) -> usize {
        self.inner.max_live.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.inner.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.inner.releases.load(Ordering::SeqCst)
    }

    /// Constraints of the most recent successful acquisition
    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.inner.last_constraints.lock().ok().and_then(|c| *c)
    }

    /// Camera id of the most recent successful acquisition
    pub fn last_input(&self) -> Option<String> {
        self.inner.last_input.lock().ok().and_then(|i| i.clone())
    }

    /// Make the next `count` acquisitions fail as if permission was denied
    pub fn fail_next_acquisitions(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn on_acquire(&self, constraints: CaptureConstraints, input: &VideoInput) {
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_live.fetch_max(live, Ordering::SeqCst);
        self.inner.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.inner.last_constraints.lock() {
            *last = Some(constraints);
        }
        if let Ok(mut last) = self.inner.last_input.lock() {
            *last = Some(input.id.clone());
        }
    }

    fn on_release(&self) {
        self.inner.live.fetch_sub(1, Ordering::SeqCst);
        self.inner.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Camera stand-in for tests and the CLI
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    stats: DeviceStats,
    chunk_interval: Duration,
    chunk_size: usize,
    acquire_delay: Duration,
    release_delay: Duration,
    inputs: Vec<VideoInput>,
    selected: usize,
}

impl SyntheticDevice {
    pub fn new() -> Self {
        Self {
            stats: DeviceStats::default(),
            inputs: vec![
                VideoInput::new("synthetic-front", "Synthetic front camera"),
                VideoInput::new("synthetic-back", "Synthetic back camera"),
            ],
            selected: 0,
            chunk_interval: Duration::from_millis(100),
            chunk_size: 256,
            acquire_delay: Duration::ZERO,
            release_delay: Duration::ZERO,
        }
    }

    pub fn with_chunk_interval(mut self, interval: Duration) -> Self {
        self.chunk_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Simulated time to open the hardware
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Simulated time for the hardware to become free again
    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }

    /// Replace the attached cameras; the first becomes the selected one
    pub fn with_inputs(mut self, inputs: Vec<VideoInput>) -> Self {
        self.inputs = inputs;
        self.selected = 0;
        self
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats.clone()
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticDevice {
    type Stream = SyntheticStream;

    async fn acquire(&mut self, constraints: CaptureConstraints) -> Result<SyntheticStream, ClipError> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        if self.stats.take_failure() {
            return Err(ClipError::Device("Camera permission denied".to_string()));
        }

        let input = self
            .inputs
            .get(self.selected)
            .ok_or_else(|| ClipError::Device("No camera attached".to_string()))?;

        self.stats.on_acquire(constraints, input);
        log::debug!("Synthetic device acquired {} at {}", input, constraints);

        Ok(SyntheticStream {
            constraints,
            stats: self.stats.clone(),
            chunk_interval: self.chunk_interval,
            chunk_size: self.chunk_size,
            release_delay: self.release_delay,
            producer: None,
            released: false,
        })
    }

    async fn list_inputs(&mut self) -> Result<Vec<VideoInput>, ClipError> {
        Ok(self.inputs.clone())
    }

    fn select_input(&mut self, id: &str) -> Result<(), ClipError> {
        let index = self
            .inputs
            .iter()
            .position(|input| input.id == id)
            .ok_or_else(|| ClipError::Device(format!("Unknown camera: {}", id)))?;
        self.selected = index;
        Ok(())
    }
}

struct Producer {
    stop: oneshot::Sender<()>,
    task: JoinHandle<u64>,
}

/// Live handle on a [`SyntheticDevice`]
pub struct SyntheticStream {
    constraints: CaptureConstraints,
    stats: DeviceStats,
    chunk_interval: Duration,
    chunk_size: usize,
    release_delay: Duration,
    producer: Option<Producer>,
    released: bool,
}

#[async_trait]
impl DeviceStream for SyntheticStream {
    fn constraints(&self) -> CaptureConstraints {
        self.constraints
    }

    fn open_sink(&mut self) -> Result<ChunkReceiver, ClipError> {
        if self.released {
            return Err(ClipError::Device("Stream already released".to_string()));
        }
        if self.producer.is_some() {
            return Err(ClipError::InvalidState("Sink already open".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let interval = self.chunk_interval;
        let size = self.chunk_size;

        let task = tokio::spawn(async move {
            let mut seq = 0u64;
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if tx.send(synthetic_chunk(seq, size)).is_err() {
                            break;
                        }
                        seq += 1;
                    }
                }
            }
            seq
        });

        self.producer = Some(Producer {
            stop: stop_tx,
            task,
        });
        Ok(rx)
    }

    async fn close_sink(&mut self) -> Option<Bytes> {
        let producer = self.producer.take()?;
        let _ = producer.stop.send(());
        let produced = producer.task.await.unwrap_or(0);
        Some(synthetic_chunk(produced, self.chunk_size / 2))
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(producer) = self.producer.take() {
            producer.task.abort();
        }
        if !self.release_delay.is_zero() {
            tokio::time::sleep(self.release_delay).await;
        }
        self.released = true;
        self.stats.on_release();
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.task.abort();
        }
        if !self.released {
            self.stats.on_release();
        }
    }
}
