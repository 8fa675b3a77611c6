//! One in-flight capture
//!
//! Created when recording starts and consumed when it stops. Dropping a
//! session discards every buffered chunk and cancels its ticker.

use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use super::device::ChunkReceiver;
use crate::assert_invariant;
use crate::invariant_ppt::invariants;
use crate::timing::SessionClock;
use crate::types::{ClipRecord, QualityTier};

pub(crate) struct CaptureSession {
    clock: SessionClock,
    tier: QualityTier,
    buffer: Vec<Bytes>,
    buffered_bytes: usize,
    elapsed_ms: u64,
    pub(crate) chunks: ChunkReceiver,
    pub(crate) chunks_open: bool,
    pub(crate) ticker: Interval,
}

impl CaptureSession {
    /// Start a session now. The tier is frozen for the session's lifetime.
    pub fn begin(tier: QualityTier, chunks: ChunkReceiver, tick: Duration) -> Self {
        let clock = SessionClock::start();
        let mut ticker = tokio::time::interval_at(clock.start_instant() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            clock,
            tier,
            buffer: Vec::new(),
            buffered_bytes: 0,
            elapsed_ms: 0,
            chunks,
            chunks_open: true,
            ticker,
        }
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    #[cfg(test)]
    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Last sampled elapsed time
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn chunk_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Re-read the clock and return the new elapsed time
    pub fn sample_elapsed(&mut self) -> u64 {
        self.elapsed_ms = self.clock.elapsed_ms();
        self.elapsed_ms
    }

    /// Buffer a chunk; empty chunks are ignored
    pub fn append(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.buffered_bytes += chunk.len();
        self.buffer.push(chunk);
    }

    /// Stop accepting chunks, keep everything delivered before the close and
    /// then the final flushed chunk.
    pub fn seal(&mut self, final_chunk: Option<Bytes>) {
        self.chunks.close();
        self.chunks_open = false;
        while let Ok(chunk) = self.chunks.try_recv() {
            self.append(chunk);
        }
        if let Some(chunk) = final_chunk {
            self.append(chunk);
        }
    }

    /// Turn the buffered chunks into a clip stopped at `stopped_at`
    pub fn finalize(self, stopped_at: Instant) -> ClipRecord {
        let duration_ms = self.clock.elapsed_ms_at(stopped_at);
        let captured_at_ms = self.clock.epoch_ms_at(stopped_at);
        assert_invariant!(
            captured_at_ms - self.clock.start_epoch_ms() == duration_ms as i64
                && stopped_at.saturating_duration_since(self.clock.start_instant()).as_millis() as u64
                    == duration_ms,
            invariants::DURATION_MATCHES_CLOCK,
            "CaptureSession::finalize"
        );

        let mut payload = BytesMut::with_capacity(self.buffered_bytes);
        for chunk in &self.buffer {
            payload.extend_from_slice(chunk);
        }

        ClipRecord {
            id: Uuid::new_v4(),
            payload: payload.freeze(),
            captured_at_ms,
            duration_ms,
            quality: self.tier,
        }
    }
}
