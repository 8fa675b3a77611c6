//! Capture device abstraction
//!
//! A device hands out at most one live stream at a time; the controller owns
//! that stream exclusively and releases it before acquiring another.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::errors::ClipError;
use crate::types::{CaptureConstraints, VideoInput};

/// Receiving end of a stream's chunked capture sink
pub type ChunkReceiver = mpsc::UnboundedReceiver<Bytes>;

/// Source of live camera/microphone streams
#[async_trait]
pub trait CaptureDevice: Send {
    type Stream: DeviceStream;

    /// Acquire a live stream honoring `constraints`.
    ///
    /// Fails with `ClipError::Device` when the hardware is missing or
    /// permission is denied.
    async fn acquire(&mut self, constraints: CaptureConstraints) -> Result<Self::Stream, ClipError>;

    /// Cameras currently attached, the default one first
    async fn list_inputs(&mut self) -> Result<Vec<VideoInput>, ClipError>;

    /// Choose the camera later acquisitions open. A live stream keeps the
    /// camera it was acquired from.
    ///
    /// Fails with `ClipError::Device` for an unknown id.
    fn select_input(&mut self, id: &str) -> Result<(), ClipError>;
}

/// A live device stream
#[async_trait]
pub trait DeviceStream: Send {
    /// Constraints the stream was acquired with
    fn constraints(&self) -> CaptureConstraints;

    /// Start chunked capture. Encoded chunks arrive on the returned receiver
    /// until the sink is closed.
    fn open_sink(&mut self) -> Result<ChunkReceiver, ClipError>;

    /// Stop chunked capture and return the final flushed chunk, if any.
    /// No chunk is sent on the receiver after this returns.
    async fn close_sink(&mut self) -> Option<Bytes>;

    /// Release the underlying device. Completes once the hardware is free.
    async fn release(&mut self);
}
