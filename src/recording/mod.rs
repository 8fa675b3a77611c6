//! Clip recording
//!
//! - `device`: capture device and stream traits
//! - `session`: one in-flight capture and its chunk buffer
//! - `controller`: the state machine that owns both
//!
//! # Example
//! ```rust,ignore
//! use crabclip::recording::{RecordingController, RecordingLimits};
//!
//! let (clips_tx, mut clips_rx) = tokio::sync::mpsc::unbounded_channel();
//! let controller = RecordingController::new(device, clips_tx, RecordingLimits::default(), tier);
//! let (handle, _task) = controller.spawn();
//!
//! handle.start_recording();
//! // ...
//! handle.stop_recording();
//! let clip = clips_rx.recv().await;
//! ```

mod config;
mod controller;
mod device;
mod session;

pub use config::RecordingLimits;
pub use controller::{
    ClipSink, ControllerCommand, ControllerHandle, ControllerState, ControllerStatus,
    RecordingController,
};
pub use device::{CaptureDevice, ChunkReceiver, DeviceStream};
