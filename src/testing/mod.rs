//! Testing utilities for CrabClip
//!
//! A synthetic capture device and deterministic media so the recording
//! pipeline can run without camera hardware.

pub mod device;
pub mod synthetic_data;

pub use device::{DeviceStats, SyntheticDevice, SyntheticStream};
pub use synthetic_data::{synthetic_chunk, synthetic_clip};
