//! CrabClip: short video clip recording with bandwidth-aware quality
//!
//! This crate records clips of up to a fixed length from a capture device,
//! picks the capture quality from a one-shot network bandwidth probe, and
//! keeps a bounded, age-limited collection of clips in persistent storage.
//!
//! # Features
//! - Bandwidth estimation over repeated uncached downloads
//! - Throughput → quality tier → capture constraints policy
//! - Recording controller with a hard duration cap and deferred reconfiguration
//! - Persistent clip store with count and age retention
//! - Observable shared state with pure command planning and reduction
//!
//! # Usage
//! ```rust,ignore
//! use crabclip::{app::{open_file_store, CrabClipApp}, BandwidthEstimator, CrabClipConfig};
//! use crabclip::testing::SyntheticDevice;
//!
//! crabclip::init_logging();
//! let config = CrabClipConfig::load_or_default();
//! let estimator = BandwidthEstimator::http(&config.bandwidth)?;
//! let app = CrabClipApp::start(&config, open_file_store(&config), SyntheticDevice::new(), &estimator).await?;
//!
//! app.start_recording();
//! ```
pub mod app;
pub mod bandwidth;
pub mod config;
pub mod errors;
pub mod invariant_ppt;
pub mod quality;
pub mod recording;
pub mod storage;
pub mod sync;
pub mod timing;
pub mod types;

// Testing utilities - synthetic device for hardware-free runs
pub mod testing;

// Re-exports for convenience
pub use bandwidth::{BandwidthEstimator, ProbeTransport};
pub use config::CrabClipConfig;
pub use errors::{ClipError, ClipResult};
pub use quality::{QualityPolicy, QualityThresholds};
pub use recording::{
    CaptureDevice, ClipSink, ControllerHandle, ControllerState, ControllerStatus, DeviceStream,
    RecordingController, RecordingLimits,
};
pub use storage::{FileMedium, MemoryMedium, RetentionPolicy, StorageMedium, VideoStore};
pub use sync::{ClipState, ClipStateContainer, Command};
pub use types::{BandwidthSample, CaptureConstraints, ClipRecord, QualityTier, VideoInput};

#[cfg(feature = "http-probe")]
pub use bandwidth::HttpProbe;

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabclip=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        http_probe: cfg!(feature = "http-probe"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether the HTTP bandwidth probe is compiled in
    pub http_probe: bool,
}
