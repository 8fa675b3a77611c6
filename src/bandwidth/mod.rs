//! Network bandwidth estimation
//!
//! Timed downloads of a reference payload, averaged and mapped to a quality
//! tier. A single measurement per call; no background polling.

pub mod estimator;
pub mod probe;

pub use estimator::{throughput_mbps, BandwidthEstimator};
#[cfg(feature = "http-probe")]
pub use probe::{HttpProbe, CACHE_BUST_PARAM};
pub use probe::ProbeTransport;

#[cfg(feature = "http-probe")]
impl BandwidthEstimator<HttpProbe> {
    /// Estimator using the HTTP transport configured from `settings`
    pub fn http(settings: &crate::config::BandwidthSettings) -> Result<Self, crate::errors::ClipError> {
        let timeout = std::time::Duration::from_millis(settings.request_timeout_ms);
        Ok(Self::new(HttpProbe::new(timeout)?, settings))
    }
}
