//! One-shot bandwidth estimation
//!
//! Downloads the reference payload a fixed number of times, computes the
//! throughput of each round and reports the mean, mapped to a quality tier.

use std::time::Duration;
use tokio::time::Instant;

use super::probe::ProbeTransport;
use crate::config::BandwidthSettings;
use crate::errors::ClipError;
use crate::quality::QualityPolicy;
use crate::types::BandwidthSample;

/// Elapsed time below this is clamped so an instant transfer cannot divide by zero
const MIN_ROUND_TIME: Duration = Duration::from_millis(1);

/// Throughput in Mbps of `bytes` moved in `elapsed`
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.max(MIN_ROUND_TIME).as_secs_f64();
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

pub struct BandwidthEstimator<T> {
    transport: T,
    probe_url: String,
    rounds: u32,
    policy: QualityPolicy,
}

impl<T: ProbeTransport> BandwidthEstimator<T> {
    pub fn new(transport: T, settings: &BandwidthSettings) -> Self {
        Self {
            transport,
            probe_url: settings.probe_url.clone(),
            rounds: settings.rounds.max(1),
            policy: QualityPolicy::new(settings.thresholds),
        }
    }

    pub fn policy(&self) -> QualityPolicy {
        self.policy
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Run every round and report the mean throughput.
    ///
    /// The first failed round fails the whole measurement; there is no retry.
    pub async fn measure(&self) -> Result<BandwidthSample, ClipError> {
        let mut speeds = Vec::with_capacity(self.rounds as usize);

        for round in 1..=self.rounds {
            let started = Instant::now();
            let bytes = self.transport.fetch(&self.probe_url).await.map_err(|e| {
                log::warn!("Bandwidth round {}/{} failed: {}", round, self.rounds, e);
                match e {
                    ClipError::NetworkMeasurement(_) => e,
                    other => ClipError::NetworkMeasurement(other.to_string()),
                }
            })?;
            let elapsed = started.elapsed();

            let speed = throughput_mbps(bytes, elapsed);
            log::debug!(
                "Bandwidth round {}/{}: {} bytes in {:.1}ms = {:.2} Mbps",
                round,
                self.rounds,
                bytes,
                elapsed.as_secs_f64() * 1000.0,
                speed
            );
            speeds.push(speed);
        }

        let mean = speeds.iter().sum::<f64>() / speeds.len() as f64;
        let sample = BandwidthSample {
            throughput_mbps: mean,
            quality: self.policy.tier_for_throughput(mean),
        };
        log::info!(
            "Measured bandwidth {:.2} Mbps -> {}",
            sample.throughput_mbps,
            sample.quality
        );
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualityTier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves `bytes` per round after `delay`; fails on `fail_round` if set
    struct ScriptedTransport {
        bytes: u64,
        delay: Duration,
        fail_round: Option<u32>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ProbeTransport for ScriptedTransport {
        async fn fetch(&self, _url: &str) -> Result<u64, ClipError> {
            let round = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail_round == Some(round) {
                return Err(ClipError::NetworkMeasurement("connection reset".to_string()));
            }
            Ok(self.bytes)
        }
    }

    fn estimator(bytes: u64, delay_ms: u64, fail_round: Option<u32>) -> BandwidthEstimator<ScriptedTransport> {
        BandwidthEstimator::new(
            ScriptedTransport {
                bytes,
                delay: Duration::from_millis(delay_ms),
                fail_round,
                calls: AtomicU32::new(0),
            },
            &BandwidthSettings::default(),
        )
    }

    #[test]
    fn test_throughput_formula() {
        // 125 KB in 100ms = 10 Mbps
        assert!((throughput_mbps(125_000, Duration::from_millis(100)) - 10.0).abs() < 1e-9);
        // Zero elapsed is clamped to 1ms
        assert!((throughput_mbps(125, Duration::ZERO) - 1.0).abs() < 1e-9);
        assert_eq!(throughput_mbps(0, Duration::from_secs(1)), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mean_of_rounds_maps_to_tier() {
        let estimator = estimator(125_000, 100, None);
        let sample = estimator.measure().await.unwrap();
        assert!((sample.throughput_mbps - 10.0).abs() < 1e-9);
        assert_eq!(sample.quality, QualityTier::High);
        assert_eq!(estimator.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_network_is_low() {
        // 12.5 KB in 100ms = 1 Mbps
        let sample = estimator(12_500, 100, None).measure().await.unwrap();
        assert_eq!(sample.quality, QualityTier::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_round_aborts_without_retry() {
        let estimator = estimator(125_000, 100, Some(2));
        let result = estimator.measure().await;
        assert!(matches!(result, Err(ClipError::NetworkMeasurement(_))));
        assert_eq!(estimator.transport.calls.load(Ordering::SeqCst), 2);
    }
}
