//! Configuration management for CrabClip
//!
//! Provides configuration loading, saving, and validation for recording limits,
//! bandwidth probing, and clip retention.

use crate::errors::ClipError;
use crate::quality::QualityThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrabClipConfig {
    pub recording: RecordingSettings,
    pub bandwidth: BandwidthSettings,
    pub storage: StorageSettings,
}

/// Capture session limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Hard ceiling on a single clip in milliseconds
    pub max_duration_ms: u64,
    /// Duration timer tick in milliseconds
    pub tick_interval_ms: u64,
}

/// Bandwidth probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthSettings {
    /// Reference payload downloaded on every round
    pub probe_url: String,
    /// Number of timed transfers to average
    pub rounds: u32,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Speed reported when the measurement fails
    pub fallback_mbps: f64,
    /// Tier floors
    pub thresholds: QualityThresholds,
}

/// Clip persistence and retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the clip collection
    pub root_directory: String,
    /// Maximum number of clips kept
    pub max_records: usize,
    /// Clips older than this are evicted, in milliseconds
    pub max_age_ms: u64,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            max_duration_ms: 10_000,
            tick_interval_ms: 100,
        }
    }
}

impl Default for BandwidthSettings {
    fn default() -> Self {
        Self {
            probe_url:
                "https://upload.wikimedia.org/wikipedia/commons/thumb/c/c9/Moon.jpg/220px-Moon.jpg"
                    .to_string(),
            rounds: 3,
            request_timeout_ms: 10_000,
            fallback_mbps: 0.0,
            thresholds: QualityThresholds::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root_directory: "./clips".to_string(),
            max_records: 10,
            max_age_ms: 30 * DAY_MS,
        }
    }
}

impl Default for CrabClipConfig {
    fn default() -> Self {
        Self {
            recording: RecordingSettings::default(),
            bandwidth: BandwidthSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl CrabClipConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClipError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ClipError::Config(format!("Failed to read config file: {}", e)))?;

        let config: CrabClipConfig = toml::from_str(&contents)
            .map_err(|e| ClipError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(ClipError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ClipError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ClipError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ClipError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ClipError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabclip.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.recording.max_duration_ms == 0 {
            return Err("Maximum recording duration must be positive".to_string());
        }
        if self.recording.tick_interval_ms == 0 {
            return Err("Tick interval must be positive".to_string());
        }
        if self.recording.tick_interval_ms > self.recording.max_duration_ms {
            return Err("Tick interval must not exceed maximum duration".to_string());
        }

        if self.bandwidth.rounds == 0 || self.bandwidth.rounds > 20 {
            return Err("Bandwidth rounds must be between 1 and 20".to_string());
        }
        if self.bandwidth.probe_url.trim().is_empty() {
            return Err("Probe URL must not be empty".to_string());
        }
        if self.bandwidth.request_timeout_ms == 0 {
            return Err("Probe request timeout must be positive".to_string());
        }
        if !self.bandwidth.fallback_mbps.is_finite() || self.bandwidth.fallback_mbps < 0.0 {
            return Err("Fallback speed must be a non-negative number".to_string());
        }
        self.bandwidth.thresholds.validate()?;

        if self.storage.max_records == 0 {
            return Err("Maximum record count must be positive".to_string());
        }
        if self.storage.max_age_ms == 0 {
            return Err("Maximum clip age must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrabClipConfig::default();
        assert_eq!(config.recording.max_duration_ms, 10_000);
        assert_eq!(config.recording.tick_interval_ms, 100);
        assert_eq!(config.bandwidth.rounds, 3);
        assert_eq!(config.storage.max_records, 10);
        assert_eq!(config.storage.max_age_ms, 30 * DAY_MS);
    }

    #[test]
    fn test_config_validation() {
        let config = CrabClipConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_rounds = config.clone();
        bad_rounds.bandwidth.rounds = 0;
        assert!(bad_rounds.validate().is_err());

        let mut bad_storage = CrabClipConfig::default();
        bad_storage.storage.max_records = 0;
        assert!(bad_storage.validate().is_err());

        let mut bad_tick = CrabClipConfig::default();
        bad_tick.recording.tick_interval_ms = 20_000;
        assert!(bad_tick.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("crabclip.toml");

        let mut config = CrabClipConfig::default();
        config.storage.max_records = 4;
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = CrabClipConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_format() {
        let config = CrabClipConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("[bandwidth]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("max_duration_ms"));
        assert!(toml_string.contains("medium_floor_mbps"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut config = CrabClipConfig::default();
        config.storage.max_age_ms = 0;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let result = CrabClipConfig::load_from_file(&path);
        assert!(matches!(result, Err(ClipError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = CrabClipConfig::load_from_file("nonexistent_crabclip.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().recording.max_duration_ms, 10_000);
    }
}
