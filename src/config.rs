//! Configuration management for console feedback and capture buffering
//!
//! Loaded from an optional JSON file so meter scaling and capture buffer
//! sizing can be tuned without recompiling. Every section and field falls
//! back to its default when absent.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub meter: MeterConfig,
    pub progress: ProgressConfig,
    pub capture: CaptureConfig,
}

/// Capture-mode level meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Loudness (dBFS) shown as an empty meter
    pub floor_db: f32,
    /// Meter width in characters
    pub bar_width: usize,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            floor_db: -45.0,
            bar_width: 20,
        }
    }
}

/// File-mode progress bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub bar_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { bar_width: 20 }
    }
}

/// Live capture buffering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Ring buffer capacity, in engine frames
    pub buffered_frames: usize,
    /// Sleep between ring buffer polls while waiting for a full frame
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffered_frames: 100,
            poll_interval_ms: 2,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// A missing or malformed file is logged and replaced by the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Defaults unless `path` is given.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.meter.floor_db, -45.0);
        assert_eq!(config.meter.bar_width, 20);
        assert_eq!(config.progress.bar_width, 20);
        assert_eq!(config.capture.buffered_frames, 100);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"meter": {{"floor_db": -60.0}}}}"#).unwrap();

        let config = AppConfig::load_from_file(file.path());
        assert_eq!(config.meter.floor_db, -60.0);
        assert_eq!(config.meter.bar_width, 20);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn malformed_or_missing_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert_eq!(AppConfig::load_from_file(file.path()), AppConfig::default());
        assert_eq!(
            AppConfig::load_from_file("/nonexistent/enhance.json"),
            AppConfig::default()
        );
    }
}
