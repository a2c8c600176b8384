//! Session configuration
//!
//! Every tunable has a default matching the behavior of the classic
//! rtl_watch monitor, so `WatchConfig::default()` is the normal starting
//! point. Overrides can come from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default window (seconds) inside which a repeat is a duplicate
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 2.0;

/// Default format of the decoder's `time` field
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Zone in which decoder timestamps are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneMode {
    /// Host local time (rtl_433 default output)
    #[default]
    Local,
    /// UTC (rtl_433 run with `-M time:utc`)
    Utc,
}

/// Acceptance rule used by the duplicate filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupRule {
    /// Accept only when the gap exceeds the threshold AND the device differs
    /// from the last accepted one.
    #[default]
    Literal,
    /// Accept when the gap exceeds the threshold OR the device differs.
    EitherDiffers,
}

/// Configuration for one monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Duplicate window in seconds
    pub duplicate_threshold: f64,

    /// Acceptance rule
    pub dedup_rule: DedupRule,

    /// strftime-style format of the `time` field
    pub time_format: String,

    /// Zone for interpreting `time`
    pub time_zone: TimeZoneMode,

    /// Log every accepted event at info level
    pub log_accepted: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            dedup_rule: DedupRule::Literal,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            time_zone: TimeZoneMode::Local,
            log_accepted: true,
        }
    }
}

impl WatchConfig {
    /// Create a configuration with a custom duplicate window
    pub fn with_threshold(duplicate_threshold: f64) -> Self {
        Self {
            duplicate_threshold,
            ..Default::default()
        }
    }

    /// Create a configuration interpreting timestamps as UTC
    pub fn utc() -> Self {
        Self {
            time_zone: TimeZoneMode::Utc,
            ..Default::default()
        }
    }

    /// Load overrides from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_err = |reason: String| ConfigError::Load {
            path: path.display().to_string(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let config: WatchConfig =
            serde_json::from_str(&text).map_err(|e| load_err(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all tunables are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.duplicate_threshold.is_finite() || self.duplicate_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "duplicate_threshold",
                reason: format!(
                    "must be a finite number >= 0, got {}",
                    self.duplicate_threshold
                ),
            });
        }
        if self.time_format.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "time_format",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = WatchConfig::default();
        assert_eq!(config.duplicate_threshold, 2.0);
        assert_eq!(config.dedup_rule, DedupRule::Literal);
        assert_eq!(config.time_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(config.time_zone, TimeZoneMode::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_with_threshold() {
        let config = WatchConfig::with_threshold(5.0);
        assert_eq!(config.duplicate_threshold, 5.0);
        assert_eq!(config.time_zone, TimeZoneMode::Local);
    }

    #[test]
    fn test_config_rejects_bad_threshold() {
        assert!(matches!(
            WatchConfig::with_threshold(-1.0).validate(),
            Err(ConfigError::InvalidValue {
                field: "duplicate_threshold",
                ..
            })
        ));
        assert!(WatchConfig::with_threshold(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_config_rejects_empty_format() {
        let config = WatchConfig {
            time_format: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"duplicate_threshold": 3.5, "time_zone": "utc", "dedup_rule": "either_differs"}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = WatchConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.duplicate_threshold, 3.5);
        assert_eq!(config.time_zone, TimeZoneMode::Utc);
        assert_eq!(config.dedup_rule, DedupRule::EitherDiffers);
        assert_eq!(config.time_format, DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn test_config_from_json_file_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"duplicate_threshold": -2.0}}"#).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            WatchConfig::from_json_file(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));

        assert!(matches!(
            WatchConfig::from_json_file("/nonexistent/rtlwatch.json"),
            Err(ConfigError::Load { .. })
        ));
    }
}
