//! Bootstrap configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line `--config` path
//! 2. `LESSON_PLAYER_CONFIG` environment variable
//! 3. Platform config dir (`<config_dir>/lesson-player/config.toml`)
//! 4. Built-in defaults (code constants)
//!
//! A missing config file is not an error: a warning is logged and the
//! built-in defaults are used. A file that exists but does not parse is a
//! `Config` error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LESSON_PLAYER_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Playback controller tuning (optional)
    #[serde(default)]
    pub playback: PlaybackTuning,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Timing and threshold parameters for the playback controller
///
/// Times are milliseconds unless the field name says seconds. Every field
/// has a built-in default; a TOML table may override any subset.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackTuning {
    /// Upper bound on the wait for loaded + valid duration after a source replace
    pub load_timeout_ms: u64,
    /// Snapshot poll period while waiting for readiness
    pub load_poll_interval_ms: u64,
    /// Window after a confirmed start in which raw "paused" reports are hidden from the UI
    pub stabilization_window_ms: u64,
    /// Delay before the post-play watchdog recheck
    pub watchdog_delay_ms: u64,
    /// Remaining time (seconds) at or below which an idle engine counts as finished
    pub finish_tail_secs: f64,
    /// Progress ratio at or above which an idle engine counts as finished
    pub finish_ratio: f64,
    /// `playPause` from within this many seconds of the end restarts from zero
    pub replay_threshold_secs: f64,
    /// Mid-track recovery only past this position (seconds)
    pub recovery_min_position_secs: f64,
    /// Mid-track recovery and watchdog only with more than this remaining (seconds)
    pub recovery_min_remaining_secs: f64,
    /// Positions at or below this (seconds) count as "at the start"
    pub start_epsilon_secs: f64,
    /// Minimum spacing between two reconciler-driven recoveries
    pub recovery_cooldown_ms: u64,
    pub default_rate: f32,
    pub min_rate: f32,
    pub max_rate: f32,
    /// Event bus channel capacity per controller
    pub event_capacity: usize,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            load_timeout_ms: 2000,
            load_poll_interval_ms: 50,
            stabilization_window_ms: 900,
            watchdog_delay_ms: 250,
            finish_tail_secs: 1.0,
            finish_ratio: 0.985,
            replay_threshold_secs: 0.5,
            recovery_min_position_secs: 0.3,
            recovery_min_remaining_secs: 1.0,
            start_epsilon_secs: 0.1,
            recovery_cooldown_ms: 1000,
            default_rate: 1.0,
            min_rate: 0.5,
            max_rate: 2.0,
            event_capacity: 100,
        }
    }
}

impl PlaybackTuning {
    /// Reject values that would make the controller misbehave
    pub fn validate(&self) -> Result<()> {
        if self.load_timeout_ms == 0 || self.load_poll_interval_ms == 0 {
            return Err(Error::Config(
                "load_timeout_ms and load_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.watchdog_delay_ms == 0 {
            return Err(Error::Config("watchdog_delay_ms must be positive".to_string()));
        }
        if !(self.finish_ratio > 0.0 && self.finish_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "finish_ratio must be in (0, 1], got {}",
                self.finish_ratio
            )));
        }
        let secs = [
            self.finish_tail_secs,
            self.replay_threshold_secs,
            self.recovery_min_position_secs,
            self.recovery_min_remaining_secs,
            self.start_epsilon_secs,
        ];
        if secs.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::Config(
                "second-valued thresholds must be finite and non-negative".to_string(),
            ));
        }
        if !(self.min_rate > 0.0 && self.min_rate <= self.max_rate) {
            return Err(Error::Config(format!(
                "rate bounds inverted or non-positive: [{}, {}]",
                self.min_rate, self.max_rate
            )));
        }
        if !(self.min_rate..=self.max_rate).contains(&self.default_rate) {
            return Err(Error::Config(format!(
                "default_rate {} outside [{}, {}]",
                self.default_rate, self.min_rate, self.max_rate
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.playback.validate()?;
        Ok(config)
    }

    /// Load from an explicit file path; missing or malformed files are errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load with graceful degradation
    ///
    /// `None` or a missing file falls back to defaults with a warning.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using built-in defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} does not exist, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let config = Self::load(path)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no source names a file and the platform default does
/// not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config dir
    default_config_path().filter(|p| p.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lesson-player").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let tuning = PlaybackTuning::default();
        assert!(tuning.validate().is_ok());
        assert_eq!(tuning.load_timeout_ms, 2000);
        assert_eq!(tuning.stabilization_window_ms, 900);
        assert_eq!(tuning.watchdog_delay_ms, 250);
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [playback]
            watchdog_delay_ms = 400
            max_rate = 3.0
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.watchdog_delay_ms, 400);
        assert_eq!(config.playback.max_rate, 3.0);
        assert_eq!(config.playback.finish_ratio, 0.985);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_inverted_rate_bounds_rejected() {
        let result = TomlConfig::from_toml_str(
            r#"
            [playback]
            min_rate = 2.0
            max_rate = 1.0
            default_rate = 1.5
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = TomlConfig::from_toml_str("[playback\nwatchdog_delay_ms = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_watchdog_delay_rejected() {
        let tuning = PlaybackTuning {
            watchdog_delay_ms: 0,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }
}
