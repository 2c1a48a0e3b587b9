//! lesson-player specific configuration
//!
//! `ControllerConfig` is the runtime form of `PlaybackTuning`: millisecond
//! fields become `Duration`s and the whole set is validated once up front.

use std::time::Duration;

use lesson_common::config::PlaybackTuning;

use crate::error::{Error, Result};

/// Playback controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub load_timeout: Duration,
    pub load_poll_interval: Duration,
    pub stabilization_window: Duration,
    pub watchdog_delay: Duration,
    pub recovery_cooldown: Duration,
    /// Seconds
    pub finish_tail: f64,
    pub finish_ratio: f64,
    /// Seconds
    pub replay_threshold: f64,
    /// Seconds
    pub recovery_min_position: f64,
    /// Seconds
    pub recovery_min_remaining: f64,
    /// Seconds
    pub start_epsilon: f64,
    pub default_rate: f32,
    pub min_rate: f32,
    pub max_rate: f32,
    pub event_capacity: usize,
}

impl ControllerConfig {
    /// Build from TOML tuning, rejecting invalid values
    pub fn from_tuning(tuning: &PlaybackTuning) -> Result<Self> {
        tuning.validate()?;
        Ok(Self::convert(tuning))
    }

    fn convert(tuning: &PlaybackTuning) -> Self {
        Self {
            load_timeout: Duration::from_millis(tuning.load_timeout_ms),
            load_poll_interval: Duration::from_millis(tuning.load_poll_interval_ms),
            stabilization_window: Duration::from_millis(tuning.stabilization_window_ms),
            watchdog_delay: Duration::from_millis(tuning.watchdog_delay_ms),
            recovery_cooldown: Duration::from_millis(tuning.recovery_cooldown_ms),
            finish_tail: tuning.finish_tail_secs,
            finish_ratio: tuning.finish_ratio,
            replay_threshold: tuning.replay_threshold_secs,
            recovery_min_position: tuning.recovery_min_position_secs,
            recovery_min_remaining: tuning.recovery_min_remaining_secs,
            start_epsilon: tuning.start_epsilon_secs,
            default_rate: tuning.default_rate,
            min_rate: tuning.min_rate,
            max_rate: tuning.max_rate,
            event_capacity: tuning.event_capacity,
        }
    }

    /// Check a caller-supplied rate and clamp it into the configured bounds
    pub fn sanitize_rate(&self, rate: f32) -> Result<f32> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidRate(rate));
        }
        Ok(rate.clamp(self.min_rate, self.max_rate))
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        // Built-in tuning defaults always validate (see tests)
        Self::convert(&PlaybackTuning::default())
    }
}
