//! Status reconciliation
//!
//! Pure decision logic: given one raw engine status, the current intent and
//! the controller's timers, decide what the UI should show and what, if
//! anything, the controller must do about it. No engine access, no clock
//! access; `timers.now` is the only notion of time.
//!
//! **Decisions:**
//! - UI playing flag, with raw "paused" hidden during the start-stabilization
//!   window while the engine is still at zero with no duration
//! - Finish detection from `just_finished` or near-end idle, gated by the latch
//! - Mid-track recovery when the engine stalls while intent says playing
//! - Deferred rate application once loaded + playing is confirmed

use crate::config::ControllerConfig;
use crate::engine::RawStatus;

use super::state::{ControllerTimers, FinishLatch, Intent};

/// Self-healing action requested by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    None,
    /// Reapply rate, then play
    Resume,
}

/// Outcome of reconciling one status update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    pub ui_playing: bool,
    pub ui_loading: bool,
    pub fire_finish: bool,
    pub recovery: Recovery,
    /// Rate to hand to the engine now that playback is confirmed
    pub apply_rate: Option<f32>,
    /// Raw status reports paused but the UI keeps showing playing
    pub suppressed_pause: bool,
}

/// Stateless reconciler bound to one configuration
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ControllerConfig,
}

impl Reconciler {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Reconcile one status update
    ///
    /// `sent_rate` is the last rate handed to the engine, `None` when the
    /// desired rate still has to be applied.
    pub fn reconcile(
        &self,
        status: &RawStatus,
        intent: &Intent,
        timers: &ControllerTimers,
        latch: &FinishLatch,
        sent_rate: Option<f32>,
    ) -> Reconciliation {
        let finish_signal = self.is_finish_signal(status);
        let fire_finish = finish_signal && !latch.is_set();

        let suppressed_pause = !status.playing
            && !finish_signal
            && intent.wants_playback()
            && timers.in_stabilization_window(&self.config)
            && self.is_startup_noise(status);

        let ui_playing = (status.playing || suppressed_pause) && !fire_finish;

        let recovery = if !finish_signal
            && self.is_mid_track_stall(status, intent)
            && timers.recovery_allowed(&self.config)
        {
            Recovery::Resume
        } else {
            Recovery::None
        };

        let apply_rate = (status.is_loaded
            && status.playing
            && !finish_signal
            && sent_rate != Some(intent.desired_rate))
        .then_some(intent.desired_rate);

        Reconciliation {
            ui_playing,
            ui_loading: !status.is_loaded,
            fire_finish,
            recovery,
            apply_rate,
            suppressed_pause,
        }
    }

    /// `just_finished`, or idle within the finish tail / ratio of a known duration
    pub fn is_finish_signal(&self, status: &RawStatus) -> bool {
        status.just_finished || self.is_near_end_idle(status)
    }

    pub fn is_near_end_idle(&self, status: &RawStatus) -> bool {
        if status.playing {
            return false;
        }
        let Some(duration) = status.valid_duration() else {
            return false;
        };
        let position = status.position();
        duration - position <= self.config.finish_tail
            || position / duration >= self.config.finish_ratio
    }

    /// Engine at (about) zero without a duration yet
    fn is_startup_noise(&self, status: &RawStatus) -> bool {
        status.position() <= self.config.start_epsilon && status.valid_duration().is_none()
    }

    /// Engine stopped mid-track while intent says it should be playing
    fn is_mid_track_stall(&self, status: &RawStatus, intent: &Intent) -> bool {
        if status.playing || !status.is_loaded || !intent.wants_playback() {
            return false;
        }
        let Some(remaining) = status.remaining() else {
            return false;
        };
        status.position() > self.config.recovery_min_position
            && remaining > self.config.recovery_min_remaining
    }
}
