//! Playback state owned by one controller instance
//!
//! Everything the controller needs to remember lives in one `PlaybackState`
//! value owned by the controller task. Nothing here is shared across
//! instances; the UI sees it only through [`PlayerView`] snapshots.

use lesson_common::events::{PlaybackPhase, SessionEpoch};
use serde::Serialize;
use tokio::time::Instant;

use crate::config::ControllerConfig;
use crate::engine::RawStatus;

/// Lesson audio segment bound to one controller instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Local file URI supplied by the download/cache layer
    pub audio_url: String,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            audio_url: audio_url.into(),
        }
    }
}

/// Desired playback state; ground truth for every self-healing decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intent {
    pub should_be_playing: bool,
    pub suspended: bool,
    pub desired_rate: f32,
}

impl Intent {
    pub fn new(desired_rate: f32, suspended: bool) -> Self {
        Self {
            should_be_playing: false,
            suspended,
            desired_rate,
        }
    }

    /// Playing is wanted and nobody else owns the output
    pub fn wants_playback(&self) -> bool {
        self.should_be_playing && !self.suspended
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatchState {
    /// Next finish signal fires
    Armed,
    /// Finish delivered for this play-through
    Fired,
    /// Cleared by a seek to zero; waiting to see the engine back at the start
    /// so a late near-end status from before the seek cannot fire again
    Rearming,
}

/// One-shot guard for the finished notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishLatch {
    state: LatchState,
}

impl FinishLatch {
    pub fn new() -> Self {
        Self {
            state: LatchState::Armed,
        }
    }

    /// True while finish signals must not fire
    pub fn is_set(&self) -> bool {
        self.state != LatchState::Armed
    }

    /// Finish delivered and no new play-through started yet
    pub fn has_fired(&self) -> bool {
        self.state == LatchState::Fired
    }

    /// Consume the latch; returns true only for the first caller per play-through
    pub fn fire(&mut self) -> bool {
        if self.state == LatchState::Armed {
            self.state = LatchState::Fired;
            true
        } else {
            false
        }
    }

    /// Fresh load: nothing stale can be in flight
    pub fn reset(&mut self) {
        self.state = LatchState::Armed;
    }

    /// Explicit seek to zero
    pub fn clear(&mut self) {
        self.state = LatchState::Rearming;
    }

    /// Re-arm once a status shows the new play-through
    ///
    /// Any playing report counts, so clips shorter than the finish tail re-arm
    /// even when no status lands near the start.
    pub fn observe(&mut self, status: &RawStatus, config: &ControllerConfig) {
        if self.state != LatchState::Rearming || status.just_finished {
            return;
        }
        let position = status.position();
        let away_from_end = match status.valid_duration() {
            Some(duration) => duration - position > config.finish_tail,
            None => false,
        };
        if status.playing || position <= config.start_epsilon || away_from_end {
            self.state = LatchState::Armed;
        }
    }
}

impl Default for FinishLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Time-based guards fed to the reconciler
#[derive(Debug, Clone, Copy)]
pub struct ControllerTimers {
    pub now: Instant,
    /// When the last explicit `play()` resolved successfully
    pub play_confirmed_at: Option<Instant>,
    pub last_recovery_at: Option<Instant>,
    pub recovery_in_flight: bool,
}

impl ControllerTimers {
    pub fn in_stabilization_window(&self, config: &ControllerConfig) -> bool {
        self.play_confirmed_at
            .is_some_and(|t| self.now.saturating_duration_since(t) < config.stabilization_window)
    }

    pub fn recovery_allowed(&self, config: &ControllerConfig) -> bool {
        !self.recovery_in_flight
            && self
                .last_recovery_at
                .map_or(true, |t| self.now.saturating_duration_since(t) >= config.recovery_cooldown)
    }
}

/// Controller-owned mutable state
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub intent: Intent,
    pub latch: FinishLatch,
    pub ui_playing: bool,
    pub ui_loading: bool,
    /// Caller-visible position (seconds)
    pub position: f64,
    pub duration: Option<f64>,
    /// Caller is scrubbing; status updates must not move `position`
    pub seeking: bool,
    /// Last rate handed to the engine (None: must be (re)applied)
    pub sent_rate: Option<f32>,
    pub last_status: Option<RawStatus>,
    pub play_confirmed_at: Option<Instant>,
    pub last_recovery_at: Option<Instant>,
    pub recovery_in_flight: bool,
}

impl PlaybackState {
    pub fn new(intent: Intent) -> Self {
        Self {
            phase: PlaybackPhase::Unloaded,
            intent,
            latch: FinishLatch::new(),
            ui_playing: false,
            ui_loading: false,
            position: 0.0,
            duration: None,
            seeking: false,
            sent_rate: None,
            last_status: None,
            play_confirmed_at: None,
            last_recovery_at: None,
            recovery_in_flight: false,
        }
    }

    pub fn timers(&self, now: Instant) -> ControllerTimers {
        ControllerTimers {
            now,
            play_confirmed_at: self.play_confirmed_at,
            last_recovery_at: self.last_recovery_at,
            recovery_in_flight: self.recovery_in_flight,
        }
    }

    pub fn view(&self, track: &Track, epoch: SessionEpoch) -> PlayerView {
        PlayerView {
            track_id: track.id.clone(),
            epoch,
            phase: self.phase,
            playing: self.ui_playing,
            loading: self.ui_loading || !self.phase.is_ready(),
            position: self.position,
            duration: self.duration,
            rate: self.intent.desired_rate,
            should_be_playing: self.intent.should_be_playing,
            suspended: self.intent.suspended,
            seeking: self.seeking,
            finished: self.latch.has_fired(),
        }
    }
}

/// UI-facing snapshot of one controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub track_id: String,
    pub epoch: SessionEpoch,
    pub phase: PlaybackPhase,
    pub playing: bool,
    pub loading: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub rate: f32,
    pub should_be_playing: bool,
    pub suspended: bool,
    pub seeking: bool,
    /// Finish already delivered for the current play-through
    pub finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status(current_time: f64, duration: f64) -> RawStatus {
        RawStatus {
            is_loaded: true,
            playing: false,
            current_time,
            duration,
            just_finished: false,
        }
    }

    #[test]
    fn test_latch_fires_once() {
        let mut latch = FinishLatch::new();
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(latch.is_set());
    }

    #[test]
    fn test_cleared_latch_ignores_stale_end_status() {
        let config = ControllerConfig::default();
        let mut latch = FinishLatch::new();
        latch.fire();
        latch.clear();
        assert!(!latch.has_fired());

        // Late status from before the seek landed
        latch.observe(&status(9.8, 10.0), &config);
        assert!(latch.is_set());
        assert!(!latch.fire());

        // Engine back at the start
        latch.observe(&status(0.0, 10.0), &config);
        assert!(!latch.is_set());
        assert!(latch.fire());
    }

    #[test]
    fn test_cleared_latch_rearms_on_playing_status_of_short_clip() {
        let config = ControllerConfig::default();
        let mut latch = FinishLatch::new();
        latch.fire();
        latch.clear();

        // 1s clip: never further than the finish tail from the end
        latch.observe(&status(0.5, 1.0), &config);
        assert!(latch.is_set());

        latch.observe(
            &RawStatus {
                playing: true,
                ..status(0.25, 1.0)
            },
            &config,
        );
        assert!(!latch.is_set());
        assert!(latch.fire());
    }

    #[test]
    fn test_observe_does_not_touch_fired_latch() {
        let config = ControllerConfig::default();
        let mut latch = FinishLatch::new();
        latch.fire();
        latch.observe(&status(0.0, 10.0), &config);
        assert!(latch.is_set());
    }

    #[test]
    fn test_stabilization_window() {
        let config = ControllerConfig::default();
        let start = Instant::now();
        let mut timers = ControllerTimers {
            now: start + Duration::from_millis(500),
            play_confirmed_at: Some(start),
            last_recovery_at: None,
            recovery_in_flight: false,
        };
        assert!(timers.in_stabilization_window(&config));

        timers.now = start + Duration::from_millis(900);
        assert!(!timers.in_stabilization_window(&config));

        timers.play_confirmed_at = None;
        assert!(!timers.in_stabilization_window(&config));
    }

    #[test]
    fn test_recovery_cooldown() {
        let config = ControllerConfig::default();
        let start = Instant::now();
        let mut timers = ControllerTimers {
            now: start + Duration::from_millis(200),
            play_confirmed_at: None,
            last_recovery_at: Some(start),
            recovery_in_flight: false,
        };
        assert!(!timers.recovery_allowed(&config));

        timers.now = start + config.recovery_cooldown;
        assert!(timers.recovery_allowed(&config));

        timers.recovery_in_flight = true;
        assert!(!timers.recovery_allowed(&config));
    }

    #[test]
    fn test_view_reports_loading_until_ready() {
        let track = Track::new("t1", "Greetings", "file:///t1.m4a");
        let mut state = PlaybackState::new(Intent::new(1.0, false));
        assert!(state.view(&track, SessionEpoch::new()).loading);

        state.phase = PlaybackPhase::Paused;
        let view = state.view(&track, SessionEpoch::new());
        assert!(!view.loading);
        assert_eq!(view.track_id, "t1");
    }
}
