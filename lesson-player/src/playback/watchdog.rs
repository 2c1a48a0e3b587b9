//! Post-start watchdog
//!
//! One-shot delayed recheck armed after every explicit, successful `play()`.
//! When it expires the controller asks [`check`] whether the engine silently
//! reverted to paused; if so it performs exactly one resume attempt. The
//! watchdog never re-arms itself: later drift is the reconciler's job.
//!
//! The timer is a deadline owned by the controller loop, not a spawned task,
//! so disarming it (suspend, pause, reload, dispose) cannot leave anything
//! dangling.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ControllerConfig;
use crate::engine::RawStatus;

use super::state::Intent;

/// Outcome of a watchdog expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Engine stalled right after start; resume once
    Resume,
    /// Engine is playing
    Healthy,
    /// Intent no longer wants playback, or too close to the end to bother
    Skip,
}

/// Cancellable one-shot deadline
#[derive(Debug, Clone)]
pub struct Watchdog {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arm (or re-arm) relative to `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline if it has passed
    pub fn take_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Decide what an expired watchdog should do about the current status
pub fn check(status: &RawStatus, intent: &Intent, config: &ControllerConfig) -> WatchdogVerdict {
    if !intent.wants_playback() {
        return WatchdogVerdict::Skip;
    }
    if status
        .remaining()
        .is_some_and(|remaining| remaining <= config.recovery_min_remaining)
    {
        return WatchdogVerdict::Skip;
    }
    if status.playing {
        WatchdogVerdict::Healthy
    } else {
        WatchdogVerdict::Resume
    }
}

/// Sleep until `deadline`, or forever when there is none
///
/// Used as a `tokio::select!` branch so an unarmed watchdog never wakes the loop.
pub async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
