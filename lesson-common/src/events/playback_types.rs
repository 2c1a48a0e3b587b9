//! Playback-related type definitions
//!
//! Supporting types shared by the controller, the host layer and event consumers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Controller lifecycle state as seen by the UI
///
/// `Unloaded → Loading → {Paused ⇄ Playing} → Finished → Playing (via replay)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// No source bound to the engine yet
    Unloaded,
    /// Source replaced, waiting for the engine to report a usable duration
    Loading,
    /// Ready, not playing
    Paused,
    /// Ready, playing (or intended to be playing)
    Playing,
    /// Play-through completed; finish notification already delivered
    Finished,
}

impl PlaybackPhase {
    /// True once the load phase is over
    pub fn is_ready(&self) -> bool {
        !matches!(self, PlaybackPhase::Unloaded | PlaybackPhase::Loading)
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Unloaded => write!(f, "unloaded"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Paused => write!(f, "paused"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Finished => write!(f, "finished"),
        }
    }
}

/// Which component requested a self-healing resume
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySource {
    /// Mid-track stall observed while reconciling a status update
    Reconciler,
    /// Post-start recheck found the engine not playing
    Watchdog,
    /// Engine paused itself after a playback rate change
    RateChange,
}

impl std::fmt::Display for RecoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySource::Reconciler => write!(f, "reconciler"),
            RecoverySource::Watchdog => write!(f, "watchdog"),
            RecoverySource::RateChange => write!(f, "rate_change"),
        }
    }
}

/// Navigation request direction passed to `onNavigate`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Prev,
    Next,
}

impl std::fmt::Display for NavigationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationDirection::Prev => write!(f, "prev"),
            NavigationDirection::Next => write!(f, "next"),
        }
    }
}

/// Per-mount correlation token
///
/// Only used to correlate log lines and events of one mounted controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionEpoch(Uuid);

impl SessionEpoch {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionEpoch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form keeps log lines readable
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}
