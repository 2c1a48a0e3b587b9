//! Engine adapter contract
//!
//! The audio engine is an external collaborator: it owns decoding and output,
//! and reports a status snapshot that is not trusted. The controller only
//! talks to it through [`AudioEngine`].
//!
//! **Known engine behaviour the controller compensates for:**
//! - Reports "paused" for a few hundred ms right after a confirmed `play()`
//! - Drops (or pauses on) a rate change issued before playback has settled
//! - Emits duplicate finish signals, or none at all

mod simulated;

pub use simulated::{EngineQuirks, SimulatedEngine};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::playback::Inbound;

/// Failure reported by an engine call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The handle was released; expected while tearing down
    #[error("engine handle already released")]
    Disposed,

    /// Any other engine-side failure
    #[error("engine call failed: {0}")]
    Failed(String),
}

impl EngineError {
    pub fn is_disposed(&self) -> bool {
        matches!(self, EngineError::Disposed)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Raw status snapshot as reported by the engine
///
/// `duration` is passed through untouched: engines report NaN, zero or a
/// negative value while they don't know it yet. Use [`RawStatus::valid_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawStatus {
    pub is_loaded: bool,
    pub playing: bool,
    /// Seconds
    pub current_time: f64,
    /// Seconds, possibly invalid
    pub duration: f64,
    pub just_finished: bool,
}

impl RawStatus {
    /// Duration if the engine reports a usable one
    pub fn valid_duration(&self) -> Option<f64> {
        (self.duration.is_finite() && self.duration > 0.0).then_some(self.duration)
    }

    /// Seconds left to play, when the duration is known
    pub fn remaining(&self) -> Option<f64> {
        self.valid_duration()
            .map(|d| (d - self.current_time).max(0.0))
    }

    /// True once loaded with a valid duration; the load wait ends here
    pub fn is_ready(&self) -> bool {
        self.is_loaded && self.valid_duration().is_some()
    }

    /// Position clamped to something displayable
    pub fn position(&self) -> f64 {
        if self.current_time.is_finite() {
            self.current_time.max(0.0)
        } else {
            0.0
        }
    }
}

/// Push side of the status channel handed to engines that emit updates
///
/// Statuses share the controller inbox with caller commands, so both are
/// processed in one arrival order.
#[derive(Clone)]
pub struct StatusSink {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl StatusSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { tx }
    }

    /// Deliver a status update; returns false once the controller is gone
    pub fn send(&self, status: RawStatus) -> bool {
        self.tx.send(Inbound::Status(status)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Contract every engine adapter implements
///
/// All calls may fail. The controller serializes calls per instance and
/// never calls into an engine after `release()`.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Allow playback while the device is in silent mode
    ///
    /// Called once before the first `replace()`. Default: nothing to do.
    async fn configure_session(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Bind a new source URI
    async fn replace(&self, source_uri: &str) -> EngineResult<()>;

    async fn play(&self) -> EngineResult<()>;

    async fn pause(&self) -> EngineResult<()>;

    async fn seek_to(&self, seconds: f64) -> EngineResult<()>;

    async fn set_playback_rate(&self, rate: f32) -> EngineResult<()>;

    /// Poll the current status snapshot
    fn status(&self) -> RawStatus;

    /// Register the push channel for status updates
    ///
    /// Engines that only support polling keep the default no-op.
    fn attach_status_sink(&self, _sink: StatusSink) {}

    /// Release the underlying handle; later calls should fail with `Disposed`
    fn release(&self) {}
}

/// Engine call names for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    ConfigureSession,
    Replace,
    Play,
    Pause,
    SeekTo,
    SetPlaybackRate,
}

impl std::fmt::Display for EngineCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineCall::ConfigureSession => "configure_session",
            EngineCall::Replace => "replace",
            EngineCall::Play => "play",
            EngineCall::Pause => "pause",
            EngineCall::SeekTo => "seek_to",
            EngineCall::SetPlaybackRate => "set_playback_rate",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_durations() {
        for duration in [f64::NAN, 0.0, -1.0, f64::INFINITY] {
            let status = RawStatus {
                is_loaded: true,
                duration,
                ..Default::default()
            };
            assert_eq!(status.valid_duration(), None, "duration {}", duration);
            assert!(!status.is_ready());
            assert_eq!(status.remaining(), None);
        }
    }

    #[test]
    fn test_remaining_never_negative() {
        let status = RawStatus {
            is_loaded: true,
            current_time: 12.5,
            duration: 12.0,
            ..Default::default()
        };
        assert_eq!(status.remaining(), Some(0.0));
        assert!(status.is_ready());
    }

    #[test]
    fn test_position_sanitized() {
        let status = RawStatus {
            current_time: f64::NAN,
            ..Default::default()
        };
        assert_eq!(status.position(), 0.0);
    }
}
