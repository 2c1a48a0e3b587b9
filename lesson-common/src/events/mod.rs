//! Event types for the lesson audio event system
//!
//! Provides the shared `PlayerEvent` definitions and the `EventBus` used to
//! fan them out to the host layer, session timers and debug tooling.

mod playback_types;

pub use playback_types::{NavigationDirection, PlaybackPhase, RecoverySource, SessionEpoch};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Events are broadcast via `EventBus` and can be serialized for debug
/// transport. Every variant carries the track id and the session epoch of the
/// controller instance that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Engine reported a loaded source with a usable duration
    TrackLoaded {
        track_id: String,
        epoch: SessionEpoch,
        /// Duration in seconds as reported at load time
        duration: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bounded load wait expired; playback continues best-effort
    LoadTimedOut {
        track_id: String,
        epoch: SessionEpoch,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// UI-visible playback state changed
    ///
    /// Triggers:
    /// - UI: Update play/pause control
    PlaybackStateChanged {
        track_id: String,
        epoch: SessionEpoch,
        old_state: PlaybackPhase,
        new_state: PlaybackPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Position sync from a reconciled status update
    ///
    /// Not emitted while the caller is scrubbing.
    PlaybackPosition {
        track_id: String,
        epoch: SessionEpoch,
        /// Current position in seconds
        position: f64,
        /// Duration in seconds (None while the engine reports no valid duration)
        duration: Option<f64>,
        /// UI-visible playing flag
        playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Play-through finished
    ///
    /// Emitted exactly once per play-through.
    ///
    /// Triggers:
    /// - Host: `onFinish` callback, loop restart
    /// - Session timer: count completed segment
    TrackFinished {
        track_id: String,
        epoch: SessionEpoch,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Self-healing resume issued without user action
    RecoveryAttempted {
        track_id: String,
        epoch: SessionEpoch,
        source: RecoverySource,
        /// Engine position (seconds) when the stall was observed
        position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback rate call reached the engine
    PlaybackRateApplied {
        track_id: String,
        epoch: SessionEpoch,
        rate: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Suspension flag changed
    SuspendChanged {
        track_id: String,
        epoch: SessionEpoch,
        suspended: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Controller released its engine handle
    TrackDisposed {
        track_id: String,
        epoch: SessionEpoch,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            PlayerEvent::TrackLoaded { .. } => "TrackLoaded",
            PlayerEvent::LoadTimedOut { .. } => "LoadTimedOut",
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::PlaybackPosition { .. } => "PlaybackPosition",
            PlayerEvent::TrackFinished { .. } => "TrackFinished",
            PlayerEvent::RecoveryAttempted { .. } => "RecoveryAttempted",
            PlayerEvent::PlaybackRateApplied { .. } => "PlaybackRateApplied",
            PlayerEvent::SuspendChanged { .. } => "SuspendChanged",
            PlayerEvent::TrackDisposed { .. } => "TrackDisposed",
        }
    }

    /// Track id the event belongs to
    pub fn track_id(&self) -> &str {
        match self {
            PlayerEvent::TrackLoaded { track_id, .. }
            | PlayerEvent::LoadTimedOut { track_id, .. }
            | PlayerEvent::PlaybackStateChanged { track_id, .. }
            | PlayerEvent::PlaybackPosition { track_id, .. }
            | PlayerEvent::TrackFinished { track_id, .. }
            | PlayerEvent::RecoveryAttempted { track_id, .. }
            | PlayerEvent::PlaybackRateApplied { track_id, .. }
            | PlayerEvent::SuspendChanged { track_id, .. }
            | PlayerEvent::TrackDisposed { track_id, .. } => track_id,
        }
    }

    /// Session epoch of the controller instance that emitted the event
    pub fn epoch(&self) -> SessionEpoch {
        match self {
            PlayerEvent::TrackLoaded { epoch, .. }
            | PlayerEvent::LoadTimedOut { epoch, .. }
            | PlayerEvent::PlaybackStateChanged { epoch, .. }
            | PlayerEvent::PlaybackPosition { epoch, .. }
            | PlayerEvent::TrackFinished { epoch, .. }
            | PlayerEvent::RecoveryAttempted { epoch, .. }
            | PlayerEvent::PlaybackRateApplied { epoch, .. }
            | PlayerEvent::SuspendChanged { epoch, .. }
            | PlayerEvent::TrackDisposed { epoch, .. } => *epoch,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for player events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the controller)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lesson_common::events::{EventBus, PlayerEvent, SessionEpoch};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(PlayerEvent::TrackFinished {
///     track_id: "intro-01".to_string(),
///     epoch: SessionEpoch::new(),
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "TrackFinished");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before the oldest are
    /// dropped for lagging subscribers. 10-100 is plenty for one track.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
