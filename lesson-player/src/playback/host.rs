//! Track host
//!
//! The mount layer between the lesson UI and one controller instance. The UI
//! re-renders with new [`TrackProps`]; the host diffs them against the last
//! props and turns the differences into controller operations:
//!
//! - different track id → dispose the old controller, spawn a new one
//! - `suspend` changed → `set_suspended`
//! - `speed` changed → `set_speed`
//! - `play_signal` changed → `trigger_replay`
//!
//! `TrackFinished` is forwarded to [`TrackCallbacks::on_finish`], followed by
//! a replay when `looping` is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lesson_common::events::{EventBus, NavigationDirection, PlayerEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ControllerConfig;
use crate::engine::AudioEngine;
use crate::error::Result;

use super::controller::{LoadOptions, PlaybackController, PlayerHandle};
use super::state::Track;

/// Inputs supplied by the containing UI on every render
#[derive(Debug, Clone, PartialEq)]
pub struct TrackProps {
    pub track: Track,
    pub auto_play: bool,
    pub speed: f32,
    pub looping: bool,
    pub suspend: bool,
    /// Externally incremented counter; each change requests a replay
    pub play_signal: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl TrackProps {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            auto_play: false,
            speed: 1.0,
            looping: false,
            suspend: false,
            play_signal: 0,
            has_prev: false,
            has_next: false,
        }
    }
}

/// Callbacks into the containing UI
pub trait TrackCallbacks: Send + Sync {
    /// User picked a new rate; the caller decides whether to pass it back as `speed`
    fn on_speed_change(&self, rate: f32);

    /// Play-through finished (exactly once per play-through)
    fn on_finish(&self);

    fn on_navigate(&self, direction: NavigationDirection);
}

/// Builds a fresh engine handle for each mounted track
pub type EngineFactory = Box<dyn Fn(&Track) -> Box<dyn AudioEngine> + Send + Sync>;

struct Mounted {
    handle: PlayerHandle,
    forwarder: JoinHandle<()>,
}

/// Owner of the currently mounted controller
pub struct TrackHost {
    props: TrackProps,
    factory: EngineFactory,
    callbacks: Arc<dyn TrackCallbacks>,
    config: ControllerConfig,
    looping: Arc<AtomicBool>,
    mounted: Option<Mounted>,
}

impl TrackHost {
    /// Mount the first track
    pub fn mount(
        props: TrackProps,
        factory: EngineFactory,
        callbacks: Arc<dyn TrackCallbacks>,
        config: ControllerConfig,
    ) -> Self {
        let mut host = Self {
            looping: Arc::new(AtomicBool::new(props.looping)),
            props,
            factory,
            callbacks,
            config,
            mounted: None,
        };
        host.mounted = Some(host.spawn_controller());
        host
    }

    pub fn props(&self) -> &TrackProps {
        &self.props
    }

    /// Currently mounted controller
    pub fn handle(&self) -> Option<&PlayerHandle> {
        self.mounted.as_ref().map(|mounted| &mounted.handle)
    }

    /// Apply a new set of props
    pub async fn update(&mut self, props: TrackProps) -> Result<()> {
        let previous = std::mem::replace(&mut self.props, props);
        self.looping.store(self.props.looping, Ordering::SeqCst);

        if previous.track.id != self.props.track.id {
            info!(
                from = %previous.track.id,
                to = %self.props.track.id,
                "Track changed, recreating controller"
            );
            self.dispose_current().await;
            self.mounted = Some(self.spawn_controller());
            return Ok(());
        }

        let Some(handle) = self.handle().cloned() else {
            return Ok(());
        };
        if previous.suspend != self.props.suspend {
            handle.set_suspended(self.props.suspend).await?;
        }
        if previous.speed != self.props.speed {
            handle.set_speed(self.props.speed).await?;
        }
        if previous.play_signal != self.props.play_signal {
            debug!(play_signal = self.props.play_signal, "Play signal changed, replaying");
            handle.trigger_replay().await?;
        }
        Ok(())
    }

    /// Report a user-selected rate upwards; the controller is not touched
    pub fn request_speed(&self, rate: f32) -> Result<f32> {
        let rate = self.config.sanitize_rate(rate)?;
        self.callbacks.on_speed_change(rate);
        Ok(rate)
    }

    /// Ask the caller to navigate; returns false at a boundary
    pub fn navigate(&self, direction: NavigationDirection) -> bool {
        let allowed = match direction {
            NavigationDirection::Prev => self.props.has_prev,
            NavigationDirection::Next => self.props.has_next,
        };
        if allowed {
            self.callbacks.on_navigate(direction);
        } else {
            debug!(direction = %direction, "Navigation ignored at boundary");
        }
        allowed
    }

    /// Dispose the mounted controller and wait for it to release its engine
    pub async fn unmount(mut self) {
        self.dispose_current().await;
    }

    fn spawn_controller(&self) -> Mounted {
        let track = self.props.track.clone();
        let engine = (self.factory)(&track);
        let events = EventBus::new(self.config.event_capacity);
        // Subscribe before the controller exists so no event is missed
        let rx = events.subscribe();

        let options = LoadOptions {
            autoplay: self.props.auto_play,
            suspended: self.props.suspend,
            rate: self.props.speed,
        };
        let handle = PlaybackController::spawn_with_events(
            engine,
            track,
            options,
            self.config.clone(),
            events,
        );

        let span = info_span!(
            "finish_forwarder",
            track_id = %handle.track().id,
            epoch = %handle.epoch()
        );
        let forwarder = tokio::spawn(
            forward_finish(
                rx,
                handle.clone(),
                Arc::clone(&self.callbacks),
                Arc::clone(&self.looping),
            )
            .instrument(span),
        );

        Mounted { handle, forwarder }
    }

    async fn dispose_current(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.forwarder.abort();
            mounted.handle.dispose().await;
        }
    }
}

impl Drop for TrackHost {
    fn drop(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.forwarder.abort();
            mounted.handle.cancel();
        }
    }
}

/// Relay `TrackFinished` to the UI, replaying afterwards when looping
async fn forward_finish(
    mut rx: broadcast::Receiver<PlayerEvent>,
    handle: PlayerHandle,
    callbacks: Arc<dyn TrackCallbacks>,
    looping: Arc<AtomicBool>,
) {
    loop {
        match rx.recv().await {
            Ok(PlayerEvent::TrackFinished { .. }) => {
                callbacks.on_finish();
                if looping.load(Ordering::SeqCst) {
                    debug!("Looping, replaying finished track");
                    if let Err(e) = handle.trigger_replay().await {
                        debug!(error = %e, "Loop replay skipped");
                        break;
                    }
                }
            }
            Ok(PlayerEvent::TrackDisposed { .. }) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Finish forwarder lagged behind player events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
