//! Playback controller
//!
//! One controller instance owns one track and one engine handle for its whole
//! lifetime. It runs as a single tokio task that owns the [`PlaybackState`];
//! callers talk to it through a cloneable [`PlayerHandle`].
//!
//! **Serialization:** caller commands and engine status updates share one
//! inbox, so everything is processed in arrival order against the most
//! recently applied intent. Engine calls are awaited inside the task, never
//! in parallel with each other.
//!
//! **Cancellation:** every engine call races the instance's
//! `CancellationToken`. Once the token fires the task stops at the next await
//! point without touching state again, then releases the engine.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use lesson_common::events::{
    EventBus, PlaybackPhase, PlayerEvent, RecoverySource, SessionEpoch,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ControllerConfig;
use crate::engine::{AudioEngine, EngineCall, EngineResult, RawStatus, StatusSink};
use crate::error::{Error, Result};

use super::reconciler::{Recovery, Reconciler};
use super::state::{Intent, PlaybackState, PlayerView, Track};
use super::watchdog::{self, wait_deadline, Watchdog, WatchdogVerdict};

/// Options applied by the initial load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Start playing once loaded (ignored while suspended)
    pub autoplay: bool,
    pub suspended: bool,
    pub rate: f32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autoplay: false,
            suspended: false,
            rate: 1.0,
        }
    }
}

/// Caller operations, executed in order by the controller task
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Command {
    PlayPause,
    BeginSeek(f64),
    UpdateSeek(f64),
    Seek(f64),
    SetSpeed(f32),
    SetSuspended(bool),
    TriggerReplay,
    /// No-op; resolves once everything queued before it was processed
    Sync,
}

/// Controller inbox message
#[derive(Debug)]
pub(crate) enum Inbound {
    Status(RawStatus),
    Command {
        command: Command,
        reply: oneshot::Sender<PlayerView>,
    },
}

/// The instance token fired while an engine call was in flight
#[derive(Debug, Clone, Copy)]
struct Cancelled;

type Step<T = ()> = std::result::Result<T, Cancelled>;

/// Await one engine call against the instance token
///
/// Returns `Ok(true)` when the call succeeded and `Ok(false)` when it failed.
/// Failures are logged and swallowed; the next caller action is the retry.
async fn guarded<F>(cancel: &CancellationToken, call: EngineCall, fut: F) -> Step<bool>
where
    F: Future<Output = EngineResult<()>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(call = %call, "Engine call abandoned: controller cancelled");
            Err(Cancelled)
        }
        result = fut => match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_disposed() => {
                debug!(call = %call, "Engine call hit released handle");
                Ok(false)
            }
            Err(e) => {
                warn!(call = %call, error = %e, "Engine call failed");
                Ok(false)
            }
        },
    }
}

/// Single-track playback controller task
pub struct PlaybackController {
    engine: Box<dyn AudioEngine>,
    track: Track,
    epoch: SessionEpoch,
    config: ControllerConfig,
    options: LoadOptions,
    reconciler: Reconciler,
    watchdog: Watchdog,
    state: PlaybackState,
    events: EventBus,
    view_tx: watch::Sender<PlayerView>,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    /// Commands that arrived during the load wait
    backlog: VecDeque<Inbound>,
    sink: StatusSink,
    cancel: CancellationToken,
}

impl PlaybackController {
    /// Spawn a controller for `track` with its own event bus
    pub fn spawn(
        engine: Box<dyn AudioEngine>,
        track: Track,
        options: LoadOptions,
        config: ControllerConfig,
    ) -> PlayerHandle {
        let events = EventBus::new(config.event_capacity);
        Self::spawn_with_events(engine, track, options, config, events)
    }

    /// Spawn a controller publishing on a caller-supplied bus
    ///
    /// Subscribe to `events` before calling this to be sure to see every event
    /// of the instance, including `TrackLoaded`.
    pub fn spawn_with_events(
        engine: Box<dyn AudioEngine>,
        track: Track,
        options: LoadOptions,
        config: ControllerConfig,
        events: EventBus,
    ) -> PlayerHandle {
        let epoch = SessionEpoch::new();
        let rate = match config.sanitize_rate(options.rate) {
            Ok(rate) => rate,
            Err(e) => {
                warn!(track_id = %track.id, error = %e, "Invalid initial rate, using default");
                config.default_rate
            }
        };
        let options = LoadOptions { rate, ..options };

        let state = PlaybackState::new(Intent::new(rate, options.suspended));
        let (view_tx, view_rx) = watch::channel(state.view(&track, epoch));
        let (tx, inbox) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let controller = Self {
            engine,
            track: track.clone(),
            epoch,
            reconciler: Reconciler::new(config.clone()),
            watchdog: Watchdog::new(config.watchdog_delay),
            config: config.clone(),
            options,
            state,
            events: events.clone(),
            view_tx,
            inbox,
            backlog: VecDeque::new(),
            sink: StatusSink::new(tx.clone()),
            cancel: cancel.clone(),
        };

        let span = info_span!("track", track_id = %track.id, epoch = %epoch);
        let task = tokio::spawn(controller.run().instrument(span));

        PlayerHandle {
            inner: Arc::new(HandleInner {
                track,
                epoch,
                config,
                tx,
                view_rx,
                events,
                cancel: cancel.clone(),
                task: Mutex::new(Some(task)),
                _guard: cancel.drop_guard(),
            }),
        }
    }

    async fn run(mut self) {
        match self.drive().await {
            Ok(()) => debug!("Controller inbox closed"),
            Err(Cancelled) => debug!("Controller cancelled"),
        }
        self.teardown();
    }

    async fn drive(&mut self) -> Step {
        self.load().await?;
        self.publish();

        loop {
            if let Some(message) = self.backlog.pop_front() {
                self.dispatch(message).await?;
                self.publish();
                continue;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = wait_deadline(self.watchdog.deadline()) => self.on_watchdog().await?,
                message = self.inbox.recv() => match message {
                    Some(message) => self.dispatch(message).await?,
                    None => return Ok(()),
                },
            }
            self.publish();
        }
    }

    async fn dispatch(&mut self, message: Inbound) -> Step {
        match message {
            Inbound::Status(status) => self.on_status(status).await,
            Inbound::Command { command, reply } => {
                self.execute(command).await?;
                let _ = reply.send(self.view());
                Ok(())
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Step {
        debug!(command = ?command, "Executing command");
        match command {
            Command::PlayPause => self.play_pause().await,
            Command::BeginSeek(value) | Command::UpdateSeek(value) => {
                self.state.seeking = true;
                self.state.position = self.clamp_position(value);
                Ok(())
            }
            Command::Seek(value) => self.seek(value).await,
            Command::SetSpeed(rate) => self.set_speed(rate).await,
            Command::SetSuspended(suspended) => self.set_suspended(suspended).await,
            Command::TriggerReplay => self.trigger_replay().await,
            Command::Sync => Ok(()),
        }
    }

    // ========================================
    // Load
    // ========================================

    async fn load(&mut self) -> Step {
        self.watchdog.disarm();
        self.state.latch.reset();
        self.state.intent.should_be_playing = false;
        self.state.ui_loading = true;
        self.set_phase(PlaybackPhase::Loading);
        self.publish();

        self.engine.attach_status_sink(self.sink.clone());
        guarded(
            &self.cancel,
            EngineCall::ConfigureSession,
            self.engine.configure_session(),
        )
        .await?;
        guarded(
            &self.cancel,
            EngineCall::Replace,
            self.engine.replace(&self.track.audio_url),
        )
        .await?;

        match self.wait_until_ready().await? {
            Some(duration) => {
                info!(duration, "Track loaded");
                self.events.emit_lossy(PlayerEvent::TrackLoaded {
                    track_id: self.track.id.clone(),
                    epoch: self.epoch,
                    duration,
                    timestamp: Utc::now(),
                });
            }
            None => {
                warn!(
                    timeout_ms = self.config.load_timeout.as_millis() as u64,
                    "Load wait expired without a valid duration, continuing best-effort"
                );
                self.events.emit_lossy(PlayerEvent::LoadTimedOut {
                    track_id: self.track.id.clone(),
                    epoch: self.epoch,
                    timestamp: Utc::now(),
                });
            }
        }

        guarded(&self.cancel, EngineCall::SeekTo, self.engine.seek_to(0.0)).await?;
        self.state.position = 0.0;
        self.set_phase(PlaybackPhase::Paused);

        // A suspend queued during the wait wins over autoplay
        let suspend_queued = self.backlog.iter().any(|message| {
            matches!(
                message,
                Inbound::Command {
                    command: Command::SetSuspended(true),
                    ..
                }
            )
        });
        if self.options.autoplay && !self.state.intent.suspended && !suspend_queued {
            self.start_playback().await?;
        }
        Ok(())
    }

    /// Wait (bounded) for a loaded status with a valid duration
    ///
    /// Pushed statuses end the wait as soon as they arrive; engines that only
    /// support polling are sampled every `load_poll_interval`. Commands that
    /// arrive meanwhile are queued and run after the load.
    async fn wait_until_ready(&mut self) -> Step<Option<f64>> {
        let initial = self.engine.status();
        self.record_status(&initial);
        if let Some(duration) = initial.valid_duration().filter(|_| initial.is_loaded) {
            return Ok(Some(duration));
        }

        let deadline = tokio::time::sleep(self.config.load_timeout);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(self.config.load_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let status = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = &mut deadline => return Ok(None),
                message = self.inbox.recv() => match message {
                    Some(Inbound::Status(status)) => status,
                    Some(command) => {
                        self.backlog.push_back(command);
                        continue;
                    }
                    None => return Ok(None),
                },
                _ = poll.tick() => self.engine.status(),
            };

            self.record_status(&status);
            if status.is_ready() {
                return Ok(status.valid_duration());
            }
        }
    }

    // ========================================
    // Status reconciliation
    // ========================================

    /// Fold a raw status into the caller-visible fields
    fn record_status(&mut self, status: &RawStatus) {
        self.state.last_status = Some(*status);
        self.state.ui_loading = !status.is_loaded;
        self.state.latch.observe(status, &self.config);
        if let Some(duration) = status.valid_duration() {
            self.state.duration = Some(duration);
        }
        if !self.state.seeking {
            self.state.position = status.position();
        }
    }

    async fn on_status(&mut self, status: RawStatus) -> Step {
        self.record_status(&status);

        let timers = self.state.timers(Instant::now());
        let decision = self.reconciler.reconcile(
            &status,
            &self.state.intent,
            &timers,
            &self.state.latch,
            self.state.sent_rate,
        );
        self.state.ui_playing = decision.ui_playing;
        self.state.ui_loading = decision.ui_loading;

        if decision.suppressed_pause {
            debug!(
                position = status.current_time,
                "Ignoring paused report inside start-stabilization window"
            );
        }

        if !self.state.seeking {
            self.events.emit_lossy(PlayerEvent::PlaybackPosition {
                track_id: self.track.id.clone(),
                epoch: self.epoch,
                position: self.state.position,
                duration: self.state.duration,
                playing: self.state.ui_playing,
                timestamp: Utc::now(),
            });
        }

        if decision.fire_finish {
            self.finish();
            return Ok(());
        }

        if matches!(
            self.state.phase,
            PlaybackPhase::Paused | PlaybackPhase::Playing
        ) {
            let phase = if self.state.ui_playing {
                PlaybackPhase::Playing
            } else {
                PlaybackPhase::Paused
            };
            self.set_phase(phase);
        }

        if decision.recovery == Recovery::Resume {
            info!(
                position = status.current_time,
                "[RECOVERY] Engine stalled mid-track while intent is playing, resuming"
            );
            return self
                .recover(RecoverySource::Reconciler, status.position())
                .await;
        }

        if let Some(rate) = decision.apply_rate {
            debug!(rate, "Applying deferred playback rate");
            self.apply_rate(rate).await?;
        }
        Ok(())
    }

    fn finish(&mut self) {
        if !self.state.latch.fire() {
            return;
        }
        self.state.intent.should_be_playing = false;
        self.watchdog.disarm();
        self.state.play_confirmed_at = None;
        self.state.ui_playing = false;
        self.set_phase(PlaybackPhase::Finished);

        info!("Track finished");
        self.events.emit_lossy(PlayerEvent::TrackFinished {
            track_id: self.track.id.clone(),
            epoch: self.epoch,
            timestamp: Utc::now(),
        });
    }

    async fn on_watchdog(&mut self) -> Step {
        if !self.watchdog.take_expired(Instant::now()) {
            return Ok(());
        }
        let status = self.engine.status();
        match watchdog::check(&status, &self.state.intent, &self.config) {
            WatchdogVerdict::Resume => {
                info!(
                    delay_ms = self.config.watchdog_delay.as_millis() as u64,
                    position = status.current_time,
                    "[WATCHDOG] Engine not playing after confirmed start, resuming once"
                );
                self.recover(RecoverySource::Watchdog, status.position())
                    .await
            }
            WatchdogVerdict::Healthy => {
                debug!("Watchdog: engine playing, no intervention needed");
                Ok(())
            }
            WatchdogVerdict::Skip => {
                debug!("Watchdog: playback no longer wanted or near the end, skipping");
                Ok(())
            }
        }
    }

    /// Reapply the desired rate, then play
    async fn recover(&mut self, source: RecoverySource, position: f64) -> Step {
        self.state.recovery_in_flight = true;
        self.state.last_recovery_at = Some(Instant::now());
        self.events.emit_lossy(PlayerEvent::RecoveryAttempted {
            track_id: self.track.id.clone(),
            epoch: self.epoch,
            source,
            position,
            timestamp: Utc::now(),
        });

        let rate = self.state.intent.desired_rate;
        if guarded(
            &self.cancel,
            EngineCall::SetPlaybackRate,
            self.engine.set_playback_rate(rate),
        )
        .await?
        {
            self.state.sent_rate = Some(rate);
            self.emit_rate_applied(rate);
        }
        guarded(&self.cancel, EngineCall::Play, self.engine.play()).await?;

        self.state.recovery_in_flight = false;
        Ok(())
    }

    // ========================================
    // Caller operations
    // ========================================

    async fn play_pause(&mut self) -> Step {
        if self.state.intent.should_be_playing {
            return self.pause_playback().await;
        }
        if self.state.intent.suspended {
            debug!("Play request ignored while suspended");
            return Ok(());
        }
        if self.is_at_end() {
            debug!("Replaying from the end");
            self.restart_from_zero().await?;
        }
        self.state.sent_rate = None;
        self.start_playback().await?;
        Ok(())
    }

    async fn pause_playback(&mut self) -> Step {
        self.state.intent.should_be_playing = false;
        self.watchdog.disarm();
        self.state.play_confirmed_at = None;
        self.state.ui_playing = false;
        if self.state.phase == PlaybackPhase::Playing {
            self.set_phase(PlaybackPhase::Paused);
        }
        guarded(&self.cancel, EngineCall::Pause, self.engine.pause()).await?;
        Ok(())
    }

    /// Set intent, play, and arm the watchdog on success
    ///
    /// Returns whether the engine accepted `play()`.
    async fn start_playback(&mut self) -> Step<bool> {
        self.state.intent.should_be_playing = true;
        if !guarded(&self.cancel, EngineCall::Play, self.engine.play()).await? {
            self.state.intent.should_be_playing = false;
            self.state.ui_playing = false;
            return Ok(false);
        }

        let now = Instant::now();
        self.state.play_confirmed_at = Some(now);
        self.state.ui_playing = true;
        self.set_phase(PlaybackPhase::Playing);
        self.watchdog.arm(now);

        // Rate goes out only once the engine confirms playback; otherwise
        // the reconciler applies it on the next playing status
        let rate = self.state.intent.desired_rate;
        let status = self.engine.status();
        if status.is_loaded && status.playing && self.state.sent_rate != Some(rate) {
            self.apply_rate(rate).await?;
        }
        Ok(true)
    }

    async fn seek(&mut self, value: f64) -> Step {
        let target = self.clamp_position(value);
        self.state.seeking = true;
        self.state.position = target;
        self.publish();

        let sought = guarded(&self.cancel, EngineCall::SeekTo, self.engine.seek_to(target)).await;
        self.state.seeking = false;
        sought?;

        if target <= self.config.start_epsilon {
            self.state.latch.clear();
        }
        if self.state.phase == PlaybackPhase::Finished {
            self.set_phase(PlaybackPhase::Paused);
        }
        Ok(())
    }

    async fn set_speed(&mut self, rate: f32) -> Step {
        self.state.intent.desired_rate = rate;
        if self.state.intent.wants_playback() {
            self.apply_rate(rate).await
        } else {
            debug!(rate, "Playback rate stored, applied once playing");
            Ok(())
        }
    }

    async fn set_suspended(&mut self, suspended: bool) -> Step {
        let changed = self.state.intent.suspended != suspended;
        self.state.intent.suspended = suspended;

        if changed {
            info!(suspended, "Suspension changed");
            self.events.emit_lossy(PlayerEvent::SuspendChanged {
                track_id: self.track.id.clone(),
                epoch: self.epoch,
                suspended,
                timestamp: Utc::now(),
            });
        }

        // Lifting suspension never resumes; that is the caller's call
        if !suspended {
            return Ok(());
        }

        self.watchdog.disarm();
        self.state.play_confirmed_at = None;
        let engine_playing = self.engine.status().playing;
        if self.state.intent.should_be_playing || engine_playing {
            self.state.intent.should_be_playing = false;
            self.state.ui_playing = false;
            if self.state.phase == PlaybackPhase::Playing {
                self.set_phase(PlaybackPhase::Paused);
            }
            guarded(&self.cancel, EngineCall::Pause, self.engine.pause()).await?;
        }
        Ok(())
    }

    async fn trigger_replay(&mut self) -> Step {
        self.watchdog.disarm();
        self.restart_from_zero().await?;
        self.state.sent_rate = None;
        if self.state.intent.suspended {
            debug!("Replay rewound but not started while suspended");
            return Ok(());
        }
        self.start_playback().await?;
        Ok(())
    }

    /// Seek to zero and clear the finish latch for a new play-through
    async fn restart_from_zero(&mut self) -> Step {
        guarded(&self.cancel, EngineCall::SeekTo, self.engine.seek_to(0.0)).await?;
        self.state.position = 0.0;
        self.state.latch.clear();
        if self.state.phase == PlaybackPhase::Finished {
            self.set_phase(PlaybackPhase::Paused);
        }
        Ok(())
    }

    /// Rate call followed by a resume if the engine paused because of it
    async fn apply_rate(&mut self, rate: f32) -> Step {
        if guarded(
            &self.cancel,
            EngineCall::SetPlaybackRate,
            self.engine.set_playback_rate(rate),
        )
        .await?
        {
            self.emit_rate_applied(rate);
        }
        // Not retried on failure; the next explicit action reapplies
        self.state.sent_rate = Some(rate);

        if !self.state.intent.wants_playback() {
            return Ok(());
        }
        let status = self.engine.status();
        if status.is_loaded && !status.playing && !self.reconciler.is_finish_signal(&status) {
            info!(rate, "[RECOVERY] Engine paused after rate change, resuming");
            self.events.emit_lossy(PlayerEvent::RecoveryAttempted {
                track_id: self.track.id.clone(),
                epoch: self.epoch,
                source: RecoverySource::RateChange,
                position: status.position(),
                timestamp: Utc::now(),
            });
            guarded(&self.cancel, EngineCall::Play, self.engine.play()).await?;
        }
        Ok(())
    }

    // ========================================
    // Helpers
    // ========================================

    fn is_at_end(&self) -> bool {
        if self.state.phase == PlaybackPhase::Finished {
            return true;
        }
        let status = self.engine.status();
        status
            .valid_duration()
            .is_some_and(|d| status.position() >= d - self.config.replay_threshold)
    }

    fn clamp_position(&self, value: f64) -> f64 {
        let value = value.max(0.0);
        match self.state.duration {
            Some(duration) => value.min(duration),
            None => value,
        }
    }

    fn set_phase(&mut self, new_state: PlaybackPhase) {
        let old_state = self.state.phase;
        if old_state == new_state {
            return;
        }
        self.state.phase = new_state;
        debug!(from = %old_state, to = %new_state, "Playback state changed");
        self.events.emit_lossy(PlayerEvent::PlaybackStateChanged {
            track_id: self.track.id.clone(),
            epoch: self.epoch,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn emit_rate_applied(&self, rate: f32) {
        self.events.emit_lossy(PlayerEvent::PlaybackRateApplied {
            track_id: self.track.id.clone(),
            epoch: self.epoch,
            rate,
            timestamp: Utc::now(),
        });
    }

    fn view(&self) -> PlayerView {
        self.state.view(&self.track, self.epoch)
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    fn teardown(&mut self) {
        self.watchdog.disarm();
        self.state.intent.should_be_playing = false;
        self.state.ui_playing = false;
        self.engine.release();
        self.set_phase(PlaybackPhase::Unloaded);
        self.publish();

        info!("Controller disposed, engine released");
        self.events.emit_lossy(PlayerEvent::TrackDisposed {
            track_id: self.track.id.clone(),
            epoch: self.epoch,
            timestamp: Utc::now(),
        });
    }
}

// ========================================
// Handle
// ========================================

struct HandleInner {
    track: Track,
    epoch: SessionEpoch,
    config: ControllerConfig,
    tx: mpsc::UnboundedSender<Inbound>,
    view_rx: watch::Receiver<PlayerView>,
    events: EventBus,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Cancels the controller once the last handle is dropped
    _guard: DropGuard,
}

/// Cloneable handle to one controller instance
///
/// Every operation resolves once the controller has executed it, with the
/// resulting view. After disposal all operations fail with
/// [`Error::ControllerClosed`].
#[derive(Clone)]
pub struct PlayerHandle {
    inner: Arc<HandleInner>,
}

impl PlayerHandle {
    pub fn track(&self) -> &Track {
        &self.inner.track
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.inner.epoch
    }

    /// Toggle intent; resuming from the end replays from zero
    pub async fn play_pause(&self) -> Result<PlayerView> {
        self.request(Command::PlayPause).await
    }

    /// Start scrubbing; status updates stop moving the visible position
    pub async fn begin_seek(&self, value: f64) -> Result<PlayerView> {
        self.request(Command::BeginSeek(check_position(value)?)).await
    }

    pub async fn update_seek(&self, value: f64) -> Result<PlayerView> {
        self.request(Command::UpdateSeek(check_position(value)?)).await
    }

    /// Commit a seek; seeking to zero starts a new play-through
    pub async fn seek(&self, value: f64) -> Result<PlayerView> {
        self.request(Command::Seek(check_position(value)?)).await
    }

    /// Store the desired rate; applied now only if playing
    pub async fn set_speed(&self, rate: f32) -> Result<PlayerView> {
        let rate = self.inner.config.sanitize_rate(rate)?;
        self.request(Command::SetSpeed(rate)).await
    }

    pub async fn set_suspended(&self, suspended: bool) -> Result<PlayerView> {
        self.request(Command::SetSuspended(suspended)).await
    }

    /// Rewind, clear the finish latch and play
    pub async fn trigger_replay(&self) -> Result<PlayerView> {
        self.request(Command::TriggerReplay).await
    }

    /// Resolve once every message queued before this one was processed
    pub async fn sync(&self) -> Result<PlayerView> {
        self.request(Command::Sync).await
    }

    /// Feed a status update from an engine that is polled externally
    pub fn push_status(&self, status: RawStatus) -> Result<()> {
        self.inner
            .tx
            .send(Inbound::Status(status))
            .map_err(|_| Error::ControllerClosed)
    }

    /// Latest published view (never blocks)
    pub fn snapshot(&self) -> PlayerView {
        self.inner.view_rx.borrow().clone()
    }

    /// Change-notified view stream
    pub fn watch(&self) -> watch::Receiver<PlayerView> {
        self.inner.view_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Fire the instance token without waiting for the task
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Cancel pending work, release the engine and wait for the task to end
    pub async fn dispose(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(track_id = %self.inner.track.id, error = %e, "Controller task ended abnormally");
            }
        }
    }

    async fn request(&self, command: Command) -> Result<PlayerView> {
        if self.is_closed() {
            return Err(Error::ControllerClosed);
        }
        let (reply, rx) = oneshot::channel();
        self.inner
            .tx
            .send(Inbound::Command { command, reply })
            .map_err(|_| Error::ControllerClosed)?;
        rx.await.map_err(|_| Error::ControllerClosed)
    }
}

fn check_position(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidPosition(value))
    }
}
