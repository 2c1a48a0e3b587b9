//! Test helpers for lesson-player integration tests
//!
//! Provides a scripted `MockEngine` (call recording, scripted status, error
//! injection, disposed mode, held calls) and small builders for statuses,
//! tracks and controllers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lesson_common::events::{EventBus, PlayerEvent};
use lesson_player::engine::{AudioEngine, EngineError, EngineResult, RawStatus, StatusSink};
use lesson_player::playback::{LoadOptions, PlaybackController, PlayerHandle, Track};
use lesson_player::ControllerConfig;
use tokio::sync::broadcast;

/// One recorded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ConfigureSession,
    Replace(String),
    Play,
    Pause,
    SeekTo(f64),
    SetRate(f32),
}

/// Call kinds used for error injection and holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Replace,
    Play,
    Pause,
    SeekTo,
    SetRate,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    status: RawStatus,
    /// Duration reported once `replace()` resolves; None keeps the engine unloaded
    ready_duration: Option<f64>,
    play_sets_playing: bool,
    pause_on_rate: bool,
    fail_next: Vec<CallKind>,
    fail_always: bool,
    disposed: bool,
    released: bool,
    held: Vec<CallKind>,
    sink: Option<StatusSink>,
}

/// Scripted engine double
///
/// Clones share state, so a test keeps one clone while the controller owns
/// another.
#[derive(Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report loaded with `duration` as soon as a source is bound
    pub fn ready(self, duration: f64) -> Self {
        self.inner.lock().unwrap().ready_duration = Some(duration);
        self
    }

    /// `play()` flips the reported status to playing
    pub fn play_sets_playing(self) -> Self {
        self.inner.lock().unwrap().play_sets_playing = true;
        self
    }

    /// Rate changes during playback pause the engine
    pub fn pause_on_rate(self) -> Self {
        self.inner.lock().unwrap().pause_on_rate = true;
        self
    }

    pub fn boxed(&self) -> Box<dyn AudioEngine> {
        Box::new(self.clone())
    }

    pub fn fail_next(&self, kind: CallKind) {
        self.inner.lock().unwrap().fail_next.push(kind);
    }

    pub fn fail_always(&self) {
        self.inner.lock().unwrap().fail_always = true;
    }

    /// Every call reports a released handle
    pub fn dispose_handle(&self) {
        self.inner.lock().unwrap().disposed = true;
    }

    /// Calls of `kind` never resolve
    pub fn hold(&self, kind: CallKind) {
        self.inner.lock().unwrap().held.push(kind);
    }

    pub fn set_status(&self, status: RawStatus) {
        self.inner.lock().unwrap().status = status;
    }

    /// Set the status and push it through the attached sink
    pub fn push(&self, status: RawStatus) -> bool {
        let sink = {
            let mut state = self.inner.lock().unwrap();
            state.status = status;
            state.sink.clone()
        };
        sink.map(|sink| sink.send(status)).unwrap_or(false)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn plays(&self) -> usize {
        self.calls().iter().filter(|c| **c == MockCall::Play).count()
    }

    pub fn pauses(&self) -> usize {
        self.calls().iter().filter(|c| **c == MockCall::Pause).count()
    }

    pub fn rates(&self) -> Vec<f32> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::SetRate(rate) => Some(*rate),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::SeekTo(seconds) => Some(*seconds),
                _ => None,
            })
            .collect()
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().unwrap().released
    }

    pub fn has_sink(&self) -> bool {
        self.inner.lock().unwrap().sink.is_some()
    }

    /// Record the call and decide its outcome; `Ok(true)` means "hold"
    fn enter(&self, call: MockCall, kind: Option<CallKind>) -> EngineResult<bool> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(call);
        if state.disposed || state.released {
            return Err(EngineError::Disposed);
        }
        if state.fail_always {
            return Err(EngineError::Failed("scripted failure".to_string()));
        }
        if let Some(kind) = kind {
            if let Some(index) = state.fail_next.iter().position(|k| *k == kind) {
                state.fail_next.remove(index);
                return Err(EngineError::Failed(format!("scripted {:?} failure", kind)));
            }
            if state.held.contains(&kind) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn run(&self, call: MockCall, kind: CallKind) -> EngineResult<()> {
        if self.enter(call, Some(kind))? {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl AudioEngine for MockEngine {
    async fn configure_session(&self) -> EngineResult<()> {
        self.enter(MockCall::ConfigureSession, None).map(|_| ())
    }

    async fn replace(&self, source_uri: &str) -> EngineResult<()> {
        self.run(MockCall::Replace(source_uri.to_string()), CallKind::Replace)
            .await?;
        let mut state = self.inner.lock().unwrap();
        state.status = match state.ready_duration {
            Some(duration) => RawStatus {
                is_loaded: true,
                duration,
                ..Default::default()
            },
            None => RawStatus {
                duration: f64::NAN,
                ..Default::default()
            },
        };
        Ok(())
    }

    async fn play(&self) -> EngineResult<()> {
        self.run(MockCall::Play, CallKind::Play).await?;
        let mut state = self.inner.lock().unwrap();
        if state.play_sets_playing {
            state.status.playing = true;
        }
        Ok(())
    }

    async fn pause(&self) -> EngineResult<()> {
        self.run(MockCall::Pause, CallKind::Pause).await?;
        self.inner.lock().unwrap().status.playing = false;
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> EngineResult<()> {
        self.run(MockCall::SeekTo(seconds), CallKind::SeekTo).await?;
        let mut state = self.inner.lock().unwrap();
        state.status.current_time = seconds;
        state.status.just_finished = false;
        Ok(())
    }

    async fn set_playback_rate(&self, rate: f32) -> EngineResult<()> {
        self.run(MockCall::SetRate(rate), CallKind::SetRate).await?;
        let mut state = self.inner.lock().unwrap();
        if state.pause_on_rate && state.status.playing {
            state.status.playing = false;
        }
        Ok(())
    }

    fn status(&self) -> RawStatus {
        self.inner.lock().unwrap().status
    }

    fn attach_status_sink(&self, sink: StatusSink) {
        self.inner.lock().unwrap().sink = Some(sink);
    }

    fn release(&self) {
        let mut state = self.inner.lock().unwrap();
        state.released = true;
        state.sink = None;
    }
}

// ========================================
// Builders
// ========================================

pub fn track() -> Track {
    Track::new("lesson-1-a", "Greetings", "file:///cache/lesson-1-a.m4a")
}

pub fn status(playing: bool, current_time: f64, duration: f64) -> RawStatus {
    RawStatus {
        is_loaded: true,
        playing,
        current_time,
        duration,
        just_finished: false,
    }
}

pub fn just_finished(duration: f64) -> RawStatus {
    RawStatus {
        just_finished: true,
        ..status(false, duration, duration)
    }
}

pub fn autoplay() -> LoadOptions {
    LoadOptions {
        autoplay: true,
        ..Default::default()
    }
}

/// Spawn a controller and subscribe to its events before it starts
pub fn spawn(
    engine: &MockEngine,
    options: LoadOptions,
) -> (PlayerHandle, broadcast::Receiver<PlayerEvent>) {
    let config = ControllerConfig::default();
    let events = EventBus::new(256);
    let rx = events.subscribe();
    let handle =
        PlaybackController::spawn_with_events(engine.boxed(), track(), options, config, events);
    (handle, rx)
}

/// Drain everything currently buffered
pub fn drain(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

pub fn count(events: &[PlayerEvent], event_type: &str) -> usize {
    events
        .iter()
        .filter(|e| e.event_type() == event_type)
        .count()
}

/// Poll `condition` on the (paused) clock for up to two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
