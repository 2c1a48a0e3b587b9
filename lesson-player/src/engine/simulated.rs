//! In-process engine with a virtual playhead
//!
//! Produces no audio. It advances a playhead on a tokio interval, pushes a
//! status every tick and can be told to misbehave the way real engines do.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{AudioEngine, EngineError, EngineResult, RawStatus, StatusSink};

/// How long the transient-pause quirk reports "paused" after `play()`
const TRANSIENT_PAUSE: Duration = Duration::from_millis(300);

/// Status push interval
const TICK: Duration = Duration::from_millis(100);

/// Misbehaviour toggles
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineQuirks {
    /// Report paused, at zero, without duration for a moment after `play()`
    pub transient_pause_after_start: bool,
    /// Pause when the rate changes during playback
    pub pause_on_rate_change: bool,
    /// Report `just_finished` on two consecutive ticks
    pub duplicate_finish: bool,
    /// Time between `replace()` and the source reporting loaded
    pub load_delay: Duration,
}

impl EngineQuirks {
    /// Every quirk on, with a short load delay
    pub fn all() -> Self {
        Self {
            transient_pause_after_start: true,
            pause_on_rate_change: true,
            duplicate_finish: true,
            load_delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug)]
struct Playhead {
    source: Option<String>,
    loaded_at: Option<Instant>,
    playing: bool,
    position: f64,
    rate: f32,
    /// Pending `just_finished` reports
    finish_reports: u8,
    transient_until: Option<Instant>,
    released: bool,
}

impl Playhead {
    fn is_loaded(&self, now: Instant) -> bool {
        self.source.is_some() && self.loaded_at.is_some_and(|t| t <= now)
    }

    fn in_transient_pause(&self, now: Instant) -> bool {
        self.transient_until.is_some_and(|t| now < t)
    }

    fn advance(&mut self, elapsed: Duration, duration: f64, quirks: &EngineQuirks, now: Instant) {
        if !self.playing || !self.is_loaded(now) || self.in_transient_pause(now) {
            return;
        }
        self.position += elapsed.as_secs_f64() * f64::from(self.rate);
        if self.position >= duration {
            self.position = duration;
            self.playing = false;
            self.finish_reports = if quirks.duplicate_finish { 2 } else { 1 };
        }
    }

    fn status(&self, duration: f64, now: Instant) -> RawStatus {
        let is_loaded = self.is_loaded(now);
        let startup_noise = self.in_transient_pause(now);
        RawStatus {
            is_loaded,
            playing: self.playing && !startup_noise,
            current_time: self.position,
            duration: if is_loaded && !startup_noise {
                duration
            } else {
                f64::NAN
            },
            just_finished: self.finish_reports > 0,
        }
    }

    fn check_live(&self) -> EngineResult<()> {
        if self.released {
            Err(EngineError::Disposed)
        } else {
            Ok(())
        }
    }
}

/// Simulated engine for the demo binary and manual testing
pub struct SimulatedEngine {
    duration: f64,
    quirks: EngineQuirks,
    playhead: Arc<Mutex<Playhead>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedEngine {
    pub fn new(duration_secs: f64, quirks: EngineQuirks) -> Self {
        Self {
            duration: duration_secs,
            quirks,
            playhead: Arc::new(Mutex::new(Playhead {
                source: None,
                loaded_at: None,
                playing: false,
                position: 0.0,
                rate: 1.0,
                finish_reports: 0,
                transient_until: None,
                released: false,
            })),
            ticker: Mutex::new(None),
        }
    }

    fn playhead(&self) -> MutexGuard<'_, Playhead> {
        self.playhead.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AudioEngine for SimulatedEngine {
    async fn replace(&self, source_uri: &str) -> EngineResult<()> {
        let mut playhead = self.playhead();
        playhead.check_live()?;
        debug!(source_uri, "Simulated engine loading source");
        playhead.source = Some(source_uri.to_string());
        playhead.loaded_at = Some(Instant::now() + self.quirks.load_delay);
        playhead.playing = false;
        playhead.position = 0.0;
        playhead.finish_reports = 0;
        Ok(())
    }

    async fn play(&self) -> EngineResult<()> {
        let now = Instant::now();
        let mut playhead = self.playhead();
        playhead.check_live()?;
        if !playhead.is_loaded(now) {
            return Err(EngineError::Failed("no source loaded".to_string()));
        }
        if !playhead.playing {
            playhead.playing = true;
            if self.quirks.transient_pause_after_start && playhead.position <= 0.0 {
                playhead.transient_until = Some(now + TRANSIENT_PAUSE);
            }
        }
        Ok(())
    }

    async fn pause(&self) -> EngineResult<()> {
        let mut playhead = self.playhead();
        playhead.check_live()?;
        playhead.playing = false;
        playhead.transient_until = None;
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> EngineResult<()> {
        let mut playhead = self.playhead();
        playhead.check_live()?;
        playhead.position = seconds.clamp(0.0, self.duration);
        playhead.finish_reports = 0;
        Ok(())
    }

    async fn set_playback_rate(&self, rate: f32) -> EngineResult<()> {
        let mut playhead = self.playhead();
        playhead.check_live()?;
        playhead.rate = rate;
        if self.quirks.pause_on_rate_change && playhead.playing {
            debug!(rate, "Simulated engine paused on rate change");
            playhead.playing = false;
        }
        Ok(())
    }

    fn status(&self) -> RawStatus {
        self.playhead().status(self.duration, Instant::now())
    }

    fn attach_status_sink(&self, sink: StatusSink) {
        let playhead = Arc::clone(&self.playhead);
        let duration = self.duration;
        let quirks = self.quirks;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            let mut last = Instant::now();
            loop {
                interval.tick().await;
                let now = Instant::now();
                let status = {
                    let mut playhead = playhead.lock().unwrap_or_else(PoisonError::into_inner);
                    if playhead.released {
                        break;
                    }
                    playhead.advance(now - last, duration, &quirks, now);
                    let status = playhead.status(duration, now);
                    playhead.finish_reports = playhead.finish_reports.saturating_sub(1);
                    status
                };
                last = now;
                if !sink.send(status) {
                    break;
                }
            }
        });

        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = ticker.replace(task) {
            previous.abort();
        }
    }

    fn release(&self) {
        self.playhead().released = true;
        if let Some(task) = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
