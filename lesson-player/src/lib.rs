//! lesson-player: single-track lesson audio playback controller
//!
//! Drives one lesson audio segment on top of an engine whose status reports
//! cannot be trusted, and delivers exactly one "finished" notification per
//! play-through.

pub mod config;
pub mod engine;
pub mod error;
pub mod playback;

pub use config::ControllerConfig;
pub use engine::{AudioEngine, EngineError, RawStatus, StatusSink};
pub use error::{Error, Result};
pub use playback::{
    LoadOptions, PlaybackController, PlayerHandle, PlayerView, Track, TrackCallbacks, TrackHost,
    TrackProps,
};
