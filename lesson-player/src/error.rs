//! Error types for lesson-player
//!
//! Engine failures never reach callers of the controller: they are logged and
//! swallowed inside the controller. The variants here cover caller mistakes,
//! configuration and a controller that has already been disposed.

use thiserror::Error;

/// Main error type for lesson-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] lesson_common::Error),

    /// Playback rate that is not finite and positive
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f32),

    /// Seek target that is not a finite number
    #[error("Invalid seek position: {0}")]
    InvalidPosition(f64),

    /// Controller task has been disposed or has stopped
    #[error("Controller closed")]
    ControllerClosed,
}

/// Convenience Result type using lesson-player Error
pub type Result<T> = std::result::Result<T, Error>;
