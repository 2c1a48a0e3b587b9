//! # Lesson Common Library
//!
//! Shared code for the lesson audio crates:
//! - Event types (`PlayerEvent`) and the broadcast `EventBus`
//! - Bootstrap configuration loading (TOML, layered resolution)
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
