//! Single-track playback
//!
//! - [`state`]: intent, finish latch and the controller-owned state value
//! - [`reconciler`]: pure status → decision transform
//! - [`watchdog`]: one-shot post-start recheck
//! - [`PlaybackController`] / [`PlayerHandle`]: the per-track actor
//! - [`TrackHost`]: mount layer reacting to UI prop changes

mod controller;
mod host;
pub mod reconciler;
pub mod state;
pub mod watchdog;

pub(crate) use controller::Inbound;
pub use controller::{LoadOptions, PlaybackController, PlayerHandle};
pub use host::{EngineFactory, TrackCallbacks, TrackHost, TrackProps};
pub use reconciler::{Reconciler, Reconciliation, Recovery};
pub use state::{FinishLatch, Intent, PlayerView, Track};
pub use watchdog::{Watchdog, WatchdogVerdict};
