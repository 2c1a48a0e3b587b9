//! lesson-player demo binary
//!
//! Mounts one lesson track on the simulated engine, plays it through and
//! logs every player event. `--quirks` turns on the engine misbehaviour the
//! controller is built to absorb.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lesson_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use lesson_common::events::{NavigationDirection, PlayerEvent};
use lesson_player::engine::{AudioEngine, EngineQuirks, SimulatedEngine};
use lesson_player::playback::{EngineFactory, Track, TrackCallbacks, TrackHost, TrackProps};
use lesson_player::ControllerConfig;
use tokio::signal;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lesson-player
#[derive(Parser, Debug)]
#[command(name = "lesson-player")]
#[command(about = "Single-track lesson audio player (simulated engine)")]
#[command(version)]
struct Args {
    /// Audio source URI
    #[arg(long, default_value = "file:///lessons/demo.m4a")]
    url: String,

    /// Track id
    #[arg(long, default_value = "demo-01")]
    id: String,

    /// Track title
    #[arg(long, default_value = "Demo lesson")]
    title: String,

    /// Simulated track length in seconds
    #[arg(long, default_value_t = 8.0)]
    duration: f64,

    /// Playback rate (defaults to the configured default rate)
    #[arg(long)]
    speed: Option<f32>,

    /// Start playing as soon as the track is loaded
    #[arg(long)]
    autoplay: bool,

    /// Replay after every finish until interrupted
    #[arg(long = "loop")]
    looping: bool,

    /// Path to config file (overrides LESSON_PLAYER_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Make the simulated engine misbehave
    #[arg(long)]
    quirks: bool,
}

/// Logs callbacks and wakes `main` on finish
struct ConsoleCallbacks {
    finished: Arc<Notify>,
}

impl TrackCallbacks for ConsoleCallbacks {
    fn on_speed_change(&self, rate: f32) {
        info!(rate, "Speed change requested");
    }

    fn on_finish(&self) {
        info!("onFinish");
        self.finished.notify_one();
    }

    fn on_navigate(&self, direction: NavigationDirection) {
        info!(direction = %direction, "Navigation requested");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let toml_config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &toml_config.logging.level;
                format!("lesson_player={level},lesson_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using built-in defaults"),
    }

    let config = ControllerConfig::from_tuning(&toml_config.playback)
        .context("Invalid [playback] configuration")?;
    let speed = args.speed.unwrap_or(config.default_rate);

    let quirks = if args.quirks {
        EngineQuirks::all()
    } else {
        EngineQuirks::default()
    };
    let duration = args.duration;
    let factory: EngineFactory = Box::new(move |track: &Track| {
        debug!(track_id = %track.id, "Creating simulated engine");
        Box::new(SimulatedEngine::new(duration, quirks)) as Box<dyn AudioEngine>
    });

    let finished = Arc::new(Notify::new());
    let callbacks = Arc::new(ConsoleCallbacks {
        finished: Arc::clone(&finished),
    });

    let mut props = TrackProps::new(Track::new(args.id, args.title, args.url));
    props.auto_play = args.autoplay;
    props.speed = speed;
    props.looping = args.looping;

    info!(
        track_id = %props.track.id,
        speed,
        looping = args.looping,
        quirks = args.quirks,
        "Mounting track"
    );
    let host = TrackHost::mount(props, factory, callbacks, config);
    let handle = host
        .handle()
        .cloned()
        .context("Track host has no mounted controller")?;
    let logger = tokio::spawn(log_events(handle.subscribe()));

    if !args.autoplay {
        handle.play_pause().await.context("Failed to start playback")?;
    }

    tokio::select! {
        _ = finished.notified(), if !args.looping => info!("Lesson segment finished"),
        _ = signal::ctrl_c() => info!("Received Ctrl+C, stopping"),
    }

    let snapshot = handle.snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
    );

    host.unmount().await;
    logger.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn log_events(mut rx: broadcast::Receiver<PlayerEvent>) {
    loop {
        match rx.recv().await {
            Ok(PlayerEvent::PlaybackPosition { .. }) => {}
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!(event_type = event.event_type(), "{}", json),
                Err(e) => debug!(error = %e, "Unserializable event"),
            },
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
