//! Headless host for the Sampo step-progression engine.
//!
//! Stands in for the device shell: it loads configuration, selects the
//! durable store, starts the progression service, and replays a recorded
//! health-data feed through the same sync cycles a device would run.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `sampo-config.yaml` (or `SAMPO_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the recorded feed (first argument, default `demos/walk.json`)
//! 4. Connect the configured store
//! 5. Start the progression service on a debug clock pinned to the feed
//! 6. Start the award listener and the change observer
//! 7. Replay the feed
//! 8. Log the final progression and shut down

mod error;
mod replay;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sampo_core::{
    AppConfig, DebugClock, HealthDataProvider, LogFormat, ProgressionService,
    ScriptedHealthProvider, StoreBackend, watch_changes,
};
use sampo_core::config::LoggingConfig;
use sampo_store::{DragonflyStore, KeyValueStore, MemoryStore};
use sampo_types::{AwardEvent, Metric};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::HostError;
use crate::replay::Feed;

/// Feed replayed when no path is given.
const DEFAULT_FEED_PATH: &str = "demos/walk.json";

/// Application entry point for the host.
///
/// # Errors
///
/// Returns an error if configuration, the store, the service, or the feed
/// replay fails.
#[tokio::main]
async fn main() -> Result<(), HostError> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("sampo-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        backend = ?config.store.backend,
        baseline_policy = ?config.clock.baseline_policy,
        utc_offset_minutes = config.clock.utc_offset_minutes,
        background_deadline_ms = config.sync.background_deadline_ms,
        "Configuration resolved"
    );

    // 3. Load the feed.
    let feed_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_FEED_PATH), PathBuf::from);
    let feed = Feed::load(&feed_path)?;
    info!(
        path = %feed_path.display(),
        cycles = feed.cycles.len(),
        start = %feed.start,
        "Feed loaded"
    );

    // 4. Connect the store and run.
    match config.store.backend {
        StoreBackend::Memory => run(MemoryStore::new(), config, &feed).await,
        StoreBackend::Dragonfly => {
            let kv =
                DragonflyStore::connect(&config.store.dragonfly_url, &config.store.key_prefix)
                    .await?;
            info!(url = %config.store.dragonfly_url, "Dragonfly connected");
            run(kv, config, &feed).await
        }
    }
}

/// Install the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load configuration from the path in `SAMPO_CONFIG` or the default
/// location. Returns the path that was read, if any.
fn load_config() -> Result<(AppConfig, Option<PathBuf>), HostError> {
    let path = AppConfig::path_from_env();
    if path.exists() {
        let config = AppConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = AppConfig::default();
        config.store.apply_env_overrides();
        Ok((config, None))
    }
}

async fn run<S: KeyValueStore + Clone>(
    kv: S,
    config: AppConfig,
    feed: &Feed,
) -> Result<(), HostError> {
    // 5. Start the service on a clock the feed controls.
    let clock = Arc::new(DebugClock::pinned(feed.start));
    let deadline = Duration::from_millis(config.sync.background_deadline_ms);
    let service = Arc::new(ProgressionService::start(kv, config, clock.clone()).await?);
    let provider = Arc::new(ScriptedHealthProvider::new());
    provider.request_authorization().await?;

    // 6. Listeners.
    let toasts = spawn_award_listener(service.subscribe_awards());
    let observer = watch_changes(Arc::clone(&service), Arc::clone(&provider), Metric::Steps);

    // 7. Replay.
    let completed = replay::replay(&service, &provider, &clock, feed, deadline).await?;
    info!(completed, total = feed.cycles.len(), "Feed replayed");

    // 8. Summary and shutdown.
    log_summary(&service, &provider, feed.weight_kg).await?;

    observer.abort();
    join_quietly(observer, "change observer").await;
    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await,
        Err(_still_shared) => {
            warn!("service still shared at exit, skipping orderly shutdown");
            toasts.abort();
        }
    }
    join_quietly(toasts, "award listener").await;

    info!("sampo-engine shutdown complete");
    Ok(())
}

/// Wait for a background task, reporting anything but cancellation.
async fn join_quietly(handle: JoinHandle<()>, name: &'static str) {
    match handle.await {
        Err(e) if !e.is_cancelled() => warn!(task = name, error = %e, "task ended abnormally"),
        _ => {}
    }
}

/// Log each award the way the device shows its transient notification.
fn spawn_award_listener(mut awards: broadcast::Receiver<AwardEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match awards.recv().await {
                Ok(award) => info!(
                    currency = ?award.currency,
                    amount = award.amount,
                    units = award.units,
                    display_duration_ms = award.display_duration_ms,
                    "Award"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "award listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn log_summary<S: KeyValueStore>(
    service: &ProgressionService<S>,
    provider: &ScriptedHealthProvider,
    weight_kg: Option<f64>,
) -> Result<(), HostError> {
    let tracker = service.tracker_state().await?;
    let player = service.player_progression().await?;
    let rank = service.rank_progression().await?;
    let stamina = service.stamina().await?;
    let wallet = service.wallet().await?;
    let (today_steps, today_distance) = replay::today_totals(service, provider).await?;
    let activity = service.daily_activity(today_steps, Some(today_distance), weight_kg);

    info!(
        baseline = %tracker.baseline_instant,
        total_steps = tracker.total_steps,
        total_distance_m = tracker.total_distance_m,
        "Tracker"
    );
    info!(
        level = player.level,
        exp = player.display_current_exp(),
        next_level_exp = player.display_next_level_exp(),
        "Level"
    );
    info!(
        rank = rank.rank,
        steps_into_rank = rank.display_steps_into_rank(),
        steps_remaining = rank.steps_remaining_for_next_rank(),
        "Rank"
    );
    info!(
        current = %stamina.current,
        max = %stamina.max,
        overfilled = stamina.is_overfilled(),
        "Stamina"
    );
    info!(crystals = wallet.crystals, silver = wallet.silver, "Wallet");
    info!(
        day = %activity.day,
        steps = activity.steps,
        distance_m = activity.distance_m,
        calories_kcal = activity.calories_kcal,
        goal_fraction = activity.goal_fraction,
        goal_reached = activity.goal_reached(),
        "Today"
    );
    Ok(())
}
