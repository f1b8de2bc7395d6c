//! Replay of a recorded health-data feed.
//!
//! A feed is a JSON document of sync cycles. Each cycle moves the debug
//! clock, records its samples in the scripted provider, optionally runs a
//! debug action, and then syncs the way its trigger would on a device.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sampo_core::{
    DebugClock, HealthDataProvider, ProgressionService, Sample, ScriptedHealthProvider, SyncError,
    SyncReport, background_refresh, sync_cycle,
};
use sampo_progression::tracker::sanitize_steps;
use sampo_store::KeyValueStore;
use sampo_types::{Currency, Metric, StepDelta, SyncTrigger};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::HostError;

/// How long to wait for the change observer to pick up a delivery.
const DELIVERY_WAIT: Duration = Duration::from_secs(2);

/// A recorded feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    /// Clock reading at first launch; the baseline is anchored here.
    pub start: DateTime<Utc>,
    /// Body mass for calorie estimates.
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// Cycles in replay order.
    #[serde(default)]
    pub cycles: Vec<FeedCycle>,
}

/// One recorded sync cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedCycle {
    /// Clock reading when the cycle runs.
    pub at: DateTime<Utc>,
    /// What started the cycle.
    pub trigger: SyncTrigger,
    /// Samples that arrived since the previous cycle.
    #[serde(default)]
    pub samples: Vec<Sample>,
    /// Debug action taken before syncing.
    #[serde(default)]
    pub action: Option<DebugAction>,
}

/// Debug-room actions a feed can replay.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DebugAction {
    /// Inject steps into today's stamina conversion.
    AddSteps {
        /// Steps to add.
        steps: u64,
    },
    /// Use a stamina item.
    ApplyItem {
        /// Stamina granted.
        amount: Decimal,
    },
    /// Fill stamina to the maximum.
    RefillStamina,
    /// Empty stamina.
    DrainStamina,
    /// Grant currency.
    Credit {
        /// Currency granted.
        currency: Currency,
        /// Amount granted.
        amount: u64,
    },
    /// Empty both balances.
    ResetCurrencies,
    /// Discard all progress.
    ResetAll,
}

impl Feed {
    /// Read a feed from a JSON file.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let contents = std::fs::read_to_string(path).map_err(|source| HostError::FeedIo {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Replay every cycle of `feed` through `service`.
///
/// Returns the number of cycles that completed. Cycles abandoned at their
/// background deadline are logged and skipped.
pub async fn replay<S: KeyValueStore>(
    service: &ProgressionService<S>,
    provider: &ScriptedHealthProvider,
    clock: &DebugClock,
    feed: &Feed,
    deadline: Duration,
) -> Result<usize, HostError> {
    let mut steps = service.subscribe_steps();
    let mut completed: usize = 0;

    for cycle in &feed.cycles {
        clock.set_override(cycle.at);
        for sample in &cycle.samples {
            provider.push(*sample).await;
        }
        if let Some(action) = cycle.action {
            apply_action(service, action).await?;
        }

        let outcome = match cycle.trigger {
            SyncTrigger::BackgroundRefresh => {
                background_refresh(service, provider, deadline).await.map(Some)
            }
            // The change observer runs these; wait for it to report.
            SyncTrigger::BackgroundDelivery => {
                await_delivery(&mut steps).await;
                Ok(None)
            }
            trigger => sync_cycle(service, provider, trigger).await.map(Some),
        };

        match outcome {
            Ok(report) => {
                if let Some(report) = report {
                    log_cycle(&report);
                }
                completed = completed.saturating_add(1);
            }
            Err(SyncError::DeadlineElapsed { deadline_ms }) => {
                warn!(at = %cycle.at, deadline_ms, "cycle skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(completed)
}

async fn await_delivery(steps: &mut broadcast::Receiver<StepDelta>) {
    match tokio::time::timeout(DELIVERY_WAIT, steps.recv()).await {
        Ok(Ok(delta)) => info!(delta = delta.delta, "change observer synced"),
        Ok(Err(e)) => warn!(error = %e, "step listener lagged"),
        Err(_elapsed) => warn!("no sync after change delivery"),
    }
}

async fn apply_action<S: KeyValueStore>(
    service: &ProgressionService<S>,
    action: DebugAction,
) -> Result<(), HostError> {
    info!(?action, "debug action");
    match action {
        DebugAction::AddSteps { steps } => {
            service.debug_add_steps(steps).await?;
        }
        DebugAction::ApplyItem { amount } => {
            service.apply_stamina_item(amount).await?;
        }
        DebugAction::RefillStamina => {
            service.refill_stamina().await?;
        }
        DebugAction::DrainStamina => {
            service.drain_stamina().await?;
        }
        DebugAction::Credit { currency, amount } => {
            service.credit(currency, amount).await?;
        }
        DebugAction::ResetCurrencies => {
            service.reset_currencies().await?;
        }
        DebugAction::ResetAll => {
            let report = service.reset_all().await?;
            info!(baseline = %report.baseline_instant, "progress reset");
        }
    }
    Ok(())
}

fn log_cycle(report: &SyncReport) {
    info!(
        sync_id = %report.id,
        trigger = %report.trigger,
        delta = report.steps.delta.delta,
        total_steps = report.steps.delta.total_steps,
        level = report.steps.experience.as_ref().map(|o| o.gain.after.level),
        rank = report.steps.rank.as_ref().map(|o| o.update.progression.rank),
        stamina = %report.stamina.conversion.snapshot.current,
        persisted = !report.steps.any_persistence_failed(),
        "cycle replayed"
    );
}

/// Today's steps and distance according to the provider.
pub async fn today_totals<S: KeyValueStore>(
    service: &ProgressionService<S>,
    provider: &ScriptedHealthProvider,
) -> Result<(u64, f64), HostError> {
    let now = service.now();
    let midnight = service.calendar().start_of_day(now);
    let steps = provider
        .query_cumulative_sum(Metric::Steps, midnight, now)
        .await?;
    let distance = provider
        .query_cumulative_sum(Metric::WalkingDistance, midnight, now)
        .await?;
    Ok((sanitize_steps(steps), distance))
}
