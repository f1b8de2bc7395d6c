//! Sync cycles: query the health-data provider and feed the service.
//!
//! A cycle reads three windows:
//!
//! - steps since the tracker baseline, fed to the cumulative tracker
//! - walking distance since the baseline, fed to the distance watermark
//! - steps since local midnight, fed to the stamina conversion
//!
//! Any number of triggers may start cycles concurrently. The actors
//! serialize the resulting readings, and re-reporting an already converted
//! total changes nothing, so overlapping cycles cannot double count.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sampo_store::{KeyValueStore, Persistence};
use sampo_types::{DistanceDelta, Metric, SyncId, SyncTrigger};
use tokio::task::JoinHandle;

use crate::actors::stamina::StaminaOutcome;
use crate::error::SyncError;
use crate::health::HealthDataProvider;
use crate::service::{ProgressionService, StepReport};

/// Everything one sync cycle changed.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Identifier used in the cycle's log lines.
    pub id: SyncId,
    /// What started the cycle.
    pub trigger: SyncTrigger,
    /// Cumulative step reading.
    pub steps: StepReport,
    /// Cumulative distance reading.
    pub distance: DistanceDelta,
    /// Whether the distance watermark reached durable storage.
    pub distance_persistence: Persistence,
    /// Today's stamina conversion.
    pub stamina: StaminaOutcome,
}

/// Run one sync cycle.
///
/// # Errors
///
/// Returns [`SyncError::Upstream`] if a query fails. Readings fed before
/// the failing query stay applied; the next cycle picks up the rest.
pub async fn sync_cycle<S, P>(
    service: &ProgressionService<S>,
    provider: &P,
    trigger: SyncTrigger,
) -> Result<SyncReport, SyncError>
where
    S: KeyValueStore,
    P: HealthDataProvider,
{
    let id = SyncId::new();
    let now = service.now();
    let baseline = service.tracker_state().await?.baseline_instant;
    tracing::debug!(sync_id = %id, %trigger, %baseline, "sync cycle started");

    let raw_steps = provider
        .query_cumulative_sum(Metric::Steps, baseline, now)
        .await
        .inspect_err(|e| tracing::warn!(sync_id = %id, %trigger, error = %e, "step query failed"))?;
    let steps = service.report_raw_total(reading(raw_steps), now).await?;

    let raw_distance = provider
        .query_cumulative_sum(Metric::WalkingDistance, baseline, now)
        .await?;
    let (distance, distance_persistence) = service.report_raw_distance(reading(raw_distance)).await?;

    let midnight = service.calendar().start_of_day(now);
    let today = provider
        .query_cumulative_sum(Metric::Steps, midnight, now)
        .await?;
    let stamina = service
        .report_today_steps(sampo_progression::tracker::sanitize_steps(today))
        .await?;

    tracing::info!(
        sync_id = %id,
        %trigger,
        delta = steps.delta.delta,
        total_steps = steps.delta.total_steps,
        distance_m = distance.total_distance_m,
        stamina = %stamina.conversion.snapshot.current,
        "sync cycle finished"
    );

    Ok(SyncReport {
        id,
        trigger,
        steps,
        distance,
        distance_persistence,
        stamina,
    })
}

/// The provider answers 0 when a window has no samples. That is "no
/// update", not a counter regression, so the watermarks are left alone.
fn reading(raw: f64) -> Option<f64> {
    (raw > 0.0).then_some(raw)
}

/// Run a sync cycle inside an OS background-refresh window.
///
/// The cycle is abandoned if it has not finished after `deadline`. Actor
/// work already queued still completes; only the caller stops waiting.
///
/// # Errors
///
/// Returns [`SyncError::DeadlineElapsed`] on expiry, or any error of
/// [`sync_cycle`].
pub async fn background_refresh<S, P>(
    service: &ProgressionService<S>,
    provider: &P,
    deadline: Duration,
) -> Result<SyncReport, SyncError>
where
    S: KeyValueStore,
    P: HealthDataProvider,
{
    let deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
    tokio::time::timeout(
        deadline,
        sync_cycle(service, provider, SyncTrigger::BackgroundRefresh),
    )
    .await
    .map_err(|_elapsed| {
        tracing::warn!(deadline_ms, "background refresh abandoned at deadline");
        SyncError::DeadlineElapsed { deadline_ms }
    })?
}

/// Run a sync cycle for every change notification on `metric`.
///
/// The subscription is in place when this returns. The task ends when the
/// provider closes the stream.
pub fn watch_changes<S, P>(
    service: Arc<ProgressionService<S>>,
    provider: Arc<P>,
    metric: Metric,
) -> JoinHandle<()>
where
    S: KeyValueStore,
    P: HealthDataProvider,
{
    let mut changes = provider.observe_changes(metric);
    tokio::spawn(async move {
        while changes.next().await.is_some() {
            if let Err(e) =
                sync_cycle(&*service, &*provider, SyncTrigger::BackgroundDelivery).await
            {
                tracing::warn!(?metric, error = %e, "change-triggered sync failed");
            }
        }
        tracing::debug!(?metric, "change observation ended");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use sampo_store::MemoryStore;
    use sampo_types::DeltaKind;

    use super::*;
    use crate::clock::DebugClock;
    use crate::config::AppConfig;
    use crate::health::{HealthError, Sample, ScriptedHealthProvider};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 6, 0, 0).unwrap()
    }

    async fn service(clock: &Arc<DebugClock>) -> ProgressionService<MemoryStore> {
        ProgressionService::start(MemoryStore::new(), AppConfig::default(), clock.clone())
            .await
            .unwrap()
    }

    /// Never answers a query.
    struct StalledProvider;

    impl HealthDataProvider for StalledProvider {
        async fn request_authorization(&self) -> Result<(), HealthError> {
            Ok(())
        }

        async fn query_cumulative_sum(
            &self,
            _metric: Metric,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<f64, HealthError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0.0)
        }

        fn observe_changes(&self, _metric: Metric) -> futures::stream::BoxStream<'static, ()> {
            futures::stream::empty().boxed()
        }
    }

    #[tokio::test]
    async fn cycle_feeds_tracker_distance_and_stamina() {
        let clock = Arc::new(DebugClock::pinned(t0()));
        let service = service(&clock).await;
        let provider = ScriptedHealthProvider::new();
        let walked_at = t0() + chrono::Duration::hours(1);
        provider
            .push(Sample { metric: Metric::Steps, at: walked_at, value: 2500.0 })
            .await;
        provider
            .push(Sample { metric: Metric::WalkingDistance, at: walked_at, value: 1900.0 })
            .await;
        clock.advance(chrono::Duration::hours(2));

        let report = sync_cycle(&service, &provider, SyncTrigger::Foreground).await.unwrap();
        assert_eq!(report.steps.delta.delta, 2500);
        assert_eq!(report.steps.delta.kind, DeltaKind::Advanced);
        assert!((report.distance.total_distance_m - 1900.0).abs() < 1e-9);
        assert_eq!(report.stamina.conversion.new_steps, 2500);
        assert_eq!(report.steps.award().map(|a| a.units), Some(2));
    }

    #[tokio::test]
    async fn repeated_cycles_do_not_double_count() {
        let clock = Arc::new(DebugClock::pinned(t0()));
        let service = service(&clock).await;
        let provider = ScriptedHealthProvider::new();
        provider
            .push(Sample {
                metric: Metric::Steps,
                at: t0() + chrono::Duration::minutes(10),
                value: 1200.0,
            })
            .await;
        clock.advance(chrono::Duration::hours(1));

        let first = sync_cycle(&service, &provider, SyncTrigger::SceneActive).await.unwrap();
        let second = sync_cycle(&service, &provider, SyncTrigger::PullToRefresh).await.unwrap();
        assert_eq!(first.steps.delta.delta, 1200);
        assert_eq!(second.steps.delta.delta, 0);
        assert_eq!(second.steps.delta.kind, DeltaKind::Unchanged);
        assert!(second.steps.experience.is_none());
        assert_eq!(second.stamina.conversion.new_steps, 0);
        assert_eq!(service.tracker_state().await.unwrap().total_steps, 1200);
    }

    #[tokio::test]
    async fn empty_window_is_no_data_not_a_regression() {
        let clock = Arc::new(DebugClock::pinned(t0()));
        let service = service(&clock).await;
        let provider = ScriptedHealthProvider::new();
        let walked_at = t0() + chrono::Duration::minutes(30);
        let steps = Sample { metric: Metric::Steps, at: walked_at, value: 2500.0 };
        let distance = Sample { metric: Metric::WalkingDistance, at: walked_at, value: 1900.0 };
        provider.push(steps).await;
        provider.push(distance).await;
        clock.advance(chrono::Duration::hours(1));

        let first = sync_cycle(&service, &provider, SyncTrigger::Foreground).await.unwrap();
        assert_eq!(first.steps.delta.delta, 2500);

        provider.clear(Metric::Steps).await;
        provider.clear(Metric::WalkingDistance).await;
        let empty = sync_cycle(&service, &provider, SyncTrigger::PullToRefresh).await.unwrap();
        assert_eq!(empty.steps.delta.kind, DeltaKind::NoReading);
        assert_eq!(empty.distance.kind, DeltaKind::NoReading);
        assert_eq!(empty.steps.delta.delta, 0);
        assert!(empty.steps.award().is_none());
        assert!((empty.distance.total_distance_m - 1900.0).abs() < 1e-9);
        let tracker = service.tracker_state().await.unwrap();
        assert_eq!(tracker.last_synced_steps, 2500);
        assert!((tracker.last_synced_distance_m - 1900.0).abs() < 1e-9);

        provider.push(steps).await;
        provider.push(distance).await;
        let back = sync_cycle(&service, &provider, SyncTrigger::Foreground).await.unwrap();
        assert_eq!(back.steps.delta.kind, DeltaKind::Unchanged);
        assert_eq!(back.steps.delta.delta, 0);
        assert!(back.steps.award().is_none());
        assert!((back.distance.total_distance_m - 1900.0).abs() < 1e-9);

        let tracker = service.tracker_state().await.unwrap();
        assert_eq!(tracker.total_steps, 2500);
        assert_eq!(service.wallet().await.unwrap().crystals, 50);
        assert_eq!(back.stamina.conversion.new_steps, 0);
    }

    #[tokio::test]
    async fn denied_access_leaves_state_untouched() {
        let clock = Arc::new(DebugClock::pinned(t0()));
        let service = service(&clock).await;
        let provider = ScriptedHealthProvider::denied();

        let err = sync_cycle(&service, &provider, SyncTrigger::Foreground).await.unwrap_err();
        assert!(matches!(err, SyncError::Upstream(HealthError::Denied)));
        assert_eq!(service.tracker_state().await.unwrap().total_steps, 0);
    }

    #[tokio::test]
    async fn background_refresh_abandons_at_deadline() {
        let clock = Arc::new(DebugClock::pinned(t0()));
        let service = service(&clock).await;

        let err = background_refresh(&service, &StalledProvider, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::DeadlineElapsed { deadline_ms: 20 }));
    }

    #[tokio::test]
    async fn change_notifications_trigger_cycles() {
        let clock = Arc::new(DebugClock::pinned(t0()));
        let service = Arc::new(service(&clock).await);
        let provider = Arc::new(ScriptedHealthProvider::new());
        let mut steps = service.subscribe_steps();
        clock.advance(chrono::Duration::hours(1));

        let watcher = watch_changes(Arc::clone(&service), Arc::clone(&provider), Metric::Steps);
        provider
            .push(Sample {
                metric: Metric::Steps,
                at: t0() + chrono::Duration::minutes(5),
                value: 800.0,
            })
            .await;

        let seen = tokio::time::timeout(Duration::from_secs(5), steps.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.delta, 800);
        watcher.abort();
    }
}
