//! End-to-end tests for [`ProgressionService`] over an in-memory store.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use sampo_core::{AppConfig, DebugClock, ProgressionService, ServiceError};
use sampo_progression::ConversionOutcome;
use sampo_store::{MemoryStore, Persistence};
use sampo_types::{Currency, DeltaKind};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap()
}

async fn start(kv: &MemoryStore, clock: &Arc<DebugClock>) -> ProgressionService<MemoryStore> {
    ProgressionService::start(kv.clone(), AppConfig::default(), clock.clone())
        .await
        .expect("service should start")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn walk_converts_into_level_rank_and_crystals() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    let mut awards = service.subscribe_awards();

    let first = service.report_raw_total(Some(0.0), t0()).await.unwrap();
    assert_eq!(first.delta.delta, 0);
    assert!(first.experience.is_none());

    let second = service
        .report_raw_total(Some(2500.0), t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(second.delta.delta, 2500);
    let award = second.award().expect("two units crossed");
    assert_eq!(award.units, 2);
    assert_eq!(award.amount, 50);
    assert_eq!(award.display_duration_ms, 3000);

    let third = service
        .report_raw_total(Some(5200.0), t0() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(third.delta.delta, 2700);
    assert_eq!(third.award().map(|a| a.amount), Some(75));
    assert!(!third.any_persistence_failed());

    let player = service.player_progression().await.unwrap();
    assert_eq!(player.level, 4);
    assert!((player.current_exp_into_level - 1954.04).abs() < 0.05);
    assert!(approx(player.total_experience, 5200.0));

    let rank = service.rank_progression().await.unwrap();
    assert_eq!(rank.rank, 5);
    assert_eq!(rank.total_steps, 5200);

    let wallet = service.wallet().await.unwrap();
    assert_eq!(wallet.crystals, 125);
    assert_eq!(wallet.silver, 0);

    assert_eq!(awards.recv().await.unwrap().amount, 50);
    assert_eq!(awards.recv().await.unwrap().amount, 75);

    service.shutdown().await;
}

#[tokio::test]
async fn regression_is_resynced_not_subtracted() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;

    let mut deltas = Vec::new();
    for raw in [1000.0, 400.0, 900.0] {
        deltas.push(service.report_raw_total(Some(raw), t0()).await.unwrap().delta);
    }
    assert_eq!(deltas.iter().map(|d| d.delta).collect::<Vec<_>>(), [1000, 0, 500]);
    assert_eq!(deltas[1].kind, DeltaKind::Resynced);

    let state = service.tracker_state().await.unwrap();
    assert_eq!(state.last_synced_steps, 900);
    assert_eq!(state.total_steps, 1500);
    assert!(approx(service.player_progression().await.unwrap().total_experience, 1500.0));
}

#[tokio::test]
async fn missing_reading_changes_nothing() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    service.report_raw_total(Some(700.0), t0()).await.unwrap();

    let report = service.report_raw_total(None, t0()).await.unwrap();
    assert_eq!(report.delta.kind, DeltaKind::NoReading);
    assert_eq!(report.persistence, Persistence::Skipped);
    assert_eq!(service.tracker_state().await.unwrap().last_synced_steps, 700);

    // NaN and negative readings are treated as zero, which is a regression.
    let report = service.report_raw_total(Some(f64::NAN), t0()).await.unwrap();
    assert_eq!(report.delta.delta, 0);
    assert_eq!(service.tracker_state().await.unwrap().total_steps, 700);
}

#[tokio::test]
async fn concurrent_identical_readings_count_once() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = Arc::new(start(&kv, &clock).await);

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service.report_raw_total(Some(3000.0), t0()).await.unwrap()
        }));
    }
    let mut advanced = 0;
    let mut crystals_awarded = 0;
    for task in tasks {
        let report = task.await.unwrap();
        if report.delta.delta > 0 {
            advanced += 1;
        }
        crystals_awarded += report.award().map_or(0, |a| a.amount);
    }

    assert_eq!(advanced, 1);
    assert_eq!(crystals_awarded, 75);
    assert_eq!(service.tracker_state().await.unwrap().total_steps, 3000);
    assert_eq!(service.wallet().await.unwrap().crystals, 75);
}

#[tokio::test]
async fn concurrent_readings_keep_engines_consistent() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = Arc::new(start(&kv, &clock).await);

    let mut tasks = Vec::new();
    for i in 1..=40_u32 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            let raw = f64::from(i % 8 + 1) * 450.0;
            service.report_raw_total(Some(raw), t0()).await.unwrap()
        }));
    }
    let mut summed = 0;
    for task in tasks {
        summed += task.await.unwrap().delta.delta;
    }

    let total = service.tracker_state().await.unwrap().total_steps;
    assert_eq!(total, summed);
    let player = service.player_progression().await.unwrap();
    assert!(approx(player.total_experience, f64::from(u32::try_from(total).unwrap())));
    assert_eq!(service.rank_progression().await.unwrap().total_steps, total);
    assert_eq!(service.wallet().await.unwrap().crystals, total / 1000 * 25);
}

#[tokio::test]
async fn write_failures_are_advisory() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;

    kv.set_fail_writes(true).await;
    let report = service.report_raw_total(Some(1800.0), t0()).await.unwrap();
    assert!(report.persistence.is_failed());
    assert!(report.any_persistence_failed());
    // In-memory state is kept.
    assert_eq!(service.tracker_state().await.unwrap().total_steps, 1800);
    assert_eq!(service.wallet().await.unwrap().crystals, 25);

    kv.set_fail_writes(false).await;
    let retry = service.report_raw_total(Some(1800.0), t0()).await.unwrap();
    assert_eq!(retry.delta.kind, DeltaKind::Unchanged);
    assert_eq!(retry.persistence, Persistence::Saved);
    service.shutdown().await;

    let restarted = start(&kv, &clock).await;
    let state = restarted.tracker_state().await.unwrap();
    assert_eq!(state.total_steps, 1800);
    assert_eq!(state.last_synced_steps, 1800);
}

#[tokio::test]
async fn state_survives_restart_and_awards_stay_exactly_once() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    service.report_raw_total(Some(5200.0), t0()).await.unwrap();
    service.report_today_steps(5200).await.unwrap();
    service.credit(Currency::Silver, 40).await.unwrap();
    let baseline = service.tracker_state().await.unwrap().baseline_instant;
    service.shutdown().await;

    clock.advance(Duration::hours(3));
    let service = start(&kv, &clock).await;
    let state = service.tracker_state().await.unwrap();
    assert_eq!(state.baseline_instant, baseline);
    assert_eq!(state.total_steps, 5200);
    assert_eq!(service.player_progression().await.unwrap().level, 4);
    assert_eq!(service.rank_progression().await.unwrap().rank, 5);
    assert_eq!(service.stamina().await.unwrap().current, dec!(520));
    let wallet = service.wallet().await.unwrap();
    assert_eq!((wallet.crystals, wallet.silver), (125, 40));

    let again = service.report_raw_total(Some(5200.0), t0()).await.unwrap();
    assert_eq!(again.delta.delta, 0);
    assert!(again.award().is_none());
    assert_eq!(service.wallet().await.unwrap().crystals, 125);
}

#[tokio::test]
async fn torn_stamina_write_never_converts_steps_twice() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    let before = service.stamina().await.unwrap().current;

    kv.fail_after_writes(1).await;
    let first = service.report_today_steps(3000).await.unwrap();
    assert!(first.persistence.is_failed());
    assert_eq!(first.conversion.new_steps, 3000);
    service.shutdown().await;

    kv.set_fail_writes(false).await;
    let service = start(&kv, &clock).await;
    assert_eq!(service.stamina().await.unwrap().current, before);
    let again = service.report_today_steps(3000).await.unwrap();
    assert_eq!(again.conversion.new_steps, 0);
    assert_eq!(service.stamina().await.unwrap().current, before);
}

#[tokio::test]
async fn reset_discards_progress_but_keeps_stamina_and_wallet() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    service.report_raw_total(Some(5200.0), t0()).await.unwrap();
    service.report_today_steps(5200).await.unwrap();

    clock.advance(Duration::hours(1));
    let report = service.reset_all().await.unwrap();
    assert_eq!(report.persistence, Persistence::Saved);
    assert_eq!(report.baseline_instant, t0() + Duration::hours(1));

    let state = service.tracker_state().await.unwrap();
    assert_eq!(state.baseline_instant, t0() + Duration::hours(1));
    assert_eq!((state.total_steps, state.last_synced_steps), (0, 0));
    assert_eq!(service.player_progression().await.unwrap().level, 1);
    assert_eq!(service.rank_progression().await.unwrap().rank, 0);
    assert_eq!(service.wallet().await.unwrap().crystals, 125);
    assert_eq!(service.stamina().await.unwrap().current, dec!(520));

    // Award thresholds start over from the new baseline.
    let report = service.report_raw_total(Some(1000.0), t0()).await.unwrap();
    assert_eq!(report.award().map(|a| a.amount), Some(25));
    assert_eq!(service.wallet().await.unwrap().crystals, 150);
}

#[tokio::test]
async fn unjournaled_reset_fails_without_changing_state() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    service.report_raw_total(Some(2000.0), t0()).await.unwrap();

    kv.set_fail_writes(true).await;
    let err = service.reset_all().await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    assert_eq!(service.tracker_state().await.unwrap().total_steps, 2000);
    assert!(approx(service.player_progression().await.unwrap().total_experience, 2000.0));
}

#[tokio::test]
async fn interrupted_reset_is_rolled_forward_on_start() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    service.report_raw_total(Some(5200.0), t0()).await.unwrap();

    // Journal, baseline and the step watermark land; everything after fails.
    clock.advance(Duration::hours(2));
    kv.fail_after_writes(3).await;
    let report = service.reset_all().await.unwrap();
    assert!(report.persistence.is_failed());
    assert_eq!(service.tracker_state().await.unwrap().total_steps, 0);
    service.shutdown().await;

    let raw = kv.dump().await;
    assert!(raw.contains_key("reset:pending"));
    assert_eq!(raw.get("tracker:total_steps").map(String::as_str), Some("5200"));

    kv.set_fail_writes(false).await;
    let service = start(&kv, &clock).await;
    assert!(!kv.dump().await.contains_key("reset:pending"));
    let state = service.tracker_state().await.unwrap();
    assert_eq!(state.baseline_instant, t0() + Duration::hours(2));
    assert_eq!(state.total_steps, 0);
    assert_eq!(service.player_progression().await.unwrap().level, 1);
    assert_eq!(service.rank_progression().await.unwrap().rank, 0);
    assert_eq!(service.wallet().await.unwrap().crystals, 125);

    let report = service.report_raw_total(Some(1000.0), t0()).await.unwrap();
    assert_eq!(report.award().map(|a| a.units), Some(1));
}

#[tokio::test]
async fn stamina_watermark_rolls_over_at_local_midnight() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;

    let first = service.report_today_steps(3000).await.unwrap();
    assert_eq!(first.conversion.new_steps, 3000);
    assert_eq!(first.conversion.snapshot.current, dec!(300));

    let repeat = service.report_today_steps(3000).await.unwrap();
    assert_eq!(repeat.conversion.new_steps, 0);
    assert_eq!(repeat.conversion.outcome, ConversionOutcome::NoNewSteps);

    clock.advance(Duration::days(1));
    let next_day = service.report_today_steps(500).await.unwrap();
    assert!(next_day.conversion.rolled_over);
    assert_eq!(next_day.conversion.new_steps, 500);
    assert_eq!(next_day.conversion.snapshot.current, dec!(350));
}

#[tokio::test]
async fn items_overfill_and_step_gains_are_withheld() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;

    let refilled = service.refill_stamina().await.unwrap();
    assert_eq!(refilled.snapshot.current, refilled.snapshot.max);

    let item = service.apply_stamina_item(dec!(200)).await.unwrap();
    assert!(item.snapshot.is_overfilled());

    let walked = service.report_today_steps(1000).await.unwrap();
    assert_eq!(walked.conversion.outcome, ConversionOutcome::WithheldAtCap);
    assert_eq!(walked.conversion.snapshot.current, item.snapshot.current);

    let drained = service.drain_stamina().await.unwrap();
    assert_eq!(drained.snapshot.current, dec!(0));

    // Debug steps ride on today's watermark.
    let debug = service.debug_add_steps(400).await.unwrap();
    assert_eq!(debug.conversion.new_steps, 400);
    assert_eq!(debug.conversion.snapshot.current, dec!(40));
}

#[tokio::test]
async fn level_ups_raise_maximum_stamina() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    let before = service.stamina().await.unwrap().max;

    service.report_raw_total(Some(5200.0), t0()).await.unwrap();
    let after = service.stamina().await.unwrap();
    assert_eq!(after.level, 4);
    assert_eq!(after.max - before, dec!(30));

    let bonus = service.set_equipment_bonus(dec!(50)).await.unwrap();
    assert_eq!(bonus.snapshot.max, after.max + dec!(50));
}

#[tokio::test]
async fn wallet_reset_is_separate_from_progress_reset() {
    let kv = MemoryStore::new();
    let clock = Arc::new(DebugClock::pinned(t0()));
    let service = start(&kv, &clock).await;
    service.report_raw_total(Some(2000.0), t0()).await.unwrap();
    service.credit(Currency::Silver, 0).await.unwrap();
    service.credit(Currency::Silver, 15).await.unwrap();

    let update = service.reset_currencies().await.unwrap();
    assert_eq!((update.wallet.crystals, update.wallet.silver), (0, 0));
    assert_eq!(service.tracker_state().await.unwrap().total_steps, 2000);

    // Already-paid units are not paid again.
    let report = service.report_raw_total(Some(2500.0), t0()).await.unwrap();
    assert!(report.award().is_none());
}
