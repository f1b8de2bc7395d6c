//! Cumulative step tracker.
//!
//! The health-data provider reports "steps since the baseline instant" as a
//! cumulative counter. The tracker turns that counter into non-negative
//! deltas against a watermark (`last_synced_steps`) and keeps the canonical
//! running total that rank and currency awards are derived from.
//!
//! # Rules
//!
//! - `delta = raw - watermark` when the reading is at or above the watermark.
//! - A reading below the watermark is a regression (for example a debug
//!   clock rewind). It is never subtracted: the watermark moves down to the
//!   reading and the delta is zero for this call only.
//! - The watermark is recorded on every accepted reading, even when the
//!   delta is zero.
//! - A missing reading changes nothing.
//! - Negative or non-finite readings are clamped to zero at the boundary.

use chrono::{DateTime, Utc};
use sampo_types::{BaselinePolicy, DeltaKind, DistanceDelta, StepDelta, TrackerState};

/// Convert a raw provider reading into a whole step count.
///
/// Negative, NaN and infinite readings become zero; fractional readings are
/// floored.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sanitize_steps(raw: f64) -> u64 {
    if raw.is_finite() && raw > 0.0 {
        raw.floor() as u64
    } else {
        0
    }
}

/// Convert a raw provider distance reading into non-negative metres.
pub fn sanitize_distance(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 { raw } else { 0.0 }
}

/// Converts raw cumulative readings into deltas and running totals.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeStepTracker {
    state: TrackerState,
}

impl CumulativeStepTracker {
    /// Resume a tracker from persisted state.
    pub const fn from_state(state: TrackerState) -> Self {
        Self { state }
    }

    /// Create the tracker for a first launch at `now`.
    pub fn first_launch(policy: BaselinePolicy, now: DateTime<Utc>) -> Self {
        Self::from_state(TrackerState::anchored_at(policy.anchor(now)))
    }

    /// Current state.
    pub const fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Instant cumulative readings are measured from.
    pub const fn baseline_instant(&self) -> DateTime<Utc> {
        self.state.baseline_instant
    }

    /// Canonical cumulative step total.
    pub const fn total_steps(&self) -> u64 {
        self.state.total_steps
    }

    /// Feed the latest raw cumulative step reading.
    ///
    /// `None` means the provider had nothing to report this cycle; the
    /// tracker state is left untouched.
    pub fn report_raw_total(
        &mut self,
        raw_steps_since_baseline: Option<f64>,
        observed_at: DateTime<Utc>,
    ) -> StepDelta {
        let Some(raw) = raw_steps_since_baseline else {
            return StepDelta {
                delta: 0,
                total_steps: self.state.total_steps,
                watermark: self.state.last_synced_steps,
                kind: DeltaKind::NoReading,
                observed_at,
            };
        };

        let reading = sanitize_steps(raw);
        let watermark = self.state.last_synced_steps;

        let (delta, kind) = match reading.checked_sub(watermark) {
            Some(0) => (0, DeltaKind::Unchanged),
            Some(delta) => (delta, DeltaKind::Advanced),
            None => {
                tracing::warn!(
                    reading,
                    watermark,
                    "step counter regressed, resynchronizing watermark"
                );
                (0, DeltaKind::Resynced)
            }
        };

        self.state.last_synced_steps = reading;
        self.state.total_steps = self.state.total_steps.saturating_add(delta);
        self.state.last_observed_at = Some(
            self.state
                .last_observed_at
                .map_or(observed_at, |last| last.max(observed_at)),
        );

        tracing::debug!(
            reading,
            delta,
            total_steps = self.state.total_steps,
            ?kind,
            "step reading applied"
        );

        StepDelta {
            delta,
            total_steps: self.state.total_steps,
            watermark: reading,
            kind,
            observed_at,
        }
    }

    /// Feed the latest raw cumulative distance reading in metres.
    ///
    /// Follows the same watermark rules as [`report_raw_total`] with its own
    /// watermark.
    ///
    /// [`report_raw_total`]: CumulativeStepTracker::report_raw_total
    pub fn report_raw_distance(&mut self, raw_metres_since_baseline: Option<f64>) -> DistanceDelta {
        let Some(raw) = raw_metres_since_baseline else {
            return DistanceDelta {
                delta_m: 0.0,
                total_distance_m: self.state.total_distance_m,
                kind: DeltaKind::NoReading,
            };
        };

        let reading = sanitize_distance(raw);
        let watermark = self.state.last_synced_distance_m;

        let (delta_m, kind) = if reading > watermark {
            (reading - watermark, DeltaKind::Advanced)
        } else if reading < watermark {
            tracing::warn!(reading, watermark, "distance counter regressed, resynchronizing");
            (0.0, DeltaKind::Resynced)
        } else {
            (0.0, DeltaKind::Unchanged)
        };

        self.state.last_synced_distance_m = reading;
        self.state.total_distance_m += delta_m;

        DistanceDelta {
            delta_m,
            total_distance_m: self.state.total_distance_m,
            kind,
        }
    }

    /// Re-anchor the baseline at `to` and zero the watermarks and totals.
    ///
    /// Engine watermarks downstream (experience, rank, currency) are not
    /// touched here; a full reset goes through the store's compound reset.
    pub fn reset_baseline(&mut self, to: DateTime<Utc>) {
        self.state = TrackerState::anchored_at(to);
    }
}
