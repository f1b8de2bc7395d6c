//! Daily activity estimates.
//!
//! Rule of thumb: walking burns about 1 kcal per kilogram of body mass
//! per kilometre.

use sampo_types::CalendarDay;
use serde::{Deserialize, Serialize};

use crate::config::ActivityConfig;

/// Estimated kcal burned walking `distance_m` metres at `weight_kg`.
pub fn calories_from_distance(distance_m: f64, weight_kg: f64) -> f64 {
    if !(distance_m.is_finite() && weight_kg.is_finite()) || distance_m <= 0.0 || weight_kg <= 0.0 {
        return 0.0;
    }
    weight_kg * (distance_m / 1000.0)
}

/// Estimated metres walked in `steps` at the given stride.
#[allow(clippy::cast_precision_loss)]
pub fn distance_from_steps(steps: u64, stride_length_m: f64) -> f64 {
    if stride_length_m.is_finite() && stride_length_m > 0.0 {
        steps as f64 * stride_length_m
    } else {
        0.0
    }
}

/// Fraction of the daily goal reached, clamped to `[0, 1]`. A zero goal
/// yields 0.
#[allow(clippy::cast_precision_loss)]
pub fn goal_fraction(steps: u64, goal_steps: u64) -> f64 {
    if goal_steps == 0 {
        return 0.0;
    }
    (steps as f64 / goal_steps as f64).clamp(0.0, 1.0)
}

/// One day's walking summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    /// Day summarized.
    pub day: CalendarDay,
    /// Steps walked.
    pub steps: u64,
    /// Metres walked, measured or estimated from stride.
    pub distance_m: f64,
    /// Estimated kcal burned; 0 when body mass is unknown.
    pub calories_kcal: f64,
    /// Fraction of the daily goal reached.
    pub goal_fraction: f64,
    /// Steps still missing to reach the goal.
    pub steps_to_goal: u64,
}

impl DailyActivity {
    /// Summarize a day. A missing distance reading is estimated from the
    /// configured stride.
    pub fn summarize(
        day: CalendarDay,
        steps: u64,
        distance_m: Option<f64>,
        weight_kg: Option<f64>,
        config: &ActivityConfig,
    ) -> Self {
        let distance_m = distance_m
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or_else(|| distance_from_steps(steps, config.stride_length_m));
        let calories_kcal = weight_kg.map_or(0.0, |w| calories_from_distance(distance_m, w));
        Self {
            day,
            steps,
            distance_m,
            calories_kcal,
            goal_fraction: goal_fraction(steps, config.daily_goal_steps),
            steps_to_goal: config.daily_goal_steps.saturating_sub(steps),
        }
    }

    /// Whether the goal was reached.
    pub const fn goal_reached(&self) -> bool {
        self.steps_to_goal == 0
    }
}
