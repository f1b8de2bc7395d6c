//! Derived progression views.
//!
//! These are recomputed from durable counters every time they are needed
//! and are never persisted. Fractional values are kept unrounded; the
//! `display_*` helpers round only for presentation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Round a non-negative quantity to the nearest whole number for display.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn display_round(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Player level derived from total experience.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerProgression {
    /// Current level, starting at 1.
    pub level: u32,
    /// Experience accumulated inside the current level.
    pub current_exp_into_level: f64,
    /// Experience the current level costs in total.
    pub exp_required_for_next_level: f64,
    /// `current_exp_into_level / exp_required_for_next_level`, in `[0, 1]`.
    pub progress_fraction: f64,
    /// Total experience the view was derived from.
    pub total_experience: f64,
}

impl PlayerProgression {
    /// Experience into the level, rounded for display.
    pub fn display_current_exp(&self) -> u64 {
        display_round(self.current_exp_into_level)
    }

    /// Experience required for the next level, rounded for display.
    pub fn display_next_level_exp(&self) -> u64 {
        display_round(self.exp_required_for_next_level)
    }
}

/// Rank tier derived from cumulative steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankProgression {
    /// Current rank, starting at 0.
    pub rank: u32,
    /// Steps accumulated inside the current rank.
    pub steps_into_current_rank: f64,
    /// Steps the current rank costs in total.
    pub steps_for_next_rank: f64,
    /// `steps_into_current_rank / steps_for_next_rank`, in `[0, 1]`.
    pub progress: f64,
    /// Cumulative steps the view was derived from.
    pub total_steps: u64,
}

impl RankProgression {
    /// Steps still needed to reach the next rank, rounded for display.
    pub fn steps_remaining_for_next_rank(&self) -> u64 {
        display_round(self.steps_for_next_rank - self.steps_into_current_rank)
    }

    /// Steps into the current rank, rounded for display.
    pub fn display_steps_into_rank(&self) -> u64 {
        display_round(self.steps_into_current_rank)
    }
}

/// Stamina as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaSnapshot {
    /// Current stamina.
    pub current: Decimal,
    /// Maximum at the player's current level.
    pub max: Decimal,
    /// Player level the maximum was computed for.
    pub level: u32,
}

impl StaminaSnapshot {
    /// Whether stamina sits above the maximum (only possible via items).
    pub fn is_overfilled(&self) -> bool {
        self.current > self.max
    }
}
