//! Durable engine state.
//!
//! Each struct here is owned by exactly one engine and persisted under that
//! engine's key namespace. Derived values (level, rank, maximum stamina)
//! are never stored here as a source of truth; they are recomputed from
//! these counters on every read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarDay;
use crate::enums::Currency;

/// Watermarks and running totals of the cumulative step tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    /// Instant from which cumulative readings are measured.
    pub baseline_instant: DateTime<Utc>,
    /// Last raw cumulative step reading already converted.
    pub last_synced_steps: u64,
    /// Last raw cumulative distance reading (metres) already converted.
    pub last_synced_distance_m: f64,
    /// Sum of accepted step deltas since the baseline.
    pub total_steps: u64,
    /// Sum of accepted distance deltas (metres) since the baseline.
    pub total_distance_m: f64,
    /// Observation time of the most recent accepted step reading.
    pub last_observed_at: Option<DateTime<Utc>>,
}

impl TrackerState {
    /// Fresh state anchored at `baseline_instant` with every counter at zero.
    pub const fn anchored_at(baseline_instant: DateTime<Utc>) -> Self {
        Self {
            baseline_instant,
            last_synced_steps: 0,
            last_synced_distance_m: 0.0,
            total_steps: 0,
            total_distance_m: 0.0,
            last_observed_at: None,
        }
    }
}

/// Accumulated experience, the sole input of level derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceState {
    /// Total experience earned since the last reset. Never negative.
    pub total_experience: f64,
}

/// Stamina resource and the parameters of its maximum.
///
/// `current` may exceed the maximum after an item is used; step conversion
/// never pushes it there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaState {
    /// Current stamina. Never negative.
    pub current: Decimal,
    /// Maximum before level and equipment bonuses.
    pub base_max: Decimal,
    /// Maximum added per player level.
    pub level_bonus_per_level: Decimal,
    /// Maximum added by equipped items.
    pub equipment_bonus: Decimal,
}

impl StaminaState {
    /// `base_max + level * level_bonus_per_level + equipment_bonus`.
    ///
    /// Returns `None` on decimal overflow.
    pub fn max_for_level(&self, level: u32) -> Option<Decimal> {
        self.level_bonus_per_level
            .checked_mul(Decimal::from(level))
            .and_then(|bonus| self.base_max.checked_add(bonus))
            .and_then(|max| max.checked_add(self.equipment_bonus))
    }
}

/// Daily watermark used by stamina conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaWatermark {
    /// Today's step total already converted into stamina.
    pub last_converted_steps: u64,
    /// Day the watermark belongs to; `None` before the first conversion.
    pub last_sync_day: Option<CalendarDay>,
}

/// Rank tier last written to durable storage.
///
/// Stored only as a write-avoidance cache; the displayed rank is always
/// derived from the tracker's cumulative total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankState {
    /// Rank that was last persisted.
    pub current_rank: u32,
}

/// Watermark of the currency award engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyState {
    /// Award units (blocks of cumulative steps) already paid out. Only
    /// increases, except on an explicit progress reset.
    pub last_awarded_units: u64,
}

/// Currency balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Crystal balance.
    pub crystals: u64,
    /// Silver balance.
    pub silver: u64,
}

impl Wallet {
    /// Balance held in the given currency.
    pub const fn balance(&self, currency: Currency) -> u64 {
        match currency {
            Currency::Crystal => self.crystals,
            Currency::Silver => self.silver,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn stamina() -> StaminaState {
        StaminaState {
            current: dec!(0),
            base_max: dec!(1000),
            level_bonus_per_level: dec!(10),
            equipment_bonus: dec!(5),
        }
    }

    #[test]
    fn max_stamina_combines_base_level_and_equipment() {
        assert_eq!(stamina().max_for_level(3), Some(dec!(1035)));
        assert_eq!(stamina().max_for_level(1), Some(dec!(1015)));
    }

    #[test]
    fn fresh_tracker_is_zeroed() {
        let now = Utc::now();
        let state = TrackerState::anchored_at(now);
        assert_eq!(state.baseline_instant, now);
        assert_eq!(state.total_steps, 0);
        assert_eq!(state.last_synced_steps, 0);
        assert!(state.last_observed_at.is_none());
    }

    #[test]
    fn wallet_balance_by_currency() {
        let wallet = Wallet {
            crystals: 125,
            silver: 7,
        };
        assert_eq!(wallet.balance(Currency::Crystal), 125);
        assert_eq!(wallet.balance(Currency::Silver), 7);
    }

    #[test]
    fn stamina_state_round_trips_decimal_precision() {
        let mut state = stamina();
        state.current = dec!(12.3);
        let json = serde_json::to_string(&state).unwrap();
        let back: StaminaState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
