//! Tunable parameters for the conversion engines.
//!
//! These structs appear verbatim under the matching keys of
//! `sampo-config.yaml`. Every field has a default equal to the reference
//! game balance, so an empty file yields a playable configuration.
//! [`ProgressionConfig::validate`] rejects values that would make a curve
//! degenerate (zero cost, shrinking tiers) or a conversion divide by zero.

use rust_decimal::Decimal;
use sampo_types::Currency;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// All engine parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Experience and level curve.
    #[serde(default)]
    pub experience: ExperienceConfig,

    /// Rank curve.
    #[serde(default)]
    pub rank: RankConfig,

    /// Stamina conversion and maximum.
    #[serde(default)]
    pub stamina: StaminaConfig,

    /// Currency awards.
    #[serde(default)]
    pub currency: CurrencyConfig,

    /// Activity estimates.
    #[serde(default)]
    pub activity: ActivityConfig,
}

impl ProgressionConfig {
    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] naming the first invalid
    /// field.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.experience.validate()?;
        self.rank.validate()?;
        self.stamina.validate()?;
        self.currency.validate()?;
        self.activity.validate()
    }
}

fn invalid(field: &'static str, reason: &str) -> EngineError {
    EngineError::InvalidParameter {
        field,
        reason: reason.to_owned(),
    }
}

/// Experience curve: `level_cost(level) = base_exp * level ^ exponent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceConfig {
    /// Cost of level 1 (default: 500).
    #[serde(default = "default_base_exp")]
    pub base_exp: f64,

    /// Growth exponent (default: 1.1).
    #[serde(default = "default_exponent")]
    pub exponent: f64,

    /// Experience earned per step (default: 1.0). Reserved for boosts.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            base_exp: default_base_exp(),
            exponent: default_exponent(),
            multiplier: default_multiplier(),
        }
    }
}

impl ExperienceConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if !(self.base_exp.is_finite() && self.base_exp > 0.0) {
            return Err(invalid("experience.base_exp", "must be a positive number"));
        }
        if !(self.exponent.is_finite() && self.exponent >= 0.0) {
            return Err(invalid("experience.exponent", "must be a non-negative number"));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 0.0) {
            return Err(invalid("experience.multiplier", "must be a non-negative number"));
        }
        Ok(())
    }
}

/// Rank curve: `tier_cost(rank) = base_steps_per_rank * growth_factor ^ rank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    /// Steps needed for the first rank (default: 1000).
    #[serde(default = "default_base_steps_per_rank")]
    pub base_steps_per_rank: f64,

    /// Per-rank cost multiplier (default: 1.005).
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            base_steps_per_rank: default_base_steps_per_rank(),
            growth_factor: default_growth_factor(),
        }
    }
}

impl RankConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if !(self.base_steps_per_rank.is_finite() && self.base_steps_per_rank > 0.0) {
            return Err(invalid("rank.base_steps_per_rank", "must be a positive number"));
        }
        if !(self.growth_factor.is_finite() && self.growth_factor >= 1.0) {
            return Err(invalid("rank.growth_factor", "must be at least 1.0"));
        }
        Ok(())
    }
}

/// Stamina conversion and maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaConfig {
    /// Steps exchanged for one stamina unit (default: 10).
    #[serde(default = "default_steps_per_stamina")]
    pub steps_per_unit: u64,

    /// Maximum stamina before bonuses (default: 1000).
    #[serde(default = "default_base_max_stamina")]
    pub base_max: Decimal,

    /// Maximum added per player level (default: 10).
    #[serde(default = "default_level_bonus")]
    pub level_bonus_per_level: Decimal,

    /// Maximum added by equipment (default: 0).
    #[serde(default)]
    pub equipment_bonus: Decimal,
}

impl Default for StaminaConfig {
    fn default() -> Self {
        Self {
            steps_per_unit: default_steps_per_stamina(),
            base_max: default_base_max_stamina(),
            level_bonus_per_level: default_level_bonus(),
            equipment_bonus: Decimal::ZERO,
        }
    }
}

impl StaminaConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.steps_per_unit == 0 {
            return Err(invalid("stamina.steps_per_unit", "must be at least 1"));
        }
        if self.base_max.is_sign_negative() {
            return Err(invalid("stamina.base_max", "must not be negative"));
        }
        if self.level_bonus_per_level.is_sign_negative() {
            return Err(invalid("stamina.level_bonus_per_level", "must not be negative"));
        }
        if self.equipment_bonus.is_sign_negative() {
            return Err(invalid("stamina.equipment_bonus", "must not be negative"));
        }
        Ok(())
    }
}

/// Currency awards for cumulative steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Cumulative steps per award unit (default: 1000).
    #[serde(default = "default_steps_per_award")]
    pub steps_per_unit: u64,

    /// Amount granted per unit (default: 25).
    #[serde(default = "default_unit_reward")]
    pub unit_reward: u64,

    /// Currency granted (default: crystal).
    #[serde(default = "default_award_currency")]
    pub currency: Currency,

    /// How long the award notification stays visible (default: 3000 ms).
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            steps_per_unit: default_steps_per_award(),
            unit_reward: default_unit_reward(),
            currency: default_award_currency(),
            toast_duration_ms: default_toast_duration_ms(),
        }
    }
}

impl CurrencyConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.steps_per_unit == 0 {
            return Err(invalid("currency.steps_per_unit", "must be at least 1"));
        }
        Ok(())
    }
}

/// Parameters for activity estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Daily step goal (default: 10000).
    #[serde(default = "default_daily_goal")]
    pub daily_goal_steps: u64,

    /// Stride length in metres used to estimate distance (default: 0.76).
    #[serde(default = "default_stride_length")]
    pub stride_length_m: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            daily_goal_steps: default_daily_goal(),
            stride_length_m: default_stride_length(),
        }
    }
}

impl ActivityConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if !(self.stride_length_m.is_finite() && self.stride_length_m > 0.0) {
            return Err(invalid("activity.stride_length_m", "must be a positive number"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_base_exp() -> f64 {
    500.0
}

const fn default_exponent() -> f64 {
    1.1
}

const fn default_multiplier() -> f64 {
    1.0
}

const fn default_base_steps_per_rank() -> f64 {
    1000.0
}

const fn default_growth_factor() -> f64 {
    1.005
}

const fn default_steps_per_stamina() -> u64 {
    10
}

const fn default_base_max_stamina() -> Decimal {
    Decimal::ONE_THOUSAND
}

const fn default_level_bonus() -> Decimal {
    Decimal::TEN
}

const fn default_steps_per_award() -> u64 {
    1000
}

const fn default_unit_reward() -> u64 {
    25
}

const fn default_award_currency() -> Currency {
    Currency::Crystal
}

const fn default_toast_duration_ms() -> u64 {
    3000
}

const fn default_daily_goal() -> u64 {
    10_000
}

const fn default_stride_length() -> f64 {
    0.76
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ProgressionConfig::default().validate().is_ok());
    }

    #[test]
    fn shrinking_rank_curve_is_rejected() {
        let mut config = ProgressionConfig::default();
        config.rank.growth_factor = 0.99;
        let err = config.validate();
        assert!(matches!(
            err,
            Err(EngineError::InvalidParameter {
                field: "rank.growth_factor",
                ..
            })
        ));
    }

    #[test]
    fn zero_steps_per_stamina_is_rejected() {
        let mut config = ProgressionConfig::default();
        config.stamina.steps_per_unit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_base_exp_is_rejected() {
        let mut config = ProgressionConfig::default();
        config.experience.base_exp = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ProgressionConfig =
            serde_json::from_str(r#"{"rank": {"growth_factor": 1.01}}"#).unwrap_or_default();
        assert_eq!(config.rank.base_steps_per_rank.to_string(), "1000");
        assert_eq!(config.rank.growth_factor.to_string(), "1.01");
        assert_eq!(config.currency.unit_reward, 25);
        assert_eq!(config.stamina.base_max, Decimal::ONE_THOUSAND);
    }
}
