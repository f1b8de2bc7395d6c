//! Geometric cost curves and tier derivation.
//!
//! Level and rank share one algorithm: start at the curve's first tier and
//! repeatedly subtract the tier's cost while the remaining quantity covers
//! it. The terminal remainder is the progress inside the current tier and
//! the last evaluated cost is the size of that tier.
//!
//! Costs are computed in floating point and compared unrounded. Rounding
//! happens only in the display helpers of the derived views, so a player
//! can never stick just below a threshold because of accumulated rounding.
//!
//! Derivation is a pure function of `(curve, quantity)`. It is re-run on
//! every read and never patched incrementally.

use crate::config::{ExperienceConfig, RankConfig};
use crate::error::EngineError;

/// Upper bound on derived tiers. Keeps derivation bounded for any input.
pub const MAX_TIER: u32 = 1_000_000;

/// A cost curve over tiers.
pub trait CostCurve {
    /// The tier an empty quantity sits at.
    fn first_tier(&self) -> u32;

    /// Quantity needed to advance from `tier` to `tier + 1`.
    fn cost(&self, tier: u32) -> f64;
}

/// Level curve: `cost(level) = base_exp * level ^ exponent`, levels from 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelCurve {
    base_exp: f64,
    exponent: f64,
}

impl LevelCurve {
    /// Build a level curve.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] if `base_exp` is not
    /// positive or `exponent` is negative.
    pub fn new(base_exp: f64, exponent: f64) -> Result<Self, EngineError> {
        if !(base_exp.is_finite() && base_exp > 0.0) {
            return Err(EngineError::InvalidParameter {
                field: "base_exp",
                reason: format!("must be positive, got {base_exp}"),
            });
        }
        if !(exponent.is_finite() && exponent >= 0.0) {
            return Err(EngineError::InvalidParameter {
                field: "exponent",
                reason: format!("must be non-negative, got {exponent}"),
            });
        }
        Ok(Self { base_exp, exponent })
    }

    /// Build the curve described by an [`ExperienceConfig`].
    ///
    /// # Errors
    ///
    /// See [`LevelCurve::new`].
    pub fn from_config(config: &ExperienceConfig) -> Result<Self, EngineError> {
        Self::new(config.base_exp, config.exponent)
    }
}

impl CostCurve for LevelCurve {
    fn first_tier(&self) -> u32 {
        1
    }

    fn cost(&self, tier: u32) -> f64 {
        self.base_exp * f64::from(tier).powf(self.exponent)
    }
}

/// Rank curve: `cost(rank) = base_steps_per_rank * growth_factor ^ rank`,
/// ranks from 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankCurve {
    base_steps_per_rank: f64,
    growth_factor: f64,
}

impl RankCurve {
    /// Build a rank curve.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] if the base is not positive
    /// or the growth factor is below 1.
    pub fn new(base_steps_per_rank: f64, growth_factor: f64) -> Result<Self, EngineError> {
        if !(base_steps_per_rank.is_finite() && base_steps_per_rank > 0.0) {
            return Err(EngineError::InvalidParameter {
                field: "base_steps_per_rank",
                reason: format!("must be positive, got {base_steps_per_rank}"),
            });
        }
        if !(growth_factor.is_finite() && growth_factor >= 1.0) {
            return Err(EngineError::InvalidParameter {
                field: "growth_factor",
                reason: format!("must be at least 1.0, got {growth_factor}"),
            });
        }
        Ok(Self {
            base_steps_per_rank,
            growth_factor,
        })
    }

    /// Build the curve described by a [`RankConfig`].
    ///
    /// # Errors
    ///
    /// See [`RankCurve::new`].
    pub fn from_config(config: &RankConfig) -> Result<Self, EngineError> {
        Self::new(config.base_steps_per_rank, config.growth_factor)
    }
}

impl CostCurve for RankCurve {
    fn first_tier(&self) -> u32 {
        0
    }

    fn cost(&self, tier: u32) -> f64 {
        self.base_steps_per_rank * self.growth_factor.powf(f64::from(tier))
    }
}

/// Where a quantity sits on a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPosition {
    /// Current tier.
    pub tier: u32,
    /// Quantity accumulated inside the current tier.
    pub into_tier: f64,
    /// Total cost of the current tier.
    pub tier_cost: f64,
    /// `into_tier / tier_cost`, clamped to `[0, 1]`.
    pub fraction: f64,
}

/// Derive the tier position of `quantity` on `curve`.
///
/// Negative and non-finite quantities are treated as zero.
pub fn derive_position<C: CostCurve + ?Sized>(curve: &C, quantity: f64) -> TierPosition {
    let mut remaining = if quantity.is_finite() && quantity > 0.0 {
        quantity
    } else {
        0.0
    };
    let mut tier = curve.first_tier();
    let mut cost = curve.cost(tier);

    while cost.is_finite() && cost > 0.0 && remaining >= cost && tier < MAX_TIER {
        remaining -= cost;
        tier = tier.saturating_add(1);
        cost = curve.cost(tier);
    }

    let fraction = if cost.is_finite() && cost > 0.0 {
        (remaining / cost).clamp(0.0, 1.0)
    } else {
        0.0
    };

    TierPosition {
        tier,
        into_tier: remaining,
        tier_cost: cost,
        fraction,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn level_curve() -> LevelCurve {
        LevelCurve::new(500.0, 1.1).unwrap()
    }

    fn rank_curve() -> RankCurve {
        RankCurve::new(1000.0, 1.005).unwrap()
    }

    #[test]
    fn empty_quantity_sits_at_first_tier() {
        let pos = derive_position(&level_curve(), 0.0);
        assert_eq!(pos.tier, 1);
        assert!(pos.into_tier.abs() < EPS);
        assert!((pos.tier_cost - 500.0).abs() < EPS);

        let pos = derive_position(&rank_curve(), 0.0);
        assert_eq!(pos.tier, 0);
        assert!((pos.tier_cost - 1000.0).abs() < EPS);
    }

    #[test]
    fn exact_threshold_advances_tier() {
        let pos = derive_position(&level_curve(), 500.0);
        assert_eq!(pos.tier, 2);
        assert!(pos.into_tier.abs() < EPS);
        assert!((pos.tier_cost - 500.0 * 2f64.powf(1.1)).abs() < EPS);
    }

    #[test]
    fn just_below_threshold_stays() {
        let pos = derive_position(&rank_curve(), 999.999);
        assert_eq!(pos.tier, 0);
        assert!(pos.fraction < 1.0);
    }

    #[test]
    fn level_at_5200_experience() {
        // 500 + 1071.77 + 1674.2 = 3245.97; level 4 costs 2297.4.
        let pos = derive_position(&level_curve(), 5200.0);
        assert_eq!(pos.tier, 4);
        let consumed = 500.0 + 500.0 * 2f64.powf(1.1) + 500.0 * 3f64.powf(1.1);
        assert!((pos.into_tier - (5200.0 - consumed)).abs() < EPS);
        assert!((pos.tier_cost - 500.0 * 4f64.powf(1.1)).abs() < EPS);
    }

    #[test]
    fn rank_at_5200_steps() {
        // 1000 + 1005 + 1010.025 + 1015.075 + 1020.15 = 5050.25
        let pos = derive_position(&rank_curve(), 5200.0);
        assert_eq!(pos.tier, 5);
        assert!((pos.into_tier - 149.749_374).abs() < 1e-3);
    }

    #[test]
    fn derivation_is_pure() {
        let a = derive_position(&level_curve(), 12_345.6);
        let b = derive_position(&level_curve(), 12_345.6);
        assert_eq!(a.tier, b.tier);
        assert!((a.into_tier - b.into_tier).abs() < EPS);
        assert!((a.fraction - b.fraction).abs() < EPS);
    }

    #[test]
    fn fraction_stays_in_unit_interval() {
        for quantity in [0.0, 1.0, 499.9, 500.0, 10_000.0, 1e7] {
            let pos = derive_position(&level_curve(), quantity);
            assert!((0.0..=1.0).contains(&pos.fraction));
        }
    }

    #[test]
    fn negative_and_nan_quantities_count_as_zero() {
        assert_eq!(derive_position(&level_curve(), -50.0).tier, 1);
        assert_eq!(derive_position(&level_curve(), f64::NAN).tier, 1);
    }

    #[test]
    fn invalid_curves_are_rejected() {
        assert!(LevelCurve::new(0.0, 1.1).is_err());
        assert!(LevelCurve::new(500.0, -1.0).is_err());
        assert!(RankCurve::new(1000.0, 0.5).is_err());
        assert!(RankCurve::new(f64::INFINITY, 1.005).is_err());
    }

    #[test]
    fn flat_curve_is_bounded() {
        let flat = RankCurve::new(1.0, 1.0).unwrap();
        let pos = derive_position(&flat, 1e12);
        assert_eq!(pos.tier, MAX_TIER);
    }
}
