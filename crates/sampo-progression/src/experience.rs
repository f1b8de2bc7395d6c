//! Experience accumulation and level derivation.
//!
//! Each accepted step delta adds `delta * multiplier` experience. The level
//! is never stored: [`derive_progression`] re-runs the level curve over the
//! total on every read.

use sampo_types::{ExperienceState, PlayerProgression};

use crate::config::ExperienceConfig;
use crate::curve::{LevelCurve, derive_position};
use crate::error::EngineError;

/// Result of applying one step delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperienceGain {
    /// Experience added by this delta.
    pub gained: f64,
    /// Progression before the delta.
    pub before: PlayerProgression,
    /// Progression after the delta.
    pub after: PlayerProgression,
}

impl ExperienceGain {
    /// Whether the delta crossed at least one level boundary.
    pub const fn leveled_up(&self) -> bool {
        self.after.level > self.before.level
    }
}

/// Derive the level view for a given experience total.
pub fn derive_progression(curve: &LevelCurve, total_experience: f64) -> PlayerProgression {
    let position = derive_position(curve, total_experience);
    PlayerProgression {
        level: position.tier,
        current_exp_into_level: position.into_tier,
        exp_required_for_next_level: position.tier_cost,
        progress_fraction: position.fraction,
        total_experience: total_experience.max(0.0),
    }
}

/// Accumulates experience and derives the player level.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceEngine {
    state: ExperienceState,
    curve: LevelCurve,
    multiplier: f64,
}

impl ExperienceEngine {
    /// Build the engine over persisted state.
    ///
    /// A negative or non-finite persisted total is treated as zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] if the curve parameters
    /// are invalid.
    pub fn new(state: ExperienceState, config: &ExperienceConfig) -> Result<Self, EngineError> {
        let curve = LevelCurve::from_config(config)?;
        let multiplier = if config.multiplier.is_finite() && config.multiplier >= 0.0 {
            config.multiplier
        } else {
            return Err(EngineError::InvalidParameter {
                field: "multiplier",
                reason: format!("must be non-negative, got {}", config.multiplier),
            });
        };
        let total = state.total_experience;
        let state = ExperienceState {
            total_experience: if total.is_finite() && total > 0.0 { total } else { 0.0 },
        };
        Ok(Self {
            state,
            curve,
            multiplier,
        })
    }

    /// Current durable state.
    pub const fn state(&self) -> ExperienceState {
        self.state
    }

    /// Level view derived from the current total.
    pub fn progression(&self) -> PlayerProgression {
        derive_progression(&self.curve, self.state.total_experience)
    }

    /// Current level.
    pub fn level(&self) -> u32 {
        self.progression().level
    }

    /// Add experience for a newly observed step delta.
    pub fn apply_step_delta(&mut self, delta: u64) -> ExperienceGain {
        let before = self.progression();
        #[allow(clippy::cast_precision_loss)]
        let gained = delta as f64 * self.multiplier;
        if gained > 0.0 {
            self.state.total_experience += gained;
        }
        let after = self.progression();

        if after.level > before.level {
            tracing::info!(
                from = before.level,
                to = after.level,
                total_experience = self.state.total_experience,
                "level up"
            );
        } else {
            tracing::debug!(delta, gained, "experience applied");
        }

        ExperienceGain {
            gained: gained.max(0.0),
            before,
            after,
        }
    }

    /// Zero the experience total.
    pub const fn reset(&mut self) {
        self.state.total_experience = 0.0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn engine() -> ExperienceEngine {
        ExperienceEngine::new(ExperienceState::default(), &ExperienceConfig::default()).unwrap()
    }

    #[test]
    fn fresh_player_is_level_one() {
        let view = engine().progression();
        assert_eq!(view.level, 1);
        assert!(view.current_exp_into_level.abs() < EPS);
        assert!((view.exp_required_for_next_level - 500.0).abs() < EPS);
    }

    #[test]
    fn crossing_first_threshold_levels_up() {
        let mut engine = engine();
        let gain = engine.apply_step_delta(499);
        assert!(!gain.leveled_up());
        let gain = engine.apply_step_delta(1);
        assert!(gain.leveled_up());
        assert_eq!(gain.after.level, 2);
        assert!(gain.after.current_exp_into_level.abs() < EPS);
    }

    #[test]
    fn five_thousand_two_hundred_steps_is_level_four() {
        let mut engine = engine();
        engine.apply_step_delta(5200);
        let view = engine.progression();
        assert_eq!(view.level, 4);
        assert!((view.current_exp_into_level - 1954.04).abs() < 0.05);
        assert!((view.exp_required_for_next_level - 2297.4).abs() < 0.05);
        assert!(view.progress_fraction > 0.0 && view.progress_fraction < 1.0);
    }

    #[test]
    fn incremental_equals_all_at_once() {
        let mut incremental = engine();
        for delta in [120, 3, 777, 0, 4100, 200] {
            incremental.apply_step_delta(delta);
        }
        let mut bulk = engine();
        bulk.apply_step_delta(5200);
        let a = incremental.progression();
        let b = bulk.progression();
        assert_eq!(a.level, b.level);
        assert!((a.current_exp_into_level - b.current_exp_into_level).abs() < EPS);
        assert!((a.progress_fraction - b.progress_fraction).abs() < EPS);
    }

    #[test]
    fn derivation_is_repeatable() {
        let engine = {
            let mut e = engine();
            e.apply_step_delta(3333);
            e
        };
        assert_eq!(engine.progression(), engine.progression());
    }

    #[test]
    fn multiplier_scales_gain() {
        let config = ExperienceConfig {
            multiplier: 2.0,
            ..ExperienceConfig::default()
        };
        let mut engine = ExperienceEngine::new(ExperienceState::default(), &config).unwrap();
        let gain = engine.apply_step_delta(250);
        assert!((gain.gained - 500.0).abs() < EPS);
        assert_eq!(engine.level(), 2);
    }

    #[test]
    fn corrupt_persisted_total_is_clamped() {
        let state = ExperienceState {
            total_experience: -40.0,
        };
        let engine = ExperienceEngine::new(state, &ExperienceConfig::default()).unwrap();
        assert!(engine.state().total_experience.abs() < EPS);
    }

    #[test]
    fn reset_returns_to_level_one() {
        let mut engine = engine();
        engine.apply_step_delta(10_000);
        engine.reset();
        assert_eq!(engine.level(), 1);
    }
}
