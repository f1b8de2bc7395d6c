//! Rank derivation from cumulative steps.
//!
//! Same subtract-while-above algorithm as levels, on its own curve and
//! driven by the tracker's canonical step total. The stored rank is only
//! a write-avoidance cache; [`RankUpdate::changed`] tells the caller when
//! it needs persisting.

use sampo_types::{RankProgression, RankState};

use crate::config::RankConfig;
use crate::curve::{RankCurve, derive_position};
use crate::error::EngineError;

/// Result of recomputing the rank for a new total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankUpdate {
    /// Rank view for the new total.
    pub progression: RankProgression,
    /// Rank before this update.
    pub previous_rank: u32,
    /// Whether the rank differs from the last stored value.
    pub changed: bool,
}

/// Derive the rank view for a cumulative step total.
pub fn derive_rank(curve: &RankCurve, total_steps: u64) -> RankProgression {
    #[allow(clippy::cast_precision_loss)]
    let position = derive_position(curve, total_steps as f64);
    RankProgression {
        rank: position.tier,
        steps_into_current_rank: position.into_tier,
        steps_for_next_rank: position.tier_cost,
        progress: position.fraction,
        total_steps,
    }
}

/// Derives rank tiers from cumulative steps.
#[derive(Debug, Clone, PartialEq)]
pub struct RankEngine {
    state: RankState,
    curve: RankCurve,
    progression: RankProgression,
}

impl RankEngine {
    /// Build the engine with the last stored rank and the current total.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] for invalid curve
    /// parameters.
    pub fn new(state: RankState, config: &RankConfig, total_steps: u64) -> Result<Self, EngineError> {
        let curve = RankCurve::from_config(config)?;
        let progression = derive_rank(&curve, total_steps);
        Ok(Self {
            state,
            curve,
            progression,
        })
    }

    /// Last stored rank.
    pub const fn state(&self) -> RankState {
        self.state
    }

    /// Rank view for the most recent total.
    pub const fn progression(&self) -> RankProgression {
        self.progression
    }

    /// Recompute the rank for a new cumulative total.
    pub fn recompute(&mut self, total_steps: u64) -> RankUpdate {
        let previous_rank = self.state.current_rank;
        self.progression = derive_rank(&self.curve, total_steps);
        let changed = self.progression.rank != previous_rank;
        if changed {
            self.state.current_rank = self.progression.rank;
            if self.progression.rank > previous_rank {
                tracing::info!(from = previous_rank, to = self.progression.rank, total_steps, "rank up");
            } else {
                tracing::debug!(from = previous_rank, to = self.progression.rank, "rank rederived");
            }
        }
        RankUpdate {
            progression: self.progression,
            previous_rank,
            changed,
        }
    }

    /// Return to rank 0 with no steps.
    pub fn reset(&mut self) {
        self.state = RankState::default();
        self.progression = derive_rank(&self.curve, 0);
    }
}
