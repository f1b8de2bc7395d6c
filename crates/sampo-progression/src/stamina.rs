//! Daily step-to-stamina conversion.
//!
//! Stamina is fed by *today's* step total, not the cumulative tracker. A
//! daily watermark records how many of today's steps were already
//! converted; it resets when the calendar day changes.
//!
//! Walking can never overfill stamina. Gains are clipped at the maximum,
//! and once stamina sits at or above the maximum (only items can push it
//! there) step gains are withheld entirely. The steps still count as
//! consumed.

use rust_decimal::Decimal;
use sampo_types::{CalendarDay, StaminaSnapshot, StaminaState, StaminaWatermark};

use crate::config::StaminaConfig;
use crate::error::EngineError;

/// What a conversion did to stamina.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Today's total did not exceed the watermark.
    NoNewSteps,
    /// The full gain was added.
    Applied,
    /// The gain was cut off at the maximum.
    ClippedAtMax,
    /// Stamina was already at or above the maximum; nothing was added.
    WithheldAtCap,
}

/// Result of one step-to-stamina conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaminaConversion {
    /// Steps newly consumed by this conversion.
    pub new_steps: u64,
    /// Stamina the new steps were worth.
    pub gained: Decimal,
    /// Stamina actually added.
    pub applied: Decimal,
    /// How the gain was treated.
    pub outcome: ConversionOutcome,
    /// Whether the daily watermark was reset for a new day first.
    pub rolled_over: bool,
    /// Stamina after the conversion.
    pub snapshot: StaminaSnapshot,
}

fn overflow(context: &str) -> EngineError {
    EngineError::ArithmeticOverflow {
        context: context.to_owned(),
    }
}

/// Owns stamina and its daily conversion watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaminaEngine {
    state: StaminaState,
    watermark: StaminaWatermark,
    steps_per_unit: Decimal,
    level: u32,
}

impl StaminaEngine {
    /// Stamina state for a first launch: empty, with maximum parameters
    /// taken from configuration.
    pub const fn initial_state(config: &StaminaConfig) -> StaminaState {
        StaminaState {
            current: Decimal::ZERO,
            base_max: config.base_max,
            level_bonus_per_level: config.level_bonus_per_level,
            equipment_bonus: config.equipment_bonus,
        }
    }

    /// Build the engine over persisted state at the given player level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] if `steps_per_unit` is 0.
    pub fn new(
        state: StaminaState,
        watermark: StaminaWatermark,
        config: &StaminaConfig,
        level: u32,
    ) -> Result<Self, EngineError> {
        if config.steps_per_unit == 0 {
            return Err(EngineError::InvalidParameter {
                field: "steps_per_unit",
                reason: "must be at least 1".to_owned(),
            });
        }
        let mut state = state;
        if state.current.is_sign_negative() {
            state.current = Decimal::ZERO;
        }
        Ok(Self {
            state,
            watermark,
            steps_per_unit: Decimal::from(config.steps_per_unit),
            level,
        })
    }

    /// Current durable stamina state.
    pub const fn state(&self) -> StaminaState {
        self.state
    }

    /// Current daily watermark.
    pub const fn watermark(&self) -> StaminaWatermark {
        self.watermark
    }

    /// Player level the maximum is computed for.
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Maximum stamina at the current level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ArithmeticOverflow`] if the bonuses overflow.
    pub fn max(&self) -> Result<Decimal, EngineError> {
        self.state
            .max_for_level(self.level)
            .ok_or_else(|| overflow("maximum stamina"))
    }

    /// Current and maximum stamina.
    ///
    /// # Errors
    ///
    /// See [`StaminaEngine::max`].
    pub fn snapshot(&self) -> Result<StaminaSnapshot, EngineError> {
        Ok(StaminaSnapshot {
            current: self.state.current,
            max: self.max()?,
            level: self.level,
        })
    }

    /// Follow a change of the derived player level.
    pub const fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    /// Convert today's new steps into stamina.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ArithmeticOverflow`] on decimal overflow. The
    /// engine is left unchanged in that case.
    pub fn apply_step_delta(
        &mut self,
        total_steps_today: u64,
        today: CalendarDay,
    ) -> Result<StaminaConversion, EngineError> {
        let mut watermark = self.watermark;
        let rolled_over = watermark.last_sync_day != Some(today);
        if rolled_over {
            watermark.last_converted_steps = 0;
            watermark.last_sync_day = Some(today);
        }

        let new_steps = total_steps_today.saturating_sub(watermark.last_converted_steps);
        if new_steps == 0 {
            self.watermark = watermark;
            return Ok(StaminaConversion {
                new_steps,
                gained: Decimal::ZERO,
                applied: Decimal::ZERO,
                outcome: ConversionOutcome::NoNewSteps,
                rolled_over,
                snapshot: self.snapshot()?,
            });
        }

        let gained = Decimal::from(new_steps)
            .checked_div(self.steps_per_unit)
            .ok_or_else(|| overflow("stamina gain"))?;
        let max = self.max()?;
        let current = self.state.current;

        let (next, outcome) = if current >= max {
            (current, ConversionOutcome::WithheldAtCap)
        } else {
            let potential = current
                .checked_add(gained)
                .ok_or_else(|| overflow("stamina after gain"))?;
            if potential > max {
                (max, ConversionOutcome::ClippedAtMax)
            } else {
                (potential, ConversionOutcome::Applied)
            }
        };
        let applied = next.checked_sub(current).unwrap_or(Decimal::ZERO);

        self.state.current = next;
        watermark.last_converted_steps = total_steps_today;
        self.watermark = watermark;

        match outcome {
            ConversionOutcome::WithheldAtCap => tracing::debug!(
                new_steps,
                current = %self.state.current,
                max = %max,
                "stamina at cap, step gain withheld"
            ),
            _ => tracing::debug!(
                new_steps,
                gained = %gained,
                applied = %applied,
                current = %self.state.current,
                "steps converted to stamina"
            ),
        }

        Ok(StaminaConversion {
            new_steps,
            gained,
            applied,
            outcome,
            rolled_over,
            snapshot: StaminaSnapshot {
                current: self.state.current,
                max,
                level: self.level,
            },
        })
    }

    /// Add stamina from a consumable item. May exceed the maximum.
    ///
    /// Non-positive amounts are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ArithmeticOverflow`] on decimal overflow.
    pub fn apply_item(&mut self, amount: Decimal) -> Result<StaminaSnapshot, EngineError> {
        if amount > Decimal::ZERO {
            self.state.current = self
                .state
                .current
                .checked_add(amount)
                .ok_or_else(|| overflow("stamina after item"))?;
            tracing::info!(amount = %amount, current = %self.state.current, "stamina item used");
        }
        self.snapshot()
    }

    /// Feed `watermark + steps` as today's total.
    ///
    /// # Errors
    ///
    /// See [`StaminaEngine::apply_step_delta`].
    pub fn debug_add_steps(
        &mut self,
        steps: u64,
        today: CalendarDay,
    ) -> Result<StaminaConversion, EngineError> {
        let simulated = self.watermark.last_converted_steps.saturating_add(steps);
        self.apply_step_delta(simulated, today)
    }

    /// Set stamina to exactly the maximum.
    ///
    /// # Errors
    ///
    /// See [`StaminaEngine::max`].
    pub fn refill_to_max(&mut self) -> Result<StaminaSnapshot, EngineError> {
        self.state.current = self.max()?;
        self.snapshot()
    }

    /// Set stamina to zero.
    ///
    /// # Errors
    ///
    /// See [`StaminaEngine::max`].
    pub fn drain(&mut self) -> Result<StaminaSnapshot, EngineError> {
        self.state.current = Decimal::ZERO;
        self.snapshot()
    }

    /// Replace the equipment bonus on the maximum. Negative values count as 0.
    ///
    /// # Errors
    ///
    /// See [`StaminaEngine::max`].
    pub fn set_equipment_bonus(&mut self, bonus: Decimal) -> Result<StaminaSnapshot, EngineError> {
        self.state.equipment_bonus = bonus.max(Decimal::ZERO);
        self.snapshot()
    }
}
