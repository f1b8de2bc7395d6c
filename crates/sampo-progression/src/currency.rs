//! Exactly-once currency awards.
//!
//! Every full block of `steps_per_unit` cumulative steps is worth one award
//! unit. The engine remembers how many units it already paid and grants
//! only the difference, so evaluating the same or a smaller total again is
//! a no-op.

use chrono::{DateTime, Utc};
use sampo_types::{AwardEvent, AwardId, Currency, CurrencyState, Wallet};

use crate::config::CurrencyConfig;
use crate::error::EngineError;

/// Pays currency for crossed award-unit boundaries and holds the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyAwardEngine {
    state: CurrencyState,
    wallet: Wallet,
    config: CurrencyConfig,
}

impl CurrencyAwardEngine {
    /// Build the engine over persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameter`] if `steps_per_unit` is 0.
    pub fn new(
        state: CurrencyState,
        wallet: Wallet,
        config: &CurrencyConfig,
    ) -> Result<Self, EngineError> {
        if config.steps_per_unit == 0 {
            return Err(EngineError::InvalidParameter {
                field: "steps_per_unit",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            state,
            wallet,
            config: config.clone(),
        })
    }

    /// Award watermark.
    pub const fn state(&self) -> CurrencyState {
        self.state
    }

    /// Current balances.
    pub const fn wallet(&self) -> Wallet {
        self.wallet
    }

    /// Units a cumulative total is worth.
    pub fn units_for(&self, total_steps: u64) -> u64 {
        total_steps
            .checked_div(self.config.steps_per_unit)
            .unwrap_or(0)
    }

    /// Grant currency for any units crossed since the last award.
    ///
    /// Returns `None` and leaves state untouched when no new unit was
    /// crossed.
    pub fn evaluate(&mut self, total_steps: u64, now: DateTime<Utc>) -> Option<AwardEvent> {
        let units = self.units_for(total_steps);
        let diff = units.checked_sub(self.state.last_awarded_units)?;
        if diff == 0 {
            return None;
        }

        let amount = diff.saturating_mul(self.config.unit_reward);
        self.credit(self.config.currency, amount);
        self.state.last_awarded_units = units;

        tracing::info!(
            units = diff,
            amount,
            currency = %self.config.currency,
            awarded_through = units,
            "currency awarded"
        );

        Some(AwardEvent {
            id: AwardId::new(),
            currency: self.config.currency,
            amount,
            units: diff,
            awarded_through_units: units,
            awarded_at: now,
            display_duration_ms: self.config.toast_duration_ms,
        })
    }

    /// Add to a balance. Zero amounts are ignored.
    pub const fn credit(&mut self, currency: Currency, amount: u64) {
        if amount == 0 {
            return;
        }
        match currency {
            Currency::Crystal => self.wallet.crystals = self.wallet.crystals.saturating_add(amount),
            Currency::Silver => self.wallet.silver = self.wallet.silver.saturating_add(amount),
        }
    }

    /// Zero the award watermark. Balances are kept.
    pub const fn reset(&mut self) {
        self.state.last_awarded_units = 0;
    }

    /// Empty both balances. The award watermark is kept.
    pub const fn reset_currencies(&mut self) {
        self.wallet = Wallet {
            crystals: 0,
            silver: 0,
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn engine() -> CurrencyAwardEngine {
        CurrencyAwardEngine::new(
            CurrencyState::default(),
            Wallet::default(),
            &CurrencyConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn below_first_unit_awards_nothing() {
        let mut engine = engine();
        assert!(engine.evaluate(999, Utc::now()).is_none());
        assert_eq!(engine.state().last_awarded_units, 0);
    }

    #[test]
    fn pays_each_unit_exactly_once() {
        let mut engine = engine();
        let award = engine.evaluate(2500, Utc::now()).unwrap();
        assert_eq!(award.units, 2);
        assert_eq!(award.amount, 50);
        assert_eq!(award.currency, Currency::Crystal);
        assert!(engine.evaluate(2999, Utc::now()).is_none());
        assert_eq!(engine.wallet().crystals, 50);
    }

    #[test]
    fn replaying_smaller_totals_never_pays() {
        let mut engine = engine();
        engine.evaluate(4200, Utc::now());
        for total in [4200, 4000, 3000, 10, 0] {
            assert!(engine.evaluate(total, Utc::now()).is_none());
        }
        assert_eq!(engine.wallet().crystals, 100);
        assert_eq!(engine.state().last_awarded_units, 4);
    }

    #[test]
    fn award_carries_toast_duration() {
        let mut engine = engine();
        let award = engine.evaluate(1000, Utc::now()).unwrap();
        assert_eq!(award.display_duration_ms, 3000);
        assert_eq!(award.awarded_through_units, 1);
    }

    #[test]
    fn reset_rearms_awards_but_keeps_balance() {
        let mut engine = engine();
        engine.evaluate(3000, Utc::now());
        engine.reset();
        assert_eq!(engine.wallet().crystals, 75);
        let award = engine.evaluate(1000, Utc::now()).unwrap();
        assert_eq!(award.amount, 25);
        assert_eq!(engine.wallet().crystals, 100);
    }

    #[test]
    fn silver_credit_and_currency_reset() {
        let mut engine = engine();
        engine.credit(Currency::Silver, 12);
        engine.credit(Currency::Silver, 0);
        engine.evaluate(1000, Utc::now());
        assert_eq!(engine.wallet().silver, 12);
        engine.reset_currencies();
        assert_eq!(engine.wallet(), Wallet::default());
        assert_eq!(engine.state().last_awarded_units, 1);
    }
}
