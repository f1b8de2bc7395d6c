//! Step-to-progression conversion engines.
//!
//! This crate contains the logic layer -- everything that turns a raw
//! cumulative step reading into game state without touching I/O. It sits
//! between `sampo-types` (the data structures) and `sampo-core` (which
//! serializes access through actors and persists state).
//!
//! Every engine is a plain synchronous struct. Routine conditions such as
//! a missing reading, a counter regression, or stamina already at its cap
//! are outcomes, not errors.
//!
//! # Modules
//!
//! - [`activity`] -- Calorie, distance, and daily-goal estimates
//! - [`config`] -- Tunable curve and conversion parameters ([`ProgressionConfig`])
//! - [`currency`] -- Exactly-once currency awards and the wallet
//! - [`curve`] -- Geometric cost curves and the subtract-while-above derivation
//! - [`error`] -- Error types ([`EngineError`])
//! - [`experience`] -- Experience accumulation and level derivation
//! - [`rank`] -- Rank derivation from cumulative steps
//! - [`stamina`] -- Daily step-to-stamina conversion with overflow policy
//! - [`tracker`] -- Raw cumulative reading to monotone delta

pub mod activity;
pub mod config;
pub mod currency;
pub mod curve;
pub mod error;
pub mod experience;
pub mod rank;
pub mod stamina;
pub mod tracker;

// Re-export primary types at crate root for convenience.
pub use activity::DailyActivity;
pub use config::{
    ActivityConfig, CurrencyConfig, ExperienceConfig, ProgressionConfig, RankConfig,
    StaminaConfig,
};
pub use currency::CurrencyAwardEngine;
pub use curve::{CostCurve, LevelCurve, RankCurve, TierPosition, derive_position};
pub use error::EngineError;
pub use experience::{ExperienceEngine, ExperienceGain, derive_progression};
pub use rank::{RankEngine, RankUpdate, derive_rank};
pub use stamina::{ConversionOutcome, StaminaConversion, StaminaEngine};
pub use tracker::CumulativeStepTracker;
