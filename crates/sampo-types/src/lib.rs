//! Shared type definitions for the Sampo step-progression engine.
//!
//! This crate is the single source of truth for the data that flows between
//! the store, the engines, and the service layer. It holds no logic beyond
//! constructors and pure accessors; every state transition lives in
//! `sampo-progression`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for award and sync identifiers
//! - [`enums`] -- Currencies, health metrics, sync triggers, baseline policy
//! - [`calendar`] -- [`CalendarDay`], the structural day value used for
//!   daily rollover
//! - [`state`] -- Durable engine state (watermarks, totals, stamina, wallet)
//! - [`progression`] -- Derived, recomputed-on-demand views for the UI layer
//! - [`events`] -- Step deltas and award events pushed to listeners

pub mod calendar;
pub mod enums;
pub mod events;
pub mod ids;
pub mod progression;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use calendar::CalendarDay;
pub use enums::{BaselinePolicy, Currency, DeltaKind, Metric, SyncTrigger};
pub use events::{AwardEvent, DistanceDelta, StepDelta};
pub use ids::{AwardId, SyncId};
pub use progression::{PlayerProgression, RankProgression, StaminaSnapshot};
pub use state::{
    CurrencyState, ExperienceState, RankState, StaminaState, StaminaWatermark, TrackerState,
    Wallet,
};
