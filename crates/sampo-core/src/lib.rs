//! Runtime layer for the Sampo step-progression engine.
//!
//! Wires the pure engines from `sampo-progression` to durable state in
//! `sampo-store`. Each engine runs as its own actor; [`ProgressionService`]
//! owns the actors and is the only handle callers need.
//!
//! # Architecture
//!
//! ```text
//! HealthDataProvider --> sync_cycle --> ProgressionService
//!                                            |
//!                  TrackerActor --> ExperienceActor --> StaminaActor
//!                            \--> RankActor
//!                             \-> CurrencyActor
//!                                            |
//!                                  ProgressStore<S>
//! ```
//!
//! # Modules
//!
//! - [`actors`] -- One task per engine and the mailbox plumbing
//! - [`clock`] -- Wall clock, debug clock, local calendar
//! - [`config`] -- YAML configuration ([`AppConfig`])
//! - [`error`] -- Error types ([`ServiceError`], [`SyncError`])
//! - [`health`] -- The health-data collaborator and a scripted provider
//! - [`service`] -- [`ProgressionService`]
//! - [`sync`] -- Foreground, background and change-triggered sync cycles

pub mod actors;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod service;
pub mod sync;

// Re-export primary types at crate root for convenience.
pub use actors::currency::{CurrencyOutcome, WalletUpdate};
pub use actors::experience::ExperienceOutcome;
pub use actors::rank::RankOutcome;
pub use actors::stamina::{StaminaOutcome, StaminaUpdate};
pub use actors::tracker::ResetReport;
pub use clock::{Calendar, Clock, DebugClock, SystemClock};
pub use config::{AppConfig, ConfigError, LogFormat, StoreBackend};
pub use error::{ServiceError, SyncError};
pub use health::{HealthDataProvider, HealthError, Sample, ScriptedHealthProvider};
pub use service::{ProgressionService, StepReport};
pub use sync::{SyncReport, background_refresh, sync_cycle, watch_changes};
