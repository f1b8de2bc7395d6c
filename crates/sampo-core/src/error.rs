//! Error types for the service layer.

use sampo_progression::EngineError;
use sampo_store::StoreError;

use crate::health::HealthError;

/// Errors surfaced by [`ProgressionService`](crate::ProgressionService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// An engine actor has stopped and can no longer take requests.
    #[error("{actor} actor is not running")]
    ActorStopped {
        /// Name of the actor.
        actor: &'static str,
    },

    /// Durable state could not be loaded or reset.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An engine rejected its parameters or overflowed.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Errors that abort a sync cycle before or while feeding the engines.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The health-data provider was unavailable or refused access.
    #[error("health data unavailable: {0}")]
    Upstream(#[from] HealthError),

    /// The cycle did not finish before its deadline and was abandoned.
    #[error("sync abandoned after {deadline_ms}ms deadline")]
    DeadlineElapsed {
        /// The deadline in milliseconds.
        deadline_ms: u64,
    },

    /// The service rejected a request.
    #[error(transparent)]
    Service(#[from] ServiceError),
}
