//! Error types for the host binary.
//!
//! [`HostError`] is the top-level error type that wraps all possible
//! failure modes during start-up and feed replay.

use std::path::PathBuf;

/// Top-level error for the host binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: sampo_core::ConfigError,
    },

    /// The durable store could not be reached.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: sampo_store::StoreError,
    },

    /// The progression service failed.
    #[error("service error: {source}")]
    Service {
        /// The underlying service error.
        #[from]
        source: sampo_core::ServiceError,
    },

    /// A sync cycle failed.
    #[error("sync error: {source}")]
    Sync {
        /// The underlying sync error.
        #[from]
        source: sampo_core::SyncError,
    },

    /// Health-data access was refused.
    #[error("health data error: {source}")]
    Health {
        /// The underlying provider error.
        #[from]
        source: sampo_core::HealthError,
    },

    /// The recorded feed could not be read.
    #[error("failed to read feed {path}: {source}")]
    FeedIo {
        /// Feed path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The recorded feed is not valid JSON.
    #[error("invalid feed: {source}")]
    FeedFormat {
        /// The underlying parse error.
        #[from]
        source: serde_json::Error,
    },
}
