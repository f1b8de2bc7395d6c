//! Configuration loading and typed config structures.
//!
//! The configuration lives in `sampo-config.yaml` (path overridable with
//! `SAMPO_CONFIG`). The engine parameters sit at the top level next to the
//! host settings; every key is optional and defaults to the reference game
//! balance.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use sampo_progression::ProgressionConfig;
use sampo_types::BaselinePolicy;
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "SAMPO_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "sampo-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its valid range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `sampo-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Engine parameters (`experience`, `rank`, `stamina`, `currency`,
    /// `activity`).
    #[serde(flatten)]
    pub progression: ProgressionConfig,

    /// Calendar and baseline settings.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Durable store selection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Actor and sync tuning.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Path of the configuration file: `SAMPO_CONFIG` or
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Load and validate configuration from a YAML file.
    ///
    /// `DRAGONFLY_URL` overrides `store.dragonfly_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_file`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.store.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check every value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.progression
            .validate()
            .map_err(|e| ConfigError::Invalid {
                reason: e.to_string(),
            })?;
        if self.clock.offset().is_none() {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "clock.utc_offset_minutes must be within +/-1439, got {}",
                    self.clock.utc_offset_minutes
                ),
            });
        }
        if self.sync.mailbox_capacity == 0 || self.sync.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "sync.mailbox_capacity and sync.event_capacity must be at least 1"
                    .to_owned(),
            });
        }
        Ok(())
    }
}

/// Calendar and baseline settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Local offset from UTC in minutes, used for the calendar day.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Where the baseline is anchored on first launch.
    #[serde(default)]
    pub baseline_policy: BaselinePolicy,
}

impl ClockConfig {
    /// The configured offset, or `None` if out of range.
    pub fn offset(self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}

/// Which key/value backend holds durable state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process map; state is lost on exit.
    #[default]
    Memory,
    /// `Dragonfly` (Redis-compatible) instance.
    Dragonfly,
}

/// Durable store selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Prefix prepended to every key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl StoreConfig {
    /// Override the Dragonfly URL with `DRAGONFLY_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Actor and sync tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Time budget of a background refresh in milliseconds.
    #[serde(default = "default_background_deadline_ms")]
    pub background_deadline_ms: u64,

    /// Capacity of each engine actor's mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Capacity of each change-notification channel. Slow listeners skip
    /// ahead once it is exceeded.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            background_deadline_ms: default_background_deadline_ms(),
            mailbox_capacity: default_mailbox_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes
    /// precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_key_prefix() -> String {
    "sampo".to_owned()
}

const fn default_background_deadline_ms() -> u64 {
    25_000
}

const fn default_mailbox_capacity() -> usize {
    64
}

const fn default_event_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = AppConfig::parse("{}").unwrap();
        assert_eq!(config.progression, ProgressionConfig::default());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.sync.background_deadline_ms, 25_000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.clock.baseline_policy, BaselinePolicy::Now);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
experience:
  base_exp: 400
  exponent: 1.2
rank:
  base_steps_per_rank: 2000
  growth_factor: 1.01
stamina:
  steps_per_unit: 20
  base_max: 500
currency:
  steps_per_unit: 500
  unit_reward: 10
  currency: silver
  toast_duration_ms: 1500
activity:
  daily_goal_steps: 8000
clock:
  utc_offset_minutes: 540
  baseline_policy: full_history
store:
  backend: dragonfly
  key_prefix: test
sync:
  background_deadline_ms: 5000
logging:
  level: debug
  format: json
";
        let config = AppConfig::parse(yaml).unwrap();
        assert!((config.progression.experience.base_exp - 400.0).abs() < 1e-9);
        assert!((config.progression.rank.growth_factor - 1.01).abs() < 1e-9);
        assert_eq!(config.progression.stamina.steps_per_unit, 20);
        assert_eq!(config.progression.currency.unit_reward, 10);
        assert_eq!(config.progression.currency.currency, sampo_types::Currency::Silver);
        assert_eq!(config.progression.activity.daily_goal_steps, 8000);
        assert_eq!(config.clock.offset().unwrap().local_minus_utc(), 540 * 60);
        assert_eq!(config.clock.baseline_policy, BaselinePolicy::FullHistory);
        assert_eq!(config.store.backend, StoreBackend::Dragonfly);
        assert_eq!(config.store.key_prefix, "test");
        assert_eq!(config.sync.background_deadline_ms, 5000);
        assert_eq!(config.sync.mailbox_capacity, 64);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn shrinking_rank_curve_is_rejected() {
        let err = AppConfig::parse("rank:\n  growth_factor: 0.9\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let err = AppConfig::parse("clock:\n  utc_offset_minutes: 1440\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = AppConfig::parse("experience: [1, 2");
        assert!(matches!(err, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/sampo-config.yaml"));
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }
}
