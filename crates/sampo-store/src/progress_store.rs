//! Namespaced, typed access to durable progress state.
//!
//! Each engine owns a disjoint key namespace. Values are JSON.
//!
//! # Key Patterns
//!
//! | Key | Type | Owner |
//! |-----|------|-------|
//! | `tracker:baseline_instant` | RFC 3339 timestamp | tracker |
//! | `tracker:last_synced_steps` | Integer | tracker |
//! | `tracker:last_synced_distance` | Number (metres) | tracker |
//! | `tracker:total_steps` | Integer | tracker |
//! | `tracker:total_distance` | Number (metres) | tracker |
//! | `tracker:last_observed_at` | RFC 3339 timestamp | tracker |
//! | `experience:total` | Number | experience |
//! | `stamina:state` | JSON | stamina |
//! | `stamina:watermark` | JSON | stamina |
//! | `rank:current` | Integer | rank |
//! | `currency:last_awarded_units` | Integer | currency |
//! | `wallet:balances` | JSON | currency |
//! | `reset:pending` | RFC 3339 timestamp | reset journal |
//!
//! # Compound reset
//!
//! The key/value store has no multi-key transactions, so
//! [`ProgressStore::reset_all`] journals the reset first and then writes in
//! a fixed order: baseline, watermarks, totals. A crash part-way leaves the
//! journal behind and [`ProgressStore::recover_pending_reset`] replays it
//! on the next start, before any engine loads its state.

use chrono::{DateTime, Utc};
use sampo_types::{
    BaselinePolicy, CurrencyState, ExperienceState, RankState, StaminaState, StaminaWatermark,
    TrackerState, Wallet,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::kv::KeyValueStore;

/// Key names.
pub mod keys {
    /// Instant cumulative readings are measured from.
    pub const BASELINE_INSTANT: &str = "tracker:baseline_instant";
    /// Last raw cumulative step reading converted.
    pub const LAST_SYNCED_STEPS: &str = "tracker:last_synced_steps";
    /// Last raw cumulative distance reading converted.
    pub const LAST_SYNCED_DISTANCE: &str = "tracker:last_synced_distance";
    /// Canonical cumulative step total.
    pub const TOTAL_STEPS: &str = "tracker:total_steps";
    /// Cumulative distance total.
    pub const TOTAL_DISTANCE: &str = "tracker:total_distance";
    /// Observation time of the last accepted reading.
    pub const LAST_OBSERVED_AT: &str = "tracker:last_observed_at";
    /// Total experience.
    pub const EXPERIENCE_TOTAL: &str = "experience:total";
    /// Stamina resource.
    pub const STAMINA_STATE: &str = "stamina:state";
    /// Daily stamina conversion watermark.
    pub const STAMINA_WATERMARK: &str = "stamina:watermark";
    /// Last persisted rank.
    pub const RANK_CURRENT: &str = "rank:current";
    /// Award units already paid.
    pub const CURRENCY_AWARDED_UNITS: &str = "currency:last_awarded_units";
    /// Currency balances.
    pub const WALLET: &str = "wallet:balances";
    /// Journal of an in-flight compound reset.
    pub const RESET_PENDING: &str = "reset:pending";
}

/// Outcome of a durable write that does not gate the in-memory update.
///
/// Engines keep their new in-memory state even when the write fails; the
/// next successful write reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    /// The state was written.
    Saved,
    /// Nothing needed writing.
    Skipped,
    /// The write failed.
    Failed {
        /// Error description.
        reason: String,
    },
}

impl Persistence {
    /// Convert a write result, logging failures.
    pub fn from_result(namespace: &str, result: Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => Self::Saved,
            Err(e) => {
                tracing::warn!(namespace, error = %e, "persistence failed, keeping in-memory state");
                Self::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Whether the write failed.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Typed progress state over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct ProgressStore<S> {
    kv: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    /// Wrap a key/value store.
    pub const fn new(kv: S) -> Self {
        Self { kv }
    }

    /// The underlying key/value store.
    pub const fn kv(&self) -> &S {
        &self.kv
    }

    // ---- generic JSON helpers ----

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.kv.set(key, json).await
    }

    // ---- start-up ----

    /// Bring durable state to a consistent starting point and load the
    /// tracker.
    ///
    /// Replays an interrupted reset if one is journaled. On first launch the
    /// tracker is anchored according to `policy` and written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read, or if recovery or
    /// the first-launch write fails.
    pub async fn initialize(
        &self,
        policy: BaselinePolicy,
        now: DateTime<Utc>,
    ) -> Result<TrackerState, StoreError> {
        if let Some(at) = self.recover_pending_reset().await? {
            tracing::info!(%at, "rolled forward interrupted reset");
        }
        if let Some(state) = self.load_tracker().await? {
            return Ok(state);
        }
        let state = TrackerState::anchored_at(policy.anchor(now));
        self.save_tracker(&state).await?;
        tracing::info!(baseline = %state.baseline_instant, ?policy, "first launch, baseline anchored");
        Ok(state)
    }

    // ---- tracker ----

    /// Load the tracker, or `None` if no baseline has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_tracker(&self) -> Result<Option<TrackerState>, StoreError> {
        let Some(baseline_instant) = self.get_json(keys::BASELINE_INSTANT).await? else {
            return Ok(None);
        };
        Ok(Some(TrackerState {
            baseline_instant,
            last_synced_steps: self.get_json(keys::LAST_SYNCED_STEPS).await?.unwrap_or(0),
            last_synced_distance_m: self
                .get_json(keys::LAST_SYNCED_DISTANCE)
                .await?
                .unwrap_or(0.0),
            total_steps: self.get_json(keys::TOTAL_STEPS).await?.unwrap_or(0),
            total_distance_m: self.get_json(keys::TOTAL_DISTANCE).await?.unwrap_or(0.0),
            last_observed_at: self.get_json(keys::LAST_OBSERVED_AT).await?,
        }))
    }

    /// Write the tracker: baseline, then watermarks, then totals.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failed write.
    pub async fn save_tracker(&self, state: &TrackerState) -> Result<(), StoreError> {
        self.set_json(keys::BASELINE_INSTANT, &state.baseline_instant).await?;
        self.set_json(keys::LAST_SYNCED_STEPS, &state.last_synced_steps).await?;
        self.set_json(keys::LAST_SYNCED_DISTANCE, &state.last_synced_distance_m)
            .await?;
        self.set_json(keys::TOTAL_STEPS, &state.total_steps).await?;
        self.set_json(keys::TOTAL_DISTANCE, &state.total_distance_m).await?;
        match state.last_observed_at {
            Some(at) => self.set_json(keys::LAST_OBSERVED_AT, &at).await,
            None => self.kv.delete(keys::LAST_OBSERVED_AT).await,
        }
    }

    // ---- experience ----

    /// Load total experience; zero if never written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_experience(&self) -> Result<ExperienceState, StoreError> {
        Ok(ExperienceState {
            total_experience: self.get_json(keys::EXPERIENCE_TOTAL).await?.unwrap_or(0.0),
        })
    }

    /// Write total experience.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_experience(&self, state: ExperienceState) -> Result<(), StoreError> {
        self.set_json(keys::EXPERIENCE_TOTAL, &state.total_experience).await
    }

    // ---- stamina ----

    /// Load stamina, or `None` on first launch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_stamina(&self) -> Result<Option<StaminaState>, StoreError> {
        self.get_json(keys::STAMINA_STATE).await
    }

    /// Write stamina.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_stamina(&self, state: &StaminaState) -> Result<(), StoreError> {
        self.set_json(keys::STAMINA_STATE, state).await
    }

    /// Load the daily stamina watermark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_stamina_watermark(&self) -> Result<StaminaWatermark, StoreError> {
        Ok(self
            .get_json(keys::STAMINA_WATERMARK)
            .await?
            .unwrap_or_default())
    }

    /// Write the daily stamina watermark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_stamina_watermark(
        &self,
        watermark: &StaminaWatermark,
    ) -> Result<(), StoreError> {
        self.set_json(keys::STAMINA_WATERMARK, watermark).await
    }

    // ---- rank ----

    /// Load the last persisted rank.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_rank(&self) -> Result<RankState, StoreError> {
        Ok(RankState {
            current_rank: self.get_json(keys::RANK_CURRENT).await?.unwrap_or(0),
        })
    }

    /// Write the rank.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_rank(&self, state: RankState) -> Result<(), StoreError> {
        self.set_json(keys::RANK_CURRENT, &state.current_rank).await
    }

    // ---- currency ----

    /// Load the award watermark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_currency(&self) -> Result<CurrencyState, StoreError> {
        Ok(CurrencyState {
            last_awarded_units: self
                .get_json(keys::CURRENCY_AWARDED_UNITS)
                .await?
                .unwrap_or(0),
        })
    }

    /// Write the award watermark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_currency(&self, state: CurrencyState) -> Result<(), StoreError> {
        self.set_json(keys::CURRENCY_AWARDED_UNITS, &state.last_awarded_units)
            .await
    }

    /// Load balances.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or decode fails.
    pub async fn load_wallet(&self) -> Result<Wallet, StoreError> {
        Ok(self.get_json(keys::WALLET).await?.unwrap_or_default())
    }

    /// Write balances.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        self.set_json(keys::WALLET, wallet).await
    }

    // ---- compound reset ----

    /// Discard all progress and re-anchor the baseline at `now`.
    ///
    /// Writes, in order: the journal, the baseline, the watermarks
    /// (tracker steps and distance, award units), the totals (steps,
    /// distance, experience, rank), and finally clears the journal. The
    /// stamina watermark and the wallet are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failed write. The journal stays
    /// behind so the reset can be rolled forward.
    pub async fn reset_all(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_json(keys::RESET_PENDING, &now).await?;
        self.apply_reset(now).await?;
        self.kv.delete(keys::RESET_PENDING).await?;
        tracing::info!(baseline = %now, "progress reset");
        Ok(())
    }

    async fn apply_reset(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_json(keys::BASELINE_INSTANT, &now).await?;

        self.set_json(keys::LAST_SYNCED_STEPS, &0_u64).await?;
        self.set_json(keys::LAST_SYNCED_DISTANCE, &0.0_f64).await?;
        self.set_json(keys::CURRENCY_AWARDED_UNITS, &0_u64).await?;

        self.set_json(keys::TOTAL_STEPS, &0_u64).await?;
        self.set_json(keys::TOTAL_DISTANCE, &0.0_f64).await?;
        self.kv.delete(keys::LAST_OBSERVED_AT).await?;
        self.set_json(keys::EXPERIENCE_TOTAL, &0.0_f64).await?;
        self.set_json(keys::RANK_CURRENT, &0_u32).await
    }

    /// The instant of a journaled reset that has not completed, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read or decode fails.
    pub async fn pending_reset(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.get_json(keys::RESET_PENDING).await
    }

    /// Finish an interrupted reset using its journaled instant.
    ///
    /// Returns the instant that was replayed, or `None` if no reset was
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or write fails.
    pub async fn recover_pending_reset(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(at) = self.pending_reset().await? else {
            return Ok(None);
        };
        tracing::warn!(%at, "found interrupted reset, rolling forward");
        self.apply_reset(at).await?;
        self.kv.delete(keys::RESET_PENDING).await?;
        Ok(Some(at))
    }
}
