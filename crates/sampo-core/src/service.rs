//! The progression service: explicit owner of the engine actors.
//!
//! Construct one per process with [`ProgressionService::start`] and pass it
//! to whatever triggers syncs. Tests build as many isolated services as
//! they like over fresh in-memory stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sampo_progression::{
    CumulativeStepTracker, CurrencyAwardEngine, DailyActivity, ExperienceEngine, RankEngine,
    StaminaEngine,
};
use sampo_store::{KeyValueStore, Persistence, ProgressStore};
use sampo_types::{
    AwardEvent, Currency, DistanceDelta, PlayerProgression, RankProgression, StaminaSnapshot,
    StepDelta, TrackerState, Wallet,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::actors::currency::{CurrencyActor, CurrencyCommand, CurrencyOutcome, WalletUpdate};
use crate::actors::experience::{ExperienceActor, ExperienceCommand, ExperienceOutcome};
use crate::actors::rank::{RankActor, RankCommand, RankOutcome};
use crate::actors::stamina::{StaminaActor, StaminaCommand, StaminaOutcome, StaminaUpdate};
use crate::actors::tracker::{ResetReport, TrackerActor, TrackerCommand};
use crate::actors::{Mailbox, spawn};
use crate::clock::{Calendar, Clock};
use crate::config::AppConfig;
use crate::error::ServiceError;

/// Everything one raw step reading changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// How the tracker interpreted the reading.
    pub delta: StepDelta,
    /// Whether the tracker state reached durable storage.
    pub persistence: Persistence,
    /// Experience change; `None` when the delta was zero.
    pub experience: Option<ExperienceOutcome>,
    /// Rank recomputation; `None` when the delta was zero.
    pub rank: Option<RankOutcome>,
    /// Currency evaluation; `None` when the delta was zero.
    pub currency: Option<CurrencyOutcome>,
}

impl StepReport {
    /// Whether any durable write in this report failed.
    pub fn any_persistence_failed(&self) -> bool {
        self.persistence.is_failed()
            || self
                .experience
                .as_ref()
                .is_some_and(|o| o.persistence.is_failed())
            || self.rank.as_ref().is_some_and(|o| o.persistence.is_failed())
            || self
                .currency
                .as_ref()
                .is_some_and(|o| o.persistence.is_failed())
    }

    /// The currency awarded by this reading, if any.
    pub fn award(&self) -> Option<AwardEvent> {
        self.currency.as_ref().and_then(|o| o.award)
    }
}

/// Broadcast senders backing the `subscribe_*` methods.
#[derive(Debug, Clone)]
struct Channels {
    steps: broadcast::Sender<StepDelta>,
    progression: broadcast::Sender<PlayerProgression>,
    stamina: broadcast::Sender<StaminaSnapshot>,
    rank: broadcast::Sender<RankProgression>,
    awards: broadcast::Sender<AwardEvent>,
    wallet: broadcast::Sender<Wallet>,
}

impl Channels {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            steps: broadcast::channel(capacity).0,
            progression: broadcast::channel(capacity).0,
            stamina: broadcast::channel(capacity).0,
            rank: broadcast::channel(capacity).0,
            awards: broadcast::channel(capacity).0,
            wallet: broadcast::channel(capacity).0,
        }
    }
}

/// Owns the engine actors and exposes the progression operations.
pub struct ProgressionService<S> {
    tracker: Mailbox<TrackerCommand>,
    experience: Mailbox<ExperienceCommand>,
    stamina: Mailbox<StaminaCommand>,
    rank: Mailbox<RankCommand>,
    currency: Mailbox<CurrencyCommand>,
    channels: Channels,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
    config: AppConfig,
    store: ProgressStore<S>,
    handles: Vec<JoinHandle<()>>,
}

impl<S: KeyValueStore + Clone> ProgressionService<S> {
    /// Load durable state, build the engines and start their actors.
    ///
    /// An interrupted progress reset is rolled forward before any engine
    /// loads its state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if durable state cannot be read or
    /// initialized, or [`ServiceError::Engine`] if the configuration is
    /// rejected by an engine.
    pub async fn start(
        kv: S,
        config: AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let store = ProgressStore::new(kv);
        let now = clock.now();
        let calendar = config.clock.offset().map_or_else(Calendar::utc, Calendar::new);
        let progression = &config.progression;

        let tracker_state = store.initialize(config.clock.baseline_policy, now).await?;
        let experience = ExperienceEngine::new(
            store.load_experience().await?,
            &progression.experience,
        )?;
        let level = experience.level();
        let stamina_state = store
            .load_stamina()
            .await?
            .unwrap_or_else(|| StaminaEngine::initial_state(&progression.stamina));
        let stamina = StaminaEngine::new(
            stamina_state,
            store.load_stamina_watermark().await?,
            &progression.stamina,
            level,
        )?;
        let rank = RankEngine::new(
            store.load_rank().await?,
            &progression.rank,
            tracker_state.total_steps,
        )?;
        let currency = CurrencyAwardEngine::new(
            store.load_currency().await?,
            store.load_wallet().await?,
            &progression.currency,
        )?;

        tracing::info!(
            baseline = %tracker_state.baseline_instant,
            total_steps = tracker_state.total_steps,
            level,
            rank = rank.progression().rank,
            "progression state loaded"
        );

        let channels = Channels::new(config.sync.event_capacity);
        let capacity = config.sync.mailbox_capacity;

        let (stamina_tx, stamina_handle) = spawn(
            StaminaActor::new(stamina, store.clone(), channels.stamina.clone()),
            capacity,
        );
        let (experience_tx, experience_handle) = spawn(
            ExperienceActor::new(
                experience,
                store.clone(),
                channels.progression.clone(),
                stamina_tx.clone(),
            ),
            capacity,
        );
        let (rank_tx, rank_handle) = spawn(
            RankActor::new(rank, store.clone(), channels.rank.clone()),
            capacity,
        );
        let (currency_tx, currency_handle) = spawn(
            CurrencyActor::new(
                currency,
                store.clone(),
                channels.awards.clone(),
                channels.wallet.clone(),
            ),
            capacity,
        );
        let (tracker_tx, tracker_handle) = spawn(
            TrackerActor::new(
                CumulativeStepTracker::from_state(tracker_state),
                store.clone(),
                channels.steps.clone(),
                experience_tx.clone(),
                rank_tx.clone(),
                currency_tx.clone(),
            ),
            capacity,
        );

        Ok(Self {
            tracker: tracker_tx,
            experience: experience_tx,
            stamina: stamina_tx,
            rank: rank_tx,
            currency: currency_tx,
            channels,
            clock,
            calendar,
            config,
            store,
            handles: vec![
                tracker_handle,
                experience_handle,
                rank_handle,
                currency_handle,
                stamina_handle,
            ],
        })
    }
}

impl<S: KeyValueStore> ProgressionService<S> {
    /// The current instant according to the service clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The calendar used for daily rollover.
    pub const fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// The configuration the service was started with.
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The durable store.
    pub const fn store(&self) -> &ProgressStore<S> {
        &self.store
    }

    // ---- sync inputs ----

    /// Feed the latest raw cumulative step reading.
    ///
    /// The reading fans out to experience, rank and currency in tracker
    /// order. `None` means no reading this cycle and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if an actor has exited.
    pub async fn report_raw_total(
        &self,
        raw_steps_since_baseline: Option<f64>,
        observed_at: DateTime<Utc>,
    ) -> Result<StepReport, ServiceError> {
        let reply = self
            .tracker
            .request(|reply| TrackerCommand::ReportSteps {
                raw: raw_steps_since_baseline,
                observed_at,
                reply,
            })
            .await?;

        let (experience, rank, currency) = match reply.downstream {
            Some(downstream) => (
                Some(downstream.experience.recv().await?),
                Some(downstream.rank.recv().await?),
                Some(downstream.currency.recv().await?),
            ),
            None => (None, None, None),
        };

        Ok(StepReport {
            delta: reply.delta,
            persistence: reply.persistence,
            experience,
            rank,
            currency,
        })
    }

    /// Feed the latest raw cumulative walking-distance reading in metres.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the tracker has exited.
    pub async fn report_raw_distance(
        &self,
        raw_metres_since_baseline: Option<f64>,
    ) -> Result<(DistanceDelta, Persistence), ServiceError> {
        self.tracker
            .request(|reply| TrackerCommand::ReportDistance {
                raw: raw_metres_since_baseline,
                reply,
            })
            .await
    }

    /// Convert today's step total into stamina.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Engine`] on decimal overflow, or
    /// [`ServiceError::ActorStopped`] if the stamina actor has exited.
    pub async fn report_today_steps(&self, total_steps_today: u64) -> Result<StaminaOutcome, ServiceError> {
        let today = self.calendar.day_of(self.now());
        let outcome = self
            .stamina
            .request(|reply| StaminaCommand::Convert {
                total_steps_today,
                today,
                reply,
            })
            .await??;
        Ok(outcome)
    }

    /// Use a stamina item. May push stamina above the maximum.
    ///
    /// # Errors
    ///
    /// See [`ProgressionService::report_today_steps`].
    pub async fn apply_stamina_item(&self, amount: Decimal) -> Result<StaminaUpdate, ServiceError> {
        Ok(self
            .stamina
            .request(|reply| StaminaCommand::ApplyItem { amount, reply })
            .await??)
    }

    // ---- reads ----

    /// Tracker watermarks and totals.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the tracker has exited.
    pub async fn tracker_state(&self) -> Result<TrackerState, ServiceError> {
        self.tracker.request(|reply| TrackerCommand::Get { reply }).await
    }

    /// Player level view.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn player_progression(&self) -> Result<PlayerProgression, ServiceError> {
        self.experience
            .request(|reply| ExperienceCommand::Get { reply })
            .await
    }

    /// Rank view.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn rank_progression(&self) -> Result<RankProgression, ServiceError> {
        self.rank.request(|reply| RankCommand::Get { reply }).await
    }

    /// Current and maximum stamina.
    ///
    /// # Errors
    ///
    /// See [`ProgressionService::report_today_steps`].
    pub async fn stamina(&self) -> Result<StaminaSnapshot, ServiceError> {
        Ok(self
            .stamina
            .request(|reply| StaminaCommand::Get { reply })
            .await??)
    }

    /// Currency balances.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn wallet(&self) -> Result<Wallet, ServiceError> {
        self.currency
            .request(|reply| CurrencyCommand::GetWallet { reply })
            .await
    }

    /// Summarize a day's walking with the configured activity parameters.
    pub fn daily_activity(
        &self,
        steps: u64,
        distance_m: Option<f64>,
        weight_kg: Option<f64>,
    ) -> DailyActivity {
        DailyActivity::summarize(
            self.calendar.day_of(self.now()),
            steps,
            distance_m,
            weight_kg,
            &self.config.progression.activity,
        )
    }

    // ---- resets ----

    /// Discard all progress and re-anchor the baseline at "now".
    ///
    /// Stamina and balances are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if the reset could not even be
    /// journaled; nothing changed in that case.
    pub async fn reset_all(&self) -> Result<ResetReport, ServiceError> {
        let now = self.now();
        self.tracker
            .request(|reply| TrackerCommand::ResetAll { now, reply })
            .await?
    }

    /// Empty both currency balances.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn reset_currencies(&self) -> Result<WalletUpdate, ServiceError> {
        self.currency
            .request(|reply| CurrencyCommand::ResetCurrencies { reply })
            .await
    }

    // ---- debug actions ----

    /// Convert `steps` on top of today's stamina watermark.
    ///
    /// # Errors
    ///
    /// See [`ProgressionService::report_today_steps`].
    pub async fn debug_add_steps(&self, steps: u64) -> Result<StaminaOutcome, ServiceError> {
        let today = self.calendar.day_of(self.now());
        Ok(self
            .stamina
            .request(|reply| StaminaCommand::DebugAddSteps {
                steps,
                today,
                reply,
            })
            .await??)
    }

    /// Set stamina to the maximum.
    ///
    /// # Errors
    ///
    /// See [`ProgressionService::report_today_steps`].
    pub async fn refill_stamina(&self) -> Result<StaminaUpdate, ServiceError> {
        Ok(self
            .stamina
            .request(|reply| StaminaCommand::RefillToMax { reply })
            .await??)
    }

    /// Set stamina to zero.
    ///
    /// # Errors
    ///
    /// See [`ProgressionService::report_today_steps`].
    pub async fn drain_stamina(&self) -> Result<StaminaUpdate, ServiceError> {
        Ok(self
            .stamina
            .request(|reply| StaminaCommand::Drain { reply })
            .await??)
    }

    /// Replace the equipment bonus on maximum stamina.
    ///
    /// # Errors
    ///
    /// See [`ProgressionService::report_today_steps`].
    pub async fn set_equipment_bonus(&self, bonus: Decimal) -> Result<StaminaUpdate, ServiceError> {
        Ok(self
            .stamina
            .request(|reply| StaminaCommand::SetEquipmentBonus { bonus, reply })
            .await??)
    }

    /// Add to a currency balance.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn credit(&self, currency: Currency, amount: u64) -> Result<WalletUpdate, ServiceError> {
        self.currency
            .request(|reply| CurrencyCommand::Credit {
                currency,
                amount,
                reply,
            })
            .await
    }

    // ---- listeners ----

    /// Every accepted step reading.
    pub fn subscribe_steps(&self) -> broadcast::Receiver<StepDelta> {
        self.channels.steps.subscribe()
    }

    /// Level view after each change.
    pub fn subscribe_progression(&self) -> broadcast::Receiver<PlayerProgression> {
        self.channels.progression.subscribe()
    }

    /// Stamina after each change.
    pub fn subscribe_stamina(&self) -> broadcast::Receiver<StaminaSnapshot> {
        self.channels.stamina.subscribe()
    }

    /// Rank view after each recomputation.
    pub fn subscribe_rank(&self) -> broadcast::Receiver<RankProgression> {
        self.channels.rank.subscribe()
    }

    /// Currency awards, for the transient notification.
    pub fn subscribe_awards(&self) -> broadcast::Receiver<AwardEvent> {
        self.channels.awards.subscribe()
    }

    /// Balances after each change.
    pub fn subscribe_wallet(&self) -> broadcast::Receiver<Wallet> {
        self.channels.wallet.subscribe()
    }

    // ---- lifecycle ----

    /// Stop every actor after it drains its mailbox.
    pub async fn shutdown(self) {
        let Self {
            tracker,
            experience,
            stamina,
            rank,
            currency,
            handles,
            ..
        } = self;
        // The tracker holds the only other senders to the downstream
        // actors, so dropping in this order lets each task finish in turn.
        drop((tracker, experience, rank, currency, stamina));
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "actor task ended abnormally");
            }
        }
        tracing::info!("progression service stopped");
    }
}
