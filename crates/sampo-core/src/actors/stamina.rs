//! Stamina actor.

use rust_decimal::Decimal;
use sampo_progression::{EngineError, StaminaConversion, StaminaEngine};
use sampo_store::{KeyValueStore, Persistence, ProgressStore};
use sampo_types::{CalendarDay, StaminaSnapshot};
use tokio::sync::{broadcast, oneshot};

use super::{Actor, publish, respond};

/// Result of a step conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaminaOutcome {
    /// What the conversion did.
    pub conversion: StaminaConversion,
    /// Whether the new state reached durable storage.
    pub persistence: Persistence,
}

/// Result of a direct stamina change (item, debug action).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaminaUpdate {
    /// Stamina after the change.
    pub snapshot: StaminaSnapshot,
    /// Whether the new state reached durable storage.
    pub persistence: Persistence,
}

type EngineReply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Commands accepted by the stamina actor.
#[derive(Debug)]
pub enum StaminaCommand {
    /// Convert today's step total.
    Convert {
        /// Steps walked today so far.
        total_steps_today: u64,
        /// Local calendar day.
        today: CalendarDay,
        /// Reply channel.
        reply: EngineReply<StaminaOutcome>,
    },
    /// Convert `watermark + steps` as today's total.
    DebugAddSteps {
        /// Steps to add.
        steps: u64,
        /// Local calendar day.
        today: CalendarDay,
        /// Reply channel.
        reply: EngineReply<StaminaOutcome>,
    },
    /// Use a consumable item.
    ApplyItem {
        /// Stamina to add; may exceed the maximum.
        amount: Decimal,
        /// Reply channel.
        reply: EngineReply<StaminaUpdate>,
    },
    /// Set stamina to the maximum.
    RefillToMax {
        /// Reply channel.
        reply: EngineReply<StaminaUpdate>,
    },
    /// Set stamina to zero.
    Drain {
        /// Reply channel.
        reply: EngineReply<StaminaUpdate>,
    },
    /// Replace the equipment bonus on the maximum.
    SetEquipmentBonus {
        /// New bonus.
        bonus: Decimal,
        /// Reply channel.
        reply: EngineReply<StaminaUpdate>,
    },
    /// Follow a player level change.
    SetLevel {
        /// New level.
        level: u32,
    },
    /// Read current stamina.
    Get {
        /// Reply channel.
        reply: EngineReply<StaminaSnapshot>,
    },
}

/// Where a conversion's step total comes from.
#[derive(Debug, Clone, Copy)]
enum Feed {
    /// Today's total as reported by the health provider.
    TodayTotal(u64),
    /// Steps added on top of the watermark.
    DebugSteps(u64),
}

/// Owns the [`StaminaEngine`].
pub struct StaminaActor<S> {
    engine: StaminaEngine,
    store: ProgressStore<S>,
    events: broadcast::Sender<StaminaSnapshot>,
}

impl<S: KeyValueStore> StaminaActor<S> {
    /// Wrap an engine.
    pub const fn new(
        engine: StaminaEngine,
        store: ProgressStore<S>,
        events: broadcast::Sender<StaminaSnapshot>,
    ) -> Self {
        Self {
            engine,
            store,
            events,
        }
    }

    async fn persist_state(&self) -> Persistence {
        let state = self.engine.state();
        Persistence::from_result("stamina", self.store.save_stamina(&state).await)
    }

    /// Watermark first: a crash between the writes loses the gain instead
    /// of converting the same steps again.
    async fn persist_all(&self) -> Persistence {
        let state = self.engine.state();
        let watermark = self.engine.watermark();
        let result = match self.store.save_stamina_watermark(&watermark).await {
            Ok(()) => self.store.save_stamina(&state).await,
            Err(e) => Err(e),
        };
        Persistence::from_result("stamina", result)
    }

    async fn convert(&mut self, feed: Feed, today: CalendarDay) -> Result<StaminaOutcome, EngineError> {
        let before = (self.engine.state(), self.engine.watermark());
        let conversion = match feed {
            Feed::TodayTotal(total) => self.engine.apply_step_delta(total, today)?,
            Feed::DebugSteps(steps) => self.engine.debug_add_steps(steps, today)?,
        };
        let persistence = if before == (self.engine.state(), self.engine.watermark()) {
            Persistence::Skipped
        } else {
            publish(&self.events, conversion.snapshot);
            self.persist_all().await
        };
        Ok(StaminaOutcome {
            conversion,
            persistence,
        })
    }

    async fn update(&mut self, snapshot: StaminaSnapshot) -> StaminaUpdate {
        publish(&self.events, snapshot);
        StaminaUpdate {
            snapshot,
            persistence: self.persist_state().await,
        }
    }
}

impl<S: KeyValueStore> Actor for StaminaActor<S> {
    type Command = StaminaCommand;
    const NAME: &'static str = "stamina";

    async fn handle(&mut self, command: StaminaCommand) {
        match command {
            StaminaCommand::Convert {
                total_steps_today,
                today,
                reply,
            } => {
                let outcome = self.convert(Feed::TodayTotal(total_steps_today), today).await;
                respond(reply, outcome);
            }
            StaminaCommand::DebugAddSteps {
                steps,
                today,
                reply,
            } => {
                let outcome = self.convert(Feed::DebugSteps(steps), today).await;
                respond(reply, outcome);
            }
            StaminaCommand::ApplyItem { amount, reply } => {
                let result = self.engine.apply_item(amount);
                let outcome = match result {
                    Ok(snapshot) => Ok(self.update(snapshot).await),
                    Err(e) => Err(e),
                };
                respond(reply, outcome);
            }
            StaminaCommand::RefillToMax { reply } => {
                let outcome = match self.engine.refill_to_max() {
                    Ok(snapshot) => Ok(self.update(snapshot).await),
                    Err(e) => Err(e),
                };
                respond(reply, outcome);
            }
            StaminaCommand::Drain { reply } => {
                let outcome = match self.engine.drain() {
                    Ok(snapshot) => Ok(self.update(snapshot).await),
                    Err(e) => Err(e),
                };
                respond(reply, outcome);
            }
            StaminaCommand::SetEquipmentBonus { bonus, reply } => {
                let outcome = match self.engine.set_equipment_bonus(bonus) {
                    Ok(snapshot) => Ok(self.update(snapshot).await),
                    Err(e) => Err(e),
                };
                respond(reply, outcome);
            }
            StaminaCommand::SetLevel { level } => {
                self.engine.set_level(level);
                match self.engine.snapshot() {
                    Ok(snapshot) => {
                        tracing::debug!(level, max = %snapshot.max, "stamina maximum follows level");
                        publish(&self.events, snapshot);
                    }
                    Err(e) => tracing::warn!(level, error = %e, "stamina maximum overflowed"),
                }
            }
            StaminaCommand::Get { reply } => respond(reply, self.engine.snapshot()),
        }
    }
}
