//! Experience actor.
//!
//! Notifies the stamina actor whenever the derived level changes, since the
//! stamina maximum depends on it.

use sampo_progression::{ExperienceEngine, ExperienceGain};
use sampo_store::{KeyValueStore, Persistence, ProgressStore};
use sampo_types::PlayerProgression;
use tokio::sync::{broadcast, oneshot};

use super::stamina::StaminaCommand;
use super::{Actor, Mailbox, publish, respond};

/// Result of applying a step delta.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceOutcome {
    /// What the delta did.
    pub gain: ExperienceGain,
    /// Whether the new total reached durable storage.
    pub persistence: Persistence,
}

/// Commands accepted by the experience actor.
#[derive(Debug)]
pub enum ExperienceCommand {
    /// Add experience for a step delta.
    ApplyDelta {
        /// Newly observed steps.
        delta: u64,
        /// Reply channel.
        reply: oneshot::Sender<ExperienceOutcome>,
    },
    /// Read the derived level view.
    Get {
        /// Reply channel.
        reply: oneshot::Sender<PlayerProgression>,
    },
    /// Zero the total after a compound reset. The zero is written again
    /// so that a delta queued before the reset cannot outlive it.
    Reset {
        /// Reply channel.
        reply: oneshot::Sender<Persistence>,
    },
}

/// Owns the [`ExperienceEngine`].
pub struct ExperienceActor<S> {
    engine: ExperienceEngine,
    store: ProgressStore<S>,
    events: broadcast::Sender<PlayerProgression>,
    stamina: Mailbox<StaminaCommand>,
}

impl<S: KeyValueStore> ExperienceActor<S> {
    /// Wrap an engine.
    pub const fn new(
        engine: ExperienceEngine,
        store: ProgressStore<S>,
        events: broadcast::Sender<PlayerProgression>,
        stamina: Mailbox<StaminaCommand>,
    ) -> Self {
        Self {
            engine,
            store,
            events,
            stamina,
        }
    }

    async fn follow_level(&self, before: u32, after: u32) {
        if before == after {
            return;
        }
        if let Err(e) = self.stamina.send(StaminaCommand::SetLevel { level: after }).await {
            tracing::warn!(level = after, error = %e, "could not forward level change");
        }
    }
}

impl<S: KeyValueStore> Actor for ExperienceActor<S> {
    type Command = ExperienceCommand;
    const NAME: &'static str = "experience";

    async fn handle(&mut self, command: ExperienceCommand) {
        match command {
            ExperienceCommand::ApplyDelta { delta, reply } => {
                let gain = self.engine.apply_step_delta(delta);
                publish(&self.events, gain.after);
                self.follow_level(gain.before.level, gain.after.level).await;
                let persistence = Persistence::from_result(
                    "experience",
                    self.store.save_experience(self.engine.state()).await,
                );
                respond(reply, ExperienceOutcome { gain, persistence });
            }
            ExperienceCommand::Get { reply } => respond(reply, self.engine.progression()),
            ExperienceCommand::Reset { reply } => {
                let before = self.engine.level();
                self.engine.reset();
                let view = self.engine.progression();
                publish(&self.events, view);
                self.follow_level(before, view.level).await;
                let persistence = Persistence::from_result(
                    "experience",
                    self.store.save_experience(self.engine.state()).await,
                );
                respond(reply, persistence);
            }
        }
    }
}
