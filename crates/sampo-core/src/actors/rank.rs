//! Rank actor.

use sampo_progression::{RankEngine, RankUpdate};
use sampo_store::{KeyValueStore, Persistence, ProgressStore};
use sampo_types::RankProgression;
use tokio::sync::{broadcast, oneshot};

use super::{Actor, publish, respond};

/// Result of recomputing the rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    /// The recomputed rank.
    pub update: RankUpdate,
    /// [`Persistence::Skipped`] unless the rank changed.
    pub persistence: Persistence,
}

/// Commands accepted by the rank actor.
#[derive(Debug)]
pub enum RankCommand {
    /// Recompute for a new cumulative total.
    Recompute {
        /// Canonical cumulative step total.
        total_steps: u64,
        /// Reply channel.
        reply: oneshot::Sender<RankOutcome>,
    },
    /// Read the rank view.
    Get {
        /// Reply channel.
        reply: oneshot::Sender<RankProgression>,
    },
    /// Return to rank 0 after a compound reset, writing the zero again.
    Reset {
        /// Reply channel.
        reply: oneshot::Sender<Persistence>,
    },
}

/// Owns the [`RankEngine`].
pub struct RankActor<S> {
    engine: RankEngine,
    store: ProgressStore<S>,
    events: broadcast::Sender<RankProgression>,
}

impl<S: KeyValueStore> RankActor<S> {
    /// Wrap an engine.
    pub const fn new(
        engine: RankEngine,
        store: ProgressStore<S>,
        events: broadcast::Sender<RankProgression>,
    ) -> Self {
        Self {
            engine,
            store,
            events,
        }
    }
}

impl<S: KeyValueStore> Actor for RankActor<S> {
    type Command = RankCommand;
    const NAME: &'static str = "rank";

    async fn handle(&mut self, command: RankCommand) {
        match command {
            RankCommand::Recompute { total_steps, reply } => {
                let update = self.engine.recompute(total_steps);
                publish(&self.events, update.progression);
                let persistence = if update.changed {
                    Persistence::from_result("rank", self.store.save_rank(self.engine.state()).await)
                } else {
                    Persistence::Skipped
                };
                respond(reply, RankOutcome { update, persistence });
            }
            RankCommand::Get { reply } => respond(reply, self.engine.progression()),
            RankCommand::Reset { reply } => {
                self.engine.reset();
                publish(&self.events, self.engine.progression());
                let persistence =
                    Persistence::from_result("rank", self.store.save_rank(self.engine.state()).await);
                respond(reply, persistence);
            }
        }
    }
}
