//! Tracker actor.
//!
//! Owns the cumulative step tracker and is the single source of totals for
//! the experience, rank and currency actors. Downstream commands are queued
//! from inside the tracker's handler, so two readings can never reach a
//! downstream actor in a different order than the tracker accepted them.
//! The tracker does not wait for downstream replies; it hands the receiving
//! ends back to the caller.
//!
//! The compound progress reset is routed here for the same reason: nothing
//! can slip in between the durable reset and the in-memory ones.

use chrono::{DateTime, Utc};
use sampo_progression::CumulativeStepTracker;
use sampo_store::{KeyValueStore, Persistence, ProgressStore};
use sampo_types::{DeltaKind, DistanceDelta, StepDelta, TrackerState};
use tokio::sync::{broadcast, oneshot};

use super::currency::{CurrencyCommand, CurrencyOutcome};
use super::experience::{ExperienceCommand, ExperienceOutcome};
use super::rank::{RankCommand, RankOutcome};
use super::{Actor, Mailbox, Reply, publish, respond};
use crate::error::ServiceError;

/// Pending downstream replies for one accepted step delta.
#[derive(Debug)]
pub struct Downstream {
    /// Experience gained.
    pub experience: Reply<ExperienceOutcome>,
    /// Rank recomputed.
    pub rank: Reply<RankOutcome>,
    /// Currency evaluated.
    pub currency: Reply<CurrencyOutcome>,
}

/// Tracker reply for one raw step reading.
#[derive(Debug)]
pub struct TrackerReply {
    /// How the reading was interpreted.
    pub delta: StepDelta,
    /// Whether the tracker state reached durable storage.
    pub persistence: Persistence,
    /// Downstream replies; `None` when the delta was zero.
    pub downstream: Option<Downstream>,
}

/// Result of a progress reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    /// New baseline instant.
    pub baseline_instant: DateTime<Utc>,
    /// [`Persistence::Failed`] when the durable reset was journaled but not
    /// completed; it is rolled forward on the next start.
    pub persistence: Persistence,
}

/// Commands accepted by the tracker actor.
#[derive(Debug)]
pub enum TrackerCommand {
    /// Feed a raw cumulative step reading.
    ReportSteps {
        /// Steps since the baseline, `None` if the provider had no reading.
        raw: Option<f64>,
        /// Observation time.
        observed_at: DateTime<Utc>,
        /// Reply channel.
        reply: oneshot::Sender<TrackerReply>,
    },
    /// Feed a raw cumulative distance reading.
    ReportDistance {
        /// Metres since the baseline, `None` if the provider had no reading.
        raw: Option<f64>,
        /// Reply channel.
        reply: oneshot::Sender<(DistanceDelta, Persistence)>,
    },
    /// Read the tracker state.
    Get {
        /// Reply channel.
        reply: oneshot::Sender<TrackerState>,
    },
    /// Discard all progress and re-anchor at `now`.
    ResetAll {
        /// New baseline instant.
        now: DateTime<Utc>,
        /// Reply channel.
        reply: oneshot::Sender<Result<ResetReport, ServiceError>>,
    },
}

/// Owns the [`CumulativeStepTracker`].
pub struct TrackerActor<S> {
    tracker: CumulativeStepTracker,
    store: ProgressStore<S>,
    events: broadcast::Sender<StepDelta>,
    experience: Mailbox<ExperienceCommand>,
    rank: Mailbox<RankCommand>,
    currency: Mailbox<CurrencyCommand>,
}

impl<S: KeyValueStore> TrackerActor<S> {
    /// Wrap a tracker and connect it to its downstream actors.
    pub const fn new(
        tracker: CumulativeStepTracker,
        store: ProgressStore<S>,
        events: broadcast::Sender<StepDelta>,
        experience: Mailbox<ExperienceCommand>,
        rank: Mailbox<RankCommand>,
        currency: Mailbox<CurrencyCommand>,
    ) -> Self {
        Self {
            tracker,
            store,
            events,
            experience,
            rank,
            currency,
        }
    }

    async fn persist(&self) -> Persistence {
        Persistence::from_result("tracker", self.store.save_tracker(self.tracker.state()).await)
    }

    async fn forward(&self, delta: &StepDelta) -> Result<Downstream, ServiceError> {
        let step_delta = delta.delta;
        let total_steps = delta.total_steps;
        let now = delta.observed_at;
        let experience = self
            .experience
            .dispatch(|reply| ExperienceCommand::ApplyDelta {
                delta: step_delta,
                reply,
            })
            .await?;
        let rank = self
            .rank
            .dispatch(|reply| RankCommand::Recompute { total_steps, reply })
            .await?;
        let currency = self
            .currency
            .dispatch(|reply| CurrencyCommand::Evaluate {
                total_steps,
                now,
                reply,
            })
            .await?;
        Ok(Downstream {
            experience,
            rank,
            currency,
        })
    }

    async fn report_steps(&mut self, raw: Option<f64>, observed_at: DateTime<Utc>) -> TrackerReply {
        let delta = self.tracker.report_raw_total(raw, observed_at);
        if delta.kind == DeltaKind::NoReading {
            return TrackerReply {
                delta,
                persistence: Persistence::Skipped,
                downstream: None,
            };
        }

        publish(&self.events, delta);
        let persistence = self.persist().await;

        let downstream = if delta.delta > 0 {
            match self.forward(&delta).await {
                Ok(downstream) => Some(downstream),
                Err(e) => {
                    tracing::warn!(error = %e, "could not forward step delta");
                    None
                }
            }
        } else {
            None
        };

        TrackerReply {
            delta,
            persistence,
            downstream,
        }
    }

    async fn reset_all(&mut self, now: DateTime<Utc>) -> Result<ResetReport, ServiceError> {
        let persistence = match self.store.reset_all(now).await {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                // Without a journal nothing durable changed; keep memory as is.
                if self.store.pending_reset().await.ok().flatten().is_none() {
                    return Err(e.into());
                }
                tracing::warn!(error = %e, "reset journaled but not completed, finishing on next start");
                Persistence::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.tracker.reset_baseline(now);
        publish(
            &self.events,
            StepDelta {
                delta: 0,
                total_steps: 0,
                watermark: 0,
                kind: DeltaKind::Resynced,
                observed_at: now,
            },
        );

        let downstream = [
            self.experience
                .request(|reply| ExperienceCommand::Reset { reply })
                .await?,
            self.rank.request(|reply| RankCommand::Reset { reply }).await?,
            self.currency
                .request(|reply| CurrencyCommand::Reset { reply })
                .await?,
        ];
        let persistence = if persistence.is_failed() {
            persistence
        } else {
            downstream
                .into_iter()
                .find(Persistence::is_failed)
                .unwrap_or(persistence)
        };

        Ok(ResetReport {
            baseline_instant: now,
            persistence,
        })
    }
}

impl<S: KeyValueStore> Actor for TrackerActor<S> {
    type Command = TrackerCommand;
    const NAME: &'static str = "tracker";

    async fn handle(&mut self, command: TrackerCommand) {
        match command {
            TrackerCommand::ReportSteps {
                raw,
                observed_at,
                reply,
            } => {
                let outcome = self.report_steps(raw, observed_at).await;
                respond(reply, outcome);
            }
            TrackerCommand::ReportDistance { raw, reply } => {
                let delta = self.tracker.report_raw_distance(raw);
                let persistence = if delta.kind == DeltaKind::NoReading {
                    Persistence::Skipped
                } else {
                    self.persist().await
                };
                respond(reply, (delta, persistence));
            }
            TrackerCommand::Get { reply } => respond(reply, self.tracker.state().clone()),
            TrackerCommand::ResetAll { now, reply } => {
                let outcome = self.reset_all(now).await;
                respond(reply, outcome);
            }
        }
    }
}
