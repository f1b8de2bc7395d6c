//! One tokio task per engine.
//!
//! Each actor owns its engine and drains a bounded mailbox one command at a
//! time, so an engine's read-compute-write sequence can never interleave
//! with another caller's. Actors are independent of each other: a slow
//! stamina write never holds up rank or currency updates.
//!
//! ```text
//!                     +--> ExperienceActor --> StaminaActor (level changes)
//! TrackerActor -------+--> RankActor
//!   (deltas, totals)  +--> CurrencyActor
//! ```
//!
//! The tracker is the only sender of totals, so downstream actors observe
//! them in tracker order.

pub mod currency;
pub mod experience;
pub mod rank;
pub mod stamina;
pub mod tracker;

use std::future::Future;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::ServiceError;

/// A single-owner engine task.
pub trait Actor: Send + 'static {
    /// Commands accepted by the mailbox.
    type Command: Send + 'static;

    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Handle one command. Commands are handled strictly one at a time.
    fn handle(&mut self, command: Self::Command) -> impl Future<Output = ()> + Send;
}

/// Sending half of an actor's mailbox.
#[derive(Debug)]
pub struct Mailbox<C> {
    tx: mpsc::Sender<C>,
    name: &'static str,
}

impl<C> Clone for Mailbox<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            name: self.name,
        }
    }
}

impl<C: Send + 'static> Mailbox<C> {
    /// Queue a command without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn send(&self, command: C) -> Result<(), ServiceError> {
        self.tx
            .send(command)
            .await
            .map_err(|_closed| ServiceError::ActorStopped { actor: self.name })
    }

    /// Queue a command built around a reply channel and return the
    /// receiving end without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited.
    pub async fn dispatch<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> C + Send,
    ) -> Result<Reply<R>, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        Ok(Reply {
            rx,
            name: self.name,
        })
    }

    /// Queue a command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor has exited or
    /// dropped the reply.
    pub async fn request<R: Send>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> C + Send,
    ) -> Result<R, ServiceError> {
        self.dispatch(build).await?.recv().await
    }
}

/// A pending reply from an actor.
#[derive(Debug)]
pub struct Reply<R> {
    rx: oneshot::Receiver<R>,
    name: &'static str,
}

impl<R> Reply<R> {
    /// Wait for the actor to answer.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ActorStopped`] if the actor dropped the
    /// request without answering.
    pub async fn recv(self) -> Result<R, ServiceError> {
        self.rx
            .await
            .map_err(|_dropped| ServiceError::ActorStopped { actor: self.name })
    }
}

/// Start `actor` on its own task with a mailbox of `capacity`.
pub fn spawn<A: Actor>(mut actor: A, capacity: usize) -> (Mailbox<A::Command>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(async move {
        tracing::debug!(actor = A::NAME, "actor started");
        while let Some(command) = rx.recv().await {
            actor.handle(command).await;
        }
        tracing::debug!(actor = A::NAME, "actor stopped");
    });
    let mailbox = Mailbox {
        tx,
        name: A::NAME,
    };
    (mailbox, handle)
}

/// Answer a request. A caller that stopped waiting is not an error.
pub(crate) fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        tracing::trace!("requester went away before the reply");
    }
}

/// Push a derived-state change to listeners. Returns how many received it.
pub(crate) fn publish<T: Clone>(tx: &broadcast::Sender<T>, value: T) -> usize {
    tx.send(value).unwrap_or(0)
}
