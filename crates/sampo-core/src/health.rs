//! The health-data collaborator.
//!
//! The platform health store is outside this crate. [`HealthDataProvider`]
//! is the seam: it answers cumulative-sum queries and notifies when new
//! samples arrive. [`ScriptedHealthProvider`] replays recorded samples and
//! is used by tests and the headless host.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use sampo_types::Metric;
use serde::Deserialize;
use tokio::sync::{Mutex, broadcast};

/// Errors returned by a health-data provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    /// The user declined access.
    #[error("health data access denied")]
    Denied,

    /// The provider is absent or failed.
    #[error("health data provider unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
}

/// Source of cumulative health samples.
pub trait HealthDataProvider: Send + Sync + 'static {
    /// Ask for read access to the metrics the engine needs.
    fn request_authorization(&self) -> impl Future<Output = Result<(), HealthError>> + Send;

    /// Sum of `metric` samples in `[from, to)`.
    ///
    /// No samples is a sum of 0, not an error.
    fn query_cumulative_sum(
        &self,
        metric: Metric,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<f64, HealthError>> + Send;

    /// Notifications that new `metric` samples arrived. Carries no payload;
    /// the receiver re-queries.
    fn observe_changes(&self, metric: Metric) -> BoxStream<'static, ()>;
}

/// One recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Sample {
    /// Metric sampled.
    pub metric: Metric,
    /// Sample end time.
    pub at: DateTime<Utc>,
    /// Sample value (steps, metres, kcal, kg).
    pub value: f64,
}

/// A provider backed by an in-memory list of samples.
#[derive(Debug)]
pub struct ScriptedHealthProvider {
    samples: Mutex<BTreeMap<Metric, Vec<(DateTime<Utc>, f64)>>>,
    authorized: bool,
    unavailable: Mutex<Option<String>>,
    changes: broadcast::Sender<Metric>,
}

impl ScriptedHealthProvider {
    /// An authorized provider with no samples.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            samples: Mutex::new(BTreeMap::new()),
            authorized: true,
            unavailable: Mutex::new(None),
            changes,
        }
    }

    /// A provider whose user declined access.
    pub fn denied() -> Self {
        Self {
            authorized: false,
            ..Self::new()
        }
    }

    /// Record a sample and notify observers of its metric.
    pub async fn push(&self, sample: Sample) {
        self.samples
            .lock()
            .await
            .entry(sample.metric)
            .or_default()
            .push((sample.at, sample.value));
        if self.changes.send(sample.metric).is_err() {
            tracing::trace!(metric = ?sample.metric, "no change observers");
        }
    }

    /// Make every query fail (`Some(reason)`) or succeed (`None`).
    pub async fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.lock().await = reason.map(str::to_owned);
    }

    /// Drop every sample of `metric`, as a provider wiping history would.
    pub async fn clear(&self, metric: Metric) {
        self.samples.lock().await.remove(&metric);
    }
}

impl Default for ScriptedHealthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthDataProvider for ScriptedHealthProvider {
    async fn request_authorization(&self) -> Result<(), HealthError> {
        if self.authorized {
            Ok(())
        } else {
            Err(HealthError::Denied)
        }
    }

    async fn query_cumulative_sum(
        &self,
        metric: Metric,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, HealthError> {
        if !self.authorized {
            return Err(HealthError::Denied);
        }
        if let Some(reason) = self.unavailable.lock().await.clone() {
            return Err(HealthError::Unavailable { reason });
        }
        let samples = self.samples.lock().await;
        let sum = samples.get(&metric).map_or(0.0, |values| {
            values
                .iter()
                .filter(|(at, _)| *at >= from && *at < to)
                .map(|(_, value)| *value)
                .sum()
        });
        Ok(sum)
    }

    fn observe_changes(&self, metric: Metric) -> BoxStream<'static, ()> {
        let rx = self.changes.subscribe();
        stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(changed) if changed == metric => return Some(((), rx)),
                    Ok(_) => {}
                    // Missed notifications collapse into one re-query.
                    Err(broadcast::error::RecvError::Lagged(_)) => return Some(((), rx)),
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}
