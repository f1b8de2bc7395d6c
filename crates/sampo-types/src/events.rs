//! Events pushed to listeners after a successful mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Currency, DeltaKind};
use crate::ids::AwardId;

/// Result of feeding one raw cumulative step reading to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDelta {
    /// Newly observed steps; zero unless `kind` is [`DeltaKind::Advanced`].
    pub delta: u64,
    /// Canonical cumulative total after this reading.
    pub total_steps: u64,
    /// Watermark after this reading.
    pub watermark: u64,
    /// How the reading was interpreted.
    pub kind: DeltaKind,
    /// When the reading was observed.
    pub observed_at: DateTime<Utc>,
}

/// Result of feeding one raw cumulative distance reading to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceDelta {
    /// Newly observed metres.
    pub delta_m: f64,
    /// Cumulative metres after this reading.
    pub total_distance_m: f64,
    /// How the reading was interpreted.
    pub kind: DeltaKind,
}

/// A one-off currency grant for crossing award-unit boundaries.
///
/// The display duration is a hint for the transient UI notification and is
/// not part of any durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardEvent {
    /// Unique award identifier.
    pub id: AwardId,
    /// Currency granted.
    pub currency: Currency,
    /// Amount granted.
    pub amount: u64,
    /// Number of newly crossed units this award pays for.
    pub units: u64,
    /// Award watermark after the grant.
    pub awarded_through_units: u64,
    /// When the award was made.
    pub awarded_at: DateTime<Utc>,
    /// How long the UI should show the notification.
    pub display_duration_ms: u64,
}
