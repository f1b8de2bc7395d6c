//! Enumeration types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An in-game currency held in the player's [`Wallet`](crate::Wallet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Premium currency granted for every award unit of cumulative steps.
    Crystal,
    /// Secondary currency.
    Silver,
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Crystal => write!(f, "crystal"),
            Self::Silver => write!(f, "silver"),
        }
    }
}

/// A quantity the health-data provider can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Step count.
    Steps,
    /// Walking and running distance in metres.
    WalkingDistance,
    /// Active energy burned in kilocalories.
    ActiveEnergy,
    /// Body mass in kilograms (latest sample).
    BodyMass,
}

/// The source that triggered a sync cycle.
///
/// Several sources may fire concurrently; the trigger is only recorded for
/// logging and never changes how a reading is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// A view appeared in the foreground.
    Foreground,
    /// The app scene became active again.
    SceneActive,
    /// The user pulled to refresh.
    PullToRefresh,
    /// The provider delivered a change notification.
    BackgroundDelivery,
    /// The OS granted a periodic background refresh window.
    BackgroundRefresh,
    /// A significant location change woke the app.
    LocationChange,
    /// A debug action injected readings.
    Debug,
}

impl core::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Foreground => "foreground",
            Self::SceneActive => "scene_active",
            Self::PullToRefresh => "pull_to_refresh",
            Self::BackgroundDelivery => "background_delivery",
            Self::BackgroundRefresh => "background_refresh",
            Self::LocationChange => "location_change",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Where the cumulative baseline is anchored on first launch.
///
/// A user-triggered reset always re-anchors to the reset instant regardless
/// of this policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Anchor at the moment the state is first created.
    #[default]
    Now,
    /// Anchor at the Unix epoch so every historical sample counts.
    FullHistory,
}

impl BaselinePolicy {
    /// Baseline instant for state first created at `now`.
    pub const fn anchor(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Now => now,
            Self::FullHistory => DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// How a raw cumulative reading was interpreted by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    /// The reading advanced past the watermark.
    Advanced,
    /// The reading equalled the watermark.
    Unchanged,
    /// The reading was below the watermark; the watermark was moved down to
    /// it and no delta was emitted.
    Resynced,
    /// No reading was available this cycle; nothing changed.
    NoReading,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_policy_defaults_to_now() {
        assert_eq!(BaselinePolicy::default(), BaselinePolicy::Now);
    }

    #[test]
    fn enums_serialize_snake_case() {
        let json = serde_json::to_string(&SyncTrigger::LocationChange).unwrap_or_default();
        assert_eq!(json, "\"location_change\"");
        let json = serde_json::to_string(&BaselinePolicy::FullHistory).unwrap_or_default();
        assert_eq!(json, "\"full_history\"");
    }
}
