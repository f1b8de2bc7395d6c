//! Wall clock and calendar-day derivation.
//!
//! Every "now" the service uses comes from a [`Clock`]. The production
//! clock is [`SystemClock`]; [`DebugClock`] can be pinned to another
//! instant to simulate a different date (day rollover, counter rewinds).
//!
//! The calendar day that stamina conversion keys on is derived from "now"
//! and a fixed UTC offset by [`Calendar`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use sampo_types::CalendarDay;

/// Source of the current instant.
pub trait Clock: Send + Sync + 'static {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Sentinel meaning "no override".
const NO_OVERRIDE: i64 = i64::MIN;

/// A wall clock whose reading can be overridden.
#[derive(Debug)]
pub struct DebugClock {
    override_ms: AtomicI64,
}

impl DebugClock {
    /// A clock following the system time until overridden.
    pub const fn new() -> Self {
        Self {
            override_ms: AtomicI64::new(NO_OVERRIDE),
        }
    }

    /// A clock pinned at `at`.
    pub fn pinned(at: DateTime<Utc>) -> Self {
        let clock = Self::new();
        clock.set_override(at);
        clock
    }

    /// Report `at` as "now" until cleared.
    pub fn set_override(&self, at: DateTime<Utc>) {
        self.override_ms.store(at.timestamp_millis(), Ordering::SeqCst);
        tracing::info!(%at, "debug clock override set");
    }

    /// Return to the system time.
    pub fn clear_override(&self) {
        self.override_ms.store(NO_OVERRIDE, Ordering::SeqCst);
        tracing::info!("debug clock override cleared");
    }

    /// Move an active override forward (or backward) by `by`.
    ///
    /// Starts from the system time if no override is active.
    pub fn advance(&self, by: chrono::Duration) {
        let next = self.now().checked_add_signed(by).unwrap_or_else(|| self.now());
        self.set_override(next);
    }

    /// The active override, if any.
    pub fn override_instant(&self) -> Option<DateTime<Utc>> {
        match self.override_ms.load(Ordering::SeqCst) {
            NO_OVERRIDE => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}

impl Default for DebugClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for DebugClock {
    fn now(&self) -> DateTime<Utc> {
        self.override_instant().unwrap_or_else(Utc::now)
    }
}

/// Maps instants to local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    /// A calendar at the given local offset.
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// A calendar on UTC.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// The local offset.
    pub const fn offset(self) -> FixedOffset {
        self.offset
    }

    /// Local calendar day containing `now`.
    pub fn day_of(self, now: DateTime<Utc>) -> CalendarDay {
        CalendarDay::of_instant(now, self.offset)
    }

    /// First instant of the local day containing `now`.
    ///
    /// Falls back to `now` itself if the start cannot be represented.
    pub fn start_of_day(self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.day_of(now).start_instant(self.offset).unwrap_or(now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn debug_clock_override_and_clear() {
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 0).unwrap();
        let clock = DebugClock::pinned(at);
        assert_eq!(clock.now(), at);
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.now(), at + Duration::minutes(2));
        clock.clear_override();
        assert!(clock.override_instant().is_none());
        assert!(clock.now() > at);
    }

    #[test]
    fn calendar_day_respects_offset() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let tokyo = Calendar::new(FixedOffset::east_opt(9 * 3600).unwrap());
        assert_eq!(tokyo.day_of(at), CalendarDay::from_ymd(2026, 1, 2).unwrap());
        assert_eq!(Calendar::utc().day_of(at), CalendarDay::from_ymd(2026, 1, 1).unwrap());
    }

    #[test]
    fn start_of_day_in_local_time() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let tokyo = Calendar::new(FixedOffset::east_opt(9 * 3600).unwrap());
        assert_eq!(
            tokyo.start_of_day(at),
            Utc.with_ymd_and_hms(2026, 1, 1, 15, 0, 0).unwrap()
        );
    }
}
