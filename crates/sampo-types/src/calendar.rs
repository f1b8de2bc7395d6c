//! Structural calendar-day values.
//!
//! Daily counters roll over when the calendar day changes. The day is kept
//! as a date value and compared by equality, never as a formatted string.
//! The local offset used to derive it is supplied by the caller.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A calendar day in the player's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// Build a day from year, month and day-of-month.
    ///
    /// Returns `None` for dates that do not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Wrap a [`NaiveDate`].
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The calendar day an instant falls on at the given local offset.
    pub fn of_instant(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self(instant.with_timezone(&offset).date_naive())
    }

    /// The UTC instant this day starts at, at the given local offset.
    ///
    /// Returns `None` only if the instant is outside chrono's range.
    pub fn start_instant(self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        offset
            .from_local_datetime(&self.0.and_time(NaiveTime::MIN))
            .single()
            .map(|local| local.with_timezone(&Utc))
    }

    /// Return the inner [`NaiveDate`].
    pub const fn date(self) -> NaiveDate {
        self.0
    }
}

impl core::fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn instant_maps_to_local_day() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 20, 30, 0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(
            CalendarDay::of_instant(instant, tokyo),
            CalendarDay::from_ymd(2026, 3, 2).unwrap()
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            CalendarDay::of_instant(instant, utc),
            CalendarDay::from_ymd(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn start_instant_honours_offset() {
        let day = CalendarDay::from_ymd(2026, 3, 2).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let start = day.start_instant(tokyo).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn invalid_date_is_rejected() {
        assert!(CalendarDay::from_ymd(2026, 2, 30).is_none());
    }

    #[test]
    fn serializes_as_plain_date() {
        let day = CalendarDay::from_ymd(2026, 10, 14).unwrap();
        assert_eq!(serde_json::to_string(&day).unwrap(), "\"2026-10-14\"");
        assert_eq!(day.to_string(), "2026-10-14");
    }
}
