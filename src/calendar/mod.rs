//! Calendrical and time-of-day values in the proleptic Gregorian
//! system, at nanosecond resolution.
//!
//! This module exists to give NTP results something to print: a
//! [`DateTime`] is what a [`crate::query::named::NamedOutcome`]'s
//! `packet` timestamps and `rtt` get rendered through in logs and
//! tests (spec.md §1, §6). The calendar arithmetic itself — civil date
//! to day count and back — is not the hard part of this crate and is
//! kept deliberately small.

pub mod format;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::time::SystemTime;

use crate::timestamp::NtpTimestamp;

pub use format::ParseError;

/// A proleptic-Gregorian calendar date and time of day, at nanosecond
/// resolution.
///
/// Backed by [`chrono::NaiveDateTime`] (no time zone: NTP results are
/// reported and compared against the local wall clock, exactly as the
/// transport layer already treats [`std::time::SystemTime`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(NaiveDateTime);

impl DateTime {
    /// Builds a `DateTime` from its calendar fields. Returns `None` if
    /// the date or time is out of range (e.g. 1999-02-30, or an hour
    /// ≥ 24).
    #[must_use]
    pub fn from_ymd_hms_nano(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        nanosecond: u32,
    ) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanosecond)?;
        Some(DateTime(NaiveDateTime::new(date, time)))
    }

    /// The current wall-clock instant.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Converts a [`SystemTime`] to a `DateTime`, treating it as UTC.
    #[must_use]
    pub fn from_system_time(t: SystemTime) -> Self {
        let since_epoch = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let secs = since_epoch.as_secs() as i64;
        let nanos = since_epoch.subsec_nanos();
        let naive = chrono::DateTime::from_timestamp(secs, nanos)
            .expect("duration since epoch is in range")
            .naive_utc();
        DateTime(naive)
    }

    /// Converts an [`NtpTimestamp`] to a `DateTime`, via its
    /// reconstructed duration since the NTP prime epoch.
    #[must_use]
    pub fn from_ntp_timestamp(ts: NtpTimestamp) -> Self {
        let since_ntp_epoch = ts.duration();
        let prime_epoch = NaiveDate::from_ymd_opt(1900, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let naive = prime_epoch
            + chrono::Duration::seconds(since_ntp_epoch.as_secs() as i64)
            + chrono::Duration::nanoseconds(i64::from(since_ntp_epoch.subsec_nanos()));
        DateTime(naive)
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(self) -> u32 {
        self.0.day()
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        self.0.minute()
    }

    #[must_use]
    pub fn second(self) -> u32 {
        self.0.second()
    }

    #[must_use]
    pub fn nanosecond(self) -> u32 {
        self.0.nanosecond()
    }

    /// ISO weekday number, `1` (Monday) through `7` (Sunday).
    #[must_use]
    pub fn weekday_number(self) -> u32 {
        self.0.weekday().number_from_monday()
    }

    /// The Julian Day Number corresponding to this instant's calendar
    /// date and time of day.
    #[must_use]
    pub fn to_julian_day(self) -> JulianDay {
        JulianDay::from_civil(self.year(), self.month(), self.day())
            .with_time_of_day(self.hour(), self.minute(), self.second(), self.nanosecond())
    }

    /// Formats this instant using the grammar documented in
    /// [`format`].
    #[must_use]
    pub fn format(self, pattern: &str) -> String {
        format::format(self, pattern)
    }

    /// Parses `input` against `pattern`, using the same grammar as
    /// [`DateTime::format`].
    pub fn parse(input: &str, pattern: &str) -> Result<Self, ParseError> {
        format::parse(input, pattern)
    }
}

/// A continuous Julian Day count: the integer part is the JDN (noon
/// to noon), the fractional part is elapsed time since the preceding
/// noon divided by 86400.
///
/// Julian Day 0.0 is noon, 1 January 4713 BCE (proleptic Julian
/// calendar); day-to-civil conversion here is always in the proleptic
/// *Gregorian* calendar, matching [`DateTime`].
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct JulianDay(pub f64);

impl JulianDay {
    /// The Julian Day Number at noon of the given proleptic-Gregorian
    /// civil date, via the Fliegel & Van Flandern algorithm.
    #[must_use]
    pub fn from_civil(year: i32, month: u32, day: u32) -> Self {
        let (y, m, d) = (i64::from(year), i64::from(month), i64::from(day));
        let a = (14 - m) / 12;
        let y2 = y + 4800 - a;
        let m2 = m + 12 * a - 3;

        let jdn = d + (153 * m2 + 2) / 5 + 365 * y2 + y2 / 4 - y2 / 100 + y2 / 400 - 32045;
        JulianDay(jdn as f64)
    }

    /// Advances this noon-anchored day count by a time of day,
    /// shifting the reference point back to the preceding midnight.
    #[must_use]
    fn with_time_of_day(self, hour: u32, minute: u32, second: u32, nanosecond: u32) -> Self {
        let seconds_since_midnight = f64::from(hour) * 3600.0
            + f64::from(minute) * 60.0
            + f64::from(second)
            + f64::from(nanosecond) / 1_000_000_000.0;
        JulianDay(self.0 - 0.5 + seconds_since_midnight / 86400.0)
    }

    /// The proleptic-Gregorian civil date `(year, month, day)` at noon
    /// of (the integer part of) this Julian Day.
    #[must_use]
    pub fn to_civil(self) -> (i32, u32, u32) {
        let jdn = self.0.floor() as i64;
        let a = jdn + 32044;
        let b = (4 * a + 3) / 146_097;
        let c = a - (146_097 * b) / 4;
        let d = (4 * c + 3) / 1461;
        let e = c - (1461 * d) / 4;
        let m = (5 * e + 2) / 153;

        let day = (e - (153 * m + 2) / 5 + 1) as u32;
        let month = (m + 3 - 12 * (m / 10)) as u32;
        let year = (100 * b + d - 4800 + m / 10) as i32;

        (year, month, day)
    }
}
