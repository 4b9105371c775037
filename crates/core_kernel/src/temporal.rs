//! Time handling for the billing engine
//!
//! Every operation takes its notion of "now" from a [`Clock`] rather than
//! calling `Utc::now()` directly, so tests can pin or advance time.
//! Receipt numbering, reconciliation, and report date ranges all work in
//! hospital-local calendar days, which [`Timezone`] provides.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid range: start {start} must not be after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Source of the current time
///
/// Production code uses [`SystemClock`]; tests use [`FixedClock`] to make
/// time-dependent behavior (override expiry, aging buckets, receipt day
/// rollover) deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a settable instant
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to a new instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = now;
    }

    /// Advances the clock by a duration
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock lock poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

/// Hospital-local timezone
///
/// Wraps `chrono_tz::Tz` with serde support. Calendar-day boundaries for
/// receipts, reconciliation, and reports are computed here so a charge
/// paid at 23:50 local time lands on the local day, not the UTC one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// The local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Start of day (00:00:00) in this timezone, as UTC
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(0, 0, 0)
            .unwrap()
            .and_local_timezone(self.0)
            .single()
            .expect("Invalid timezone conversion")
            .with_timezone(&Utc)
    }

    /// End of day (23:59:59.999999999) in this timezone, as UTC
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap()
            .and_local_timezone(self.0)
            .single()
            .expect("Invalid timezone conversion")
            .with_timezone(&Utc)
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// An inclusive date range at day granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range; both endpoints are inclusive
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A single-day range
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether a UTC instant falls within this range in the given timezone
    pub fn contains_instant(&self, instant: DateTime<Utc>, tz: Timezone) -> bool {
        self.contains(tz.local_date(instant))
    }

    /// Iterates every date in the range
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}
