//! Business-day handling
//!
//! Riders settle per local calendar day, so "today" and the day window used
//! for summaries are always computed in the operating timezone rather than UTC.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use std::str::FromStr;

/// Timezone wrapper for the operating region
///
/// Wraps chrono_tz::Tz with custom serialization support.
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
        Timezone::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// The local calendar date at `now`
    pub fn business_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.to_local(now).date_naive()
    }

    /// Gets the start of day (00:00:00) in this timezone as UTC
    pub fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, TemporalError> {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| TemporalError::UnrepresentableLocalTime(date.to_string()))?;
        naive
            .and_local_timezone(self.0)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| TemporalError::UnrepresentableLocalTime(naive.to_string()))
    }

    /// Gets the end of day (23:59:59.999999999) in this timezone as UTC
    pub fn end_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, TemporalError> {
        let naive = date
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .ok_or_else(|| TemporalError::UnrepresentableLocalTime(date.to_string()))?;
        naive
            .and_local_timezone(self.0)
            .latest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| TemporalError::UnrepresentableLocalTime(naive.to_string()))
    }

    /// The UTC window covering one local business day
    pub fn day_window(&self, date: NaiveDate) -> Result<DayWindow, TemporalError> {
        Ok(DayWindow {
            date,
            start: self.start_of_day(date)?,
            end: self.end_of_day(date)?,
        })
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Manila)
    }
}

/// One local calendar day expressed as an inclusive UTC range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Local time {0} does not exist in this timezone")]
    UnrepresentableLocalTime(String),
}
