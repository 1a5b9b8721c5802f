//! Calendar / clock provider.
//!
//! The quiz core never reads wall-clock time directly. Every operation that
//! needs "today" or "now" receives it from a `Calendar`, which lets tests pin
//! arbitrary dates.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid date key '{0}' (expected YYYY-MM-DD)")]
pub struct DateKeyParseError(pub String);

/// A calendar date in the quiz's fixed civil timezone. Renders as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The calendar day immediately preceding this one.
    pub fn pred(&self) -> Self {
        Self(self.0 - Duration::days(1))
    }

    pub fn succ(&self) -> Self {
        Self(self.0 + Duration::days(1))
    }

    /// Signed number of days from `other` to `self`.
    pub fn days_since(&self, other: DateKey) -> i64 {
        (self.0 - other.0).num_days()
    }

    /// Days since 1970-01-01; negative before the epoch.
    pub fn days_since_epoch(&self) -> i64 {
        (self.0 - NaiveDate::default()).num_days()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_KEY_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = DateKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields; the key format does not.
        if s.len() != 10 {
            return Err(DateKeyParseError(s.to_string()));
        }
        NaiveDate::parse_from_str(s, DATE_KEY_FORMAT)
            .map(Self)
            .map_err(|_| DateKeyParseError(s.to_string()))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Leaderboard aggregation bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Daily,
    Weekly,
}

/// Opaque aggregation bucket key: `YYYY-MM-DD` for days, `YYYY-Www` for ISO weeks.
/// Keys of the same kind sort in calendar order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn for_date(kind: PeriodKind, date: DateKey) -> Self {
        match kind {
            PeriodKind::Daily => Self(date.to_string()),
            PeriodKind::Weekly => {
                let week = date.date().iso_week();
                Self(format!("{:04}-W{:02}", week.year(), week.week()))
            }
        }
    }

    /// Accepts either a daily or a weekly key as supplied by a client.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.parse::<DateKey>().is_ok() {
            return Some(Self(raw.to_string()));
        }
        let (year, week) = raw.split_once("-W")?;
        let valid = year.len() == 4
            && week.len() == 2
            && year.chars().all(|c| c.is_ascii_digit())
            && matches!(week.parse::<u32>(), Ok(1..=53));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Injected clock. Implementations must be cheap and side-effect free.
pub trait Calendar: Send + Sync {
    /// Current instant, used for `assignedAt` and completion timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Today's date key in the quiz's civil timezone.
    fn today(&self) -> DateKey;

    fn day_before(&self, date: DateKey) -> DateKey {
        date.pred()
    }

    fn period_key(&self, kind: PeriodKind, date: DateKey) -> PeriodKey {
        PeriodKey::for_date(kind, date)
    }
}

/// Wall-clock calendar pinned to a fixed UTC offset.
pub struct SystemCalendar {
    offset: FixedOffset,
}

impl SystemCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Calendar for SystemCalendar {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> DateKey {
        DateKey(Utc::now().with_timezone(&self.offset).date_naive())
    }
}

/// Calendar whose date can be moved by hand. Used by tests.
pub struct FixedCalendar {
    today: Mutex<DateKey>,
}

impl FixedCalendar {
    pub fn new(today: DateKey) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: DateKey) {
        *self.today.lock().unwrap_or_else(|e| e.into_inner()) = today;
    }
}

impl Calendar for FixedCalendar {
    fn now(&self) -> DateTime<Utc> {
        let today = *self.today.lock().unwrap_or_else(|e| e.into_inner());
        today
            .date()
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc()
    }

    fn today(&self) -> DateKey {
        *self.today.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::date;

    #[test]
    fn test_date_key_round_trips_through_display() {
        let key = date("2024-03-01");
        assert_eq!(key.to_string(), "2024-03-01");
    }

    #[test]
    fn test_date_key_rejects_unpadded_and_garbage() {
        assert!("2024-3-1".parse::<DateKey>().is_err());
        assert!("yesterday".parse::<DateKey>().is_err());
        assert!("2024-02-30".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_pred_crosses_month_and_leap_day() {
        assert_eq!(date("2024-03-01").pred(), date("2024-02-29"));
        assert_eq!(date("2023-03-01").pred(), date("2023-02-28"));
        assert_eq!(date("2024-01-01").pred(), date("2023-12-31"));
    }

    #[test]
    fn test_weekly_period_uses_iso_week_year() {
        // 2021-01-03 is a Sunday that belongs to ISO week 53 of 2020.
        let key = PeriodKey::for_date(PeriodKind::Weekly, date("2021-01-03"));
        assert_eq!(key.as_str(), "2020-W53");
        let key = PeriodKey::for_date(PeriodKind::Weekly, date("2024-03-01"));
        assert_eq!(key.as_str(), "2024-W09");
    }

    #[test]
    fn test_period_key_parse() {
        assert!(PeriodKey::parse("2024-03-01").is_some());
        assert!(PeriodKey::parse("2024-W09").is_some());
        assert!(PeriodKey::parse("2024-W54").is_none());
        assert!(PeriodKey::parse("2024-W9").is_none());
        assert!(PeriodKey::parse("week-9").is_none());
    }

    #[test]
    fn test_fixed_calendar_can_be_moved() {
        let cal = FixedCalendar::new(date("2024-03-01"));
        assert_eq!(cal.today(), date("2024-03-01"));
        cal.set(date("2024-03-05"));
        assert_eq!(cal.today(), date("2024-03-05"));
        assert_eq!(cal.day_before(cal.today()), date("2024-03-04"));
    }

    #[test]
    fn test_system_calendar_applies_offset() {
        let east = SystemCalendar::new(FixedOffset::east_opt(14 * 3600).unwrap());
        let west = SystemCalendar::new(FixedOffset::west_opt(12 * 3600).unwrap());
        // 26 hours apart: the eastern date is always one or two days ahead.
        let gap = east.today().days_since(west.today());
        assert!((1..=2).contains(&gap), "gap was {gap}");
    }
}
