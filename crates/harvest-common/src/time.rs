//! Time handling for harvested catalogs.
//!
//! Providers hand out instants in every ISO-8601 dialect imaginable, and
//! capabilities documents may compress long time series into
//! `start/end/period` notation. Everything here normalises to UTC and to the
//! `%Y-%m-%dT%H:%M:%SZ` spelling used throughout the catalog.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

/// Canonical output format for instants.
pub const ZULU_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse an ISO-8601 instant, assuming UTC when no offset is given.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    // Full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Without timezone, with or without fractional seconds
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        let trimmed = s.strip_suffix('Z').unwrap_or(s);
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Format an instant as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_zulu(dt: &DateTime<Utc>) -> String {
    dt.format(ZULU_FORMAT).to_string()
}

/// Calendar date of an instant, used for per-day deduplication.
pub fn date_key(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// A `[start, end]` pair where a missing end means open/ongoing.
///
/// Serializes as a two element array, `null` for the open end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// A closed interval.
    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// An interval that started at `start` and is still ongoing.
    pub fn open(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }
}

impl Serialize for TimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&format_zulu(&self.start))?;
        tuple.serialize_element(&self.end.as_ref().map(format_zulu))?;
        tuple.end()
    }
}

/// An ISO-8601 duration such as `P1D`, `PT6H` or `P1Y2M`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsoDuration {
    pub months: u32,
    pub days: i64,
    pub seconds: i64,
}

impl IsoDuration {
    /// Parse the `PnYnMnWnDTnHnMnS` notation.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let invalid = || TimeParseError::InvalidDuration(s.to_string());
        let body = s.trim().strip_prefix('P').ok_or_else(invalid)?;

        let mut duration = IsoDuration::default();
        let mut in_time = false;
        let mut number = String::new();

        for ch in body.chars() {
            match ch {
                'T' => in_time = true,
                '0'..='9' | '.' => number.push(ch),
                unit => {
                    let value: f64 = number.parse().map_err(|_| invalid())?;
                    number.clear();
                    let total = match (in_time, unit) {
                        (false, 'Y') => add_months(&mut duration.months, value, 12),
                        (false, 'M') => add_months(&mut duration.months, value, 1),
                        (false, 'W') => add_scaled(&mut duration.days, value, 7.0),
                        (false, 'D') => add_scaled(&mut duration.days, value, 1.0),
                        (true, 'H') => add_scaled(&mut duration.seconds, value, 3600.0),
                        (true, 'M') => add_scaled(&mut duration.seconds, value, 60.0),
                        (true, 'S') => add_scaled(&mut duration.seconds, value, 1.0),
                        _ => None,
                    };
                    total.ok_or_else(invalid)?;
                }
            }
        }

        if !number.is_empty() || duration.is_zero() {
            return Err(invalid());
        }
        Ok(duration)
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.seconds == 0
    }

    /// Add this duration to an instant, `None` on calendar overflow.
    pub fn add_to(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shifted = if self.months > 0 {
            dt.checked_add_months(Months::new(self.months))?
        } else {
            dt
        };
        let delta = Duration::try_days(self.days)?
            .checked_add(&Duration::try_seconds(self.seconds)?)?;
        shifted.checked_add_signed(delta)
    }
}

/// Add `value` whole units of `factor` months, `None` on overflow.
fn add_months(months: &mut u32, value: f64, factor: u32) -> Option<()> {
    let whole = u32::try_from(value as u64).ok()?;
    *months = whole.checked_mul(factor)?.checked_add(*months)?;
    Some(())
}

/// Add `value * factor` truncated to an integer, `None` on overflow.
fn add_scaled(total: &mut i64, value: f64, factor: f64) -> Option<()> {
    let scaled = value * factor;
    if !scaled.is_finite() || scaled >= i64::MAX as f64 {
        return None;
    }
    *total = total.checked_add(scaled as i64)?;
    Some(())
}

/// Expand capabilities time positions into discrete instants.
///
/// Entries in `start/end/period` notation are stepped through, `start/end`
/// pairs contribute both bounds, everything else is kept verbatim. Duplicates
/// are dropped while preserving first-seen order.
pub fn expand_time_positions<S: AsRef<str>>(positions: &[S]) -> Result<Vec<String>, TimeParseError> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    let mut push = |value: String| {
        if seen.insert(value.clone()) {
            expanded.push(value);
        }
    };

    for position in positions {
        let position = position.as_ref().trim();
        if position.is_empty() {
            continue;
        }

        let parts: Vec<&str> = position.split('/').collect();
        match parts.as_slice() {
            [start, end, period] => {
                let start = parse_iso8601(start)?;
                let end = parse_iso8601(end)?;
                let step = IsoDuration::parse(period)?;
                let mut current = start;
                while current <= end {
                    push(format_zulu(&current));
                    current = step
                        .add_to(current)
                        .ok_or_else(|| TimeParseError::Overflow(position.to_string()))?;
                }
            }
            [start, end] => {
                push(format_zulu(&parse_iso8601(start)?));
                push(format_zulu(&parse_iso8601(end)?));
            }
            _ => push(position.to_string()),
        }
    }

    Ok(expanded)
}

/// Step size for generated time lists.
///
/// A missing step means one day; inside a given step, missing units are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStep {
    #[serde(default)]
    pub weeks: i64,
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub hours: i64,
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub seconds: i64,
}

impl Default for TimeStep {
    fn default() -> Self {
        Self {
            weeks: 0,
            days: 1,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

impl TimeStep {
    /// The step as one duration, `None` when it does not fit.
    pub fn to_duration(&self) -> Option<Duration> {
        [
            Duration::try_weeks(self.weeks)?,
            Duration::try_days(self.days)?,
            Duration::try_hours(self.hours)?,
            Duration::try_minutes(self.minutes)?,
            Duration::try_seconds(self.seconds)?,
        ]
        .iter()
        .try_fold(Duration::zero(), |acc, part| acc.checked_add(part))
    }
}

/// Generate every instant from `start` to `end` (inclusive) in `step` increments.
///
/// `end` may be the literal `today`, resolved against `now`.
pub fn generate_times(
    start: &str,
    end: &str,
    step: &TimeStep,
    now: DateTime<Utc>,
) -> Result<Vec<String>, TimeParseError> {
    let step_duration = step
        .to_duration()
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| TimeParseError::InvalidDuration(format!("{:?}", step)))?;

    let mut current = parse_iso8601(start)?;
    let end = if end.eq_ignore_ascii_case("today") {
        now
    } else {
        parse_iso8601(end)?
    };

    let mut times = Vec::new();
    while current <= end {
        times.push(format_zulu(&current));
        current = current
            .checked_add_signed(step_duration)
            .ok_or_else(|| TimeParseError::Overflow(start.to_string()))?;
    }
    Ok(times)
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid ISO-8601 duration: {0}")]
    InvalidDuration(String),

    #[error("Time arithmetic overflowed while expanding {0}")]
    Overflow(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_iso8601_variants() {
        let dt = parse_iso8601("2024-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 12);

        let naive = parse_iso8601("2020-09-01T00:00:00").unwrap();
        assert_eq!(naive.month(), 9);

        let date = parse_iso8601("2021-03-04").unwrap();
        assert_eq!(date.day(), 4);

        let offset = parse_iso8601("2021-03-04T02:00:00+02:00").unwrap();
        assert_eq!(offset.hour(), 0);
    }

    #[test]
    fn test_format_zulu() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        assert_eq!(format_zulu(&dt), "2024-01-15T12:30:00Z");
        assert_eq!(date_key(&dt), "2024-01-15");
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!(IsoDuration::parse("P1D").unwrap().days, 1);
        assert_eq!(IsoDuration::parse("PT6H").unwrap().seconds, 6 * 3600);
        assert_eq!(IsoDuration::parse("P1Y2M").unwrap().months, 14);
        assert!(IsoDuration::parse("P").is_err());
        assert!(IsoDuration::parse("1D").is_err());
    }

    #[test]
    fn test_duration_overflow_is_rejected() {
        assert!(matches!(
            IsoDuration::parse("P999999999999Y"),
            Err(TimeParseError::InvalidDuration(_))
        ));
        assert!(IsoDuration::parse("P400000000Y").is_err());
        assert!(IsoDuration::parse("P4294967295M").is_ok());

        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let huge = IsoDuration::parse("P999999999999999D").unwrap();
        assert_eq!(huge.add_to(start), None);
    }

    #[test]
    fn test_interval_serializes_as_pair() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_string(&TimeInterval::open(start)).unwrap();
        assert_eq!(json, r#"["2020-01-01T00:00:00Z",null]"#);
    }
}
