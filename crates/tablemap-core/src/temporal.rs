//! Date and time representations and their text forms.
//!
//! Values are kept in the same units as [`Value`]: days since the Unix
//! epoch for dates, microseconds since midnight for times and microseconds
//! since the epoch for timestamps.

use crate::error::{Error, TypeError};
use crate::types::{SqlType, TypeInfo};
use crate::value::Value;

pub const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Calendar date, stored as days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date(pub i32);

/// Time of day, stored as microseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(pub i64);

/// Instant, stored as microseconds since 1970-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl Date {
    /// Dates beyond the `i32` day range clamp to its bounds.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Self {
        let days = date_to_days(i64::from(year), month, day);
        Date(i32::try_from(days).unwrap_or(if days < 0 { i32::MIN } else { i32::MAX }))
    }
}

impl Timestamp {
    /// Panics on overflow; see [`Timestamp::checked_from_millis`].
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis * 1000)
    }

    /// `None` when `millis` is outside the microsecond range.
    pub fn checked_from_millis(millis: i64) -> Option<Self> {
        millis.checked_mul(1000).map(Timestamp)
    }

    pub fn as_millis(self) -> i64 {
        self.0.div_euclid(1000)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v.0)
    }
}

impl From<Time> for Value {
    fn from(v: Time) -> Self {
        Value::Time(v.0)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v.0)
    }
}

impl TryFrom<Value> for Date {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Date(d) => Ok(Date(d)),
            Value::Text(s) => parse_date_string(&s).map(Date),
            other => Err(type_error("DATE", other.type_name())),
        }
    }
}

impl TryFrom<Value> for Time {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Time(t) => Ok(Time(t)),
            Value::Text(s) => parse_time_string(&s).map(Time),
            other => Err(type_error("TIME", other.type_name())),
        }
    }
}

impl TryFrom<Value> for Timestamp {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Timestamp(t) | Value::TimestampTz(t) => Ok(Timestamp(t)),
            Value::Text(s) => parse_timestamp_string(&s).map(Timestamp),
            other => Err(type_error("TIMESTAMP", other.type_name())),
        }
    }
}

impl TypeInfo for Date {
    const SQL_TYPE: SqlType = SqlType::Date;
    const TYPE_NAME: &'static str = "Date";
}

impl TypeInfo for Time {
    const SQL_TYPE: SqlType = SqlType::Time;
    const TYPE_NAME: &'static str = "Time";
}

impl TypeInfo for Timestamp {
    const SQL_TYPE: SqlType = SqlType::Timestamp;
    const TYPE_NAME: &'static str = "Timestamp";
}

/// Parse a date string in YYYY-MM-DD format into days since the epoch.
pub fn parse_date_string(s: &str) -> Result<i32, Error> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() != 3 {
        return Err(type_error("date", s));
    }

    let year: i32 = parts[0].parse().map_err(|_| type_error("date", s))?;
    let month: u32 = parts[1].parse().map_err(|_| type_error("date", s))?;
    let day: u32 = parts[2].parse().map_err(|_| type_error("date", s))?;
    if !(1..=12).contains(&month) || day == 0 || day > 31 {
        return Err(type_error("date", s));
    }

    i32::try_from(date_to_days(i64::from(year), month, day)).map_err(|_| type_error("date", s))
}

/// Parse a time string in HH:MM[:SS[.ffffff]] format into microseconds.
pub fn parse_time_string(s: &str) -> Result<i64, Error> {
    let s = s.trim();
    let (time_part, frac_part) = match s.find('.') {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };

    let parts: Vec<&str> = time_part.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(type_error("time", s));
    }

    let hours: i64 = parts[0].parse().map_err(|_| type_error("time", s))?;
    let mins: i64 = parts[1].parse().map_err(|_| type_error("time", s))?;
    let secs: i64 = match parts.get(2) {
        Some(p) => p.parse().map_err(|_| type_error("time", s))?,
        None => 0,
    };

    let mut micros = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(mins.checked_mul(60)?))
        .and_then(|hm| hm.checked_add(secs))
        .and_then(|total| total.checked_mul(MICROS_PER_SECOND))
        .ok_or_else(|| type_error("time", s))?;

    if let Some(frac) = frac_part {
        let digits = if frac.len() > 6 { &frac[..6] } else { frac };
        if digits.is_empty() {
            return Err(type_error("time", s));
        }
        let frac_micros: i64 = digits.parse().map_err(|_| type_error("time", s))?;
        micros = frac_micros
            .checked_mul(10_i64.pow(6 - digits.len() as u32))
            .and_then(|f| micros.checked_add(f))
            .ok_or_else(|| type_error("time", s))?;
    }

    Ok(micros)
}

/// Parse "YYYY-MM-DD[ T]HH:MM:SS[.ffffff][Z|+hh:mm]" into microseconds since
/// the epoch. A bare date is midnight of that day; offsets are dropped.
pub fn parse_timestamp_string(s: &str) -> Result<i64, Error> {
    let normalized = s.trim().replace('T', " ");
    let mut body = normalized.trim_end_matches('Z');
    if let Some(pos) = body.find('+') {
        body = &body[..pos];
    } else if let Some(pos) = body.rfind('-') {
        if pos > 10 {
            body = &body[..pos];
        }
    }

    let parts: Vec<&str> = body.split(' ').filter(|p| !p.is_empty()).collect();
    let (date, time) = match parts.as_slice() {
        [date] => (*date, 0),
        [date, time] => (*date, parse_time_string(time)?),
        _ => return Err(type_error("timestamp", s)),
    };
    i64::from(parse_date_string(date)?)
        .checked_mul(MICROS_PER_DAY)
        .and_then(|micros| micros.checked_add(time))
        .ok_or_else(|| type_error("timestamp", s))
}

/// Format days since the epoch as YYYY-MM-DD.
pub fn format_date(days: i32) -> String {
    let (year, month, day) = days_to_civil(days);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// Format microseconds since midnight as HH:MM:SS[.ffffff].
pub fn format_time(micros: i64) -> String {
    let total_secs = micros.div_euclid(MICROS_PER_SECOND);
    let frac = micros.rem_euclid(MICROS_PER_SECOND);
    let hours = (total_secs / 3600) % 24;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    if frac > 0 {
        format!("{:02}:{:02}:{:02}.{:06}", hours, minutes, seconds, frac)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Format microseconds since the epoch as YYYY-MM-DDTHH:MM:SS[.ffffff].
#[allow(clippy::cast_possible_truncation)]
pub fn format_timestamp(micros: i64) -> String {
    let days = micros.div_euclid(MICROS_PER_DAY) as i32;
    let time_of_day = micros.rem_euclid(MICROS_PER_DAY);
    format!("{}T{}", format_date(days), format_time(time_of_day))
}

/// Convert year/month/day to days since Unix epoch.
#[allow(clippy::cast_possible_truncation)]
fn date_to_days(year: i64, month: u32, day: u32) -> i64 {
    // Algorithm from https://howardhinnant.github.io/date_algorithms.html
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + i64::from(doe) - 719_468
}

/// Inverse of [`date_to_days`].
#[allow(clippy::cast_possible_truncation)]
fn days_to_civil(days: i32) -> (i64, u32, u32) {
    let z = i64::from(days) + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = i64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (if month <= 2 { y + 1 } else { y }, month, day)
}

fn type_error(expected: &'static str, value: impl std::fmt::Display) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("invalid value: {}", value),
        column: None,
        rust_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_parsing() {
        assert_eq!(parse_date_string("2000-01-01").unwrap(), 10_957);
        assert_eq!(parse_date_string("1970-01-01").unwrap(), 0);
        assert!(parse_date_string("2000-13-01").is_err());
        assert!(parse_date_string("yesterday").is_err());
    }

    #[test]
    fn test_time_parsing() {
        assert_eq!(parse_time_string("00:00:00").unwrap(), 0);
        assert_eq!(parse_time_string("01:00").unwrap(), 3_600_000_000);
        assert_eq!(parse_time_string("12:30:45.123456").unwrap(), 45_045_123_456);
        assert_eq!(parse_time_string("00:00:01.5").unwrap(), 1_500_000);
    }

    #[test]
    fn test_timestamp_parsing() {
        assert_eq!(
            parse_timestamp_string("1970-01-02T00:00:01").unwrap(),
            MICROS_PER_DAY + MICROS_PER_SECOND
        );
        assert_eq!(
            parse_timestamp_string("1970-01-02 00:00:01Z").unwrap(),
            MICROS_PER_DAY + MICROS_PER_SECOND
        );
        assert_eq!(
            parse_timestamp_string("1970-01-02 00:00:01+02:00").unwrap(),
            MICROS_PER_DAY + MICROS_PER_SECOND
        );
        assert_eq!(parse_timestamp_string("1970-01-03").unwrap(), 2 * MICROS_PER_DAY);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_date(0), "1970-01-01");
        assert_eq!(format_date(10_957), "2000-01-01");
        assert_eq!(format_date(-1), "1969-12-31");
        assert_eq!(format_time(3_661_000_000), "01:01:01");
        assert_eq!(format_time(1_500_000), "00:00:01.500000");
        assert_eq!(format_timestamp(MICROS_PER_DAY + 1), "1970-01-02T00:00:00.000001");
        assert_eq!(format_timestamp(-MICROS_PER_SECOND), "1969-12-31T23:59:59");
    }

    #[test]
    fn test_text_forms_parse_back() {
        let micros = 1_234_567_890_123_456;
        assert_eq!(parse_timestamp_string(&format_timestamp(micros)).unwrap(), micros);
        assert_eq!(Date::from_ymd(2024, 2, 29).0, parse_date_string("2024-02-29").unwrap());
    }

    #[test]
    fn test_millis() {
        let ts = Timestamp::from_millis(1_500);
        assert_eq!(ts.0, 1_500_000);
        assert_eq!(ts.as_millis(), 1_500);
        assert_eq!(Timestamp(-1).as_millis(), -1);
    }

    #[test]
    fn test_out_of_range_inputs_are_errors() {
        assert!(parse_time_string("9999999999999999:00").is_err());
        assert!(parse_timestamp_string("2000000-01-01").is_err());
        assert!(parse_date_string("2147483647-12-31").is_err());
        assert_eq!(Timestamp::checked_from_millis(i64::MAX), None);
        assert_eq!(Timestamp::checked_from_millis(2), Some(Timestamp(2_000)));
        assert!(format_date(i32::MAX).ends_with("-07-11"));
        assert!(format_date(i32::MIN).starts_with('-'));
    }
}
