//! Julian day conversions and date/time column decoding.
//!
//! The engine has no date type. Its date functions produce ISO-8601 text,
//! Julian day numbers (`REAL`) or Unix seconds (`INTEGER`);
//! [`datetime_from_value`] accepts all three.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use super::error::{DbError, DbResult};
use super::value::Value;

/// Julian day number of 1970-01-01T00:00:00Z.
pub const JULIAN_DAY_UNIX_EPOCH: f64 = 2_440_587.5;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Converts a Julian day number to a UTC timestamp, to the millisecond.
///
/// Returns `None` when the result is outside chrono's range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn julian_day_to_utc(jd: f64) -> Option<DateTime<Utc>> {
    let millis = ((jd - JULIAN_DAY_UNIX_EPOCH) * MILLIS_PER_DAY).round();
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Like [`julian_day_to_utc`], in the local time zone.
#[must_use]
pub fn julian_day_to_local(jd: f64) -> Option<DateTime<Local>> {
    julian_day_to_utc(jd).map(|dt| dt.with_timezone(&Local))
}

/// Julian day number of `dt`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn julian_day<Tz: TimeZone>(dt: &DateTime<Tz>) -> f64 {
    dt.timestamp_millis() as f64 / MILLIS_PER_DAY + JULIAN_DAY_UNIX_EPOCH
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    // A bare time is anchored on 2000-01-01, as the engine's date
    // functions do.
    let time = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())?;
    NaiveDate::from_ymd_opt(2000, 1, 1).map(|d| d.and_time(time).and_utc())
}

/// Decodes a date, time or timestamp stored in any of the engine's formats.
///
/// * `Text`: `YYYY-MM-DD`, `HH:MM[:SS[.fff]]`,
///   `YYYY-MM-DD[ T]HH:MM[:SS[.fff]]`, or RFC 3339 with an offset.
/// * `Real`: Julian day number.
/// * `Integer`: Unix seconds.
///
/// # Errors
///
/// [`DbError::InvalidType`] for `Null`, `Blob`, unparseable text and
/// out-of-range numbers.
pub fn datetime_from_value(value: &Value) -> DbResult<DateTime<Utc>> {
    let parsed = match value {
        Value::Text(text) => parse_text(text),
        Value::Real(jd) => julian_day_to_utc(*jd),
        Value::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        Value::Null | Value::Blob(_) => None,
    };
    parsed.ok_or(DbError::InvalidType {
        expected: "datetime",
        found: value.type_name(),
    })
}
