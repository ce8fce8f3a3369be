//! Due-date parsing and formatting in a caller-chosen time zone.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueDateParseError {
    /// Input matches neither `YYYY-MM-DD` nor `YYYY-MM-DD HH:MM`.
    Format(String),
    /// The local time does not exist in the zone (DST gap).
    NonexistentLocalTime(String),
}

impl Display for DueDateParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(input) => write!(
                f,
                "invalid due date `{input}`; expected YYYY-MM-DD or YYYY-MM-DD HH:MM"
            ),
            Self::NonexistentLocalTime(input) => {
                write!(f, "due date `{input}` does not exist in the local time zone")
            }
        }
    }
}

impl Error for DueDateParseError {}

/// Parses `YYYY-MM-DD` (start of day) or `YYYY-MM-DD HH:MM` in `tz` and
/// returns Unix epoch milliseconds.
///
/// Ambiguous local times (DST fall-back) take the earlier instant.
pub fn parse_due_date<Tz: TimeZone>(input: &str, tz: &Tz) -> Result<i64, DueDateParseError> {
    let trimmed = input.trim();
    let local = NaiveDateTime::parse_from_str(trimmed, DATE_TIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(|date| date.and_time(NaiveTime::default()))
        })
        .map_err(|_| DueDateParseError::Format(trimmed.to_string()))?;

    match tz.from_local_datetime(&local) {
        LocalResult::Single(due) => Ok(due.timestamp_millis()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.timestamp_millis()),
        LocalResult::None => Err(DueDateParseError::NonexistentLocalTime(trimmed.to_string())),
    }
}

/// Formats epoch milliseconds as `YYYY-MM-DD HH:MM` in `tz`.
pub fn format_due_date<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp_millis(millis) {
        Some(utc) => utc.with_timezone(tz).format(DATE_TIME_FORMAT).to_string(),
        None => format!("@{millis}ms"),
    }
}
