use std::error::Error;
use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Calendar dates travel as `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<Date, DateParseError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format).map_err(|_| DateParseError::Date(raw.to_string()))
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, DateParseError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|_| DateParseError::Timestamp(raw.to_string()))
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .expect("RFC3339 formatting for a valid timestamp should never fail")
}

/// Whole days from `from` to `to`, never negative.
pub fn days_between(from: Date, to: Date) -> u32 {
    let days = (to - from).whole_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    Date(String),
    Timestamp(String),
}

impl fmt::Display for DateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateParseError::Date(raw) => {
                write!(f, "invalid date '{}': expected YYYY-MM-DD", raw)
            }
            DateParseError::Timestamp(raw) => {
                write!(f, "invalid timestamp '{}': expected RFC3339", raw)
            }
        }
    }
}

impl Error for DateParseError {}
