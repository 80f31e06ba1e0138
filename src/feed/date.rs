//! Publication date normalization.
//!
//! Feeds in the wild disagree on date syntax. [`parse_date`] tries a fixed,
//! ordered list of layouts and returns the first that matches.
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    /// None of the known layouts matched
    #[error("Unable to parse date: {0:?}")]
    Unparseable(String),
}

/// Recognized layouts, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateLayout {
    /// RFC 1123 / RFC 822 family: `Mon, 02 Jan 2006 15:04:05 -0700`,
    /// `02 Jan 06 15:04 MST` and their variants
    Rfc2822,
    /// `2006-01-02T15:04:05-07:00`
    Iso8601,
    /// `2006-01-02 15:04:05`, read as UTC
    NaiveUtc,
}

const LAYOUTS: [DateLayout; 3] = [DateLayout::Rfc2822, DateLayout::Iso8601, DateLayout::NaiveUtc];

impl DateLayout {
    fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        let parsed = match self {
            // Unknown zone names are read as -0000
            DateLayout::Rfc2822 => DateTime::parse_from_rfc2822(strip_weekday(s).unwrap_or(s)),
            DateLayout::Iso8601 => DateTime::parse_from_rfc3339(s),
            DateLayout::NaiveUtc => {
                return NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }
        };
        parsed.ok().map(|dt| dt.with_timezone(&Utc))
    }
}

/// Parse a feed's textual publication date into a UTC timestamp.
///
/// Callers are expected to recover from [`DateError::Unparseable`] by
/// substituting the current time.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DateError> {
    let trimmed = raw.trim();
    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(trimmed))
        .ok_or_else(|| DateError::Unparseable(raw.to_string()))
}

/// Remove a leading `Mon, ` weekday. The weekday itself is not checked
/// against the date.
fn strip_weekday(s: &str) -> Option<&str> {
    let (weekday, rest) = s.split_once(',')?;
    if weekday.len() < 3 || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}
