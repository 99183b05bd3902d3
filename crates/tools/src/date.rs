//! Date parsing shared by the task and analytics tools.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Message returned when neither accepted format matches.
pub const INVALID_DATE: &str = "Invalid date format. Please use YYYY-MM-DD or YYYY-MM-DD HH:MM";

/// Format used when echoing dates back to the model.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A parsed date and whether the input carried a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub at: NaiveDateTime,
    pub has_time: bool,
}

impl ParsedDate {
    /// For a date-only input, the last second of that day; otherwise `at`.
    pub fn end_of_day(self) -> NaiveDateTime {
        if self.has_time {
            self.at
        } else {
            self.at.date().and_time(NaiveTime::MIN) + chrono::Duration::seconds(86_399)
        }
    }
}

/// Parse `YYYY-MM-DD`, then `YYYY-MM-DD HH:MM`. Date-only inputs land at
/// midnight.
pub fn parse_date(input: &str) -> Option<ParsedDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(ParsedDate {
            at: date.and_time(NaiveTime::MIN),
            has_time: false,
        });
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .ok()
        .map(|at| ParsedDate { at, has_time: true })
}
