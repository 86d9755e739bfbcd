//! Dates mentioned in chat messages.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::mcp::schema;

const EXPLICIT_DATE: &str = r"\b(\d{4}-\d{2}-\d{2})\b";

static EXPLICIT_DATE_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Finds the date a message refers to, relative to `today`.
///
/// Understands `tomorrow`, `today`, `next monday` and explicit `YYYY-MM-DD`
/// dates, checked in that order. Anything else means today.
#[must_use]
pub fn parse_date(text: &str, today: NaiveDate) -> NaiveDate {
    let lower = text.to_lowercase();

    if lower.contains("tomorrow") {
        return today + Duration::days(1);
    }
    if lower.contains("today") {
        return today;
    }
    if lower.contains("next monday") {
        let days_ahead = 7 - i64::from(today.weekday().num_days_from_monday());
        return today + Duration::days(days_ahead);
    }

    explicit_date(text).unwrap_or(today)
}

fn explicit_date(text: &str) -> Option<NaiveDate> {
    let pattern = EXPLICIT_DATE_RE
        .get_or_init(|| Regex::new(EXPLICIT_DATE).ok())
        .as_ref()?;
    pattern
        .captures_iter(text)
        .find_map(|caps| schema::parse_date(&caps[1]))
}

/// Formats a date the way the assistant says it, e.g. `November 09, 2025`.
#[must_use]
pub fn format_long(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn relative_dates() {
        let today = day(2025, 11, 6); // Thursday
        assert_eq!(parse_date("I'll be absent tomorrow", today), day(2025, 11, 7));
        assert_eq!(parse_date("absent TODAY", today), today);
        assert_eq!(parse_date("absent next Monday", today), day(2025, 11, 10));
    }

    #[test]
    fn next_monday_from_a_monday_is_a_week_away() {
        let monday = day(2025, 11, 10);
        assert_eq!(parse_date("next monday", monday), day(2025, 11, 17));
    }

    #[test]
    fn explicit_date() {
        let today = day(2025, 11, 6);
        assert_eq!(parse_date("absent on 2025-11-09 please", today), day(2025, 11, 9));
    }

    #[test]
    fn invalid_explicit_date_falls_back_to_today() {
        let today = day(2025, 11, 6);
        assert_eq!(parse_date("absent on 2025-02-30", today), today);
        assert_eq!(parse_date("I will be absent", today), today);
    }

    #[test]
    fn pattern_compiles() {
        assert!(Regex::new(EXPLICIT_DATE).is_ok());
        let today = day(2025, 11, 6);
        assert_eq!(parse_date("2025-11-08", today), day(2025, 11, 8));
        assert_eq!(parse_date("then 2025-11-10", today), day(2025, 11, 10));
    }

    #[test]
    fn long_format() {
        assert_eq!(format_long(day(2025, 11, 9)), "November 09, 2025");
    }
}
