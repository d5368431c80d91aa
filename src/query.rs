//! Mailbox query construction.
//!
//! Builds the query strings handed to the mail service from the configured
//! subject keywords and date window.
//!
//! # Produced syntax
//!
//! - `subject:invoice` — one query per configured keyword
//! - `after:2024/03/08 before:2024/03/15` — appended date window
//! - empty string — no keywords and no window ("all mail")
//!
//! The window is resolved at call time: named ranges are measured against
//! the current wall clock, so two runs on different days produce different
//! query strings for the same configuration.

use chrono::{DateTime, Duration, Local, NaiveDate};
use tracing::warn;

use crate::config::SearchConfig;
use crate::error::{HarvestError, Result};

/// Date format used in query strings and explicit config dates.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Named date window, parsed from the `date_range` config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// From local midnight today.
    Today,
    /// From local midnight yesterday.
    Yesterday,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// Last 365 days.
    Year,
    /// Last N days, from an `"Nd"` value.
    Days(i64),
}

impl DateRange {
    /// Parse a range name. Unrecognized values warn and fall back to
    /// `Today`.
    pub fn parse(value: &str) -> DateRange {
        match value {
            "today" => DateRange::Today,
            "yesterday" => DateRange::Yesterday,
            "week" => DateRange::Week,
            "month" => DateRange::Month,
            "year" => DateRange::Year,
            other => {
                // Day counts are non-negative; "-5d" is unrecognized.
                if let Some(days) = other
                    .strip_suffix('d')
                    .and_then(|n| n.parse::<u32>().ok())
                {
                    return DateRange::Days(i64::from(days));
                }
                warn!(range = other, "Unrecognized date range, using today");
                DateRange::Today
            }
        }
    }

    /// Window start for this range, measured from `now`.
    ///
    /// `Today` and `Yesterday` anchor at local midnight; the day-count
    /// ranges subtract whole days from the current instant (not calendar
    /// aligned). A day count reaching past the calendar warns and anchors
    /// at midnight today. The window always ends at `now`.
    pub fn window_start(self, now: DateTime<Local>) -> DateTime<Local> {
        match self {
            DateRange::Today => midnight(now),
            DateRange::Yesterday => midnight(now - Duration::days(1)),
            DateRange::Week => now - Duration::days(7),
            DateRange::Month => now - Duration::days(30),
            DateRange::Year => now - Duration::days(365),
            DateRange::Days(n) => {
                now.checked_sub_signed(Duration::days(n)).unwrap_or_else(|| {
                    warn!(days = n, "Day count reaches past the calendar, using today");
                    midnight(now)
                })
            }
        }
    }
}

/// Truncate a timestamp to local midnight of the same day.
fn midnight(dt: DateTime<Local>) -> DateTime<Local> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(Local).single())
        .unwrap_or(dt)
}

/// Build the date filter for the configured window, against the current
/// wall clock.
///
/// Returns an empty string when no window is configured. A malformed
/// explicit date is a [`HarvestError::DateFormat`]; the caller decides
/// whether to proceed without a date filter.
pub fn date_query(search: &SearchConfig) -> Result<String> {
    date_query_at(search, Local::now())
}

/// [`date_query`] with the clock as a parameter.
pub fn date_query_at(search: &SearchConfig, now: DateTime<Local>) -> Result<String> {
    let range = search.date_range.trim();
    if !range.is_empty() {
        let start = DateRange::parse(range).window_start(now);
        return Ok(format!(
            "after:{} before:{}",
            start.format(DATE_FORMAT),
            now.format(DATE_FORMAT)
        ));
    }

    if !search.start_date.is_empty() && !search.end_date.is_empty() {
        let start = parse_explicit_date(&search.start_date)?;
        let end = parse_explicit_date(&search.end_date)?;
        return Ok(format!(
            "after:{} before:{}",
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        ));
    }

    Ok(String::new())
}

/// Parse an explicit config date in `%Y/%m/%d` form.
fn parse_explicit_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| HarvestError::DateFormat {
        value: value.to_string(),
        expected: DATE_FORMAT.to_string(),
    })
}

/// Expand subject keywords into one query per keyword, each carrying the
/// same date filter.
///
/// Blank keywords are dropped; with none left, a single query holding just
/// the date filter (possibly empty) is returned so the run still matches
/// all mail in the window.
pub fn build_queries(subjects: &[String], date_query: &str) -> Vec<String> {
    let keywords: Vec<&str> = subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if keywords.is_empty() {
        return vec![date_query.to_string()];
    }

    keywords
        .iter()
        .map(|kw| {
            if date_query.is_empty() {
                format!("subject:{kw}")
            } else {
                format!("subject:{kw} {date_query}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn search(range: &str, start: &str, end: &str) -> SearchConfig {
        SearchConfig {
            date_range: range.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_named_ranges() {
        let now = at(2024, 3, 15, 14, 30);

        let q = date_query_at(&search("today", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/03/15 before:2024/03/15");

        let q = date_query_at(&search("yesterday", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/03/14 before:2024/03/15");

        let q = date_query_at(&search("week", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/03/08 before:2024/03/15");

        let q = date_query_at(&search("month", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/02/14 before:2024/03/15");
    }

    #[test]
    fn test_day_count_range() {
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&search("10d", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/03/05 before:2024/03/15");
    }

    #[test]
    fn test_unrecognized_range_anchors_today() {
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&search("fortnight", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/03/15 before:2024/03/15");
    }

    #[test]
    fn test_oversized_day_count_anchors_today() {
        // Far past any representable date; must not overflow.
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&search("999999999d", "", ""), now).unwrap();
        assert_eq!(q, "after:2024/03/15 before:2024/03/15");
    }

    #[test]
    fn test_explicit_dates() {
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&search("", "2024/01/01", "2024/02/01"), now).unwrap();
        assert_eq!(q, "after:2024/01/01 before:2024/02/01");
    }

    #[test]
    fn test_malformed_explicit_date_is_error() {
        let now = at(2024, 3, 15, 14, 30);
        let err = date_query_at(&search("", "2024-01-01", "2024/02/01"), now).unwrap_err();
        assert!(matches!(err, HarvestError::DateFormat { .. }));
    }

    #[test]
    fn test_named_range_takes_precedence_over_explicit() {
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&search("week", "2024/01/01", "2024/02/01"), now).unwrap();
        assert_eq!(q, "after:2024/03/08 before:2024/03/15");
    }

    #[test]
    fn test_lone_explicit_date_yields_no_filter() {
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&search("", "2024/01/01", ""), now).unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_no_window_configured() {
        let now = at(2024, 3, 15, 14, 30);
        let q = date_query_at(&SearchConfig::default(), now).unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_build_queries_per_keyword() {
        let subjects = vec!["invoice".to_string(), "receipt".to_string()];
        let queries = build_queries(&subjects, "after:2024/03/08 before:2024/03/15");
        assert_eq!(
            queries,
            [
                "subject:invoice after:2024/03/08 before:2024/03/15",
                "subject:receipt after:2024/03/08 before:2024/03/15",
            ]
        );
    }

    #[test]
    fn test_build_queries_without_date_filter() {
        let subjects = vec!["invoice".to_string()];
        assert_eq!(build_queries(&subjects, ""), ["subject:invoice"]);
    }

    #[test]
    fn test_build_queries_blank_keywords_dropped() {
        let subjects = vec!["  ".to_string(), "invoice".to_string(), String::new()];
        let queries = build_queries(&subjects, "");
        assert_eq!(queries, ["subject:invoice"]);
    }

    #[test]
    fn test_build_queries_no_keywords() {
        let queries = build_queries(&[], "after:2024/03/08 before:2024/03/15");
        assert_eq!(queries, ["after:2024/03/08 before:2024/03/15"]);

        let queries = build_queries(&[], "");
        assert_eq!(queries, [""]);
    }

    #[test]
    fn test_date_range_parse() {
        assert_eq!(DateRange::parse("today"), DateRange::Today);
        assert_eq!(DateRange::parse("week"), DateRange::Week);
        assert_eq!(DateRange::parse("45d"), DateRange::Days(45));
        assert_eq!(DateRange::parse("soon"), DateRange::Today);
        assert_eq!(DateRange::parse("xd"), DateRange::Today);
        assert_eq!(DateRange::parse("-5d"), DateRange::Today);
    }
}
