//! Folder routing: which subdirectory a message's files land in.
//!
//! Rules are ordered `keyword:folder` pairs; the first keyword found in the
//! subject (case-insensitive substring) wins. Messages no rule claims fall
//! back to a date folder `all/<YYYY-MM-DD>` taken from the Date header, or
//! from today's date when the header is missing or unparseable.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use tracing::warn;

/// One `keyword:folder` routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Lowercased keyword; an empty keyword matches every subject, which
    /// makes a trailing `:folder` rule a catch-all.
    keyword: String,
    folder: String,
}

impl MappingRule {
    /// Parse a single `"keyword:folder"` entry. Entries without a colon
    /// are malformed and yield `None`.
    pub fn parse(entry: &str) -> Option<MappingRule> {
        let (keyword, folder) = entry.split_once(':')?;
        Some(MappingRule {
            keyword: keyword.trim().to_lowercase(),
            folder: folder.trim().to_string(),
        })
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }
}

/// Parse configured rule entries, preserving declaration order.
///
/// Malformed entries are logged and dropped rather than failing the run.
pub fn parse_rules(entries: &[String]) -> Vec<MappingRule> {
    let mut rules = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.trim().is_empty() {
            continue;
        }
        match MappingRule::parse(entry) {
            Some(rule) => rules.push(rule),
            None => {
                warn!(entry = entry.as_str(), "Skipping malformed routing rule");
            }
        }
    }
    rules
}

/// Routes messages to destination subdirectories.
#[derive(Debug)]
pub struct Router {
    rules: Vec<MappingRule>,
}

impl Router {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    /// Destination for a message, relative to the download root.
    ///
    /// Never fails; the fallback date folder uses today's local date when
    /// the header gives nothing usable.
    pub fn route(&self, subject: &str, date_header: Option<&str>) -> PathBuf {
        self.route_at(subject, date_header, Local::now().date_naive())
    }

    /// [`Router::route`] with today's date as a parameter.
    pub fn route_at(&self, subject: &str, date_header: Option<&str>, today: NaiveDate) -> PathBuf {
        let subject_lower = subject.to_lowercase();
        for rule in &self.rules {
            if subject_lower.contains(&rule.keyword) {
                return PathBuf::from(&rule.folder);
            }
        }

        let date = date_header
            .and_then(parse_header_date)
            .unwrap_or(today);
        PathBuf::from("all").join(date.format("%Y-%m-%d").to_string())
    }
}

/// Parse a Date header into the calendar date the sender wrote.
///
/// The timezone is deliberately not applied; the folder date is the date
/// as written, so `Tue, 05 Mar 2024 23:30:00 -0800` files under
/// `2024-03-05` regardless of the local clock.
pub(crate) fn parse_header_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // RFC 2822 keeps the header's own offset, so date_naive() is the date
    // as written.
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.date_naive());
    }

    // Zone-less variants, with any trailing zone token cut off.
    let no_zone = strip_zone_suffix(trimmed);
    for fmt in ["%a, %d %b %Y %H:%M:%S", "%d %b %Y %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_zone, fmt) {
            return Some(ndt.date());
        }
    }

    warn!(date = trimmed, "Could not parse Date header");
    None
}

/// Drop trailing tokens that are not part of the time (`+0800`, `GMT`,
/// `(CST)`), stopping at the `HH:MM:SS` field.
fn strip_zone_suffix(s: &str) -> &str {
    let mut out = s.trim_end();
    // The last whitespace char may be wider than one byte (NBSP shows up
    // in real headers), so slice past its actual width.
    while let Some((idx, ws)) = out.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        let last = &out[idx + ws.len_utf8()..];
        if last.contains(':') {
            break;
        }
        out = out[..idx].trim_end();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(entries: &[&str]) -> Router {
        let entries: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        Router::new(parse_rules(&entries))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let r = router(&["invoice:bills", "receipt:bills", "report:reports"]);
        let today = day(2024, 3, 15);
        assert_eq!(
            r.route_at("Monthly Receipt", None, today),
            PathBuf::from("bills")
        );
        assert_eq!(
            r.route_at("Quarterly Report attached", None, today),
            PathBuf::from("reports")
        );
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let r = router(&["INVOICE:bills"]);
        let today = day(2024, 3, 15);
        assert_eq!(
            r.route_at("your invoice #42", None, today),
            PathBuf::from("bills")
        );
    }

    #[test]
    fn test_routing_is_deterministic() {
        let r = router(&["invoice:bills"]);
        let today = day(2024, 3, 15);
        let first = r.route_at("invoice", Some("Tue, 05 Mar 2024 10:00:00 +0800"), today);
        let second = r.route_at("invoice", Some("Tue, 05 Mar 2024 10:00:00 +0800"), today);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_uses_header_date() {
        let r = router(&["invoice:bills"]);
        let today = day(2024, 3, 15);
        let dest = r.route_at(
            "Unmatched subject",
            Some("Tue, 05 Mar 2024 10:00:00 +0800"),
            today,
        );
        assert_eq!(dest, PathBuf::from("all").join("2024-03-05"));
    }

    #[test]
    fn test_fallback_ignores_timezone() {
        // Late evening with a negative offset: the written date stays.
        let r = router(&[]);
        let today = day(2024, 3, 15);
        let dest = r.route_at("x", Some("Tue, 05 Mar 2024 23:30:00 -0800"), today);
        assert_eq!(dest, PathBuf::from("all").join("2024-03-05"));
    }

    #[test]
    fn test_fallback_parses_zoneless_header() {
        let r = router(&[]);
        let today = day(2024, 3, 15);
        let dest = r.route_at("x", Some("Tue, 05 Mar 2024 10:00:00"), today);
        assert_eq!(dest, PathBuf::from("all").join("2024-03-05"));
    }

    #[test]
    fn test_fallback_parses_named_zone_suffix() {
        let r = router(&[]);
        let today = day(2024, 3, 15);
        let dest = r.route_at("x", Some("Tue, 05 Mar 2024 10:00:00 +0800 (CST)"), today);
        assert_eq!(dest, PathBuf::from("all").join("2024-03-05"));
    }

    #[test]
    fn test_fallback_survives_multibyte_whitespace() {
        // NBSP between the time field and the zone token.
        let r = router(&[]);
        let today = day(2024, 3, 15);
        let dest = r.route_at("x", Some("Tue, 05 Mar 2024 10:00:00\u{a0}+0800"), today);
        assert_eq!(dest, PathBuf::from("all").join("2024-03-05"));

        // Still unparseable after the strip: fall back to today, not panic.
        let dest = r.route_at("x", Some("Tue, 05 Zzz 2024 10:00:00\u{a0}GMT"), today);
        assert_eq!(dest, PathBuf::from("all").join("2024-03-15"));
    }

    #[test]
    fn test_fallback_on_missing_or_bad_header() {
        let r = router(&[]);
        let today = day(2024, 3, 15);
        assert_eq!(
            r.route_at("x", None, today),
            PathBuf::from("all").join("2024-03-15")
        );
        assert_eq!(
            r.route_at("x", Some("not a date"), today),
            PathBuf::from("all").join("2024-03-15")
        );
    }

    #[test]
    fn test_malformed_rules_are_skipped() {
        let entries = vec![
            "no-colon-here".to_string(),
            "invoice:bills".to_string(),
            String::new(),
        ];
        let rules = parse_rules(&entries);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].folder(), "bills");
    }

    #[test]
    fn test_empty_keyword_is_catch_all() {
        let r = router(&["invoice:bills", ":misc"]);
        let today = day(2024, 3, 15);
        assert_eq!(
            r.route_at("anything at all", None, today),
            PathBuf::from("misc")
        );
    }

    #[test]
    fn test_rule_whitespace_trimmed() {
        let r = router(&["  Invoice : bills/incoming "]);
        let today = day(2024, 3, 15);
        assert_eq!(
            r.route_at("invoice day", None, today),
            PathBuf::from("bills/incoming")
        );
    }

    #[test]
    fn test_strip_zone_suffix() {
        assert_eq!(
            strip_zone_suffix("Tue, 05 Mar 2024 10:00:00 +0800 (CST)"),
            "Tue, 05 Mar 2024 10:00:00"
        );
        assert_eq!(
            strip_zone_suffix("Tue, 05 Mar 2024 10:00:00 GMT"),
            "Tue, 05 Mar 2024 10:00:00"
        );
        assert_eq!(
            strip_zone_suffix("Tue, 05 Mar 2024 10:00:00"),
            "Tue, 05 Mar 2024 10:00:00"
        );
        assert_eq!(
            strip_zone_suffix("Tue, 05 Mar 2024 10:00:00\u{a0}GMT"),
            "Tue, 05 Mar 2024 10:00:00"
        );
    }
}
