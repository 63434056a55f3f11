// src/parser/timestamp.rs
// Ordered timestamp-format chain (spec §4.2 step 4). One function per format
// family, with `try_parse` as the ordered entry point.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago$")
        .expect("valid regex")
});

/// Try each format in spec §4.2's ordered chain; the first that parses wins.
/// Returns `None` (not an error) when nothing matches — the caller always
/// has the observation time as a fallback (spec: "Unparseable times yield
/// `ts_source = null`").
pub fn try_parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_iso8601(raw)
        .or_else(|| parse_yyyy_mm_dd_hh_mm(raw))
        .or_else(|| parse_month_day(raw))
        .or_else(|| parse_clock_time(raw))
        .or_else(|| parse_unix_seconds(raw))
        .or_else(|| parse_relative(raw))
        .or_else(|| parse_relative_day(raw))
}

fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_yyyy_mm_dd_hh_mm(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `MMM dd[, yyyy]` — year defaults to the current UTC year when omitted.
fn parse_month_day(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%b %d, %Y") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    let current_year = Utc::now().year();
    let with_year = format!("{raw} {current_year}");
    NaiveDate::parse_from_str(&with_year, "%b %d %Y")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `h:mm[:ss] a` — a bare clock time with no date is anchored to today
/// (UTC), since chat UIs typically only show a time for "today" messages.
fn parse_clock_time(raw: &str) -> Option<DateTime<Utc>> {
    let today = Utc::now().date_naive();
    for fmt in ["%l:%M %p", "%l:%M:%S %p", "%I:%M %p", "%I:%M:%S %p"] {
        if let Ok(time) = chrono::NaiveTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&today.and_time(time)));
        }
    }
    None
}

fn parse_unix_seconds(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<i64>().ok().and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// `N {second|minute|hour|day|week|month|year}s ago`.
fn parse_relative(raw: &str) -> Option<DateTime<Utc>> {
    let captures = RELATIVE_RE.captures(raw)?;
    let amount: i64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().to_lowercase();
    let duration = match unit.as_str() {
        "second" => ChronoDuration::seconds(amount),
        "minute" => ChronoDuration::minutes(amount),
        "hour" => ChronoDuration::hours(amount),
        "day" => ChronoDuration::days(amount),
        "week" => ChronoDuration::weeks(amount),
        "month" => ChronoDuration::days(amount * 30),
        "year" => ChronoDuration::days(amount * 365),
        _ => return None,
    };
    Some(Utc::now() - duration)
}

/// `today` / `yesterday`, anchored to UTC midnight — the day-granularity
/// relative words a query's `since:`/`until:` hints commonly use.
fn parse_relative_day(raw: &str) -> Option<DateTime<Utc>> {
    let today = Utc::now().date_naive();
    let date = match raw.to_lowercase().as_str() {
        "today" => today,
        "yesterday" => today - ChronoDuration::days(1),
        _ => return None,
    };
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso8601() {
        let parsed = try_parse("2024-06-24T14:30:00Z").expect("parses");
        assert_eq!(parsed.to_rfc3339(), "2024-06-24T14:30:00+00:00");
    }

    #[test]
    fn parses_yyyy_mm_dd_hh_mm() {
        assert!(try_parse("2024-06-24 14:30").is_some());
    }

    #[test]
    fn parses_unix_seconds() {
        let parsed = try_parse("1719239400").expect("parses");
        assert_eq!(parsed.timestamp(), 1719239400);
    }

    #[test]
    fn parses_relative_minutes_ago() {
        assert!(try_parse("5 minutes ago").is_some());
    }

    #[test]
    fn unparseable_text_returns_none() {
        assert!(try_parse("not a timestamp").is_none());
    }

    #[test]
    fn parses_yesterday_and_today() {
        let yesterday = try_parse("yesterday").expect("parses");
        let today = try_parse("Today").expect("parses, case-insensitive");
        assert!(yesterday < today);
    }
}
