// src/search/query_parse.rs
// Structured query hints (spec §4.7): `from:user`, `in:channel`,
// `since:`/`until:` dates, and `last N units` are pulled out of the raw
// query text; everything left over is the free-text search string.

use crate::parser::timestamp;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static LAST_N_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blast\s+(\d+)\s+(second|minute|hour|day|week|month|year)s?\b")
        .expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub text: String,
    pub from: Option<String>,
    pub in_channel: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Parse one raw query string into structured hints plus leftover free text.
/// Unknown tokens (e.g. a typo'd `form:bob`) are left in the free text
/// rather than rejected — spec §4.7 treats hint parsing as best-effort.
pub fn parse(raw: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut remaining_tokens = Vec::new();

    let without_last = if let Some(captures) = LAST_N_RE.captures(raw) {
        let amount: i64 = captures[1].parse().unwrap_or(0);
        let unit = captures[2].to_lowercase();
        let duration = match unit.as_str() {
            "second" => ChronoDuration::seconds(amount),
            "minute" => ChronoDuration::minutes(amount),
            "hour" => ChronoDuration::hours(amount),
            "day" => ChronoDuration::days(amount),
            "week" => ChronoDuration::weeks(amount),
            "month" => ChronoDuration::days(amount * 30),
            "year" => ChronoDuration::days(amount * 365),
            _ => ChronoDuration::zero(),
        };
        parsed.since = Some(Utc::now() - duration);
        LAST_N_RE.replace(raw, "").to_string()
    } else {
        raw.to_string()
    };

    for token in without_last.split_whitespace() {
        if let Some(user) = token.strip_prefix("from:") {
            parsed.from = Some(user.trim_matches('"').to_string());
        } else if let Some(channel) = token.strip_prefix("in:") {
            parsed.in_channel = Some(channel.trim_start_matches('#').trim_matches('"').to_string());
        } else if let Some(raw_since) = token.strip_prefix("since:") {
            // An unparseable date is dropped, not leaked into the free-text
            // search string — `since:yesterday` either resolves to a
            // timestamp or disappears, it never becomes a literal search
            // term.
            if let Some(ts) = timestamp::try_parse(raw_since) {
                parsed.since = Some(ts);
            }
        } else if let Some(raw_until) = token.strip_prefix("until:") {
            if let Some(ts) = timestamp::try_parse(raw_until) {
                parsed.until = Some(ts);
            }
        } else {
            remaining_tokens.push(token);
        }
    }

    parsed.text = remaining_tokens.join(" ").trim().to_string();
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_and_in_hints() {
        let parsed = parse("from:alice in:general deployment issue");
        assert_eq!(parsed.from.as_deref(), Some("alice"));
        assert_eq!(parsed.in_channel.as_deref(), Some("general"));
        assert_eq!(parsed.text, "deployment issue");
    }

    #[test]
    fn extracts_last_n_units() {
        let parsed = parse("last 3 days outage");
        assert!(parsed.since.is_some());
        assert_eq!(parsed.text, "outage");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let parsed = parse("just a normal query");
        assert_eq!(parsed.text, "just a normal query");
        assert!(parsed.from.is_none());
    }

    #[test]
    fn since_yesterday_resolves_and_does_not_leak_into_free_text() {
        let parsed = parse("from:alice since:yesterday hello");
        assert_eq!(parsed.from.as_deref(), Some("alice"));
        assert!(parsed.since.is_some());
        assert_eq!(parsed.text, "hello");
    }

    #[test]
    fn unparseable_since_is_dropped_not_leaked() {
        let parsed = parse("since:not-a-date hello");
        assert!(parsed.since.is_none());
        assert_eq!(parsed.text, "hello");
    }
}
