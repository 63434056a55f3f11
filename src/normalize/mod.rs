// src/normalize/mod.rs
// Message Normalizer & Content Hash (C3, spec §4.3). Pure functions only —
// no I/O, no shared state.

use crate::parser::{MessageKind, RawMessage};
use chrono::{DateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:@([A-Za-z0-9_.\-]+)|<@([A-Za-z0-9_]+)>)").expect("valid regex"));

/// A message after normalization, ready for dedup/storage (C6).
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub sender: String,
    pub ts_source: Option<DateTime<Utc>>,
    pub content: String,
    pub kind: MessageKind,
    pub thread_parent_text: Option<String>,
    pub mentions: Vec<String>,
    pub reactions: Vec<(String, u32)>,
    pub attachment_names: Vec<String>,
    pub content_hash: [u8; 32],
    pub dedup_ts_bucket: String,
}

/// Maximum content length before truncation (spec §8 boundary behavior:
/// "Message exceeding max length -> truncated to max with ellipsis marker;
/// hash computed over truncated form").
pub const MAX_CONTENT_CHARS: usize = 40_000;

/// Short automated messages below this length are dropped when `kind` is
/// `System` (spec §4.3: "Short system messages (< 10 chars, kind = system)
/// ... are dropped here").
const SHORT_SYSTEM_THRESHOLD: usize = 10;

/// Normalize one raw message. Returns `None` when the message should be
/// dropped outright (short system/automated join-leave messages).
pub fn normalize(raw: &RawMessage) -> Option<NormalizedMessage> {
    let content = normalize_whitespace(&raw.content);
    let content = truncate_with_ellipsis(&content, MAX_CONTENT_CHARS);

    if raw.kind == MessageKind::System {
        if content.chars().count() < SHORT_SYSTEM_THRESHOLD || is_join_leave_pattern(&content) {
            return None;
        }
    }

    let sender = raw.sender.trim().to_string();
    let dedup_ts_bucket = ts_bucket(raw.ts_source);
    let content_hash = compute_content_hash(&sender, &dedup_ts_bucket, &content);
    let mentions = extract_mentions(&content);

    Some(NormalizedMessage {
        sender,
        ts_source: raw.ts_source,
        content,
        kind: raw.kind,
        thread_parent_text: raw.thread_parent_text.clone(),
        mentions,
        reactions: raw.reactions.clone(),
        attachment_names: raw.attachment_names.clone(),
        content_hash,
        dedup_ts_bucket,
    })
}

/// Collapse whitespace runs, strip control characters except newline, and
/// trim (spec §4.3). Idempotent: `normalize(normalize(x)) == normalize(x)`
/// (spec §8 round-trip law).
pub fn normalize_whitespace(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut last_was_space = false;
    for c in input.chars() {
        if c == '\n' {
            output.push('\n');
            last_was_space = false;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if c.is_whitespace() {
            if !last_was_space {
                output.push(' ');
            }
            last_was_space = true;
        } else {
            output.push(c);
            last_was_space = false;
        }
    }
    output.trim().to_string()
}

fn truncate_with_ellipsis(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

/// `ts_bucket` is `ts_source` rounded to the minute if present, else
/// `"unknown"` (spec §4.3).
pub fn ts_bucket(ts_source: Option<DateTime<Utc>>) -> String {
    match ts_source {
        Some(ts) => ts
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(ts)
            .to_rfc3339(),
        None => "unknown".to_string(),
    }
}

/// `content_hash = SHA-256(sender ‖ 0x1F ‖ ts_bucket ‖ 0x1F ‖
/// normalized_content)`, folded to lowercase for the hash input only (spec
/// §4.3: "lowercase-fold only for hash inputs").
pub fn compute_content_hash(sender: &str, ts_bucket: &str, normalized_content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sender.to_lowercase().as_bytes());
    hasher.update([0x1F]);
    hasher.update(ts_bucket.as_bytes());
    hasher.update([0x1F]);
    hasher.update(normalized_content.to_lowercase().as_bytes());
    hasher.finalize().into()
}

pub fn content_hash_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Extract `@name` and `<@user_id>` mention tokens (spec §4.3: "leading `@`,
/// single-token or explicit user id").
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    for captures in MENTION_RE.captures_iter(content) {
        if let Some(name) = captures.get(1) {
            mentions.push(name.as_str().to_string());
        } else if let Some(id) = captures.get(2) {
            mentions.push(id.as_str().to_string());
        }
    }
    mentions.sort();
    mentions.dedup();
    mentions
}

/// Heuristic filter for automated join/leave system messages (spec §4.3).
fn is_join_leave_pattern(content: &str) -> bool {
    let lower = content.to_lowercase();
    ["has joined", "has left", "joined the channel", "left the channel"]
        .iter()
        .any(|pattern| lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RawMessage;

    fn raw(content: &str, kind: MessageKind) -> RawMessage {
        RawMessage {
            sender: "alice".to_string(),
            timestamp_text: None,
            ts_source: None,
            content: content.to_string(),
            kind,
            thread_parent_text: None,
            reactions: vec![],
            mentions_raw: vec![],
            attachment_names: vec![],
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = "  hello   \tworld  \n\n  ";
        let once = normalize_whitespace(input);
        let twice = normalize_whitespace(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn hash_equal_iff_inputs_equal() {
        let a = compute_content_hash("alice", "unknown", "hello world");
        let b = compute_content_hash("alice", "unknown", "hello world");
        let c = compute_content_hash("alice", "unknown", "hello there");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn drops_short_system_messages() {
        let msg = raw("bye", MessageKind::System);
        assert!(normalize(&msg).is_none());
    }

    #[test]
    fn drops_join_leave_system_messages() {
        let msg = raw("alice has joined the channel", MessageKind::System);
        assert!(normalize(&msg).is_none());
    }

    #[test]
    fn keeps_long_regular_messages() {
        let msg = raw("this is a perfectly normal message", MessageKind::Regular);
        assert!(normalize(&msg).is_some());
    }

    #[test]
    fn extracts_mentions() {
        let mentions = extract_mentions("hey @bob and <@U012ABC> check this out");
        assert_eq!(mentions, vec!["U012ABC".to_string(), "bob".to_string()]);
    }

    #[test]
    fn truncates_overlong_content() {
        let long = "a".repeat(MAX_CONTENT_CHARS + 10);
        let msg = raw(&long, MessageKind::Regular);
        let normalized = normalize(&msg).expect("kept");
        assert_eq!(normalized.content.chars().count(), MAX_CONTENT_CHARS + 1);
        assert!(normalized.content.ends_with('…'));
    }
}
