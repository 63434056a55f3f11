// src/search/mod.rs
// Query Engine (C7, spec §4.7): parses structured hints, runs lexical and
// semantic legs, fuses them, and joins back to message metadata.

pub mod fusion;
pub mod lexical;
pub mod query_parse;
pub mod vector;

use crate::db::store::Store;
use crate::embeddings::EmbeddingGateway;
use crate::error::Result;
use chrono::{DateTime, Utc};
use query_parse::ParsedQuery;
use rusqlite::{params, Connection};
use serde_json::{json, Value};

/// Longest run of characters either side of the first matched term kept in
/// a snippet (spec §4.7/§8: responses "contain ... snippet").
const SNIPPET_RADIUS: usize = 60;
/// Cap on a snippet built from a message with no matched term to anchor on.
const SNIPPET_FALLBACK_MAX: usize = 160;

/// One message as returned on the query surface (spec §4.7: `ranked[{
/// message_id, score, matched_terms, snippet, metadata}]`, plus the
/// `channel`/`sender`/`ts_source` fields spec §8 scenario 5 checks for).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub message_id: i64,
    pub workspace: String,
    pub channel: String,
    pub sender: String,
    pub content: String,
    pub ts_source: Option<DateTime<Utc>>,
    pub score: f32,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub matched_terms: Vec<String>,
    pub snippet: String,
    pub metadata: Value,
}

/// Run a hybrid lexical+vector search over `raw_query`, parsing structured
/// hints first (spec §4.7 step 1), then fusing both legs with the
/// configured weights.
pub async fn hybrid_search(
    store: &Store,
    gateway: &dyn EmbeddingGateway,
    raw_query: &str,
    limit: usize,
    w_semantic: f32,
    w_lexical: f32,
) -> Result<Vec<SearchHit>> {
    let parsed = query_parse::parse(raw_query);
    let candidate_limit = (limit * 4).max(limit) as i64;

    let query_vector = if parsed.text.trim().is_empty() {
        None
    } else {
        Some(gateway.embed_one(&parsed.text).await?)
    };

    let parsed_for_query = parsed.clone();
    let limit_i = limit as i64;
    store
        .pool()
        .run(move |conn| {
            run_hybrid_query(
                conn,
                &parsed_for_query,
                query_vector.as_deref(),
                candidate_limit,
                limit_i,
                w_semantic,
                w_lexical,
            )
        })
        .await
}

fn resolve_channel_id(conn: &Connection, channel_hint: Option<&str>) -> rusqlite::Result<Option<i64>> {
    match channel_hint {
        None => Ok(None),
        Some(name) => conn
            .query_row("SELECT id FROM channels WHERE name = ?1", params![name], |r| r.get(0))
            .ok(),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_hybrid_query(
    conn: &Connection,
    parsed: &ParsedQuery,
    query_vector: Option<&[f32]>,
    candidate_limit: i64,
    limit: i64,
    w_semantic: f32,
    w_lexical: f32,
) -> rusqlite::Result<Vec<SearchHit>> {
    let channel_id = resolve_channel_id(conn, parsed.in_channel.as_deref())?;

    let lexical_hits = if parsed.text.trim().is_empty() {
        Vec::new()
    } else {
        lexical::search(conn, &parsed.text, channel_id, candidate_limit)?
    };

    let semantic_hits = match query_vector {
        Some(vector) => vector::search(conn, vector, channel_id, candidate_limit)?
            .into_iter()
            .map(|(id, distance)| (id, vector::distance_to_score(distance)))
            .collect(),
        None => Vec::new(),
    };

    let fused = fusion::fuse(&semantic_hits, &lexical_hits, w_semantic, w_lexical);

    let mut hits = Vec::new();
    for score in fused {
        if let Some(hit) = load_hit(conn, &score, parsed)? {
            hits.push(hit);
            if hits.len() as i64 >= limit {
                break;
            }
        }
    }
    Ok(hits)
}

#[allow(clippy::type_complexity)]
fn load_hit(
    conn: &Connection,
    score: &fusion::FusedScore,
    parsed: &ParsedQuery,
) -> rusqlite::Result<Option<SearchHit>> {
    let row = conn.query_row(
        "SELECT w.name, c.name, m.sender, m.content, m.ts_source, m.kind, m.version,
                m.thread_parent_text
         FROM messages m
         JOIN channels c ON c.id = m.channel_id
         JOIN workspaces w ON w.id = c.workspace_id
         WHERE m.id = ?1",
        params![score.message_id],
        |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, Option<String>>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, i64>(6)?,
                r.get::<_, Option<String>>(7)?,
            ))
        },
    );

    let (workspace, channel, sender, content, ts_raw, kind, version, thread_parent_text) = match row {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e),
    };

    if let Some(from) = &parsed.from {
        if !sender.eq_ignore_ascii_case(from) {
            return Ok(None);
        }
    }

    let ts_source = ts_raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc));

    if let Some(since) = parsed.since {
        if ts_source.map(|t| t < since).unwrap_or(false) {
            return Ok(None);
        }
    }
    if let Some(until) = parsed.until {
        if ts_source.map(|t| t > until).unwrap_or(false) {
            return Ok(None);
        }
    }

    let matched_terms = matched_terms(&parsed.text, &content);
    let snippet = build_snippet(&content, &matched_terms);
    let metadata = json!({
        "kind": kind,
        "version": version,
        "thread_parent_text": thread_parent_text,
    });

    Ok(Some(SearchHit {
        message_id: score.message_id,
        workspace,
        channel,
        sender,
        content,
        ts_source,
        score: score.combined,
        semantic_score: score.semantic_score,
        lexical_score: score.lexical_score,
        matched_terms,
        snippet,
        metadata,
    }))
}

/// Query tokens that literally occur in the message content, case-insensitive
/// (spec §4.7: `ranked[{..., matched_terms, ...}]`).
fn matched_terms(query_text: &str, content: &str) -> Vec<String> {
    let lower_content = content.to_lowercase();
    let mut terms = Vec::new();
    for token in query_text.split_whitespace() {
        let lower = token.to_lowercase();
        if !lower.is_empty() && lower_content.contains(&lower) && !terms.contains(&lower) {
            terms.push(lower);
        }
    }
    terms
}

/// A short excerpt centered on the first matched term, or a truncated prefix
/// of the content when nothing matched (the semantic-only leg).
fn build_snippet(content: &str, terms: &[String]) -> String {
    let chars: Vec<char> = content.chars().collect();
    let lower_chars: Vec<char> = content.to_lowercase().chars().collect();

    let anchor = terms.iter().find_map(|term| {
        let term_chars: Vec<char> = term.chars().collect();
        if term_chars.is_empty() || term_chars.len() > lower_chars.len() {
            return None;
        }
        lower_chars.windows(term_chars.len()).position(|w| w == term_chars.as_slice())
    });

    match anchor {
        Some(pos) => {
            let start = pos.saturating_sub(SNIPPET_RADIUS);
            let end = (pos + SNIPPET_RADIUS).min(chars.len());
            let mut snippet = String::new();
            if start > 0 {
                snippet.push('\u{2026}');
            }
            snippet.extend(&chars[start..end]);
            if end < chars.len() {
                snippet.push('\u{2026}');
            }
            snippet
        }
        None if chars.len() > SNIPPET_FALLBACK_MAX => {
            let mut snippet: String = chars[..SNIPPET_FALLBACK_MAX].iter().collect();
            snippet.push('\u{2026}');
            snippet
        }
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_for_tests;
    use crate::embeddings::FixtureGateway;
    use crate::normalize::{compute_content_hash, NormalizedMessage};
    use crate::parser::{ChannelType, MessageKind};

    #[tokio::test]
    async fn finds_seeded_message_by_keyword() {
        let store = open_in_memory_for_tests(8).await.expect("store");
        let workspace_id = store.upsert_workspace("acme").await.expect("workspace");
        let channel_id = store
            .upsert_channel(workspace_id, "general", ChannelType::Public)
            .await
            .expect("channel");
        let message = NormalizedMessage {
            sender: "alice".to_string(),
            ts_source: Some(Utc::now()),
            content: "the deployment broke production".to_string(),
            kind: MessageKind::Regular,
            thread_parent_text: None,
            mentions: vec![],
            reactions: vec![],
            attachment_names: vec![],
            content_hash: compute_content_hash("alice", "unknown", "the deployment broke production"),
            dedup_ts_bucket: "unknown".to_string(),
        };
        store.ingest_message(channel_id, message, Utc::now()).await.expect("ingest");

        let gateway = FixtureGateway::new(8);
        let hits = hybrid_search(&store, &gateway, "deployment", 10, 0.6, 0.4)
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sender, "alice");
        assert_eq!(hits[0].matched_terms, vec!["deployment".to_string()]);
        assert!(hits[0].snippet.contains("deployment"));
        assert_eq!(hits[0].metadata["version"], 1);
    }

    #[test]
    fn matched_terms_are_case_insensitive_and_deduped() {
        let terms = matched_terms("Deployment deployment broke", "the deployment broke production");
        assert_eq!(terms, vec!["deployment".to_string(), "broke".to_string()]);
    }

    #[test]
    fn snippet_anchors_on_first_match_with_ellipses() {
        let long_content = format!("{}{}{}", "x".repeat(200), "needle", "y".repeat(200));
        let snippet = build_snippet(&long_content, &["needle".to_string()]);
        assert!(snippet.starts_with('\u{2026}'));
        assert!(snippet.ends_with('\u{2026}'));
        assert!(snippet.contains("needle"));
    }

    #[test]
    fn snippet_falls_back_to_truncated_prefix_without_a_match() {
        let long_content = "z".repeat(500);
        let snippet = build_snippet(&long_content, &[]);
        assert!(snippet.ends_with('\u{2026}'));
        assert!(snippet.len() < long_content.len());
    }
}
