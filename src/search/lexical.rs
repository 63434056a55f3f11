// src/search/lexical.rs
// FTS5-backed lexical search (spec §4.7), grounded in the teacher's
// `keyword_search`: build a defensive FTS5 MATCH query, fall back to LIKE
// when FTS5 can't be used (empty/garbage query, or the match itself errors).

use rusqlite::{params, Connection};

/// `(message_id, bm25_score)` — bm25 scores from SQLite's FTS5 are negative,
/// more negative meaning a better match; callers normalize before fusing.
pub type LexicalHit = (i64, f32);

pub fn search(conn: &Connection, raw_query: &str, channel_id: Option<i64>, limit: i64) -> rusqlite::Result<Vec<LexicalHit>> {
    let fts_query = build_fts_query(raw_query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    let fts_result = fts5_search(conn, &fts_query, channel_id, limit);
    match fts_result {
        Ok(hits) if !hits.is_empty() => Ok(hits),
        _ => like_search(conn, raw_query, channel_id, limit),
    }
}

fn fts5_search(
    conn: &Connection,
    fts_query: &str,
    channel_id: Option<i64>,
    limit: i64,
) -> rusqlite::Result<Vec<LexicalHit>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, bm25(messages_fts) as score
         FROM messages_fts
         JOIN messages m ON m.id = messages_fts.rowid
         WHERE messages_fts MATCH ?1 AND (?2 IS NULL OR m.channel_id = ?2)
         ORDER BY score LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![fts_query, channel_id, limit], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f32>(1)?))
    })?;
    rows.collect()
}

fn like_search(
    conn: &Connection,
    raw_query: &str,
    channel_id: Option<i64>,
    limit: i64,
) -> rusqlite::Result<Vec<LexicalHit>> {
    let pattern = format!("%{}%", raw_query.replace('%', "").replace('_', ""));
    let mut stmt = conn.prepare(
        "SELECT id, 0.0 FROM messages
         WHERE content LIKE ?1 AND (?2 IS NULL OR channel_id = ?2)
         ORDER BY ts_source DESC LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![pattern, channel_id, limit], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f32>(1)?))
    })?;
    rows.collect()
}

/// Build an FTS5 MATCH expression: single terms get prefix matching, and
/// multi-term queries OR each cleaned term together with a prefix match on
/// the last one (so "depl" still finds "deployment" mid-typing).
fn build_fts_query(query: &str) -> String {
    let terms: Vec<&str> = query.split_whitespace().filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return String::new();
    }
    if terms.len() == 1 {
        let cleaned = escape_fts_term(terms[0]);
        return if cleaned.is_empty() { String::new() } else { format!("{cleaned}*") };
    }
    let mut parts = Vec::new();
    for (i, term) in terms.iter().enumerate() {
        let cleaned = escape_fts_term(term);
        if cleaned.is_empty() {
            continue;
        }
        if i == terms.len() - 1 {
            parts.push(format!("{cleaned}*"));
        } else {
            parts.push(cleaned);
        }
    }
    parts.join(" OR ")
}

fn escape_fts_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::ensure_sqlite_vec_registered;
    use crate::db::schema::migrate;

    fn seeded_conn() -> Connection {
        ensure_sqlite_vec_registered();
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn, 4).expect("migrate");
        conn.execute(
            "INSERT INTO workspaces (id, name) VALUES (1, 'acme')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO channels (id, workspace_id, name, channel_type) VALUES (1, 1, 'general', 'public')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO messages (id, channel_id, sender, content, kind, dedup_ts_bucket, content_hash, first_observed_at, last_observed_at)
             VALUES (1, 1, 'alice', 'the deployment broke production', 'regular', 'unknown', 'hash1', '2024-01-01', '2024-01-01')",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn finds_prefix_match() {
        let conn = seeded_conn();
        let hits = search(&conn, "deploy", None, 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let conn = seeded_conn();
        let hits = search(&conn, "   ", None, 10).expect("search");
        assert!(hits.is_empty());
    }
}
