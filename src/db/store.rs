// src/db/store.rs
// Durable Store (C4, spec §4.4): workspace/channel/message CRUD, the dedup
// upsert, and the read paths the query engine and MCP tools need. Each
// function here is a plain, synchronous `rusqlite` operation; `Store` wraps
// them behind the async pool from `db::pool`.

use crate::db::pool::DatabasePool;
use crate::error::{Result, SlunkError};
use crate::normalize::{content_hash_hex, NormalizedMessage};
use crate::parser::{ChannelType, MessageKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Outcome of ingesting one normalized message (spec §4.4 / §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    New,
    Duplicate,
    Updated,
    ReactionsUpdated,
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: i64,
    pub workspace: String,
    pub name: String,
    pub channel_type: String,
    pub message_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub workspace_count: i64,
    pub channel_count: i64,
    pub message_count: i64,
    pub pending_embeddings: i64,
}

#[derive(Debug, Clone)]
pub struct PendingEmbedding {
    pub message_id: i64,
    pub content: String,
    pub embed_attempts: i64,
}

fn kind_to_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Regular => "regular",
        MessageKind::ThreadReply => "thread_reply",
        MessageKind::System => "system",
        MessageKind::Bot => "bot",
    }
}

/// `Store` is the async-facing handle the rest of Slunk holds; all actual
/// SQL lives in the free functions below so it can be unit-tested against a
/// plain in-process connection.
#[derive(Clone)]
pub struct Store {
    pool: DatabasePool,
}

impl Store {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn upsert_workspace(&self, name: &str) -> Result<i64> {
        let name = name.to_string();
        self.pool.run_retryable(move |conn| upsert_workspace(conn, &name)).await
    }

    pub async fn upsert_channel(
        &self,
        workspace_id: i64,
        name: &str,
        channel_type: ChannelType,
    ) -> Result<i64> {
        let name = name.to_string();
        let channel_type = channel_type.as_str().to_string();
        self.pool
            .run_retryable(move |conn| upsert_channel(conn, workspace_id, &name, &channel_type))
            .await
    }

    pub async fn ingest_message(
        &self,
        channel_id: i64,
        message: NormalizedMessage,
        observed_at: DateTime<Utc>,
    ) -> Result<(i64, IngestOutcome)> {
        self.pool
            .run_retryable(move |conn| ingest_message(conn, channel_id, &message, observed_at))
            .await
    }

    pub async fn channels(&self, workspace: Option<String>) -> Result<Vec<ChannelInfo>> {
        self.pool.run(move |conn| list_channels(conn, workspace.as_deref())).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.pool.run(stats).await
    }

    pub async fn pending_embeddings(&self, limit: i64) -> Result<Vec<PendingEmbedding>> {
        self.pool.run(move |conn| pending_embeddings(conn, limit)).await
    }

    pub async fn mark_embedded(&self, message_id: i64, vector: Vec<f32>) -> Result<()> {
        self.pool
            .run_retryable(move |conn| mark_embedded(conn, message_id, &vector))
            .await
    }

    pub async fn bump_embed_attempts(&self, message_id: i64) -> Result<i64> {
        self.pool.run_retryable(move |conn| bump_embed_attempts(conn, message_id)).await
    }

    pub async fn top_senders(&self, limit: i64) -> Result<Vec<(String, i64)>> {
        self.pool.run(move |conn| top_senders(conn, limit)).await
    }
}

fn upsert_workspace(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO workspaces (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    conn.query_row("SELECT id FROM workspaces WHERE name = ?1", params![name], |row| {
        row.get(0)
    })
}

fn upsert_channel(
    conn: &Connection,
    workspace_id: i64,
    name: &str,
    channel_type: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO channels (workspace_id, name, channel_type) VALUES (?1, ?2, ?3)
         ON CONFLICT(workspace_id, name) DO UPDATE SET channel_type = excluded.channel_type",
        params![workspace_id, name, channel_type],
    )?;
    conn.query_row(
        "SELECT id FROM channels WHERE workspace_id = ?1 AND name = ?2",
        params![workspace_id, name],
        |row| row.get(0),
    )
}

/// The dedup upsert at the heart of C4/C6 (spec §3/§4.3/§4.4): a message's
/// *identity* is `(channel_id, sender, dedup_ts_bucket)` — at most one row
/// ever exists for that tuple. `content_hash` on top of identity tells the
/// three outcomes apart: same identity + same hash is a re-observation
/// (`Duplicate`, or `ReactionsUpdated` if reaction counts moved); same
/// identity + different hash is an edit (`Updated`: content rewritten,
/// `version` bumped, re-embed enqueued).
fn ingest_message(
    conn: &mut Connection,
    channel_id: i64,
    message: &NormalizedMessage,
    observed_at: DateTime<Utc>,
) -> rusqlite::Result<(i64, IngestOutcome)> {
    let tx = conn.transaction()?;
    let content_hash = content_hash_hex(&message.content_hash);
    let observed_at_str = observed_at.to_rfc3339();
    let ts_source_str = message.ts_source.map(|t| t.to_rfc3339());

    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, content_hash FROM messages
             WHERE channel_id = ?1 AND sender = ?2 AND dedup_ts_bucket = ?3",
            params![channel_id, message.sender, message.dedup_ts_bucket],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (message_id, outcome) = if let Some((message_id, existing_hash)) = existing {
        if existing_hash == content_hash {
            tx.execute(
                "UPDATE messages SET last_observed_at = ?1 WHERE id = ?2",
                params![observed_at_str, message_id],
            )?;
            let changed = merge_reactions(&tx, message_id, &message.reactions)?;
            (
                message_id,
                if changed {
                    IngestOutcome::ReactionsUpdated
                } else {
                    IngestOutcome::Duplicate
                },
            )
        } else {
            tx.execute(
                "UPDATE messages SET
                    content = ?1, content_hash = ?2, kind = ?3, ts_source = ?4,
                    thread_parent_text = ?5, version = version + 1,
                    last_observed_at = ?6, embedding_pending = 1, embed_attempts = 0
                 WHERE id = ?7",
                params![
                    message.content,
                    content_hash,
                    kind_to_str(message.kind),
                    ts_source_str,
                    message.thread_parent_text,
                    observed_at_str,
                    message_id,
                ],
            )?;
            merge_reactions(&tx, message_id, &message.reactions)?;
            replace_mentions(&tx, message_id, &message.mentions)?;
            (message_id, IngestOutcome::Updated)
        }
    } else {
        tx.execute(
            "INSERT INTO messages (
                channel_id, sender, content, kind, ts_source, dedup_ts_bucket,
                content_hash, version, thread_parent_text, first_observed_at, last_observed_at,
                embedding_pending, embed_attempts
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?9, 1, 0)",
            params![
                channel_id,
                message.sender,
                message.content,
                kind_to_str(message.kind),
                ts_source_str,
                message.dedup_ts_bucket,
                content_hash,
                message.thread_parent_text,
                observed_at_str,
            ],
        )?;
        let message_id = tx.last_insert_rowid();
        for (emoji, count) in &message.reactions {
            tx.execute(
                "INSERT INTO reactions (message_id, emoji, count) VALUES (?1, ?2, ?3)",
                params![message_id, emoji, count],
            )?;
        }
        for token in &message.mentions {
            tx.execute(
                "INSERT OR IGNORE INTO mentions (message_id, token) VALUES (?1, ?2)",
                params![message_id, token],
            )?;
        }
        for name in &message.attachment_names {
            tx.execute(
                "INSERT OR IGNORE INTO attachments (message_id, name) VALUES (?1, ?2)",
                params![message_id, name],
            )?;
        }
        (message_id, IngestOutcome::New)
    };

    tx.commit()?;
    Ok((message_id, outcome))
}

/// Replace the mention set on an edited message (spec §4.4: `Updated`
/// rewrites `content`, so the mentions extracted from it may have changed).
fn replace_mentions(tx: &rusqlite::Transaction, message_id: i64, mentions: &[String]) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM mentions WHERE message_id = ?1", params![message_id])?;
    for token in mentions {
        tx.execute(
            "INSERT OR IGNORE INTO mentions (message_id, token) VALUES (?1, ?2)",
            params![message_id, token],
        )?;
    }
    Ok(())
}

/// Merge newly observed reaction counts additively onto existing rows (spec
/// §9 Open Question, decided in DESIGN.md: reactions only grow within one
/// process lifetime; a lower re-observed count is treated as a fresh
/// addition to avoid losing counts other observers already recorded).
fn merge_reactions(
    tx: &rusqlite::Transaction,
    message_id: i64,
    observed: &[(String, u32)],
) -> rusqlite::Result<bool> {
    let mut changed = false;
    for (emoji, count) in observed {
        let existing: Option<i64> = tx
            .query_row(
                "SELECT count FROM reactions WHERE message_id = ?1 AND emoji = ?2",
                params![message_id, emoji],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(existing_count) if existing_count == *count as i64 => {}
            Some(_) => {
                tx.execute(
                    "UPDATE reactions SET count = ?3 WHERE message_id = ?1 AND emoji = ?2",
                    params![message_id, emoji, count],
                )?;
                changed = true;
            }
            None => {
                tx.execute(
                    "INSERT INTO reactions (message_id, emoji, count) VALUES (?1, ?2, ?3)",
                    params![message_id, emoji, count],
                )?;
                changed = true;
            }
        }
    }
    Ok(changed)
}

fn list_channels(conn: &Connection, workspace: Option<&str>) -> rusqlite::Result<Vec<ChannelInfo>> {
    let sql = "SELECT c.id, w.name, c.name, c.channel_type,
                      (SELECT count(*) FROM messages m WHERE m.channel_id = c.id)
               FROM channels c JOIN workspaces w ON w.id = c.workspace_id
               WHERE ?1 IS NULL OR w.name = ?1
               ORDER BY w.name, c.name";
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![workspace], |row| {
        Ok(ChannelInfo {
            id: row.get(0)?,
            workspace: row.get(1)?,
            name: row.get(2)?,
            channel_type: row.get(3)?,
            message_count: row.get(4)?,
        })
    })?;
    rows.collect()
}

fn stats(conn: &Connection) -> rusqlite::Result<StoreStats> {
    Ok(StoreStats {
        workspace_count: conn.query_row("SELECT count(*) FROM workspaces", [], |r| r.get(0))?,
        channel_count: conn.query_row("SELECT count(*) FROM channels", [], |r| r.get(0))?,
        message_count: conn.query_row("SELECT count(*) FROM messages", [], |r| r.get(0))?,
        pending_embeddings: conn.query_row(
            "SELECT count(*) FROM messages WHERE embedding_pending = 1",
            [],
            |r| r.get(0),
        )?,
    })
}

fn pending_embeddings(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<PendingEmbedding>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, embed_attempts FROM messages
         WHERE embedding_pending = 1 AND embed_attempts < 3
         ORDER BY first_observed_at ASC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(PendingEmbedding {
            message_id: row.get(0)?,
            content: row.get(1)?,
            embed_attempts: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn mark_embedded(conn: &Connection, message_id: i64, vector: &[f32]) -> rusqlite::Result<()> {
    let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
    conn.execute(
        "INSERT INTO message_embeddings (message_id, embedding) VALUES (?1, ?2)
         ON CONFLICT(message_id) DO UPDATE SET embedding = excluded.embedding",
        params![message_id, bytes],
    )?;
    conn.execute(
        "UPDATE messages SET embedding_pending = 0 WHERE id = ?1",
        params![message_id],
    )?;
    Ok(())
}

fn top_senders(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT sender, count(*) as c FROM messages GROUP BY sender ORDER BY c DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn bump_embed_attempts(conn: &Connection, message_id: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "UPDATE messages SET embed_attempts = embed_attempts + 1 WHERE id = ?1",
        params![message_id],
    )?;
    conn.query_row(
        "SELECT embed_attempts FROM messages WHERE id = ?1",
        params![message_id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::ensure_sqlite_vec_registered;
    use crate::db::schema::migrate;

    fn test_conn() -> Connection {
        ensure_sqlite_vec_registered();
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn, 8).expect("migrate");
        conn
    }

    fn sample_message(reactions: Vec<(String, u32)>) -> NormalizedMessage {
        NormalizedMessage {
            sender: "alice".to_string(),
            ts_source: None,
            content: "hello world".to_string(),
            kind: MessageKind::Regular,
            thread_parent_text: None,
            mentions: vec![],
            reactions,
            attachment_names: vec![],
            content_hash: crate::normalize::compute_content_hash("alice", "unknown", "hello world"),
            dedup_ts_bucket: "unknown".to_string(),
        }
    }

    #[test]
    fn upsert_workspace_is_stable() {
        let conn = test_conn();
        let a = upsert_workspace(&conn, "acme").expect("first");
        let b = upsert_workspace(&conn, "acme").expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_message_does_not_duplicate_row() {
        let mut conn = test_conn();
        let workspace_id = upsert_workspace(&conn, "acme").expect("workspace");
        let channel_id = upsert_channel(&conn, workspace_id, "general", "public").expect("channel");
        let now = Utc::now();
        let (id1, outcome1) =
            ingest_message(&mut conn, channel_id, &sample_message(vec![]), now).expect("first");
        let (id2, outcome2) =
            ingest_message(&mut conn, channel_id, &sample_message(vec![]), now).expect("second");
        assert_eq!(id1, id2);
        assert_eq!(outcome1, IngestOutcome::New);
        assert_eq!(outcome2, IngestOutcome::Duplicate);
    }

    #[test]
    fn reaction_count_change_reports_updated() {
        let mut conn = test_conn();
        let workspace_id = upsert_workspace(&conn, "acme").expect("workspace");
        let channel_id = upsert_channel(&conn, workspace_id, "general", "public").expect("channel");
        let now = Utc::now();
        ingest_message(&mut conn, channel_id, &sample_message(vec![("🎉".to_string(), 1)]), now)
            .expect("first");
        let (_, outcome) = ingest_message(
            &mut conn,
            channel_id,
            &sample_message(vec![("🎉".to_string(), 2)]),
            now,
        )
        .expect("second");
        assert_eq!(outcome, IngestOutcome::ReactionsUpdated);
    }

    #[test]
    fn content_edit_bumps_version_and_reports_updated() {
        let mut conn = test_conn();
        let workspace_id = upsert_workspace(&conn, "acme").expect("workspace");
        let channel_id = upsert_channel(&conn, workspace_id, "general", "public").expect("channel");
        let now = Utc::now();
        let (id1, outcome1) =
            ingest_message(&mut conn, channel_id, &sample_message(vec![]), now).expect("first");
        assert_eq!(outcome1, IngestOutcome::New);

        let mut edited = sample_message(vec![]);
        edited.content = "hello, team!".to_string();
        edited.content_hash = crate::normalize::compute_content_hash("alice", "unknown", "hello, team!");
        let (id2, outcome2) = ingest_message(&mut conn, channel_id, &edited, now).expect("second");

        assert_eq!(id1, id2, "an edit updates the original row, never inserts a new one");
        assert_eq!(outcome2, IngestOutcome::Updated);

        let (version, content, pending): (i64, String, i64) = conn
            .query_row(
                "SELECT version, content, embedding_pending FROM messages WHERE id = ?1",
                params![id2],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("row");
        assert_eq!(version, 2);
        assert_eq!(content, "hello, team!");
        assert_eq!(pending, 1, "an edit re-enqueues embedding");
    }
}
