// src/db/schema.rs
// DDL and migration runner for the durable store (spec §4.4). One
// `CURRENT_SCHEMA_VERSION` bump per incompatible DDL change; `migrate()` is
// idempotent and safe to call on every startup.

use rusqlite::Connection;

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Apply the full schema if `schema_version` is below `CURRENT_SCHEMA_VERSION`.
/// Single transaction: either the whole migration lands or none of it does.
pub fn migrate(conn: &mut Connection, embedding_dim: usize) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    let current: i64 = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    apply_v1(&tx, embedding_dim)?;
    tx.execute(
        "INSERT INTO schema_meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()
}

fn apply_v1(conn: &Connection, embedding_dim: usize) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS workspaces (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS channels (
            id           INTEGER PRIMARY KEY,
            workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
            name         TEXT NOT NULL,
            channel_type TEXT NOT NULL,
            UNIQUE(workspace_id, name)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                INTEGER PRIMARY KEY,
            channel_id        INTEGER NOT NULL REFERENCES channels(id),
            sender            TEXT NOT NULL,
            content           TEXT NOT NULL,
            kind              TEXT NOT NULL,
            ts_source         TEXT,
            dedup_ts_bucket   TEXT NOT NULL,
            content_hash      TEXT NOT NULL,
            version           INTEGER NOT NULL DEFAULT 1,
            thread_parent_id  INTEGER REFERENCES messages(id),
            thread_parent_text TEXT,
            first_observed_at TEXT NOT NULL,
            last_observed_at  TEXT NOT NULL,
            embedding_pending INTEGER NOT NULL DEFAULT 1,
            embed_attempts    INTEGER NOT NULL DEFAULT 0,
            UNIQUE(channel_id, sender, dedup_ts_bucket)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_channel_ts ON messages(channel_id, ts_source);
        CREATE INDEX IF NOT EXISTS idx_messages_pending ON messages(embedding_pending);
        CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender);
        CREATE INDEX IF NOT EXISTS idx_messages_content_hash ON messages(content_hash);

        CREATE TABLE IF NOT EXISTS reactions (
            message_id INTEGER NOT NULL REFERENCES messages(id),
            emoji      TEXT NOT NULL,
            count      INTEGER NOT NULL,
            PRIMARY KEY (message_id, emoji)
        );

        CREATE TABLE IF NOT EXISTS mentions (
            message_id INTEGER NOT NULL REFERENCES messages(id),
            token      TEXT NOT NULL,
            PRIMARY KEY (message_id, token)
        );

        CREATE TABLE IF NOT EXISTS attachments (
            message_id INTEGER NOT NULL REFERENCES messages(id),
            name       TEXT NOT NULL,
            PRIMARY KEY (message_id, name)
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
            content,
            sender UNINDEXED,
            content='messages',
            content_rowid='id',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS messages_fts_insert AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, content, sender) VALUES (new.id, new.content, new.sender);
        END;
        CREATE TRIGGER IF NOT EXISTS messages_fts_delete AFTER DELETE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content, sender) VALUES ('delete', old.id, old.content, old.sender);
        END;
        CREATE TRIGGER IF NOT EXISTS messages_fts_update AFTER UPDATE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content, sender) VALUES ('delete', old.id, old.content, old.sender);
            INSERT INTO messages_fts(rowid, content, sender) VALUES (new.id, new.content, new.sender);
        END;",
    )?;

    // sqlite-vec's dimension is fixed at table-creation time, so the vector
    // table DDL is generated per the configured `embedding_dim` (grounded in
    // the teacher's vector-table migration, which does the same).
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS message_embeddings USING vec0(
            message_id INTEGER PRIMARY KEY,
            embedding FLOAT[{embedding_dim}]
        );"
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        super::super::pool::ensure_sqlite_vec_registered();
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn, 8).expect("first migrate");
        migrate(&mut conn, 8).expect("second migrate is a no-op");
        let version: i64 = conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .expect("version row")
            .parse()
            .expect("numeric");
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn creates_expected_tables() {
        super::super::pool::ensure_sqlite_vec_registered();
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn, 8).expect("migrate");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='messages'",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 1);
    }
}
