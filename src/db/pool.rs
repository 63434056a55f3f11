// src/db/pool.rs
// Async connection pool over rusqlite + sqlite-vec, via deadpool-sqlite.
//
// Use `pool.run()` from MCP tool handlers and the query engine — it maps
// errors onto `SlunkError` automatically. Use `pool.interact()` from the
// ingestion coordinator and migrations when you need a plain `anyhow::Result`.

use crate::error::{Result, SlunkError};
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Registers the sqlite-vec extension globally. Must happen before any
/// connection is opened; `Once` makes this safe to call from every pool
/// constructor without double-registering.
static SQLITE_VEC_INIT: Once = Once::new();

#[allow(clippy::missing_transmute_annotations)]
pub(crate) fn ensure_sqlite_vec_registered() {
    SQLITE_VEC_INIT.call_once(|| {
        // SAFETY: `sqlite3_vec_init` has the signature
        // `sqlite3_auto_extension` expects for an auto-extension entry
        // point; the transmute only changes the fn-pointer type, and the
        // pointer itself is a statically linked symbol valid for the
        // process lifetime.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
        tracing::debug!("sqlite-vec extension registered globally");
    });
}

fn is_contention(err: &rusqlite::Error) -> bool {
    use rusqlite::ffi;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

/// Retry delays for `StoreTransient` contention (spec §7: "100 ms × 2ⁿ, cap
/// 3").
const RETRY_DELAYS: [Duration; 3] =
    [Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)];

/// `Database` wraps a `deadpool_sqlite` pool configured with the PRAGMA
/// tunings and sqlite-vec registration spec §4.4 requires.
#[derive(Clone)]
pub struct DatabasePool {
    pool: Pool,
    write_cache_mb: i64,
    mmap_mb: i64,
}

impl DatabasePool {
    /// Open (creating if absent) a file-backed pool at `path`.
    pub async fn open(path: &Path, write_cache_mb: i64, mmap_mb: i64) -> Result<Self> {
        ensure_sqlite_vec_registered();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            restrict_dir_permissions(parent)?;
        }
        let pool = Config::new(path.to_path_buf())
            .create_pool(Runtime::Tokio1)
            .map_err(|e| SlunkError::StoreFatal(format!("failed to create pool: {e}")))?;

        let db = Self {
            pool,
            write_cache_mb,
            mmap_mb,
        };
        db.configure_all_connections().await?;
        restrict_file_permissions(path)?;
        Ok(db)
    }

    /// Open a shared-cache in-memory pool, for tests.
    pub async fn open_in_memory() -> Result<Self> {
        ensure_sqlite_vec_registered();
        let uri = format!(
            "file:memdb_{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        let pool = Config::new(PathBuf::from(uri))
            .create_pool(Runtime::Tokio1)
            .map_err(|e| SlunkError::StoreFatal(format!("failed to create in-memory pool: {e}")))?;
        let db = Self {
            pool,
            write_cache_mb: 64,
            mmap_mb: 256,
        };
        db.configure_all_connections().await?;
        Ok(db)
    }

    async fn configure_all_connections(&self) -> Result<()> {
        let write_cache_mb = self.write_cache_mb;
        let mmap_mb = self.mmap_mb;
        self.interact(move |conn| {
            setup_connection(conn, write_cache_mb, mmap_mb)?;
            Ok(())
        })
        .await
    }

    /// Run a closure against a pooled connection, mapping all pool/interact
    /// errors onto `SlunkError` (the MCP-tool-facing entry point).
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_retry(f).await
    }

    async fn run_with_retry<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        // rusqlite closures are FnOnce; clone isn't available, so retries
        // only apply once the caller has expressed the op as retryable via
        // `run_retryable`. Plain `run` executes exactly once and maps
        // contention straight onto `StoreTransient`.
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| SlunkError::NotReady(format!("pool exhausted: {e}")))?;
        conn.interact(f)
            .await
            .map_err(|e| SlunkError::StoreFatal(format!("interact task failed: {e}")))?
            .map_err(|e| {
                if is_contention(&e) {
                    SlunkError::StoreTransient(e.to_string())
                } else {
                    SlunkError::Db(e)
                }
            })
    }

    /// Run a closure that may hit SQLite contention, retrying with the
    /// exponential backoff policy from spec §7.
    pub async fn run_retryable<F, T>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&mut Connection) -> rusqlite::Result<T> + Clone + Send + 'static,
        T: Send + 'static,
    {
        for delay in RETRY_DELAYS {
            let attempt = f.clone();
            match self.run(attempt).await {
                Ok(result) => return Ok(result),
                Err(SlunkError::StoreTransient(_)) => {
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
        self.run(f).await
    }

    /// Lower-level escape hatch returning `anyhow::Result`, for migrations
    /// and background tasks that don't need `SlunkError` mapping.
    pub async fn interact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| SlunkError::NotReady(format!("pool exhausted: {e}")))?;
        conn.interact(f)
            .await
            .map_err(|e| SlunkError::StoreFatal(format!("interact task failed: {e}")))?
            .map_err(SlunkError::Db)
    }
}

fn restrict_dir_permissions(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let mut perms = std::fs::metadata(dir)?.permissions();
        perms.set_mode(0o700);
        std::fs::set_permissions(dir, perms)?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

fn restrict_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        if let Ok(metadata) = std::fs::metadata(path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// PRAGMA tunings required by spec §4.4: WAL journaling, foreign keys,
/// busy-timeout write-contention window, relaxed synchronous mode, an
/// in-memory temp store, a page cache sized from `write_cache_mb`, and an
/// mmap window sized from `mmap_mb`.
fn setup_connection(conn: &Connection, write_cache_mb: i64, mmap_mb: i64) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; \
         PRAGMA foreign_keys=ON; \
         PRAGMA busy_timeout=5000; \
         PRAGMA synchronous=NORMAL; \
         PRAGMA temp_store=MEMORY;",
    )?;
    // cache_size takes a negative value to mean "KiB", per SQLite's PRAGMA docs.
    let cache_kib = -(write_cache_mb * 1024);
    conn.execute_batch(&format!("PRAGMA cache_size={cache_kib};"))?;
    let mmap_bytes = mmap_mb * 1024 * 1024;
    conn.execute_batch(&format!("PRAGMA mmap_size={mmap_bytes};"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_in_memory_pool() {
        let db = DatabasePool::open_in_memory().await.expect("open pool");
        let one: i64 = db.run(|conn| conn.query_row("SELECT 1", [], |r| r.get(0))).await.expect("query");
        assert_eq!(one, 1);
    }
}
