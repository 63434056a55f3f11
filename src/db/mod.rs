// src/db/mod.rs
// Durable Store (C4, spec §4.4): SQLite via rusqlite + sqlite-vec + FTS5,
// pooled with deadpool-sqlite. `Database::open` is the one entry point that
// wires the pool, PRAGMA tuning, and schema migration together.

pub mod pool;
pub mod schema;
pub mod store;

use crate::config::Config;
use crate::error::Result;
use pool::DatabasePool;
use store::Store;

/// Opens the pool at `config.db_path`, runs pending migrations, and returns
/// a ready-to-use `Store`.
pub async fn open(config: &Config) -> Result<Store> {
    let pool = DatabasePool::open(&config.db_path, config.write_cache_mb, config.mmap_mb).await?;
    let embedding_dim = config.embedding_dim;
    pool.interact(move |conn| schema::migrate(conn, embedding_dim)).await?;
    Ok(Store::new(pool))
}

/// Opens an in-memory store for tests, with the given embedding dimension.
pub async fn open_in_memory_for_tests(embedding_dim: usize) -> Result<Store> {
    let pool = DatabasePool::open_in_memory().await?;
    pool.interact(move |conn| schema::migrate(conn, embedding_dim)).await?;
    Ok(Store::new(pool))
}
