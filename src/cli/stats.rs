// src/cli/stats.rs
// `slunk stats`: print store summary counts and exit.

use crate::config::Config;
use crate::db;
use crate::error::Result;

pub async fn run(config: Config) -> Result<()> {
    let store = db::open(&config).await?;
    let stats = store.stats().await?;
    let rendered = serde_json::json!({
        "workspaces": stats.workspace_count,
        "channels": stats.channel_count,
        "messages": stats.message_count,
        "pending_embeddings": stats.pending_embeddings,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
