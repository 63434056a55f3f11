// src/cli/index.rs
// `slunk index`: run the embedding sweep once over all pending messages and
// report how many were processed, without entering the long-running loops.

use crate::cli::serve::build_gateway;
use crate::config::Config;
use crate::db;
use crate::error::Result;

pub async fn run(config: Config) -> Result<()> {
    let store = db::open(&config).await?;
    let gateway = build_gateway(&config);

    let mut total = 0i64;
    loop {
        let pending = store.pending_embeddings(config.embedding_batch as i64).await?;
        if pending.is_empty() {
            break;
        }
        let texts: Vec<String> = pending.iter().map(|p| p.content.clone()).collect();
        let vectors = gateway.embed_batch(&texts).await?;
        for (item, vector) in pending.iter().zip(vectors.into_iter()) {
            store.mark_embedded(item.message_id, vector).await?;
            total += 1;
        }
    }

    println!("embedded {total} pending messages");
    Ok(())
}
