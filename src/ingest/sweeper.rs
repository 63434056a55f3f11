// src/ingest/sweeper.rs
// Background embedding sweeper (spec §4.5/§4.6): periodically pulls
// `embedding_pending` rows and embeds them, so ingestion never blocks on the
// embedding backend. Retries with exponential backoff, capped at 3 attempts
// per message (enforced in the `pending_embeddings` query itself).

use crate::db::store::Store;
use crate::embeddings::EmbeddingGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Runs until `shutdown` reports `true`. Intended to be spawned as one
/// long-lived task alongside the observer loop (spec §5: "the embedding
/// sweep and the observation tick run concurrently, sharing the store
/// through its pool, never through in-process locks").
pub async fn run(
    store: Store,
    gateway: Arc<dyn EmbeddingGateway>,
    batch_size: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = sweep_once(&store, gateway.as_ref(), batch_size).await {
                    tracing::warn!(error = %err, "embedding sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("embedding sweeper shutting down");
                    return;
                }
            }
        }
    }
}

async fn sweep_once(
    store: &Store,
    gateway: &dyn EmbeddingGateway,
    batch_size: usize,
) -> crate::error::Result<()> {
    let pending = store.pending_embeddings(batch_size as i64).await?;
    if pending.is_empty() {
        return Ok(());
    }
    let texts: Vec<String> = pending.iter().map(|p| p.content.clone()).collect();
    match gateway.embed_batch(&texts).await {
        Ok(vectors) => {
            for (item, vector) in pending.iter().zip(vectors.into_iter()) {
                if let Err(err) = store.mark_embedded(item.message_id, vector).await {
                    tracing::warn!(message_id = item.message_id, error = %err, "failed to persist embedding");
                    store.bump_embed_attempts(item.message_id).await?;
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, batch_size = pending.len(), "embedding batch call failed");
            for item in &pending {
                let attempts = store.bump_embed_attempts(item.message_id).await?;
                let backoff = BASE_BACKOFF * 2u32.pow(attempts.min(3) as u32 - 1);
                tokio::time::sleep(backoff).await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_for_tests;
    use crate::embeddings::FixtureGateway;
    use crate::normalize::compute_content_hash;

    #[tokio::test]
    async fn sweeps_pending_messages_into_embeddings() {
        let store = open_in_memory_for_tests(8).await.expect("store");
        let workspace_id = store.upsert_workspace("acme").await.expect("workspace");
        let channel_id = store
            .upsert_channel(workspace_id, "general", crate::parser::ChannelType::Public)
            .await
            .expect("channel");
        let message = crate::normalize::NormalizedMessage {
            sender: "alice".to_string(),
            ts_source: None,
            content: "hello world".to_string(),
            kind: crate::parser::MessageKind::Regular,
            thread_parent_text: None,
            mentions: vec![],
            reactions: vec![],
            attachment_names: vec![],
            content_hash: compute_content_hash("alice", "unknown", "hello world"),
            dedup_ts_bucket: "unknown".to_string(),
        };
        store
            .ingest_message(channel_id, message, chrono::Utc::now())
            .await
            .expect("ingest");

        let gateway: Arc<dyn EmbeddingGateway> = Arc::new(FixtureGateway::new(8));
        sweep_once(&store, gateway.as_ref(), 10).await.expect("sweep");

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.pending_embeddings, 0);
    }
}
