// src/embeddings/cache.rs
// Content-hash-keyed cache in front of any `EmbeddingGateway`, so a message
// that is re-observed (spec §4.3 dedup) never pays for a second embedding
// call even across batches within one process lifetime.

use super::EmbeddingGateway;
use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub struct CachingGateway<G: EmbeddingGateway> {
    inner: G,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl<G: EmbeddingGateway> CachingGateway<G> {
    pub fn new(inner: G, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(max_capacity),
        }
    }

    fn key_for(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[async_trait]
impl<G: EmbeddingGateway> EmbeddingGateway for CachingGateway<G> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let key = Self::key_for(text);
            if let Some(cached) = self.cache.get(&key).await {
                results[i] = Some((*cached).clone());
            } else {
                misses.push((i, text.clone(), key));
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t, _)| t.clone()).collect();
            let fetched = self.inner.embed_batch(&miss_texts).await?;
            for ((i, _, key), vector) in misses.into_iter().zip(fetched.into_iter()) {
                self.cache.insert(key, Arc::new(vector.clone())).await;
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.unwrap_or_default()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::FixtureGateway;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGateway {
        inner: FixtureGateway,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingGateway for CountingGateway {
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }
    }

    #[tokio::test]
    async fn repeated_text_hits_cache() {
        let counting = CountingGateway {
            inner: FixtureGateway::new(4),
            calls: AtomicUsize::new(0),
        };
        let gateway = CachingGateway::new(counting, 100);
        let texts = vec!["hello".to_string(), "hello".to_string()];
        let _ = gateway.embed_batch(&texts).await.expect("embed");
        let _ = gateway.embed_batch(&texts).await.expect("embed");
        assert_eq!(gateway.inner.calls.load(Ordering::SeqCst), 1);
    }
}
