// src/embeddings/mod.rs
// Embedding Gateway (C5, spec §4.5): an externally-observable boundary
// around whatever model serves vectors. Everything downstream only ever
// talks to the `EmbeddingGateway` trait.

mod cache;
mod fixture;
mod http;

pub use cache::CachingGateway;
pub use fixture::FixtureGateway;
pub use http::HttpEmbeddingGateway;

use crate::error::{Result, SlunkError};
use async_trait::async_trait;

/// Maximum messages per batch request (spec §4.5: "batches up to
/// `embedding_batch` texts per call").
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// A provider of text embeddings. Implementations own batching, retries, and
/// whatever wire format their backend needs; callers only see `Vec<f32>`
/// vectors of a fixed `dimensions()`.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// The dimensionality every vector this gateway returns will have.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed one text (default built on `embed_batch`).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch.pop().ok_or_else(|| SlunkError::EmbedFailure("empty batch result".to_string()))
    }
}

/// Validate a vector's dimensionality against what the gateway promises
/// (spec §4.5 edge case: "dimension mismatch between a cached vector and the
/// active gateway is treated as a fatal embedding failure, not silently
/// resized").
pub fn validate_dimensions(gateway: &dyn EmbeddingGateway, vector: &[f32]) -> Result<()> {
    if vector.len() != gateway.dimensions() {
        return Err(SlunkError::EmbedFailure(format!(
            "expected {} dimensions, got {}",
            gateway.dimensions(),
            vector.len()
        )));
    }
    Ok(())
}
