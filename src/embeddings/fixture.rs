// src/embeddings/fixture.rs
// Deterministic in-process gateway for tests and `slunk index --offline`
// style runs where no real embedding backend is configured.

use super::EmbeddingGateway;
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Produces a stable, unit-ish vector from a SHA-256 hash of the input text.
/// Not semantically meaningful — useful for exercising the storage and
/// fusion paths without a network dependency.
pub struct FixtureGateway {
    dimensions: usize,
}

impl FixtureGateway {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn deterministic_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let mut vector = Vec::with_capacity(self.dimensions);
        let mut seed = digest.to_vec();
        while vector.len() < self.dimensions {
            for byte in &seed {
                if vector.len() >= self.dimensions {
                    break;
                }
                // map [0, 255] onto [-1.0, 1.0]
                vector.push((*byte as f32 / 127.5) - 1.0);
            }
            let mut hasher = Sha256::new();
            hasher.update(&seed);
            seed = hasher.finalize().to_vec();
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingGateway for FixtureGateway {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.deterministic_vector(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let gateway = FixtureGateway::new(8);
        let a = gateway.embed_one("hello world").await.expect("embed");
        let b = gateway.embed_one("hello world").await.expect("embed");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let gateway = FixtureGateway::new(8);
        let a = gateway.embed_one("hello world").await.expect("embed");
        let b = gateway.embed_one("goodbye world").await.expect("embed");
        assert_ne!(a, b);
    }
}
