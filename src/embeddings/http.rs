// src/embeddings/http.rs
// HTTP-backed embedding gateway, grounded in the teacher's OpenAI/Ollama
// clients: a plain `reqwest::Client` with a bounded timeout, a retry loop
// on transient failures, and request-side text truncation.

use super::EmbeddingGateway;
use crate::error::{Result, SlunkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_TEXT_CHARS: usize = 8_000;
const TIMEOUT_SECS: u64 = 30;
const RETRY_ATTEMPTS: usize = 2;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Talks to an OpenAI-compatible `/embeddings` endpoint over HTTP.
pub struct HttpEmbeddingGateway {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    http_client: reqwest::Client,
}

impl HttpEmbeddingGateway {
    pub fn new(endpoint: String, api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint,
            api_key,
            model,
            dimensions,
            http_client,
        }
    }

    async fn call_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let truncated: Vec<String> = texts
            .iter()
            .map(|t| t.chars().take(MAX_TEXT_CHARS).collect())
            .collect();
        let body = EmbeddingRequest {
            input: &truncated,
            model: &self.model,
        };
        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SlunkError::EmbedFailure(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }
        let parsed: EmbeddingResponse = response.json().await?;
        let mut ordered = vec![Vec::new(); texts.len()];
        for item in parsed.data {
            if item.index < ordered.len() {
                ordered[item.index] = item.embedding;
            }
        }
        Ok(ordered)
    }
}

#[async_trait]
impl EmbeddingGateway for HttpEmbeddingGateway {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut last_err = None;
        for attempt in 0..=RETRY_ATTEMPTS {
            match self.call_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "embedding request failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SlunkError::EmbedFailure("unknown failure".to_string())))
    }
}
