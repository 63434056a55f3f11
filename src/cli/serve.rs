// src/cli/serve.rs
// MCP server entry point: opens the store, selects an embedding gateway,
// spawns the background sweeper, and serves tool calls over stdio.

use crate::config::{Config, EnvOverrides};
use crate::db;
use crate::embeddings::{CachingGateway, EmbeddingGateway, FixtureGateway, HttpEmbeddingGateway};
use crate::error::{Result, SlunkError};
use crate::ingest::sweeper;
use crate::mcp::SlunkServer;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Build the active embedding gateway: an HTTP backend if
/// `SLUNK_EMBEDDING_ENDPOINT` is set, otherwise the deterministic fixture
/// gateway (keeps `slunk serve` usable with no external dependency, at the
/// cost of semantically meaningless vectors).
pub fn build_gateway(config: &Config) -> Arc<dyn EmbeddingGateway> {
    let env = EnvOverrides::from_env();
    match env.embedding_endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, "using HTTP embedding gateway");
            let gateway = HttpEmbeddingGateway::new(
                endpoint,
                env.embedding_api_key,
                "text-embedding-3-small".to_string(),
                config.embedding_dim,
            );
            Arc::new(CachingGateway::new(gateway, 10_000))
        }
        None => {
            info!("no SLUNK_EMBEDDING_ENDPOINT set; using deterministic fixture gateway");
            Arc::new(FixtureGateway::new(config.embedding_dim))
        }
    }
}

pub async fn run(config: Config) -> Result<()> {
    let store = db::open(&config).await?;
    let gateway = build_gateway(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_store = store.clone();
    let sweeper_gateway = gateway.clone();
    let batch_size = config.embedding_batch;
    let sweeper_handle = tokio::spawn(async move {
        sweeper::run(sweeper_store, sweeper_gateway, batch_size, shutdown_rx).await;
    });

    let server = SlunkServer::new(store, gateway, config);
    info!("slunk MCP server starting on stdio");
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport)
        .await
        .map_err(|e| SlunkError::Anyhow(anyhow::anyhow!(e.to_string())))?;
    service
        .waiting()
        .await
        .map_err(|e| SlunkError::Anyhow(anyhow::anyhow!(e.to_string())))?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;
    Ok(())
}
