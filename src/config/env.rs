// src/config/env.rs
// Environment-variable overrides — single source of truth for all env vars,
// grounded in the teacher's config::env::ApiKeys/EmbeddingsConfig split.

use super::Config;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Overrides read from `SLUNK_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub db_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub embedding_dim: Option<usize>,
    pub embedding_batch: Option<usize>,
    pub max_children: Option<usize>,
    pub max_value_chars: Option<usize>,
    pub write_cache_mb: Option<i64>,
    pub mmap_mb: Option<i64>,
    pub weight_semantic: Option<f32>,
    pub weight_lexical: Option<f32>,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let overrides = Self {
            db_path: read_path("SLUNK_DB_PATH"),
            log_dir: read_path("SLUNK_LOG_DIR"),
            embedding_dim: read_parsed("SLUNK_EMBEDDING_DIM"),
            embedding_batch: read_parsed("SLUNK_EMBEDDING_BATCH"),
            max_children: read_parsed("SLUNK_MAX_CHILDREN"),
            max_value_chars: read_parsed("SLUNK_MAX_VALUE_CHARS"),
            write_cache_mb: read_parsed("SLUNK_WRITE_CACHE_MB"),
            mmap_mb: read_parsed("SLUNK_MMAP_MB"),
            weight_semantic: read_parsed("SLUNK_WEIGHT_SEMANTIC"),
            weight_lexical: read_parsed("SLUNK_WEIGHT_LEXICAL"),
            embedding_endpoint: read_string("SLUNK_EMBEDDING_ENDPOINT"),
            embedding_api_key: read_string("SLUNK_EMBEDDING_API_KEY"),
        };
        debug!("environment overrides loaded");
        overrides
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(v) = &self.db_path {
            config.db_path = v.clone();
        }
        if let Some(v) = &self.log_dir {
            config.log_dir = v.clone();
        }
        if let Some(v) = self.embedding_dim {
            config.embedding_dim = v;
        }
        if let Some(v) = self.embedding_batch {
            config.embedding_batch = v;
        }
        if let Some(v) = self.max_children {
            config.max_children = v;
        }
        if let Some(v) = self.max_value_chars {
            config.max_value_chars = v;
        }
        if let Some(v) = self.write_cache_mb {
            config.write_cache_mb = v;
        }
        if let Some(v) = self.mmap_mb {
            config.mmap_mb = v;
        }
        if let Some(v) = self.weight_semantic {
            config.query_weight_semantic = v;
        }
        if let Some(v) = self.weight_lexical {
            config.query_weight_lexical = v;
        }
    }
}

fn read_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn read_path(name: &str) -> Option<PathBuf> {
    read_string(name).map(PathBuf::from)
}

fn read_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    match read_string(name) {
        Some(raw) => match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(name, value = raw, "failed to parse environment override, ignoring");
                None
            }
        },
        None => None,
    }
}

/// Whether the process should run in headless MCP server mode: `--mcp` flag
/// (handled by clap) or `MCP_MODE` environment variable (spec §6).
pub fn mcp_mode_env_set() -> bool {
    std::env::var("MCP_MODE")
        .map(|v| !v.trim().is_empty() && v != "0")
        .unwrap_or(false)
}
