// src/config/mod.rs
// Configuration loading: environment variables override a TOML file, which
// overrides built-in defaults (spec §6).

mod env;
mod file;

pub use env::EnvOverrides;
pub use file::FileConfig;

use std::path::PathBuf;

/// Deadlines for the three externally-observable operation classes named in
/// spec §5/§6.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub tree_read_ms: u64,
    pub query_ms: u64,
    pub embed_ms: u64,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            tree_read_ms: 2_000,
            query_ms: 30_000,
            embed_ms: 10_000,
        }
    }
}

/// Fully resolved runtime configuration (spec §6's Configuration table).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub embedding_dim: usize,
    pub embedding_batch: usize,
    pub max_children: usize,
    pub max_value_chars: usize,
    pub write_cache_mb: i64,
    pub mmap_mb: i64,
    pub query_weight_semantic: f32,
    pub query_weight_lexical: f32,
    pub deadlines: Deadlines,
    pub max_in_flight: usize,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            embedding_dim: 768,
            embedding_batch: 16,
            max_children: 1_000,
            max_value_chars: 1_000_000,
            write_cache_mb: 64,
            mmap_mb: 256,
            query_weight_semantic: 0.6,
            query_weight_lexical: 0.4,
            deadlines: Deadlines::default(),
            max_in_flight: 50,
            log_dir: default_log_dir(),
        }
    }
}

/// Default store location: `<app-data-dir>/slunk/slunk.db` (spec §6).
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("slunk")
        .join("slunk.db")
}

/// Default diagnostic-log directory: `<app-data-dir>/slunk/logs` (spec §6).
pub fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("slunk")
        .join("logs")
}

pub fn default_config_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("slunk")
        .join("config.toml")
}

impl Config {
    /// Load configuration: defaults, then the TOML file (if present), then
    /// environment variables — the same precedence the teacher's
    /// `EnvConfig`/`MiraConfig` split uses.
    pub fn load() -> Self {
        let mut config = Config::default();
        if let Some(file) = FileConfig::load(&default_config_path()) {
            file.apply(&mut config);
        }
        EnvOverrides::from_env().apply(&mut config);
        config
    }

    /// Validate the resolved configuration, returning human-readable warnings
    /// rather than failing — consistent with the teacher's
    /// `EnvConfig::validate()` producing non-fatal warnings at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.embedding_dim == 0 {
            warnings.push("embedding_dim is zero; vector search will be disabled".to_string());
        }
        if self.query_weight_semantic + self.query_weight_lexical <= 0.0 {
            warnings.push(
                "query_weights sum to zero; falling back to default (0.6, 0.4)".to_string(),
            );
        }
        if self.max_children == 0 {
            warnings.push("max_children is zero; the tree walker will refuse all containers"
                .to_string());
        }
        warnings
    }
}
