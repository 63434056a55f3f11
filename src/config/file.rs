// src/config/file.rs
// File-based configuration from <app-data-dir>/slunk/config.toml.

use super::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Top-level on-disk config structure. Every field is optional so a partial
/// file only overrides what it names, matching the teacher's
/// `MiraConfig`/`#[serde(default)]` pattern.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub query: QuerySection,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct StoreSection {
    pub db_path: Option<String>,
    pub write_cache_mb: Option<i64>,
    pub mmap_mb: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct QuerySection {
    pub weight_semantic: Option<f32>,
    pub weight_lexical: Option<f32>,
}

impl FileConfig {
    /// Load the TOML config file if present; returns `None` (not an error)
    /// when the file is absent, since a missing config file is the common
    /// case on first run.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read config file, using defaults");
                return None;
            }
        };
        match toml::from_str(&raw) {
            Ok(cfg) => {
                debug!(path = %path.display(), "loaded config file");
                Some(cfg)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse config file, using defaults");
                None
            }
        }
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(v) = &self.store.db_path {
            config.db_path = v.into();
        }
        if let Some(v) = self.store.write_cache_mb {
            config.write_cache_mb = v;
        }
        if let Some(v) = self.store.mmap_mb {
            config.mmap_mb = v;
        }
        if let Some(v) = self.query.weight_semantic {
            config.query_weight_semantic = v;
        }
        if let Some(v) = self.query.weight_lexical {
            config.query_weight_lexical = v;
        }
    }

    /// Set one dotted key (`store.db_path`, `query.weight_semantic`, ...)
    /// from a raw string value, for `slunk config set`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "store.db_path" | "db_path" => self.store.db_path = Some(value.to_string()),
            "store.write_cache_mb" | "write_cache_mb" => {
                self.store.write_cache_mb = Some(parse_field(key, value)?)
            }
            "store.mmap_mb" | "mmap_mb" => self.store.mmap_mb = Some(parse_field(key, value)?),
            "query.weight_semantic" | "weight_semantic" => {
                self.query.weight_semantic = Some(parse_field(key, value)?)
            }
            "query.weight_lexical" | "weight_lexical" => {
                self.query.weight_lexical = Some(parse_field(key, value)?)
            }
            other => return Err(format!("unknown config key: {other}")),
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value.parse().map_err(|_| format!("invalid value {value:?} for {key}"))
}
