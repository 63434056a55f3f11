// src/cli/config_cmd.rs
// `slunk config show|set`: inspect or persist configuration (spec §6).

use crate::config::{default_config_path, Config, FileConfig};
use crate::error::{Result, SlunkError};
use std::fs;

pub fn show(config: &Config) -> Result<()> {
    let warnings = config.validate();
    for warning in &warnings {
        tracing::warn!(%warning, "configuration warning");
    }
    let rendered = serde_json::json!({
        "db_path": config.db_path,
        "log_dir": config.log_dir,
        "embedding_dim": config.embedding_dim,
        "embedding_batch": config.embedding_batch,
        "max_children": config.max_children,
        "max_value_chars": config.max_value_chars,
        "write_cache_mb": config.write_cache_mb,
        "mmap_mb": config.mmap_mb,
        "query_weight_semantic": config.query_weight_semantic,
        "query_weight_lexical": config.query_weight_lexical,
        "max_in_flight": config.max_in_flight,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Persist one key into the TOML config file, creating it if absent. Only
/// the keys `FileConfig` understands are accepted (spec §6: store-tunable
/// settings, not every in-memory `Config` field).
pub fn set(key: &str, value: &str) -> Result<()> {
    let path = default_config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file_config = FileConfig::load(&path).unwrap_or_default();
    file_config.set(key, value).map_err(SlunkError::Config)?;
    let rendered = toml::to_string_pretty(&file_config)
        .map_err(|e| SlunkError::Config(format!("failed to render config: {e}")))?;
    fs::write(&path, rendered)?;
    println!("set {key} = {value} in {}", path.display());
    Ok(())
}
