// src/cli/monitor.rs
// `slunk monitor`: runs the observer loop against the real macOS
// accessibility tree (or the mock tree off-macOS) without serving MCP.

use crate::config::Config;
use crate::db;
use crate::error::{Result, SlunkError};
use crate::ingest::IngestionCoordinator;
use crate::observer;
use std::time::Duration;
use tokio::sync::watch;

pub async fn run(config: Config, interval_ms: u64) -> Result<()> {
    let store = db::open(&config).await?;
    let coordinator = IngestionCoordinator::new(store, &config);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    #[cfg(all(target_os = "macos", feature = "macos-ax"))]
    {
        let tree = crate::tree::AxTree::new(Duration::from_millis(config.deadlines.tree_read_ms));
        observer::run_loop(
            tree,
            coordinator,
            Duration::from_millis(interval_ms),
            config.max_children,
            config.max_value_chars,
            shutdown_rx,
        )
        .await;
        Ok(())
    }

    #[cfg(not(all(target_os = "macos", feature = "macos-ax")))]
    {
        let _ = (coordinator, shutdown_rx, interval_ms);
        Err(SlunkError::Config(
            "slunk monitor requires macOS with the macos-ax feature enabled".to_string(),
        ))
    }
}
