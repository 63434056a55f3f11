// src/observer/mod.rs
// Observer loop (spec §5): on each tick, read the tree (C1), parse it (C2),
// and hand the resulting snapshot to the ingestion coordinator (C6). Runs
// cooperatively — a slow or failing tick never blocks the next one past its
// own deadline.

use crate::error::Result;
use crate::ingest::{IngestSummary, IngestionCoordinator};
use crate::parser::ConversationParser;
use crate::tree::TreeAdapter;
use std::time::Duration;
use tokio::sync::watch;

/// Run one observation tick: parse the current snapshot and ingest it.
/// Tree-unavailable and timeout errors are logged and swallowed — spec §7
/// treats them as retryable on the next tick, not fatal to the process.
pub async fn tick<T: TreeAdapter>(
    tree: &T,
    coordinator: &IngestionCoordinator,
    max_children: usize,
    max_value: usize,
) -> Result<Option<IngestSummary>> {
    let parser = ConversationParser::new(tree, max_children, max_value);
    let snapshot = match parser.parse().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return Ok(None),
        Err(err) => {
            tracing::warn!(error = %err, "observation tick failed to parse snapshot");
            return Ok(None);
        }
    };
    let summary = coordinator.ingest_snapshot(snapshot).await?;
    Ok(Some(summary))
}

/// Run ticks on a fixed interval until `shutdown` reports `true`.
pub async fn run_loop<T: TreeAdapter>(
    tree: T,
    coordinator: IngestionCoordinator,
    interval: Duration,
    max_children: usize,
    max_value: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tick(&tree, &coordinator, max_children, max_value).await {
                    Ok(Some(summary)) => {
                        tracing::debug!(
                            new = summary.new,
                            duplicate = summary.duplicate,
                            reactions_updated = summary.reactions_updated,
                            dropped = summary.dropped,
                            "observation tick ingested"
                        );
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(error = %err, "observation tick failed to ingest"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("observer loop shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::open_in_memory_for_tests;
    use crate::tree::{MockElement, MockTree};

    #[tokio::test]
    async fn tick_ingests_one_snapshot() {
        let mut tree = MockTree::new();
        let window = tree.insert(
            MockElement::new("AXWindow")
                .with_attribute("title", "acme — #general")
                .with_attribute("channel_type", "public"),
            None,
        );
        let list = tree.insert(MockElement::new("AXList"), Some(window));
        tree.insert(
            MockElement::new("AXGroup")
                .with_attribute("sender", "alice")
                .with_attribute("content", "hello team"),
            Some(list),
        );
        tree.set_focused(window);

        let store = open_in_memory_for_tests(8).await.expect("store");
        let coordinator = IngestionCoordinator::new(store, &Config::default());
        let summary = tick(&tree, &coordinator, 1_000, 1_000_000)
            .await
            .expect("tick ok")
            .expect("snapshot ingested");
        assert_eq!(summary.new, 1);
    }
}
