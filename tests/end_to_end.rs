// tests/end_to_end.rs
// End-to-end scenarios across the full pipeline: parse -> normalize ->
// ingest -> (sweep) -> search, using `MockTree` and `FixtureGateway` so the
// suite never depends on a real accessibility session or network embedding
// backend.

use slunk::config::Config;
use slunk::db::open_in_memory_for_tests;
use slunk::embeddings::{EmbeddingGateway, FixtureGateway};
use slunk::ingest::IngestionCoordinator;
use slunk::parser::ConversationParser;
use slunk::search::hybrid_search;
use slunk::tree::{MockElement, MockTree};
use std::sync::Arc;

fn single_message_tree(title: &str, sender: &str, content: &str) -> MockTree {
    let mut tree = MockTree::new();
    let window = tree.insert(
        MockElement::new("AXWindow")
            .with_attribute("title", title)
            .with_attribute("channel_type", "public"),
        None,
    );
    let list = tree.insert(MockElement::new("AXList"), Some(window));
    tree.insert(
        MockElement::new("AXGroup")
            .with_attribute("sender", sender)
            .with_attribute("content", content)
            .with_attribute("timestamp", "2024-06-24T14:30:00Z"),
        Some(list),
    );
    tree.set_focused(window);
    tree
}

#[tokio::test]
async fn new_message_is_observed_parsed_and_persisted() {
    let tree = single_message_tree("acme — #general", "alice", "deploy finished cleanly");
    let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
    let snapshot = parser.parse().await.expect("parse ok").expect("snapshot present");

    let store = open_in_memory_for_tests(8).await.expect("store");
    let coordinator = IngestionCoordinator::new(store.clone(), &Config::default());
    let summary = coordinator.ingest_snapshot(snapshot).await.expect("ingest");

    assert_eq!(summary.new, 1);
    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.message_count, 1);
    assert_eq!(stats.pending_embeddings, 1);
}

#[tokio::test]
async fn re_observing_the_same_window_deduplicates() {
    let tree = single_message_tree("acme — #general", "alice", "deploy finished cleanly");
    let store = open_in_memory_for_tests(8).await.expect("store");
    let coordinator = IngestionCoordinator::new(store.clone(), &Config::default());

    for _ in 0..3 {
        let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
        let snapshot = parser.parse().await.expect("parse ok").expect("snapshot present");
        coordinator.ingest_snapshot(snapshot).await.expect("ingest");
    }

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.message_count, 1, "dedup must collapse repeated observations to one row");
}

#[tokio::test]
async fn reaction_count_change_is_merged_without_new_row() {
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
            .with_attribute("content", "shipped the fix")
            .with_attribute("reactions", "🎉:1"),
        Some(list),
    );
    tree.set_focused(window);

    let store = open_in_memory_for_tests(8).await.expect("store");
    let coordinator = IngestionCoordinator::new(store.clone(), &Config::default());
    let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
    let snapshot = parser.parse().await.expect("parse ok").expect("snapshot");
    coordinator.ingest_snapshot(snapshot).await.expect("first ingest");

    // Simulate the reaction count growing on a later tick.
    let mut tree2 = MockTree::new();
    let window2 = tree2.insert(
        MockElement::new("AXWindow")
            .with_attribute("title", "acme — #general")
            .with_attribute("channel_type", "public"),
        None,
    );
    let list2 = tree2.insert(MockElement::new("AXList"), Some(window2));
    tree2.insert(
        MockElement::new("AXGroup")
            .with_attribute("sender", "alice")
            .with_attribute("content", "shipped the fix")
            .with_attribute("reactions", "🎉:4"),
        Some(list2),
    );
    tree2.set_focused(window2);
    let parser2 = ConversationParser::new(&tree2, 1_000, 1_000_000);
    let snapshot2 = parser2.parse().await.expect("parse ok").expect("snapshot");
    let summary = coordinator.ingest_snapshot(snapshot2).await.expect("second ingest");

    assert_eq!(summary.reactions_updated, 1);
    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.message_count, 1);
}

#[tokio::test]
async fn embedding_sweep_clears_pending_and_enables_semantic_search() {
    let tree = single_message_tree("acme — #incidents", "bob", "the database connection pool exhausted");
    let store = open_in_memory_for_tests(8).await.expect("store");
    let coordinator = IngestionCoordinator::new(store.clone(), &Config::default());
    let parser = ConversationParser::new(&tree, 1_000, 1_000_000);
    let snapshot = parser.parse().await.expect("parse ok").expect("snapshot");
    coordinator.ingest_snapshot(snapshot).await.expect("ingest");

    let gateway: Arc<dyn EmbeddingGateway> = Arc::new(FixtureGateway::new(8));
    let pending = store.pending_embeddings(10).await.expect("pending");
    assert_eq!(pending.len(), 1);
    let vectors = gateway
        .embed_batch(&pending.iter().map(|p| p.content.clone()).collect::<Vec<_>>())
        .await
        .expect("embed");
    for (item, vector) in pending.iter().zip(vectors) {
        store.mark_embedded(item.message_id, vector).await.expect("mark embedded");
    }

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.pending_embeddings, 0);

    let hits = hybrid_search(&store, gateway.as_ref(), "database connection pool", 5, 0.6, 0.4)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].sender, "bob");
}

#[tokio::test]
async fn channel_listing_reflects_multiple_workspaces() {
    let store = open_in_memory_for_tests(8).await.expect("store");
    let coordinator = IngestionCoordinator::new(store.clone(), &Config::default());

    let acme_tree = single_message_tree("acme — #general", "alice", "morning all");
    let beta_tree = single_message_tree("beta — #random", "carol", "coffee run?");

    for tree in [&acme_tree, &beta_tree] {
        let parser = ConversationParser::new(tree, 1_000, 1_000_000);
        let snapshot = parser.parse().await.expect("parse ok").expect("snapshot");
        coordinator.ingest_snapshot(snapshot).await.expect("ingest");
    }

    let all_channels = store.channels(None).await.expect("channels");
    assert_eq!(all_channels.len(), 2);

    let acme_only = store.channels(Some("acme".to_string())).await.expect("channels");
    assert_eq!(acme_only.len(), 1);
    assert_eq!(acme_only[0].name, "general");
}

#[tokio::test]
async fn search_from_hint_filters_by_sender() {
    let store = open_in_memory_for_tests(8).await.expect("store");
    let coordinator = IngestionCoordinator::new(store.clone(), &Config::default());

    let alice_tree = single_message_tree("acme — #general", "alice", "the rollout is complete");
    let parser = ConversationParser::new(&alice_tree, 1_000, 1_000_000);
    let snapshot = parser.parse().await.expect("parse ok").expect("snapshot");
    coordinator.ingest_snapshot(snapshot).await.expect("ingest");

    let gateway: Arc<dyn EmbeddingGateway> = Arc::new(FixtureGateway::new(8));
    let hits = hybrid_search(&store, gateway.as_ref(), "from:alice rollout", 5, 0.6, 0.4)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].sender, "alice");

    let no_hits = hybrid_search(&store, gateway.as_ref(), "from:carol rollout", 5, 0.6, 0.4)
        .await
        .expect("search");
    assert!(no_hits.is_empty());
}
