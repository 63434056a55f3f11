// src/ingest/mod.rs
// Ingestion Coordinator (C6, spec §4.6): the single-writer pipeline that
// turns one `ConversationSnapshot` into durable rows, plus the background
// embedding sweeper in `sweeper`.

pub mod sweeper;

use crate::config::Config;
use crate::db::store::{IngestOutcome, Store};
use crate::error::Result;
use crate::normalize::normalize;
use crate::parser::ConversationSnapshot;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-snapshot ingestion counters (spec §8 scenario outcomes: New /
/// Duplicate / Updated / dropped-at-normalize).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub new: usize,
    pub duplicate: usize,
    pub updated: usize,
    pub reactions_updated: usize,
    pub dropped: usize,
}

/// Coordinates writes so only one snapshot is ever being ingested at a time
/// (spec §4.6: "single writer; concurrent snapshots are serialized, never
/// interleaved"), even though the store itself is a connection pool.
pub struct IngestionCoordinator {
    store: Store,
    write_lock: Arc<Mutex<()>>,
    max_children: usize,
}

impl IngestionCoordinator {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
            max_children: config.max_children,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Ingest one parsed snapshot: normalize each raw message, then dedup
    /// upsert it into the store. Held behind `write_lock` so two concurrent
    /// snapshots (e.g. from two monitored windows) never race each other's
    /// transactions.
    pub async fn ingest_snapshot(&self, snapshot: ConversationSnapshot) -> Result<IngestSummary> {
        let _guard = self.write_lock.lock().await;
        let _ = self.max_children;

        let workspace_id = self.store.upsert_workspace(&snapshot.workspace).await?;
        let channel_id = self
            .store
            .upsert_channel(workspace_id, &snapshot.channel, snapshot.channel_type)
            .await?;

        let mut summary = IngestSummary::default();
        let observed_at = Utc::now();
        for raw in &snapshot.messages {
            let Some(normalized) = normalize(raw) else {
                summary.dropped += 1;
                continue;
            };
            let (_id, outcome) = self
                .store
                .ingest_message(channel_id, normalized, observed_at)
                .await?;
            match outcome {
                IngestOutcome::New => summary.new += 1,
                IngestOutcome::Duplicate => summary.duplicate += 1,
                IngestOutcome::Updated => summary.updated += 1,
                IngestOutcome::ReactionsUpdated => summary.reactions_updated += 1,
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_for_tests;
    use crate::parser::{ChannelType, MessageKind, RawMessage};

    fn snapshot_with(messages: Vec<RawMessage>) -> ConversationSnapshot {
        ConversationSnapshot {
            workspace: "acme".to_string(),
            channel: "general".to_string(),
            channel_type: ChannelType::Public,
            window_title: "acme — #general".to_string(),
            thread_parent_hint: None,
            messages,
        }
    }

    fn sample_raw(content: &str) -> RawMessage {
        RawMessage {
            sender: "alice".to_string(),
            timestamp_text: None,
            ts_source: None,
            content: content.to_string(),
            kind: MessageKind::Regular,
            thread_parent_text: None,
            reactions: vec![],
            mentions_raw: vec![],
            attachment_names: vec![],
        }
    }

    #[tokio::test]
    async fn ingests_new_messages_once() {
        let store = open_in_memory_for_tests(8).await.expect("store");
        let coordinator = IngestionCoordinator::new(store, &Config::default());
        let snapshot = snapshot_with(vec![sample_raw("hello there")]);
        let summary = coordinator.ingest_snapshot(snapshot.clone()).await.expect("ingest");
        assert_eq!(summary.new, 1);
        let summary2 = coordinator.ingest_snapshot(snapshot).await.expect("ingest again");
        assert_eq!(summary2.duplicate, 1);
    }

    #[tokio::test]
    async fn drops_short_system_messages() {
        let store = open_in_memory_for_tests(8).await.expect("store");
        let coordinator = IngestionCoordinator::new(store, &Config::default());
        let mut raw = sample_raw("bye");
        raw.kind = MessageKind::System;
        let summary = coordinator.ingest_snapshot(snapshot_with(vec![raw])).await.expect("ingest");
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.new, 0);
    }
}
