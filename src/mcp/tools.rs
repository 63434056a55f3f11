// src/mcp/tools.rs
// Tool-handler bodies (spec §6), kept separate from MCP routing the way the
// teacher splits `tools::core` away from `mcp::mod`. Each function is
// deadline-bounded by its caller in `mcp::mod` and returns a
// `SlunkError`-mapped `Result` that the router turns into an `ErrorData`.

use super::responses::*;
use crate::error::Result;
use crate::mcp::SlunkServer;
use crate::search::hybrid_search;

pub async fn search_messages(server: &SlunkServer, query: String, limit: Option<i64>) -> Result<String> {
    let limit = limit.unwrap_or(20).clamp(1, 200) as usize;
    let hits = hybrid_search(
        &server.store,
        server.embeddings.as_ref(),
        &query,
        limit,
        server.config.query_weight_semantic,
        server.config.query_weight_lexical,
    )
    .await?;

    let guidance = hits.is_empty().then_some(EMPTY_RESULTS_GUIDANCE);
    let response = SearchMessagesResponse {
        query,
        results: hits.into_iter().map(to_message_hit).collect(),
        guidance,
    };
    Ok(serde_json::to_string(&response)?)
}

pub async fn search_conversations(server: &SlunkServer, query: String, limit: Option<i64>) -> Result<String> {
    let limit = limit.unwrap_or(20).clamp(1, 200) as usize;
    let hits = hybrid_search(
        &server.store,
        server.embeddings.as_ref(),
        &query,
        limit,
        server.config.query_weight_semantic,
        server.config.query_weight_lexical,
    )
    .await?;

    let mut groups: Vec<ConversationGroup> = Vec::new();
    for hit in hits {
        let message = to_message_hit(hit.clone());
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.workspace == hit.workspace && g.channel == hit.channel)
        {
            group.hits.push(message);
        } else {
            groups.push(ConversationGroup {
                workspace: hit.workspace,
                channel: hit.channel,
                hits: vec![message],
            });
        }
    }

    let guidance = groups.is_empty().then_some(EMPTY_RESULTS_GUIDANCE);
    let response = SearchConversationsResponse { query, conversations: groups, guidance };
    Ok(serde_json::to_string(&response)?)
}

pub async fn get_channels(server: &SlunkServer, workspace: Option<String>) -> Result<String> {
    let channels = server.store.channels(workspace).await?;
    let response = ChannelsResponse {
        channels: channels
            .into_iter()
            .map(|c| ChannelSummary {
                workspace: c.workspace,
                channel: c.name,
                channel_type: c.channel_type,
                message_count: c.message_count,
            })
            .collect(),
    };
    Ok(serde_json::to_string(&response)?)
}

pub async fn get_stats(server: &SlunkServer) -> Result<String> {
    let stats = server.store.stats().await?;
    let response = StatsResponse {
        workspace_count: stats.workspace_count,
        channel_count: stats.channel_count,
        message_count: stats.message_count,
        pending_embeddings: stats.pending_embeddings,
    };
    Ok(serde_json::to_string(&response)?)
}

/// Lightweight pattern discovery: busiest senders and channels by raw
/// volume. Spec §9 leaves sophisticated pattern mining as an open question;
/// DESIGN.md records the decision to ship only the volume-based version.
pub async fn discover_patterns(server: &SlunkServer, limit: Option<i64>) -> Result<String> {
    let limit = limit.unwrap_or(10).clamp(1, 100);
    let senders = server.store.top_senders(limit).await?;
    let channels = server.store.channels(None).await?;
    let mut top_channels: Vec<(String, i64)> =
        channels.into_iter().map(|c| (c.name, c.message_count)).collect();
    top_channels.sort_by(|a, b| b.1.cmp(&a.1));
    top_channels.truncate(limit as usize);

    let response = PatternsResponse {
        top_senders: senders
            .into_iter()
            .map(|(sender, message_count)| SenderVolume { sender, message_count })
            .collect(),
        top_channels: top_channels
            .into_iter()
            .map(|(channel, message_count)| ChannelVolume { channel, message_count })
            .collect(),
    };
    Ok(serde_json::to_string(&response)?)
}

fn to_message_hit(hit: crate::search::SearchHit) -> MessageHit {
    MessageHit {
        message_id: hit.message_id,
        workspace: hit.workspace,
        channel: hit.channel,
        sender: hit.sender,
        content: hit.content,
        ts_source: hit.ts_source.map(|t| t.to_rfc3339()),
        score: hit.score,
        matched_terms: hit.matched_terms,
        snippet: hit.snippet,
        metadata: hit.metadata,
    }
}
