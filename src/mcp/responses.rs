// src/mcp/responses.rs
// JSON response shapes returned by the tool surface (spec §6). Kept
// separate from the routing/logic so the wire format can be reviewed on its
// own, the way the teacher's `mira_types` crate separates wire types from
// handler code.

use serde::Serialize;
use serde_json::Value;

/// Guidance surfaced when a query's both branches come back empty (spec §7:
/// "Empty query results are not errors; they return `{results: [], guidance:
/// ...}`").
pub const EMPTY_RESULTS_GUIDANCE: &str =
    "no messages matched; try a broader query, removing filters, or a wider since:/until: range";

#[derive(Debug, Serialize)]
pub struct SearchMessagesResponse {
    pub query: String,
    pub results: Vec<MessageHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct MessageHit {
    pub message_id: i64,
    pub workspace: String,
    pub channel: String,
    pub sender: String,
    pub content: String,
    pub ts_source: Option<String>,
    pub score: f32,
    pub matched_terms: Vec<String>,
    pub snippet: String,
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
pub struct SearchConversationsResponse {
    pub query: String,
    pub conversations: Vec<ConversationGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ConversationGroup {
    pub workspace: String,
    pub channel: String,
    pub hits: Vec<MessageHit>,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChannelSummary {
    pub workspace: String,
    pub channel: String,
    pub channel_type: String,
    pub message_count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub workspace_count: i64,
    pub channel_count: i64,
    pub message_count: i64,
    pub pending_embeddings: i64,
}

#[derive(Debug, Serialize)]
pub struct PatternsResponse {
    pub top_senders: Vec<SenderVolume>,
    pub top_channels: Vec<ChannelVolume>,
}

#[derive(Debug, Serialize)]
pub struct SenderVolume {
    pub sender: String,
    pub message_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ChannelVolume {
    pub channel: String,
    pub message_count: i64,
}
