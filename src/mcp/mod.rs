// src/mcp/mod.rs
// Tool Surface (C8, spec §6): an MCP server over stdio, grounded in the
// teacher's `MiraServer`/`tool_router` pattern. Every tool call is bounded
// by the configured query deadline and the process-wide resource monitor.

pub mod responses;
mod tools;

use crate::config::Config;
use crate::db::store::Store;
use crate::embeddings::EmbeddingGateway;
use crate::error::SlunkError;
use crate::resource::ResourceMonitor;
use rmcp::handler::server::router::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam, ServerCapabilities,
    ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{schemars, tool, tool_router, ErrorData, ServerHandler};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// MCP server state: the durable store, the active embedding gateway, the
/// resolved config, and the in-flight cap (spec §4.8).
#[derive(Clone)]
pub struct SlunkServer {
    store: Store,
    embeddings: Arc<dyn EmbeddingGateway>,
    config: Config,
    resource: ResourceMonitor,
    tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

impl SlunkServer {
    pub fn new(store: Store, embeddings: Arc<dyn EmbeddingGateway>, config: Config) -> Self {
        let resource = ResourceMonitor::new(config.max_in_flight);
        Self {
            store,
            embeddings,
            config,
            resource,
            tool_router: Self::tool_router(),
        }
    }

    fn query_deadline(&self) -> Duration {
        Duration::from_millis(self.config.deadlines.query_ms)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, String>
    where
        F: std::future::Future<Output = crate::error::Result<T>>,
    {
        let _permit = self.resource.try_acquire().map_err(tool_error)?;
        match tokio::time::timeout(self.query_deadline(), fut).await {
            Ok(result) => result.map_err(tool_error),
            Err(_) => Err(tool_error(SlunkError::Timeout(self.query_deadline()))),
        }
    }
}

/// Serialize a `SlunkError` into the wire error payload spec §6/§7 require:
/// the numeric domain code plus one to three suggested next actions,
/// alongside the one-line message. `#[tool]` methods here carry their error
/// as a bare `String` (the teacher's own `MiraError` pattern), so this is
/// the one place that needs to stay in sync with `error.rs`'s taxonomy.
fn tool_error(err: SlunkError) -> String {
    let payload = serde_json::json!({
        "code": err.code(),
        "message": err.to_user_string(),
        "suggested_actions": err.suggested_actions(),
    });
    payload.to_string()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchMessagesRequest {
    #[schemars(description = "Free-text query; supports from:/in:/since:/until:/last-N-units hints")]
    pub query: String,
    #[schemars(description = "Max results (default 20, max 200)")]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchConversationsRequest {
    #[schemars(description = "Free-text query, same hint syntax as search_messages")]
    pub query: String,
    #[schemars(description = "Max results before grouping (default 20, max 200)")]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetChannelsRequest {
    #[schemars(description = "Restrict to one workspace name")]
    pub workspace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DiscoverPatternsRequest {
    #[schemars(description = "Number of top senders/channels to return (default 10, max 100)")]
    pub limit: Option<i64>,
}

#[tool_router]
impl SlunkServer {
    #[tool(description = "Hybrid lexical+vector search over captured messages.")]
    async fn search_messages(
        &self,
        Parameters(req): Parameters<SearchMessagesRequest>,
    ) -> Result<String, String> {
        self.bounded(tools::search_messages(self, req.query, req.limit)).await
    }

    #[tool(description = "Hybrid search grouped by conversation (workspace + channel).")]
    async fn search_conversations(
        &self,
        Parameters(req): Parameters<SearchConversationsRequest>,
    ) -> Result<String, String> {
        self.bounded(tools::search_conversations(self, req.query, req.limit)).await
    }

    #[tool(description = "List known channels, optionally filtered to one workspace.")]
    async fn get_channels(
        &self,
        Parameters(req): Parameters<GetChannelsRequest>,
    ) -> Result<String, String> {
        self.bounded(tools::get_channels(self, req.workspace)).await
    }

    #[tool(description = "Summary counts: workspaces, channels, messages, pending embeddings.")]
    async fn get_stats(&self) -> Result<String, String> {
        self.bounded(tools::get_stats(self)).await
    }

    #[tool(description = "Busiest senders and channels by raw message volume.")]
    async fn discover_patterns(
        &self,
        Parameters(req): Parameters<DiscoverPatternsRequest>,
    ) -> Result<String, String> {
        self.bounded(tools::discover_patterns(self, req.limit)).await
    }
}

impl ServerHandler for SlunkServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "slunk".into(),
                title: Some("Slunk - local chat capture and search".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Slunk indexes locally observed workplace chat messages and exposes hybrid \
                 lexical+vector search over them."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let ctx = ToolCallContext::new(self, request, context);
            self.tool_router.call(ctx).await
        }
    }
}
