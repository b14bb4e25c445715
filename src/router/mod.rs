//! The three operations the meta-server exposes, composed from ranking and
//! connection management.
use std::{sync::Arc, time::Duration};

use rmcp::model::{CallToolResult, JsonObject};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::debug;

use crate::{
    connection::{
        ConnectionManager, Connector, SessionTimeouts, DEFAULT_CALL_TIMEOUT,
        DEFAULT_CONNECT_TIMEOUT,
    },
    lib::errors::RouterError,
    registry::{DiscoveredRegistry, ServerRegistry},
    search::{rank, RegistryIndices, TopK},
};

/// Tunables the router takes from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterOptions {
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    /// Prefix each tool document with its server name.
    pub qualify_tool_text: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            qualify_tool_text: true,
        }
    }
}

/// One ranked backend server.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ServerMatch {
    pub name: String,
    pub score: f64,
    pub description: String,
}

/// One ranked tool with what an agent needs to call it.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ToolMatch {
    pub server_name: String,
    pub tool_name: String,
    pub score: f64,
    pub description: String,
    pub input_schema: JsonObject,
}

/// Registry, indices and live sessions behind `router-servers`, `route-tools`
/// and `execute-tool`.
pub struct RouterService {
    registry: Arc<ServerRegistry>,
    indices: RegistryIndices,
    connections: ConnectionManager,
}

impl RouterService {
    pub fn new(
        registry: ServerRegistry,
        connector: Arc<dyn Connector>,
        options: RouterOptions,
    ) -> Self {
        let registry = Arc::new(registry);
        let indices = RegistryIndices::build(&registry, options.qualify_tool_text);
        debug!(
            target: "mcp_copilot::router",
            servers = indices.servers.len(),
            tools = indices.tools.len(),
            "Built search indices"
        );
        let connections = ConnectionManager::new(
            Arc::clone(&registry),
            connector,
            SessionTimeouts {
                connect: options.connect_timeout,
                call: options.call_timeout,
            },
        );
        Self {
            registry,
            indices,
            connections,
        }
    }

    /// Build from a discovery result, reusing the sessions it opened.
    pub async fn from_discovery(
        discovered: DiscoveredRegistry,
        connector: Arc<dyn Connector>,
        options: RouterOptions,
    ) -> Result<Self, RouterError> {
        let DiscoveredRegistry { registry, sessions } = discovered;
        let service = Self::new(registry, connector, options);
        for (server_name, session) in sessions {
            service.connections.adopt(&server_name, session).await?;
        }
        Ok(service)
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Rank backend servers for `query`.
    pub fn route_servers(
        &self,
        query: &str,
        top_k: Option<i64>,
    ) -> Result<Vec<ServerMatch>, RouterError> {
        let top_k = TopK::from_request(top_k)?;
        let matches: Vec<_> = rank(&self.indices.servers, query, top_k)
            .into_iter()
            .filter_map(|result| {
                let server = self.registry.server_at(result.doc_id)?;
                Some(ServerMatch {
                    name: server.name.clone(),
                    score: result.score,
                    description: server.description.clone(),
                })
            })
            .collect();
        debug!(
            target: "mcp_copilot::router",
            query,
            top_k = top_k.get(),
            matches = matches.len(),
            "Ranked servers"
        );
        Ok(matches)
    }

    /// Rank tools across every backend for `query`.
    pub fn route_tools(
        &self,
        query: &str,
        top_k: Option<i64>,
    ) -> Result<Vec<ToolMatch>, RouterError> {
        let top_k = TopK::from_request(top_k)?;
        let matches: Vec<_> = rank(&self.indices.tools, query, top_k)
            .into_iter()
            .filter_map(|result| {
                let tool = self.registry.tool_at(result.doc_id)?;
                Some(ToolMatch {
                    server_name: tool.server_name.clone(),
                    tool_name: tool.name.clone(),
                    score: result.score,
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.as_ref().clone(),
                })
            })
            .collect();
        debug!(
            target: "mcp_copilot::router",
            query,
            top_k = top_k.get(),
            matches = matches.len(),
            "Ranked tools"
        );
        Ok(matches)
    }

    /// Run `tool_name` on `server_name` and return the backend's result verbatim.
    pub async fn execute_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        params: Option<JsonObject>,
    ) -> Result<CallToolResult, RouterError> {
        self.connections.invoke(server_name, tool_name, params).await
    }

    /// Close every backend session.
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
    }
}
