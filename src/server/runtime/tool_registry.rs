use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::{CallToolResult, ErrorData, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, Json,
};

use crate::{
    router::RouterService,
    tools::copilot::{
        router_error_to_error_data, ExecuteToolRequest, RouteQueryRequest, RouteServersResponse,
        RouteToolsResponse,
    },
};

/// MCP handler exposing the routing tools over one shared [`RouterService`].
///
/// Cloned per TCP connection; every clone shares the same sessions.
#[derive(Clone)]
pub struct CopilotServer {
    router: Arc<RouterService>,
    instructions: Arc<String>,
    tool_router: ToolRouter<Self>,
}

impl CopilotServer {
    pub fn new(router: Arc<RouterService>, instructions: String) -> Self {
        Self {
            router,
            instructions: Arc::new(instructions),
            tool_router: Self::tool_router(),
        }
    }

    pub fn router(&self) -> &RouterService {
        &self.router
    }
}

#[tool_router(router = tool_router)]
impl CopilotServer {
    #[tool(
        name = "router-servers",
        description = "Route user query to appropriate servers. Use this when you need to find suitable servers that can handle the user's query. This should be your first step when processing a new query to determine which specialized servers are most relevant."
    )]
    async fn route_servers(
        &self,
        Parameters(request): Parameters<RouteQueryRequest>,
    ) -> Result<Json<RouteServersResponse>, ErrorData> {
        self.router
            .route_servers(&request.query, request.top_k)
            .map(|servers| Json(RouteServersResponse { servers }))
            .map_err(|err| router_error_to_error_data(&err))
    }

    #[tool(
        name = "route-tools",
        description = "Route user query to appropriate tools across all servers. Use this when you need to find specific tools that can address the user's request, regardless of which server hosts them. This is helpful when you know the task type but not which server handles it."
    )]
    async fn route_tools(
        &self,
        Parameters(request): Parameters<RouteQueryRequest>,
    ) -> Result<Json<RouteToolsResponse>, ErrorData> {
        self.router
            .route_tools(&request.query, request.top_k)
            .map(|tools| Json(RouteToolsResponse { tools }))
            .map_err(|err| router_error_to_error_data(&err))
    }

    #[tool(
        name = "execute-tool",
        description = "Execute a specific tool on a specific server based on previous routing results. Use this after you've identified the appropriate server and tool using the routing tools. This actually performs the requested operation."
    )]
    async fn execute_tool(
        &self,
        Parameters(request): Parameters<ExecuteToolRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.router
            .execute_tool(&request.server_name, &request.tool_name, request.params)
            .await
            .map_err(|err| router_error_to_error_data(&err))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for CopilotServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some((*self.instructions).clone()),
            ..ServerInfo::default()
        }
    }
}
