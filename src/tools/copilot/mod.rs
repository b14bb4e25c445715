//! Request and response shapes of the three routing tools.
mod errors;

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::router::{ServerMatch, ToolMatch};

pub use errors::router_error_to_error_data;

pub const ROUTE_SERVERS_TOOL: &str = "router-servers";
pub const ROUTE_TOOLS_TOOL: &str = "route-tools";
pub const EXECUTE_TOOL_TOOL: &str = "execute-tool";

/// Input of `router-servers` and `route-tools`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RouteQueryRequest {
    /// Natural-language description of what the user wants done.
    pub query: String,
    /// Number of results to return (default 5, must be positive).
    #[serde(default)]
    pub top_k: Option<i64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RouteServersResponse {
    pub servers: Vec<ServerMatch>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RouteToolsResponse {
    pub tools: Vec<ToolMatch>,
}

/// Input of `execute-tool`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ExecuteToolRequest {
    /// Backend server name as returned by `router-servers` or `route-tools`.
    pub server_name: String,
    /// Tool name on that server.
    pub tool_name: String,
    /// Arguments forwarded to the tool unchanged.
    #[serde(default)]
    pub params: Option<JsonObject>,
}
