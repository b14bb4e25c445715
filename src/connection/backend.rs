use async_trait::async_trait;
use rmcp::model::{CallToolResult, ErrorData, JsonObject};
use thiserror::Error;

use crate::registry::{ServerEntry, ToolEntry};

/// Failures surfaced by a backend connection.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The session could not be established.
    #[error("{0}")]
    Connect(String),
    /// The backend answered with an MCP error.
    #[error("backend returned error {}: {}", .0.code.0, .0.message)]
    Rejected(ErrorData),
    /// The transport broke while a request was in flight.
    #[error("{0}")]
    Transport(String),
}

/// A live MCP client session to one backend server.
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Enumerate the backend's tools.
    async fn list_tools(&self) -> Result<Vec<ToolEntry>, BackendError>;

    /// Call `tool` with `params` and return the backend's result verbatim.
    async fn call_tool(
        &self,
        tool: &str,
        params: JsonObject,
    ) -> Result<CallToolResult, BackendError>;

    /// Whether the underlying transport is gone.
    fn is_closed(&self) -> bool;

    /// Tear the session down; further calls fail with a transport error.
    async fn close(&self);
}

/// Opens sessions from a server's transport configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, server: &ServerEntry) -> Result<Box<dyn BackendSession>, BackendError>;
}
