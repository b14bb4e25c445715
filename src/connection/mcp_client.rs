//! `rmcp` client sessions over child-process stdio or streamable HTTP.
use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, CallToolResult, ClientInfo, JsonObject},
    serve_client,
    service::{Peer, RoleClient, RunningService, ServiceError},
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, IntoTransport,
        StreamableHttpClientTransport, TokioChildProcess,
    },
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::process::Command;
use tracing::{debug, warn};

use super::backend::{BackendError, BackendSession, Connector};
use crate::registry::{ServerEntry, ToolEntry, TransportConfig};

/// Connector that speaks MCP to real backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmcpConnector;

#[async_trait]
impl Connector for RmcpConnector {
    async fn connect(&self, server: &ServerEntry) -> Result<Box<dyn BackendSession>, BackendError> {
        let session = match &server.transport {
            TransportConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => {
                let mut cmd = Command::new(command);
                cmd.args(args).envs(env);
                if let Some(dir) = cwd {
                    cmd.current_dir(dir);
                }
                let transport = TokioChildProcess::new(cmd).map_err(|err| {
                    BackendError::Connect(format!("failed to spawn `{command}`: {err}"))
                })?;
                RmcpSession::start(&server.name, transport).await?
            }
            TransportConfig::StreamableHttp {
                url,
                bearer_token,
                headers,
            } => {
                let mut config = StreamableHttpClientTransportConfig::with_uri(url.as_str());
                config.auth_header = bearer_token.clone();
                let client = http_client(headers)?;
                let transport = StreamableHttpClientTransport::with_client(client, config);
                RmcpSession::start(&server.name, transport).await?
            }
        };
        Ok(Box::new(session))
    }
}

/// `reqwest` client that sends `headers` on every request.
fn http_client(headers: &BTreeMap<String, String>) -> Result<reqwest::Client, BackendError> {
    let mut default_headers = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| BackendError::Connect(format!("invalid header name `{name}`: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| BackendError::Connect(format!("invalid value for header `{name}`: {err}")))?;
        default_headers.insert(name, value);
    }
    reqwest::Client::builder()
        .default_headers(default_headers)
        .build()
        .map_err(|err| BackendError::Connect(format!("failed to build HTTP client: {err}")))
}

/// Initialized `rmcp` client session.
pub struct RmcpSession {
    server_name: String,
    peer: Peer<RoleClient>,
    running: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

impl RmcpSession {
    /// Run the MCP handshake over `transport`.
    pub async fn start<T, E, A>(server_name: &str, transport: T) -> Result<Self, BackendError>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let running = serve_client(ClientInfo::default(), transport)
            .await
            .map_err(|err| BackendError::Connect(format!("MCP initialize failed: {err}")))?;
        debug!(
            target: "mcp_copilot::connection",
            server = server_name,
            "MCP handshake completed"
        );
        Ok(Self {
            server_name: server_name.to_string(),
            peer: running.peer().clone(),
            running: Mutex::new(Some(running)),
        })
    }

    fn take_running(&self) -> Option<RunningService<RoleClient, ClientInfo>> {
        match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn has_running(&self) -> bool {
        match self.running.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

fn map_service_error(err: ServiceError) -> BackendError {
    match err {
        ServiceError::McpError(error) => BackendError::Rejected(error),
        other => BackendError::Transport(other.to_string()),
    }
}

#[async_trait]
impl BackendSession for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<ToolEntry>, BackendError> {
        let tools = self.peer.list_all_tools().await.map_err(map_service_error)?;
        Ok(tools
            .into_iter()
            .map(|tool| ToolEntry {
                name: tool.name.to_string(),
                description: tool
                    .description
                    .map(|text| text.to_string())
                    .unwrap_or_default(),
                input_schema: tool.input_schema,
                server_name: self.server_name.clone(),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        tool: &str,
        params: JsonObject,
    ) -> Result<CallToolResult, BackendError> {
        self.peer
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments: Some(params),
            })
            .await
            .map_err(map_service_error)
    }

    fn is_closed(&self) -> bool {
        !self.has_running() || self.peer.is_transport_closed()
    }

    async fn close(&self) {
        let Some(running) = self.take_running() else {
            return;
        };
        if let Err(err) = running.cancel().await {
            warn!(
                target: "mcp_copilot::connection",
                server = %self.server_name,
                error = %err,
                "Backend session did not shut down cleanly"
            );
        }
    }
}
