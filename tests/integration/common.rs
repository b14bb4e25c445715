use std::{
    collections::{HashMap, HashSet},
    io,
    path::PathBuf,
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::{
        CallToolRequestParam, CallToolResult, ClientInfo, ErrorCode, ErrorData, JsonObject,
        ServerCapabilities, ServerInfo,
    },
    serve_client,
    service::{RoleClient, RunningService, ServiceError},
    tool, tool_handler, tool_router, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf},
    process::{Child, ChildStdin, ChildStdout, Command},
    task::JoinHandle,
};

use mcp_copilot::{
    connection::{BackendError, BackendSession, Connector, RmcpSession},
    registry::{
        empty_object_schema, DescriptionPolicy, ServerEntry, ServerRegistry, TransportConfig,
    },
    router::{RouterOptions, RouterService},
    server::runtime::CopilotServer,
};

pub const BINARY_PATH: &str = env!("CARGO_BIN_EXE_mcp-copilot");

pub type CopilotClient = RunningService<RoleClient, ClientInfo>;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForecastRequest {
    /// City to forecast.
    pub city: String,
}

/// In-process stand-in for a weather MCP server.
#[derive(Clone)]
pub struct WeatherBackend {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WeatherBackend {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get the weather forecast for a city")]
    async fn get_forecast(
        &self,
        Parameters(request): Parameters<ForecastRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::structured(json!({
            "city": request.city,
            "forecast": "sunny",
        })))
    }

    #[tool(description = "Get active severe weather alerts")]
    async fn get_alerts(&self) -> Result<CallToolResult, ErrorData> {
        Err(ErrorData::new(
            ErrorCode(-32042),
            "alerts feed unavailable",
            Some(json!({ "feed": "severe-weather" })),
        ))
    }
}

#[tool_handler]
impl ServerHandler for WeatherBackend {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..ServerInfo::default()
        }
    }
}

/// In-process stand-in for a calendar MCP server.
#[derive(Clone)]
pub struct CalendarBackend {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CalendarBackend {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List upcoming calendar events")]
    async fn list_events(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::structured(json!({ "events": ["standup"] })))
    }

    #[tool(description = "Schedule a meeting")]
    async fn create_event(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::structured(json!({ "created": true })))
    }
}

#[tool_handler]
impl ServerHandler for CalendarBackend {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..ServerInfo::default()
        }
    }
}

/// Connector that serves the in-process backends over `tokio::io::duplex`.
#[derive(Default)]
pub struct DuplexConnector {
    connects: Mutex<HashMap<String, usize>>,
    unreachable: HashSet<String>,
    delay: Option<Duration>,
}

impl DuplexConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(mut self, server: &str) -> Self {
        self.unreachable.insert(server.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn connects(&self, server: &str) -> usize {
        self.connects
            .lock()
            .expect("connect counter lock")
            .get(server)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(&self, server: &ServerEntry) -> Result<Box<dyn BackendSession>, BackendError> {
        *self
            .connects
            .lock()
            .expect("connect counter lock")
            .entry(server.name.clone())
            .or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.contains(&server.name) {
            return Err(BackendError::Connect("connection refused".into()));
        }

        let (backend_io, client_io) = tokio::io::duplex(4096);
        match server.name.as_str() {
            "weather" | "notes" => spawn_backend(WeatherBackend::new(), backend_io),
            "calendar" => spawn_backend(CalendarBackend::new(), backend_io),
            other => {
                return Err(BackendError::Connect(format!(
                    "no in-process backend named `{other}`"
                )))
            }
        }
        let session = RmcpSession::start(&server.name, client_io).await?;
        Ok(Box::new(session))
    }
}

fn spawn_backend<S>(backend: S, io: DuplexStream)
where
    S: ServerHandler,
{
    tokio::spawn(async move {
        if let Ok(running) = backend.serve(io).await {
            let _ = running.waiting().await;
        }
    });
}

pub fn stdio(command: &str) -> TransportConfig {
    TransportConfig::stdio(command, Vec::new())
}

pub fn forecast_schema() -> JsonObject {
    let mut schema = empty_object_schema();
    schema.insert(
        "properties".into(),
        json!({ "city": { "type": "string" } }),
    );
    schema.insert("required".into(), json!(["city"]));
    schema
}

/// Weather and calendar servers with declared tools; calendar's description is
/// synthesized from its tools.
pub fn servers() -> Vec<ServerEntry> {
    vec![
        ServerEntry::new(
            "weather",
            Some("Weather forecasts and alerts".into()),
            stdio("weather-mcp"),
        )
        .with_tool(
            "get_forecast",
            "Get the weather forecast for a city",
            forecast_schema(),
        )
        .with_tool(
            "get_alerts",
            "Get active severe weather alerts",
            empty_object_schema(),
        ),
        ServerEntry::new("calendar", None, stdio("calendar-mcp"))
        .with_tool(
            "list_events",
            "List upcoming calendar events",
            empty_object_schema(),
        )
        .with_tool("create_event", "Schedule a meeting", empty_object_schema()),
    ]
}

pub fn router_service(connector: Arc<DuplexConnector>) -> Arc<RouterService> {
    let registry = ServerRegistry::new(servers(), DescriptionPolicy::Synthesize)
        .expect("fixture registry is valid");
    Arc::new(RouterService::new(
        registry,
        connector,
        RouterOptions::default(),
    ))
}

/// Serve a [`CopilotServer`] in-process and connect an MCP client to it.
pub async fn start_copilot(
    router: Arc<RouterService>,
) -> Result<(CopilotClient, JoinHandle<Result<()>>)> {
    let server = CopilotServer::new(router, "copilot-integration".into());
    let (server_transport, client_transport) = tokio::io::duplex(4096);
    let server_task = tokio::spawn(async move {
        server.serve(server_transport).await?.waiting().await?;
        Result::<_, anyhow::Error>::Ok(())
    });
    let client = serve_client(ClientInfo::default(), client_transport).await?;
    Ok((client, server_task))
}

pub async fn call(
    client: &CopilotClient,
    tool: &str,
    arguments: Value,
) -> Result<CallToolResult, ServiceError> {
    client
        .call_tool(CallToolRequestParam {
            name: tool.to_string().into(),
            arguments: arguments.as_object().cloned(),
        })
        .await
}

pub fn error_data(err: ServiceError) -> (ErrorData, Map<String, Value>) {
    match err {
        ServiceError::McpError(error) => {
            let data = error
                .data
                .as_ref()
                .and_then(Value::as_object)
                .cloned()
                .expect("error data is an object");
            (error, data)
        }
        other => panic!("Unexpected error: {other:?}"),
    }
}

pub async fn spawn_server_process() -> Result<(Child, ChildIoBridge, Option<JoinHandle<()>>)> {
    let mut command = Command::new(BINARY_PATH);
    command
        .env(
            "MCP_CONFIG_PATH",
            fixture("tests/fixtures/config_runtime.toml"),
        )
        .env("RUST_LOG", "mcp_copilot=debug")
        .stdout(Stdio::piped())
        .stdin(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().context("failed to spawn server process")?;
    let stdout = child.stdout.take().context("child stdout")?;
    let stdin = child.stdin.take().context("child stdin")?;
    let bridge = ChildIoBridge::new(stdout, stdin);
    let stderr_handle = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
        })
    });
    Ok((child, bridge, stderr_handle))
}

pub fn fixture(relative: &str) -> String {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.join(relative).display().to_string()
}

/// Joins a child's stdout and stdin into one MCP transport.
pub struct ChildIoBridge {
    stdout: ChildStdout,
    stdin: ChildStdin,
}

impl ChildIoBridge {
    pub fn new(stdout: ChildStdout, stdin: ChildStdin) -> Self {
        Self { stdout, stdin }
    }
}

impl AsyncRead for ChildIoBridge {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ChildIoBridge {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        data: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        std::pin::Pin::new(&mut self.stdin).poll_write(cx, data)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}
