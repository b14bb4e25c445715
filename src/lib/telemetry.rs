//! Telemetry initialization and backend call span helpers.

use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, info_span, Span};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Initialize `tracing` and format developer logs.
///
/// Logs go to stderr so the stdio MCP transport keeps stdout to itself.
pub fn init_tracing() -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}

/// Span helper recording the start and outcome of one proxied tool call.
pub struct CallSpan {
    span: Span,
    started_at: Instant,
    call_id: Uuid,
}

impl CallSpan {
    /// Start a call span.
    pub fn start(server: &str, tool: &str) -> Self {
        let call_id = Uuid::new_v4();
        let span = info_span!(
            target: "mcp_copilot::connection",
            "backend_call",
            %call_id,
            server,
            tool
        );
        Self {
            span,
            started_at: Instant::now(),
            call_id,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Close the span while recording the outcome.
    pub fn finish(self, status: &'static str) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        let _entered = self.span.enter();
        info!(
            target: "mcp_copilot::connection",
            call_id = %self.call_id,
            status = status,
            elapsed_ms = elapsed_ms,
            "Completed backend tool call"
        );
    }
}

/// Payload for logging MCP runtime state as structured telemetry.
#[derive(Debug, Serialize)]
pub struct RuntimeModeTelemetry<'a> {
    pub transport: &'a str,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub config_path: &'a str,
    pub servers: usize,
    pub tools: usize,
    pub launch_args: &'a [String],
}

/// Emit runtime mode to `tracing`.
pub fn emit_runtime_mode(telemetry: &RuntimeModeTelemetry<'_>) {
    info!(
        target: "mcp_copilot::runtime",
        transport = telemetry.transport,
        host = telemetry.host.unwrap_or(""),
        port = telemetry.port.unwrap_or_default(),
        config_path = telemetry.config_path,
        servers = telemetry.servers,
        tools = telemetry.tools,
        launch_args = ?telemetry.launch_args,
        "Started MCP server"
    );
}
