use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Error};
use rmcp::ServiceExt;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    cli::{LaunchProfile, TransportMode},
    connection::{Connector, RmcpConnector},
    lib::{
        errors::RouterError,
        telemetry::{emit_runtime_mode, RuntimeModeTelemetry},
    },
    registry::discover,
    router::RouterService,
    server::{
        config::CopilotConfig,
        runtime::{build_instructions, CopilotServer},
    },
    tools::copilot::router_error_to_error_data,
};

/// Bundles a runtime error message with an exit code and optional structured error data.
#[derive(Debug)]
pub struct RuntimeExit {
    message: String,
    exit_code: ExitCode,
    error_data: Option<rmcp::model::ErrorData>,
}

impl RuntimeExit {
    pub fn structured(error: rmcp::model::ErrorData, exit_code: ExitCode) -> Self {
        Self {
            message: error.message.to_string(),
            exit_code,
            error_data: Some(error),
        }
    }

    pub fn from_error(err: impl Into<Error>) -> Self {
        let err = err.into();
        Self {
            message: format!("{err:?}"),
            exit_code: ExitCode::FAILURE,
            error_data: None,
        }
    }

    pub fn from_router_error(err: &RouterError) -> Self {
        Self::structured(router_error_to_error_data(err), ExitCode::FAILURE)
    }

    pub fn report(self) -> ExitCode {
        if let Some(data) = self.error_data {
            if let Ok(serialized) = serde_json::to_string(&data) {
                eprintln!("{serialized}");
            } else {
                eprintln!("{}", data.message);
            }
        } else {
            eprintln!("{}", self.message);
        }
        self.exit_code
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn error_data(&self) -> Option<&rmcp::model::ErrorData> {
        self.error_data.as_ref()
    }
}

/// Discover undeclared tools, validate the registry and build the router.
pub async fn build_router_service(
    config: &CopilotConfig,
    connector: Arc<dyn Connector>,
) -> Result<Arc<RouterService>, RouterError> {
    let discovered = discover(
        config.servers.clone(),
        Arc::clone(&connector),
        config.router.connect_timeout(),
        config.router.description_policy,
    )
    .await?;
    if discovered.registry.is_empty() {
        return Err(RouterError::invalid_registry(
            "no backend servers are available after tool discovery",
        ));
    }

    let router =
        RouterService::from_discovery(discovered, connector, config.router.options()).await?;
    Ok(Arc::new(router))
}

/// Start the MCP server and select stdio/TCP based on the launch profile.
pub async fn run_server(profile: LaunchProfile, config: CopilotConfig) -> Result<(), RuntimeExit> {
    let connector: Arc<dyn Connector> = Arc::new(RmcpConnector);
    let router = build_router_service(&config, connector)
        .await
        .map_err(|err| RuntimeExit::from_router_error(&err))?;

    let instructions = build_instructions(&profile, &config, &router);
    let server = CopilotServer::new(Arc::clone(&router), instructions);

    emit_runtime_mode(&RuntimeModeTelemetry {
        transport: profile.transport.as_str(),
        host: Some(config.server.host.as_str()),
        port: Some(config.server.port),
        config_path: config.source_path.to_string_lossy().as_ref(),
        servers: router.registry().len(),
        tools: router.registry().tool_count(),
        launch_args: &profile.launch_args,
    });

    let outcome = match profile.transport {
        TransportMode::Stdio => run_stdio(server).await,
        TransportMode::Tcp => run_tcp(server, &config).await,
    };
    router.shutdown().await;
    info!(target: "mcp_copilot::runtime", "Closed backend sessions");
    outcome
}

async fn run_stdio(server: CopilotServer) -> Result<(), RuntimeExit> {
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(RuntimeExit::from_error)?;
    running.waiting().await.map_err(RuntimeExit::from_error)?;
    Ok(())
}

async fn run_tcp(server: CopilotServer, config: &CopilotConfig) -> Result<(), RuntimeExit> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind TCP port {addr}"))
        .map_err(RuntimeExit::from_error)?;
    info!(
        target: "mcp_copilot::runtime",
        transport = "tcp",
        bind_addr = %addr,
        "Started listening in TCP mode"
    );

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .with_context(|| format!("failed to accept TCP connection ({addr})"))
            .map_err(RuntimeExit::from_error)?;
        info!(
            target: "mcp_copilot::runtime",
            peer = %peer,
            "Accepted connection from MCP client"
        );
        let session = server.clone();
        tokio::spawn(async move {
            let running = match session.serve(stream).await {
                Ok(running) => running,
                Err(err) => {
                    warn!(
                        target: "mcp_copilot::runtime",
                        peer = %peer,
                        error = %err,
                        "MCP handshake with client failed"
                    );
                    return;
                }
            };
            if let Err(err) = running.waiting().await {
                warn!(
                    target: "mcp_copilot::runtime",
                    peer = %peer,
                    error = %err,
                    "MCP client session ended with an error"
                );
            }
        });
    }
}
