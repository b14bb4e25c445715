//! CLI entrypoint module structure.
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use crate::{
    connection::{Connector, RmcpConnector},
    router::RouterService,
    server::{config::CopilotConfig, runtime::build_router_service},
};

pub mod args;
pub mod profile;

pub use args::{CliCommand, LaunchProfileArgs, ParsedCommand, RankArgs};
pub use profile::{build_launch_args, resolve_config_path, LaunchProfile, TransportMode};

/// Execute CLI command mode and return a user-facing result payload.
pub async fn execute_cli_command(profile: &LaunchProfile, command: CliCommand) -> Result<String> {
    match command {
        CliCommand::Rank(args) => {
            let config = CopilotConfig::load_from_path(profile.config_path.clone())?;
            let connector: Arc<dyn Connector> = Arc::new(RmcpConnector);
            let router = build_router_service(&config, connector)
                .await
                .context("failed to build the server registry")?;
            let payload = render_ranking(&router, &args);
            router.shutdown().await;
            payload
        }
    }
}

/// Rank with `router` and format the matches as pretty JSON.
fn render_ranking(router: &RouterService, args: &RankArgs) -> Result<String> {
    let payload = if args.tools {
        json!({
            "query": args.query,
            "tools": router.route_tools(&args.query, args.top_k)?,
        })
    } else {
        json!({
            "query": args.query,
            "servers": router.route_servers(&args.query, args.top_k)?,
        })
    };

    Ok(serde_json::to_string_pretty(&payload)?)
}
