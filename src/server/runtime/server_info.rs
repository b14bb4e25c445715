use crate::{cli::LaunchProfile, router::RouterService, server::config::CopilotConfig};

/// Build the `ServerInfo.instructions` string shown to MCP clients.
pub fn build_instructions(
    profile: &LaunchProfile,
    config: &CopilotConfig,
    router: &RouterService,
) -> String {
    let registry = router.registry();
    let servers: Vec<_> = registry
        .servers()
        .iter()
        .map(|server| server.name.as_str())
        .collect();
    format!(
        "Routes requests to {server_count} MCP servers ({names}) offering {tool_count} tools. \
         Call router-servers or route-tools with the user's request first, then execute-tool \
         with a server_name and tool_name from the results. Loaded config {path} in {transport} mode.",
        server_count = registry.len(),
        names = servers.join(", "),
        tool_count = registry.tool_count(),
        path = config.source_path.display(),
        transport = profile.transport.as_str(),
    )
}
