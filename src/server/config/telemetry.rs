use tracing::{debug, info};

use super::{CopilotConfig, CONFIG_ENV_KEY, DEFAULT_CONFIG_PATH};

pub fn log_env_source(path: &std::path::Path, from_env: bool) {
    if from_env {
        info!(
            target: "mcp_copilot::config",
            path = %path.display(),
            "Loading configuration using MCP_CONFIG_PATH environment variable"
        );
    } else {
        debug!(
            target: "mcp_copilot::config",
            path = %path.display(),
            env = CONFIG_ENV_KEY,
            default = DEFAULT_CONFIG_PATH,
            "MCP_CONFIG_PATH not set; using default config.toml"
        );
    }
}

pub fn log_loaded(config: &CopilotConfig) {
    let declared_tools: usize = config.servers.iter().map(|s| s.tools.len()).sum();
    info!(
        target: "mcp_copilot::config",
        path = %config.source_path.display(),
        host = %config.server.host,
        port = config.server.port,
        servers = config.servers.len(),
        declared_tools,
        pending_discovery = config.undeclared_servers().count(),
        connect_timeout_secs = config.router.connect_timeout_secs,
        call_timeout_secs = config.router.call_timeout_secs,
        description_policy = config.router.description_policy.as_str(),
        "Configuration file loaded successfully"
    );
}
