//! Load and validate router configuration.
use std::{collections::BTreeMap, env, path::PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::{lib::errors::ConfigError, registry::ServerEntry};

pub mod backends;
pub mod router;
pub mod server;
pub mod telemetry;

pub use backends::{
    parse_mcp_servers_section, parse_servers_section, RawBackendSection, RawToolSection,
};
pub use router::{
    parse_router_section, RawRouterSection, RouterSection, DEFAULT_CALL_TIMEOUT_SECS,
    DEFAULT_CONNECT_TIMEOUT_SECS,
};
pub use server::{parse_server_section, RawServerSection, ServerSection, DEFAULT_HOST, DEFAULT_PORT};

pub(crate) const CONFIG_ENV_KEY: &str = "MCP_CONFIG_PATH";
pub(crate) const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// Per-user fallback, relative to `$HOME`.
pub(crate) const USER_CONFIG_PATH: &str = ".config/mcp-copilot/config.json";

/// `config.toml` in the working directory, or `~/.config/mcp-copilot/config.json`
/// when only the latter exists.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.exists() {
        return local;
    }
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(USER_CONFIG_PATH))
        .filter(|path| path.exists())
        .unwrap_or(local)
}

/// Top-level configuration container.
#[derive(Debug, Clone)]
pub struct CopilotConfig {
    pub server: ServerSection,
    pub router: RouterSection,
    /// Backends in file order; tools may still be empty pending discovery.
    pub servers: Vec<ServerEntry>,
    pub source_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawCopilotConfig {
    server: Option<RawServerSection>,
    router: Option<RawRouterSection>,
    servers: Option<Vec<RawBackendSection>>,
    #[serde(rename = "mcpServers", alias = "mcp_servers")]
    mcp_servers: Option<BTreeMap<String, RawBackendSection>>,
}

impl CopilotConfig {
    /// Prefer `MCP_CONFIG_PATH` if set; otherwise read [`default_config_path`].
    pub fn load_from_env_or_default() -> Result<Self, ConfigError> {
        let (path, from_env) = match env::var(CONFIG_ENV_KEY) {
            Ok(value) if !value.trim().is_empty() => (PathBuf::from(value), true),
            _ => (default_config_path(), false),
        };

        telemetry::log_env_source(&path, from_env);
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        info!(
            target: "mcp_copilot::config",
            path = %path.display(),
            "Starting configuration load"
        );

        let builder = config::Config::builder().add_source(config::File::from(path.clone()));
        let document = builder.build().map_err(|err| {
            let error = ConfigError::from_read_error(path.clone(), err);
            error!(
                target: "mcp_copilot::config",
                path = %path.display(),
                reason = %error,
                "Failed to read configuration file"
            );
            error
        })?;

        let raw: RawCopilotConfig = document.try_deserialize().map_err(|err| {
            let error = ConfigError::from_parse_error(path.clone(), err);
            error!(
                target: "mcp_copilot::config",
                path = %path.display(),
                reason = %error,
                "Failed to parse configuration file"
            );
            error
        })?;

        let config = Self::from_raw(raw, path.clone()).map_err(|err| {
            error!(
                target: "mcp_copilot::config",
                path = %path.display(),
                reason = %err,
                "Failed to validate configuration file"
            );
            err
        })?;

        telemetry::log_loaded(&config);
        Ok(config)
    }

    fn from_raw(raw: RawCopilotConfig, path: PathBuf) -> Result<Self, ConfigError> {
        let server = parse_server_section(raw.server, &path)?;
        let router = parse_router_section(raw.router, &path)?;
        let servers = match (raw.servers, raw.mcp_servers) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidField {
                    path,
                    field: "mcpServers".into(),
                    message: "Use either `[[servers]]` or `mcpServers`, not both".into(),
                })
            }
            (None, Some(map)) => parse_mcp_servers_section(map, &path)?,
            (servers, None) => parse_servers_section(servers, &path)?,
        };

        Ok(Self {
            server,
            router,
            servers,
            source_path: path,
        })
    }

    /// Servers whose tools must be listed from the backend at startup.
    pub fn undeclared_servers(&self) -> impl Iterator<Item = &ServerEntry> + '_ {
        self.servers.iter().filter(|server| server.tools.is_empty())
    }
}
