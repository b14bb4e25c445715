use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use rmcp::model::JsonObject;
use serde::Deserialize;

use crate::{
    lib::errors::ConfigError,
    registry::{empty_object_schema, ServerEntry, TransportConfig},
};

/// One `[[servers]]` table, or one `mcpServers` entry, as written in the file.
#[derive(Debug, Deserialize, Default)]
pub struct RawBackendSection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub cwd: Option<PathBuf>,
    pub url: Option<String>,
    pub bearer_token: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub tools: Option<Vec<RawToolSection>>,
}

/// One `[[servers.tools]]` table.
#[derive(Debug, Deserialize, Default)]
pub struct RawToolSection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub input_schema: Option<JsonObject>,
}

/// Turn `[[servers]]` into registry entries, in file order.
///
/// Cross-entry rules (unique names) are left to the registry.
pub fn parse_servers_section(
    raw: Option<Vec<RawBackendSection>>,
    path: &Path,
) -> Result<Vec<ServerEntry>, ConfigError> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        return Err(ConfigError::MissingField {
            path: path.to_path_buf(),
            field: "servers".into(),
        });
    }

    raw.into_iter()
        .enumerate()
        .map(|(index, mut backend)| {
            let prefix = format!("servers[{index}]");
            let name = required_text(backend.name.take(), path, &prefix, "name")?;
            parse_backend(name, backend, path, &prefix)
        })
        .collect()
}

/// Turn an `mcpServers` map (the shape MCP clients write to `config.json`) into
/// registry entries named after their keys, in key order.
pub fn parse_mcp_servers_section(
    raw: BTreeMap<String, RawBackendSection>,
    path: &Path,
) -> Result<Vec<ServerEntry>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::MissingField {
            path: path.to_path_buf(),
            field: "mcpServers".into(),
        });
    }

    raw.into_iter()
        .map(|(key, backend)| {
            let prefix = format!("mcpServers.{key}");
            let name = required_text(Some(key), path, &prefix, "name")?;
            parse_backend(name, backend, path, &prefix)
        })
        .collect()
}

fn parse_backend(
    name: String,
    raw: RawBackendSection,
    path: &Path,
    prefix: &str,
) -> Result<ServerEntry, ConfigError> {
    let transport = parse_transport(&raw, path, prefix)?;

    let description = raw
        .description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    let mut server = ServerEntry::new(name, description, transport);

    for (tool_index, tool) in raw.tools.unwrap_or_default().into_iter().enumerate() {
        let tool_prefix = format!("{prefix}.tools[{tool_index}]");
        let tool_name = required_text(tool.name, path, &tool_prefix, "name")?;
        let schema = tool.input_schema.unwrap_or_else(empty_object_schema);
        server = server.with_tool(tool_name, tool.description.unwrap_or_default(), schema);
    }

    Ok(server)
}

fn parse_transport(
    raw: &RawBackendSection,
    path: &Path,
    prefix: &str,
) -> Result<TransportConfig, ConfigError> {
    let invalid = |field: &str, message: &str| ConfigError::InvalidField {
        path: path.to_path_buf(),
        field: format!("{prefix}.{field}"),
        message: message.to_string(),
    };

    match (raw.command.as_deref(), raw.url.as_deref()) {
        (Some(_), Some(_)) => Err(invalid(
            "url",
            "Set either `command` or `url`, not both",
        )),
        (None, None) => Err(ConfigError::MissingField {
            path: path.to_path_buf(),
            field: format!("{prefix}.command"),
        }),
        (Some(command), None) => {
            if command.trim().is_empty() {
                return Err(invalid("command", "Command must not be blank"));
            }
            if raw.bearer_token.is_some() {
                return Err(invalid(
                    "bearer_token",
                    "Bearer tokens apply to `url` servers only",
                ));
            }
            if raw.headers.is_some() {
                return Err(invalid("headers", "Headers apply to `url` servers only"));
            }
            Ok(TransportConfig::Stdio {
                command: command.to_string(),
                args: raw.args.clone().unwrap_or_default(),
                env: raw.env.clone().unwrap_or_default(),
                cwd: raw.cwd.clone(),
            })
        }
        (None, Some(url)) => {
            let url = url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid("url", "Use an http:// or https:// URL"));
            }
            if raw.args.is_some() || raw.env.is_some() || raw.cwd.is_some() {
                return Err(invalid(
                    "url",
                    "`args`, `env` and `cwd` apply to `command` servers only",
                ));
            }
            let bearer_token = raw
                .bearer_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            let headers = raw.headers.clone().unwrap_or_default();
            for (header, value) in &headers {
                let name = HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
                    invalid(
                        &format!("headers.{header}"),
                        "Not a valid HTTP header name",
                    )
                })?;
                if HeaderValue::from_str(value).is_err() {
                    return Err(invalid(
                        &format!("headers.{header}"),
                        "Not a valid HTTP header value",
                    ));
                }
                if name == AUTHORIZATION && bearer_token.is_some() {
                    return Err(invalid(
                        &format!("headers.{header}"),
                        "Set either `bearer_token` or an Authorization header, not both",
                    ));
                }
            }
            Ok(TransportConfig::StreamableHttp {
                url: url.to_string(),
                bearer_token,
                headers,
            })
        }
    }
}

fn required_text(
    value: Option<String>,
    path: &Path,
    prefix: &str,
    field: &str,
) -> Result<String, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingField {
        path: path.to_path_buf(),
        field: format!("{prefix}.{field}"),
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: format!("{prefix}.{field}"),
            message: "Must not be blank".into(),
        });
    }
    Ok(trimmed.to_string())
}
