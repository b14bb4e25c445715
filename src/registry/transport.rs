use std::{collections::BTreeMap, path::PathBuf};

/// How the connection manager reaches one backend server.
///
/// The registry never interprets these values; only the connector does.
#[derive(Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Spawn a child process speaking MCP over stdin/stdout.
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
    },
    /// Connect to a remote MCP endpoint over streamable HTTP.
    StreamableHttp {
        url: String,
        bearer_token: Option<String>,
        /// Extra request headers, e.g. `X-API-Key`.
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    /// Child process transport without extra environment or working directory.
    pub fn stdio(command: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self::Stdio {
            command: command.into(),
            args: args.into_iter().collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self::StreamableHttp {
            url: url.into(),
            bearer_token: None,
            headers: BTreeMap::new(),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::StreamableHttp { .. } => "streamable_http",
        }
    }

    /// Loggable endpoint; never includes environment values or tokens.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Stdio { command, .. } => command,
            Self::StreamableHttp { url, .. } => url,
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio {
                command, args, env, cwd,
            } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("env_keys", &env.keys().collect::<Vec<_>>())
                .field("cwd", cwd)
                .finish(),
            Self::StreamableHttp {
                url,
                bearer_token,
                headers,
            } => f
                .debug_struct("StreamableHttp")
                .field("url", url)
                .field("bearer_token", &bearer_token.as_ref().map(|_| "<redacted>"))
                .field("header_names", &headers.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}
