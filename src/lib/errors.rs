use std::{borrow::Cow, path::PathBuf};

use config::ConfigError as ConfigLoaderError;
use rmcp::model::{ErrorCode, ErrorData};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to build (read) the configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Failed to deserialize the document into a struct.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Required field is missing.
    #[error("Configuration file {path} is missing `{field}`")]
    MissingField { path: PathBuf, field: String },
    /// Field failed validation.
    #[error("Configuration file {path} has invalid `{field}`: {message}")]
    InvalidField {
        path: PathBuf,
        field: String,
        message: String,
    },
}

impl ConfigError {
    /// Helper to wrap `config::ConfigError` as a read failure.
    pub fn from_read_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::FileRead { path, source }
    }

    /// Helper to wrap `config::ConfigError` as a parse failure.
    pub fn from_parse_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::Parse { path, source }
    }

    /// Name of the offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. } | Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Failure taxonomy shared by the registry, ranker, connection manager and router.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    #[error("Invalid server registry: {reason}")]
    InvalidRegistry { reason: String },
    #[error("Invalid argument `{field}`: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },
    #[error("Server `{server}` is not registered")]
    UnknownServer { server: String },
    #[error("Server `{server}` does not provide tool `{tool}`")]
    UnknownTool { server: String, tool: String },
    #[error("Failed to connect to server `{server}`: {cause}")]
    ConnectFailed { server: String, cause: String },
    #[error("Transport failed while calling `{tool}` on server `{server}`: {cause}")]
    TransportError {
        server: String,
        tool: String,
        cause: String,
    },
    #[error("Timed out after {timeout_ms} ms during {operation} on server `{server}`")]
    Timeout {
        server: String,
        tool: Option<String>,
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("Server `{server}` reported an error for `{tool}`: {}", .error.message)]
    ExecutionFailed {
        server: String,
        tool: String,
        error: ErrorData,
    },
}

impl RouterError {
    /// Stable machine-readable kind.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRegistry { .. } => "invalid_registry",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::UnknownServer { .. } => "unknown_server",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::ConnectFailed { .. } => "connect_failed",
            Self::TransportError { .. } => "transport_error",
            Self::Timeout { .. } => "timeout",
            Self::ExecutionFailed { .. } => "execution_failed",
        }
    }

    /// Whether calling again may succeed without changing the request.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::TransportError { .. } | Self::Timeout { .. }
        )
    }

    pub fn server_name(&self) -> Option<&str> {
        match self {
            Self::UnknownServer { server }
            | Self::UnknownTool { server, .. }
            | Self::ConnectFailed { server, .. }
            | Self::TransportError { server, .. }
            | Self::Timeout { server, .. }
            | Self::ExecutionFailed { server, .. } => Some(server),
            Self::InvalidRegistry { .. } | Self::InvalidArgument { .. } => None,
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::UnknownTool { tool, .. }
            | Self::TransportError { tool, .. }
            | Self::ExecutionFailed { tool, .. } => Some(tool),
            Self::Timeout { tool, .. } => tool.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn invalid_registry(reason: impl Into<String>) -> Self {
        Self::InvalidRegistry {
            reason: reason.into(),
        }
    }
}

/// Structured error metadata returned by MCP tools.
#[derive(Debug, Clone)]
pub struct ToolErrorDescriptor {
    /// Error code.
    pub code: &'static str,
    /// JSON-RPC error code used on the wire.
    pub rpc_code: ErrorCode,
    /// User-facing message.
    pub message: &'static str,
    /// Recommended remediation.
    pub remediation: &'static str,
}

impl ToolErrorDescriptor {
    /// Simple constructor.
    pub const fn new(
        code: &'static str,
        rpc_code: ErrorCode,
        message: &'static str,
        remediation: &'static str,
    ) -> Self {
        Self {
            code,
            rpc_code,
            message,
            remediation,
        }
    }

    /// Create a builder.
    pub fn builder(&self) -> ToolErrorDescriptorBuilder<'_> {
        ToolErrorDescriptorBuilder::new(self)
    }
}

/// Builder for error data that fails if required fields are missing.
pub struct ToolErrorDescriptorBuilder<'a> {
    descriptor: &'a ToolErrorDescriptor,
    retryable: Option<bool>,
    rpc_code: Option<ErrorCode>,
    message: Option<Cow<'static, str>>,
    details: Option<Value>,
    extra_fields: Map<String, Value>,
}

impl<'a> ToolErrorDescriptorBuilder<'a> {
    pub fn new(descriptor: &'a ToolErrorDescriptor) -> Self {
        Self {
            descriptor,
            retryable: None,
            rpc_code: None,
            message: None,
            details: None,
            extra_fields: Map::new(),
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Replace the descriptor's wire code and message, e.g. with a backend's own error.
    pub fn passthrough(mut self, code: ErrorCode, message: Cow<'static, str>) -> Self {
        self.rpc_code = Some(code);
        self.message = Some(message);
        self
    }

    pub fn with_context_field(mut self, key: &str, value: Value) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Result<ErrorData, ToolErrorBuilderError> {
        if self.descriptor.remediation.trim().is_empty() {
            return Err(ToolErrorBuilderError::MissingRemediation {
                code: self.descriptor.code,
            });
        }
        let retryable = self
            .retryable
            .ok_or(ToolErrorBuilderError::MissingRetryable {
                code: self.descriptor.code,
            })?;

        let mut data = Map::new();
        data.insert("code".into(), Value::String(self.descriptor.code.into()));
        data.insert(
            "remediation".into(),
            Value::String(self.descriptor.remediation.into()),
        );
        data.insert("retryable".into(), Value::Bool(retryable));
        if let Some(details) = self.details {
            data.insert("details".into(), details);
        }
        for (key, value) in self.extra_fields {
            data.insert(key, value);
        }

        Ok(ErrorData::new(
            self.rpc_code.unwrap_or(self.descriptor.rpc_code),
            self.message
                .unwrap_or(Cow::Borrowed(self.descriptor.message)),
            Some(Value::Object(data)),
        ))
    }
}

/// Errors when required builder fields are missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolErrorBuilderError {
    #[error("retryable is missing (code={code})")]
    MissingRetryable { code: &'static str },
    #[error("remediation is empty (code={code})")]
    MissingRemediation { code: &'static str },
}
