use std::borrow::Cow;

use rmcp::model::{ErrorCode, ErrorData};
use serde_json::{json, Value};

use crate::lib::errors::{RouterError, ToolErrorDescriptor};

const INVALID_REGISTRY_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "invalid_registry",
    ErrorCode::INTERNAL_ERROR,
    "The server registry is invalid",
    "Fix the [[servers]] section of the configuration file and restart the router.",
);
const INVALID_ARGUMENT_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "invalid_argument",
    ErrorCode::INVALID_PARAMS,
    "The request arguments are invalid",
    "Pass a positive integer for top_k or omit it to get 5 results.",
);
const UNKNOWN_SERVER_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "unknown_server",
    ErrorCode::INVALID_PARAMS,
    "The server is not registered",
    "Call router-servers or route-tools and use a server_name from the results.",
);
const UNKNOWN_TOOL_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "unknown_tool",
    ErrorCode::INVALID_PARAMS,
    "The server does not declare this tool",
    "Call route-tools and use a tool_name listed for this server.",
);
const CONNECT_FAILED_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "connect_failed",
    ErrorCode::INTERNAL_ERROR,
    "Could not connect to the backend server",
    "Retry later, or check the server's command/url in the configuration file.",
);
const TRANSPORT_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "transport_error",
    ErrorCode::INTERNAL_ERROR,
    "The connection to the backend server broke during the call",
    "Retry the call; the router reconnects on the next request.",
);
const TIMEOUT_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "timeout",
    ErrorCode::INTERNAL_ERROR,
    "The backend server did not answer in time",
    "Retry later or raise router.call_timeout_secs / router.connect_timeout_secs.",
);
const EXECUTION_FAILED_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "execution_failed",
    ErrorCode::INTERNAL_ERROR,
    "The backend tool reported an error",
    "Inspect backend_data and adjust params before calling the tool again.",
);

/// Map a router failure onto MCP `ErrorData` with a stable `data.code`.
///
/// Backend-reported errors keep the backend's own code and message; their
/// `data` moves under `backend_data`.
pub fn router_error_to_error_data(err: &RouterError) -> ErrorData {
    let descriptor = descriptor_for(err);
    let (rpc_code, message) = match err {
        RouterError::ExecutionFailed { error, .. } => (error.code, error.message.clone()),
        other => (descriptor.rpc_code, Cow::Owned(other.to_string())),
    };

    let mut builder = descriptor
        .builder()
        .retryable(err.is_retryable())
        .passthrough(rpc_code, message)
        .details(details_for(err));
    if let Some(server) = err.server_name() {
        builder = builder.with_context_field("server_name", json!(server));
    }
    if let Some(tool) = err.tool_name() {
        builder = builder.with_context_field("tool_name", json!(tool));
    }
    if let RouterError::ExecutionFailed { error, .. } = err {
        builder = builder.with_context_field(
            "backend_data",
            error.data.clone().unwrap_or(Value::Null),
        );
    }

    builder
        .build()
        .unwrap_or_else(|build_err| ErrorData::internal_error(build_err.to_string(), None))
}

const fn descriptor_for(err: &RouterError) -> &'static ToolErrorDescriptor {
    match err {
        RouterError::InvalidRegistry { .. } => &INVALID_REGISTRY_ERROR,
        RouterError::InvalidArgument { .. } => &INVALID_ARGUMENT_ERROR,
        RouterError::UnknownServer { .. } => &UNKNOWN_SERVER_ERROR,
        RouterError::UnknownTool { .. } => &UNKNOWN_TOOL_ERROR,
        RouterError::ConnectFailed { .. } => &CONNECT_FAILED_ERROR,
        RouterError::TransportError { .. } => &TRANSPORT_ERROR,
        RouterError::Timeout { .. } => &TIMEOUT_ERROR,
        RouterError::ExecutionFailed { .. } => &EXECUTION_FAILED_ERROR,
    }
}

fn details_for(err: &RouterError) -> Value {
    match err {
        RouterError::InvalidArgument { field, message } => {
            json!({ "field": field, "reason": message })
        }
        RouterError::ConnectFailed { cause, .. } | RouterError::TransportError { cause, .. } => {
            json!({ "cause": cause })
        }
        RouterError::Timeout {
            operation,
            timeout_ms,
            ..
        } => json!({ "operation": operation, "timeout_ms": timeout_ms }),
        other => json!({ "reason": other.to_string() }),
    }
}
