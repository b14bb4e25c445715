//! Backend MCP sessions: lazy establishment, per-server isolation, and call proxying.
mod backend;
mod manager;
mod mcp_client;
mod session;

pub use backend::{BackendError, BackendSession, Connector};
pub use manager::{
    ConnectionManager, SessionTimeouts, DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
};
pub use mcp_client::{RmcpConnector, RmcpSession};
pub use session::{SessionHandle, SessionStatus};
