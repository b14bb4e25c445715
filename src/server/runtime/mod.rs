//! MCP server startup and tool registration.
mod server_info;
mod startup;
mod tool_registry;

pub use server_info::build_instructions;
pub use startup::{build_router_service, run_server, RuntimeExit};
pub use tool_registry::CopilotServer;
