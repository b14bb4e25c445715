//! Tool surfaces registered on the MCP server.

pub mod copilot;
