//! Configuration loading and the MCP runtime that serves the routing tools.
pub mod config;
pub mod runtime;
