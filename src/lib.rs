//! Library crate root: BM25 routing over a registry of MCP servers and lazy
//! backend sessions, plus the MCP runtime that exposes them.

#[path = "lib/mod.rs"]
pub mod lib_mod;
pub use lib_mod as lib;
pub mod cli;
pub mod connection;
pub mod registry;
pub mod router;
pub mod search;
pub mod server;
pub mod tools;
