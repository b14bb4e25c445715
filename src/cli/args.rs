//! CLI argument definitions and `LaunchProfile` construction.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use super::{build_launch_args, resolve_config_path, LaunchProfile, TransportMode};

/// Parsed command intent from CLI.
#[derive(Debug, Clone)]
pub enum ParsedCommand {
    RunServer(LaunchProfile),
    Cli {
        profile: LaunchProfile,
        command: CliCommand,
    },
}

/// Top-level optional CLI commands.
#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Rank servers (or tools) for a query against the configured backends.
    #[command(
        about = "Rank servers or tools for a query and print the result as JSON",
        after_help = "Hint: use `mcp-copilot rank --tools \"schedule a meeting\"` to see which tool descriptions match."
    )]
    Rank(RankArgs),
}

/// Arguments for `rank`.
#[derive(Debug, Clone, Args)]
pub struct RankArgs {
    /// Natural-language query.
    pub query: String,
    /// Number of results to print.
    #[arg(long = "top-k")]
    pub top_k: Option<i64>,
    /// Rank tools instead of servers.
    #[arg(long, default_value_t = false)]
    pub tools: bool,
}

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "MCP Copilot: route requests to the right MCP server and tool",
    long_about = None
)]
pub struct LaunchProfileArgs {
    /// Select stdio (default) or tcp.
    #[arg(long, value_enum, default_value_t = TransportMode::Stdio)]
    pub transport: TransportMode,
    /// Path to config.toml (overrides MCP_CONFIG_PATH).
    #[arg(long = "config")]
    pub config_override: Option<PathBuf>,
    /// Optional CLI command mode.
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

impl LaunchProfileArgs {
    /// Build a `LaunchProfile` from CLI args and environment variables.
    pub fn build(&self) -> Result<LaunchProfile> {
        let config_path = resolve_config_path(self.config_override.clone())?;
        let launch_args = build_launch_args(self.transport, &config_path);

        Ok(LaunchProfile {
            config_path,
            transport: self.transport,
            launch_args,
        })
    }

    /// Parse CLI args into either server launch mode or utility command mode.
    pub fn into_command(self) -> Result<ParsedCommand> {
        let profile = self.build()?;
        match self.command {
            Some(command) => {
                validate_command(&command)?;
                Ok(ParsedCommand::Cli { profile, command })
            }
            None => Ok(ParsedCommand::RunServer(profile)),
        }
    }
}

fn validate_command(command: &CliCommand) -> Result<()> {
    match command {
        CliCommand::Rank(args) => {
            if matches!(args.top_k, Some(value) if value <= 0) {
                return Err(anyhow!("invalid --top-k: must be a positive integer"));
            }
        }
    }

    Ok(())
}
