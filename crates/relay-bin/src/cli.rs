// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Execute a task description file against a device
//! - `validate`: Check a task description file without any network activity
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Relay - task-driven OPC UA client gateway.
///
/// Accepts JSON task descriptions (read/write batches against a remote
/// device) and executes them with connection caching, bounded timeouts and
/// reconnection.
#[derive(Parser, Debug)]
#[command(
    name = "relay",
    author = "Sylvex <contact@sylvex.io>",
    version,
    about = "Task-driven OPC UA client gateway",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "RELAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "RELAY_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for log aggregation.
    Json,
    /// Minimal compact output.
    Compact,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the Relay CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Execute a task description file
    ///
    /// Reads one task description (or an array of them) from a JSON file
    /// and runs it against the device named in the description. Prints the
    /// structured task report for each.
    Run(RunArgs),

    /// Validate a task description file
    ///
    /// Parses and validates the file without touching the network. Useful
    /// for checking task descriptions before dispatch.
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

/// Arguments for the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the JSON task description file
    pub task_file: PathBuf,

    /// Task owner identity used to scope cancellation
    #[arg(short, long, default_value = "default")]
    pub owner: String,

    /// Trust server certificates without a PKI trust store
    #[arg(long)]
    pub trust_server_certs: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the JSON task description file
    pub task_file: PathBuf,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["relay", "run", "task.json", "--owner", "robot1"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.task_file, PathBuf::from("task.json"));
                assert_eq!(args.owner, "robot1");
                assert!(!args.trust_server_certs);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["relay", "version"]).unwrap();
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.log_format, LogFormat::Text);
    }
}
