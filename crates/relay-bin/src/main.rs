// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Relay - task-driven OPC UA client gateway.
//!
//! Main binary entry point.

mod cli;
mod commands;
mod error;
mod logging;
mod signals;

use clap::Parser;
use tracing::error;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_logging(&cli.log_level, cli.log_format);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Validate(args) => commands::validate::validate(&args),
        Commands::Version => {
            commands::version::version();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!(error = %err, "command failed");
        std::process::exit(1);
    }
}
