// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shmpix CLI
//!
//! Command-line interface for exercising shared pixel buffers against the
//! in-process loopback server.

use clap::{Parser, Subcommand};

mod commands;

/// Shmpix - shared-memory pixel buffers with deferred release
#[derive(Parser)]
#[command(name = "shmpix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run upload rounds against the loopback server and verify the results
    Demo {
        /// Buffer width in pixels
        #[arg(long, default_value_t = 256)]
        width: i32,

        /// Buffer height in pixels
        #[arg(long, default_value_t = 256)]
        height: i32,

        /// Number of upload rounds
        #[arg(short, long, default_value_t = 8)]
        rounds: u32,

        /// Overlapping uploads per round
        #[arg(short = 'n', long, default_value_t = 4)]
        concurrency: u32,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Demo {
            width,
            height,
            rounds,
            concurrency,
            json,
        } => {
            let options = commands::demo::DemoOptions {
                width,
                height,
                rounds,
                concurrency,
                json,
            };
            commands::demo::execute(cli.config.as_deref(), options).await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
