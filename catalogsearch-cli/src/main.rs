// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! catalogsearch CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments first to get log level
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        // Default to Warn (can still be overridden by RUST_LOG env var)
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::Version => {
            println!(
                "{} {}",
                catalogsearch::CRATE_NAME.bold().green(),
                catalogsearch::VERSION
            );
            println!("Hybrid graph/index search for metadata catalogs");
            Ok(())
        }

        Commands::Search {
            source,
            request,
            format,
        } => cli::handle_search(source, request, format).await,

        Commands::Explain {
            source,
            request,
            format,
        } => cli::handle_explain(source, request, format),
    }
}
