// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// catalogsearch command-line interface
#[derive(Parser, Debug)]
#[command(name = "catalogsearch", version, about = "Hybrid search over a metadata catalog")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<log::Level>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Run a search
    Search {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        request: RequestArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the plan for a search without running it
    Explain {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        request: RequestArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Catalog and configuration to search
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Dataset file with type definitions and entities
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Search configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Request file, optionally overridden by flags
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// JSON request file
    #[arg(short, long)]
    pub request: Option<PathBuf>,

    /// Entity type name(s), comma separated
    #[arg(short = 't', long = "type")]
    pub type_name: Option<String>,

    /// Classification name(s), comma separated
    #[arg(long)]
    pub classification: Option<String>,

    /// Free-text query
    #[arg(short, long)]
    pub query: Option<String>,

    /// Sort attribute
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub offset: Option<usize>,

    /// Leave out soft-deleted entities
    #[arg(long)]
    pub exclude_deleted: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}
