//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paginated, authenticated API client
#[derive(Parser, Debug)]
#[command(name = "wrapkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source name (built-in) or definition file (YAML)
    #[arg(short, long, global = true)]
    pub source: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List built-in sources
    List,

    /// Validate a source definition
    Validate,

    /// List the listings of a source
    Listings,

    /// Test connection and credentials
    Check {
        /// Inline config JSON
        #[arg(long)]
        config_json: Option<String>,
    },

    /// Drain a listing and print its records
    Drain {
        /// Listing name
        listing: String,

        /// Inline config JSON
        #[arg(long)]
        config_json: Option<String>,

        /// Stop after this many records
        #[arg(long)]
        max_records: Option<usize>,

        /// Records per page
        #[arg(long)]
        page_size: Option<u32>,

        /// Listing parameter or filter (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Fetch single resources by path
    Fetch {
        /// Resource paths, relative to the source's base URL
        #[arg(required = true)]
        paths: Vec<String>,

        /// Inline config JSON
        #[arg(long)]
        config_json: Option<String>,

        /// Report failed items and continue
        #[arg(long)]
        skip_failures: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}
