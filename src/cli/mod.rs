//! CLI module
//!
//! Command-line interface for exercising sources.
//!
//! # Commands
//!
//! - `list` - Built-in sources
//! - `validate` - Check a source definition
//! - `listings` - Listings and config fields of a source
//! - `check` - Test connection and credentials
//! - `drain` - Print every record of a listing
//! - `fetch` - Fetch single resources by path

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;

use tracing_subscriber::EnvFilter;

/// Log filter for the binary
///
/// A non-empty, parseable `rust_log` (the `RUST_LOG` value) is used as is. Otherwise
/// the level is INFO, or DEBUG when `verbose`.
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
