// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]

//! # wrapkit
//!
//! A generic core for thin clients over paginated, authenticated HTTP APIs.
//!
//! ## Features
//!
//! - **Authenticated Sessions**: API key, Basic, Bearer, query credentials,
//!   OAuth2 and session login, with proactive token refresh
//! - **Pagination Driver**: drain or stream any listing through a
//!   [`PageFetcher`](pagination::PageFetcher), with page size clamping,
//!   record limits and cancellation
//! - **Error Taxonomy**: every HTTP exchange classified into one closed
//!   [`ErrorKind`](error::ErrorKind)
//! - **Declarative Sources**: YAML definitions for Kobo, TopDesk, UniData,
//!   DHIS2, ReliefWeb, ACLED and PowerBI built in
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wrapkit::pagination::DrainOptions;
//! use wrapkit::{Result, Source};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = serde_json::json!({ "api_token": "..." });
//!     let kobo = Source::load("kobo", &config)?;
//!
//!     let status = kobo.check().await;
//!     assert!(status.ok);
//!
//!     let drained = kobo
//!         .drain("assets", &Default::default(), Some(100), DrainOptions::new().max_records(500))
//!         .await?;
//!     println!("{} assets", drained.records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Source: definition + config → client, listings, check       │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌────────────┬────────────────┴──────┬──────────────┬──────────┐
//! │    Auth    │        HTTP           │  Pagination  │  Decode  │
//! ├────────────┼───────────────────────┼──────────────┼──────────┤
//! │ API Key    │ Request descriptors   │ drain        │ Records  │
//! │ OAuth2     │ Classification        │ stream       │ Paths    │
//! │ Session    │ Refresh-and-retry     │ Page styles  │ Totals   │
//! │ Refresher  │                       │ Retry        │          │
//! └────────────┴───────────────────────┴──────────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credentials and token refresh
pub mod auth;

/// Authenticated HTTP session
pub mod http;

/// Pagination driver and page styles
pub mod pagination;

/// Record extraction from response bodies
pub mod decode;

/// Per-item fetches
pub mod batch;

/// YAML loader for source definitions
pub mod loader;

/// Sources bound to their config
pub mod source;

/// Built-in source definitions
pub mod sources;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use loader::{load_source, load_source_from_str, SourceDefinition};
pub use pagination::{drain, stream_records, DrainOptions, PageFetcher, PageRequest, PageResult};
pub use source::{CheckStatus, Source};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
