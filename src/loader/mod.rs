//! YAML Loader module
//!
//! Parse source definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `SourceDefinition` - Declarative description of one API
//! - `ListingDefinition` - One paginated endpoint of that API
//! - YAML parsing with validation

mod parser;
mod types;

pub use parser::{load_source, load_source_from_str, validate_source};
pub use types::{
    AuthDefinition, BackoffDefinition, ConfigField, HttpDefinition, ListingDefinition,
    PaginationDefinition, ParamsIn, SourceDefinition,
};
