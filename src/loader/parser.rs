//! YAML parser for source definitions
//!
//! Parses and validates source YAML files.
//! Supports both built-in sources (by name) and custom YAML files (by path).

use super::types::{AuthDefinition, ListingDefinition, PaginationDefinition, SourceDefinition};
use crate::error::{Error, Result};
use crate::sources;
use crate::template::{extract_variables, has_templates};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a source definition from a built-in name or a file path
///
/// ```ignore
/// let kobo = load_source("kobo")?;
/// let custom = load_source("./my-source.yaml")?;
/// ```
pub fn load_source(name_or_path: impl AsRef<Path>) -> Result<SourceDefinition> {
    let path = name_or_path.as_ref();
    let path_str = path.to_string_lossy();

    if looks_like_name(&path_str) {
        if let Some(yaml) = sources::get_builtin(&path_str) {
            debug!(source = %path_str, "Loading built-in source");
            return load_source_from_str(yaml);
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config(format!(
                "Source '{}' not found. Built-in sources: {}. Or provide a path to a YAML file.",
                path.display(),
                sources::list_builtin().join(", ")
            ))
        } else {
            Error::config(format!(
                "Failed to read source file '{}': {e}",
                path.display()
            ))
        }
    })?;

    debug!(path = %path.display(), "Loading source file");
    load_source_from_str(&content)
}

/// Load a source definition from a YAML string
pub fn load_source_from_str(yaml: &str) -> Result<SourceDefinition> {
    let def: SourceDefinition = serde_yaml::from_str(yaml)?;
    validate_source(&def)?;
    Ok(def)
}

fn looks_like_name(s: &str) -> bool {
    !s.contains('/') && !s.contains('\\') && !s.ends_with(".yaml") && !s.ends_with(".yml")
}

/// Validate a source definition
pub fn validate_source(def: &SourceDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Source name cannot be empty"));
    }

    if def.base_url.trim().is_empty() {
        return Err(Error::config("Source base_url cannot be empty"));
    }
    if !has_templates(&def.base_url) {
        url::Url::parse(&def.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
    }

    if def.listings.is_empty() {
        return Err(Error::config("Source must have at least one listing"));
    }

    let mut names = HashSet::new();
    for listing in &def.listings {
        if !names.insert(listing.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate listing name: {}",
                listing.name
            )));
        }
        validate_listing(listing)?;
    }

    if let Some(check) = &def.check {
        if !names.contains(check.as_str()) {
            return Err(Error::config(format!(
                "Check listing '{check}' is not defined"
            )));
        }
    }

    validate_auth(&def.auth)?;
    validate_templates(def)?;

    Ok(())
}

/// Validate a listing definition
fn validate_listing(listing: &ListingDefinition) -> Result<()> {
    if listing.name.trim().is_empty() {
        return Err(Error::config("Listing name cannot be empty"));
    }

    if listing.path.trim().is_empty() {
        return Err(Error::config(format!(
            "Listing '{}' path cannot be empty",
            listing.name
        )));
    }

    if listing.max_page_size == Some(0) || listing.page_size == Some(0) {
        return Err(Error::config(format!(
            "Listing '{}' page sizes must be at least 1",
            listing.name
        )));
    }

    if let (Some(size), Some(max)) = (listing.page_size, listing.max_page_size) {
        if size > max {
            return Err(Error::config(format!(
                "Listing '{}' page_size {size} exceeds max_page_size {max}",
                listing.name
            )));
        }
    }

    let field = |name: &str| format!("listings.{}.pagination.{name}", listing.name);
    match &listing.pagination {
        PaginationDefinition::None => {}
        PaginationDefinition::NextUrl { path, .. } => require(&field("path"), path)?,
        PaginationDefinition::Cursor {
            cursor_param,
            cursor_path,
            ..
        } => {
            require(&field("cursor_param"), cursor_param)?;
            require(&field("cursor_path"), cursor_path)?;
        }
        PaginationDefinition::Offset {
            offset_param,
            limit_param,
        } => {
            require(&field("offset_param"), offset_param)?;
            require(&field("limit_param"), limit_param)?;
        }
        PaginationDefinition::PageNumber { page_param, .. } => {
            require(&field("page_param"), page_param)?;
        }
    }

    Ok(())
}

/// Check that credential fields are present. Values are usually templates
/// and are checked again once rendered.
fn validate_auth(auth: &AuthDefinition) -> Result<()> {
    match auth {
        AuthDefinition::None => Ok(()),
        AuthDefinition::ApiKey { name, value, .. } => {
            require("auth.name", name)?;
            require("auth.value", value)
        }
        AuthDefinition::Bearer { token } => require("auth.token", token),
        AuthDefinition::Basic { username, password } => {
            require("auth.username", username)?;
            require("auth.password", password)
        }
        AuthDefinition::QueryParams { params } => {
            if params.is_empty() {
                return Err(Error::missing_field("auth.params"));
            }
            Ok(())
        }
        AuthDefinition::Oauth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            ..
        } => {
            require("auth.token_url", token_url)?;
            require("auth.client_id", client_id)?;
            require("auth.client_secret", client_secret)
        }
        AuthDefinition::Oauth2Password {
            token_url,
            client_id,
            username,
            password,
            ..
        } => {
            require("auth.token_url", token_url)?;
            require("auth.client_id", client_id)?;
            require("auth.username", username)?;
            require("auth.password", password)
        }
        AuthDefinition::Session {
            login_url,
            token_path,
            token_header,
            ..
        } => {
            require("auth.login_url", login_url)?;
            require("auth.token_path", token_path)?;
            require("auth.token_header", token_header)
        }
    }
}

/// Every `{{ config.x }}` must name a declared config field
fn validate_templates(def: &SourceDefinition) -> Result<()> {
    // Sources without a config section take whatever the caller passes
    if def.config.is_empty() {
        return Ok(());
    }

    let yaml = serde_yaml::to_string(def)?;
    for variable in extract_variables(&yaml) {
        let (root, rest) = variable.split_once('.').unwrap_or(("", variable.as_str()));
        let field = match root {
            "params" => continue,
            "config" => rest.split('.').next().unwrap_or(rest),
            _ => variable.split('.').next().unwrap_or(variable.as_str()),
        };
        if !def.config.contains_key(field) {
            return Err(Error::config(format!(
                "Template variable '{variable}' refers to undeclared config field '{field}'"
            )));
        }
    }

    Ok(())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::missing_field(field))
    } else {
        Ok(())
    }
}
