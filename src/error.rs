//! Error types for wrapkit
//!
//! Every fallible operation returns `Result<T, Error>`. The variants form a
//! closed taxonomy: configuration problems found before any network call,
//! authentication failures, HTTP status classes, and transport failures below
//! the HTTP layer. [`ErrorKind`] collapses the variants into that taxonomy.

use thiserror::Error;

/// The main error type for wrapkit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Page size {requested} exceeds the maximum of {max}")]
    PageSizeExceeded { requested: u32, max: u32 },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed ({}): {body}", status_label(.status))]
    Authentication { status: Option<u16>, body: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    // ============================================================================
    // HTTP Status Errors
    // ============================================================================
    #[error("Not found (HTTP {status})")]
    NotFound { status: u16 },

    #[error("HTTP {status}: {body}")]
    Client { status: u16, body: String },

    #[error("HTTP {status}: {body}")]
    Server { status: u16, body: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing configuration, detected before any network call
    Configuration,
    /// 401/403 from the target API, or a failed credential refresh
    Authentication,
    /// 404
    NotFound,
    /// Any other 4xx
    Client,
    /// 5xx
    Server,
    /// Connection failure or timeout below the HTTP layer
    Transport,
    /// Response body could not be decoded into records
    Decode,
    /// Local file I/O
    Io,
    /// Errors raised by caller-supplied code
    Other,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error without an HTTP status
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            status: None,
            body: message.into(),
        }
    }

    /// Create a token refresh error
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::TokenRefresh {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// The taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::PageSizeExceeded { .. }
            | Error::YamlParse(_)
            | Error::InvalidUrl(_)
            | Error::UndefinedVariable { .. } => ErrorKind::Configuration,
            Error::Authentication { .. } | Error::TokenRefresh { .. } => {
                ErrorKind::Authentication
            }
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Client { .. } => ErrorKind::Client,
            Error::Server { .. } => ErrorKind::Server,
            Error::Transport(_) | Error::Timeout { .. } => ErrorKind::Transport,
            Error::JsonParse(_) | Error::JsonPath { .. } | Error::Decode { .. } => {
                ErrorKind::Decode
            }
            Error::Io(_) => ErrorKind::Io,
            Error::Other(_) | Error::Anyhow(_) => ErrorKind::Other,
        }
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. } => *status,
            Error::NotFound { status }
            | Error::Client { status, .. }
            | Error::Server { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only server errors and transport failures qualify. Listing is read-only,
    /// so re-issuing the same page request is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Server | ErrorKind::Transport)
    }

    /// Check if this error came from the target API rejecting the credential
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Error::Authentication { status: Some(_), .. })
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "no status".to_string(),
    }
}

/// Result type alias for wrapkit
pub type Result<T> = std::result::Result<T, Error>;
