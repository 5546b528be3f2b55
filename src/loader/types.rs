//! Loader types
//!
//! Declarative source definition types for YAML parsing. String fields may
//! hold `{{ config.field }}` templates; they are rendered when a
//! [`Source`](crate::source::Source) is built.

use crate::auth::Location;
use crate::pagination::{PageStyle, ParamLocation};
use crate::types::{BackoffType, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Source Definition
// ============================================================================

/// Top-level source definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceDefinition {
    /// Source name
    pub name: String,
    /// Definition version
    #[serde(default = "default_version")]
    pub version: String,
    /// What the source provides
    #[serde(default)]
    pub description: Option<String>,
    /// Base URL for all listings (can contain templates)
    pub base_url: String,
    /// Secrets and settings the caller must supply
    #[serde(default)]
    pub config: BTreeMap<String, ConfigField>,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthDefinition,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Listing used by the connection check; the first listing when unset
    #[serde(default)]
    pub check: Option<String>,
    /// Listing definitions
    pub listings: Vec<ListingDefinition>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// A caller-supplied config field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfigField {
    /// Field description
    #[serde(default)]
    pub description: Option<String>,
    /// Must be present in the caller's config
    #[serde(default = "default_true")]
    pub required: bool,
    /// Value used when the caller omits the field
    #[serde(default)]
    pub default: Option<Value>,
    /// Never echoed back
    #[serde(default)]
    pub secret: bool,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Auth Definition
// ============================================================================

/// Authentication definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthDefinition {
    /// No authentication
    #[default]
    None,
    /// API key in a header or query parameter
    ApiKey {
        /// Header or query param name
        name: String,
        /// Value (usually a template like `{{ config.api_key }}`)
        value: String,
        /// Prefix before the value, e.g. `Token `
        #[serde(default)]
        prefix: Option<String>,
        /// Header or query
        #[serde(default)]
        location: Location,
    },
    /// Bearer token
    Bearer {
        /// Token value (template)
        token: String,
    },
    /// HTTP basic authentication
    Basic {
        /// Username (template)
        username: String,
        /// Password (template)
        password: String,
    },
    /// Credentials sent as query parameters
    QueryParams {
        /// Parameter name to value (templates)
        params: BTreeMap<String, String>,
    },
    /// OAuth2 client credentials
    Oauth2ClientCredentials {
        /// Token URL (template)
        token_url: String,
        /// Client ID (template)
        client_id: String,
        /// Client secret (template)
        client_secret: String,
        /// Scopes
        #[serde(default)]
        scopes: Vec<String>,
        /// Extra form fields
        #[serde(default)]
        token_body: BTreeMap<String, String>,
    },
    /// OAuth2 resource owner password grant
    Oauth2Password {
        /// Token URL (template)
        token_url: String,
        /// Client ID (template)
        client_id: String,
        /// Client secret (template), for confidential apps
        #[serde(default)]
        client_secret: Option<String>,
        /// Username (template)
        username: String,
        /// Password (template)
        password: String,
        /// Extra form fields, e.g. `resource`
        #[serde(default)]
        token_body: BTreeMap<String, String>,
    },
    /// Login endpoint returning a session token
    Session {
        /// Login URL (template)
        login_url: String,
        /// Login method
        #[serde(default = "default_login_method")]
        login_method: Method,
        /// Login JSON body (templates)
        #[serde(default)]
        login_body: BTreeMap<String, String>,
        /// Path to the token in the response
        token_path: String,
        /// Header carrying the token
        token_header: String,
        /// Header value prefix
        #[serde(default)]
        token_prefix: Option<String>,
        /// Path to the lifetime in seconds
        #[serde(default)]
        expires_in_path: Option<String>,
    },
}

fn default_login_method() -> Method {
    Method::POST
}

impl AuthDefinition {
    /// Type name as written in YAML
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey { .. } => "api_key",
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::QueryParams { .. } => "query_params",
            Self::Oauth2ClientCredentials { .. } => "oauth2_client_credentials",
            Self::Oauth2Password { .. } => "oauth2_password",
            Self::Session { .. } => "session",
        }
    }
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries for server and transport failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Retry backoff
    #[serde(default)]
    pub backoff: BackoffDefinition,
    /// Refresh expiring tokens this many seconds early
    #[serde(default = "default_safety_margin")]
    pub token_safety_margin_secs: u64,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            backoff: BackoffDefinition::default(),
            token_safety_margin_secs: default_safety_margin(),
            headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_safety_margin() -> u64 {
    30
}

/// Backoff between retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffDefinition {
    /// Growth of the delay
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,
    /// First delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Delay ceiling in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffDefinition {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

// ============================================================================
// Listing Definition
// ============================================================================

/// A paginated listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListingDefinition {
    /// Listing name
    pub name: String,
    /// What the listing returns
    #[serde(default)]
    pub description: Option<String>,
    /// URL path (can contain templates)
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Query parameters sent with every page (templates)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// JSON body sent with every page (templates)
    #[serde(default)]
    pub body: Option<Value>,
    /// Path to the records; the whole body when unset
    #[serde(default)]
    pub record_path: Option<String>,
    /// Path to the server-reported record total
    #[serde(default)]
    pub total_path: Option<String>,
    /// Pagination
    #[serde(default)]
    pub pagination: PaginationDefinition,
    /// Where page parameters and filters go
    #[serde(default)]
    pub params_in: ParamsIn,
    /// Page size used when the caller does not pick one
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Largest page size the API accepts
    #[serde(default)]
    pub max_page_size: Option<u32>,
}

/// Where page parameters and filters go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamsIn {
    /// Query string
    #[default]
    Query,
    /// JSON body
    Body,
}

impl From<ParamsIn> for ParamLocation {
    fn from(value: ParamsIn) -> Self {
        match value {
            ParamsIn::Query => ParamLocation::Query,
            ParamsIn::Body => ParamLocation::Body,
        }
    }
}

// ============================================================================
// Pagination Definition
// ============================================================================

/// Pagination definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationDefinition {
    /// One request
    #[default]
    None,
    /// Next page URL in the body
    NextUrl {
        /// Path to the URL
        path: String,
        /// Page size parameter
        #[serde(default)]
        size_param: Option<String>,
    },
    /// Continuation token
    Cursor {
        /// Parameter carrying the token
        cursor_param: String,
        /// Path to the token in the body
        cursor_path: String,
        /// Page size parameter
        #[serde(default)]
        size_param: Option<String>,
    },
    /// Offset and limit
    Offset {
        /// Offset parameter
        offset_param: String,
        /// Limit parameter
        limit_param: String,
    },
    /// Page number
    PageNumber {
        /// Page parameter
        page_param: String,
        /// Page size parameter
        #[serde(default)]
        size_param: Option<String>,
        /// First page
        #[serde(default = "default_start_page")]
        start_page: u64,
        /// Path to the total page count
        #[serde(default)]
        total_pages_path: Option<String>,
    },
}

fn default_start_page() -> u64 {
    1
}

impl From<&PaginationDefinition> for PageStyle {
    fn from(def: &PaginationDefinition) -> Self {
        match def {
            PaginationDefinition::None => PageStyle::Single,
            PaginationDefinition::NextUrl { path, size_param } => PageStyle::NextUrl {
                next_path: path.clone(),
                size_param: size_param.clone(),
            },
            PaginationDefinition::Cursor {
                cursor_param,
                cursor_path,
                size_param,
            } => PageStyle::Cursor {
                cursor_param: cursor_param.clone(),
                cursor_path: cursor_path.clone(),
                size_param: size_param.clone(),
            },
            PaginationDefinition::Offset {
                offset_param,
                limit_param,
            } => PageStyle::offset(offset_param.clone(), limit_param.clone()),
            PaginationDefinition::PageNumber {
                page_param,
                size_param,
                start_page,
                total_pages_path,
            } => PageStyle::PageNumber {
                page_param: page_param.clone(),
                size_param: size_param.clone(),
                start_page: *start_page,
                total_pages_path: total_pages_path.clone(),
            },
        }
    }
}
