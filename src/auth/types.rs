//! Auth configuration types
//!
//! These types represent the runtime credential configuration after template
//! interpolation has been applied.

use super::refresh::CredentialRefresher;
use crate::types::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Authentication configuration (after template interpolation)
#[derive(Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// Static API key (header or query)
    ApiKey {
        /// Where to place the API key
        location: Location,
        /// Header or query parameter name
        name: String,
        /// Prefix to add before the value (e.g., "Token ")
        prefix: Option<String>,
        /// The API key value
        value: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// Static bearer token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// Credentials sent as query parameters on every request
    /// (e.g. `login` and `password`, or `key` and `email`)
    QueryParams {
        /// Parameter name to value
        params: BTreeMap<String, String>,
    },

    /// OAuth2 client credentials grant
    Oauth2ClientCredentials {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Requested scopes
        scopes: Vec<String>,
        /// Additional token request form parameters
        token_body: BTreeMap<String, String>,
    },

    /// OAuth2 resource owner password grant
    Oauth2Password {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret, for confidential app registrations
        client_secret: Option<String>,
        /// Account username
        username: String,
        /// Account password
        password: String,
        /// Additional token request form parameters (e.g. `resource`)
        token_body: BTreeMap<String, String>,
    },

    /// Session-based authentication (login endpoint)
    Session {
        /// Login endpoint URL
        login_url: String,
        /// HTTP method for login
        login_method: Method,
        /// Login request body
        login_body: BTreeMap<String, String>,
        /// Path to the token in the login response
        token_path: String,
        /// Header name to use for the token
        token_header: String,
        /// Prefix for token value (e.g., "Bearer ")
        token_prefix: Option<String>,
        /// Path to the lifetime in seconds in the login response
        expires_in_path: Option<String>,
    },

    /// Token obtained through a caller-supplied refresh procedure
    Refreshable {
        /// Produces a fresh token when the cached one nears expiry
        refresher: Arc<dyn CredentialRefresher>,
        /// Header name to use for the token
        token_header: String,
        /// Prefix for token value (e.g., "Bearer ")
        token_prefix: Option<String>,
    },
}

impl AuthConfig {
    /// Whether this credential expires and carries a refresh procedure
    pub fn is_refreshable(&self) -> bool {
        matches!(
            self,
            AuthConfig::Oauth2ClientCredentials { .. }
                | AuthConfig::Oauth2Password { .. }
                | AuthConfig::Session { .. }
                | AuthConfig::Refreshable { .. }
        )
    }

    /// Short name of the credential kind, safe to log
    pub fn kind_name(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::QueryParams { .. } => "query_params",
            AuthConfig::Oauth2ClientCredentials { .. } => "oauth2_client_credentials",
            AuthConfig::Oauth2Password { .. } => "oauth2_password",
            AuthConfig::Session { .. } => "session",
            AuthConfig::Refreshable { .. } => "refreshable",
        }
    }
}

// Secrets never reach Debug output.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::None => f.write_str("None"),
            AuthConfig::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .finish_non_exhaustive(),
            AuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            AuthConfig::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
            AuthConfig::QueryParams { params } => f
                .debug_struct("QueryParams")
                .field("params", &params.keys().collect::<Vec<_>>())
                .finish(),
            AuthConfig::Oauth2ClientCredentials {
                token_url,
                client_id,
                scopes,
                ..
            } => f
                .debug_struct("Oauth2ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("scopes", scopes)
                .finish_non_exhaustive(),
            AuthConfig::Oauth2Password {
                token_url,
                client_id,
                username,
                ..
            } => f
                .debug_struct("Oauth2Password")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("username", username)
                .finish_non_exhaustive(),
            AuthConfig::Session {
                login_url,
                token_header,
                ..
            } => f
                .debug_struct("Session")
                .field("login_url", login_url)
                .field("token_header", token_header)
                .finish_non_exhaustive(),
            AuthConfig::Refreshable { token_header, .. } => f
                .debug_struct("Refreshable")
                .field("token_header", token_header)
                .finish_non_exhaustive(),
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: impl Into<String>, seconds: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(seconds)),
        }
    }

    /// True when `now + margin` has reached the expiry. Tokens without an
    /// expiry never need refreshing.
    pub fn needs_refresh_at(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now + margin >= expires_at,
            None => false,
        }
    }

    /// [`Self::needs_refresh_at`] against the current time
    pub fn needs_refresh(&self, margin: chrono::Duration) -> bool {
        self.needs_refresh_at(Utc::now(), margin)
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_cached_token_outside_margin() {
        let token = CachedToken::expires_in("test", 3600);
        assert!(!token.needs_refresh(chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_cached_token_inside_margin() {
        let token = CachedToken::expires_in("test", 20);
        assert!(token.needs_refresh(chrono::Duration::seconds(30)));
        assert!(!token.needs_refresh(chrono::Duration::zero()));
    }

    #[test]
    fn test_cached_token_expired() {
        let token = CachedToken::expires_in("test", -100);
        assert!(token.needs_refresh(chrono::Duration::zero()));
    }

    #[test]
    fn test_cached_token_no_expiration() {
        let token = CachedToken::new("test", None);
        assert!(!token.needs_refresh(chrono::Duration::days(365)));
    }

    #[test]
    fn test_margin_boundary_is_inclusive() {
        let now = Utc::now();
        let token = CachedToken::new("t", Some(now + chrono::Duration::seconds(30)));
        assert!(token.needs_refresh_at(now, chrono::Duration::seconds(30)));
        assert!(!token.needs_refresh_at(now, chrono::Duration::seconds(29)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig::Basic {
            username: "analyst".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("analyst"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_auth_config_default() {
        let config = AuthConfig::default();
        assert!(matches!(config, AuthConfig::None));
        assert!(!config.is_refreshable());
    }
}
