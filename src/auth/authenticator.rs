//! Authenticator implementation
//!
//! Applies credentials to request descriptors and keeps expiring tokens fresh.

use super::refresh::{
    ClientCredentialsRefresher, CredentialRefresher, PasswordGrantRefresher, SessionRefresher,
};
use super::types::{AuthConfig, CachedToken, Location};
use crate::error::{Error, ErrorKind, Result};
use crate::http::RequestDescriptor;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default buffer before expiry within which a token is refreshed
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Default bound on a single refresh call
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
    /// Refresh procedure for expiring credentials
    refresher: Option<Arc<dyn CredentialRefresher>>,
    /// Cached token for expiring credentials
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Refresh when `now + safety_margin >= expires_at`
    safety_margin: Duration,
    /// Upper bound on one refresh call
    refresh_timeout: Duration,
    /// Number of successful refreshes
    refreshes: AtomicU64,
    /// Bumped whenever the cached token is replaced; written under the lock
    generation: AtomicU64,
}

impl Authenticator {
    /// Create a new authenticator, validating the credential fields
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator whose token requests go through `http_client`
    pub fn with_client(config: AuthConfig, http_client: Client) -> Result<Self> {
        validate(&config)?;
        let refresher = build_refresher(&config, http_client);

        Ok(Self {
            config,
            refresher,
            cached_token: Arc::new(RwLock::new(None)),
            safety_margin: DEFAULT_SAFETY_MARGIN,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refreshes: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        })
    }

    /// Set the buffer before expiry within which the token is refreshed
    #[must_use]
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Set the upper bound on one refresh call
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Seed the cache with a token obtained elsewhere
    pub async fn seed_token(&self, token: CachedToken) {
        let mut cached = self.cached_token.write().await;
        *cached = Some(token);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Apply authentication to a request descriptor
    pub async fn authorize(&self, req: &mut RequestDescriptor) -> Result<()> {
        match &self.config {
            AuthConfig::None => Ok(()),

            AuthConfig::ApiKey {
                location,
                name,
                prefix,
                value,
            } => {
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                match location {
                    Location::Header => req.set_header(name, val),
                    Location::Query => req.set_query(name, val),
                }
                Ok(())
            }

            AuthConfig::Basic { username, password } => {
                req.basic_auth(username, password);
                Ok(())
            }

            AuthConfig::Bearer { token } => {
                req.bearer_auth(token);
                Ok(())
            }

            AuthConfig::QueryParams { params } => {
                for (key, value) in params {
                    req.set_query(key, value);
                }
                Ok(())
            }

            AuthConfig::Oauth2ClientCredentials { .. } | AuthConfig::Oauth2Password { .. } => {
                let (token, generation) = self.token_with_generation().await?;
                req.bearer_auth(&token);
                req.credential_generation = Some(generation);
                Ok(())
            }

            AuthConfig::Session {
                token_header,
                token_prefix,
                ..
            }
            | AuthConfig::Refreshable {
                token_header,
                token_prefix,
                ..
            } => {
                let (token, generation) = self.token_with_generation().await?;
                req.set_header(
                    token_header,
                    format!("{}{}", token_prefix.as_deref().unwrap_or(""), token),
                );
                req.credential_generation = Some(generation);
                Ok(())
            }
        }
    }

    /// Get a valid token, refreshing if it is missing or within the margin
    pub async fn current_token(&self) -> Result<String> {
        self.token_with_generation().await.map(|(token, _)| token)
    }

    /// Like [`current_token`](Self::current_token), also returning the
    /// generation of the cached entry the token was read from
    async fn token_with_generation(&self) -> Result<(String, u64)> {
        let margin = chrono::Duration::from_std(self.safety_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.needs_refresh(margin) {
                    return Ok((token.token.clone(), self.generation.load(Ordering::Acquire)));
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh(margin) {
                return Ok((token.token.clone(), self.generation.load(Ordering::Acquire)));
            }
        }

        let new_token = self.refresh_locked(cached.as_ref()).await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        Ok((token_str, generation))
    }

    /// Run the refresh procedure. The caller holds the write lock.
    async fn refresh_locked(&self, current: Option<&CachedToken>) -> Result<CachedToken> {
        let refresher = self.refresher.as_ref().ok_or_else(|| {
            Error::auth(format!(
                "Token refresh not supported for {} credentials",
                self.config.kind_name()
            ))
        })?;

        debug!(kind = self.config.kind_name(), "Refreshing credential");
        let outcome =
            tokio::time::timeout(self.refresh_timeout, refresher.refresh_credential(current))
                .await;

        match outcome {
            Ok(Ok(token)) => {
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    kind = self.config.kind_name(),
                    expires_at = ?token.expires_at,
                    "Credential refreshed"
                );
                Ok(token)
            }
            Ok(Err(e)) => {
                warn!(kind = self.config.kind_name(), error = %e, "Credential refresh failed");
                if e.kind() == ErrorKind::Authentication {
                    Err(e)
                } else {
                    Err(Error::token_refresh(e.to_string()))
                }
            }
            Err(_) => {
                warn!(
                    kind = self.config.kind_name(),
                    timeout = ?self.refresh_timeout,
                    "Credential refresh timed out"
                );
                Err(Error::token_refresh(format!(
                    "Refresh timed out after {}ms",
                    self.refresh_timeout.as_millis()
                )))
            }
        }
    }

    /// Drop the cached token so the next request refreshes it
    pub async fn invalidate(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop the cached token only if it is still the one from `generation`.
    /// A token another task already replaced is kept. Returns whether the
    /// cache was cleared.
    pub async fn invalidate_generation(&self, generation: u64) -> bool {
        let mut cached = self.cached_token.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(generation, "Rejected token already replaced");
            return false;
        }
        *cached = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Whether a rejected request can be retried with a fresh token
    pub fn is_refreshable(&self) -> bool {
        self.refresher.is_some()
    }

    /// Number of successful refreshes so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .field("safety_margin", &self.safety_margin)
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

fn build_refresher(config: &AuthConfig, http_client: Client) -> Option<Arc<dyn CredentialRefresher>> {
    match config {
        AuthConfig::Oauth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scopes,
            token_body,
        } => Some(Arc::new(ClientCredentialsRefresher {
            http_client,
            token_url: token_url.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            scopes: scopes.clone(),
            token_body: token_body.clone(),
        })),
        AuthConfig::Oauth2Password {
            token_url,
            client_id,
            client_secret,
            username,
            password,
            token_body,
        } => Some(Arc::new(PasswordGrantRefresher {
            http_client,
            token_url: token_url.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            username: username.clone(),
            password: password.clone(),
            token_body: token_body.clone(),
        })),
        AuthConfig::Session {
            login_url,
            login_method,
            login_body,
            token_path,
            expires_in_path,
            ..
        } => Some(Arc::new(SessionRefresher {
            http_client,
            login_url: login_url.clone(),
            login_method: *login_method,
            login_body: login_body.clone(),
            token_path: token_path.clone(),
            expires_in_path: expires_in_path.clone(),
        })),
        AuthConfig::Refreshable { refresher, .. } => Some(Arc::clone(refresher)),
        AuthConfig::None
        | AuthConfig::ApiKey { .. }
        | AuthConfig::Basic { .. }
        | AuthConfig::Bearer { .. }
        | AuthConfig::QueryParams { .. } => None,
    }
}

/// Validate credential fields before any request is made
pub fn validate(config: &AuthConfig) -> Result<()> {
    match config {
        AuthConfig::None => Ok(()),
        AuthConfig::ApiKey { name, value, .. } => {
            require("auth.name", name)?;
            require("auth.value", value)
        }
        AuthConfig::Basic { username, password } => {
            require("auth.username", username)?;
            require("auth.password", password)
        }
        AuthConfig::Bearer { token } => require("auth.token", token),
        AuthConfig::QueryParams { params } => {
            if params.is_empty() {
                return Err(Error::missing_field("auth.params"));
            }
            for (key, value) in params {
                require(&format!("auth.params.{key}"), value)?;
            }
            Ok(())
        }
        AuthConfig::Oauth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            ..
        } => {
            require_url("auth.token_url", token_url)?;
            require("auth.client_id", client_id)?;
            require("auth.client_secret", client_secret)
        }
        AuthConfig::Oauth2Password {
            token_url,
            client_id,
            client_secret,
            username,
            password,
            ..
        } => {
            require_url("auth.token_url", token_url)?;
            require("auth.client_id", client_id)?;
            if let Some(secret) = client_secret {
                require("auth.client_secret", secret)?;
            }
            require("auth.username", username)?;
            require("auth.password", password)
        }
        AuthConfig::Session {
            login_url,
            token_path,
            token_header,
            ..
        } => {
            require_url("auth.login_url", login_url)?;
            require("auth.token_path", token_path)?;
            require("auth.token_header", token_header)
        }
        AuthConfig::Refreshable { token_header, .. } => require("auth.token_header", token_header),
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::missing_field(field))
    } else {
        Ok(())
    }
}

fn require_url(field: &str, value: &str) -> Result<()> {
    require(field, value)?;
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::invalid_value(field, e.to_string()))
}
