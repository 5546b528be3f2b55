//! Credential refresh procedures
//!
//! A [`CredentialRefresher`] exchanges whatever long-lived secret it holds for
//! a short-lived token. The built-in refreshers cover the OAuth2 grants and
//! login endpoints used by the bundled sources; [`FnRefresher`] adapts any
//! async closure.

use super::types::CachedToken;
use crate::decode::extract_path_string;
use crate::error::{Error, Result};
use crate::types::Method;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::debug;

/// Lifetime assumed when a token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Produces a fresh token for a credential that expires
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Exchange the long-lived secret for a new token. `current` is the token
    /// being replaced, if any.
    async fn refresh_credential(&self, current: Option<&CachedToken>) -> Result<CachedToken>;
}

// ============================================================================
// Closure adapter
// ============================================================================

/// Adapts an async closure into a [`CredentialRefresher`]
pub struct FnRefresher<F> {
    f: F,
}

impl<F> FnRefresher<F> {
    /// Wrap a closure called with the token being replaced
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut, E> CredentialRefresher for FnRefresher<F>
where
    F: Fn(Option<CachedToken>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<CachedToken, E>> + Send,
    E: Into<Error>,
{
    async fn refresh_credential(&self, current: Option<&CachedToken>) -> Result<CachedToken> {
        (self.f)(current.cloned()).await.map_err(Into::into)
    }
}

// ============================================================================
// OAuth2
// ============================================================================

/// OAuth2 client credentials grant
pub struct ClientCredentialsRefresher {
    pub(crate) http_client: Client,
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) token_body: BTreeMap<String, String>,
}

#[async_trait]
impl CredentialRefresher for ClientCredentialsRefresher {
    async fn refresh_credential(&self, _current: Option<&CachedToken>) -> Result<CachedToken> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
        ];

        if !self.scopes.is_empty() {
            form.push(("scope", self.scopes.join(" ")));
        }

        for (key, value) in &self.token_body {
            form.push((key.as_str(), value.clone()));
        }

        debug!(token_url = %self.token_url, "Requesting client credentials token");
        request_token(&self.http_client, &self.token_url, &form).await
    }
}

/// OAuth2 resource owner password grant
pub struct PasswordGrantRefresher {
    pub(crate) http_client: Client,
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) token_body: BTreeMap<String, String>,
}

#[async_trait]
impl CredentialRefresher for PasswordGrantRefresher {
    async fn refresh_credential(&self, _current: Option<&CachedToken>) -> Result<CachedToken> {
        let mut form = vec![
            ("grant_type", "password".to_string()),
            ("client_id", self.client_id.clone()),
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ];

        // Public app registrations have no secret
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        for (key, value) in &self.token_body {
            form.push((key.as_str(), value.clone()));
        }

        debug!(token_url = %self.token_url, username = %self.username, "Requesting password grant token");
        request_token(&self.http_client, &self.token_url, &form).await
    }
}

async fn request_token(
    http_client: &Client,
    token_url: &str,
    form: &[(&str, String)],
) -> Result<CachedToken> {
    let response = http_client
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::token_refresh(format!("Token request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::token_refresh(format!(
            "Token request failed with status {status}: {body}"
        )));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::token_refresh(format!("Malformed token response: {e}")))?;
    Ok(token_response.into_cached_token())
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Some identity providers send this as a string
    #[serde(default)]
    expires_in: Option<Value>,
}

impl TokenResponse {
    fn into_cached_token(self) -> CachedToken {
        let seconds = self
            .expires_in
            .as_ref()
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        CachedToken::expires_in(self.access_token, seconds)
    }
}

// ============================================================================
// Session login
// ============================================================================

/// Logs in against a login endpoint and extracts the session token
pub struct SessionRefresher {
    pub(crate) http_client: Client,
    pub(crate) login_url: String,
    pub(crate) login_method: Method,
    pub(crate) login_body: BTreeMap<String, String>,
    pub(crate) token_path: String,
    pub(crate) expires_in_path: Option<String>,
}

#[async_trait]
impl CredentialRefresher for SessionRefresher {
    async fn refresh_credential(&self, _current: Option<&CachedToken>) -> Result<CachedToken> {
        debug!(login_url = %self.login_url, "Logging in for session token");
        let response = self
            .http_client
            .request(self.login_method.into(), &self.login_url)
            .json(&self.login_body)
            .send()
            .await
            .map_err(|e| Error::token_refresh(format!("Login request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::token_refresh(format!(
                "Login request failed with status {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::token_refresh(format!("Malformed login response: {e}")))?;

        let token = extract_path_string(&body, &self.token_path).ok_or_else(|| {
            Error::token_refresh(format!(
                "Could not extract token from path: {}",
                self.token_path
            ))
        })?;

        // Sessions without a reported lifetime are kept until rejected
        let expires_at = self
            .expires_in_path
            .as_deref()
            .and_then(|path| extract_path_string(&body, path))
            .and_then(|v| v.parse::<i64>().ok())
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        Ok(CachedToken::new(token, expires_at))
    }
}

#[cfg(test)]
mod refresh_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_response_numeric_expiry() {
        let response: TokenResponse =
            serde_json::from_value(json!({"access_token": "abc", "expires_in": 120})).unwrap();
        let token = response.into_cached_token();
        assert_eq!(token.token, "abc");
        assert!(token.needs_refresh(chrono::Duration::seconds(121)));
        assert!(!token.needs_refresh(chrono::Duration::seconds(100)));
    }

    #[test]
    fn test_token_response_string_expiry() {
        let response: TokenResponse =
            serde_json::from_value(json!({"access_token": "abc", "expires_in": "3599"}))
                .unwrap();
        let token = response.into_cached_token();
        assert!(!token.needs_refresh(chrono::Duration::seconds(3000)));
    }

    #[test]
    fn test_token_response_default_lifetime() {
        let response: TokenResponse =
            serde_json::from_value(json!({"access_token": "abc"})).unwrap();
        let token = response.into_cached_token();
        assert!(token.expires_at.is_some());
        assert!(!token.needs_refresh(chrono::Duration::seconds(
            DEFAULT_TOKEN_LIFETIME_SECS - 60
        )));
    }

    #[tokio::test]
    async fn test_fn_refresher_receives_current_token() {
        let refresher = FnRefresher::new(|current: Option<CachedToken>| async move {
            let generation = current.map_or(0, |t| t.token.len());
            Ok::<_, Error>(CachedToken::expires_in("x".repeat(generation + 1), 60))
        });

        let first = refresher.refresh_credential(None).await.unwrap();
        assert_eq!(first.token, "x");
        let second = refresher.refresh_credential(Some(&first)).await.unwrap();
        assert_eq!(second.token, "xx");
    }

    #[tokio::test]
    async fn test_fn_refresher_accepts_anyhow_errors() {
        let refresher = FnRefresher::new(|_current: Option<CachedToken>| async {
            Err::<CachedToken, _>(anyhow::anyhow!("vault sealed"))
        });

        let err = refresher.refresh_credential(None).await.unwrap_err();
        assert!(matches!(err, Error::Anyhow(_)));
        assert_eq!(err.to_string(), "vault sealed");
    }
}
