//! Authenticated HTTP session
//!
//! Provides an HTTP client that handles:
//! - Resolving paths against a base URL
//! - Applying credentials, refreshing expiring tokens first
//! - Classifying every exchange into the error taxonomy
//! - One refresh-and-retry when the target API rejects a refreshable token

use super::classify::{classify_response, classify_transport};
use super::request::RequestDescriptor;
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Default headers for all requests
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            default_headers: BTreeMap::new(),
            user_agent: format!("wrapkit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Authenticated HTTP client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    base_url: Option<Url>,
    authenticator: Option<Arc<Authenticator>>,
}

impl HttpClient {
    /// Create a client without credentials
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = match config.base_url.as_deref() {
            Some(base) => Some(parse_base_url(base)?),
            None => None,
        };

        Ok(Self {
            client,
            config,
            base_url,
            authenticator: None,
        })
    }

    /// Create a client with credentials. Token requests share the client's
    /// connection pool and timeout.
    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut client = Self::new(config)?;
        let authenticator = Authenticator::with_client(auth_config, client.client.clone())?;
        client.authenticator = Some(Arc::new(authenticator));
        Ok(client)
    }

    /// Create a client around an existing authenticator
    pub fn with_authenticator(
        config: HttpClientConfig,
        authenticator: Arc<Authenticator>,
    ) -> Result<Self> {
        Ok(Self::new(config)?.authenticated(authenticator))
    }

    /// Attach an authenticator to this client
    #[must_use]
    pub fn authenticated(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the authenticator, if any
    pub fn authenticator(&self) -> Option<&Authenticator> {
        self.authenticator.as_deref()
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Build a ready-to-send request, refreshing credentials first if needed
    pub async fn prepare_request(
        &self,
        method: Method,
        path: &str,
        config: &RequestConfig,
    ) -> Result<RequestDescriptor> {
        let url = self.build_url(path)?;
        let timeout = config.timeout.unwrap_or(self.config.timeout);
        let mut req = RequestDescriptor::new(method, url, timeout);

        for (key, value) in &self.config.default_headers {
            req.set_header(key, value.as_str());
        }

        for (key, value) in &config.headers {
            req.set_header(key, value.as_str());
        }

        for (key, value) in &config.query {
            req.set_query(key, value.as_str());
        }

        req.body.clone_from(&config.body);

        if let Some(ref auth) = self.authenticator {
            auth.authorize(&mut req).await?;
        }

        Ok(req)
    }

    /// Send a prepared request and classify the outcome
    pub async fn send(&self, req: &RequestDescriptor) -> Result<Response> {
        debug!(method = %req.method, url = %req.url, "Sending request");

        let response = req
            .build(&self.client)
            .send()
            .await
            .map_err(|e| classify_transport(e, req.timeout))?;

        classify_response(response).await
    }

    /// Prepare and send a request. A refreshable credential rejected with
    /// 401/403 is refreshed and the request retried exactly once.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        config: &RequestConfig,
    ) -> Result<Response> {
        let mut refreshed = false;

        loop {
            let req = self.prepare_request(method, path, config).await?;
            match self.send(&req).await {
                Err(e) if e.is_auth_rejection() && !refreshed && self.can_refresh() => {
                    warn!(
                        status = ?e.status(),
                        url = %req.url,
                        "Credential rejected, refreshing and retrying once"
                    );
                    if let (Some(auth), Some(generation)) =
                        (&self.authenticator, req.credential_generation)
                    {
                        auth.invalidate_generation(generation).await;
                    }
                    refreshed = true;
                }
                other => return other,
            }
        }
    }

    /// Make a request and parse the JSON response. An empty body (e.g. 204)
    /// decodes as an empty object.
    pub async fn execute_json(
        &self,
        method: Method,
        path: &str,
        config: &RequestConfig,
    ) -> Result<JsonValue> {
        let response = self.execute(method, path, config).await?;
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(e, config.timeout.unwrap_or(self.config.timeout)))?;

        if text.trim().is_empty() {
            return Ok(JsonValue::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::decode(format!("Response from '{path}' is not JSON: {e}")))
    }

    /// Make a GET request and deserialize the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, config: &RequestConfig) -> Result<T> {
        let value = self.execute_json(Method::GET, path, config).await?;
        serde_json::from_value(value).map_err(|e| Error::decode(e.to_string()))
    }

    fn can_refresh(&self) -> bool {
        self.authenticator
            .as_ref()
            .is_some_and(|auth| auth.is_refreshable())
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }

        match &self.base_url {
            Some(base) => Ok(base.join(path.trim_start_matches('/'))?),
            None => Err(Error::config(format!(
                "Relative path '{path}' requires a base_url"
            ))),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("timeout", &self.config.timeout)
            .field("has_authenticator", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

/// Parse a base URL so that `join` appends instead of replacing the last segment
fn parse_base_url(base: &str) -> Result<Url> {
    let url = Url::parse(base).map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(Error::invalid_value("base_url", "URL cannot be a base"));
    }
    if url.path().ends_with('/') {
        Ok(url)
    } else {
        let mut url = url;
        let path = format!("{}/", url.path());
        url.set_path(&path);
        Ok(url)
    }
}
