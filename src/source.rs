//! Runtime sources
//!
//! A [`Source`] is a [`SourceDefinition`] bound to the caller's config: the
//! base URL and credentials are rendered, one authenticated [`HttpClient`]
//! is built, and every listing shares it (and its token cache).

use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, ErrorKind, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::loader::{load_source, AuthDefinition, ListingDefinition, SourceDefinition};
use crate::pagination::{
    drain, stream_records, DrainError, DrainOptions, Drained, HttpPageFetcher, PageFetcher,
    PageRequest, PageStyle, RetryPolicy, RetryingFetcher,
};
use crate::template::{self, extract_variables, TemplateContext};
use crate::types::{JsonObject, JsonValue, OptionStringExt, Record};
use futures::stream::BoxStream;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A source definition bound to its config
#[derive(Debug, Clone)]
pub struct Source {
    definition: SourceDefinition,
    context: TemplateContext,
    client: HttpClient,
    retry: RetryPolicy,
}

impl Source {
    /// Load a definition (built-in name or YAML path) and bind it
    pub fn load(name_or_path: impl AsRef<Path>, config: &JsonValue) -> Result<Self> {
        Self::from_definition(load_source(name_or_path)?, config)
    }

    /// Bind a definition to the caller's config
    ///
    /// Fails before any network call when a required config field is
    /// missing or a template cannot be rendered.
    pub fn from_definition(definition: SourceDefinition, config: &JsonValue) -> Result<Self> {
        let config = resolve_config(&definition, config)?;
        let context = TemplateContext::with_config(config);

        let base_url = template::render(&definition.base_url, &context)?;
        let http = &definition.http;

        let mut builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(http.timeout_secs));
        for (key, value) in &http.headers {
            builder = builder.header(key, template::render(value, &context)?);
        }
        if let Some(agent) = &http.user_agent {
            builder = builder.user_agent(agent);
        }

        let auth = render_auth(&definition.auth, &context)?;
        let client = HttpClient::new(builder.build())?;
        let authenticator = Authenticator::with_client(auth, client.inner().clone())?
            .with_safety_margin(Duration::from_secs(http.token_safety_margin_secs));
        let client = client.authenticated(Arc::new(authenticator));

        let retry = RetryPolicy::default()
            .max_retries(http.max_retries)
            .backoff(
                http.backoff.backoff_type,
                Duration::from_millis(http.backoff.initial_ms),
                Duration::from_millis(http.backoff.max_ms),
            );

        debug!(
            source = %definition.name,
            auth = definition.auth.type_name(),
            listings = definition.listings.len(),
            "Source ready"
        );

        Ok(Self {
            definition,
            context,
            client,
            retry,
        })
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The bound definition
    pub fn definition(&self) -> &SourceDefinition {
        &self.definition
    }

    /// The shared authenticated client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Listing definitions, in declaration order
    pub fn listings(&self) -> &[ListingDefinition] {
        &self.definition.listings
    }

    /// Prepare a listing for draining
    ///
    /// `params` referenced as `{{ params.x }}` by the listing are rendered
    /// into it; the others are sent as filters. `page_size` falls back to
    /// the listing's default.
    pub fn listing(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
        page_size: Option<u32>,
    ) -> Result<PreparedListing> {
        let def = self.find_listing(name)?;
        let ctx = self.context.clone().with_params(params);

        let mut fetcher = HttpPageFetcher::new(self.client.clone())
            .method(def.method)
            .style(PageStyle::from(&def.pagination))
            .params_in(def.params_in.into());
        if let Some(path) = &def.record_path {
            fetcher = fetcher.record_path(path);
        }
        if let Some(path) = &def.total_path {
            fetcher = fetcher.total_path(path);
        }
        if let Some(max) = def.max_page_size {
            fetcher = fetcher.max_page_size(max);
        }
        for (key, value) in &def.params {
            let rendered = template::render(value, &ctx)?;
            if !rendered.is_empty() {
                fetcher = fetcher.query(key, rendered);
            }
        }
        if let Some(body) = &def.body {
            fetcher = fetcher.body(template::render_value(body, &ctx)?);
        }

        let consumed = template_params(def);
        let mut request = PageRequest::new(template::render(&def.path, &ctx)?);
        request.page_size = page_size.or(def.page_size);
        for (key, value) in params {
            if !consumed.contains(key.as_str()) {
                request = request.filter(key, value);
            }
        }

        Ok(PreparedListing {
            name: def.name.clone(),
            fetcher: RetryingFetcher::new(fetcher, self.retry),
            request,
        })
    }

    /// Prepare and drain a listing
    pub async fn drain(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
        page_size: Option<u32>,
        options: DrainOptions,
    ) -> std::result::Result<Drained, DrainError> {
        let listing = self
            .listing(name, params, page_size)
            .map_err(|error| DrainError {
                error,
                partial: Drained::default(),
            })?;
        listing.drain(options).await
    }

    /// Verify connectivity and credentials by fetching one record from the
    /// check listing. Never fails; problems are reported in the status.
    pub async fn check(&self) -> CheckStatus {
        let name = match self
            .definition
            .check
            .as_deref()
            .or_else(|| self.definition.listings.first().map(|l| l.name.as_str()))
        {
            Some(name) => name.to_string(),
            None => return CheckStatus::failed(&Error::config("Source has no listings")),
        };

        info!(source = %self.name(), listing = %name, "Checking connection");

        let listing = match self.listing(&name, &BTreeMap::new(), Some(1)) {
            Ok(listing) => listing,
            Err(e) => return CheckStatus::failed(&e),
        };

        // One attempt; a check reports the first failure as is
        match listing.fetcher.inner().fetch_page(&listing.request).await {
            Ok(page) => CheckStatus {
                ok: true,
                listing: Some(name),
                status: None,
                kind: None,
                message: format!("Fetched {} record(s)", page.records.len()),
            },
            Err(e) => {
                warn!(source = %self.name(), error = %e, "Connection check failed");
                CheckStatus {
                    listing: Some(name),
                    ..CheckStatus::failed(&e)
                }
            }
        }
    }

    fn find_listing(&self, name: &str) -> Result<&ListingDefinition> {
        self.definition
            .listings
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| {
                let available: Vec<&str> = self
                    .definition
                    .listings
                    .iter()
                    .map(|l| l.name.as_str())
                    .collect();
                Error::config(format!(
                    "Unknown listing '{name}' in source '{}'. Available: {}",
                    self.definition.name,
                    available.join(", ")
                ))
            })
    }
}

/// A listing with its fetcher and first page request
#[derive(Debug)]
pub struct PreparedListing {
    name: String,
    fetcher: RetryingFetcher<HttpPageFetcher>,
    request: PageRequest,
}

impl PreparedListing {
    /// Listing name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The page fetcher, with retries
    pub fn fetcher(&self) -> &RetryingFetcher<HttpPageFetcher> {
        &self.fetcher
    }

    /// The first page request
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Drain every page into memory
    pub async fn drain(&self, options: DrainOptions) -> std::result::Result<Drained, DrainError> {
        drain(&self.fetcher, self.request.clone(), options).await
    }

    /// Stream records lazily
    pub fn stream(&self, options: DrainOptions) -> BoxStream<'_, Result<Record>> {
        stream_records(&self.fetcher, self.request.clone(), options)
    }
}

/// Outcome of a connection check
#[derive(Debug, Clone, Serialize)]
pub struct CheckStatus {
    /// The listing answered
    pub ok: bool,
    /// Listing used for the check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<String>,
    /// HTTP status of the failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure class
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    /// Human-readable summary
    pub message: String,
}

impl CheckStatus {
    fn failed(error: &Error) -> Self {
        Self {
            ok: false,
            listing: None,
            status: error.status(),
            kind: Some(error.kind()),
            message: error.to_string(),
        }
    }
}

/// Merge config defaults into the supplied config and check required fields
fn resolve_config(definition: &SourceDefinition, supplied: &JsonValue) -> Result<JsonValue> {
    let mut config = match supplied {
        JsonValue::Object(map) => map.clone(),
        JsonValue::Null => JsonObject::new(),
        _ => return Err(Error::invalid_value("config", "must be a JSON object")),
    };

    let mut missing = Vec::new();
    for (name, field) in &definition.config {
        if config.get(name).is_some_and(|v| !v.is_null()) {
            continue;
        }
        match &field.default {
            Some(default) => {
                config.insert(name.clone(), default.clone());
            }
            None if field.required => missing.push(name.as_str()),
            None => {}
        }
    }

    if !missing.is_empty() {
        return Err(Error::missing_field(missing.join(", ")));
    }

    Ok(JsonValue::Object(config))
}

/// Names a listing references as `{{ params.x }}`
fn template_params(def: &ListingDefinition) -> BTreeSet<String> {
    let mut templates = vec![def.path.clone()];
    templates.extend(def.params.values().cloned());
    if let Some(body) = &def.body {
        templates.push(body.to_string());
    }

    templates
        .iter()
        .flat_map(|t| extract_variables(t))
        .filter_map(|var| var.strip_prefix("params.").map(str::to_string))
        .collect()
}

/// Render an auth definition into runtime credentials
fn render_auth(def: &AuthDefinition, ctx: &TemplateContext) -> Result<AuthConfig> {
    let render = |s: &String| template::render(s, ctx);

    Ok(match def {
        AuthDefinition::None => AuthConfig::None,

        AuthDefinition::ApiKey {
            name,
            value,
            prefix,
            location,
        } => AuthConfig::ApiKey {
            location: *location,
            name: name.clone(),
            prefix: prefix.clone().none_if_empty(),
            value: render(value)?,
        },

        AuthDefinition::Bearer { token } => AuthConfig::Bearer {
            token: render(token)?,
        },

        AuthDefinition::Basic { username, password } => AuthConfig::Basic {
            username: render(username)?,
            password: render(password)?,
        },

        AuthDefinition::QueryParams { params } => AuthConfig::QueryParams {
            params: template::render_map(params, ctx)?,
        },

        AuthDefinition::Oauth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scopes,
            token_body,
        } => AuthConfig::Oauth2ClientCredentials {
            token_url: render(token_url)?,
            client_id: render(client_id)?,
            client_secret: render(client_secret)?,
            scopes: scopes.clone(),
            token_body: template::render_map(token_body, ctx)?,
        },

        AuthDefinition::Oauth2Password {
            token_url,
            client_id,
            client_secret,
            username,
            password,
            token_body,
        } => AuthConfig::Oauth2Password {
            token_url: render(token_url)?,
            client_id: render(client_id)?,
            client_secret: template::render_opt(client_secret.as_deref(), ctx)?,
            username: render(username)?,
            password: render(password)?,
            token_body: template::render_map(token_body, ctx)?,
        },

        AuthDefinition::Session {
            login_url,
            login_method,
            login_body,
            token_path,
            token_header,
            token_prefix,
            expires_in_path,
        } => AuthConfig::Session {
            login_url: render(login_url)?,
            login_method: *login_method,
            login_body: template::render_map(login_body, ctx)?,
            token_path: token_path.clone(),
            token_header: token_header.clone(),
            token_prefix: token_prefix.clone().none_if_empty(),
            expires_in_path: expires_in_path.clone(),
        },
    })
}
