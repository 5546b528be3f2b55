//! Built-in HTTP page fetcher

use super::style::{PageStyle, ParamLocation};
use super::types::{PageFetcher, PageRequest, PageResult};
use crate::decode::{extract_path_u64, RecordExtractor};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::types::{JsonObject, JsonValue, Method};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Fetches pages of a JSON listing over an authenticated [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: HttpClient,
    method: Method,
    style: PageStyle,
    param_location: ParamLocation,
    extractor: RecordExtractor,
    total_path: Option<String>,
    max_page_size: Option<u32>,
    base_query: BTreeMap<String, String>,
    base_body: Option<JsonValue>,
}

impl HttpPageFetcher {
    /// GET a single-page listing whose body is the record array
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            method: Method::GET,
            style: PageStyle::Single,
            param_location: ParamLocation::Query,
            extractor: RecordExtractor::new(),
            total_path: None,
            max_page_size: None,
            base_query: BTreeMap::new(),
            base_body: None,
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the pagination style
    #[must_use]
    pub fn style(mut self, style: PageStyle) -> Self {
        self.style = style;
        self
    }

    /// Send page parameters and filters in the query string or the body
    #[must_use]
    pub fn params_in(mut self, location: ParamLocation) -> Self {
        self.param_location = location;
        self
    }

    /// Set the record path
    #[must_use]
    pub fn record_path(mut self, path: impl Into<String>) -> Self {
        self.extractor = RecordExtractor::with_path(path);
        self
    }

    /// Set the path of the server-reported record total
    #[must_use]
    pub fn total_path(mut self, path: impl Into<String>) -> Self {
        self.total_path = Some(path.into());
        self
    }

    /// Declare the API's page size ceiling
    #[must_use]
    pub fn max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = Some(max);
        self
    }

    /// Add a query parameter sent with every page
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_query.insert(key.into(), value.into());
        self
    }

    /// Set the JSON body sent with every page
    #[must_use]
    pub fn body(mut self, body: JsonValue) -> Self {
        self.base_body = Some(body);
        self
    }

    /// Get the pagination style
    pub fn page_style(&self) -> &PageStyle {
        &self.style
    }

    /// Get the client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn request_config(&self, request: &PageRequest) -> Result<RequestConfig> {
        let mut config = RequestConfig::new();

        // A next-page URL already carries the query of the first request
        if self.style.url_override(request).is_some() {
            config.body.clone_from(&self.base_body);
            return Ok(config);
        }

        let page_params = self.style.request_params(request)?;
        config.query = self.base_query.clone();

        match self.param_location {
            ParamLocation::Query => {
                for (key, value) in &request.filters {
                    config.query.insert(key.clone(), value.clone());
                }
                for (key, value) in page_params {
                    config.query.insert(key, query_value(&value));
                }
                config.body.clone_from(&self.base_body);
            }
            ParamLocation::Body => {
                let mut body = match &self.base_body {
                    Some(JsonValue::Object(map)) => map.clone(),
                    Some(_) => {
                        return Err(Error::config(
                            "Body page parameters require a JSON object body",
                        ))
                    }
                    None => JsonObject::new(),
                };
                for (key, value) in &request.filters {
                    body.insert(key.clone(), JsonValue::String(value.clone()));
                }
                for (key, value) in page_params {
                    body.insert(key, value);
                }
                config.body = Some(JsonValue::Object(body));
            }
        }

        Ok(config)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        request.validate_page_size(self.max_page_size)?;

        let config = self.request_config(request)?;
        let path = self
            .style
            .url_override(request)
            .unwrap_or(request.path.as_str());

        let body = self.client.execute_json(self.method, path, &config).await?;

        let records = self.extractor.extract(&body)?;
        let total = self
            .total_path
            .as_deref()
            .and_then(|path| extract_path_u64(&body, path));
        let continuation = self.style.continuation(&body, request, records.len(), total);

        debug!(
            path,
            records = records.len(),
            ?total,
            done = continuation.is_done(),
            "Decoded page"
        );

        Ok(PageResult {
            records,
            continuation,
            total,
        })
    }

    fn max_page_size(&self) -> Option<u32> {
        self.max_page_size
    }
}

fn query_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
