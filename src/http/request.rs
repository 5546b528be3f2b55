//! Request descriptors
//!
//! A [`RequestDescriptor`] is a fully prepared request: resolved URL, headers,
//! query parameters, optional JSON body and auth material. It is plain data
//! until [`RequestDescriptor::build`] turns it into a reqwest builder.

use crate::types::Method;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A ready-to-send request
#[derive(Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Resolved URL, without the query parameters below
    pub url: Url,
    /// Request headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Bound on the whole exchange
    pub timeout: Duration,
    /// Generation of the cached credential applied by the authenticator
    pub credential_generation: Option<u64>,
}

impl RequestDescriptor {
    /// Create a descriptor with no headers, query or body
    pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout,
            credential_generation: None,
        }
    }

    /// Set a header, replacing any existing value (case-insensitive)
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a query parameter, replacing any existing value
    pub fn set_query(&mut self, name: &str, value: impl Into<String>) {
        self.query.retain(|(k, _)| k != name);
        self.query.push((name.to_string(), value.into()));
    }

    /// Get a query parameter set on this descriptor
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set HTTP Basic credentials
    pub fn basic_auth(&mut self, username: &str, password: &str) {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        self.set_header("Authorization", format!("Basic {encoded}"));
    }

    /// Set a bearer token
    pub fn bearer_auth(&mut self, token: &str) {
        self.set_header("Authorization", format!("Bearer {token}"));
    }

    /// The URL with the query parameters appended
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// Turn the descriptor into a reqwest builder on `client`
    pub fn build(&self, client: &Client) -> RequestBuilder {
        let mut req = client
            .request(self.method.into(), self.full_url())
            .timeout(self.timeout);

        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if let Some(ref body) = self.body {
            req = req.json(body);
        }

        req
    }
}

// Header values may carry credentials; only names are shown.
impl std::fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field(
                "headers",
                &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field(
                "query",
                &self.query.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod request_tests {
    use super::*;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::new(
            Method::GET,
            Url::parse("https://api.example.com/v1/items").unwrap(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut req = descriptor();
        req.set_header("authorization", "Token a");
        req.set_header("Authorization", "Token b");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("AUTHORIZATION"), Some("Token b"));
    }

    #[test]
    fn test_full_url_appends_query() {
        let mut req = descriptor();
        req.set_query("page", "2");
        req.set_query("size", "50");
        req.set_query("page", "3");
        assert_eq!(
            req.full_url().as_str(),
            "https://api.example.com/v1/items?size=50&page=3"
        );
    }

    #[test]
    fn test_full_url_without_query_has_no_question_mark() {
        let req = descriptor();
        assert_eq!(req.full_url().as_str(), "https://api.example.com/v1/items");
    }

    #[test]
    fn test_debug_hides_header_values() {
        let mut req = descriptor();
        req.bearer_auth("very-secret");
        let rendered = format!("{req:?}");
        assert!(rendered.contains("Authorization"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_build_carries_headers_and_body() {
        let mut req = descriptor();
        req.method = Method::POST;
        req.set_header("X-Trace", "1");
        req.body = Some(serde_json::json!({"limit": 10}));

        let built = req.build(&Client::new()).build().unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.headers().get("X-Trace").unwrap(), "1");
        assert!(built.body().is_some());
    }
}
