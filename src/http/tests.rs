//! Tests for the HTTP module

use super::*;
use crate::auth::{AuthConfig, Authenticator, CachedToken, CredentialRefresher, FnRefresher};
use crate::error::{Error, ErrorKind};
use crate::types::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> HttpClientConfig {
    HttpClientConfig::builder().base_url(server.uri()).build()
}

fn rotating_tokens(calls: Arc<AtomicUsize>) -> AuthConfig {
    let refresher: Arc<dyn CredentialRefresher> =
        Arc::new(FnRefresher::new(move |_current: Option<CachedToken>| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, Error>(CachedToken::expires_in(format!("token-{n}"), 3600))
            }
        }));
    AuthConfig::Refreshable {
        refresher,
        token_header: "Authorization".to_string(),
        token_prefix: Some("Bearer ".to_string()),
    }
}

// ============================================================================
// Config / request preparation
// ============================================================================

#[test]
fn test_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.reliefweb.int/v1")
        .timeout(Duration::from_secs(5))
        .header("Accept", "application/json")
        .user_agent("test-agent")
        .build();

    assert_eq!(config.base_url.as_deref(), Some("https://api.reliefweb.int/v1"));
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.user_agent, "test-agent");
    assert_eq!(
        config.default_headers.get("Accept").map(String::as_str),
        Some("application/json")
    );
}

#[test]
fn test_invalid_base_url_is_config_error() {
    let config = HttpClientConfig::builder().base_url("not a url").build();
    let err = HttpClient::new(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_build_url() {
    let client = HttpClient::new(
        HttpClientConfig::builder()
            .base_url("https://api.example.com/v1")
            .build(),
    )
    .unwrap();

    assert_eq!(
        client.build_url("reports").unwrap().as_str(),
        "https://api.example.com/v1/reports"
    );
    assert_eq!(
        client.build_url("/reports").unwrap().as_str(),
        "https://api.example.com/v1/reports"
    );
    assert_eq!(
        client.build_url("https://other.example.com/x").unwrap().as_str(),
        "https://other.example.com/x"
    );
}

#[test]
fn test_relative_path_without_base_url() {
    let client = HttpClient::new(HttpClientConfig::default()).unwrap();
    let err = client.build_url("reports").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_prepare_request() {
    let client = HttpClient::with_auth(
        HttpClientConfig::builder()
            .base_url("https://api.example.com/")
            .header("Accept", "application/json")
            .build(),
        AuthConfig::Bearer {
            token: "static".to_string(),
        },
    )
    .unwrap();

    let req = client
        .prepare_request(
            Method::POST,
            "v1/reports",
            &RequestConfig::new()
                .query("appname", "wrapkit")
                .header("Accept", "application/vnd.api+json")
                .json(json!({"limit": 10}))
                .timeout(Duration::from_secs(3)),
        )
        .await
        .unwrap();

    assert_eq!(req.method, Method::POST);
    assert_eq!(req.url.as_str(), "https://api.example.com/v1/reports");
    assert_eq!(req.header("accept"), Some("application/vnd.api+json"));
    assert_eq!(req.header("Authorization"), Some("Bearer static"));
    assert_eq!(req.query_value("appname"), Some("wrapkit"));
    assert_eq!(req.body, Some(json!({"limit": 10})));
    assert_eq!(req.timeout, Duration::from_secs(3));
    assert_eq!(
        req.full_url().as_str(),
        "https://api.example.com/v1/reports?appname=wrapkit"
    );
}

// ============================================================================
// Classification
// ============================================================================

#[tokio::test]
async fn test_status_classification() {
    let server = MockServer::start().await;
    for (status, route) in [(400, "/bad"), (401, "/denied"), (404, "/missing"), (502, "/down")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string("detail"))
            .mount(&server)
            .await;
    }

    let client = HttpClient::new(config_for(&server)).unwrap();
    let kind_of = |route: &'static str| {
        let client = client.clone();
        async move {
            client
                .execute(Method::GET, route, &RequestConfig::new())
                .await
                .unwrap_err()
                .kind()
        }
    };

    assert_eq!(kind_of("bad").await, ErrorKind::Client);
    assert_eq!(kind_of("denied").await, ErrorKind::Authentication);
    assert_eq!(kind_of("missing").await, ErrorKind::NotFound);
    assert_eq!(kind_of("down").await, ErrorKind::Server);
}

#[tokio::test]
async fn test_server_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(500).set_body_string("stack trace"))
        .mount(&server)
        .await;

    let client = HttpClient::new(config_for(&server)).unwrap();
    let err = client
        .execute(Method::GET, "items", &RequestConfig::new())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, Error::Server { status: 500, ref body } if body == "stack trace"));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = HttpClient::new(config_for(&server)).unwrap();
    let err = client
        .execute(
            Method::GET,
            "slow",
            &RequestConfig::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    let client = HttpClient::new(
        HttpClientConfig::builder()
            .base_url("http://127.0.0.1:1")
            .timeout(Duration::from_secs(2))
            .build(),
    )
    .unwrap();

    let err = client
        .execute(Method::GET, "items", &RequestConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

// ============================================================================
// JSON decoding
// ============================================================================

#[tokio::test]
async fn test_no_content_decodes_as_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tas/api/incidents"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = HttpClient::new(config_for(&server)).unwrap();
    let value = client
        .execute_json(Method::GET, "tas/api/incidents", &RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let client = HttpClient::new(config_for(&server)).unwrap();
    let err = client
        .execute_json(Method::GET, "page", &RequestConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn test_get_json_typed() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Country {
        iso3: String,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/country"))
        .and(query_param("iso3", "SDN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"iso3": "SDN"})))
        .mount(&server)
        .await;

    let client = HttpClient::new(config_for(&server)).unwrap();
    let country: Country = client
        .get_json("country", &RequestConfig::new().query("iso3", "SDN"))
        .await
        .unwrap();
    assert_eq!(
        country,
        Country {
            iso3: "SDN".to_string()
        }
    );
}

// ============================================================================
// Refresh on rejection
// ============================================================================

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let client = HttpClient::with_auth(config_for(&server), rotating_tokens(Arc::clone(&calls))).unwrap();

    let value = client
        .execute_json(Method::GET, "items", &RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(value, json!([{"id": 1}]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_rejections_refresh_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(150)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(2)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let client = HttpClient::with_auth(config_for(&server), rotating_tokens(Arc::clone(&calls))).unwrap();
    let request = RequestConfig::new();

    let (a, b) = tokio::join!(
        client.execute_json(Method::GET, "items", &request),
        client.execute_json(Method::GET, "items", &request),
    );

    assert_eq!(a.unwrap(), json!([{"id": 1}]));
    assert_eq!(b.unwrap(), json!([{"id": 1}]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_rejection_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(2)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let client = HttpClient::with_auth(config_for(&server), rotating_tokens(Arc::clone(&calls))).unwrap();

    let err = client
        .execute(Method::GET, "items", &RequestConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication { status: Some(403), .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_static_credential_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_auth(
        config_for(&server),
        AuthConfig::Bearer {
            token: "revoked".to_string(),
        },
    )
    .unwrap();

    let err = client
        .execute(Method::GET, "items", &RequestConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_failed_refresh_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let refresher: Arc<dyn CredentialRefresher> =
        Arc::new(FnRefresher::new(|_current: Option<CachedToken>| async {
            Err::<CachedToken, _>(Error::auth("account locked"))
        }));
    let authenticator = Arc::new(
        Authenticator::new(AuthConfig::Refreshable {
            refresher,
            token_header: "Authorization".to_string(),
            token_prefix: None,
        })
        .unwrap(),
    );
    let client = HttpClient::with_authenticator(config_for(&server), authenticator).unwrap();

    let err = client
        .execute(Method::GET, "items", &RequestConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(client.authenticator().is_some());
}
