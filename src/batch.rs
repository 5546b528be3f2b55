//! Per-item fetches
//!
//! Fetches single resources (one report, one incident) one after another
//! over the same authenticated session.

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::types::{ItemPolicy, JsonValue, Method};
use tracing::{debug, warn};

/// Results of a batch fetch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Fetched resources, in request order
    pub items: Vec<(String, JsonValue)>,
    /// Items that failed under [`ItemPolicy::Skip`]
    pub failures: Vec<(String, Error)>,
}

impl BatchOutcome {
    /// Check if every item was fetched
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// GET each path in turn
///
/// With [`ItemPolicy::Abort`] the first failure is returned and later paths
/// are not requested. With [`ItemPolicy::Skip`] failures are collected in
/// [`BatchOutcome::failures`].
pub async fn fetch_each<I, S>(
    client: &HttpClient,
    paths: I,
    policy: ItemPolicy,
) -> Result<BatchOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let config = RequestConfig::new();
    let mut outcome = BatchOutcome::default();

    for path in paths {
        let path = path.as_ref();
        match client.execute_json(Method::GET, path, &config).await {
            Ok(value) => {
                debug!(path, "Fetched item");
                outcome.items.push((path.to_string(), value));
            }
            Err(e) => match policy {
                ItemPolicy::Abort => return Err(e),
                ItemPolicy::Skip => {
                    warn!(path, error = %e, "Skipping failed item");
                    outcome.failures.push((path.to_string(), e));
                }
            },
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::HttpClientConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/reports/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/reports/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/reports/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer) -> HttpClient {
        HttpClient::new(HttpClientConfig::builder().base_url(server.uri()).build()).unwrap()
    }

    const PATHS: [&str; 3] = ["v1/reports/1", "v1/reports/2", "v1/reports/3"];

    #[tokio::test]
    async fn test_skip_collects_failures() {
        let server = server().await;
        let outcome = fetch_each(&client(&server), PATHS, ItemPolicy::Skip)
            .await
            .unwrap();

        assert_eq!(
            outcome.items,
            vec![
                ("v1/reports/1".to_string(), json!({"id": 1})),
                ("v1/reports/3".to_string(), json!({"id": 3})),
            ]
        );
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "v1/reports/2");
        assert_eq!(outcome.failures[0].1.kind(), ErrorKind::NotFound);
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn test_abort_stops_at_first_failure() {
        let server = server().await;
        let err = fetch_each(&client(&server), PATHS, ItemPolicy::Abort)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let requested: Vec<String> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(requested, vec!["/v1/reports/1", "/v1/reports/2"]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let server = server().await;
        let outcome = fetch_each(&client(&server), Vec::<String>::new(), ItemPolicy::Abort)
            .await
            .unwrap();
        assert!(outcome.items.is_empty());
        assert!(outcome.is_complete());
    }
}
