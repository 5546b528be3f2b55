//! Error classification for HTTP exchanges
//!
//! Maps the outcome of one exchange onto the crate's error taxonomy. The
//! status code decides the class; the body is attached for diagnostics and
//! never inspected.

use crate::error::{Error, Result};
use reqwest::Response;
use std::time::Duration;

/// Classify a status code. `Ok(())` for 2xx.
pub fn classify_status(status: u16, body: impl Into<String>) -> Result<()> {
    if is_success(status) {
        Ok(())
    } else {
        Err(error_for_status(status, body.into()))
    }
}

/// Classify a received response, consuming the body only on failure
pub async fn classify_response(response: Response) -> Result<Response> {
    let status = response.status().as_u16();
    if is_success(status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, body))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn error_for_status(status: u16, body: String) -> Error {
    match status {
        401 | 403 => Error::Authentication {
            status: Some(status),
            body,
        },
        404 => Error::NotFound { status },
        500..=599 => Error::Server { status, body },
        // 1xx/3xx that the client did not follow land with the other
        // unexpected statuses
        _ => Error::Client { status, body },
    }
}

/// Classify a failure below the HTTP layer
pub fn classify_transport(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        Error::Transport(err)
    }
}
