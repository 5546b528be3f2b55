//! HTTP client module
//!
//! Provides the authenticated session every listing runs on.
//!
//! # Features
//!
//! - **Request Descriptors**: URL, headers, query and auth material prepared
//!   before anything is sent
//! - **Credential Refresh**: expiring tokens are refreshed before use, and
//!   once more if the target API rejects them
//! - **Error Classification**: status classes and transport failures mapped
//!   onto one error taxonomy

mod classify;
mod client;
mod request;

pub use classify::{classify_response, classify_status, classify_transport};
pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use request::RequestDescriptor;

#[cfg(test)]
mod tests;
