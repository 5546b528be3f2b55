//! Authentication module
//!
//! Supports: API Key, Basic, Bearer, query-parameter credentials, OAuth2
//! (client credentials and password grants), session login, and
//! caller-supplied refresh procedures.
//!
//! The `Authenticator` applies credentials to request descriptors and keeps
//! expiring tokens fresh. A token is refreshed before use once it is within
//! the safety margin of its expiry; refresh happens under an exclusive lock so
//! concurrent readers see either the old token or the new one.

mod authenticator;
mod refresh;
mod types;

pub use authenticator::{validate, Authenticator, DEFAULT_REFRESH_TIMEOUT, DEFAULT_SAFETY_MARGIN};
pub use refresh::{
    ClientCredentialsRefresher, CredentialRefresher, FnRefresher, PasswordGrantRefresher,
    SessionRefresher, DEFAULT_TOKEN_LIFETIME_SECS,
};
pub use types::{AuthConfig, CachedToken, Location};
