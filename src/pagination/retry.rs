//! Retry wrapper for page fetchers
//!
//! The driver never retries. Wrapping a fetcher in [`RetryingFetcher`]
//! re-issues the same [`PageRequest`] after server and transport failures.

use super::types::{PageFetcher, PageRequest, PageResult};
use crate::error::Result;
use crate::types::BackoffType;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// When and how often to retry a page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff growth
    pub backoff_type: BackoffType,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on any delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set backoff settings
    #[must_use]
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before retry number `attempt + 1`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => self
                .initial_backoff
                .saturating_mul(2u32.saturating_pow(attempt)),
        };

        delay.min(self.max_backoff)
    }
}

/// A [`PageFetcher`] that retries retryable failures with backoff
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F> RetryingFetcher<F> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Get the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get the wrapped fetcher
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RetryingFetcher<F> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        let mut attempt = 0;

        loop {
            match self.inner.fetch_page(request).await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.calculate_backoff(attempt);
                    warn!(
                        path = %request.path,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_retries + 1,
                        ?delay,
                        "Page fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn max_page_size(&self) -> Option<u32> {
        self.inner.max_page_size()
    }
}
