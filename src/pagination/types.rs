//! Pagination types and traits
//!
//! Defines the page request/result shapes and the [`PageFetcher`] contract
//! every listing is driven through.

use crate::error::{Error, Result};
use crate::types::Record;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Where the next page begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Opaque continuation token
    Token(String),
    /// Numeric record offset
    Offset(u64),
    /// Page number
    Page(u64),
    /// Absolute URL of the next page
    Url(String),
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cursor::Token(t) => write!(f, "token:{t}"),
            Cursor::Offset(o) => write!(f, "offset:{o}"),
            Cursor::Page(p) => write!(f, "page:{p}"),
            Cursor::Url(u) => write!(f, "url:{u}"),
        }
    }
}

/// Describes one page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Endpoint path, relative to the client's base URL or absolute
    pub path: String,
    /// Where this page begins; `None` for the first page
    pub cursor: Option<Cursor>,
    /// Records per page; the endpoint default when unset
    pub page_size: Option<u32>,
    /// Filter parameters
    pub filters: BTreeMap<String, String>,
}

impl PageRequest {
    /// Request the first page of `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cursor: None,
            page_size: None,
            filters: BTreeMap::new(),
        }
    }

    /// Set the cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Add a filter parameter, replacing an existing one with the same key
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Reject a page size above `max` before any network call
    pub fn validate_page_size(&self, max: Option<u32>) -> Result<()> {
        match (self.page_size, max) {
            (Some(requested), Some(max)) if requested > max => {
                Err(Error::PageSizeExceeded { requested, max })
            }
            (Some(0), _) => Err(Error::invalid_value("page_size", "must be at least 1")),
            _ => Ok(()),
        }
    }
}

/// Whether more pages exist after this one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Fetch the next page from this cursor
    Next(Cursor),
    /// No more pages
    Done,
}

impl Continuation {
    /// Check if this is the last page
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// One decoded page
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Records in server order
    pub records: Vec<Record>,
    /// Where the next page begins
    pub continuation: Continuation,
    /// Total number of records, if the server reports it
    pub total: Option<u64>,
}

impl PageResult {
    /// A page followed by more pages
    pub fn next(records: Vec<Record>, cursor: Cursor) -> Self {
        Self {
            records,
            continuation: Continuation::Next(cursor),
            total: None,
        }
    }

    /// The final page
    pub fn last(records: Vec<Record>) -> Self {
        Self {
            records,
            continuation: Continuation::Done,
            total: None,
        }
    }

    /// Attach the server-reported total
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

/// Aggregation state while draining one listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSession {
    /// Cursor of the next page to fetch
    pub cursor: Option<Cursor>,
    /// Records handed to the caller so far
    pub records_fetched: u64,
    /// Pages fetched so far
    pub pages_fetched: u32,
    /// Total reported by the server, if any
    pub total_expected: Option<u64>,
    /// Page size sent with each request
    pub page_size: Option<u32>,
    /// Requested page size, when it was clamped to the ceiling
    pub clamped_from: Option<u32>,
    /// The server signalled the last page
    pub exhausted: bool,
}

/// Performs one page fetch against a specific API
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and decode one page. Must be safe to call again with the same
    /// request.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult>;

    /// Largest page size the API accepts
    fn max_page_size(&self) -> Option<u32> {
        None
    }
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        (**self).fetch_page(request).await
    }

    fn max_page_size(&self) -> Option<u32> {
        (**self).max_page_size()
    }
}

/// Adapts an async closure into a [`PageFetcher`]
pub struct FnFetcher<F> {
    f: F,
    max_page_size: Option<u32>,
}

impl<F> FnFetcher<F> {
    /// Wrap a closure called with each page request
    pub fn new(f: F) -> Self {
        Self {
            f,
            max_page_size: None,
        }
    }

    /// Declare the API's page size ceiling
    #[must_use]
    pub fn with_max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = Some(max);
        self
    }
}

#[async_trait]
impl<F, Fut, E> PageFetcher for FnFetcher<F>
where
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<PageResult, E>> + Send,
    E: Into<Error>,
{
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        (self.f)(request.clone()).await.map_err(Into::into)
    }

    fn max_page_size(&self) -> Option<u32> {
        self.max_page_size
    }
}
