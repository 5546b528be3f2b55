//! Pagination module
//!
//! Supports: Next URL, Cursor, Offset, Page Number, Single
//!
//! # Overview
//!
//! A listing is driven by [`drain`] (or lazily by [`stream_records`]) over
//! any [`PageFetcher`]. The driver owns termination: last page, record
//! limit, cancellation and failure. Fetchers own everything API specific,
//! including retries ([`RetryingFetcher`]).

mod driver;
mod fetcher;
mod retry;
mod style;
mod types;

pub use driver::{drain, stream_records, DrainError, DrainOptions, Drained, Pager, StopReason};
pub use fetcher::HttpPageFetcher;
pub use retry::{RetryPolicy, RetryingFetcher};
pub use style::{PageStyle, ParamLocation};
pub use types::{
    Continuation, Cursor, FnFetcher, ListingSession, PageFetcher, PageRequest, PageResult,
};
