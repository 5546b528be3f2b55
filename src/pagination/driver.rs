//! Pagination driver
//!
//! Walks a listing page by page through a [`PageFetcher`]. Pages are fetched
//! strictly in cursor order since each request depends on the previous
//! page's continuation. The driver never retries; wrap the fetcher in a
//! [`RetryingFetcher`](super::RetryingFetcher) for that.

use super::types::{Continuation, ListingSession, PageFetcher, PageRequest};
use crate::error::{Error, Result};
use crate::types::Record;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Options for one drain
#[derive(Debug, Clone, Default)]
pub struct DrainOptions {
    /// Stop after this many records
    pub max_records: Option<usize>,
    /// Checked before each page fetch
    pub cancel: Option<CancellationToken>,
}

impl DrainOptions {
    /// Drain everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `max` records
    #[must_use]
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    /// Stop between pages once `token` is cancelled
    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Why a drain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The server signalled the last page
    #[default]
    Exhausted,
    /// `max_records` was reached
    MaxRecords,
    /// The cancellation token fired between pages
    Cancelled,
    /// A page fetch failed
    Failed,
}

/// Records obtained by a drain
#[derive(Debug, Clone, Default)]
pub struct Drained {
    /// Records in server order
    pub records: Vec<Record>,
    /// Final session state
    pub session: ListingSession,
    /// Why the drain stopped
    pub stop: StopReason,
}

/// A drain aborted by a failed page fetch
#[derive(Debug, Error)]
#[error("{error} (after {} records)", partial.records.len())]
pub struct DrainError {
    /// The page fetch failure
    #[source]
    pub error: Error,
    /// Everything obtained before the failure
    pub partial: Drained,
}

impl From<DrainError> for Error {
    fn from(err: DrainError) -> Self {
        err.error
    }
}

/// Steps through a listing one page at a time
pub struct Pager<'a, F: ?Sized> {
    fetcher: &'a F,
    next_request: Option<PageRequest>,
    session: ListingSession,
    max_records: Option<usize>,
    cancel: Option<CancellationToken>,
    stop: Option<StopReason>,
}

impl<'a, F: PageFetcher + ?Sized> Pager<'a, F> {
    /// Start a listing. A page size above the fetcher's ceiling is clamped.
    pub fn new(fetcher: &'a F, initial: PageRequest, options: DrainOptions) -> Self {
        let mut initial = initial;
        let mut session = ListingSession {
            cursor: initial.cursor.clone(),
            ..ListingSession::default()
        };

        if let (Some(requested), Some(max)) = (initial.page_size, fetcher.max_page_size()) {
            if requested > max {
                warn!(
                    path = %initial.path,
                    requested,
                    max,
                    "Page size above the API maximum, clamping"
                );
                initial.page_size = Some(max);
                session.clamped_from = Some(requested);
            }
        }
        session.page_size = initial.page_size;

        Self {
            fetcher,
            next_request: Some(initial),
            session,
            max_records: options.max_records,
            cancel: options.cancel,
            stop: None,
        }
    }

    /// Session state so far
    pub fn session(&self) -> &ListingSession {
        &self.session
    }

    /// Why the listing stopped, once it has
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// Fetch the next page. `Ok(None)` once the listing is over.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Record>>> {
        let Some(request) = self.next_request.take() else {
            return Ok(None);
        };

        if let Some(max) = self.max_records {
            if self.session.records_fetched >= max as u64 {
                self.stop = Some(StopReason::MaxRecords);
                return Ok(None);
            }
        }

        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            info!(
                path = %request.path,
                records = self.session.records_fetched,
                "Listing cancelled"
            );
            self.stop = Some(StopReason::Cancelled);
            return Ok(None);
        }

        debug!(
            path = %request.path,
            cursor = ?request.cursor,
            page = self.session.pages_fetched + 1,
            "Fetching page"
        );
        let page = match self.fetcher.fetch_page(&request).await {
            Ok(page) => page,
            Err(e) => {
                self.stop = Some(StopReason::Failed);
                return Err(e);
            }
        };

        self.session.pages_fetched += 1;
        if page.total.is_some() {
            self.session.total_expected = page.total;
        }

        let mut records = page.records;
        let mut reached_max = false;
        let mut truncated = false;
        if let Some(max) = self.max_records {
            let remaining = (max as u64).saturating_sub(self.session.records_fetched) as usize;
            if records.len() >= remaining {
                truncated = records.len() > remaining;
                records.truncate(remaining);
                reached_max = true;
            }
        }
        self.session.records_fetched += records.len() as u64;

        match page.continuation {
            // Records were dropped, so the listing was not fully read
            Continuation::Done if truncated => {
                self.session.cursor = None;
                self.stop = Some(StopReason::MaxRecords);
            }
            Continuation::Done => {
                self.session.exhausted = true;
                self.session.cursor = None;
                self.stop = Some(StopReason::Exhausted);
            }
            Continuation::Next(_) if reached_max => {
                self.stop = Some(StopReason::MaxRecords);
            }
            // An empty page that points back at itself can never progress
            Continuation::Next(ref cursor)
                if records.is_empty() && request.cursor.as_ref() == Some(cursor) =>
            {
                warn!(path = %request.path, %cursor, "Empty page repeats its cursor, stopping");
                self.session.exhausted = true;
                self.stop = Some(StopReason::Exhausted);
            }
            Continuation::Next(cursor) => {
                self.session.cursor = Some(cursor.clone());
                self.next_request = Some(request.with_cursor(cursor));
            }
        }

        Ok(Some(records))
    }

    /// Consume the pager, returning its session
    pub fn into_session(self) -> ListingSession {
        self.session
    }
}

/// Drain a listing into memory
///
/// Stops when the server signals the last page, when `max_records` is
/// reached, when the cancellation token fires (between pages), or when a
/// page fetch fails. On failure the records obtained so far are returned in
/// [`DrainError::partial`].
pub async fn drain<F: PageFetcher + ?Sized>(
    fetcher: &F,
    initial: PageRequest,
    options: DrainOptions,
) -> std::result::Result<Drained, DrainError> {
    let mut pager = Pager::new(fetcher, initial, options);
    let mut records = Vec::new();

    loop {
        match pager.next_page().await {
            Ok(Some(page)) => records.extend(page),
            Ok(None) => break,
            Err(error) => {
                warn!(
                    error = %error,
                    records = records.len(),
                    "Listing aborted by failed page fetch"
                );
                return Err(DrainError {
                    error,
                    partial: Drained {
                        records,
                        session: pager.into_session(),
                        stop: StopReason::Failed,
                    },
                });
            }
        }
    }

    let stop = pager.stop_reason().unwrap_or_default();
    let session = pager.into_session();
    debug!(
        records = records.len(),
        pages = session.pages_fetched,
        ?stop,
        "Listing drained"
    );

    Ok(Drained {
        records,
        session,
        stop,
    })
}

/// Lazily stream the records of a listing
///
/// Pages are fetched on demand. A failed fetch is yielded once as an error
/// and ends the stream; records yielded before it stay valid.
pub fn stream_records<'a, F: PageFetcher + ?Sized>(
    fetcher: &'a F,
    initial: PageRequest,
    options: DrainOptions,
) -> BoxStream<'a, Result<Record>> {
    let pager = Pager::new(fetcher, initial, options);

    stream::unfold(
        (pager, VecDeque::new(), false),
        |(mut pager, mut buffer, failed)| async move {
            loop {
                if let Some(record) = buffer.pop_front() {
                    return Some((Ok(record), (pager, buffer, failed)));
                }
                if failed {
                    return None;
                }
                match pager.next_page().await {
                    Ok(Some(records)) => buffer.extend(records),
                    Ok(None) => return None,
                    Err(e) => return Some((Err(e), (pager, buffer, true))),
                }
            }
        },
    )
    .boxed()
}
