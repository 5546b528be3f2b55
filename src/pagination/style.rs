//! Page envelope styles
//!
//! Each style knows how to turn a [`PageRequest`] into page parameters and
//! how to read the continuation back out of a response body.

use super::types::{Continuation, Cursor, PageRequest};
use crate::decode::{extract_path_string, extract_path_u64};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde_json::json;

/// Where page parameters are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamLocation {
    /// Query string
    #[default]
    Query,
    /// Top-level fields of the JSON body
    Body,
}

/// How an API splits a listing into pages
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageStyle {
    /// One request returns everything
    #[default]
    Single,

    /// The body carries the absolute URL of the next page (e.g. `next`)
    NextUrl {
        /// Path of the next URL in the body
        next_path: String,
        /// Page size parameter for the first request
        size_param: Option<String>,
    },

    /// The body carries an opaque token for the next page
    Cursor {
        /// Parameter the token is sent in
        cursor_param: String,
        /// Path of the token in the body
        cursor_path: String,
        /// Page size parameter
        size_param: Option<String>,
    },

    /// Record offset and limit parameters (e.g. `start`/`pageSize`)
    Offset {
        /// Offset parameter name
        offset_param: String,
        /// Limit parameter name
        limit_param: String,
    },

    /// Page number parameter (e.g. `page`/`size`)
    PageNumber {
        /// Page number parameter name
        page_param: String,
        /// Page size parameter name
        size_param: Option<String>,
        /// Number of the first page, usually 0 or 1
        start_page: u64,
        /// Path of the total page count in the body
        total_pages_path: Option<String>,
    },
}

impl PageStyle {
    /// Next-URL style reading `next_path`
    pub fn next_url(next_path: impl Into<String>) -> Self {
        Self::NextUrl {
            next_path: next_path.into(),
            size_param: None,
        }
    }

    /// Token style
    pub fn cursor(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self::Cursor {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
            size_param: None,
        }
    }

    /// Offset/limit style
    pub fn offset(offset_param: impl Into<String>, limit_param: impl Into<String>) -> Self {
        Self::Offset {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
        }
    }

    /// Page number style
    pub fn page_number(page_param: impl Into<String>, start_page: u64) -> Self {
        Self::PageNumber {
            page_param: page_param.into(),
            size_param: None,
            start_page,
            total_pages_path: None,
        }
    }

    /// Set the page size parameter. Ignored by styles without one.
    #[must_use]
    pub fn with_size_param(mut self, param: impl Into<String>) -> Self {
        match &mut self {
            Self::NextUrl { size_param, .. }
            | Self::Cursor { size_param, .. }
            | Self::PageNumber { size_param, .. } => *size_param = Some(param.into()),
            Self::Single | Self::Offset { .. } => {}
        }
        self
    }

    /// Set the total page count path of a page number style
    #[must_use]
    pub fn with_total_pages_path(mut self, path: impl Into<String>) -> Self {
        if let Self::PageNumber {
            total_pages_path, ..
        } = &mut self
        {
            *total_pages_path = Some(path.into());
        }
        self
    }

    /// Style name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::NextUrl { .. } => "next_url",
            Self::Cursor { .. } => "cursor",
            Self::Offset { .. } => "offset",
            Self::PageNumber { .. } => "page_number",
        }
    }

    /// Page parameters for `request`
    ///
    /// Fails with a configuration error when the request carries a cursor of
    /// a kind this style does not produce.
    pub fn request_params(&self, request: &PageRequest) -> Result<Vec<(String, JsonValue)>> {
        let mut params = Vec::new();

        match self {
            Self::Single => {
                self.expect_first_page(request)?;
            }

            Self::NextUrl { size_param, .. } => match &request.cursor {
                // The next URL already carries every parameter
                Some(Cursor::Url(_)) => {}
                None => push_size(&mut params, size_param.as_deref(), request.page_size),
                Some(other) => return Err(self.cursor_mismatch(other)),
            },

            Self::Cursor {
                cursor_param,
                size_param,
                ..
            } => {
                match &request.cursor {
                    Some(Cursor::Token(token)) => {
                        params.push((cursor_param.clone(), json!(token)));
                    }
                    None => {}
                    Some(other) => return Err(self.cursor_mismatch(other)),
                }
                push_size(&mut params, size_param.as_deref(), request.page_size);
            }

            Self::Offset {
                offset_param,
                limit_param,
            } => {
                let offset = match &request.cursor {
                    Some(Cursor::Offset(offset)) => *offset,
                    None => 0,
                    Some(other) => return Err(self.cursor_mismatch(other)),
                };
                params.push((offset_param.clone(), json!(offset)));
                push_size(&mut params, Some(limit_param), request.page_size);
            }

            Self::PageNumber {
                page_param,
                size_param,
                start_page,
                ..
            } => {
                let page = match &request.cursor {
                    Some(Cursor::Page(page)) => *page,
                    None => *start_page,
                    Some(other) => return Err(self.cursor_mismatch(other)),
                };
                params.push((page_param.clone(), json!(page)));
                push_size(&mut params, size_param.as_deref(), request.page_size);
            }
        }

        Ok(params)
    }

    /// Absolute URL that replaces the request path, if the cursor carries one
    pub fn url_override<'a>(&self, request: &'a PageRequest) -> Option<&'a str> {
        match (self, &request.cursor) {
            (Self::NextUrl { .. }, Some(Cursor::Url(url))) => Some(url),
            _ => None,
        }
    }

    /// Read the continuation from a decoded page
    ///
    /// `records` is the number of records the page held and `total` the
    /// server-reported record total, if any.
    pub fn continuation(
        &self,
        body: &JsonValue,
        request: &PageRequest,
        records: usize,
        total: Option<u64>,
    ) -> Continuation {
        match self {
            Self::Single => Continuation::Done,

            Self::NextUrl { next_path, .. } => match extract_path_string(body, next_path) {
                Some(next) if !next.is_empty() => Continuation::Next(Cursor::Url(next)),
                _ => Continuation::Done,
            },

            Self::Cursor { cursor_path, .. } => match extract_path_string(body, cursor_path) {
                Some(token) if !token.is_empty() => Continuation::Next(Cursor::Token(token)),
                _ => Continuation::Done,
            },

            Self::Offset { .. } => {
                if is_short_page(records, request.page_size) {
                    return Continuation::Done;
                }
                let offset = match request.cursor {
                    Some(Cursor::Offset(offset)) => offset,
                    _ => 0,
                };
                let next = offset + records as u64;
                if total.is_some_and(|total| next >= total) {
                    Continuation::Done
                } else {
                    Continuation::Next(Cursor::Offset(next))
                }
            }

            Self::PageNumber {
                start_page,
                total_pages_path,
                ..
            } => {
                if is_short_page(records, request.page_size) {
                    return Continuation::Done;
                }
                let page = match request.cursor {
                    Some(Cursor::Page(page)) => page,
                    _ => *start_page,
                };
                let pages_seen = page.saturating_sub(*start_page) + 1;

                let total_pages = total_pages_path
                    .as_deref()
                    .and_then(|path| extract_path_u64(body, path));
                if total_pages.is_some_and(|total_pages| pages_seen >= total_pages) {
                    return Continuation::Done;
                }

                let records_seen = request
                    .page_size
                    .map(|size| pages_seen * u64::from(size));
                if let (Some(total), Some(seen)) = (total, records_seen) {
                    if seen >= total {
                        return Continuation::Done;
                    }
                }

                Continuation::Next(Cursor::Page(page + 1))
            }
        }
    }

    fn expect_first_page(&self, request: &PageRequest) -> Result<()> {
        match &request.cursor {
            None => Ok(()),
            Some(other) => Err(self.cursor_mismatch(other)),
        }
    }

    fn cursor_mismatch(&self, cursor: &Cursor) -> Error {
        Error::config(format!(
            "Cursor '{cursor}' cannot be used with {} pagination",
            self.name()
        ))
    }
}

fn push_size(params: &mut Vec<(String, JsonValue)>, param: Option<&str>, size: Option<u32>) {
    if let (Some(param), Some(size)) = (param, size) {
        params.push((param.to_string(), json!(size)));
    }
}

/// An empty page, or one shorter than the requested size, is the last one
fn is_short_page(records: usize, page_size: Option<u32>) -> bool {
    records == 0 || page_size.is_some_and(|size| records < size as usize)
}
