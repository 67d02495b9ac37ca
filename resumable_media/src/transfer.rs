//! The common state every transfer shares (spec §3 "Transfer" base entity).
//!
//! Rust has no struct inheritance, so `Download`, `ChunkedDownload`, and the
//! three upload entities each embed a [`TransferBase`] rather than extending
//! one. `Upload` gets its own thin [`UploadBase`] — same shape, different
//! field name for the URL — rather than forcing both onto one type and
//! leaving half the fields unused.

use http::HeaderMap;

use crate::range::format_range;

/// Shared state for the two download entities: URL, optional byte range,
/// caller headers, and the monotonic `finished` flag.
///
/// Headers are cloned on entry rather than mutated in the caller's own map
/// (design note §9, resolved in favor of the "clone on entry" branch — see
/// `DESIGN.md`). [`TransferBase::headers`] exposes the result, including any
/// header the engine itself adds before a request.
#[derive(Debug, Clone)]
pub struct TransferBase {
    pub media_url: String,
    pub start: Option<i64>,
    pub end: Option<i64>,
    headers: HeaderMap,
    pub finished: bool,
}

impl TransferBase {
    pub fn new(media_url: impl Into<String>, start: Option<i64>, end: Option<i64>, headers: HeaderMap) -> Self {
        Self {
            media_url: media_url.into(),
            start,
            end,
            headers,
            finished: false,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Spec §4.1 `Range:` formatting applied to this transfer's current
    /// `start`/`end`.
    pub fn range_header(&self) -> Option<String> {
        format_range(self.start, self.end)
    }
}

/// Shared state for the three upload entities (spec §3 "Upload" base).
#[derive(Debug, Clone)]
pub struct UploadBase {
    pub upload_url: String,
    headers: HeaderMap,
    pub finished: bool,
}

impl UploadBase {
    pub fn new(upload_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            upload_url: upload_url.into(),
            headers,
            finished: false,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}
