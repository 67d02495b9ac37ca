//! Download state machines (spec §4.5): one-shot [`Download`] and sequential
//! [`ChunkedDownload`].
//!
//! Both entities are generic over the caller's sink type and carry a
//! blocking (`Write` / `std::io::Write`) and a cooperative (`AsyncWrite`)
//! set of methods side by side — the same pattern used for the two
//! [`crate::transport`] traits, so the protocol decisions (range slicing,
//! status validation, `Content-Range` bookkeeping) are written once as
//! ordinary functions and only the I/O call differs between the two impls.

use std::io::Write;
use std::time::Duration;

use http::header::{CONTENT_ENCODING, CONTENT_RANGE, RANGE};
use http::{HeaderMap, HeaderValue, Method};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::checksum::{verify, Checksum, ChecksumKind, HASH_HEADER};
use crate::error::{require_status, required_header, Error};
use crate::range::{format_range, parse_content_range};
use crate::transfer::TransferBase;
use crate::transport::{AsyncTransport, BlockingBody, BodyMode, RequestSpec, Transport};

fn range_header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|_| Error::ArgumentError(format!("invalid Range header value: {value:?}")))
}

fn content_encoding_is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"))
        .unwrap_or(false)
}

/// The result of a completed [`Download::consume`] / `consume_async` call.
#[derive(Debug)]
pub struct DownloadResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub bytes_written: u64,
}

/// One-shot ranged download with optional checksum verification (spec §4.5
/// "One-shot Download").
pub struct Download<W> {
    base: TransferBase,
    checksum_kind: ChecksumKind,
    /// Whether a gzip-encoded response is decoded for the sink (spec §4.2,
    /// §9 "decoded vs raw body" — modeled here as a configuration bit on
    /// the entity rather than a second `Download` type). Checksum
    /// verification always runs over the wire bytes either way, since the
    /// server computes its digest before compression is undone.
    body_mode: BodyMode,
    sink: W,
}

impl<W> Download<W> {
    pub fn new(
        media_url: impl Into<String>,
        start: Option<i64>,
        end: Option<i64>,
        headers: HeaderMap,
        checksum_kind: ChecksumKind,
        sink: W,
    ) -> Self {
        Self {
            base: TransferBase::new(media_url, start, end, headers),
            checksum_kind,
            body_mode: BodyMode::Decoded,
            sink,
        }
    }

    /// Requests the raw, still-compressed body be written to the sink
    /// rather than gzip-decoded (spec §4.2: "when the caller requests
    /// verification over the raw stream, no decoder is inserted").
    pub fn with_raw_body(mut self) -> Self {
        self.body_mode = BodyMode::Raw;
        self
    }

    pub fn finished(&self) -> bool {
        self.base.finished
    }

    pub fn headers(&self) -> &HeaderMap {
        self.base.headers()
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    fn build_request(&self) -> RequestSpec {
        let mut headers = self.base.headers().clone();
        if let Some(range) = self.base.range_header() {
            if let Ok(value) = range_header_value(&range) {
                headers.insert(RANGE, value);
            }
        }
        RequestSpec::new(Method::GET, self.base.media_url.clone())
            .with_headers(headers)
            .with_body_mode(BodyMode::Raw)
    }

    /// On a checksum mismatch the transfer clears its range so a caller
    /// retrying with a fresh `Download` starts the whole object over again
    /// (spec §4.5 step 3: "defensive: subsequent retry by caller starts from
    /// scratch").
    fn clear_range(&mut self) {
        self.base.start = None;
        self.base.end = None;
    }
}

impl<W: Write> Download<W> {
    pub fn consume(&mut self, transport: &dyn Transport, timeout: Option<(Duration, Duration)>) -> Result<DownloadResponse, Error> {
        if self.base.finished {
            return Err(Error::InvalidState("download already finished"));
        }
        let spec = self.build_request().with_timeout(timeout);
        let response = transport.request(spec)?;
        let url = self.base.media_url.clone();

        if let Err(err) = require_status(&url, response.status, &response.headers, &[200, 206]) {
            self.base.finished = true;
            return Err(err);
        }

        let mut checksum = Checksum::new(self.checksum_kind);
        let mut body = response.body;
        let mut bytes_written = 0u64;
        let gzip = self.body_mode == BodyMode::Decoded && content_encoding_is_gzip(&response.headers);
        if gzip {
            let mut decoder = flate2::write::GzDecoder::new(&mut self.sink);
            while let Some(chunk) = body.next_chunk()? {
                checksum.update(&chunk);
                decoder.write_all(&chunk)?;
                bytes_written += chunk.len() as u64;
            }
            decoder.finish()?;
        } else {
            while let Some(chunk) = body.next_chunk()? {
                checksum.update(&chunk);
                self.sink.write_all(&chunk)?;
                bytes_written += chunk.len() as u64;
            }
        }
        self.base.finished = true;

        let goog_hash = response.headers.get(HASH_HEADER).and_then(|v| v.to_str().ok());
        if let Err(err) = verify(&checksum, self.checksum_kind, goog_hash, &url, response.status, &response.headers) {
            self.clear_range();
            return Err(err);
        }

        log::info!("[download] {bytes_written} bytes from {url} (status {})", response.status);
        Ok(DownloadResponse { status: response.status, headers: response.headers, bytes_written })
    }
}

impl<W: AsyncWrite + Unpin> Download<W> {
    pub async fn consume_async(
        &mut self,
        transport: &dyn AsyncTransport,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<DownloadResponse, Error> {
        if self.base.finished {
            return Err(Error::InvalidState("download already finished"));
        }
        let spec = self.build_request().with_timeout(timeout);
        let response = transport.request(spec).await?;
        let url = self.base.media_url.clone();

        if let Err(err) = require_status(&url, response.status, &response.headers, &[200, 206]) {
            self.base.finished = true;
            return Err(err);
        }

        let mut checksum = Checksum::new(self.checksum_kind);
        let mut body = response.body;
        let mut bytes_written = 0u64;
        let gzip = self.body_mode == BodyMode::Decoded && content_encoding_is_gzip(&response.headers);
        if gzip {
            let mut decoder = flate2::write::GzDecoder::new(Vec::new());
            while let Some(chunk) = body.next_chunk().await? {
                checksum.update(&chunk);
                decoder.write_all(&chunk)?;
                let buf = decoder.get_mut();
                if !buf.is_empty() {
                    let out = std::mem::take(buf);
                    self.sink.write_all(&out).await?;
                }
                bytes_written += chunk.len() as u64;
            }
            let out = decoder.finish()?;
            if !out.is_empty() {
                self.sink.write_all(&out).await?;
            }
        } else {
            while let Some(chunk) = body.next_chunk().await? {
                checksum.update(&chunk);
                self.sink.write_all(&chunk).await?;
                bytes_written += chunk.len() as u64;
            }
        }
        self.base.finished = true;

        let goog_hash = response.headers.get(HASH_HEADER).and_then(|v| v.to_str().ok());
        if let Err(err) = verify(&checksum, self.checksum_kind, goog_hash, &url, response.status, &response.headers) {
            self.clear_range();
            return Err(err);
        }

        log::info!("[download] {bytes_written} bytes from {url} (status {})", response.status);
        Ok(DownloadResponse { status: response.status, headers: response.headers, bytes_written })
    }
}

/// The result of one [`ChunkedDownload::consume_next_chunk`] /
/// `consume_next_chunk_async` call.
#[derive(Debug)]
pub struct ChunkedDownloadResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub bytes_appended: u64,
}

/// Sequential chunked download (spec §4.5 "ChunkedDownload").
pub struct ChunkedDownload<W> {
    base: TransferBase,
    chunk_size: u64,
    bytes_downloaded: u64,
    total_bytes: Option<u64>,
    invalid: bool,
    sink: W,
}

impl<W> ChunkedDownload<W> {
    pub fn new(
        media_url: impl Into<String>,
        chunk_size: u64,
        start: Option<i64>,
        end: Option<i64>,
        headers: HeaderMap,
        sink: W,
    ) -> Result<Self, Error> {
        if chunk_size == 0 {
            return Err(Error::ArgumentError("chunk_size must be positive".to_string()));
        }
        if let Some(start) = start {
            if start < 0 {
                return Err(Error::ArgumentError("ChunkedDownload start must be >= 0".to_string()));
            }
        }
        Ok(Self {
            base: TransferBase::new(media_url, start, end, headers),
            chunk_size,
            bytes_downloaded: 0,
            total_bytes: None,
            invalid: false,
            sink,
        })
    }

    pub fn finished(&self) -> bool {
        self.base.finished
    }

    pub fn invalid(&self) -> bool {
        self.invalid
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    pub fn headers(&self) -> &HeaderMap {
        self.base.headers()
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Computes the absolute byte range for the next chunk request (spec
    /// §4.5 ChunkedDownload step 2).
    fn next_range(&self) -> (u64, u64) {
        let start = self.base.start.unwrap_or(0) as u64 + self.bytes_downloaded;
        let mut end = start + self.chunk_size - 1;
        if let Some(user_end) = self.base.end {
            end = end.min(user_end as u64);
        }
        if let Some(total) = self.total_bytes {
            if total > 0 {
                end = end.min(total - 1);
            }
        }
        (start, end)
    }

    fn build_request(&self, start: u64, end: u64) -> RequestSpec {
        let mut headers = self.base.headers().clone();
        if let Some(range) = format_range(Some(start as i64), Some(end as i64)) {
            if let Ok(value) = range_header_value(&range) {
                headers.insert(RANGE, value);
            }
        }
        RequestSpec::new(Method::GET, self.base.media_url.clone())
            .with_headers(headers)
            .with_body_mode(BodyMode::Raw)
    }

    /// Whether the absolute last byte downloaded so far reaches the
    /// caller's requested `end`, or the whole object is now accounted for.
    fn termination_reached(&self, total: u64) -> bool {
        if self.bytes_downloaded >= total {
            return true;
        }
        let last_absolute_byte = self.base.start.unwrap_or(0) as u64 + self.bytes_downloaded;
        self.base.end.map(|e| last_absolute_byte > e as u64).unwrap_or(false)
    }

    /// Applies a `416` response (spec §4.5 step 4: terminal empty object).
    fn apply_416(&mut self, headers: &HeaderMap) {
        let total = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| parse_content_range(s).ok())
            .map(|cr| cr.total)
            .unwrap_or(0);
        self.total_bytes = Some(total);
        self.base.finished = true;
        log::debug!("[chunked_download] 416 received, total_bytes={total}, terminating");
    }

    /// Applies a successful `200`/`206` response body's `Content-Range`
    /// bookkeeping (spec §4.5 step 5), without touching the sink.
    fn apply_content_range(&mut self, url: &str, status: u16, headers: &HeaderMap, appended: u64) -> Result<(), Error> {
        let content_range = required_header(url, status, headers, CONTENT_RANGE.as_str())?;
        let parsed = parse_content_range(content_range).map_err(|_| {
            self.invalid = true;
            Error::invalid_response(url, status, headers, format!("malformed Content-Range header: {content_range:?}"))
        })?;

        self.bytes_downloaded += appended;
        match self.total_bytes {
            None => self.total_bytes = Some(parsed.total),
            Some(known) if known != parsed.total => {
                self.invalid = true;
                return Err(Error::invalid_response(
                    url,
                    status,
                    headers,
                    format!("Content-Range total changed from {known} to {}", parsed.total),
                ));
            }
            _ => {}
        }

        if self.termination_reached(self.total_bytes.expect("just set above")) {
            self.base.finished = true;
        }
        Ok(())
    }
}

impl<W: Write> ChunkedDownload<W> {
    pub fn consume_next_chunk(
        &mut self,
        transport: &dyn Transport,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<ChunkedDownloadResponse, Error> {
        if self.base.finished {
            return Err(Error::ArgumentError("chunked download already finished".to_string()));
        }
        let (start, end) = self.next_range();
        let spec = self.build_request(start, end).with_timeout(timeout);
        let response = transport.request(spec)?;
        let url = self.base.media_url.clone();

        if response.status == 416 {
            self.apply_416(&response.headers);
            return Ok(ChunkedDownloadResponse { status: 416, headers: response.headers, bytes_appended: 0 });
        }

        require_status(&url, response.status, &response.headers, &[200, 206])?;

        let mut body = response.body;
        let mut appended = 0u64;
        while let Some(chunk) = body.next_chunk()? {
            self.sink.write_all(&chunk)?;
            appended += chunk.len() as u64;
        }
        self.apply_content_range(&url, response.status, &response.headers, appended)?;

        Ok(ChunkedDownloadResponse { status: response.status, headers: response.headers, bytes_appended: appended })
    }
}

impl<W: AsyncWrite + Unpin> ChunkedDownload<W> {
    pub async fn consume_next_chunk_async(
        &mut self,
        transport: &dyn AsyncTransport,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<ChunkedDownloadResponse, Error> {
        if self.base.finished {
            return Err(Error::ArgumentError("chunked download already finished".to_string()));
        }
        let (start, end) = self.next_range();
        let spec = self.build_request(start, end).with_timeout(timeout);
        let response = transport.request(spec).await?;
        let url = self.base.media_url.clone();

        if response.status == 416 {
            self.apply_416(&response.headers);
            return Ok(ChunkedDownloadResponse { status: 416, headers: response.headers, bytes_appended: 0 });
        }

        require_status(&url, response.status, &response.headers, &[200, 206])?;

        let mut body = response.body;
        let mut appended = 0u64;
        while let Some(chunk) = body.next_chunk().await? {
            self.sink.write_all(&chunk).await?;
            appended += chunk.len() as u64;
        }
        self.apply_content_range(&url, response.status, &response.headers, appended)?;

        Ok(ChunkedDownloadResponse { status: response.status, headers: response.headers, bytes_appended: appended })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_download_rejects_zero_chunk_size() {
        let err = ChunkedDownload::new("https://example.invalid/o", 0, None, None, HeaderMap::new(), Vec::<u8>::new());
        assert!(err.is_err());
    }

    #[test]
    fn chunked_download_rejects_negative_start() {
        let err = ChunkedDownload::new("https://example.invalid/o", 1024, Some(-1), None, HeaderMap::new(), Vec::<u8>::new());
        assert!(err.is_err());
    }

    #[test]
    fn next_range_clamps_to_chunk_size_and_end() {
        let cd = ChunkedDownload::new("https://example.invalid/o", 10, Some(5), Some(12), HeaderMap::new(), Vec::<u8>::new()).unwrap();
        assert_eq!(cd.next_range(), (5, 12));
    }

    #[test]
    fn next_range_accounts_for_bytes_already_downloaded() {
        let mut cd = ChunkedDownload::new("https://example.invalid/o", 10, None, None, HeaderMap::new(), Vec::<u8>::new()).unwrap();
        cd.bytes_downloaded = 20;
        assert_eq!(cd.next_range(), (20, 29));
    }

    #[test]
    fn termination_reached_when_total_hit() {
        let cd = ChunkedDownload::new("https://example.invalid/o", 10, None, None, HeaderMap::new(), Vec::<u8>::new()).unwrap();
        assert!(cd.termination_reached(0));
    }
}
