//! Upload state machines (spec §4.6): [`SimpleUpload`], [`MultipartUpload`],
//! and the richer [`ResumableUpload`].
//!
//! Same pairing as [`crate::download`]: every entity exposes a blocking
//! method and a cooperative (`_async`) twin built over the identical
//! request-shaping logic.

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use http::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::error::{require_status, required_header, Error};
use crate::transfer::UploadBase;
use crate::transport::{AsyncTransport, BodyMode, RequestSpec, Transport};

/// The result of a completed upload call — every upload variant hands the
/// caller the raw status/headers back for inspection (spec §4.6: "the
/// caller inspects the returned response").
#[derive(Debug)]
pub struct UploadResponse {
    pub status: u16,
    pub headers: HeaderMap,
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|_| Error::ArgumentError(format!("invalid header value: {value:?}")))
}

/// Resolves a `Location:` header against the request URL it was returned
/// for (spec §4.6 initiate: "extract `Location:` (absolute or relative)").
/// Most servers return an absolute URL, but the protocol permits a
/// relative one, so this always goes through `Url::join` rather than
/// special-casing the common case.
fn resolve_location(base_url: &str, location: &str) -> Result<String, Error> {
    let base = url::Url::parse(base_url)
        .map_err(|e| Error::ArgumentError(format!("upload_url is not a valid URL: {e}")))?;
    let resolved = base
        .join(location)
        .map_err(|_| Error::ArgumentError(format!("Location header is not a valid URL or relative reference: {location:?}")))?;
    Ok(resolved.to_string())
}

// ---------------------------------------------------------------------
// SimpleUpload
// ---------------------------------------------------------------------

/// Single-POST upload with no structure beyond the raw body (spec §4.6
/// "SimpleUpload").
pub struct SimpleUpload {
    base: UploadBase,
}

impl SimpleUpload {
    pub fn new(upload_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self { base: UploadBase::new(upload_url, headers) }
    }

    pub fn finished(&self) -> bool {
        self.base.finished
    }

    fn build_request(&self, data: Vec<u8>, content_type: &str) -> Result<RequestSpec, Error> {
        let mut headers = self.base.headers().clone();
        headers.insert(CONTENT_TYPE, header_value(content_type)?);
        Ok(RequestSpec::new(Method::POST, self.base.upload_url.clone())
            .with_headers(headers)
            .with_body(bytes::Bytes::from(data))
            .with_body_mode(BodyMode::Raw))
    }

    pub fn transmit(
        &mut self,
        transport: &dyn Transport,
        data: Vec<u8>,
        content_type: &str,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        let spec = self.build_request(data, content_type)?.with_timeout(timeout);
        let response = transport.request(spec)?;
        self.base.finished = true;
        require_status(&self.base.upload_url, response.status, &response.headers, &[200])?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }

    pub async fn transmit_async(
        &mut self,
        transport: &dyn AsyncTransport,
        data: Vec<u8>,
        content_type: &str,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        let spec = self.build_request(data, content_type)?.with_timeout(timeout);
        let response = transport.request(spec).await?;
        self.base.finished = true;
        require_status(&self.base.upload_url, response.status, &response.headers, &[200])?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }
}

// ---------------------------------------------------------------------
// MultipartUpload
// ---------------------------------------------------------------------

/// `multipart/related` upload carrying a JSON metadata part followed by the
/// media part (spec §4.6 "MultipartUpload").
pub struct MultipartUpload {
    base: UploadBase,
}

/// Generates a boundary token: a uniform random 19-digit decimal integer
/// surrounded by `===============` / `==` sentinels (resolved from
/// `original_source`'s `_get_boundary`; spec.md gives the sentinel shape,
/// the original pins the exact digit count and random range).
fn generate_boundary() -> String {
    const BOUND: u64 = 10_000_000_000_000_000_000;
    let n: u64 = rand::random::<u64>() % BOUND;
    format!("==============={n:019}==")
}

fn assemble_multipart_body(metadata_json: &str, content_type: &str, data: &[u8], boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata_json.len() + data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"content-type: application/json; charset=UTF-8\r\n");
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("content-type: {content_type}\r\n").as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--").as_bytes());
    body
}

impl MultipartUpload {
    pub fn new(upload_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self { base: UploadBase::new(upload_url, headers) }
    }

    pub fn finished(&self) -> bool {
        self.base.finished
    }

    fn build_request<M: Serialize>(&self, data: &[u8], metadata: &M, content_type: &str) -> Result<RequestSpec, Error> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| Error::ArgumentError(format!("metadata is not serializable to JSON: {e}")))?;
        let boundary = generate_boundary();
        let body = assemble_multipart_body(&metadata_json, content_type, data, &boundary);

        let mut headers = self.base.headers().clone();
        headers.insert(
            CONTENT_TYPE,
            header_value(&format!("multipart/related; boundary=\"{boundary}\""))?,
        );
        Ok(RequestSpec::new(Method::POST, self.base.upload_url.clone())
            .with_headers(headers)
            .with_body(bytes::Bytes::from(body))
            .with_body_mode(BodyMode::Raw))
    }

    pub fn transmit<M: Serialize>(
        &mut self,
        transport: &dyn Transport,
        data: &[u8],
        metadata: &M,
        content_type: &str,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        let spec = self.build_request(data, metadata, content_type)?.with_timeout(timeout);
        let response = transport.request(spec)?;
        self.base.finished = true;
        require_status(&self.base.upload_url, response.status, &response.headers, &[200])?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }

    pub async fn transmit_async<M: Serialize>(
        &mut self,
        transport: &dyn AsyncTransport,
        data: &[u8],
        metadata: &M,
        content_type: &str,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        let spec = self.build_request(data, metadata, content_type)?.with_timeout(timeout);
        let response = transport.request(spec).await?;
        self.base.finished = true;
        require_status(&self.base.upload_url, response.status, &response.headers, &[200])?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }
}

// ---------------------------------------------------------------------
// ResumableUpload
// ---------------------------------------------------------------------

/// Session-based resumable upload (spec §4.6 "ResumableUpload", the
/// richest entity in the data model).
pub struct ResumableUpload<S> {
    base: UploadBase,
    chunk_size: u64,
    stream: S,
    content_type: String,
    total_bytes: Option<u64>,
    stream_final: bool,
    resumable_url: Option<String>,
    bytes_uploaded: u64,
    finished: bool,
    invalid: bool,
}

impl<S> ResumableUpload<S> {
    /// Constructs an un-initiated resumable upload. `chunk_size` must be a
    /// positive multiple of [`crate::config::Config::min_resumable_chunk_size`]
    /// (spec §4.6 "Chunk-size validation"), checked here against the default
    /// [`crate::config::Config`]. Use [`Self::with_config`] to validate
    /// against a caller-supplied bound instead.
    pub fn new(upload_url: impl Into<String>, chunk_size: u64, headers: HeaderMap, stream: S) -> Result<Self, Error> {
        Self::with_config(upload_url, chunk_size, headers, stream, &crate::config::Config::default())
    }

    /// Same as [`Self::new`], but validates `chunk_size` against
    /// `config.min_resumable_chunk_size` rather than the default.
    pub fn with_config(
        upload_url: impl Into<String>,
        chunk_size: u64,
        headers: HeaderMap,
        stream: S,
        config: &crate::config::Config,
    ) -> Result<Self, Error> {
        if chunk_size == 0 || chunk_size % config.min_resumable_chunk_size != 0 {
            return Err(Error::ArgumentError(format!(
                "chunk_size must be a positive multiple of {} bytes",
                config.min_resumable_chunk_size
            )));
        }
        Ok(Self {
            base: UploadBase::new(upload_url, headers),
            chunk_size,
            stream,
            content_type: String::new(),
            total_bytes: None,
            stream_final: true,
            resumable_url: None,
            bytes_uploaded: 0,
            finished: false,
            invalid: false,
        })
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn invalid(&self) -> bool {
        self.invalid
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    pub fn resumable_url(&self) -> Option<&str> {
        self.resumable_url.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.base.headers()
    }

    pub fn into_stream(self) -> S {
        self.stream
    }

    fn content_range_header(&self, start: u64, end: u64, n: u64) -> String {
        match self.total_bytes {
            Some(total) => format!("bytes {start}-{end}/{total}"),
            None if n == self.chunk_size => format!("bytes {start}-{end}/*"),
            None => format!("bytes {start}-{end}/{}", start + n),
        }
    }

    fn initiate_request<M: Serialize>(
        &self,
        metadata: &M,
        content_type: &str,
        total_bytes: Option<u64>,
    ) -> Result<RequestSpec, Error> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| Error::ArgumentError(format!("metadata is not serializable to JSON: {e}")))?;
        let mut headers = self.base.headers().clone();
        headers.insert(CONTENT_TYPE, header_value("application/json; charset=UTF-8")?);
        headers.insert("x-upload-content-type", header_value(content_type)?);
        let length_value = match total_bytes {
            Some(n) => n.to_string(),
            None => "*".to_string(),
        };
        headers.insert("x-upload-content-length", header_value(&length_value)?);
        Ok(RequestSpec::new(Method::POST, self.base.upload_url.clone())
            .with_headers(headers)
            .with_body(bytes::Bytes::from(metadata_json))
            .with_body_mode(BodyMode::Raw))
    }

    fn apply_initiate_response(&mut self, content_type: &str, total_bytes: Option<u64>, stream_final: bool, response_headers: &HeaderMap, status: u16) -> Result<(), Error> {
        require_status(&self.base.upload_url, status, response_headers, &[200])?;
        let location = required_header(&self.base.upload_url, status, response_headers, LOCATION.as_str())?;
        self.resumable_url = Some(resolve_location(&self.base.upload_url, location)?);
        self.content_type = content_type.to_string();
        self.total_bytes = total_bytes;
        self.stream_final = stream_final;
        log::info!("[resumable_upload] session opened at {:?}", self.resumable_url);
        Ok(())
    }

    fn transmit_request(&self, start: u64, end: u64, n: u64, chunk: Vec<u8>) -> Result<RequestSpec, Error> {
        let resumable_url = self
            .resumable_url
            .as_ref()
            .ok_or(Error::InvalidState("resumable upload has not been initiated"))?;
        let mut headers = self.base.headers().clone();
        headers.insert(CONTENT_RANGE, header_value(&self.content_range_header(start, end, n))?);
        headers.insert(CONTENT_TYPE, header_value(&self.content_type)?);
        Ok(RequestSpec::new(Method::PUT, resumable_url.clone())
            .with_headers(headers)
            .with_body(bytes::Bytes::from(chunk))
            .with_body_mode(BodyMode::Raw))
    }

    /// Shared classification of a `transmit_next_chunk` response (spec
    /// §4.6 step 2 "Classify response").
    fn classify_transmit_response(&mut self, status: u16, headers: &HeaderMap) -> Result<(), Error> {
        match status {
            200 | 201 => {
                self.bytes_uploaded = self.total_bytes.unwrap_or(self.bytes_uploaded);
                self.finished = true;
                log::info!("[resumable_upload] upload complete, {} bytes uploaded", self.bytes_uploaded);
                Ok(())
            }
            308 => {
                let range = required_header(&self.base.upload_url, status, headers, RANGE.as_str()).map_err(|err| {
                    self.invalid = true;
                    err
                })?;
                let uploaded = parse_range_upper_bound(range).ok_or_else(|| {
                    self.invalid = true;
                    Error::invalid_response(&self.base.upload_url, status, headers, format!("malformed Range header: {range:?}"))
                })?;
                self.bytes_uploaded = uploaded + 1;
                log::debug!("[resumable_upload] chunk accepted, {} bytes uploaded so far", self.bytes_uploaded);
                Ok(())
            }
            other => {
                self.invalid = true;
                Err(Error::invalid_response(&self.base.upload_url, other, headers, "unexpected status from resumable chunk PUT"))
            }
        }
    }

    fn recover_request(&self) -> Result<RequestSpec, Error> {
        let resumable_url = self
            .resumable_url
            .as_ref()
            .ok_or(Error::InvalidState("resumable upload has not been initiated"))?;
        let mut headers = self.base.headers().clone();
        headers.insert(CONTENT_RANGE, header_value("bytes */*")?);
        Ok(RequestSpec::new(Method::PUT, resumable_url.clone()).with_headers(headers).with_body_mode(BodyMode::Raw))
    }

    fn apply_recover_response(&mut self, status: u16, headers: &HeaderMap) -> Result<u64, Error> {
        require_status(&self.base.upload_url, status, headers, &[308])?;
        let uploaded = match headers.get(RANGE).and_then(|v| v.to_str().ok()) {
            Some(range) => parse_range_upper_bound(range).map(|k| k + 1).unwrap_or(0),
            None => 0,
        };
        self.bytes_uploaded = uploaded;
        self.invalid = false;
        log::info!("[resumable_upload] recovered at {uploaded} bytes uploaded");
        Ok(uploaded)
    }
}

/// Parses the upper bound `k` out of a `Range: bytes=0-<k>` response header
/// (spec §4.6 steps 2 and 3).
fn parse_range_upper_bound(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes=")?;
    let (_, upper) = rest.split_once('-')?;
    upper.trim().parse().ok()
}

impl<S: Read + Seek> ResumableUpload<S> {
    pub fn initiate<M: Serialize>(
        &mut self,
        transport: &dyn Transport,
        metadata: &M,
        content_type: &str,
        total_bytes: Option<u64>,
        stream_final: bool,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        if self.resumable_url.is_some() {
            return Err(Error::InvalidState("resumable upload already initiated"));
        }
        if self.stream.stream_position()? != 0 {
            return Err(Error::InvalidState("stream must be positioned at 0 before initiate"));
        }

        let effective_total = if stream_final {
            Some(measure_stream_len(&mut self.stream)?)
        } else {
            total_bytes
        };

        let spec = self.initiate_request(metadata, content_type, effective_total)?.with_timeout(timeout);
        let response = transport.request(spec)?;
        self.apply_initiate_response(content_type, effective_total, stream_final, &response.headers, response.status)?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }

    pub fn transmit_next_chunk(
        &mut self,
        transport: &dyn Transport,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        if self.finished {
            return Err(Error::InvalidState("resumable upload already finished"));
        }
        if self.invalid {
            return Err(Error::InvalidState("resumable upload is invalid; call recover first"));
        }
        if self.stream.stream_position()? != self.bytes_uploaded {
            return Err(Error::ArgumentError("stream position disagrees with bytes_uploaded".to_string()));
        }

        let mut chunk = vec![0u8; self.chunk_size as usize];
        let n = read_fill(&mut self.stream, &mut chunk)? as u64;
        chunk.truncate(n as usize);

        let start = self.bytes_uploaded;
        let end = start + n.saturating_sub(1);
        let spec = self.transmit_request(start, end, n, chunk)?.with_timeout(timeout);
        let response = transport.request(spec)?;
        self.classify_transmit_response(response.status, &response.headers)?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }

    pub fn recover(&mut self, transport: &dyn Transport) -> Result<u64, Error> {
        if !self.invalid {
            return Err(Error::InvalidState("recover called on a transfer that is not invalid"));
        }
        let spec = self.recover_request()?;
        let response = transport.request(spec)?;
        match self.apply_recover_response(response.status, &response.headers) {
            Ok(uploaded) => {
                self.stream.seek(SeekFrom::Start(uploaded))?;
                Ok(uploaded)
            }
            Err(err) => Err(err),
        }
    }
}

impl<S: AsyncRead + AsyncSeek + Unpin> ResumableUpload<S> {
    pub async fn initiate_async<M: Serialize>(
        &mut self,
        transport: &dyn AsyncTransport,
        metadata: &M,
        content_type: &str,
        total_bytes: Option<u64>,
        stream_final: bool,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        if self.resumable_url.is_some() {
            return Err(Error::InvalidState("resumable upload already initiated"));
        }
        if self.stream.stream_position().await? != 0 {
            return Err(Error::InvalidState("stream must be positioned at 0 before initiate"));
        }

        let effective_total = if stream_final {
            Some(measure_stream_len_async(&mut self.stream).await?)
        } else {
            total_bytes
        };

        let spec = self.initiate_request(metadata, content_type, effective_total)?.with_timeout(timeout);
        let response = transport.request(spec).await?;
        self.apply_initiate_response(content_type, effective_total, stream_final, &response.headers, response.status)?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }

    pub async fn transmit_next_chunk_async(
        &mut self,
        transport: &dyn AsyncTransport,
        timeout: Option<(Duration, Duration)>,
    ) -> Result<UploadResponse, Error> {
        if self.finished {
            return Err(Error::InvalidState("resumable upload already finished"));
        }
        if self.invalid {
            return Err(Error::InvalidState("resumable upload is invalid; call recover first"));
        }
        if self.stream.stream_position().await? != self.bytes_uploaded {
            return Err(Error::ArgumentError("stream position disagrees with bytes_uploaded".to_string()));
        }

        let mut chunk = vec![0u8; self.chunk_size as usize];
        let n = read_fill_async(&mut self.stream, &mut chunk).await? as u64;
        chunk.truncate(n as usize);

        let start = self.bytes_uploaded;
        let end = start + n.saturating_sub(1);
        let spec = self.transmit_request(start, end, n, chunk)?.with_timeout(timeout);
        let response = transport.request(spec).await?;
        self.classify_transmit_response(response.status, &response.headers)?;
        Ok(UploadResponse { status: response.status, headers: response.headers })
    }

    pub async fn recover_async(&mut self, transport: &dyn AsyncTransport) -> Result<u64, Error> {
        if !self.invalid {
            return Err(Error::InvalidState("recover called on a transfer that is not invalid"));
        }
        let spec = self.recover_request()?;
        let response = transport.request(spec).await?;
        match self.apply_recover_response(response.status, &response.headers) {
            Ok(uploaded) => {
                self.stream.seek(SeekFrom::Start(uploaded)).await?;
                Ok(uploaded)
            }
            Err(err) => Err(err),
        }
    }
}

fn measure_stream_len<S: Read + Seek>(stream: &mut S) -> Result<u64, Error> {
    let current = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(current))?;
    Ok(len)
}

async fn measure_stream_len_async<S: AsyncSeek + Unpin>(stream: &mut S) -> Result<u64, Error> {
    let current = stream.stream_position().await?;
    let len = stream.seek(SeekFrom::End(0)).await?;
    stream.seek(SeekFrom::Start(current)).await?;
    Ok(len)
}

/// Fills `buf` by repeated reads until full or EOF, returning bytes read —
/// a single `Read::read` call may return short of a full buffer even when
/// more data follows.
fn read_fill<S: Read>(stream: &mut S, buf: &mut [u8]) -> Result<usize, Error> {
    let mut total = 0;
    while total < buf.len() {
        let n = stream.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

async fn read_fill_async<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> Result<usize, Error> {
    let mut total = 0;
    while total < buf.len() {
        let n = stream.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn resolve_location_passes_through_absolute_url() {
        let resolved = resolve_location(
            "https://example.invalid/upload/storage/v1/b/bucket/o",
            "http://example.invalid/upload?upload_id=AACODBBBxuw9u3AA",
        )
        .unwrap();
        assert_eq!(resolved, "http://example.invalid/upload?upload_id=AACODBBBxuw9u3AA");
    }

    #[test]
    fn resolve_location_resolves_relative_against_base() {
        let resolved = resolve_location("https://example.invalid/o/create", "/upload?upload_id=xyz").unwrap();
        assert_eq!(resolved, "https://example.invalid/upload?upload_id=xyz");
    }

    #[test]
    fn classify_transmit_response_missing_range_on_308_marks_invalid() {
        let stream = Cursor::new(Vec::<u8>::new());
        let mut upload = ResumableUpload::new("https://example.invalid/upload", 256 * 1024, HeaderMap::new(), stream).unwrap();
        let err = upload.classify_transmit_response(308, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
        assert!(upload.invalid());
    }

    #[test]
    fn multipart_body_matches_literal_template() {
        let body = assemble_multipart_body(
            r#"{"Hey":"You","Guys":"90909"}"#,
            "text/plain",
            b"Mock data here and there.",
            "==4==",
        );
        let expected = "--==4==\r\n\
content-type: application/json; charset=UTF-8\r\n\
\r\n\
{\"Hey\":\"You\",\"Guys\":\"90909\"}\r\n\
--==4==\r\n\
content-type: text/plain\r\n\
\r\n\
Mock data here and there.\r\n\
--==4==--";
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[test]
    fn boundary_has_expected_sentinel_shape() {
        let boundary = generate_boundary();
        assert!(boundary.starts_with("==============="));
        assert!(boundary.ends_with("=="));
    }

    #[test]
    fn resumable_upload_rejects_chunk_size_not_a_multiple_of_alignment() {
        let stream = Cursor::new(Vec::<u8>::new());
        let err = ResumableUpload::new("https://example.invalid/upload", 1000, HeaderMap::new(), stream);
        assert!(err.is_err());
    }

    #[test]
    fn resumable_upload_accepts_aligned_chunk_size() {
        let stream = Cursor::new(Vec::<u8>::new());
        let upload = ResumableUpload::new("https://example.invalid/upload", 256 * 1024, HeaderMap::new(), stream);
        assert!(upload.is_ok());
    }

    #[test]
    fn resumable_upload_with_config_validates_against_caller_supplied_bound() {
        let mut config = crate::config::Config::default();
        config.min_resumable_chunk_size = 4096;

        let stream = Cursor::new(Vec::<u8>::new());
        let rejected =
            ResumableUpload::with_config("https://example.invalid/upload", 1000, HeaderMap::new(), stream, &config);
        assert!(rejected.is_err());

        let stream = Cursor::new(Vec::<u8>::new());
        let accepted =
            ResumableUpload::with_config("https://example.invalid/upload", 8192, HeaderMap::new(), stream, &config);
        assert!(accepted.is_ok());
    }

    #[test]
    fn content_range_header_unknown_total_final_chunk_declares_total() {
        let stream = Cursor::new(Vec::<u8>::new());
        let upload = ResumableUpload::new("https://example.invalid/upload", 256 * 1024, HeaderMap::new(), stream).unwrap();
        assert_eq!(upload.content_range_header(0, 9, 10), "bytes 0-9/10");
    }

    #[test]
    fn content_range_header_unknown_total_more_to_come() {
        let stream = Cursor::new(vec![0u8; 1024]);
        let upload = ResumableUpload::new("https://example.invalid/upload", 256 * 1024, HeaderMap::new(), stream).unwrap();
        assert_eq!(upload.content_range_header(0, (256 * 1024) - 1, 256 * 1024), "bytes 0-262143/*");
    }

    #[test]
    fn parse_range_upper_bound_extracts_k() {
        assert_eq!(parse_range_upper_bound("bytes=0-9"), Some(9));
        assert_eq!(parse_range_upper_bound("bytes=0-55555"), Some(55555));
        assert_eq!(parse_range_upper_bound("garbage"), None);
    }
}
