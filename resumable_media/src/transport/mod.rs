//! Transport adapter interface (spec §4.4, §5, §9).
//!
//! A transport is a capability with a single operation: perform an HTTP
//! request given `(method, url, headers, body, timeout)` and yield a
//! response exposing a status code, headers, and a chunked body. The state
//! machine code in [`crate::download`] and [`crate::upload`] never talks to
//! `reqwest` directly — it is expressed purely against [`Transport`] /
//! [`AsyncTransport`], so it runs unchanged atop a blocking or
//! cooperatively-scheduled transport (design note §9: "avoid duplicating
//! the protocol logic").
//!
//! [`BodyMode`] is the "decoded vs raw body" interface concern from §4.4 and
//! §9: it selects whether the transport hands the engine already
//! gzip-decoded bytes or the untouched wire bytes. The engine's own
//! gzip-aware checksum handling (spec §4.2) always requests
//! [`BodyMode::Raw`] and does any decoding itself, so that it retains
//! access to the compressed bytes a server-side checksum was computed over;
//! [`BodyMode::Decoded`] exists for pluggable transports and callers that
//! have no checksum to verify.

pub mod blocking;
pub mod asynchronous;

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Post-decoded bytes (e.g. the transport already undid
    /// `Content-Encoding: gzip`).
    Decoded,
    /// Pre-decoded wire bytes, untouched by the transport.
    Raw,
}

/// Everything needed to construct one HTTP request. Assembled by the state
/// machine from its current [`crate::Transfer`] state, then handed to a
/// transport implementation unchanged.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<(Duration, Duration)>,
    pub body_mode: BodyMode,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            body_mode: BodyMode::Raw,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<(Duration, Duration)>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_body_mode(mut self, mode: BodyMode) -> Self {
        self.body_mode = mode;
        self
    }
}

/// Blocking response body: a chunked iterator over bytes, pulled
/// synchronously. `next_chunk` returns `Ok(None)` at end of body.
pub trait BlockingBody: Send {
    fn next_chunk(&mut self) -> Result<Option<Bytes>, Error>;
}

pub struct BlockingTransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Box<dyn BlockingBody>,
}

/// The blocking transport capability (spec §5: "each call runs to
/// completion on the caller's thread, blocking during transport I/O").
pub trait Transport: Send + Sync {
    fn request(&self, spec: RequestSpec) -> Result<BlockingTransportResponse, Error>;
}

/// Cooperative response body: an async chunked iterator over bytes. The
/// only suspension point is awaiting the next chunk from the transport
/// (spec §5b).
#[async_trait::async_trait]
pub trait AsyncBody: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error>;
}

pub struct AsyncTransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Box<dyn AsyncBody>,
}

/// The cooperative transport capability (spec §5: "a suspendable operation
/// whose only suspension points are awaiting the transport's response").
#[async_trait::async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn request(&self, spec: RequestSpec) -> Result<AsyncTransportResponse, Error>;
}
