//! A `reqwest::blocking`-backed [`Transport`] (spec §4.4, "blocking"
//! flavor). Built the way `rdm_core`'s `MultipartDownloadStrategy` builds
//! its `reqwest::Client`: disable every built-in content-decoding so the
//! wire bytes reach the engine untouched, and let the engine itself decide
//! whether to gzip-decode (spec §4.2).

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use flate2::read::GzDecoder;
use http::HeaderMap;

use crate::config::Config;
use crate::error::Error;
use crate::transport::{BlockingBody, BlockingTransportResponse, BodyMode, RequestSpec, Transport};

pub struct BlockingReqwestTransport {
    client: reqwest::blocking::Client,
    read_chunk_size: usize,
}

impl BlockingReqwestTransport {
    pub fn new() -> Result<Self, Error> {
        Self::from_config(&Config::default())
    }

    /// Builds the transport from a [`Config`]: timeouts and the per-chunk
    /// streaming granularity (spec §4.5 step 2's `_SINGLE_GET_CHUNK_SIZE`)
    /// both come from here instead of a hardcoded constant.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::with_timeouts_and_chunk_size(config.connect_timeout, config.read_timeout, config.single_get_chunk_size)
    }

    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, Error> {
        Self::with_timeouts_and_chunk_size(connect_timeout, read_timeout, Config::default().single_get_chunk_size)
    }

    pub fn with_timeouts_and_chunk_size(
        connect_timeout: Duration,
        read_timeout: Duration,
        read_chunk_size: usize,
    ) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client, read_chunk_size })
    }
}

impl Transport for BlockingReqwestTransport {
    fn request(&self, spec: RequestSpec) -> Result<BlockingTransportResponse, Error> {
        let mut builder = self
            .client
            .request(spec.method.clone(), &spec.url)
            .headers(spec.headers.clone());
        if let Some(body) = spec.body.clone() {
            builder = builder.body(body);
        }
        if let Some((_connect, read)) = spec.timeout {
            builder = builder.timeout(read);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers: HeaderMap = response.headers().clone();
        let is_gzip = content_encoding_is_gzip(&headers);
        let chunk_size = self.read_chunk_size;

        let body: Box<dyn BlockingBody> = match spec.body_mode {
            BodyMode::Decoded if is_gzip => Box::new(GzipBody::new(response, chunk_size)),
            BodyMode::Decoded | BodyMode::Raw => Box::new(RawBody::new(response, chunk_size)),
        };

        Ok(BlockingTransportResponse { status, headers, body })
    }
}

fn content_encoding_is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_ENCODING)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"))
        .unwrap_or(false)
}

struct RawBody<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: Read> RawBody<R> {
    fn new(reader: R, chunk_size: usize) -> Self {
        Self { reader, chunk_size }
    }
}

impl<R: Read + Send> BlockingBody for RawBody<R> {
    fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        read_one_chunk(&mut self.reader, self.chunk_size)
    }
}

struct GzipBody<R: Read> {
    decoder: GzDecoder<R>,
    chunk_size: usize,
}

impl<R: Read> GzipBody<R> {
    fn new(reader: R, chunk_size: usize) -> Self {
        Self { decoder: GzDecoder::new(reader), chunk_size }
    }
}

impl<R: Read + Send> BlockingBody for GzipBody<R> {
    fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        read_one_chunk(&mut self.decoder, self.chunk_size)
    }
}

fn read_one_chunk<R: Read>(reader: &mut R, chunk_size: usize) -> Result<Option<Bytes>, Error> {
    let mut buf = vec![0u8; chunk_size];
    let n = reader.read(&mut buf)?;
    if n == 0 {
        Ok(None)
    } else {
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }
}
