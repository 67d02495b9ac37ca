//! A `reqwest`-backed [`AsyncTransport`] (spec §4.4, "cooperative" flavor).
//! Mirrors [`super::blocking::BlockingReqwestTransport`] byte for byte: same
//! client configuration, same raw-by-default / engine-decodes-gzip split.

use std::io::Write;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::HeaderMap;

use crate::config::Config;
use crate::error::Error;
use crate::transport::{AsyncBody, AsyncTransport, AsyncTransportResponse, BodyMode, RequestSpec};

pub struct AsyncReqwestTransport {
    client: reqwest::Client,
}

impl AsyncReqwestTransport {
    pub fn new() -> Result<Self, Error> {
        Self::from_config(&Config::default())
    }

    /// Builds the transport from a [`Config`]'s timeout pair. There is no
    /// chunk-size knob to thread through here: `reqwest`'s async body is
    /// already a stream of whatever chunks the connection delivers, so
    /// there is no fixed-size read loop to parameterize the way the
    /// blocking transport's `Read`-based one needs.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::with_timeouts(config.connect_timeout, config.read_timeout)
    }

    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AsyncTransport for AsyncReqwestTransport {
    async fn request(&self, spec: RequestSpec) -> Result<AsyncTransportResponse, Error> {
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

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: HeaderMap = response.headers().clone();
        let is_gzip = content_encoding_is_gzip(&headers);

        let body: Box<dyn AsyncBody> = match spec.body_mode {
            BodyMode::Decoded if is_gzip => {
                Box::new(AsyncGzipBody::new(Box::new(AsyncRawBody::new(response))))
            }
            BodyMode::Decoded | BodyMode::Raw => Box::new(AsyncRawBody::new(response)),
        };

        Ok(AsyncTransportResponse { status, headers, body })
    }
}

fn content_encoding_is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_ENCODING)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"))
        .unwrap_or(false)
}

struct AsyncRawBody {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
}

impl AsyncRawBody {
    fn new(response: reqwest::Response) -> Self {
        Self { stream: Box::pin(response.bytes_stream()) }
    }
}

#[async_trait]
impl AsyncBody for AsyncRawBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(err)) => Err(Error::from(err)),
            None => Ok(None),
        }
    }
}

/// Feeds compressed chunks into a push-based gzip decoder as they arrive
/// off the wire, so decoding never needs a blocking `Read` source — only
/// CPU work on bytes already in hand, never a second suspension point.
struct AsyncGzipBody {
    inner: Box<dyn AsyncBody>,
    decoder: Option<flate2::write::GzDecoder<Vec<u8>>>,
}

impl AsyncGzipBody {
    fn new(inner: Box<dyn AsyncBody>) -> Self {
        Self {
            inner,
            decoder: Some(flate2::write::GzDecoder::new(Vec::new())),
        }
    }
}

#[async_trait]
impl AsyncBody for AsyncGzipBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        loop {
            match self.inner.next_chunk().await? {
                Some(chunk) => {
                    let decoder = self.decoder.as_mut().expect("gzip decoder already finished");
                    decoder.write_all(&chunk)?;
                    let buf = decoder.get_mut();
                    if buf.is_empty() {
                        continue;
                    }
                    let out = std::mem::take(buf);
                    return Ok(Some(Bytes::from(out)));
                }
                None => {
                    let Some(decoder) = self.decoder.take() else {
                        return Ok(None);
                    };
                    let out = decoder.finish()?;
                    if out.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(Bytes::from(out)));
                }
            }
        }
    }
}
