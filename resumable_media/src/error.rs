//! Uniform failure surface for the transfer engine (spec §7).

use std::fmt;

use crate::checksum::ChecksumKind;

/// A snapshot of the response that triggered an [`Error::InvalidResponse`],
/// kept around for diagnostics the way the original client keeps the raw
/// `requests.Response` on its exceptions.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub url: String,
    pub status: u16,
    pub headers: http::HeaderMap,
}

impl fmt::Display for ResponseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.url, self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server returned a status or headers incompatible with the
    /// protocol at this state (unexpected status, missing `Location`,
    /// malformed `Range`, duplicate hash pair).
    #[error("invalid response ({response}): {message}")]
    InvalidResponse {
        response: ResponseInfo,
        message: String,
    },

    /// End-of-body checksum mismatch.
    #[error(
        "checksum mismatch for {url}: expected {expected}, computed {computed} (algorithm: {algorithm})"
    )]
    DataCorruption {
        url: String,
        expected: String,
        computed: String,
        algorithm: ChecksumKind,
    },

    /// A caller precondition was violated: operation on a `finished`
    /// transfer, stream position disagrees with `bytes_uploaded`, etc.
    #[error("invalid transfer state: {0}")]
    InvalidState(&'static str),

    /// A caller-supplied argument was invalid: chunk size not a multiple of
    /// 256 KiB, non-byte payload to multipart, unknown checksum label.
    #[error("argument error: {0}")]
    ArgumentError(String),

    /// Opaque transport failure (connection reset, DNS failure, timeout).
    /// The retry policy treats every variant of this as potentially
    /// retryable; non-transport failures never are.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_response(url: &str, status: u16, headers: &http::HeaderMap, message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            response: ResponseInfo {
                url: url.to_string(),
                status,
                headers: headers.clone(),
            },
            message: message.into(),
        }
    }

    /// Whether this failure is one the retry policy (spec §4.3) is allowed
    /// to retry on its own: connection-level errors surfaced by the
    /// transport. Domain errors (bad state, corrupted data, argument
    /// errors) are never retried — they are raised straight to the caller.
    pub fn is_transport_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Spec §4.1 "extract required headers": fetches `name` as a `&str`,
/// failing with [`Error::InvalidResponse`] when it is absent or not valid
/// ASCII/UTF-8 — the original client's `header_required` helper.
pub fn required_header<'a>(
    url: &str,
    status: u16,
    headers: &'a http::HeaderMap,
    name: &str,
) -> Result<&'a str, Error> {
    headers
        .get(name)
        .ok_or_else(|| Error::invalid_response(url, status, headers, format!("missing required header {name:?}")))?
        .to_str()
        .map_err(|_| Error::invalid_response(url, status, headers, format!("header {name:?} is not valid UTF-8")))
}

/// Spec §4.1/§4.5 "validate status": fails with [`Error::InvalidResponse`]
/// unless `status` is one of `allowed`.
pub fn require_status(url: &str, status: u16, headers: &http::HeaderMap, allowed: &[u16]) -> Result<(), Error> {
    if allowed.contains(&status) {
        Ok(())
    } else {
        Err(Error::invalid_response(
            url,
            status,
            headers,
            format!("unexpected status {status}, expected one of {allowed:?}"),
        ))
    }
}
