//! A client-side resumable media transfer engine for HTTP object-storage
//! APIs that speak Google Cloud Storage JSON API media semantics: ranged
//! downloads, `multipart/related` uploads, and session-based resumable
//! uploads addressed by byte range, with MD5/CRC32C integrity verification
//! and jittered exponential-backoff retry.
//!
//! The protocol state machines in [`download`] and [`upload`] never talk to
//! an HTTP library directly — they are written against the [`transport`]
//! traits, so the same logic runs under a blocking or cooperatively
//! scheduled transport. [`transport::blocking::BlockingReqwestTransport`]
//! and [`transport::asynchronous::AsyncReqwestTransport`] are the
//! `reqwest`-backed adapters shipped here; callers may supply their own.
//!
//! Retry (spec §4.3) is a transport-level concern, not a state-machine one:
//! wrap any [`Transport`]/[`AsyncTransport`] in [`RetryingTransport`] to get
//! bounded jittered backoff on every request a transfer issues, without the
//! download/upload code needing its own retry loop.

pub mod checksum;
pub mod config;
pub mod download;
pub mod error;
pub mod range;
pub mod retry;
pub mod transfer;
pub mod transport;
pub mod upload;

pub use checksum::{Checksum, ChecksumKind};
pub use config::Config;
pub use download::{ChunkedDownload, ChunkedDownloadResponse, Download, DownloadResponse};
pub use error::Error;
pub use retry::{RetryBudget, RetryingTransport};
pub use transfer::{TransferBase, UploadBase};
pub use transport::{AsyncTransport, BodyMode, RequestSpec, Transport};
pub use upload::{MultipartUpload, ResumableUpload, SimpleUpload, UploadResponse};
