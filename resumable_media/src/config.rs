//! Module-level constants, generalized into a constructible config (spec §9:
//! "Model as a config struct with sensible defaults" — no process-wide
//! globals beyond this).

use std::time::Duration;

/// 256 KiB — the unit resumable upload chunk sizes must be a multiple of.
pub const RESUMABLE_CHUNK_ALIGNMENT: u64 = 256 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Per-chunk read/write granularity for the one-shot [`crate::download::Download`].
    /// Recommended 8 KiB (spec §4.5 step 2).
    pub single_get_chunk_size: usize,

    /// Cumulative retry-wait ceiling (spec §4.3). Default 600s. Exposed as a
    /// field (not a `const`) because the original client's own tests patch
    /// it per-call to exercise the "exceeds ceiling" path.
    pub max_cumulative_retry: Duration,

    /// Paired connect/read timeout applied to each request absent a
    /// caller-supplied override (spec §5).
    pub connect_timeout: Duration,
    pub read_timeout: Duration,

    /// The alignment [`crate::upload::ResumableUpload::new`] validates caller
    /// chunk sizes against. A validation bound, not a silently-applied floor:
    /// a caller passing a smaller or misaligned chunk size gets an
    /// [`crate::error::Error::ArgumentError`], never a value rounded up
    /// behind their back.
    pub min_resumable_chunk_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            single_get_chunk_size: 8 * 1024,
            max_cumulative_retry: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(61),
            read_timeout: Duration::from_secs(60),
            min_resumable_chunk_size: RESUMABLE_CHUNK_ALIGNMENT,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_pair(&self) -> (Duration, Duration) {
        (self.connect_timeout, self.read_timeout)
    }
}
