//! Streaming MD5/CRC32C verification and `X-Goog-Hash` parsing (spec §4.2).

use std::fmt;

use base64::Engine as _;
use http::HeaderMap;
use log::info;

use crate::error::Error;

pub const HASH_HEADER: &str = "x-goog-hash";

/// Which algorithm a [`Download`](crate::download::Download) should verify
/// against. `None` disables verification without forcing call sites to
/// branch on "is verification enabled?" per chunk — see [`Checksum::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Crc32c,
    None,
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChecksumKind::Md5 => "md5",
            ChecksumKind::Crc32c => "crc32c",
            ChecksumKind::None => "none",
        };
        f.write_str(s)
    }
}

impl ChecksumKind {
    /// Parses the caller-facing `checksum` option. Anything other than
    /// `"md5"`, `"crc32c"`, or `"none"` is an argument error (spec §4.2).
    pub fn parse(label: &str) -> Result<Self, Error> {
        match label {
            "md5" => Ok(ChecksumKind::Md5),
            "crc32c" => Ok(ChecksumKind::Crc32c),
            "none" => Ok(ChecksumKind::None),
            other => Err(Error::ArgumentError(format!(
                "unknown checksum algorithm: {other:?}"
            ))),
        }
    }

    fn label(self) -> Option<&'static str> {
        match self {
            ChecksumKind::Md5 => Some("md5"),
            ChecksumKind::Crc32c => Some("crc32c"),
            ChecksumKind::None => None,
        }
    }
}

/// A streaming "update + digest" accumulator. Implemented as a sum type
/// (design note §9) rather than a trait object so the hot path — every
/// chunk of every download — never allocates or dynamic-dispatches.
#[derive(Debug, Clone)]
pub enum Checksum {
    Md5(md5::Context),
    Crc32c(u32),
    /// "Do-nothing" variant used whenever verification is disabled.
    None,
}

impl Checksum {
    pub fn new(kind: ChecksumKind) -> Self {
        match kind {
            ChecksumKind::Md5 => Checksum::Md5(md5::Context::new()),
            ChecksumKind::Crc32c => Checksum::Crc32c(0),
            ChecksumKind::None => Checksum::None,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Checksum::Md5(ctx) => ctx.consume(data),
            Checksum::Crc32c(state) => *state = crc32c::crc32c_append(*state, data),
            Checksum::None => {}
        }
    }

    /// Base64-encoded digest, or `None` for the no-op variant.
    pub fn finalize_base64(&self) -> Option<String> {
        match self {
            Checksum::Md5(ctx) => {
                let digest = ctx.clone().compute();
                Some(base64::engine::general_purpose::STANDARD.encode(digest.0))
            }
            Checksum::Crc32c(state) => {
                Some(base64::engine::general_purpose::STANDARD.encode(state.to_be_bytes()))
            }
            Checksum::None => None,
        }
    }
}

/// Extracts the base64 digest for `kind` out of an `X-Goog-Hash` response
/// header value (`<label>=<base64>(,<label>=<base64>)*`).
///
/// Returns `Ok(None)` (not an error) when the header is absent or the
/// requested label is missing — callers skip verification and log a
/// one-line notice rather than failing. Returns `Err(Error::InvalidResponse)`
/// when the same label appears twice — an ambiguous server reply, the same
/// failure class as any other malformed/contradictory response header (spec
/// §4.2, §7 "duplicate hash pair").
pub fn parse_goog_hash(
    header_value: Option<&str>,
    kind: ChecksumKind,
    url: &str,
    status: u16,
    headers: &HeaderMap,
) -> Result<Option<String>, Error> {
    let Some(label) = kind.label() else {
        return Ok(None);
    };
    let Some(header_value) = header_value else {
        return Ok(None);
    };

    let mut found: Option<String> = None;
    for pair in header_value.split(',') {
        let pair = pair.trim();
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(label) {
            if found.is_some() {
                return Err(Error::invalid_response(
                    url,
                    status,
                    headers,
                    format!("ambiguous X-Goog-Hash: label {label:?} appears more than once in {header_value:?}"),
                ));
            }
            found = Some(value.trim().to_string());
        }
    }
    Ok(found)
}

/// Verifies an accumulated [`Checksum`] against the digest advertised in
/// `goog_hash_header`, feeding the same informational-skip behavior as
/// [`parse_goog_hash`]. `url`/`status`/`headers` are carried for the
/// [`Error::DataCorruption`]/[`Error::InvalidResponse`] diagnostics.
pub fn verify(
    checksum: &Checksum,
    kind: ChecksumKind,
    goog_hash_header: Option<&str>,
    url: &str,
    status: u16,
    headers: &HeaderMap,
) -> Result<(), Error> {
    let Some(expected) = parse_goog_hash(goog_hash_header, kind, url, status, headers)? else {
        if kind != ChecksumKind::None {
            info!(
                "no {kind} checksum present in {HASH_HEADER:?} for {url}; skipping verification"
            );
        }
        return Ok(());
    };
    let Some(computed) = checksum.finalize_base64() else {
        return Ok(());
    };
    if computed != expected {
        return Err(Error::DataCorruption {
            url: url.to_string(),
            expected,
            computed,
            algorithm: kind,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_headers() -> HeaderMap {
        HeaderMap::new()
    }

    #[test]
    fn parse_goog_hash_picks_requested_label() {
        let header = "crc32c=qmNCyg==,md5=fPAJHnnoi/+NadyNxT2c2w==";
        assert_eq!(
            parse_goog_hash(Some(header), ChecksumKind::Crc32c, "u", 200, &empty_headers()).unwrap(),
            Some("qmNCyg==".to_string())
        );
        assert_eq!(
            parse_goog_hash(Some(header), ChecksumKind::Md5, "u", 200, &empty_headers()).unwrap(),
            Some("fPAJHnnoi/+NadyNxT2c2w==".to_string())
        );
    }

    #[test]
    fn parse_goog_hash_missing_header_is_ok_none() {
        assert_eq!(parse_goog_hash(None, ChecksumKind::Md5, "u", 200, &empty_headers()).unwrap(), None);
    }

    #[test]
    fn parse_goog_hash_missing_label_is_ok_none() {
        assert_eq!(
            parse_goog_hash(Some("md5=abc=="), ChecksumKind::Crc32c, "u", 200, &empty_headers()).unwrap(),
            None
        );
    }

    #[test]
    fn parse_goog_hash_duplicate_label_is_ambiguous() {
        let err = parse_goog_hash(Some("md5=aaa==,md5=bbb=="), ChecksumKind::Md5, "u", 200, &empty_headers())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
    }

    #[test]
    fn checksum_kind_parse_rejects_unknown() {
        assert!(ChecksumKind::parse("sha256").is_err());
    }

    #[test]
    fn md5_checksum_matches_known_digest() {
        let mut checksum = Checksum::new(ChecksumKind::Md5);
        checksum.update(b"zero zero");
        checksum.update(b"niner tango");
        // md5("zero zeroniner tango") base64
        let digest = checksum.finalize_base64().unwrap();
        assert_eq!(digest, "1A/dxEpys717C6FH7FIWDw==");
    }

    #[test]
    fn verify_reports_both_expected_and_computed_on_mismatch() {
        let mut checksum = Checksum::new(ChecksumKind::Md5);
        checksum.update(b"zero zero");
        checksum.update(b"niner tango");
        let header = "md5=anVzdCBub3QgdGhpcyAxLA==";
        let err = verify(&checksum, ChecksumKind::Md5, Some(header), "https://example.invalid/o", 200, &empty_headers())
            .unwrap_err();
        match err {
            Error::DataCorruption { expected, computed, .. } => {
                assert_eq!(expected, "anVzdCBub3QgdGhpcyAxLA==");
                assert_eq!(computed, "1A/dxEpys717C6FH7FIWDw==");
            }
            other => panic!("expected DataCorruption, got {other:?}"),
        }
    }

    #[test]
    fn none_checksum_never_verifies() {
        let checksum = Checksum::new(ChecksumKind::None);
        assert_eq!(checksum.finalize_base64(), None);
        assert!(verify(&checksum, ChecksumKind::None, Some("md5=whatever=="), "u", 200, &empty_headers()).is_ok());
    }
}
