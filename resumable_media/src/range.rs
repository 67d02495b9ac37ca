//! Byte-range and `Content-Range` formatting/parsing (spec §4.1).

use crate::error::Error;

/// Formats a request `Range:` header value from optional inclusive
/// `start`/`end` offsets.
///
/// - both given -> `bytes=<start>-<end>`
/// - only `end` -> `bytes=0-<end>`
/// - only `start >= 0` -> `bytes=<start>-` (open-ended tail)
/// - only `start < 0` -> `bytes=<start>` (suffix request)
/// - neither -> `None` (header omitted)
pub fn format_range(start: Option<i64>, end: Option<i64>) -> Option<String> {
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("bytes={start}-{end}")),
        (None, Some(end)) => Some(format!("bytes=0-{end}")),
        (Some(start), None) if start >= 0 => Some(format!("bytes={start}-")),
        (Some(start), None) => Some(format!("bytes={start}")),
        (None, None) => None,
    }
}

/// A parsed `Content-Range: bytes <start>-<end>/<total>` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

/// Parses a `Content-Range:` response header. Accepts exactly the form
/// `bytes <a>-<b>/<c>` (the leading unit token is matched case-insensitively),
/// and requires `a <= b < c`.
pub fn parse_content_range(value: &str) -> Result<ContentRange, Error> {
    let invalid = || {
        Error::ArgumentError(format!("malformed Content-Range header: {value:?}"))
    };

    let value = value.trim();
    let mut parts = value.splitn(2, char::is_whitespace);
    let unit = parts.next().ok_or_else(invalid)?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return Err(invalid());
    }
    let rest = parts.next().ok_or_else(invalid)?.trim();

    let (range_part, total_part) = rest.split_once('/').ok_or_else(invalid)?;
    let total: u64 = total_part.trim().parse().map_err(|_| invalid())?;
    let (start_part, end_part) = range_part.split_once('-').ok_or_else(invalid)?;
    let start: u64 = start_part.trim().parse().map_err(|_| invalid())?;
    let end: u64 = end_part.trim().parse().map_err(|_| invalid())?;

    if start > end || end >= total {
        return Err(invalid());
    }

    Ok(ContentRange { start, end, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_range_both() {
        assert_eq!(format_range(Some(0), Some(65536)), Some("bytes=0-65536".to_string()));
    }

    #[test]
    fn format_range_end_only() {
        assert_eq!(format_range(None, Some(999)), Some("bytes=0-999".to_string()));
    }

    #[test]
    fn format_range_start_only_nonnegative() {
        assert_eq!(format_range(Some(100), None), Some("bytes=100-".to_string()));
    }

    #[test]
    fn format_range_suffix() {
        assert_eq!(format_range(Some(-500), None), Some("bytes=-500".to_string()));
    }

    #[test]
    fn format_range_neither() {
        assert_eq!(format_range(None, None), None);
    }

    #[test]
    fn parse_content_range_basic() {
        let parsed = parse_content_range("bytes 0-65536/200000").unwrap();
        assert_eq!(parsed, ContentRange { start: 0, end: 65536, total: 200000 });
    }

    #[test]
    fn parse_content_range_case_insensitive_unit() {
        let parsed = parse_content_range("Bytes 0-0/1").unwrap();
        assert_eq!(parsed, ContentRange { start: 0, end: 0, total: 1 });
    }

    #[test]
    fn parse_content_range_round_trips_canonical_form() {
        let parsed = parse_content_range("bytes 10-19/20").unwrap();
        let formatted = format!("bytes {}-{}/{}", parsed.start, parsed.end, parsed.total);
        assert_eq!(formatted, "bytes 10-19/20");
    }

    #[test]
    fn parse_content_range_rejects_inverted_range() {
        assert!(parse_content_range("bytes 10-5/20").is_err());
    }

    #[test]
    fn parse_content_range_rejects_end_at_or_past_total() {
        assert!(parse_content_range("bytes 0-20/20").is_err());
    }

    #[test]
    fn parse_content_range_rejects_missing_total() {
        assert!(parse_content_range("bytes 0-20").is_err());
    }

    #[test]
    fn parse_content_range_rejects_wrong_unit() {
        assert!(parse_content_range("items 0-20/30").is_err());
    }
}
