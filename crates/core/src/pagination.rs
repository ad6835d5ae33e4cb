//! Pagination cursor codec
//!
//! Cursors are opaque base64 tokens wrapping an offset into an ordered,
//! filtered result set. Two flavours exist:
//!
//! - plain: `base64("{offset}")`, the exact inverse pair
//!   [`encode_cursor`] / [`decode_cursor`];
//! - scoped: `base64("{offset}:{fingerprint}")`, produced by
//!   [`encode_scoped_cursor`]. [`decode_scoped_cursor`] rejects a token whose
//!   fingerprint differs from the filter it is replayed under.
//!
//! # Example
//!
//! ```
//! use movie_catalog_core::pagination::{decode_cursor, encode_cursor};
//!
//! let cursor = encode_cursor(20);
//! assert_eq!(decode_cursor(&cursor).unwrap(), 20);
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CatalogError;

/// Default number of items per page
pub const DEFAULT_LIMIT: usize = 10;

/// Length of the hex filter fingerprint embedded in scoped cursors
const FINGERPRINT_LEN: usize = 16;

/// Resolve a caller-supplied page size.
///
/// Unset or non-positive values fall back to [`DEFAULT_LIMIT`]; positive
/// values are taken as given.
pub fn effective_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(limit) if limit > 0 => usize::try_from(limit).unwrap_or(usize::MAX),
        _ => DEFAULT_LIMIT,
    }
}

/// Encode an offset into an opaque cursor
pub fn encode_cursor(offset: u64) -> String {
    BASE64.encode(offset.to_string().as_bytes())
}

/// Decode a cursor produced by [`encode_cursor`]
///
/// # Errors
///
/// Returns `InvalidArgument` when the token is not base64, not UTF-8, not a
/// number, or negative.
pub fn decode_cursor(cursor: &str) -> Result<u64, CatalogError> {
    let payload = decode_payload(cursor)?;
    parse_offset(&payload)
}

/// Fingerprint a filter set.
///
/// SHA-256 over the JSON serialization, truncated to 16 hex characters.
pub fn filter_fingerprint<T: Serialize>(filter: &T) -> Result<String, CatalogError> {
    let json = serde_json::to_string(filter)
        .map_err(|e| CatalogError::internal("fingerprinting filter", e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let mut hash_hex = hex::encode(hasher.finalize());
    hash_hex.truncate(FINGERPRINT_LEN);

    Ok(hash_hex)
}

/// Encode an offset bound to the filter identified by `fingerprint`
pub fn encode_scoped_cursor(offset: u64, fingerprint: &str) -> String {
    BASE64.encode(format!("{}:{}", offset, fingerprint).as_bytes())
}

/// Decode a scoped cursor, checking it against `fingerprint`.
///
/// Plain cursors (no fingerprint) are accepted as raw offsets.
///
/// # Errors
///
/// Returns `InvalidArgument` for malformed tokens and for tokens issued under
/// a different filter.
pub fn decode_scoped_cursor(cursor: &str, fingerprint: &str) -> Result<u64, CatalogError> {
    let payload = decode_payload(cursor)?;

    match payload.split_once(':') {
        None => parse_offset(&payload),
        Some((offset, issued_for)) => {
            if issued_for != fingerprint {
                return Err(CatalogError::invalid_cursor(
                    "cursor was issued for a different filter",
                ));
            }
            parse_offset(offset)
        }
    }
}

fn decode_payload(cursor: &str) -> Result<String, CatalogError> {
    let decoded = BASE64
        .decode(cursor.as_bytes())
        .map_err(|e| CatalogError::invalid_cursor(format!("invalid cursor encoding: {}", e)))?;

    String::from_utf8(decoded)
        .map_err(|e| CatalogError::invalid_cursor(format!("invalid cursor format: {}", e)))
}

fn parse_offset(raw: &str) -> Result<u64, CatalogError> {
    if raw.starts_with('-') {
        return Err(CatalogError::invalid_cursor(
            "cursor offset must not be negative",
        ));
    }

    raw.parse::<u64>()
        .map_err(|e| CatalogError::invalid_cursor(format!("invalid cursor offset: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Serialize)]
    struct Filter {
        genre: Option<String>,
    }

    #[test]
    fn test_encode_decode_cursor() {
        for offset in [0u64, 1, 9, 10, 250, 1_000_000, u64::MAX] {
            let cursor = encode_cursor(offset);
            assert!(!cursor.is_empty());
            assert_eq!(decode_cursor(&cursor).unwrap(), offset);
        }
    }

    #[test]
    fn test_cursor_is_base64_of_decimal_offset() {
        assert_eq!(encode_cursor(10), "MTA=");
    }

    #[test]
    fn test_decode_cursor_invalid_base64() {
        let err = decode_cursor("not-valid-base64!!!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_decode_cursor_non_numeric() {
        let cursor = BASE64.encode(b"abc");
        let err = decode_cursor(&cursor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_decode_cursor_negative() {
        let cursor = BASE64.encode(b"-5");
        let err = decode_cursor(&cursor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_decode_cursor_tampered() {
        let mut cursor = encode_cursor(40);
        cursor.insert(1, '#');
        assert!(decode_cursor(&cursor).is_err());
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(0)), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(-3)), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(25)), 25);
        assert_eq!(effective_limit(Some(5000)), 5000);
    }

    #[test]
    fn test_fingerprint_is_stable_and_filter_sensitive() {
        let drama = Filter {
            genre: Some("Drama".into()),
        };
        let comedy = Filter {
            genre: Some("Comedy".into()),
        };

        let a = filter_fingerprint(&drama).unwrap();
        let b = filter_fingerprint(&drama).unwrap();
        let c = filter_fingerprint(&comedy).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_scoped_cursor_round_trip() {
        let cursor = encode_scoped_cursor(30, "abcdef0123456789");
        assert_eq!(
            decode_scoped_cursor(&cursor, "abcdef0123456789").unwrap(),
            30
        );
    }

    #[test]
    fn test_scoped_cursor_rejects_other_filter() {
        let cursor = encode_scoped_cursor(30, "abcdef0123456789");
        let err = decode_scoped_cursor(&cursor, "0000000000000000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_scoped_decoder_accepts_plain_cursor() {
        let cursor = encode_cursor(7);
        assert_eq!(decode_scoped_cursor(&cursor, "anything").unwrap(), 7);
    }
}
