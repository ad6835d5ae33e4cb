use movie_catalog_core::pagination::effective_limit;
use movie_catalog_core::{
    decode_cursor, decode_scoped_cursor, encode_cursor, encode_scoped_cursor,
    filter_fingerprint, ErrorKind, MovieFilter,
};

fn drama() -> MovieFilter {
    MovieFilter {
        genre: Some("Drama".into()),
        ..Default::default()
    }
}

#[test]
fn test_equal_filters_share_a_fingerprint() {
    let a = filter_fingerprint(&drama()).unwrap();
    let b = filter_fingerprint(&drama()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);

    let other = filter_fingerprint(&MovieFilter::default()).unwrap();
    assert_ne!(a, other);
}

#[test]
fn test_scoped_cursor_walks_pages() {
    let fingerprint = filter_fingerprint(&drama()).unwrap();

    for offset in [0u64, 10, 20, 990] {
        let cursor = encode_scoped_cursor(offset, &fingerprint);
        assert_eq!(decode_scoped_cursor(&cursor, &fingerprint).unwrap(), offset);
    }
}

#[test]
fn test_scoped_cursor_rejects_other_filter() {
    let issued = filter_fingerprint(&drama()).unwrap();
    let replayed = filter_fingerprint(&MovieFilter::default()).unwrap();

    let cursor = encode_scoped_cursor(10, &issued);
    let err = decode_scoped_cursor(&cursor, &replayed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_plain_cursor_accepted_by_scoped_decoder() {
    let fingerprint = filter_fingerprint(&drama()).unwrap();
    let cursor = encode_cursor(30);

    assert_eq!(decode_cursor(&cursor).unwrap(), 30);
    assert_eq!(decode_scoped_cursor(&cursor, &fingerprint).unwrap(), 30);
}

#[test]
fn test_tampered_cursors_are_invalid() {
    // "-5" and "abc"
    for token in ["LTU=", "YWJj", "not base64!", ""] {
        let err = decode_cursor(token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "token {token:?}");
    }
}

#[test]
fn test_limit_resolution() {
    assert_eq!(effective_limit(None), 10);
    assert_eq!(effective_limit(Some(0)), 10);
    assert_eq!(effective_limit(Some(-3)), 10);
    assert_eq!(effective_limit(Some(25)), 25);
    assert_eq!(effective_limit(Some(10_000)), 10_000);
}
