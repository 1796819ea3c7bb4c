use std::time::{Duration, UNIX_EPOCH};

use super::*;

fn header_bytes(compression: Compression) -> Vec<u8> {
    let mut out = Vec::new();
    let fingerprint = Fingerprint::new(b"[app]\nx = 1\n", None).with_context(7);
    Header::new(compression, fingerprint, body_checksum(b"body")).encode(&mut out);
    out
}

#[test]
fn header_layout() {
    let bytes = header_bytes(Compression::Deflate);
    assert_eq!(bytes.len(), HEADER_LEN);
    assert_eq!(&bytes[..4], b"PNT ");
    assert_eq!(&bytes[4..6], &FORMAT_VERSION.to_le_bytes());
    assert_eq!(bytes[6], 1);
    assert_eq!(&bytes[7..11], &28u32.to_le_bytes());
    assert_eq!(&bytes[HEADER_LEN - 32..], &body_checksum(b"body"));

    let header = Header::decode(&bytes).unwrap();
    assert_eq!(header.compression, Compression::Deflate);
    assert_eq!(header.version, FORMAT_VERSION);
    assert_eq!(header.fingerprint.context_hash, 7);
    assert!(header.verify(b"body").is_ok());
    assert!(matches!(
        header.verify(b"bodY"),
        Err(LoadError::Corruption { .. })
    ));
}

#[test]
fn bad_magic_is_a_format_error() {
    let mut bytes = header_bytes(Compression::None);
    bytes[0] = b'X';
    assert!(matches!(Header::decode(&bytes), Err(LoadError::Format)));
    assert!(matches!(Header::decode(b"PN"), Err(LoadError::Format)));
}

#[test]
fn other_version_is_rejected_first() {
    let mut bytes = header_bytes(Compression::None);
    bytes[4..6].copy_from_slice(&1u16.to_le_bytes());
    bytes.truncate(6);
    match Header::decode(&bytes) {
        Err(LoadError::VersionMismatch { found, supported }) => {
            assert_eq!(found, 1);
            assert_eq!(supported, FORMAT_VERSION);
        }
        other => panic!("expected a version mismatch, got {other:?}"),
    }
}

#[test]
fn truncated_header_is_corruption() {
    let bytes = header_bytes(Compression::None);
    assert!(matches!(
        Header::decode(&bytes[..HEADER_LEN - 1]),
        Err(LoadError::Corruption { .. })
    ));
}

#[test]
fn unknown_compression_is_corruption() {
    let mut bytes = header_bytes(Compression::None);
    bytes[6] = 9;
    assert!(matches!(
        Header::decode(&bytes),
        Err(LoadError::Corruption { .. })
    ));
}

#[test]
fn compression_names() {
    assert_eq!("deflate".parse::<Compression>(), Ok(Compression::Deflate));
    assert_eq!(" NONE ".parse::<Compression>(), Ok(Compression::None));
    assert!("zstd".parse::<Compression>().is_err());
    assert_eq!(Compression::Deflate.to_string(), "deflate");
}

#[test]
fn fingerprint_tracks_content_and_mtime() {
    let mtime = UNIX_EPOCH + Duration::new(1_700_000_000, 42);
    let a = Fingerprint::new(b"x = 1", Some(mtime));
    let touched = Fingerprint::new(b"x = 1", Some(mtime + Duration::from_secs(5)));
    let edited = Fingerprint::new(b"x = 2", Some(mtime));

    assert_eq!(a.mtime_secs, 1_700_000_000);
    assert_eq!(a.mtime_nanos, 42);
    assert_ne!(a, touched);
    assert!(a.same_content(&touched));
    assert!(!a.same_content(&edited));
}

#[test]
fn fingerprint_tracks_the_context() {
    let plain = Fingerprint::new(b"x = 1", None);
    let other_env = plain.with_context(hash_bytes(b"APP_TIMEOUT=60"));
    assert!(!plain.same_content(&other_env));
    assert!(other_env.same_content(&plain.with_context(hash_bytes(b"APP_TIMEOUT=60"))));
}

#[test]
fn reader_reports_truncation() {
    let mut reader = ByteReader::new(&[1, 0, 0]);
    assert!(reader.u32("count").is_err());
    let mut reader = ByteReader::new(&[7, 0]);
    assert_eq!(reader.u16("n").unwrap(), 7);
    assert!(reader.is_at_end());
}

#[test]
fn oversized_lengths_are_rejected() {
    assert!(to_u32(usize::MAX, "string").is_err());
    assert_eq!(to_u32(5, "string").unwrap(), 5);
}
