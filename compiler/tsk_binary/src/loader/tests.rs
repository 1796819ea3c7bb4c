use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use tsk_ir::{ConfigTreeBuilder, Object, Value};

use super::*;
use crate::{compile, compile_to_file, CompileOptions, FORMAT_VERSION};

fn tree() -> ConfigTree {
    let mut builder = ConfigTreeBuilder::new();
    builder.set("", "debug", Value::Bool(true));
    let mut limits = Object::new();
    limits.insert("cpu".into(), Value::Int(2));
    builder.set("", "limits", Value::Object(limits));
    builder.set("db", "host", Value::from("localhost"));
    builder.set("db", "port", Value::Int(5432));
    let mut primary = Object::new();
    primary.insert("name".into(), Value::from("alpha"));
    builder.set(
        "servers",
        "list",
        Value::Array(vec![Value::Object(primary), Value::Null]),
    );
    builder.finish()
}

fn bytes() -> Vec<u8> {
    compile(&tree(), &CompileOptions::default()).unwrap()
}

#[test]
fn dotted_lookups() {
    let loaded = LoadedConfig::from_bytes(bytes()).unwrap();
    assert_eq!(loaded.get("db.port").unwrap(), Some(Value::Int(5432)));
    assert_eq!(loaded.get("debug").unwrap(), Some(Value::Bool(true)));
    assert_eq!(loaded.get("limits.cpu").unwrap(), Some(Value::Int(2)));
    assert_eq!(
        loaded.get("servers.list.0.name").unwrap(),
        Some(Value::from("alpha"))
    );
    assert_eq!(loaded.get("db.missing").unwrap(), None);
    assert_eq!(loaded.get("nowhere").unwrap(), None);
}

#[test]
fn lookups_agree_with_the_tree() {
    let loaded = LoadedConfig::from_bytes(bytes()).unwrap();
    let original = tree();
    for key in ["db.host", "limits", "limits.cpu", "servers.list.1", "x.y"] {
        assert_eq!(loaded.get(key).unwrap().as_ref(), original.get(key), "{key}");
    }
}

#[test]
fn sections_decode_on_first_access() {
    let loaded = LoadedConfig::from_bytes(bytes()).unwrap();
    assert_eq!(loaded.decoded_sections(), 0);
    assert_eq!(
        loaded.section_names().collect::<Vec<_>>(),
        ["", "db", "servers"]
    );

    loaded.get("db.host").unwrap();
    assert_eq!(loaded.decoded_sections(), 1);
    loaded.get("db.host").unwrap();
    loaded.get("db.port").unwrap();
    assert_eq!(loaded.decoded_sections(), 1);

    let section = loaded.section("db").unwrap().unwrap();
    assert_eq!(section.keys().collect::<Vec<_>>(), ["host", "port"]);
    assert!(loaded.section("nope").unwrap().is_none());
}

#[test]
fn file_artifacts_are_mapped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.pnt");
    compile_to_file(&tree(), &path, &CompileOptions::default()).unwrap();

    let loaded = LoadedConfig::open(&path).unwrap();
    assert!(loaded.is_mapped());
    assert_eq!(loaded.to_tree().unwrap(), tree());
    assert_eq!(load(&path).unwrap(), tree());
    assert_eq!(read_header_of(&path).version, FORMAT_VERSION);
}

fn read_header_of(path: &Path) -> Header {
    crate::read_header(path).unwrap()
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load(&dir.path().join("absent.pnt")),
        Err(LoadError::Io { .. })
    ));
}

#[test]
fn version_mismatch_returns_no_data() {
    let mut bytes = bytes();
    bytes[4..6].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    match LoadedConfig::from_bytes(bytes) {
        Err(LoadError::VersionMismatch { found, .. }) => assert_eq!(found, FORMAT_VERSION + 1),
        Err(other) => panic!("expected a version mismatch, got {other}"),
        Ok(_) => panic!("loaded an artifact of another version"),
    }
}

#[test]
fn every_truncation_is_rejected_cleanly() {
    let full = bytes();
    for len in 0..full.len() {
        let result =
            LoadedConfig::from_bytes(full[..len].to_vec()).and_then(|loaded| loaded.to_tree());
        assert!(result.is_err(), "truncated to {len} bytes but loaded");
    }
}

#[test]
fn flipped_bytes_never_panic() {
    let full = bytes();
    for i in crate::format::HEADER_LEN..full.len() {
        let mut damaged = full.clone();
        damaged[i] ^= 0xff;
        if let Ok(loaded) = LoadedConfig::from_bytes(damaged) {
            let _ = loaded.to_tree();
        }
    }
}

fn put(out: &mut Vec<u8>, words: &[u32]) {
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

/// A body with the given strings and value entries, plus one section
/// named by string 0 whose keys are all string 0 and map to `values_of_keys`.
fn handmade_body(strings: &[&str], entries: &[Vec<u8>], values_of_keys: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    put(&mut body, &[u32::try_from(strings.len()).unwrap()]);
    for s in strings {
        put(&mut body, &[u32::try_from(s.len()).unwrap()]);
        body.extend_from_slice(s.as_bytes());
    }
    put(&mut body, &[u32::try_from(entries.len()).unwrap()]);
    for entry in entries {
        put(&mut body, &[u32::try_from(entry.len()).unwrap()]);
        body.extend_from_slice(entry);
    }
    let payload_len = 4 + 8 * u32::try_from(values_of_keys.len()).unwrap();
    put(&mut body, &[1, 0, 0, payload_len]);
    put(&mut body, &[u32::try_from(values_of_keys.len()).unwrap()]);
    for &value in values_of_keys {
        put(&mut body, &[0, value]);
    }
    body
}

fn artifact(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    Header::new(
        Compression::None,
        crate::Fingerprint::default(),
        crate::format::body_checksum(body),
    )
    .encode(&mut out);
    out.extend_from_slice(body);
    out
}

fn array_of(items: &[u32]) -> Vec<u8> {
    let mut entry = vec![crate::format::TAG_ARRAY];
    put(&mut entry, &[u32::try_from(items.len()).unwrap()]);
    put(&mut entry, items);
    entry
}

fn null() -> Vec<u8> {
    vec![crate::format::TAG_NULL]
}

#[test]
fn handmade_artifact_loads() {
    let body = handmade_body(&["k"], &[null(), array_of(&[0, 0])], &[1]);
    let loaded = LoadedConfig::from_bytes(artifact(&body)).unwrap();
    assert_eq!(
        loaded.get("k.k").unwrap(),
        Some(Value::Array(vec![Value::Null, Value::Null]))
    );
}

#[test]
fn forward_value_reference_is_rejected_at_open() {
    let body = handmade_body(&["k"], &[array_of(&[1]), null()], &[0]);
    match LoadedConfig::from_bytes(artifact(&body)) {
        Err(LoadError::Corruption { detail }) => assert!(detail.contains("forward"), "{detail}"),
        Err(other) => panic!("expected corruption, got {other}"),
        Ok(_) => panic!("loaded a forward reference"),
    }
}

#[test]
fn shared_children_cannot_expand_exponentially() {
    // Entry i is [i-1, i-1]: forty entries describe 2^41 nodes.
    let mut entries = vec![null()];
    for i in 1..=40u32 {
        entries.push(array_of(&[i - 1, i - 1]));
    }
    let body = handmade_body(&["k"], &entries, &[40]);
    let started = std::time::Instant::now();
    match LoadedConfig::from_bytes(artifact(&body)) {
        Err(LoadError::Corruption { detail }) => assert!(detail.contains("expands"), "{detail}"),
        Err(other) => panic!("expected corruption, got {other}"),
        Ok(_) => panic!("accepted an exponential value"),
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn sections_share_one_node_budget() {
    // Entry 20 expands to about two million nodes, under the per-entry
    // limit; three keys holding it exceed what the handle may decode.
    let mut entries = vec![null()];
    for i in 1..=20u32 {
        entries.push(array_of(&[i - 1, i - 1]));
    }
    let body = handmade_body(&["k"], &entries, &[20, 20, 20]);
    let loaded = LoadedConfig::from_bytes(artifact(&body)).unwrap();
    assert!(matches!(
        loaded.get("k.k"),
        Err(LoadError::Corruption { .. })
    ));
    // The failure is cached with the section.
    assert!(matches!(
        loaded.section("k"),
        Err(LoadError::Corruption { .. })
    ));
}

#[test]
fn section_offsets_past_the_body_are_corruption() {
    let mut body = handmade_body(&["k"], &[null()], &[0]);
    // The index entry's offset word follows the name word.
    let index_at = body.len() - (4 + 8) - 12;
    body[index_at + 4..index_at + 8].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        LoadedConfig::from_bytes(artifact(&body)),
        Err(LoadError::Corruption { .. })
    ));

    assert!(payload_slot(usize::MAX, 1, 0, usize::MAX).is_none());
    assert!(payload_slot(8, 4, usize::MAX, usize::MAX).is_none());
    assert!(payload_slot(8, 4, 4, 15).is_none());
    let slot = payload_slot(8, 4, 4, 16).unwrap();
    assert_eq!((slot.start, slot.end), (12, 16));
}

#[test]
fn a_single_flipped_body_byte_is_rejected_at_open() {
    for compression in [Compression::None, Compression::Deflate] {
        let options = CompileOptions::default().with_compression(compression);
        let full = compile(&tree(), &options).unwrap();
        let header = crate::format::HEADER_LEN;
        for i in [header, header + (full.len() - header) / 2, full.len() - 1] {
            let mut damaged = full.clone();
            damaged[i] ^= 0x01;
            match LoadedConfig::from_bytes(damaged) {
                Err(LoadError::Corruption { detail }) => {
                    assert_eq!(detail, "checksum mismatch");
                }
                Err(other) => panic!("byte {i}: expected corruption, got {other}"),
                Ok(_) => panic!("byte {i}: loaded a damaged artifact"),
            }
        }
    }
}

#[test]
fn only_found_lookups_are_cached() {
    let loaded = LoadedConfig::from_bytes(bytes()).unwrap();
    for i in 0..100 {
        assert_eq!(loaded.get(&format!("db.missing{i}")).unwrap(), None);
    }
    assert_eq!(loaded.cached_lookups(), 0);
    loaded.get("db.port").unwrap();
    loaded.get("db.port").unwrap();
    assert_eq!(loaded.cached_lookups(), 1);
}

#[test]
fn concurrent_readers_see_the_same_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.pnt");
    compile_to_file(&tree(), &path, &CompileOptions::default()).unwrap();
    let loaded = Arc::new(LoadedConfig::open(&path).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loaded = Arc::clone(&loaded);
            thread::spawn(move || {
                (0..50)
                    .map(|_| loaded.get("servers.list.0.name").unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        let seen = handle.join().unwrap();
        assert!(seen.iter().all(|v| v == &Some(Value::from("alpha"))));
    }
    assert_eq!(loaded.decoded_sections(), 1);
}

#[test]
fn cancelled_load_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.pnt");
    compile_to_file(&tree(), &path, &CompileOptions::default()).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(matches!(
        load_with(&path, &cancel),
        Err(LoadError::Cancelled)
    ));
}
