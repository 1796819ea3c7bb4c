use pretty_assertions::assert_eq;
use tsk_ir::{ConfigTreeBuilder, Object, OperatorCall, Value};

use super::*;
use crate::{LoadedConfig, MAGIC};

fn sample_tree() -> ConfigTree {
    let mut builder = ConfigTreeBuilder::new();
    builder.set("", "name", Value::from("demo"));
    builder.set("db", "host", Value::from("localhost"));
    builder.set("db", "port", Value::Int(5432));
    builder.set("db", "ratio", Value::Float(0.75));
    builder.set("cache", "host", Value::from("localhost"));
    builder.set(
        "cache",
        "tags",
        Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("a")]),
    );
    let mut args = Object::new();
    args.insert("name".into(), Value::from("APP_TIMEOUT"));
    args.insert("default".into(), Value::from("30"));
    builder.set(
        "app",
        "timeout",
        Value::OperatorCall(OperatorCall::new("env", args)),
    );
    builder.ensure_section("empty");
    builder.finish()
}

fn wide_tree(sections: usize) -> ConfigTree {
    let mut builder = ConfigTreeBuilder::new();
    for i in 0..sections {
        let name = format!("s{i}");
        builder.set(&name, "id", Value::Int(i64::try_from(i % 7).unwrap()));
        builder.set(&name, "host", Value::from("localhost"));
        let mut nested = Object::new();
        nested.insert("shared".into(), Value::Bool(true));
        nested.insert("slot".into(), Value::from(format!("slot-{}", i % 5)));
        builder.set(&name, "meta", Value::Object(nested));
    }
    builder.finish()
}

#[test]
fn output_starts_with_header() {
    let bytes = compile(&sample_tree(), &CompileOptions::default()).unwrap();
    assert_eq!(&bytes[..4], &MAGIC);
}

#[test]
fn compilation_is_deterministic() {
    let options = CompileOptions::default();
    let first = compile(&sample_tree(), &options).unwrap();
    let second = compile(&sample_tree(), &options).unwrap();
    assert_eq!(first, second);

    let deflate = options.with_compression(Compression::Deflate);
    assert_eq!(
        compile(&sample_tree(), &deflate).unwrap(),
        compile(&sample_tree(), &deflate).unwrap()
    );
}

#[test]
fn parallel_and_sequential_builds_match() {
    let tree = wide_tree(100);
    let sequential = CompileOptions::default().with_parallel_threshold(usize::MAX);
    let parallel = CompileOptions::default().with_parallel_threshold(0);
    assert_eq!(
        compile(&tree, &sequential).unwrap(),
        compile(&tree, &parallel).unwrap()
    );
}

#[test]
fn repeated_strings_and_values_are_stored_once() {
    let bytes = compile(&wide_tree(50), &CompileOptions::default()).unwrap();
    let loaded = LoadedConfig::from_bytes(bytes).unwrap();

    let strings: Vec<&[u8]> = loaded.string_table().collect();
    let values: Vec<&[u8]> = loaded.value_table().collect();
    let hosts = strings.iter().filter(|s| **s == b"localhost").count();
    assert_eq!(hosts, 1);
    // 50 section names, 5 keys/fields, "localhost", 5 slot strings.
    assert_eq!(strings.len(), 50 + 5 + 1 + 5);

    let mut sorted = values.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), values.len());
}

#[test]
fn deferred_calls_survive_compilation() {
    let bytes = compile(&sample_tree(), &CompileOptions::default()).unwrap();
    let loaded = LoadedConfig::from_bytes(bytes).unwrap();
    let timeout = loaded.get("app.timeout").unwrap().unwrap();
    let call = timeout.as_call().unwrap();
    assert_eq!(call.name, "env");
    assert_eq!(call.args.get("default"), Some(&Value::from("30")));
}

#[test]
fn deflate_round_trips() {
    let options = CompileOptions::default().with_compression(Compression::Deflate);
    let bytes = compile(&sample_tree(), &options).unwrap();
    let loaded = LoadedConfig::from_bytes(bytes).unwrap();
    assert_eq!(loaded.header().compression, Compression::Deflate);
    assert_eq!(loaded.to_tree().unwrap(), sample_tree());
}

#[test]
fn fingerprint_is_recorded() {
    let fingerprint = Fingerprint::new(b"source", None);
    let options = CompileOptions::default().with_fingerprint(fingerprint);
    let bytes = compile(&sample_tree(), &options).unwrap();
    let loaded = LoadedConfig::from_bytes(bytes).unwrap();
    assert_eq!(loaded.header().fingerprint, fingerprint);
}

#[test]
fn cancelled_compile_fails() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let options = CompileOptions::default().with_cancel(cancel);
    assert!(matches!(
        compile(&sample_tree(), &options),
        Err(CompileError::Cancelled)
    ));
    let parallel = options.with_parallel_threshold(0);
    assert!(matches!(
        compile(&wide_tree(10), &parallel),
        Err(CompileError::Cancelled)
    ));
}

#[test]
fn expired_timeout_fails() {
    let options = CompileOptions::default().with_timeout(Duration::ZERO);
    let err = compile(&sample_tree(), &options).unwrap_err();
    assert!(matches!(err, CompileError::TimedOut));
    assert!(err.is_interrupted());
}

#[test]
fn empty_tree_compiles() {
    let bytes = compile(&ConfigTree::new(), &CompileOptions::default()).unwrap();
    let loaded = LoadedConfig::from_bytes(bytes).unwrap();
    assert!(loaded.is_empty());
}

fn parse(source: &str) -> tsk_ir::Config {
    let parsed = tsk_parse::parse_source(source);
    assert!(!parsed.has_errors(), "{:?}", parsed.diagnostics());
    parsed.config
}

#[test]
fn ast_compiles_without_resolution() {
    let config = parse(
        "[db]\nhost = \"localhost\"\nports = 8000-9000\n[db]\nport = 5433\nextra += [1]\nextra += [2]\nsecret = @env(\"DB_SECRET\")\n",
    );
    let bytes = compile_ast(&config, &CompileOptions::default()).unwrap();
    let tree = LoadedConfig::from_bytes(bytes).unwrap().to_tree().unwrap();

    assert_eq!(tree.get("db.host"), Some(&Value::from("localhost")));
    assert_eq!(tree.get("db.port"), Some(&Value::Int(5433)));
    assert_eq!(tree.get("db.ports.min"), Some(&Value::Int(8000)));
    assert_eq!(tree.get("db.ports.type"), Some(&Value::from("range")));
    assert_eq!(
        tree.get("db.extra"),
        Some(&Value::Array(vec![Value::Int(1), Value::Int(2)]))
    );
    let secret = tree.get("db.secret").and_then(Value::as_call).unwrap();
    assert_eq!(secret.args.get("0"), Some(&Value::from("DB_SECRET")));
}

#[test]
fn ast_references_are_unsupported() {
    let config = parse("[a]\nx = 1\n[b]\ny = a.x\n");
    match compile_ast(&config, &CompileOptions::default()) {
        Err(CompileError::Unsupported { shape, location }) => {
            assert_eq!(shape, "reference");
            assert_eq!(location, "b.y");
        }
        other => panic!("expected an unsupported shape, got {other:?}"),
    }
}
