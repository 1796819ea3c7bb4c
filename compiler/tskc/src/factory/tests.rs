use std::fs;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tsk_ir::Value;
use tsk_sema::Environment;

use super::*;
use crate::telemetry::RecordingSink;

const APP: &str = "[db]\nhost = \"localhost\"\nport = 5432\n";

fn write(path: &Path, text: &str) {
    fs::write(path, text).unwrap();
}

fn factory_with_sink() -> (BinaryFactory, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let factory = BinaryFactory::default().with_sink(sink.clone());
    (factory, sink)
}

#[test]
fn artifact_paths() {
    let factory = BinaryFactory::default();
    assert_eq!(
        factory.artifact_path(Path::new("conf/app.tsk")),
        PathBuf::from("conf/app.pnt")
    );

    let dir = tempfile::tempdir().unwrap();
    let factory = BinaryFactory::new(FactoryConfig::new().with_artifact_dir(dir.path()));
    let a = factory.artifact_path(Path::new("one/app.tsk"));
    let b = factory.artifact_path(Path::new("two/app.tsk"));
    assert_ne!(a, b);
    assert_eq!(a.parent(), Some(dir.path()));
    let name = a.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("app-") && name.ends_with(".pnt"), "{name}");
}

#[test]
fn first_load_compiles_then_loads_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    let (factory, sink) = factory_with_sink();

    let first = factory.load_configuration(&source).unwrap();
    let second = factory.load_configuration(&source).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get("db.port"), Some(&Value::Int(5432)));
    assert!(source.with_extension("pnt").exists());

    let stats = factory.stats().snapshot();
    assert_eq!(stats.compiles, 1);
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(
        sink.names(),
        [
            "LoadStarted",
            "CompileStarted",
            "CompileFinished",
            "LoadFinished",
            "LoadStarted",
            "LoadFinished",
        ]
    );
    let entry = factory.cache_entry(&source).unwrap();
    assert_eq!(entry.size, APP.len() as u64);
    assert_eq!(entry.artifact, source.with_extension("pnt"));
}

#[test]
fn existing_artifact_is_reused_by_a_new_factory() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    BinaryFactory::default().load_configuration(&source).unwrap();

    let factory = BinaryFactory::default();
    factory.load_configuration(&source).unwrap();
    assert_eq!(factory.stats().compiles(), 0);
}

#[test]
fn rewriting_identical_content_does_not_recompile() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    let factory = BinaryFactory::default();
    factory.load_configuration(&source).unwrap();

    write(&source, APP);
    factory.load_configuration(&source).unwrap();
    assert_eq!(factory.stats().compiles(), 1);
}

#[test]
fn changed_source_is_recompiled() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    let factory = BinaryFactory::default();
    factory.load_configuration(&source).unwrap();

    write(&source, "[db]\nhost = \"db.internal\"\nport = 6543\n");
    let tree = factory.load_configuration(&source).unwrap();
    assert_eq!(tree.get("db.port"), Some(&Value::Int(6543)));
    assert_eq!(factory.stats().compiles(), 2);
}

#[test]
fn damaged_artifact_falls_back_to_recompiling() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    BinaryFactory::default().load_configuration(&source).unwrap();

    // Keep the header, so the artifact still looks fresh, and cut the body.
    let artifact = source.with_extension("pnt");
    let bytes = fs::read(&artifact).unwrap();
    fs::write(&artifact, &bytes[..bytes.len() - 3]).unwrap();

    let factory = BinaryFactory::default();
    let tree = factory.load_configuration(&source).unwrap();
    assert_eq!(tree.get("db.host"), Some(&Value::from("localhost")));
    assert_eq!(factory.stats().compiles(), 1);
}

#[test]
fn other_format_version_is_recompiled() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    BinaryFactory::default().load_configuration(&source).unwrap();

    let artifact = source.with_extension("pnt");
    let mut bytes = fs::read(&artifact).unwrap();
    bytes[4..6].copy_from_slice(&99u16.to_le_bytes());
    fs::write(&artifact, &bytes).unwrap();

    let factory = BinaryFactory::default();
    factory.load_configuration(&source).unwrap();
    assert_eq!(factory.stats().compiles(), 1);
    let header = read_header(&artifact).unwrap();
    assert_eq!(header.version, tsk_binary::FORMAT_VERSION);
}

#[test]
fn artifact_alone_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    BinaryFactory::default().load_configuration(&source).unwrap();
    fs::remove_file(&source).unwrap();

    let tree = BinaryFactory::default().load_configuration(&source).unwrap();
    assert_eq!(tree.get("db.port"), Some(&Value::Int(5432)));
}

#[test]
fn artifact_alone_fails_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    fs::write(source.with_extension("pnt"), b"garbage").unwrap();
    match BinaryFactory::default().load_configuration(&source) {
        Err(FactoryError::Load {
            source: tsk_binary::LoadError::Format,
            ..
        }) => {}
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn nothing_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let result = BinaryFactory::default().load_configuration(&dir.path().join("absent.tsk"));
    assert!(matches!(result, Err(FactoryError::SourceMissing { .. })));
}

#[test]
fn broken_source_reports_diagnostics_and_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, "[a]\nx = \n[b]\ny = @nope()\n");
    let err = BinaryFactory::default()
        .load_configuration(&source)
        .unwrap_err();
    assert!(err.diagnostics().len() >= 2, "{err:?}");
    assert!(err.to_string().contains("error(s)"));
    assert!(!source.with_extension("pnt").exists());
}

#[test]
fn timeout_leaves_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    let factory = BinaryFactory::new(FactoryConfig::new().with_timeout(Duration::ZERO));
    let err = factory.load_configuration(&source).unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
    assert!(!source.with_extension("pnt").exists());
    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn compressed_artifacts_in_a_separate_directory() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    let out = dir.path().join("build");
    let factory = BinaryFactory::new(
        FactoryConfig::new()
            .with_artifact_dir(&out)
            .with_compression(Compression::Deflate),
    );
    let tree = factory.load_configuration(&source).unwrap();
    assert_eq!(tree.get("db.host"), Some(&Value::from("localhost")));

    let artifact = factory.artifact_path(&source);
    assert!(artifact.starts_with(&out));
    assert_eq!(read_header(&artifact).unwrap().compression, Compression::Deflate);
}

#[test]
fn environment_comes_from_the_context() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, "[app]\ntimeout = @env(\"APP_TIMEOUT\", \"30\")\n");
    let environment: Environment = [("APP_TIMEOUT", "45")].into_iter().collect();
    let context = ResolveContext::default().with_environment(environment);
    let factory = BinaryFactory::default().with_context(context);
    let tree = factory.load_configuration(&source).unwrap();
    assert_eq!(tree.get("app.timeout"), Some(&Value::from("45")));
}

fn factory_with_timeout(timeout: &str) -> BinaryFactory {
    let environment: Environment = [("APP_TIMEOUT", timeout)].into_iter().collect();
    BinaryFactory::default().with_context(ResolveContext::default().with_environment(environment))
}

#[test]
fn changed_environment_is_recompiled() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, "[app]\ntimeout = @env(\"APP_TIMEOUT\", \"30\")\n");
    factory_with_timeout("45").load_configuration(&source).unwrap();

    let same = factory_with_timeout("45");
    same.load_configuration(&source).unwrap();
    assert_eq!(same.stats().compiles(), 0);

    let changed = factory_with_timeout("60");
    let tree = changed.load_configuration(&source).unwrap();
    assert_eq!(tree.get("app.timeout"), Some(&Value::from("60")));
    assert_eq!(changed.stats().compiles(), 1);
}

#[test]
fn changed_compression_is_recompiled() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    BinaryFactory::default().load_configuration(&source).unwrap();

    let factory =
        BinaryFactory::new(FactoryConfig::new().with_compression(Compression::Deflate));
    factory.load_configuration(&source).unwrap();
    assert_eq!(factory.stats().compiles(), 1);
    let artifact = source.with_extension("pnt");
    assert_eq!(read_header(&artifact).unwrap().compression, Compression::Deflate);
}

#[test]
fn precompile_batches() {
    let dir = tempfile::tempdir().unwrap();
    let sources: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|name| dir.path().join(format!("{name}.tsk")))
        .collect();
    write(&sources[0], APP);
    write(&sources[1], "[x]\ny = 1\n");
    write(&sources[2], "[x]\ny = \n");

    let factory = BinaryFactory::default();
    let results = factory.precompile_all(&sources);
    assert_eq!(results.len(), 3);
    assert!(results[0].outcome.is_ok());
    assert!(results[1].outcome.is_ok());
    assert!(matches!(
        results[2].outcome,
        Err(FactoryError::Diagnostics { .. })
    ));
    assert!(sources[0].with_extension("pnt").exists());
    assert!(!sources[2].with_extension("pnt").exists());
    assert_eq!(factory.stats().compiles(), 2);

    // Precompiled artifacts are picked up without another compile.
    factory.load_configuration(&sources[1]).unwrap();
    assert_eq!(factory.stats().compiles(), 2);
}

#[test]
fn repeated_recompiles_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app.tsk");
    write(&source, APP);
    let factory = BinaryFactory::new(
        FactoryConfig::new().with_recompile_warning(3, Duration::from_secs(60)),
    );
    for _ in 0..3 {
        factory.compile_source(&source).unwrap();
    }
    let advice = factory.recommendations();
    assert_eq!(advice.len(), 1);
    assert!(advice[0].contains("recompiled 3 times in 1 minutes"), "{advice:?}");
}

#[test]
fn hierarchy_merges_root_first() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("services").join("api");
    fs::create_dir_all(&nested).unwrap();
    write(
        &dir.path().join(HIERARCHY_FILE),
        "[app]\nname = \"base\"\nport = 80\n[log]\nlevel = \"info\"\n",
    );
    write(&nested.join(HIERARCHY_FILE), "[app]\nport = 8080\n");

    let tree = BinaryFactory::default().load_hierarchy(&nested).unwrap();
    assert_eq!(tree.get("app.name"), Some(&Value::from("base")));
    assert_eq!(tree.get("app.port"), Some(&Value::Int(8080)));
    assert_eq!(tree.get("log.level"), Some(&Value::from("info")));
}

#[test]
fn hierarchy_without_files() {
    let dir = tempfile::tempdir().unwrap();
    let result = BinaryFactory::default().load_hierarchy(dir.path());
    assert!(matches!(result, Err(FactoryError::SourceMissing { .. })));
}
