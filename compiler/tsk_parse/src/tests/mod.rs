use pretty_assertions::assert_eq;
use tsk_ir::{AssignOp, Config, NodeKind, Reference, Value};

use crate::{parse_source, parse_source_with, ParseErrorKind, ParseOptions};


fn parse_ok(source: &str) -> Config {
    let parsed = parse_source(source);
    assert!(
        !parsed.has_errors(),
        "unexpected errors: {:?}",
        parsed.diagnostics()
    );
    parsed.config
}

fn literal(node: &NodeKind) -> &Value {
    match node {
        NodeKind::Literal(value) => value,
        other => panic!("expected literal, found {other:?}"),
    }
}

#[test]
fn empty_source_has_no_sections() {
    let config = parse_ok("");
    assert!(config.sections.is_empty());
    let config = parse_ok("\n\n# only a comment\n");
    assert!(config.sections.is_empty());
}

#[test]
fn repeated_sections_stay_separate() {
    let config = parse_ok("[db]\nhost=\"localhost\"\nport=5432\n[db]\nport=5433");
    let names: Vec<_> = config.section_names().collect();
    assert_eq!(names, vec!["db", "db"]);
    assert_eq!(config.sections_named("db").count(), 2);
    let second = &config.sections[1];
    assert_eq!(second.entries.len(), 1);
    assert_eq!(second.entries[0].key, "port");
    assert_eq!(literal(&second.entries[0].value.kind), &Value::Int(5433));
}

#[test]
fn declarations_before_first_header_go_to_root() {
    let config = parse_ok("name = \"app\"\n[db]\nx = 1\n");
    assert_eq!(config.sections.len(), 2);
    let root = &config.sections[0];
    assert!(root.is_root());
    assert!(root.implicit);
    assert_eq!(root.entries[0].key, "name");
    assert!(!config.sections[1].implicit);
}

#[test]
fn separators_and_semicolons() {
    let config = parse_ok("[a]\nx = 1; y: 2\nz = 3;\n");
    let keys: Vec<_> = config.sections[0]
        .entries
        .iter()
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(keys, vec!["x", "y", "z"]);
}

#[test]
fn merge_operator() {
    let config = parse_ok("[a]\nlist = [1]\nlist += [2]\n");
    let ops: Vec<_> = config.sections[0].entries.iter().map(|e| e.op).collect();
    assert_eq!(ops, vec![AssignOp::Set, AssignOp::Merge]);
}

#[test]
fn quoted_and_keyword_keys() {
    let config = parse_ok("[a]\n\"my key\" = 1\nnull = 2\n");
    let keys: Vec<_> = config.sections[0]
        .entries
        .iter()
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(keys, vec!["my key", "null"]);
}

#[test]
fn global_variables() {
    let config = parse_ok("$port = 80\n[web]\nport = $port\n");
    let root = &config.sections[0];
    assert_eq!(root.entries[0].variable_name(), Some("port"));
    let web = &config.sections[1];
    assert_eq!(
        web.entries[0].value.kind,
        NodeKind::Reference(Reference::Variable("port".into()))
    );
}

#[test]
fn entry_positions_are_recorded() {
    let config = parse_ok("[a]\n  key = 1\n");
    let entry = &config.sections[0].entries[0];
    assert_eq!(entry.pos.line, 2);
    assert_eq!(entry.pos.column, 3);
}

#[test]
fn depth_limit() {
    let options = ParseOptions {
        max_depth: 4,
        ..ParseOptions::default()
    };
    let parsed = parse_source_with("[a]\nx = [[[[[1]]]]]\n", &options);
    assert_eq!(parsed.parse_errors.len(), 1);
    assert_eq!(parsed.parse_errors[0].kind, ParseErrorKind::TooDeep { limit: 4 });

    let parsed = parse_source_with("[a]\nx = [[[1]]]\n", &options);
    assert!(!parsed.has_errors());
}
