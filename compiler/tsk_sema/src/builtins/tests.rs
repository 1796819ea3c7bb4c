use std::io::Write;

use chrono::TimeZone;
use pretty_assertions::assert_eq;
use tsk_ir::{Object, Value};

use super::*;
use crate::context::Environment;
use crate::OperatorRegistry;

fn args(pairs: &[(&str, Value)]) -> Object {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn run(name: &str, pairs: &[(&str, Value)]) -> Result<Value, OperatorError> {
    let registry = OperatorRegistry::builtin();
    registry
        .execute(name, &args(pairs), &ExecContext::new())
        .unwrap()
}

#[test]
fn every_table_entry_registers_under_its_name() {
    for (name, factory) in BUILTINS {
        assert_eq!(factory().name(), *name);
    }
    assert_eq!(OperatorRegistry::builtin().len(), BUILTINS.len());
}

#[test]
fn purity_flags() {
    let registry = OperatorRegistry::builtin();
    for impure in ["env", "date", "file", "query", "cache"] {
        assert!(!registry.schema(impure).unwrap().pure, "{impure}");
    }
    for pure in ["upper", "concat", "add", "if", "default", "length"] {
        assert!(registry.schema(pure).unwrap().pure, "{pure}");
    }
    assert!(registry.schema("env").unwrap().env_sourced);
}

#[test]
fn env_reads_only_the_supplied_environment() {
    let registry = OperatorRegistry::builtin();
    let env = Environment::new().with("APP_TIMEOUT", "45");
    let call = args(&[("name", "APP_TIMEOUT".into()), ("default", "30".into())]);

    let with_env = registry
        .execute("env", &call, &ExecContext::new().with_environment(&env))
        .unwrap()
        .unwrap();
    assert_eq!(with_env, Value::String("45".into()));

    let without = registry
        .execute("env", &call, &ExecContext::new())
        .unwrap()
        .unwrap();
    assert_eq!(without, Value::String("30".into()));
}

#[test]
fn string_operators() {
    assert_eq!(
        run("upper", &[("value", "abc".into())]).unwrap(),
        Value::String("ABC".into())
    );
    assert_eq!(
        run("trim", &[("value", "  x ".into())]).unwrap(),
        Value::String("x".into())
    );
    assert!(matches!(
        run("lower", &[("value", Value::Int(1))]),
        Err(OperatorError::InvalidArgument { name: "value", .. })
    ));
}

#[test]
fn concat_joins_with_separator() {
    let values = Value::Array(vec!["a".into(), Value::Int(1), Value::Bool(true)]);
    assert_eq!(
        run("concat", &[("values", values.clone())]).unwrap(),
        Value::String("a1true".into())
    );
    assert_eq!(
        run("concat", &[("values", values), ("separator", "-".into())]).unwrap(),
        Value::String("a-1-true".into())
    );
}

#[test]
fn arithmetic() {
    assert_eq!(
        run("add", &[("a", Value::Int(2)), ("b", Value::Int(3))]).unwrap(),
        Value::Int(5)
    );
    assert_eq!(
        run("multiply", &[("a", Value::Int(2)), ("b", Value::Float(1.5))]).unwrap(),
        Value::Float(3.0)
    );
    assert!(matches!(
        run("subtract", &[("a", Value::Int(i64::MIN)), ("b", Value::Int(1))]),
        Err(OperatorError::Overflow("subtract"))
    ));
    assert!(matches!(
        run("add", &[("a", Value::Int(1))]),
        Err(OperatorError::MissingArgument("b"))
    ));
}

#[test]
fn length_if_default() {
    assert_eq!(
        run("length", &[("value", "héllo".into())]).unwrap(),
        Value::Int(5)
    );
    assert_eq!(
        run(
            "if",
            &[
                ("condition", Value::Bool(false)),
                ("then", Value::Int(1)),
                ("else", Value::Int(2))
            ]
        )
        .unwrap(),
        Value::Int(2)
    );
    assert_eq!(
        run("if", &[("condition", "yes".into()), ("then", Value::Int(1))]).unwrap(),
        Value::Int(1)
    );
    assert_eq!(
        run("default", &[("value", Value::Null), ("fallback", Value::Int(9))]).unwrap(),
        Value::Int(9)
    );
}

#[test]
fn file_reads_contents() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "secret").unwrap();
    let path = file.path().to_string_lossy().into_owned();
    assert_eq!(
        run("file", &[("path", path.into())]).unwrap(),
        Value::String("secret".into())
    );
    assert!(matches!(
        run("file", &[("path", "/definitely/not/here".into())]),
        Err(OperatorError::Io { .. })
    ));
}

#[test]
fn query_needs_an_adapter() {
    assert!(matches!(
        run("query", &[("sql", "select 1".into())]),
        Err(OperatorError::Unavailable { operator: "query", .. })
    ));
}

#[test]
fn date_short_formats() {
    let now = chrono::Utc
        .with_ymd_and_hms(2024, 2, 29, 13, 5, 9)
        .single()
        .unwrap();
    assert_eq!(render_date(now, "Y").unwrap(), "2024");
    assert_eq!(render_date(now, "Y-m-d").unwrap(), "2024-02-29");
    assert_eq!(render_date(now, "Y-m-d H:i:s").unwrap(), "2024-02-29 13:05:09");
    assert_eq!(render_date(now, "c").unwrap(), "2024-02-29T13:05:09+00:00");
    assert_eq!(render_date(now, "%d/%m/%Y %%").unwrap(), "29/02/2024 %");
    assert_eq!(render_date(now, "whatever").unwrap(), "2024-02-29 13:05:09");
}

#[test]
fn malformed_date_pattern_is_an_argument_error() {
    let now = chrono::Utc::now();
    assert!(matches!(
        render_date(now, "%Q"),
        Err(OperatorError::InvalidArgument { name: "format", .. })
    ));
}

#[test]
fn date_uses_the_current_clock() {
    let year = run("date", &[("format", "Y".into())]).unwrap();
    let Value::String(year) = year else {
        panic!("expected a string, got {year:?}");
    };
    assert_eq!(year.len(), 4);
    assert!(year.parse::<i32>().unwrap() >= 2024);

    let stamp = run("date", &[("format", "c".into())]).unwrap();
    let Value::String(stamp) = stamp else {
        panic!("expected a string, got {stamp:?}");
    };
    assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok(), "{stamp}");
}

#[test]
fn comparisons_use_string_forms() {
    let pair = |a: Value, b: Value| [("a", a), ("b", b)];
    assert_eq!(
        run("eq", &pair("8080".into(), Value::Int(8080))).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        run("ne", &pair("prod".into(), "dev".into())).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        run("gt", &pair(Value::Int(10), Value::Float(9.5))).unwrap(),
        Value::Bool(true)
    );
    // Not numeric on both sides, so "10" sorts before "9".
    assert_eq!(
        run("gt", &pair("10".into(), Value::Int(9))).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn string_conditions_follow_config_truthiness() {
    for falsy in ["", "false", "null", "0"] {
        assert_eq!(
            run(
                "if",
                &[
                    ("condition", falsy.into()),
                    ("then", Value::Int(1)),
                    ("else", Value::Int(2))
                ]
            )
            .unwrap(),
            Value::Int(2),
            "{falsy:?}"
        );
    }
}

#[test]
fn date_without_format_is_a_timestamp() {
    assert!(matches!(run("date", &[]).unwrap(), Value::Int(n) if n > 1_600_000_000));
}
