use super::*;
use pretty_assertions::assert_eq;

fn object(pairs: &[(&str, Value)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect(),
    )
}

#[test]
fn get_path_walks_objects_and_arrays() {
    let value = object(&[(
        "pool",
        object(&[("hosts", Value::Array(vec!["a".into(), "b".into()]))]),
    )]);
    assert_eq!(value.get_path(&["pool", "hosts", "1"]), Some(&Value::from("b")));
    assert_eq!(value.get_path(&["pool", "missing"]), None);
    assert_eq!(value.get_path(&["pool", "hosts", "x"]), None);
    assert_eq!(value.get_path::<&str>(&[]), Some(&value));
}

#[test]
fn merge_values_recurses_into_objects() {
    let base = object(&[
        ("host", "a".into()),
        ("limits", object(&[("min", Value::Int(1)), ("max", Value::Int(5))])),
    ]);
    let overlay = object(&[("limits", object(&[("max", Value::Int(9))])), ("tls", true.into())]);

    let merged = merge_values(base, overlay);
    assert_eq!(
        merged,
        object(&[
            ("host", "a".into()),
            ("limits", object(&[("min", Value::Int(1)), ("max", Value::Int(9))])),
            ("tls", true.into()),
        ])
    );
}

#[test]
fn merge_values_appends_arrays_and_replaces_scalars() {
    let merged = merge_values(
        Value::Array(vec![Value::Int(1)]),
        Value::Array(vec![Value::Int(2), Value::Int(3)]),
    );
    assert_eq!(merged, Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    assert_eq!(merge_values(Value::Int(1), "x".into()), Value::from("x"));
    assert_eq!(
        merge_values(Value::Array(vec![Value::Int(1)]), object(&[])),
        object(&[])
    );
}

#[test]
fn deferred_detection_is_recursive() {
    let call = Value::OperatorCall(OperatorCall::new("env", Object::new()));
    assert!(call.is_deferred());
    assert!(Value::Array(vec![Value::Int(1), object(&[("x", call)])]).is_deferred());
    assert!(!object(&[("x", Value::Int(1))]).is_deferred());
}

#[test]
fn display_renders_tsk_literals() {
    let mut args = Object::new();
    args.insert("name".into(), "PORT".into());
    let value = object(&[
        ("port", Value::OperatorCall(OperatorCall::new("env", args))),
        ("ratio", Value::Float(2.0)),
        ("tags", Value::Array(vec!["a".into(), Value::Null])),
    ]);
    assert_eq!(
        value.to_string(),
        r#"{port: @env(name: "PORT"), ratio: 2.0, tags: ["a", null]}"#
    );
}

#[test]
fn truthiness() {
    assert!(!Value::Null.is_truthy());
    assert!(!Value::from("").is_truthy());
    assert!(Value::from(0.5).is_truthy());
    assert!(!Value::Int(0).is_truthy());
}
