use pretty_assertions::assert_eq;
use tsk_ir::{Arg, Node, Object, SourcePos, Span, Value};

use super::*;

fn positional(value: i64) -> Arg {
    Arg {
        name: None,
        value: Node::literal(Value::Int(value), Span::DUMMY, SourcePos::START),
        span: Span::DUMMY,
        pos: SourcePos::START,
    }
}

fn named(name: &str, value: i64) -> Arg {
    Arg {
        name: Some(name.to_owned()),
        ..positional(value)
    }
}

fn schema() -> OperatorSchema {
    OperatorSchema::new().required("a").optional("b")
}

fn bound_names(binding: &Binding<'_>) -> Vec<String> {
    binding.bound.iter().map(|(n, _)| n.clone()).collect()
}

#[test]
fn positional_binds_in_order() {
    let args = [positional(1), positional(2)];
    let binding = schema().bind(&args);
    assert!(binding.is_clean());
    assert_eq!(bound_names(&binding), vec!["a", "b"]);
    assert!(binding.get("b").is_some());
}

#[test]
fn mixed_positional_and_named() {
    let args = [positional(1), named("b", 2)];
    let binding = schema().bind(&args);
    assert!(binding.is_clean());
    assert_eq!(bound_names(&binding), vec!["a", "b"]);
}

#[test]
fn binding_problems() {
    let args = [named("b", 1), named("c", 2), named("b", 3)];
    let binding = schema().bind(&args);
    let kinds: Vec<_> = binding
        .problems
        .iter()
        .map(|p| match p {
            BindProblem::Unknown { .. } => "unknown",
            BindProblem::TooManyPositional { .. } => "positional",
            BindProblem::Duplicate { .. } => "duplicate",
            BindProblem::Missing { .. } => "missing",
        })
        .collect();
    assert_eq!(kinds, vec!["unknown", "duplicate", "missing"]);
}

#[test]
fn extra_positional_is_reported() {
    let args = [positional(1), positional(2), positional(3)];
    let binding = schema().bind(&args);
    assert!(matches!(
        binding.problems.as_slice(),
        [BindProblem::TooManyPositional { index: 2, .. }]
    ));
    assert_eq!(bound_names(&binding), vec!["a", "b", "2"]);
}

#[test]
fn schema_parameter_sets() {
    let schema = OperatorSchema::new()
        .required("x")
        .optional("y")
        .required("z");
    assert_eq!(schema.required_params().collect::<Vec<_>>(), vec!["x", "z"]);
    assert_eq!(schema.optional_params().collect::<Vec<_>>(), vec!["y"]);
    assert!(!schema.pure);
}

struct Shout {
    schema: OperatorSchema,
}

impl Operator for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn schema(&self) -> &OperatorSchema {
        &self.schema
    }

    fn execute(&self, args: &Object, _ctx: &ExecContext<'_>) -> Result<Value, OperatorError> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(Value::String(format!("{}!", text.to_uppercase())))
    }
}

#[test]
fn custom_operators_register_and_replace() {
    let mut registry = OperatorRegistry::empty();
    assert!(registry.is_empty());
    let shout = Shout {
        schema: OperatorSchema::new().required("text").pure(),
    };
    assert!(registry.register(shout).is_none());
    assert!(registry.contains("shout"));

    let mut args = Object::new();
    args.insert("text".into(), "hi".into());
    let out = registry
        .execute("shout", &args, &ExecContext::new())
        .unwrap()
        .unwrap();
    assert_eq!(out, Value::String("HI!".into()));
    assert!(registry.execute("missing", &args, &ExecContext::new()).is_none());

    let replaced = registry.register(Shout {
        schema: OperatorSchema::new(),
    });
    assert!(replaced.is_some());
    assert_eq!(registry.len(), 1);
}

#[test]
fn builtin_names_are_sorted() {
    let registry = OperatorRegistry::builtin();
    let names: Vec<_> = registry.names().collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    assert!(format!("{registry:?}").contains("\"env\""));
}
