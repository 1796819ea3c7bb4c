//! Built-in operators.
//!
//! Impure operators (`env`, `date`, `file`, `query`, `cache`) are never
//! folded; resolution leaves them as deferred calls. The remaining operators
//! are pure and fold whenever their arguments are constants.
//!
//! `eq`, `ne` and `gt` back the `==`, `!=` and `>` conditions of a ternary;
//! the parser lowers `+` chains to `concat` and `c ? a : b` to `if`.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use tsk_ir::{Object, Value};

use crate::context::ExecContext;
use crate::registry::{Operator, OperatorError, OperatorFactory, OperatorSchema};

type Run = fn(&Object, &ExecContext<'_>) -> Result<Value, OperatorError>;

struct Builtin {
    name: &'static str,
    schema: OperatorSchema,
    run: Run,
}

impl Operator for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn schema(&self) -> &OperatorSchema {
        &self.schema
    }

    fn execute(&self, args: &Object, ctx: &ExecContext<'_>) -> Result<Value, OperatorError> {
        (self.run)(args, ctx)
    }
}

fn builtin(name: &'static str, schema: OperatorSchema, run: Run) -> Box<dyn Operator> {
    Box::new(Builtin { name, schema, run })
}

/// Registration table for [`crate::OperatorRegistry::builtin`].
pub static BUILTINS: &[(&str, OperatorFactory)] = &[
    ("env", env_operator),
    ("date", date_operator),
    ("file", file_operator),
    ("query", query_operator),
    ("cache", cache_operator),
    ("upper", upper_operator),
    ("lower", lower_operator),
    ("trim", trim_operator),
    ("concat", concat_operator),
    ("add", add_operator),
    ("subtract", subtract_operator),
    ("multiply", multiply_operator),
    ("length", length_operator),
    ("if", if_operator),
    ("default", default_operator),
    ("eq", eq_operator),
    ("ne", ne_operator),
    ("gt", gt_operator),
];

fn env_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new()
        .required("name")
        .optional("default")
        .env_sourced();
    builtin("env", schema, |args, ctx| {
        let name = string_arg(args, "name")?;
        match ctx.environment.and_then(|env| env.get(name)) {
            Some(value) => Ok(Value::String(value.to_owned())),
            None => Ok(args.get("default").cloned().unwrap_or_default()),
        }
    })
}

fn date_operator() -> Box<dyn Operator> {
    builtin("date", OperatorSchema::new().optional("format"), |args, _| {
        let now = Utc::now();
        match args.get("format") {
            None => Ok(Value::Int(now.timestamp())),
            Some(Value::String(format)) => render_date(now, format).map(Value::String),
            Some(other) => Err(OperatorError::invalid("format", "a string", other)),
        }
    })
}

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `now` with one of the short names (`Y`, `Y-m-d`, `Y-m-d H:i:s`,
/// `c`) or a strftime pattern. Anything else uses the default format.
pub(crate) fn render_date(now: DateTime<Utc>, format: &str) -> Result<String, OperatorError> {
    let pattern = match format {
        "c" => return Ok(now.to_rfc3339()),
        "Y" => "%Y",
        "Y-m-d" => "%Y-%m-%d",
        "Y-m-d H:i:s" => DEFAULT_DATE_FORMAT,
        custom if custom.contains('%') => custom,
        _ => DEFAULT_DATE_FORMAT,
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    // Formatting a malformed pattern panics inside chrono.
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(OperatorError::InvalidArgument {
            name: "format",
            expected: "a valid date format",
            found: "string",
        });
    }
    Ok(now.format_with_items(items.into_iter()).to_string())
}

fn file_operator() -> Box<dyn Operator> {
    builtin("file", OperatorSchema::new().required("path"), |args, _| {
        let path = string_arg(args, "path")?;
        std::fs::read_to_string(path)
            .map(Value::String)
            .map_err(|source| OperatorError::Io {
                path: path.to_owned(),
                source,
            })
    })
}

fn query_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new().required("sql").optional("params");
    builtin("query", schema, |_, _| {
        Err(OperatorError::Unavailable {
            operator: "query",
            reason: "no database adapter is configured",
        })
    })
}

fn cache_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new().required("ttl").required("value");
    builtin("cache", schema, |args, _| arg(args, "value").cloned())
}

fn upper_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new().required("value").pure();
    builtin("upper", schema, |args, _| {
        Ok(Value::String(string_arg(args, "value")?.to_uppercase()))
    })
}

fn lower_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new().required("value").pure();
    builtin("lower", schema, |args, _| {
        Ok(Value::String(string_arg(args, "value")?.to_lowercase()))
    })
}

fn trim_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new().required("value").pure();
    builtin("trim", schema, |args, _| {
        Ok(Value::String(string_arg(args, "value")?.trim().to_owned()))
    })
}

fn concat_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new()
        .required("values")
        .optional("separator")
        .pure();
    builtin("concat", schema, |args, _| {
        let values = match arg(args, "values")? {
            Value::Array(items) => items,
            other => return Err(OperatorError::invalid("values", "an array", other)),
        };
        let separator = match args.get("separator") {
            None => "",
            Some(Value::String(s)) => s,
            Some(other) => return Err(OperatorError::invalid("separator", "a string", other)),
        };
        let mut out = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push_str(&text(value));
        }
        Ok(Value::String(out))
    })
}

fn add_operator() -> Box<dyn Operator> {
    arithmetic("add", i64::checked_add, |a, b| a + b)
}

fn subtract_operator() -> Box<dyn Operator> {
    arithmetic("subtract", i64::checked_sub, |a, b| a - b)
}

fn multiply_operator() -> Box<dyn Operator> {
    arithmetic("multiply", i64::checked_mul, |a, b| a * b)
}

fn arithmetic(
    name: &'static str,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Box<dyn Operator> {
    Box::new(Arithmetic {
        name,
        int,
        float,
        schema: OperatorSchema::new().required("a").required("b").pure(),
    })
}

/// `add`, `subtract` and `multiply`: integer arithmetic when both operands
/// are integers, floating point otherwise.
struct Arithmetic {
    name: &'static str,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
    schema: OperatorSchema,
}

impl Operator for Arithmetic {
    fn name(&self) -> &str {
        self.name
    }

    fn schema(&self) -> &OperatorSchema {
        &self.schema
    }

    fn execute(&self, args: &Object, _ctx: &ExecContext<'_>) -> Result<Value, OperatorError> {
        match (arg(args, "a")?, arg(args, "b")?) {
            (Value::Int(a), Value::Int(b)) => (self.int)(*a, *b)
                .map(Value::Int)
                .ok_or(OperatorError::Overflow(self.name)),
            (a, b) => Ok(Value::Float((self.float)(number(a, "a")?, number(b, "b")?))),
        }
    }
}

fn length_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new().required("value").pure();
    builtin("length", schema, |args, _| {
        let len = match arg(args, "value")? {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            other => {
                return Err(OperatorError::invalid(
                    "value",
                    "a string, array or object",
                    other,
                ))
            }
        };
        Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
    })
}

fn if_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new()
        .required("condition")
        .required("then")
        .optional("else")
        .pure();
    builtin("if", schema, |args, _| {
        if holds(arg(args, "condition")?) {
            arg(args, "then").cloned()
        } else {
            Ok(args.get("else").cloned().unwrap_or_default())
        }
    })
}

/// Truthiness of a condition. Beyond [`Value::is_truthy`], the strings
/// `"false"`, `"null"` and `"0"` count as false.
fn holds(value: &Value) -> bool {
    match value {
        Value::String(s) => !matches!(s.as_str(), "" | "false" | "null" | "0"),
        other => other.is_truthy(),
    }
}

fn default_operator() -> Box<dyn Operator> {
    let schema = OperatorSchema::new()
        .required("value")
        .required("fallback")
        .pure();
    builtin("default", schema, |args, _| match arg(args, "value")? {
        Value::Null => arg(args, "fallback").cloned(),
        value => Ok(value.clone()),
    })
}

fn eq_operator() -> Box<dyn Operator> {
    comparison("eq", |a, b| text(a) == text(b))
}

fn ne_operator() -> Box<dyn Operator> {
    comparison("ne", |a, b| text(a) != text(b))
}

/// Numeric when both sides are numbers, otherwise by string form.
fn gt_operator() -> Box<dyn Operator> {
    comparison("gt", |a, b| match (a, b) {
        (Value::Int(x), Value::Int(y)) => x > y,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (Ok(x), Ok(y)) = (number(a, "a"), number(b, "b")) else {
                return false;
            };
            x.partial_cmp(&y) == Some(Ordering::Greater)
        }
        _ => text(a) > text(b),
    })
}

fn comparison(name: &'static str, test: fn(&Value, &Value) -> bool) -> Box<dyn Operator> {
    Box::new(Comparison {
        name,
        test,
        schema: OperatorSchema::new().required("a").required("b").pure(),
    })
}

struct Comparison {
    name: &'static str,
    test: fn(&Value, &Value) -> bool,
    schema: OperatorSchema,
}

impl Operator for Comparison {
    fn name(&self) -> &str {
        self.name
    }

    fn schema(&self) -> &OperatorSchema {
        &self.schema
    }

    fn execute(&self, args: &Object, _ctx: &ExecContext<'_>) -> Result<Value, OperatorError> {
        Ok(Value::Bool((self.test)(arg(args, "a")?, arg(args, "b")?)))
    }
}

/// String form used by `concat` and the comparisons: strings unquoted,
/// everything else as displayed.
fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

fn arg<'a>(args: &'a Object, name: &'static str) -> Result<&'a Value, OperatorError> {
    args.get(name).ok_or(OperatorError::MissingArgument(name))
}

fn string_arg<'a>(args: &'a Object, name: &'static str) -> Result<&'a str, OperatorError> {
    match arg(args, name)? {
        Value::String(s) => Ok(s),
        other => Err(OperatorError::invalid(name, "a string", other)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn number(value: &Value, name: &'static str) -> Result<f64, OperatorError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(x) => Ok(*x),
        other => Err(OperatorError::invalid(name, "a number", other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
