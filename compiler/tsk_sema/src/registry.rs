//! The operator registry.
//!
//! Operators are registered explicitly: [`OperatorRegistry::builtin`] walks
//! a static table of constructors, and embedders add their own with
//! [`OperatorRegistry::register`]. The registry is an ordinary value passed
//! to analysis and resolution, so independently configured registries can
//! coexist in one process.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tsk_ir::{Arg, Object, Value};

use crate::builtins::BUILTINS;
use crate::context::ExecContext;

/// One declared parameter of an operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

/// Parameters and evaluation properties of an operator.
///
/// Positional arguments bind to `params` in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorSchema {
    pub params: Vec<ParamSpec>,
    /// No side effects; the result depends only on the arguments. Pure calls
    /// with constant arguments are folded during resolution.
    pub pure: bool,
    /// Reads the environment. The first parameter names the variable.
    pub env_sourced: bool,
}

impl Default for OperatorSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorSchema {
    /// An impure schema without parameters.
    pub fn new() -> Self {
        OperatorSchema {
            params: Vec::new(),
            pure: false,
            env_sourced: false,
        }
    }

    #[must_use]
    pub fn required(mut self, name: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            required: true,
        });
        self
    }

    #[must_use]
    pub fn optional(mut self, name: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            required: false,
        });
        self
    }

    #[must_use]
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    #[must_use]
    pub fn env_sourced(mut self) -> Self {
        self.env_sourced = true;
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }

    pub fn optional_params(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| !p.required).map(|p| p.name)
    }

    /// Match call-site arguments against the declared parameters.
    pub fn bind<'a>(&self, args: &'a [Arg]) -> Binding<'a> {
        let mut binding = Binding::default();
        let mut positional = 0;
        for arg in args {
            let name = match &arg.name {
                Some(name) => {
                    if self.param(name).is_none() {
                        binding.problems.push(BindProblem::Unknown { arg });
                    }
                    name.clone()
                }
                None => {
                    let index = positional;
                    positional += 1;
                    match self.params.get(index) {
                        Some(param) => param.name.to_owned(),
                        None => {
                            binding
                                .problems
                                .push(BindProblem::TooManyPositional { arg, index });
                            index.to_string()
                        }
                    }
                }
            };
            if binding.bound.iter().any(|(bound, _)| *bound == name) {
                binding.problems.push(BindProblem::Duplicate { arg });
                continue;
            }
            binding.bound.push((name, arg));
        }
        for param in self.params.iter().filter(|p| p.required) {
            if !binding.bound.iter().any(|(name, _)| name == param.name) {
                binding.problems.push(BindProblem::Missing { name: param.name });
            }
        }
        binding
    }
}

/// Arguments of one call matched to parameter names.
#[derive(Debug, Default)]
pub struct Binding<'a> {
    /// Parameter name (or positional index) and argument, in call order.
    pub bound: Vec<(String, &'a Arg)>,
    pub problems: Vec<BindProblem<'a>>,
}

impl<'a> Binding<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Arg> {
        self.bound
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, arg)| *arg)
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BindProblem<'a> {
    Unknown { arg: &'a Arg },
    TooManyPositional { arg: &'a Arg, index: usize },
    Duplicate { arg: &'a Arg },
    Missing { name: &'static str },
}

/// Failure inside an operator's `execute`.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),
    #[error("argument `{name}` must be {expected}, found {found}")]
    InvalidArgument {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("integer overflow in `{0}`")]
    Overflow(&'static str),
    #[error("`@{operator}` is not available here: {reason}")]
    Unavailable {
        operator: &'static str,
        reason: &'static str,
    },
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OperatorError {
    #[cold]
    pub fn invalid(name: &'static str, expected: &'static str, found: &Value) -> Self {
        OperatorError::InvalidArgument {
            name,
            expected,
            found: found.type_name(),
        }
    }
}

/// A named operation usable as `@name(...)` in configuration sources.
pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &OperatorSchema;

    /// Evaluate with arguments already bound to parameter names.
    fn execute(&self, args: &Object, ctx: &ExecContext<'_>) -> Result<Value, OperatorError>;
}

/// Constructor entry of the static registration table.
pub type OperatorFactory = fn() -> Box<dyn Operator>;

#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: BTreeMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// A registry without any operators.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in operator set.
    pub fn builtin() -> Self {
        Self::from_table(BUILTINS)
    }

    pub fn from_table(table: &[(&str, OperatorFactory)]) -> Self {
        let mut registry = Self::empty();
        for (_, factory) in table {
            registry.insert(Arc::from(factory()));
        }
        registry
    }

    /// Add `operator`, returning the one it replaces.
    pub fn register(&mut self, operator: impl Operator + 'static) -> Option<Arc<dyn Operator>> {
        self.insert(Arc::new(operator))
    }

    fn insert(&mut self, operator: Arc<dyn Operator>) -> Option<Arc<dyn Operator>> {
        self.operators.insert(operator.name().to_owned(), operator)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(AsRef::as_ref)
    }

    pub fn schema(&self, name: &str) -> Option<&OperatorSchema> {
        self.get(name).map(Operator::schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Execute a bound call.
    pub fn execute(
        &self,
        name: &str,
        args: &Object,
        ctx: &ExecContext<'_>,
    ) -> Option<Result<Value, OperatorError>> {
        self.get(name).map(|op| op.execute(args, ctx))
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
