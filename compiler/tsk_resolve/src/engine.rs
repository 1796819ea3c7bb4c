//! Evaluation of declarations into final values.
//!
//! Each `(section, key)` is evaluated at most once and memoized, so a key
//! referenced from many places costs one evaluation. A key reached again
//! while it is still being evaluated closes a cycle.

use tracing::trace;
use tsk_ir::{
    merge_values, Arg, AssignOp, Call, ConfigTree, ConfigTreeBuilder, Node, NodeKind, Object,
    OperatorCall, Value,
};
use tsk_sema::{Lookup, OperatorSchema, SymbolTable};
use tsk_stack::ensure_sufficient_stack;

use crate::context::ResolveContext;
use crate::error::{ResolutionError, ResolutionErrorKind};

enum State {
    Pending,
    Active,
    Done(Value),
}

pub(crate) struct Engine<'t, 'ast> {
    table: &'t SymbolTable<'ast>,
    ctx: &'t ResolveContext,
    states: Vec<State>,
    stack: Vec<usize>,
    pub(crate) errors: Vec<ResolutionError>,
    pub(crate) folded: usize,
}

impl<'t, 'ast> Engine<'t, 'ast> {
    pub(crate) fn new(table: &'t SymbolTable<'ast>, ctx: &'t ResolveContext) -> Self {
        Engine {
            table,
            ctx,
            states: table.nodes().iter().map(|_| State::Pending).collect(),
            stack: Vec::new(),
            errors: Vec::new(),
            folded: 0,
        }
    }

    /// Evaluate every key and assemble the tree in declaration order.
    pub(crate) fn run(&mut self) -> ConfigTree {
        let table = self.table;
        let mut builder = ConfigTreeBuilder::new();
        for section in table.sections() {
            builder.ensure_section(section);
        }
        for (id, node) in table.nodes().iter().enumerate() {
            let value = self.evaluate(id);
            builder.set(node.section, node.key, value);
        }
        builder.finish()
    }

    fn evaluate(&mut self, id: usize) -> Value {
        match &self.states[id] {
            State::Done(value) => return value.clone(),
            State::Active => return Value::Null,
            State::Pending => {}
        }
        self.states[id] = State::Active;
        self.stack.push(id);

        let table = self.table;
        let node = table.node(id);
        let mut result: Option<Value> = None;
        for decl in &node.decls {
            let value = self.eval_node(&decl.value, node.section);
            result = Some(match result {
                Some(base) if decl.op == AssignOp::Merge => {
                    let compatible = matches!(
                        (&base, &value),
                        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
                    );
                    if !compatible {
                        self.errors.push(ResolutionError::new(
                            ResolutionErrorKind::IncompatibleMerge {
                                key: node.display_name(),
                                base: base.type_name(),
                                overlay: value.type_name(),
                            },
                            decl.span,
                            decl.pos,
                            node.section,
                        ));
                    }
                    merge_values(base, value)
                }
                _ => value,
            });
        }

        self.stack.pop();
        let value = result.unwrap_or_default();
        self.states[id] = State::Done(value.clone());
        value
    }

    fn eval_node(&mut self, node: &Node, section: &str) -> Value {
        ensure_sufficient_stack(|| match &node.kind {
            NodeKind::Literal(value) => value.clone(),
            NodeKind::Array(items) => {
                Value::Array(items.iter().map(|n| self.eval_node(n, section)).collect())
            }
            NodeKind::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|f| (f.key.clone(), self.eval_node(&f.value, section)))
                    .collect(),
            ),
            NodeKind::Range { min, max } => range_object(*min, *max),
            NodeKind::Reference(reference) => {
                let table = self.table;
                match table.lookup(section, reference) {
                    Lookup::Key { node: target, rest } => {
                        if matches!(self.states[target], State::Active) {
                            self.report_cycle(target, node, section);
                            return Value::Null;
                        }
                        let value = self.evaluate(target);
                        match value.get_path(rest) {
                            Some(found) => found.clone(),
                            None => self.unresolved(reference.to_string(), node, section),
                        }
                    }
                    Lookup::Word(word) => Value::String(word.to_owned()),
                    Lookup::Unknown => self.unresolved(reference.to_string(), node, section),
                }
            }
            NodeKind::OperatorCall(call) => self.eval_call(call, node, section),
        })
    }

    fn eval_call(&mut self, call: &Call, node: &Node, section: &str) -> Value {
        let ctx = self.ctx;
        let registry = &ctx.registry;
        let schema = registry.schema(&call.name);
        let args = self.bind_args(call, schema, section);
        let deferred = || Value::OperatorCall(OperatorCall::new(call.name.clone(), args.clone()));

        let Some(schema) = schema else {
            return deferred();
        };
        let substitute = schema.env_sourced && self.env_has(schema, &args);
        let fold = schema.pure && !args.values().any(Value::is_deferred);
        if !substitute && !fold {
            return deferred();
        }

        match registry.execute(&call.name, &args, &ctx.exec_context()) {
            Some(Ok(value)) => {
                trace!(operator = %call.name, "folded call");
                self.folded += 1;
                value
            }
            Some(Err(err)) => {
                self.errors.push(ResolutionError::new(
                    ResolutionErrorKind::FoldFailed {
                        operator: call.name.clone(),
                        reason: err.to_string(),
                    },
                    node.span,
                    node.pos,
                    section,
                ));
                deferred()
            }
            None => deferred(),
        }
    }

    /// Arguments keyed by parameter name. Without a schema, positional
    /// arguments are keyed by index.
    fn bind_args(&mut self, call: &Call, schema: Option<&OperatorSchema>, section: &str) -> Object {
        let pairs: Vec<(String, &Arg)> = match schema {
            Some(schema) => schema.bind(&call.args).bound,
            None => {
                let mut positional = 0usize;
                call.args
                    .iter()
                    .map(|arg| match &arg.name {
                        Some(name) => (name.clone(), arg),
                        None => {
                            positional += 1;
                            ((positional - 1).to_string(), arg)
                        }
                    })
                    .collect()
            }
        };
        let mut args = Object::new();
        for (name, arg) in pairs {
            let value = self.eval_node(&arg.value, section);
            args.entry(name).or_insert(value);
        }
        args
    }

    /// An environment-sourced call is substituted only if the supplied
    /// environment defines the variable named by its first parameter.
    fn env_has(&self, schema: &OperatorSchema, args: &Object) -> bool {
        let Some(environment) = &self.ctx.environment else {
            return false;
        };
        schema
            .params
            .first()
            .and_then(|param| args.get(param.name))
            .and_then(Value::as_str)
            .is_some_and(|var| environment.contains(var))
    }

    fn report_cycle(&mut self, target: usize, node: &Node, section: &str) {
        let Some(start) = self.stack.iter().rposition(|&n| n == target) else {
            return;
        };
        let table = self.table;
        let mut cycle: Vec<String> = self.stack[start..]
            .iter()
            .map(|&n| table.node(n).display_name())
            .collect();
        cycle.push(table.node(target).display_name());
        self.errors.push(ResolutionError::new(
            ResolutionErrorKind::Cycle { cycle },
            node.span,
            node.pos,
            section,
        ));
    }

    fn unresolved(&mut self, reference: String, node: &Node, section: &str) -> Value {
        self.errors.push(ResolutionError::new(
            ResolutionErrorKind::UnresolvedReference { reference },
            node.span,
            node.pos,
            section,
        ));
        Value::Null
    }
}

/// `8000-9000` resolves to `{min: 8000, max: 9000, type: "range"}`.
fn range_object(min: i64, max: i64) -> Value {
    let mut object = Object::new();
    object.insert("min".to_owned(), Value::Int(min));
    object.insert("max".to_owned(), Value::Int(max));
    object.insert("type".to_owned(), Value::String("range".to_owned()));
    Value::Object(object)
}
