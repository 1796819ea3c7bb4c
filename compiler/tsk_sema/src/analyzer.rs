//! The analysis visitor: operator schemas, array coherence, ranges,
//! duplicate keys and dangling references.

use rustc_hash::FxHashMap;
use tsk_ir::visitor::{walk_array, walk_call, walk_section, Visitor};
use tracing::debug;
use tsk_ir::{AssignOp, Call, Node, NodeKind, Reference, Section, SourcePos, Span, Value};

use crate::error::{SemanticError, SemanticErrorKind};
use crate::registry::{BindProblem, OperatorRegistry};
use crate::suggest::suggest_similar;
use crate::symbols::{Lookup, SymbolTable};

pub(crate) struct Analyzer<'ast, 'r> {
    registry: &'r OperatorRegistry,
    table: &'r SymbolTable<'ast>,
    section: &'ast str,
    pub(crate) errors: Vec<SemanticError>,
}

impl<'ast, 'r> Analyzer<'ast, 'r> {
    pub(crate) fn new(registry: &'r OperatorRegistry, table: &'r SymbolTable<'ast>) -> Self {
        Analyzer {
            registry,
            table,
            section: "",
            errors: Vec::new(),
        }
    }

    fn report(&mut self, kind: SemanticErrorKind, node: &Node) {
        self.report_at(kind, node.span, node.pos);
    }

    fn report_at(&mut self, kind: SemanticErrorKind, span: Span, pos: SourcePos) {
        let error = SemanticError::new(kind, span, pos, self.section);
        debug!(code = %error.code(), pos = %error.pos, "{}", error.message());
        self.errors.push(error);
    }

    fn check_call(&mut self, node: &Node, call: &Call) {
        let registry = self.registry;
        let Some(schema) = registry.schema(&call.name) else {
            let suggestion = suggest_similar(&call.name, registry.names()).map(str::to_owned);
            self.report(
                SemanticErrorKind::UnknownOperator {
                    name: call.name.clone(),
                    suggestion,
                },
                node,
            );
            return;
        };
        let binding = schema.bind(&call.args);
        let accepted = schema.params.len();
        for problem in binding.problems {
            let operator = call.name.clone();
            match problem {
                BindProblem::Unknown { arg } => self.report_at(
                    SemanticErrorKind::UnknownArgument {
                        operator,
                        arg: arg.name.clone().unwrap_or_default(),
                    },
                    arg.span,
                    arg.pos,
                ),
                BindProblem::TooManyPositional { arg, .. } => self.report_at(
                    SemanticErrorKind::TooManyArguments { operator, accepted },
                    arg.span,
                    arg.pos,
                ),
                BindProblem::Duplicate { arg } => self.report_at(
                    SemanticErrorKind::DuplicateArgument {
                        operator,
                        arg: arg.name.clone().unwrap_or_default(),
                    },
                    arg.span,
                    arg.pos,
                ),
                BindProblem::Missing { name } => self.report(
                    SemanticErrorKind::MissingArgument {
                        operator,
                        param: name,
                    },
                    node,
                ),
            }
        }
    }

    /// Arrays written with literal elements should agree on one element
    /// type. Computed elements are not judged.
    fn check_array(&mut self, node: &Node, items: &[Node]) {
        let mut types: Vec<&'static str> = Vec::new();
        for item in items {
            let ty = match &item.kind {
                NodeKind::Literal(Value::Null) => continue,
                NodeKind::Literal(Value::Int(_) | Value::Float(_)) => "number",
                NodeKind::Literal(value) => value.type_name(),
                NodeKind::Array(_) => "array",
                NodeKind::Object(_) | NodeKind::Range { .. } => "object",
                NodeKind::Reference(_) | NodeKind::OperatorCall(_) => continue,
            };
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
        if types.len() > 1 {
            self.report(SemanticErrorKind::MixedArrayTypes { types }, node);
        }
    }
}

impl<'ast> Visitor<'ast> for Analyzer<'ast, '_> {
    fn visit_section(&mut self, section: &'ast Section) {
        self.section = &section.name;
        let mut first_seen: FxHashMap<&str, SourcePos> = FxHashMap::default();
        for entry in &section.entries {
            match first_seen.get(entry.key.as_str()) {
                Some(&first) if entry.op == AssignOp::Set => self.report_at(
                    SemanticErrorKind::DuplicateKey {
                        key: entry.key.clone(),
                        first,
                    },
                    entry.span,
                    entry.pos,
                ),
                Some(_) => {}
                None => {
                    first_seen.insert(&entry.key, entry.pos);
                }
            }
        }
        walk_section(self, section);
    }

    fn visit_array(&mut self, node: &'ast Node, items: &'ast [Node]) {
        self.check_array(node, items);
        walk_array(self, node, items);
    }

    fn visit_range(&mut self, node: &'ast Node, min: i64, max: i64) {
        if min > max {
            self.report(SemanticErrorKind::InvalidRange { min, max }, node);
        }
    }

    fn visit_reference(&mut self, node: &'ast Node, reference: &'ast Reference) {
        if self.table.lookup(self.section, reference) == Lookup::Unknown {
            self.report(
                SemanticErrorKind::UnknownReference {
                    reference: reference.to_string(),
                },
                node,
            );
        }
    }

    fn visit_call(&mut self, node: &'ast Node, call: &'ast Call) {
        self.check_call(node, call);
        if call.name != "concat" {
            walk_call(self, node, call);
            return;
        }
        // `concat` joins string forms, so mixed element types are expected.
        for arg in &call.args {
            match &arg.value.kind {
                NodeKind::Array(items) => walk_array(self, &arg.value, items),
                _ => self.visit_arg(arg),
            }
        }
    }
}
