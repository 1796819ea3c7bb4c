//! Read-only traversal of the syntax tree.
//!
//! Override `visit_*` to act on a node kind; call the matching `walk_*`
//! function to keep descending into children.

use tsk_stack::ensure_sufficient_stack;

use crate::ast::{Arg, Call, Config, Entry, Field, Node, NodeKind, Reference, Section};
use crate::Value;

pub trait Visitor<'ast> {
    fn visit_config(&mut self, config: &'ast Config) {
        walk_config(self, config);
    }

    fn visit_section(&mut self, section: &'ast Section) {
        walk_section(self, section);
    }

    fn visit_entry(&mut self, entry: &'ast Entry) {
        walk_entry(self, entry);
    }

    fn visit_node(&mut self, node: &'ast Node) {
        walk_node(self, node);
    }

    fn visit_literal(&mut self, _node: &'ast Node, _value: &'ast Value) {}

    fn visit_array(&mut self, node: &'ast Node, items: &'ast [Node]) {
        walk_array(self, node, items);
    }

    fn visit_field(&mut self, field: &'ast Field) {
        self.visit_node(&field.value);
    }

    fn visit_range(&mut self, _node: &'ast Node, _min: i64, _max: i64) {}

    fn visit_reference(&mut self, _node: &'ast Node, _reference: &'ast Reference) {}

    fn visit_call(&mut self, node: &'ast Node, call: &'ast Call) {
        walk_call(self, node, call);
    }

    fn visit_arg(&mut self, arg: &'ast Arg) {
        self.visit_node(&arg.value);
    }
}

pub fn walk_config<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, config: &'ast Config) {
    for section in &config.sections {
        visitor.visit_section(section);
    }
}

pub fn walk_section<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, section: &'ast Section) {
    for entry in &section.entries {
        visitor.visit_entry(entry);
    }
}

pub fn walk_entry<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, entry: &'ast Entry) {
    visitor.visit_node(&entry.value);
}

pub fn walk_node<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, node: &'ast Node) {
    ensure_sufficient_stack(|| match &node.kind {
        NodeKind::Literal(value) => visitor.visit_literal(node, value),
        NodeKind::Array(items) => visitor.visit_array(node, items),
        NodeKind::Object(fields) => {
            for field in fields {
                visitor.visit_field(field);
            }
        }
        NodeKind::Range { min, max } => visitor.visit_range(node, *min, *max),
        NodeKind::Reference(reference) => visitor.visit_reference(node, reference),
        NodeKind::OperatorCall(call) => visitor.visit_call(node, call),
    });
}

pub fn walk_array<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    _node: &'ast Node,
    items: &'ast [Node],
) {
    for item in items {
        visitor.visit_node(item);
    }
}

pub fn walk_call<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    _node: &'ast Node,
    call: &'ast Call,
) {
    for arg in &call.args {
        visitor.visit_arg(arg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssignOp, SourcePos, Span};

    #[derive(Default)]
    struct Census {
        literals: usize,
        references: Vec<String>,
        calls: Vec<String>,
    }

    impl<'ast> Visitor<'ast> for Census {
        fn visit_literal(&mut self, _node: &'ast Node, _value: &'ast Value) {
            self.literals += 1;
        }

        fn visit_reference(&mut self, _node: &'ast Node, reference: &'ast Reference) {
            self.references.push(reference.to_string());
        }

        fn visit_call(&mut self, node: &'ast Node, call: &'ast Call) {
            self.calls.push(call.name.clone());
            walk_call(self, node, call);
        }
    }

    fn node(kind: NodeKind) -> Node {
        Node::new(kind, Span::DUMMY, SourcePos::START)
    }

    #[test]
    fn visits_nested_calls_and_references() {
        let inner = node(NodeKind::OperatorCall(Call {
            name: "lower".into(),
            args: vec![Arg {
                name: None,
                value: node(NodeKind::Reference(Reference::Variable("name".into()))),
                span: Span::DUMMY,
                pos: SourcePos::START,
            }],
        }));
        let value = node(NodeKind::Array(vec![
            node(NodeKind::Literal(Value::Int(1))),
            inner,
            node(NodeKind::Reference(Reference::Path(vec![
                "db".into(),
                "host".into(),
            ]))),
        ]));
        let config = Config {
            sections: vec![Section {
                name: "app".into(),
                implicit: false,
                recovered: false,
                entries: vec![Entry {
                    key: "k".into(),
                    op: AssignOp::Set,
                    value,
                    span: Span::DUMMY,
                    pos: SourcePos::START,
                }],
                span: Span::DUMMY,
                pos: SourcePos::START,
            }],
        };

        let mut census = Census::default();
        census.visit_config(&config);
        assert_eq!(census.literals, 1);
        assert_eq!(census.calls, vec!["lower"]);
        assert_eq!(census.references, vec!["$name", "db.host"]);
    }
}
