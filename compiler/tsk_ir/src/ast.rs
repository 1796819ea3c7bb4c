//! Syntax tree produced by the parser.
//!
//! The tree is owned and immutable once built. Every node records the byte
//! span and the line/column of its first token so later stages can report
//! positions without the source text.

use std::fmt;

use crate::{SourcePos, Span, Value};

/// A parsed `.tsk` file: sections in declaration order.
///
/// Declarations before the first header land in an implicit root section
/// named `""`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Config {
    pub sections: Vec<Section>,
}

impl Config {
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    /// All declarations of `name`, in order. A section name may repeat.
    pub fn sections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Section> {
        self.sections.iter().filter(move |s| s.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub name: String,
    /// True for the root section, which has no header.
    pub implicit: bool,
    /// True when a syntax error cut the section short. `entries` holds the
    /// declarations parsed before the error.
    pub recovered: bool,
    pub entries: Vec<Entry>,
    pub span: Span,
    pub pos: SourcePos,
}

impl Section {
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}

/// How a declaration combines with an earlier declaration of the same key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AssignOp {
    /// `=` or `:`, replaces wholesale.
    Set,
    /// `+=`, merges objects and appends arrays.
    Merge,
}

/// `key = value` inside a section.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub op: AssignOp,
    pub value: Node,
    pub span: Span,
    pub pos: SourcePos,
}

impl Entry {
    /// `$name = ...` declares a global variable.
    pub fn variable_name(&self) -> Option<&str> {
        self.key.strip_prefix('$')
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub pos: SourcePos,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span, pos: SourcePos) -> Self {
        Node { kind, span, pos }
    }

    pub fn literal(value: Value, span: Span, pos: SourcePos) -> Self {
        Node::new(NodeKind::Literal(value), span, pos)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// A scalar: null, bool, int, float or string.
    Literal(Value),
    Array(Vec<Node>),
    Object(Vec<Field>),
    /// `8000-9000`
    Range { min: i64, max: i64 },
    Reference(Reference),
    OperatorCall(Call),
}

impl NodeKind {
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Literal(v) => v.type_name(),
            NodeKind::Array(_) => "array",
            NodeKind::Object(_) => "object",
            NodeKind::Range { .. } => "range",
            NodeKind::Reference(_) => "reference",
            NodeKind::OperatorCall(_) => "operator call",
        }
    }
}

/// `key: value` inside an object literal or block.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Node,
    pub span: Span,
    pub pos: SourcePos,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    /// `name` (same section) or `section.key.nested`
    Path(Vec<String>),
    /// `$name`
    Variable(String),
}

impl Reference {
    /// A single bare identifier. It refers to a key of the enclosing section
    /// when one exists and is otherwise an unquoted string.
    pub fn bare_word(&self) -> Option<&str> {
        match self {
            Reference::Path(segments) if segments.len() == 1 => Some(&segments[0]),
            _ => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Path(segments) => f.write_str(&segments.join(".")),
            Reference::Variable(name) => write!(f, "${name}"),
        }
    }
}

/// `@name(args)`
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Arg>,
}

/// One operator argument: positional (`"X"`) or named (`name: "X"`).
#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Node,
    pub span: Span,
    pub pos: SourcePos,
}
