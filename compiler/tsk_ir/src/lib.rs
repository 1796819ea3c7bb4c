//! Core data types shared by every stage of the TSK pipeline.
//!
//! - [`Token`] / [`TokenKind`]: lexer output
//! - [`Config`] and friends: the syntax tree
//! - [`Value`]: configuration values, before and after resolution
//! - [`ConfigTree`]: the resolved, immutable configuration
//! - [`Span`], [`SourcePos`], [`LineIndex`]: source locations

pub mod ast;
mod span;
mod token;
mod tree;
mod value;
pub mod visitor;

pub use ast::{Arg, AssignOp, Call, Config, Entry, Field, Node, NodeKind, Reference, Section};
pub use span::{LineIndex, SourcePos, Span, SpanError};
pub use token::{Token, TokenKind, TokenTag};
pub use tree::{ConfigTree, ConfigTreeBuilder, MergeKind, MergeRecord, TreeSection};
pub use value::{merge_values, Object, OperatorCall, Value};
pub use visitor::Visitor;

/// Name of the implicit section holding declarations that precede the
/// first `[section]` header.
pub const ROOT_SECTION: &str = "";
