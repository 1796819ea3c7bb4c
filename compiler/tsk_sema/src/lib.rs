//! Semantic analysis of parsed TSK configurations.
//!
//! [`analyze`] walks the syntax tree once and reports:
//! - operator calls that name no registered operator or do not fit its
//!   schema,
//! - reference cycles, each named in full (`a.x -> b.y -> a.x`),
//! - arrays mixing literal element types, inverted ranges, keys assigned
//!   twice in one section and references to undeclared keys.
//!
//! Nothing short-circuits: every problem in the file is collected, and the
//! caller decides what to do with warnings.
//!
//! The [`OperatorRegistry`] is also defined here since analysis is its
//! first consumer; resolution uses it to fold pure calls.

mod analyzer;
mod builtins;
mod context;
mod cycles;
mod error;
mod registry;
mod suggest;
mod symbols;

use tracing::debug;
use tsk_diagnostic::{Diagnostic, DiagnosticConfig};
use tsk_ir::{Config, Visitor};

use crate::analyzer::Analyzer;

pub use builtins::BUILTINS;
pub use context::{Environment, ExecContext};
pub use error::{SemanticError, SemanticErrorKind};
pub use registry::{
    BindProblem, Binding, Operator, OperatorError, OperatorFactory, OperatorRegistry,
    OperatorSchema, ParamSpec,
};
pub use symbols::{KeyNode, Lookup, SymbolTable};

/// Everything analysis found, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Analysis {
    pub errors: Vec<SemanticError>,
}

impl Analysis {
    /// True if anything other than a warning was reported.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_warning())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SemanticError> {
        self.errors.iter().filter(|e| e.is_warning())
    }

    pub fn cycles(&self) -> impl Iterator<Item = &SemanticError> {
        self.errors.iter().filter(|e| e.is_cycle())
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(SemanticError::to_diagnostic).collect()
    }
}

pub fn analyze(config: &Config, registry: &OperatorRegistry) -> Analysis {
    analyze_with(config, registry, &DiagnosticConfig::default())
}

pub fn analyze_with(
    config: &Config,
    registry: &OperatorRegistry,
    limits: &DiagnosticConfig,
) -> Analysis {
    let table = SymbolTable::build(config);
    let mut analyzer = Analyzer::new(registry, &table);
    analyzer.visit_config(config);
    let mut errors = analyzer.errors;
    errors.extend(cycles::find_cycles(&table));
    errors.sort_by_key(|e| e.pos.offset);
    if limits.deduplicate {
        errors.dedup();
    }
    if limits.limit > 0 {
        errors.truncate(limits.limit);
    }
    debug!(
        keys = table.nodes().len(),
        errors = errors.iter().filter(|e| !e.is_warning()).count(),
        warnings = errors.iter().filter(|e| e.is_warning()).count(),
        "analyzed config"
    );
    Analysis { errors }
}
