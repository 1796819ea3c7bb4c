//! Resolution: from a syntax tree to a [`ConfigTree`].
//!
//! 1. Repeated sections merge key by key in declaration order. `=` replaces
//!    a key's value wholesale; `+=` deep-merges objects and appends arrays.
//! 2. Environment-sourced calls (`@env`) are substituted from the
//!    [`ResolveContext`] environment when it defines the variable.
//! 3. Calls to pure operators whose arguments are constants are folded.
//!    Every other call stays in the tree as a deferred
//!    [`Value::OperatorCall`](tsk_ir::Value::OperatorCall).
//!
//! References are followed with memoization; problems are collected rather
//! than raised, and the returned tree is always complete.

mod context;
mod engine;
mod error;

use tracing::debug;
use tsk_diagnostic::Diagnostic;
use tsk_ir::{Config, ConfigTree};
use tsk_sema::SymbolTable;

use crate::engine::Engine;

pub use context::ResolveContext;
pub use error::{ResolutionError, ResolutionErrorKind};

/// A resolved tree and everything that went wrong producing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub tree: ConfigTree,
    pub errors: Vec<ResolutionError>,
}

impl Resolution {
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_warning())
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors
            .iter()
            .map(ResolutionError::to_diagnostic)
            .collect()
    }

    pub fn into_parts(self) -> (ConfigTree, Vec<ResolutionError>) {
        (self.tree, self.errors)
    }
}

pub fn resolve(config: &Config, ctx: &ResolveContext) -> Resolution {
    let table = SymbolTable::build(config);
    let mut engine = Engine::new(&table, ctx);
    let tree = engine.run();
    let mut errors = engine.errors;
    errors.sort_by_key(|e| e.pos.offset);
    if ctx.limits.limit > 0 {
        errors.truncate(ctx.limits.limit);
    }
    debug!(
        sections = tree.len(),
        keys = tree.key_count(),
        folded = engine.folded,
        errors = errors.len(),
        "resolved config"
    );
    Resolution { tree, errors }
}
