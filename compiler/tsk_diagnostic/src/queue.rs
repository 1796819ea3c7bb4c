//! Capped collection of diagnostics.
//!
//! Lexing, parsing, analysis and resolution never stop at the first
//! problem; they push into a [`DiagnosticQueue`] until the configured cap
//! is reached. Everything past the cap is counted but not stored.

use rustc_hash::FxHashSet;

use crate::Diagnostic;

/// Configuration for diagnostic collection.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of diagnostics kept per stage (0 = unlimited).
    pub limit: usize,
    /// Drop diagnostics with the same code, position and message as one
    /// already queued.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            limit: 100,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            limit: 0,
            deduplicate: false,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    seen: FxHashSet<(crate::ErrorCode, u32, String)>,
    error_count: usize,
    dropped: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            config,
            ..DiagnosticQueue::default()
        }
    }

    /// Queue `diag`. Returns `false` if it was dropped by the cap or as a
    /// duplicate.
    pub fn push(&mut self, diag: Diagnostic) -> bool {
        if self.is_full() {
            self.dropped += 1;
            return false;
        }
        if self.config.deduplicate
            && !self
                .seen
                .insert((diag.code, diag.pos.offset, diag.message.clone()))
        {
            return false;
        }
        if diag.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
        true
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.push(diag);
        }
    }

    pub fn is_full(&self) -> bool {
        self.config.limit > 0 && self.diagnostics.len() >= self.config.limit
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Diagnostics discarded because the cap was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics in insertion order.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Diagnostics ordered by source position, then stage order.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diags = self.diagnostics;
        diags.sort_by_key(|d| (d.pos.offset, d.code));
        diags
    }
}
