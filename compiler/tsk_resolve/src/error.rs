//! Resolution errors.

use tsk_diagnostic::{Diagnostic, ErrorCode};
use tsk_ir::{SourcePos, Span};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionError {
    pub kind: ResolutionErrorKind,
    pub span: Span,
    pub pos: SourcePos,
    pub section: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionErrorKind {
    UnresolvedReference {
        reference: String,
    },
    Cycle {
        cycle: Vec<String>,
    },
    /// A pure call could not be folded and stays deferred.
    FoldFailed {
        operator: String,
        reason: String,
    },
    IncompatibleMerge {
        key: String,
        base: &'static str,
        overlay: &'static str,
    },
}

impl ResolutionError {
    #[cold]
    pub fn new(kind: ResolutionErrorKind, span: Span, pos: SourcePos, section: &str) -> Self {
        ResolutionError {
            kind,
            span,
            pos,
            section: section.to_owned(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind {
            ResolutionErrorKind::UnresolvedReference { .. } => ErrorCode::E3001,
            ResolutionErrorKind::Cycle { .. } => ErrorCode::E3002,
            ResolutionErrorKind::FoldFailed { .. } => ErrorCode::E3003,
            ResolutionErrorKind::IncompatibleMerge { .. } => ErrorCode::E3004,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.code().is_warning()
    }

    pub fn message(&self) -> String {
        match &self.kind {
            ResolutionErrorKind::UnresolvedReference { reference } => {
                format!("cannot resolve `{reference}`")
            }
            ResolutionErrorKind::Cycle { cycle } => {
                format!("cyclic reference: {}", cycle.join(" -> "))
            }
            ResolutionErrorKind::FoldFailed { operator, reason } => {
                format!("`@{operator}` left unevaluated: {reason}")
            }
            ResolutionErrorKind::IncompatibleMerge { key, base, overlay } => {
                format!("`+=` on `{key}` cannot merge {overlay} into {base}; value replaced")
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::new(self.code())
            .with_message(self.message())
            .at(self.span, self.pos);
        if self.section.is_empty() {
            diag
        } else {
            diag.with_note(format!("in section `{}`", self.section))
        }
    }
}
