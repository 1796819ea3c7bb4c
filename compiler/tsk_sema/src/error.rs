//! Semantic errors and warnings.

use tsk_diagnostic::{Diagnostic, ErrorCode};
use tsk_ir::{SourcePos, Span};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub span: Span,
    pub pos: SourcePos,
    /// Section containing the offending declaration (`""` for root).
    pub section: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SemanticErrorKind {
    UnknownOperator {
        name: String,
        suggestion: Option<String>,
    },
    MissingArgument {
        operator: String,
        param: &'static str,
    },
    UnknownArgument {
        operator: String,
        arg: String,
    },
    TooManyArguments {
        operator: String,
        accepted: usize,
    },
    DuplicateArgument {
        operator: String,
        arg: String,
    },
    /// Every node on the cycle in order, ending with the first again.
    CyclicReference {
        cycle: Vec<String>,
    },
    MixedArrayTypes {
        types: Vec<&'static str>,
    },
    InvalidRange {
        min: i64,
        max: i64,
    },
    DuplicateKey {
        key: String,
        first: SourcePos,
    },
    UnknownReference {
        reference: String,
    },
}

impl SemanticError {
    #[cold]
    pub fn new(kind: SemanticErrorKind, span: Span, pos: SourcePos, section: &str) -> Self {
        SemanticError {
            kind,
            span,
            pos,
            section: section.to_owned(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind {
            SemanticErrorKind::UnknownOperator { .. } => ErrorCode::E2001,
            SemanticErrorKind::MissingArgument { .. } => ErrorCode::E2002,
            SemanticErrorKind::UnknownArgument { .. } => ErrorCode::E2003,
            SemanticErrorKind::TooManyArguments { .. } => ErrorCode::E2004,
            SemanticErrorKind::CyclicReference { .. } => ErrorCode::E2005,
            SemanticErrorKind::MixedArrayTypes { .. } => ErrorCode::E2006,
            SemanticErrorKind::InvalidRange { .. } => ErrorCode::E2007,
            SemanticErrorKind::DuplicateKey { .. } => ErrorCode::E2008,
            SemanticErrorKind::DuplicateArgument { .. } => ErrorCode::E2009,
            SemanticErrorKind::UnknownReference { .. } => ErrorCode::E2010,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.code().is_warning()
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self.kind, SemanticErrorKind::CyclicReference { .. })
    }

    pub fn message(&self) -> String {
        match &self.kind {
            SemanticErrorKind::UnknownOperator { name, .. } => {
                format!("unknown operator `@{name}`")
            }
            SemanticErrorKind::MissingArgument { operator, param } => {
                format!("`@{operator}` requires argument `{param}`")
            }
            SemanticErrorKind::UnknownArgument { operator, arg } => {
                format!("`@{operator}` has no parameter `{arg}`")
            }
            SemanticErrorKind::TooManyArguments { operator, accepted } => {
                format!("`@{operator}` takes at most {accepted} positional arguments")
            }
            SemanticErrorKind::DuplicateArgument { operator, arg } => {
                format!("argument `{arg}` given twice to `@{operator}`")
            }
            SemanticErrorKind::CyclicReference { cycle } => {
                format!("cyclic reference: {}", cycle.join(" -> "))
            }
            SemanticErrorKind::MixedArrayTypes { types } => {
                format!("array mixes element types: {}", types.join(", "))
            }
            SemanticErrorKind::InvalidRange { min, max } => {
                format!("range start {min} is greater than its end {max}")
            }
            SemanticErrorKind::DuplicateKey { key, .. } => {
                format!("`{key}` is assigned more than once in this section")
            }
            SemanticErrorKind::UnknownReference { reference } => {
                format!("`{reference}` does not name a declared key")
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::new(self.code())
            .with_message(self.message())
            .at(self.span, self.pos);
        match &self.kind {
            SemanticErrorKind::UnknownOperator {
                suggestion: Some(suggestion),
                ..
            } => diag = diag.with_suggestion(format!("did you mean `@{suggestion}`?")),
            SemanticErrorKind::DuplicateKey { first, .. } => {
                diag = diag.with_note(format!("first assigned at {first}"));
            }
            _ => {}
        }
        if !self.section.is_empty() {
            diag = diag.with_note(format!("in section `{}`", self.section));
        }
        diag
    }
}
