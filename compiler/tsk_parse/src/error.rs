//! Parse errors.

use tsk_diagnostic::{Diagnostic, ErrorCode};
use tsk_ir::{SourcePos, Span, Token};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub pos: SourcePos,
    /// Enclosing section; `None` for the root section.
    pub section: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ParseErrorKind {
    UnexpectedToken {
        expected: &'static str,
        found: &'static str,
    },
    ExpectedValue {
        found: &'static str,
    },
    ExpectedKey {
        found: &'static str,
    },
    UnclosedDelimiter {
        open: char,
        opened_at: SourcePos,
    },
    InvalidSectionHeader {
        found: &'static str,
    },
    TooDeep {
        limit: usize,
    },
    /// `a-b` range whose upper bound does not fit in `i64`.
    RangeBoundOutOfRange,
    /// The lexer already reported this token; recover without a new error.
    Lexical,
}

impl ParseError {
    #[cold]
    pub fn new(kind: ParseErrorKind, token: &Token<'_>) -> Self {
        ParseError {
            kind,
            span: token.span,
            pos: token.pos,
            section: None,
        }
    }

    #[cold]
    pub fn unexpected(expected: &'static str, found: &Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken {
                expected,
                found: found.kind.describe(),
            },
            found,
        )
    }

    /// Errors the lexer already reported are not repeated.
    pub fn is_reported_elsewhere(&self) -> bool {
        self.kind == ParseErrorKind::Lexical
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind {
            ParseErrorKind::UnexpectedToken { .. } | ParseErrorKind::Lexical => ErrorCode::E1001,
            ParseErrorKind::ExpectedValue { .. } => ErrorCode::E1002,
            ParseErrorKind::UnclosedDelimiter { .. } => ErrorCode::E1003,
            ParseErrorKind::InvalidSectionHeader { .. } => ErrorCode::E1004,
            ParseErrorKind::ExpectedKey { .. } => ErrorCode::E1005,
            ParseErrorKind::TooDeep { .. } => ErrorCode::E1006,
            ParseErrorKind::RangeBoundOutOfRange => ErrorCode::E1007,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => {
                format!("expected {expected}, found {found}")
            }
            ParseErrorKind::ExpectedValue { found } => format!("expected a value, found {found}"),
            ParseErrorKind::ExpectedKey { found } => format!("expected a key, found {found}"),
            ParseErrorKind::UnclosedDelimiter { open, .. } => format!("unclosed `{open}`"),
            ParseErrorKind::InvalidSectionHeader { found } => {
                format!("malformed section header: unexpected {found}")
            }
            ParseErrorKind::TooDeep { limit } => {
                format!("value nested more than {limit} levels deep")
            }
            ParseErrorKind::RangeBoundOutOfRange => "range bound out of range".to_owned(),
            ParseErrorKind::Lexical => "invalid token".to_owned(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code())
            .with_message(self.message())
            .at(self.span, self.pos);
        if let ParseErrorKind::UnclosedDelimiter { opened_at, .. } = &self.kind {
            diag = diag.with_note(format!("opened at {opened_at}"));
        }
        if let Some(section) = &self.section {
            diag = diag.with_note(format!("in section `{section}`"));
        }
        diag.with_note("skipped to the next section header")
    }
}
