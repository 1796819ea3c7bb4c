//! Lexer errors.

use tsk_diagnostic::{Diagnostic, ErrorCode};
use tsk_ir::{SourcePos, Span};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LexError {
    pub span: Span,
    pub pos: SourcePos,
    pub kind: LexErrorKind,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum LexErrorKind {
    /// A character that starts no token.
    UnexpectedChar(char),
    /// String literal with no closing quote on its line.
    UnterminatedString,
    /// `\q` and friends.
    InvalidEscape(char),
    /// Malformed `\u{...}`.
    InvalidUnicodeEscape,
    /// Integer literal that does not fit in `i64`.
    IntOutOfRange,
    /// Float literal that is not a finite `f64`.
    FloatOutOfRange,
    /// Bytes that are not valid UTF-8.
    InvalidUtf8 { len: usize },
}

impl LexError {
    #[cold]
    pub fn unexpected_char(span: Span, pos: SourcePos, ch: char) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::UnexpectedChar(ch),
        }
    }

    #[cold]
    pub fn unterminated_string(span: Span, pos: SourcePos) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::UnterminatedString,
        }
    }

    #[cold]
    pub fn invalid_escape(span: Span, pos: SourcePos, ch: char) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::InvalidEscape(ch),
        }
    }

    #[cold]
    pub fn invalid_unicode_escape(span: Span, pos: SourcePos) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::InvalidUnicodeEscape,
        }
    }

    #[cold]
    pub fn int_out_of_range(span: Span, pos: SourcePos) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::IntOutOfRange,
        }
    }

    #[cold]
    pub fn float_out_of_range(span: Span, pos: SourcePos) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::FloatOutOfRange,
        }
    }

    #[cold]
    pub fn invalid_utf8(span: Span, pos: SourcePos, len: usize) -> Self {
        LexError {
            span,
            pos,
            kind: LexErrorKind::InvalidUtf8 { len },
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind {
            LexErrorKind::UnterminatedString => ErrorCode::E0001,
            LexErrorKind::UnexpectedChar(_) => ErrorCode::E0002,
            LexErrorKind::IntOutOfRange | LexErrorKind::FloatOutOfRange => ErrorCode::E0003,
            LexErrorKind::InvalidEscape(_) | LexErrorKind::InvalidUnicodeEscape => {
                ErrorCode::E0004
            }
            LexErrorKind::InvalidUtf8 { .. } => ErrorCode::E0005,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            LexErrorKind::UnexpectedChar(ch) => format!("unexpected character {ch:?}"),
            LexErrorKind::UnterminatedString => "unterminated string literal".to_owned(),
            LexErrorKind::InvalidEscape(ch) => format!("invalid escape sequence `\\{ch}`"),
            LexErrorKind::InvalidUnicodeEscape => "malformed unicode escape".to_owned(),
            LexErrorKind::IntOutOfRange => "integer literal out of range".to_owned(),
            LexErrorKind::FloatOutOfRange => "float literal out of range".to_owned(),
            LexErrorKind::InvalidUtf8 { len } => {
                format!("invalid UTF-8 sequence of {len} byte(s)")
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code())
            .with_message(self.message())
            .at(self.span, self.pos);
        match self.kind {
            LexErrorKind::UnterminatedString => diag
                .with_label("string starts here")
                .with_note("strings cannot span lines; lexing resumed on the next line"),
            LexErrorKind::UnexpectedChar(_) => {
                diag.with_note("the rest of the line was skipped")
            }
            LexErrorKind::InvalidEscape(_) => diag
                .with_suggestion("valid escapes are \\n \\t \\r \\0 \\\\ \\\" \\' \\u{...}"),
            LexErrorKind::IntOutOfRange => {
                diag.with_note("integers are 64-bit signed; use a float or a string")
            }
            LexErrorKind::FloatOutOfRange => {
                diag.with_note("floats are 64-bit; use a string for larger magnitudes")
            }
            LexErrorKind::InvalidUnicodeEscape | LexErrorKind::InvalidUtf8 { .. } => diag,
        }
    }
}
