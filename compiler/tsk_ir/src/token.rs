//! Lexical tokens.

use std::fmt;

use crate::{SourcePos, Span};

/// Token kind. Literal kinds carry their cooked payload; the raw source
/// slice lives on [`Token::text`].
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// `name`, `max-connections`
    Ident,
    /// `$name`
    Variable,
    /// `"..."` or `'...'` with escapes applied.
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Null,
    /// `@name(` with no whitespace before the parenthesis.
    OperatorStart,

    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,
    Equals,
    PlusEquals,
    Dot,
    Gt,
    Lt,
    /// `+` between values, concatenation.
    Plus,
    /// `?` of a ternary.
    Question,
    EqEq,
    NotEq,
    Newline,

    /// A construct the lexer could not recognise. The error has already
    /// been recorded on the lexer.
    Error,
    Eof,
}

/// Payload-free discriminant of a [`TokenKind`], small enough for bitsets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum TokenTag {
    Ident = 0,
    Variable,
    Str,
    Int,
    Float,
    True,
    False,
    Null,
    OperatorStart,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,
    Equals,
    PlusEquals,
    Dot,
    Gt,
    Lt,
    Plus,
    Question,
    EqEq,
    NotEq,
    Newline,
    Error,
    Eof,
}

impl TokenTag {
    /// Largest discriminant value.
    pub const MAX: u8 = TokenTag::Eof as u8;
}

impl TokenKind {
    pub fn tag(&self) -> TokenTag {
        match self {
            TokenKind::Ident => TokenTag::Ident,
            TokenKind::Variable => TokenTag::Variable,
            TokenKind::Str(_) => TokenTag::Str,
            TokenKind::Int(_) => TokenTag::Int,
            TokenKind::Float(_) => TokenTag::Float,
            TokenKind::True => TokenTag::True,
            TokenKind::False => TokenTag::False,
            TokenKind::Null => TokenTag::Null,
            TokenKind::OperatorStart => TokenTag::OperatorStart,
            TokenKind::LBracket => TokenTag::LBracket,
            TokenKind::RBracket => TokenTag::RBracket,
            TokenKind::LBrace => TokenTag::LBrace,
            TokenKind::RBrace => TokenTag::RBrace,
            TokenKind::LParen => TokenTag::LParen,
            TokenKind::RParen => TokenTag::RParen,
            TokenKind::Comma => TokenTag::Comma,
            TokenKind::Colon => TokenTag::Colon,
            TokenKind::Semicolon => TokenTag::Semicolon,
            TokenKind::Equals => TokenTag::Equals,
            TokenKind::PlusEquals => TokenTag::PlusEquals,
            TokenKind::Dot => TokenTag::Dot,
            TokenKind::Gt => TokenTag::Gt,
            TokenKind::Lt => TokenTag::Lt,
            TokenKind::Plus => TokenTag::Plus,
            TokenKind::Question => TokenTag::Question,
            TokenKind::EqEq => TokenTag::EqEq,
            TokenKind::NotEq => TokenTag::NotEq,
            TokenKind::Newline => TokenTag::Newline,
            TokenKind::Error => TokenTag::Error,
            TokenKind::Eof => TokenTag::Eof,
        }
    }

    /// Short description used in "expected X, found Y" messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::Variable => "variable",
            TokenKind::Str(_) => "string",
            TokenKind::Int(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::True | TokenKind::False => "boolean",
            TokenKind::Null => "`null`",
            TokenKind::OperatorStart => "operator call",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Equals => "`=`",
            TokenKind::PlusEquals => "`+=`",
            TokenKind::Dot => "`.`",
            TokenKind::Gt => "`>`",
            TokenKind::Lt => "`<`",
            TokenKind::Plus => "`+`",
            TokenKind::Question => "`?`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Newline => "end of line",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }

    #[inline]
    pub fn is(&self, tag: TokenTag) -> bool {
        self.tag() == tag
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A token with its raw text and location.
#[derive(Clone, Debug, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
    pub pos: SourcePos,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, text: &'src str, span: Span, pos: SourcePos) -> Self {
        Token {
            kind,
            text,
            span,
            pos,
        }
    }

    /// Operator name of an [`TokenKind::OperatorStart`] token (`@env(` → `env`).
    pub fn operator_name(&self) -> Option<&'src str> {
        match self.kind {
            TokenKind::OperatorStart => self
                .text
                .strip_prefix('@')
                .and_then(|t| t.strip_suffix('(')),
            _ => None,
        }
    }

    /// Variable name of a [`TokenKind::Variable`] token (`$port` → `port`).
    pub fn variable_name(&self) -> Option<&'src str> {
        match self.kind {
            TokenKind::Variable => self.text.strip_prefix('$'),
            _ => None,
        }
    }
}
