//! The logos-derived scanner, before positions and literal cooking.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\f]+")] // Skip horizontal whitespace
pub(crate) enum RawToken {
    #[regex(r"#[^\n]*")]
    #[regex(r"//[^\n]*")]
    Comment,

    #[token("\n")]
    Newline,

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*")]
    Ident,

    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*")]
    Variable,

    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*\(")]
    OperatorStart,

    #[regex(r"-?[0-9][0-9_]*")]
    Int,

    #[regex(r"-?[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"-?[0-9][0-9_]*[eE][+-]?[0-9]+")]
    Float,

    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    DoubleQuoted,
    #[regex(r"'([^'\\\n]|\\[^\n])*'")]
    SingleQuoted,

    // Longest-match keeps these from firing when a closing quote exists.
    #[regex(r#""([^"\\\n]|\\[^\n])*\\?"#)]
    #[regex(r"'([^'\\\n]|\\[^\n])*\\?")]
    UnterminatedString,

    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Equals,
    #[token("+=")]
    PlusEquals,
    #[token(".")]
    Dot,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
}
