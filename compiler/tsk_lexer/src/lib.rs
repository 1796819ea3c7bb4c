//! Lexer for TSK configuration sources, built on logos.
//!
//! [`tokenize`] returns a lazy, single-pass [`Lexer`] that yields
//! [`Token`]s with line/column positions and ends with one
//! [`TokenKind::Eof`]. Comments are skipped. Problems are recorded as
//! [`LexError`]s on the lexer rather than ending the scan: a failed
//! construct produces a [`TokenKind::Error`] token and scanning resumes at
//! the next line boundary.

mod cook_escape;
mod decode;
mod lex_error;
mod raw_token;

use logos::Logos;
use tracing::{debug, trace};
use tsk_ir::{SourcePos, Span, Token, TokenKind};

use crate::cook_escape::{unescape, EscapeProblem};
use crate::raw_token::RawToken;

pub use decode::decode_source;
pub use lex_error::{LexError, LexErrorKind};

/// Start lexing `source`.
pub fn tokenize(source: &str) -> Lexer<'_> {
    Lexer::new(source)
}

/// Every token of `source` (ending with `Eof`) plus the errors found.
pub fn lex(source: &str) -> LexOutput<'_> {
    let mut lexer = Lexer::new(source);
    let tokens: Vec<Token<'_>> = lexer.by_ref().collect();
    let errors = lexer.take_errors();
    debug!(tokens = tokens.len(), errors = errors.len(), "lexed source");
    LexOutput { tokens, errors }
}

#[derive(Clone, Debug)]
pub struct LexOutput<'src> {
    pub tokens: Vec<Token<'src>>,
    pub errors: Vec<LexError>,
}

pub struct Lexer<'src> {
    source: &'src str,
    raw: logos::Lexer<'src, RawToken>,
    line: u32,
    line_start: usize,
    /// Last offset whose column is known, to keep column tracking linear.
    col_offset: usize,
    col: u32,
    errors: Vec<LexError>,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            raw: RawToken::lexer(source),
            line: 1,
            line_start: 0,
            col_offset: 0,
            col: 1,
            errors: Vec::new(),
            done: false,
        }
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LexError> {
        std::mem::take(&mut self.errors)
    }

    /// Position of `offset`, which must not precede the last position
    /// computed on the current line.
    fn position(&mut self, offset: usize) -> SourcePos {
        if offset < self.col_offset {
            self.col_offset = self.line_start;
            self.col = 1;
        }
        let advanced = self.source[self.col_offset..offset].chars().count();
        self.col += u32::try_from(advanced).unwrap_or(u32::MAX);
        self.col_offset = offset;
        SourcePos::new(self.line, self.col, to_u32(offset))
    }

    fn span(range: std::ops::Range<usize>) -> Span {
        Span::saturating_from_range(range)
    }

    /// Skip to (not past) the next newline.
    fn skip_line(&mut self) {
        let rest = self.raw.remainder();
        let skip = rest.find('\n').unwrap_or(rest.len());
        self.raw.bump(skip);
    }

    fn cook(&mut self, raw: RawToken, range: std::ops::Range<usize>) -> Token<'src> {
        let source = self.source;
        let pos = self.position(range.start);
        let text = &source[range.clone()];
        let span = Self::span(range.clone());
        let kind = match raw {
            RawToken::Newline => {
                self.line += 1;
                self.line_start = range.end;
                self.col_offset = range.end;
                self.col = 1;
                TokenKind::Newline
            }
            RawToken::True => TokenKind::True,
            RawToken::False => TokenKind::False,
            RawToken::Null => TokenKind::Null,
            RawToken::Ident => TokenKind::Ident,
            RawToken::Variable => TokenKind::Variable,
            RawToken::OperatorStart => TokenKind::OperatorStart,
            RawToken::Int => match text.replace('_', "").parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(_) => {
                    self.errors.push(LexError::int_out_of_range(span, pos));
                    TokenKind::Error
                }
            },
            RawToken::Float => match text.replace('_', "").parse::<f64>() {
                Ok(x) if x.is_finite() => TokenKind::Float(x),
                _ => {
                    self.errors.push(LexError::float_out_of_range(span, pos));
                    TokenKind::Error
                }
            },
            RawToken::DoubleQuoted | RawToken::SingleQuoted => {
                let body = &text[1..text.len() - 1];
                TokenKind::Str(self.cook_string(body, range.start + 1, pos))
            }
            RawToken::UnterminatedString => {
                self.errors.push(LexError::unterminated_string(span, pos));
                TokenKind::Error
            }
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::Equals => TokenKind::Equals,
            RawToken::PlusEquals => TokenKind::PlusEquals,
            RawToken::Dot => TokenKind::Dot,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Question => TokenKind::Question,
            RawToken::EqEq => TokenKind::EqEq,
            RawToken::NotEq => TokenKind::NotEq,
            // Filtered out before cooking.
            RawToken::Comment => TokenKind::Error,
        };
        trace!(?kind, %pos, "token");
        Token::new(kind, text, span, pos)
    }

    fn cook_string(&mut self, body: &str, body_start: usize, quote_pos: SourcePos) -> String {
        let mut problems = Vec::new();
        let cooked = unescape(body, &mut problems);
        for problem in problems {
            let (start, end) = match problem {
                EscapeProblem::Invalid { start, end, .. }
                | EscapeProblem::BadUnicode { start, end } => (start, end),
            };
            // Strings never span lines, so the column is relative to the quote.
            let column = quote_pos.column
                + 1
                + u32::try_from(body[..start].chars().count()).unwrap_or(u32::MAX);
            let pos = SourcePos::new(quote_pos.line, column, to_u32(body_start + start));
            let span = Self::span(body_start + start..body_start + end);
            self.errors.push(match problem {
                EscapeProblem::Invalid { ch, .. } => LexError::invalid_escape(span, pos, ch),
                EscapeProblem::BadUnicode { .. } => LexError::invalid_unicode_escape(span, pos),
            });
        }
        cooked
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Token<'src>> {
        if self.done {
            return None;
        }
        loop {
            match self.raw.next() {
                Some(Ok(RawToken::Comment)) => {}
                Some(Ok(raw)) => {
                    let range = self.raw.span();
                    return Some(self.cook(raw, range));
                }
                Some(Err(())) => {
                    let source = self.source;
                    let start = self.raw.span().start;
                    let pos = self.position(start);
                    let ch = source[start..].chars().next().unwrap_or('\u{FFFD}');
                    self.skip_line();
                    let end = (source.len() - self.raw.remainder().len())
                        .max(start + ch.len_utf8());
                    let char_span = Self::span(start..start + ch.len_utf8());
                    self.errors
                        .push(LexError::unexpected_char(char_span, pos, ch));
                    return Some(Token::new(
                        TokenKind::Error,
                        &source[start..end],
                        Self::span(start..end),
                        pos,
                    ));
                }
                None => {
                    self.done = true;
                    let end = self.source.len();
                    let pos = self.position(end);
                    return Some(Token::new(TokenKind::Eof, "", Self::span(end..end), pos));
                }
            }
        }
    }
}

#[inline]
fn to_u32(offset: usize) -> u32 {
    u32::try_from(offset).unwrap_or(u32::MAX)
}
