//! Recursive-descent parser for TSK sources.
//!
//! Grammar (informal):
//!
//! ```text
//! config  := (section_header | entry | NEWLINE)*
//! section_header := '[' IDENT ']' NEWLINE
//! entry   := key ('=' | ':' | '+=') value END
//!          | key '{' fields '}' END
//!          | key '>' fields '<' END
//! value   := STRING | INT | FLOAT | 'true' | 'false' | 'null'
//!          | INT '-' INT                      (range)
//!          | '[' (value SEP*)* ']'
//!          | '{' fields '}'
//!          | IDENT ('.' (IDENT | INT))*       (reference)
//!          | '$' IDENT                        (variable)
//!          | '@' IDENT '(' (arg SEP*)* ')'    (operator call)
//! arg     := (IDENT (':' | '='))? value
//! ```
//!
//! Declarations before the first header belong to the root section `""`.
//! A syntax error abandons the rest of its section: the parser records the
//! error, skips to the next line-initial `[`, and carries on, so every
//! independently parseable section still appears in the output.

mod cursor;
mod error;
mod grammar;
mod recovery;

use tracing::debug;
use tsk_diagnostic::Diagnostic;
use tsk_ir::{Config, Span, Token, TokenKind};
use tsk_lexer::LexError;

use crate::cursor::Cursor;

pub use error::{ParseError, ParseErrorKind};
pub use recovery::TokenSet;

/// Parser configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseOptions {
    /// Maximum number of errors recorded (0 = unlimited).
    pub max_errors: usize,
    /// Maximum nesting of arrays, objects and calls.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_errors: 100,
            max_depth: 256,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParseOutput {
    pub config: Config,
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of lexing and parsing a source text.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceParse {
    pub config: Config,
    pub lex_errors: Vec<LexError>,
    pub parse_errors: Vec<ParseError>,
}

impl SourceParse {
    pub fn has_errors(&self) -> bool {
        !self.lex_errors.is_empty() || !self.parse_errors.is_empty()
    }

    /// Lexer and parser diagnostics in source order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diags: Vec<Diagnostic> = self
            .lex_errors
            .iter()
            .map(LexError::to_diagnostic)
            .chain(self.parse_errors.iter().map(ParseError::to_diagnostic))
            .collect();
        diags.sort_by_key(|d| d.pos.offset);
        diags
    }
}

pub fn parse(tokens: &[Token<'_>]) -> ParseOutput {
    parse_with(tokens, &ParseOptions::default())
}

pub fn parse_with(tokens: &[Token<'_>], options: &ParseOptions) -> ParseOutput {
    let terminated;
    let tokens = if tokens.last().is_some_and(|t| t.kind == TokenKind::Eof) {
        tokens
    } else {
        let end = tokens.last().map_or(Span::DUMMY, |t| Span::point(t.span.end));
        let pos = tokens.last().map_or(tsk_ir::SourcePos::START, |t| t.pos);
        terminated = tokens
            .iter()
            .cloned()
            .chain(std::iter::once(Token::new(TokenKind::Eof, "", end, pos)))
            .collect::<Vec<_>>();
        &terminated
    };

    let mut parser = Parser::new(tokens, options.clone());
    let config = parser.parse_config();
    debug!(
        sections = config.sections.len(),
        entries = config.entry_count(),
        errors = parser.errors.len(),
        "parsed config"
    );
    ParseOutput {
        config,
        errors: parser.errors,
    }
}

/// Lex and parse `source`.
pub fn parse_source(source: &str) -> SourceParse {
    parse_source_with(source, &ParseOptions::default())
}

pub fn parse_source_with(source: &str, options: &ParseOptions) -> SourceParse {
    let lexed = tsk_lexer::lex(source);
    let ParseOutput { config, errors } = parse_with(&lexed.tokens, options);
    let mut lex_errors = lexed.errors;
    if options.max_errors > 0 {
        lex_errors.truncate(options.max_errors);
    }
    SourceParse {
        config,
        lex_errors,
        parse_errors: errors,
    }
}

pub(crate) struct Parser<'t, 'src> {
    cursor: Cursor<'t, 'src>,
    errors: Vec<ParseError>,
    /// Section currently being parsed, for error attribution.
    section: Option<String>,
    depth: usize,
    options: ParseOptions,
}

impl<'t, 'src> Parser<'t, 'src> {
    fn new(tokens: &'t [Token<'src>], options: ParseOptions) -> Self {
        Parser {
            cursor: Cursor::new(tokens),
            errors: Vec::new(),
            section: None,
            depth: 0,
            options,
        }
    }

    fn record(&mut self, mut err: ParseError) {
        if err.is_reported_elsewhere() {
            return;
        }
        if err.section.is_none() {
            err.section.clone_from(&self.section);
        }
        if self.options.max_errors > 0 && self.errors.len() >= self.options.max_errors {
            return;
        }
        debug!(error = %err.message(), pos = %err.pos, "syntax error");
        self.errors.push(err);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
