//! Token cursor for navigating the token stream.

use tracing::trace;
use tsk_ir::{SourcePos, Token, TokenKind, TokenTag};

/// Position in a token slice. The slice always ends with `Eof`, and the
/// cursor never moves past it.
pub struct Cursor<'t, 'src> {
    tokens: &'t [Token<'src>],
    pos: usize,
}

impl<'t, 'src> Cursor<'t, 'src> {
    /// `tokens` must be non-empty and end with [`TokenKind::Eof`].
    pub fn new(tokens: &'t [Token<'src>]) -> Self {
        debug_assert!(
            tokens.last().is_some_and(|t| t.kind == TokenKind::Eof),
            "token stream must end with Eof"
        );
        Cursor { tokens, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn current(&self) -> &'t Token<'src> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    pub fn current_tag(&self) -> TokenTag {
        self.current().kind.tag()
    }

    #[inline]
    pub fn current_pos(&self) -> SourcePos {
        self.current().pos
    }

    /// The token `n` ahead of the current one, clamped to `Eof`.
    pub fn peek(&self, n: usize) -> &'t Token<'src> {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    /// The most recently consumed token, if any.
    pub fn previous(&self) -> Option<&'t Token<'src>> {
        self.pos.checked_sub(1).map(|i| &self.tokens[i])
    }

    #[inline]
    pub fn check(&self, tag: TokenTag) -> bool {
        self.current_tag() == tag
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.check(TokenTag::Eof)
    }

    /// True when the current token is the first on its line.
    pub fn at_line_start(&self) -> bool {
        self.previous()
            .map_or(true, |prev| prev.kind == TokenKind::Newline)
    }

    /// Consume the current token and return it.
    pub fn advance(&mut self) -> &'t Token<'src> {
        let token = self.current();
        if !self.is_at_end() {
            trace!(kind = ?token.kind, pos = %token.pos, "advance");
            self.pos += 1;
        }
        token
    }

    /// Consume the current token if it has `tag`.
    pub fn eat(&mut self, tag: TokenTag) -> bool {
        if self.check(tag) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip line breaks and `;` separators.
    pub fn skip_newlines(&mut self) {
        while matches!(self.current_tag(), TokenTag::Newline | TokenTag::Semicolon) {
            self.advance();
        }
    }

    /// True at `[name]` followed by a line break, starting a line.
    pub fn at_section_header(&self) -> bool {
        self.check(TokenTag::LBracket)
            && self.at_line_start()
            && self.peek(1).kind.is(TokenTag::Ident)
            && self.peek(2).kind.is(TokenTag::RBracket)
            && matches!(self.peek(3).kind.tag(), TokenTag::Newline | TokenTag::Eof)
    }
}
