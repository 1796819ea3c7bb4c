//! Token sets and resynchronisation after syntax errors.
//!
//! The recovery unit is the section: after an error the parser drops
//! everything up to the next `[` that begins a line, so each malformed
//! section yields at most one error and the following sections still parse.

use tsk_ir::TokenTag;

use crate::cursor::Cursor;

const _: () = assert!(
    TokenTag::MAX < 32,
    "TokenSet uses a u32 bitset; every tag must be < 32"
);

/// Set of token tags with O(1) membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TokenSet(u32);

impl TokenSet {
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn with(self, tag: TokenTag) -> Self {
        Self(self.0 | (1u32 << tag as u8))
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(&self, tag: TokenTag) -> bool {
        (self.0 & (1u32 << tag as u8)) != 0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Tokens that may begin a value.
pub const VALUE_START: TokenSet = TokenSet::new()
    .with(TokenTag::Str)
    .with(TokenTag::Int)
    .with(TokenTag::Float)
    .with(TokenTag::True)
    .with(TokenTag::False)
    .with(TokenTag::Null)
    .with(TokenTag::LBracket)
    .with(TokenTag::LBrace)
    .with(TokenTag::Ident)
    .with(TokenTag::Variable)
    .with(TokenTag::OperatorStart);

/// Tokens that may be used as a key.
pub const KEY_START: TokenSet = TokenSet::new()
    .with(TokenTag::Ident)
    .with(TokenTag::Variable)
    .with(TokenTag::Str)
    .with(TokenTag::True)
    .with(TokenTag::False)
    .with(TokenTag::Null);

/// Tokens that end a declaration.
pub const ENTRY_END: TokenSet = TokenSet::new()
    .with(TokenTag::Newline)
    .with(TokenTag::Semicolon)
    .with(TokenTag::Eof);

/// Separators between array items or object fields.
pub const ITEM_SEPARATOR: TokenSet = TokenSet::new()
    .with(TokenTag::Comma)
    .with(TokenTag::Newline)
    .with(TokenTag::Semicolon);

/// Skip to the next `[` at the start of a line, or to `Eof`.
///
/// Returns the number of tokens skipped.
pub fn recover_to_section(cursor: &mut Cursor<'_, '_>) -> usize {
    let start = cursor.position();
    while !cursor.is_at_end() && !(cursor.check(TokenTag::LBracket) && cursor.at_line_start()) {
        cursor.advance();
    }
    cursor.position() - start
}
