//! Sections and declarations.

use tsk_ir::{AssignOp, Config, Entry, Section, SourcePos, Span, TokenKind, TokenTag};

use crate::error::{ParseError, ParseErrorKind};
use crate::recovery::{recover_to_section, ENTRY_END, KEY_START};
use crate::Parser;

impl Parser<'_, '_> {
    pub(crate) fn parse_config(&mut self) -> Config {
        let mut sections = Vec::new();
        let mut current = root_section(self.cursor.current_pos());

        loop {
            self.cursor.skip_newlines();
            if self.cursor.is_at_end() {
                break;
            }

            if self.cursor.check(TokenTag::LBracket) && self.cursor.at_line_start() {
                match self.parse_section_header() {
                    Ok(section) => {
                        push_section(&mut sections, std::mem::replace(&mut current, section));
                    }
                    Err(err) => {
                        self.record(err);
                        recover_to_section(&mut self.cursor);
                    }
                }
                continue;
            }

            match self.parse_entry() {
                Ok(entry) => {
                    current.span = current.span.merge(entry.span);
                    current.entries.push(entry);
                }
                Err(err) => {
                    current.recovered = true;
                    self.record(err);
                    recover_to_section(&mut self.cursor);
                }
            }
        }

        push_section(&mut sections, current);
        Config { sections }
    }

    fn parse_section_header(&mut self) -> Result<Section, ParseError> {
        let open = self.cursor.advance();
        let name_token = self.cursor.current();
        if !name_token.kind.is(TokenTag::Ident) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidSectionHeader {
                    found: name_token.kind.describe(),
                },
                name_token,
            ));
        }
        self.cursor.advance();
        self.section = Some(name_token.text.to_owned());

        let close = self.cursor.current();
        if !self.cursor.eat(TokenTag::RBracket) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidSectionHeader {
                    found: close.kind.describe(),
                },
                close,
            ));
        }
        if !matches!(self.cursor.current_tag(), TokenTag::Newline | TokenTag::Eof) {
            return Err(ParseError::unexpected(
                "end of line after section header",
                self.cursor.current(),
            ));
        }

        Ok(Section {
            name: name_token.text.to_owned(),
            implicit: false,
            recovered: false,
            entries: Vec::new(),
            span: open.span.merge(close.span),
            pos: open.pos,
        })
    }

    fn parse_entry(&mut self) -> Result<Entry, ParseError> {
        let start = self.cursor.current();
        let key = self.parse_key()?;

        let op_token = self.cursor.current();
        let (op, value) = match op_token.kind.tag() {
            TokenTag::Equals | TokenTag::Colon => {
                self.cursor.advance();
                (AssignOp::Set, self.parse_value()?)
            }
            TokenTag::PlusEquals => {
                self.cursor.advance();
                (AssignOp::Merge, self.parse_value()?)
            }
            TokenTag::LBrace => (AssignOp::Set, self.nested(Self::parse_object)?),
            TokenTag::Gt => (AssignOp::Set, self.nested(Self::parse_angle_block)?),
            _ => {
                return Err(ParseError::unexpected(
                    "`=`, `:`, `+=`, `{` or `>`",
                    op_token,
                ))
            }
        };
        self.expect_entry_end()?;

        Ok(Entry {
            key,
            op,
            span: start.span.merge(value.span),
            pos: start.pos,
            value,
        })
    }

    /// A key: identifier, `$variable`, quoted string, or a keyword used as
    /// a name.
    pub(crate) fn parse_key(&mut self) -> Result<String, ParseError> {
        let token = self.cursor.current();
        if token.kind.is(TokenTag::Error) {
            return Err(ParseError::new(ParseErrorKind::Lexical, token));
        }
        if !KEY_START.contains(token.kind.tag()) {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedKey {
                    found: token.kind.describe(),
                },
                token,
            ));
        }
        self.cursor.advance();
        Ok(match &token.kind {
            TokenKind::Str(s) => s.clone(),
            _ => token.text.to_owned(),
        })
    }

    fn expect_entry_end(&mut self) -> Result<(), ParseError> {
        let token = self.cursor.current();
        if !ENTRY_END.contains(token.kind.tag()) {
            return Err(ParseError::unexpected("end of line", token));
        }
        self.cursor.eat(TokenTag::Semicolon);
        Ok(())
    }
}

fn root_section(pos: SourcePos) -> Section {
    Section {
        name: String::new(),
        implicit: true,
        recovered: false,
        entries: Vec::new(),
        span: Span::point(pos.offset),
        pos,
    }
}

/// The implicit root section is kept only if something was declared in it.
fn push_section(sections: &mut Vec<Section>, section: Section) {
    if !section.implicit || !section.entries.is_empty() || section.recovered {
        sections.push(section);
    }
}
