//! Values: literals, ranges, arrays, objects, references and operator calls,
//! plus the expression forms lowered onto builtin calls:
//!
//! ```text
//! value      = comparison [ "?" value ":" value ]     -> @if
//! comparison = concat [ ("==" | "!=" | ">") concat ]  -> @eq / @ne / @gt
//! concat     = primary { "+" primary }                -> @concat
//! ```

use tsk_ir::{
    Arg, Call, Field, Node, NodeKind, Reference, SourcePos, Span, Token, TokenKind, TokenTag,
    Value,
};
use tsk_stack::ensure_sufficient_stack;

use crate::error::{ParseError, ParseErrorKind};
use crate::recovery::{ITEM_SEPARATOR, VALUE_START};
use crate::Parser;

impl Parser<'_, '_> {
    /// Run a nested production with a depth check and stack growth.
    pub(crate) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= self.options.max_depth {
            return Err(ParseError::new(
                ParseErrorKind::TooDeep {
                    limit: self.options.max_depth,
                },
                self.cursor.current(),
            ));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| f(self));
        self.depth -= 1;
        result
    }

    pub(crate) fn parse_value(&mut self) -> Result<Node, ParseError> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Node, ParseError> {
        let condition = self.parse_comparison()?;
        if !self.cursor.check(TokenTag::Question) {
            return Ok(condition);
        }
        self.cursor.advance();
        let then = self.parse_value()?;
        if !self.cursor.check(TokenTag::Colon) {
            return Err(ParseError::unexpected("`:` of a conditional", self.cursor.current()));
        }
        self.cursor.advance();
        let otherwise = self.parse_value()?;
        let span = condition.span.merge(otherwise.span);
        let pos = condition.pos;
        Ok(lowered(
            "if",
            vec![("condition", condition), ("then", then), ("else", otherwise)],
            span,
            pos,
        ))
    }

    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let lhs = self.parse_concat()?;
        let operator = match self.cursor.current_tag() {
            TokenTag::EqEq => "eq",
            TokenTag::NotEq => "ne",
            TokenTag::Gt => "gt",
            _ => return Ok(lhs),
        };
        self.cursor.advance();
        let rhs = self.parse_concat()?;
        let span = lhs.span.merge(rhs.span);
        let pos = lhs.pos;
        Ok(lowered(operator, vec![("a", lhs), ("b", rhs)], span, pos))
    }

    fn parse_concat(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_primary()?;
        if !self.cursor.check(TokenTag::Plus) {
            return Ok(first);
        }
        let pos = first.pos;
        let mut span = first.span;
        let mut parts = vec![first];
        while self.cursor.check(TokenTag::Plus) {
            self.cursor.advance();
            let part = self.parse_primary()?;
            span = span.merge(part.span);
            parts.push(part);
        }
        let values = Node::new(NodeKind::Array(parts), span, pos);
        Ok(lowered("concat", vec![("values", values)], span, pos))
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.cursor.current();
        if token.kind.is(TokenTag::Error) {
            self.cursor.advance();
            return Err(ParseError::new(ParseErrorKind::Lexical, token));
        }
        if !VALUE_START.contains(token.kind.tag()) {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedValue {
                    found: token.kind.describe(),
                },
                token,
            ));
        }
        let literal = |value: Value| Node::literal(value, token.span, token.pos);
        match &token.kind {
            TokenKind::Str(s) => {
                self.cursor.advance();
                Ok(literal(Value::String(s.clone())))
            }
            TokenKind::Int(n) => self.parse_int_or_range(*n),
            TokenKind::Float(x) => {
                self.cursor.advance();
                Ok(literal(Value::Float(*x)))
            }
            TokenKind::True | TokenKind::False => {
                self.cursor.advance();
                Ok(literal(Value::Bool(token.kind == TokenKind::True)))
            }
            TokenKind::Null => {
                self.cursor.advance();
                Ok(literal(Value::Null))
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_object(),
            TokenKind::Variable => {
                self.cursor.advance();
                let name = token.variable_name().unwrap_or_default().to_owned();
                Ok(Node::new(
                    NodeKind::Reference(Reference::Variable(name)),
                    token.span,
                    token.pos,
                ))
            }
            TokenKind::OperatorStart => self.parse_call(),
            _ => self.parse_reference(),
        }
    }

    /// `8000` or `8000-9000`. The lexer reads `-9000` as a negative integer,
    /// so a range is two integers with no gap between them.
    fn parse_int_or_range(&mut self, min: i64) -> Result<Node, ParseError> {
        let first = self.cursor.advance();
        let next = self.cursor.current();
        if let TokenKind::Int(negated) = next.kind {
            if next.span.start == first.span.end && next.text.starts_with('-') {
                self.cursor.advance();
                let Some(max) = negated.checked_neg() else {
                    return Err(ParseError::new(ParseErrorKind::RangeBoundOutOfRange, next));
                };
                return Ok(Node::new(
                    NodeKind::Range { min, max },
                    first.span.merge(next.span),
                    first.pos,
                ));
            }
        }
        Ok(Node::literal(Value::Int(min), first.span, first.pos))
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        let open = self.cursor.advance();
        let mut items = Vec::new();
        loop {
            self.skip_item_separators();
            if self.cursor.check(TokenTag::RBracket) {
                let close = self.cursor.advance();
                return Ok(Node::new(
                    NodeKind::Array(items),
                    open.span.merge(close.span),
                    open.pos,
                ));
            }
            self.check_unclosed(open, '[')?;
            items.push(self.parse_value()?);
            self.expect_separator_or(TokenTag::RBracket, "`,` or `]`")?;
        }
    }

    pub(crate) fn parse_object(&mut self) -> Result<Node, ParseError> {
        let open = self.cursor.advance();
        let (fields, close) = self.parse_fields(open, '{', TokenTag::RBrace, "`,` or `}`")?;
        Ok(Node::new(
            NodeKind::Object(fields),
            open.span.merge(close),
            open.pos,
        ))
    }

    /// `key >` ... `<` block.
    pub(crate) fn parse_angle_block(&mut self) -> Result<Node, ParseError> {
        let open = self.cursor.advance();
        let (fields, close) = self.parse_fields(open, '>', TokenTag::Lt, "end of line or `<`")?;
        Ok(Node::new(
            NodeKind::Object(fields),
            open.span.merge(close),
            open.pos,
        ))
    }

    fn parse_fields(
        &mut self,
        open: &Token<'_>,
        open_char: char,
        close: TokenTag,
        expected: &'static str,
    ) -> Result<(Vec<Field>, Span), ParseError> {
        let mut fields = Vec::new();
        loop {
            self.skip_item_separators();
            if self.cursor.check(close) {
                let close = self.cursor.advance();
                return Ok((fields, close.span));
            }
            self.check_unclosed(open, open_char)?;
            fields.push(self.parse_field()?);
            self.expect_separator_or(close, expected)?;
        }
    }

    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let start = self.cursor.current();
        let key = self.parse_key()?;
        let op = self.cursor.current();
        let value = match op.kind.tag() {
            TokenTag::Equals | TokenTag::Colon => {
                self.cursor.advance();
                self.parse_value()?
            }
            TokenTag::LBrace => self.nested(Self::parse_object)?,
            TokenTag::Gt => self.nested(Self::parse_angle_block)?,
            _ => return Err(ParseError::unexpected("`:` or `=`", op)),
        };
        Ok(Field {
            key,
            span: start.span.merge(value.span),
            pos: start.pos,
            value,
        })
    }

    /// `name`, `section.key`, `section.key.0.nested`
    fn parse_reference(&mut self) -> Result<Node, ParseError> {
        let first = self.cursor.advance();
        let mut segments = vec![first.text.to_owned()];
        let mut span = first.span;
        while self.cursor.check(TokenTag::Dot) {
            let segment = self.cursor.peek(1);
            let valid = match segment.kind {
                TokenKind::Ident => true,
                TokenKind::Int(n) => n >= 0,
                _ => false,
            };
            if !valid {
                return Err(ParseError::unexpected("key after `.`", segment));
            }
            self.cursor.advance();
            self.cursor.advance();
            segments.push(segment.text.to_owned());
            span = span.merge(segment.span);
        }
        Ok(Node::new(
            NodeKind::Reference(Reference::Path(segments)),
            span,
            first.pos,
        ))
    }

    fn parse_call(&mut self) -> Result<Node, ParseError> {
        let open = self.cursor.advance();
        let name = open.operator_name().unwrap_or_default().to_owned();
        let mut args = Vec::new();
        let close = loop {
            self.skip_item_separators();
            if self.cursor.check(TokenTag::RParen) {
                break self.cursor.advance();
            }
            self.check_unclosed(open, '(')?;
            args.push(self.parse_arg()?);
            self.expect_separator_or(TokenTag::RParen, "`,` or `)`")?;
        };

        // `@op({k: v})` is the object form of named arguments.
        let object_form = matches!(
            args.as_slice(),
            [Arg {
                name: None,
                value: Node {
                    kind: NodeKind::Object(_),
                    ..
                },
                ..
            }]
        );
        if object_form {
            if let Some(Arg {
                value:
                    Node {
                        kind: NodeKind::Object(fields),
                        ..
                    },
                ..
            }) = args.pop()
            {
                args = fields
                    .into_iter()
                    .map(|field| Arg {
                        name: Some(field.key),
                        value: field.value,
                        span: field.span,
                        pos: field.pos,
                    })
                    .collect();
            }
        }

        Ok(Node::new(
            NodeKind::OperatorCall(Call { name, args }),
            open.span.merge(close.span),
            open.pos,
        ))
    }

    fn parse_arg(&mut self) -> Result<Arg, ParseError> {
        let start = self.cursor.current();
        let named = start.kind.is(TokenTag::Ident)
            && matches!(self.cursor.peek(1).kind.tag(), TokenTag::Colon | TokenTag::Equals);
        let name = if named {
            self.cursor.advance();
            self.cursor.advance();
            Some(start.text.to_owned())
        } else {
            None
        };
        let value = self.parse_value()?;
        Ok(Arg {
            name,
            span: start.span.merge(value.span),
            pos: start.pos,
            value,
        })
    }

    fn skip_item_separators(&mut self) {
        while ITEM_SEPARATOR.contains(self.cursor.current_tag()) {
            self.cursor.advance();
        }
    }

    fn expect_separator_or(
        &self,
        close: TokenTag,
        expected: &'static str,
    ) -> Result<(), ParseError> {
        let tag = self.cursor.current_tag();
        // At `Eof` the caller's next iteration reports the unclosed delimiter.
        if ITEM_SEPARATOR.contains(tag) || tag == close || tag == TokenTag::Eof {
            Ok(())
        } else {
            Err(ParseError::unexpected(expected, self.cursor.current()))
        }
    }

    /// A delimited construct may not run into end of file or into the next
    /// section header.
    fn check_unclosed(&self, open: &Token<'_>, open_char: char) -> Result<(), ParseError> {
        if self.cursor.is_at_end() || self.cursor.at_section_header() {
            return Err(ParseError::new(
                ParseErrorKind::UnclosedDelimiter {
                    open: open_char,
                    opened_at: open.pos,
                },
                open,
            ));
        }
        Ok(())
    }
}

/// A builtin call standing in for an expression form.
fn lowered(operator: &str, args: Vec<(&str, Node)>, span: Span, pos: SourcePos) -> Node {
    let args = args
        .into_iter()
        .map(|(name, value)| Arg {
            name: Some(name.to_owned()),
            span: value.span,
            pos: value.pos,
            value,
        })
        .collect();
    Node::new(
        NodeKind::OperatorCall(Call {
            name: operator.to_owned(),
            args,
        }),
        span,
        pos,
    )
}
