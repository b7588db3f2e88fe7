//! Pratt parser for template expressions
//!
//! Accepts a single JavaScript-flavoured value expression. Statements,
//! assignment and block-bodied functions are rejected at parse time.
//!
//! Nesting is bounded: every level of recursion and every link of a
//! left-associative chain (`a + b + c`, `a.b.c`) counts toward
//! `max_nesting`, which keeps evaluation recursion bounded as well.

use std::rc::Rc;

use crate::ast::{
    BinaryOp, Element, Expr, ExprKind, Literal, LogicalOp, Property, PropertyKey, TemplatePart,
    UnaryOp,
};
use crate::error::SyntaxError;
use crate::lexer::{lex, RawError};
use crate::span::{LineIndex, Span};
use crate::tokens::{Spanned, TemplateChunk, Token};
use crate::value::number_to_string;

type PResult<T> = Result<T, RawError>;

/// Parse `source` as a single expression.
pub fn parse(source: &str, max_nesting: usize) -> Result<Expr, SyntaxError> {
    parse_at(source, 0, 0, max_nesting).map_err(|err| {
        let index = LineIndex::new(source);
        SyntaxError {
            location: index.line_col(err.offset),
            message: err.message,
            offset: err.offset,
        }
    })
}

fn parse_at(source: &str, base: usize, depth: usize, max_nesting: usize) -> PResult<Expr> {
    let tokens = lex(source, base, max_nesting.saturating_sub(depth))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth,
        max_nesting,
    };
    if parser.at(&Token::Eof) {
        return Err(RawError::new("empty expression", base));
    }
    let expr = parser.parse_assignment()?;
    parser.expect(Token::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_nesting: usize,
}

impl Parser {
    fn current(&self) -> &Spanned {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_token(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].token
    }

    fn at(&self, token: &Token) -> bool {
        &self.current().token == token
    }

    fn advance(&mut self) -> Spanned {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> PResult<Span> {
        if self.at(&token) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(&format!("expected {token}")))
        }
    }

    fn unexpected(&self, context: &str) -> RawError {
        let cur = self.current();
        RawError::new(format!("{context}, found {}", cur.token), cur.span.start)
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > self.max_nesting {
            return Err(RawError::new(
                "expression nested too deeply",
                self.current().span.start,
            ));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        self.enter()?;
        let expr = if self.is_arrow_start() {
            self.parse_arrow()?
        } else {
            self.parse_conditional()?
        };
        self.leave(1);
        Ok(expr)
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = test.span.to(alternate.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut links = 0;
        while let Some((prec, op)) = binary_op(&self.current().token) {
            if prec < min_prec {
                break;
            }
            self.advance();
            self.enter()?;
            links += 1;
            // `**` is right-associative.
            let next_min = if matches!(op, Op::Binary(BinaryOp::Pow)) { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            let span = left.span.to(right.span);
            let kind = match op {
                Op::Binary(op) => ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Op::Logical(op) => ExprKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
            left = Expr::new(kind, span);
        }
        self.leave(links);
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.current().token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::KwTypeof => UnaryOp::Typeof,
            _ => return self.parse_postfix(),
        };
        let start = self.advance().span;
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave(1);
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = if self.at(&Token::KwNew) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let mut links = 0;
        loop {
            let kind = match self.current().token {
                Token::Dot => {
                    self.advance();
                    let name = self.property_name()?;
                    ExprKind::Member {
                        object: Box::new(expr.clone()),
                        property: name,
                        optional: false,
                    }
                }
                Token::QuestionDot => {
                    self.advance();
                    match self.current().token {
                        Token::LParen => ExprKind::Call {
                            callee: Box::new(expr.clone()),
                            args: self.parse_arguments()?,
                            optional: true,
                        },
                        Token::LBracket => ExprKind::Index {
                            object: Box::new(expr.clone()),
                            index: Box::new(self.parse_bracket_index()?),
                            optional: true,
                        },
                        _ => ExprKind::Member {
                            object: Box::new(expr.clone()),
                            property: self.property_name()?,
                            optional: true,
                        },
                    }
                }
                Token::LBracket => ExprKind::Index {
                    object: Box::new(expr.clone()),
                    index: Box::new(self.parse_bracket_index()?),
                    optional: false,
                },
                Token::LParen => ExprKind::Call {
                    callee: Box::new(expr.clone()),
                    args: self.parse_arguments()?,
                    optional: false,
                },
                _ => break,
            };
            self.enter()?;
            links += 1;
            let end = self.tokens[self.pos.saturating_sub(1)].span;
            expr = Expr::new(kind, expr.span.to(end));
        }
        self.leave(links);
        Ok(expr)
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        let start = self.advance().span;
        let mut callee = self.parse_primary()?;
        while self.at(&Token::Dot) {
            self.advance();
            let property = self.property_name()?;
            let end = self.tokens[self.pos.saturating_sub(1)].span;
            callee = Expr::new(
                ExprKind::Member {
                    object: Box::new(callee.clone()),
                    property,
                    optional: false,
                },
                callee.span.to(end),
            );
        }
        let args = if self.at(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            start.to(end),
        ))
    }

    fn property_name(&mut self) -> PResult<String> {
        match self.current().token.as_property_name() {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected("expected property name")),
        }
    }

    fn parse_bracket_index(&mut self) -> PResult<Expr> {
        self.expect(Token::LBracket)?;
        let index = self.parse_assignment()?;
        self.expect(Token::RBracket)?;
        Ok(index)
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Element>> {
        self.expect(Token::LParen)?;
        self.parse_elements(Token::RParen)
    }

    /// Comma separated elements with optional spread, up to `close`.
    fn parse_elements(&mut self, close: Token) -> PResult<Vec<Element>> {
        let mut items = Vec::new();
        while !self.at(&close) {
            if self.eat(&Token::Ellipsis) {
                items.push(Element::Spread(self.parse_assignment()?));
            } else {
                items.push(Element::Item(self.parse_assignment()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let Spanned { token, span } = self.current().clone();
        let literal = |lit| Ok(Expr::new(ExprKind::Literal(lit), span));
        match token {
            Token::Int(n) => {
                self.advance();
                literal(Literal::Int(n))
            }
            Token::Float(n) => {
                self.advance();
                literal(Literal::Float(n))
            }
            Token::Str(s) => {
                self.advance();
                literal(Literal::Str(s))
            }
            Token::KwTrue => {
                self.advance();
                literal(Literal::Bool(true))
            }
            Token::KwFalse => {
                self.advance();
                literal(Literal::Bool(false))
            }
            Token::KwNull => {
                self.advance();
                literal(Literal::Null)
            }
            Token::KwUndefined => {
                self.advance();
                literal(Literal::Undefined)
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(name), span))
            }
            Token::Template(chunks) => {
                self.advance();
                self.parse_template(chunks, span)
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_assignment()?;
                let end = self.expect(Token::RParen)?;
                Ok(Expr::new(ExprKind::Paren(Box::new(inner)), span.to(end)))
            }
            Token::LBracket => {
                self.advance();
                let items = self.parse_elements(Token::RBracket)?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Expr::new(ExprKind::Array(items), span.to(end)))
            }
            Token::LBrace => self.parse_object(),
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn parse_template(&mut self, chunks: Vec<TemplateChunk>, span: Span) -> PResult<Expr> {
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => parts.push(TemplatePart::Text(text)),
                TemplateChunk::Expr { source, offset } => {
                    if source.trim().is_empty() {
                        return Err(RawError::new("empty template substitution", offset));
                    }
                    let expr = parse_at(&source, offset, self.depth + 1, self.max_nesting)?;
                    parts.push(TemplatePart::Expr(expr));
                }
            }
        }
        Ok(Expr::new(ExprKind::Template(parts), span))
    }

    fn parse_object(&mut self) -> PResult<Expr> {
        let start = self.expect(Token::LBrace)?;
        let mut props = Vec::new();
        while !self.at(&Token::RBrace) {
            props.push(self.parse_property()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let end = self.expect(Token::RBrace)?;
        Ok(Expr::new(ExprKind::Object(props), start.to(end)))
    }

    fn parse_property(&mut self) -> PResult<Property> {
        if self.eat(&Token::Ellipsis) {
            return Ok(Property::Spread(self.parse_assignment()?));
        }
        let Spanned { token, span } = self.current().clone();
        let key = match &token {
            Token::LBracket => {
                let key = self.parse_bracket_index()?;
                self.expect(Token::Colon)?;
                return Ok(Property::KeyValue(PropertyKey::Computed(key), self.parse_assignment()?));
            }
            Token::Str(s) => s.clone(),
            Token::Int(n) => n.to_string(),
            Token::Float(n) => number_to_string(*n),
            other => match other.as_property_name() {
                Some(name) => name,
                None => return Err(self.unexpected("expected property key")),
            },
        };
        self.advance();

        if self.eat(&Token::Colon) {
            let value = self.parse_assignment()?;
            return Ok(Property::KeyValue(PropertyKey::Static(key), value));
        }
        match token {
            Token::Ident(name) if matches!(self.current().token, Token::Comma | Token::RBrace) => {
                Ok(Property::Shorthand(name, span))
            }
            _ => Err(self.unexpected("expected `:` after property key")),
        }
    }

    fn is_arrow_start(&self) -> bool {
        match self.current().token {
            Token::Ident(_) => matches!(self.peek_token(1), Token::Arrow),
            Token::LParen => {
                let mut depth = 0usize;
                let mut idx = self.pos;
                while idx < self.tokens.len() {
                    match self.tokens[idx].token {
                        Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                        Token::RParen | Token::RBracket | Token::RBrace => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                return matches!(
                                    self.tokens.get(idx + 1).map(|t| &t.token),
                                    Some(Token::Arrow)
                                );
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    idx += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> PResult<Expr> {
        let start = self.current().span;
        let mut params = Vec::new();
        if let Token::Ident(name) = &self.current().token {
            params.push(name.clone());
            self.advance();
        } else {
            self.expect(Token::LParen)?;
            while !self.at(&Token::RParen) {
                match &self.current().token {
                    Token::Ident(name) => {
                        if params.contains(name) {
                            return Err(self.unexpected("duplicate parameter name"));
                        }
                        params.push(name.clone());
                        self.advance();
                    }
                    _ => return Err(self.unexpected("expected parameter name")),
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen)?;
        }
        self.expect(Token::Arrow)?;
        if self.at(&Token::LBrace) {
            return Err(self.unexpected(
                "function bodies must be expressions; wrap object literals in parentheses",
            ));
        }
        let body = self.parse_assignment()?;
        let span = start.to(body.span);
        Ok(Expr::new(
            ExprKind::Arrow {
                params: params.into(),
                body: Rc::new(body),
            },
            span,
        ))
    }
}

enum Op {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn binary_op(token: &Token) -> Option<(u8, Op)> {
    let entry = match token {
        Token::QuestionQuestion => (1, Op::Logical(LogicalOp::Nullish)),
        Token::OrOr => (1, Op::Logical(LogicalOp::Or)),
        Token::AndAnd => (2, Op::Logical(LogicalOp::And)),
        Token::EqEq => (3, Op::Binary(BinaryOp::LooseEq)),
        Token::NotEq => (3, Op::Binary(BinaryOp::LooseNe)),
        Token::EqEqEq => (3, Op::Binary(BinaryOp::StrictEq)),
        Token::NotEqEq => (3, Op::Binary(BinaryOp::StrictNe)),
        Token::Lt => (4, Op::Binary(BinaryOp::Lt)),
        Token::Le => (4, Op::Binary(BinaryOp::Le)),
        Token::Gt => (4, Op::Binary(BinaryOp::Gt)),
        Token::Ge => (4, Op::Binary(BinaryOp::Ge)),
        Token::KwIn => (4, Op::Binary(BinaryOp::In)),
        Token::Plus => (5, Op::Binary(BinaryOp::Add)),
        Token::Minus => (5, Op::Binary(BinaryOp::Sub)),
        Token::Star => (6, Op::Binary(BinaryOp::Mul)),
        Token::Slash => (6, Op::Binary(BinaryOp::Div)),
        Token::Percent => (6, Op::Binary(BinaryOp::Rem)),
        Token::StarStar => (7, Op::Binary(BinaryOp::Pow)),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(source: &str) -> Expr {
        parse(source, 64).unwrap()
    }

    fn kind(source: &str) -> ExprKind {
        p(source).kind
    }

    #[test]
    fn test_precedence() {
        match kind("1 + 2 * 3") {
            ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pow_is_right_associative() {
        match kind("2 ** 3 ** 2") {
            ExprKind::Binary { op: BinaryOp::Pow, left, right } => {
                assert!(matches!(left.kind, ExprKind::Literal(Literal::Int(2))));
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_object_literal_forms() {
        match kind("{ a: 1, 'b c': 2, [k]: 3, short, ...rest, 4: x, }") {
            ExprKind::Object(props) => {
                assert_eq!(props.len(), 6);
                assert!(matches!(&props[0], Property::KeyValue(PropertyKey::Static(k), _) if k == "a"));
                assert!(matches!(&props[1], Property::KeyValue(PropertyKey::Static(k), _) if k == "b c"));
                assert!(matches!(&props[2], Property::KeyValue(PropertyKey::Computed(_), _)));
                assert!(matches!(&props[3], Property::Shorthand(k, _) if k == "short"));
                assert!(matches!(&props[4], Property::Spread(_)));
                assert!(matches!(&props[5], Property::KeyValue(PropertyKey::Static(k), _) if k == "4"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_arrow_functions() {
        assert!(matches!(kind("x => x + 1"), ExprKind::Arrow { params, .. } if params.len() == 1));
        assert!(matches!(kind("(a, b) => a"), ExprKind::Arrow { params, .. } if params.len() == 2));
        assert!(matches!(kind("() => ({})"), ExprKind::Arrow { params, .. } if params.is_empty()));
        assert!(matches!(kind("(a)"), ExprKind::Paren(_)));
    }

    #[test]
    fn test_optional_chain_flags() {
        match kind("a?.b.c") {
            ExprKind::Member { object, optional: false, .. } => {
                assert!(matches!(object.kind, ExprKind::Member { optional: true, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(kind("f?.(1)"), ExprKind::Call { optional: true, .. }));
        assert!(matches!(kind("a?.[0]"), ExprKind::Index { optional: true, .. }));
    }

    #[test]
    fn test_keywords_as_property_names() {
        assert!(matches!(kind("a.new"), ExprKind::Member { property, .. } if property == "new"));
        assert!(matches!(kind("{ null: 1 }"), ExprKind::Object(_)));
    }

    #[test]
    fn test_new_expression() {
        assert!(matches!(kind("new Date('2024-01-01')"), ExprKind::New { args, .. } if args.len() == 1));
        assert!(matches!(kind("new Date"), ExprKind::New { args, .. } if args.is_empty()));
    }

    #[test]
    fn test_template_substitutions_are_parsed() {
        match kind("`a${1 + 2}b`") {
            ExprKind::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[1], TemplatePart::Expr(e) if matches!(e.kind, ExprKind::Binary { .. })));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_syntax_errors_have_locations() {
        let err = parse("{\n  a: 1,\n  b: ]\n}", 64).unwrap_err();
        assert_eq!(err.location.line, 3);
        assert!(err.message.contains("expected an expression"));

        assert!(parse("", 64).is_err());
        assert!(parse("1 2", 64).is_err());
        assert!(parse("x => { return 1 }", 64).is_err());
        assert!(parse("`${}`", 64).is_err());
        assert!(parse("{ a b }", 64).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "[".repeat(40), "]".repeat(40));
        assert!(parse(&deep, 64).is_ok());
        assert!(parse(&deep, 16).is_err());

        let long_chain = vec!["1"; 100].join(" + ");
        assert!(parse(&long_chain, 64).is_err());
        assert!(parse(&long_chain, 256).is_ok());
    }
}
