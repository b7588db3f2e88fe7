//! Hand-written lexer for template expressions.

use crate::span::Span;
use crate::tokens::{Spanned, TemplateChunk, Token};

/// Lexing or parsing failure at a byte offset, before line/column mapping.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawError {
    pub message: String,
    pub offset: usize,
}

impl RawError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

pub(crate) type LexResult<T> = Result<T, RawError>;

/// Tokenize `source`. Spans are shifted by `base` so substitutions inside
/// template strings report offsets in the enclosing source. Template
/// strings may nest at most `max_nesting` levels deep.
pub(crate) fn lex(source: &str, base: usize, max_nesting: usize) -> LexResult<Vec<Spanned>> {
    let mut lexer = Lexer {
        src: source,
        pos: 0,
        base,
        templates: 0,
        max_nesting,
    };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        let start = lexer.pos;
        let Some(ch) = lexer.peek() else {
            tokens.push(Spanned {
                token: Token::Eof,
                span: Span::new(start, start).shift(base),
            });
            return Ok(tokens);
        };
        let token = lexer.token(ch)?;
        tokens.push(Spanned {
            token,
            span: Span::new(start, lexer.pos).shift(base),
        });
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
    /// Template strings currently open.
    templates: usize,
    max_nesting: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> RawError {
        RawError::new(message, self.base + self.pos)
    }

    fn skip_trivia(&mut self) -> LexResult<()> {
        loop {
            match (self.peek(), self.peek_nth(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.src[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => return Err(RawError::new("unterminated comment", self.base + start)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn token(&mut self, ch: char) -> LexResult<Token> {
        if ch.is_ascii_digit() || (ch == '.' && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())) {
            return self.number();
        }
        if is_ident_start(ch) {
            return Ok(self.ident());
        }
        match ch {
            '"' | '\'' => {
                self.bump();
                return self.string(ch).map(Token::Str);
            }
            '`' => {
                self.bump();
                return self.template();
            }
            _ => {}
        }

        self.bump();
        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => {
                if self.peek() == Some('.') && self.peek_nth(1) == Some('.') {
                    self.pos += 2;
                    Token::Ellipsis
                } else {
                    Token::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    Token::QuestionQuestion
                } else if self.peek() == Some('.') && !self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                    Token::QuestionDot
                } else {
                    Token::Question
                }
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => {
                if self.eat('*') {
                    Token::StarStar
                } else {
                    Token::Star
                }
            }
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::NotEqEq
                    } else {
                        Token::NotEq
                    }
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                } else if self.eat('>') {
                    Token::Arrow
                } else {
                    return Err(RawError::new("assignment is not supported", self.base + self.pos - 1));
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            other => {
                return Err(RawError::new(
                    format!("unexpected character `{other}`"),
                    self.base + self.pos - other.len_utf8(),
                ))
            }
        };
        Ok(token)
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];
        Token::keyword(text).unwrap_or_else(|| Token::Ident(text.to_string()))
    }

    fn number(&mut self) -> LexResult<Token> {
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.src[digits_start..self.pos];
            self.eat('n');
            self.reject_trailing_ident()?;
            return i64::from_str_radix(digits, 16)
                .map(Token::Int)
                .map_err(|_| RawError::new("invalid hexadecimal literal", self.base + start));
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') && self.peek_nth(1) != Some('.') {
            is_float = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.digits();
            } else {
                self.pos = save;
            }
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();

        if !is_float && self.eat('n') {
            self.reject_trailing_ident()?;
            return text
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| RawError::new("BigInt literal out of range", self.base + start));
        }
        self.reject_trailing_ident()?;

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Token::Int(n));
            }
        }
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| RawError::new("invalid number literal", self.base + start))
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn reject_trailing_ident(&self) -> LexResult<()> {
        match self.peek() {
            Some(c) if is_ident_start(c) => Err(self.error("identifier directly after number")),
            _ => Ok(()),
        }
    }

    fn string(&mut self, quote: char) -> LexResult<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> LexResult<()> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated escape"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid escape"))?);
            }
            'u' => {
                let code = if self.eat('{') {
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.bump();
                    }
                    let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                        .map_err(|_| self.error("invalid unicode escape"))?;
                    if !self.eat('}') {
                        return Err(self.error("invalid unicode escape"));
                    }
                    code
                } else {
                    self.hex_digits(4)?
                };
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> LexResult<u32> {
        let start = self.pos;
        for _ in 0..count {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.bump();
                }
                _ => return Err(self.error("invalid escape")),
            }
        }
        u32::from_str_radix(&self.src[start..self.pos], 16).map_err(|_| self.error("invalid escape"))
    }

    fn template(&mut self) -> LexResult<Token> {
        self.templates += 1;
        if self.templates > self.max_nesting {
            return Err(self.error("expression nested too deeply"));
        }
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated template string")),
                Some('`') => break,
                Some('\\') => self.escape(&mut text)?,
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    let start = self.pos;
                    self.substitution_end()?;
                    chunks.push(TemplateChunk::Expr {
                        source: self.src[start..self.pos].to_string(),
                        offset: self.base + start,
                    });
                    self.bump();
                }
                Some(c) => text.push(c),
            }
        }
        if !text.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        self.templates -= 1;
        Ok(Token::Template(chunks))
    }

    /// Advance to the `}` closing a `${` substitution, leaving it unconsumed.
    fn substitution_end(&mut self) -> LexResult<()> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated template substitution")),
                Some('}') if depth == 0 => return Ok(()),
                Some('}') => depth -= 1,
                Some('{') => depth += 1,
                Some(q @ ('"' | '\'')) => {
                    self.bump();
                    self.string(q)?;
                    continue;
                }
                Some('`') => {
                    self.bump();
                    self.template()?;
                    continue;
                }
                Some(_) => {}
            }
            self.bump();
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}
