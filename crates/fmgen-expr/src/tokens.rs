use std::fmt;

use crate::span::Span;

/// Piece of a template literal.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplateChunk {
    Text(String),
    /// Raw source of a `${...}` substitution and its byte offset.
    Expr { source: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Template(Vec<TemplateChunk>),

    KwTrue,
    KwFalse,
    KwNull,
    KwUndefined,
    KwTypeof,
    KwIn,
    KwNew,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    QuestionDot,
    Question,
    QuestionQuestion,
    Ellipsis,
    Arrow,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

impl Token {
    pub(crate) fn keyword(ident: &str) -> Option<Token> {
        Some(match ident {
            "true" => Token::KwTrue,
            "false" => Token::KwFalse,
            "null" => Token::KwNull,
            "undefined" => Token::KwUndefined,
            "typeof" => Token::KwTypeof,
            "in" => Token::KwIn,
            "new" => Token::KwNew,
            _ => return None,
        })
    }

    /// Text usable as an object key or property name, keywords included.
    pub(crate) fn as_property_name(&self) -> Option<String> {
        let name = match self {
            Token::Ident(name) => name.as_str(),
            Token::KwTrue => "true",
            Token::KwFalse => "false",
            Token::KwNull => "null",
            Token::KwUndefined => "undefined",
            Token::KwTypeof => "typeof",
            Token::KwIn => "in",
            Token::KwNew => "new",
            _ => return None,
        };
        Some(name.to_string())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Ident(name) => return write!(f, "identifier `{name}`"),
            Token::Int(n) => return write!(f, "number `{n}`"),
            Token::Float(n) => return write!(f, "number `{n}`"),
            Token::Str(_) => "string",
            Token::Template(_) => "template string",
            Token::KwTrue => "`true`",
            Token::KwFalse => "`false`",
            Token::KwNull => "`null`",
            Token::KwUndefined => "`undefined`",
            Token::KwTypeof => "`typeof`",
            Token::KwIn => "`in`",
            Token::KwNew => "`new`",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::Comma => "`,`",
            Token::Colon => "`:`",
            Token::Dot => "`.`",
            Token::QuestionDot => "`?.`",
            Token::Question => "`?`",
            Token::QuestionQuestion => "`??`",
            Token::Ellipsis => "`...`",
            Token::Arrow => "`=>`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::StarStar => "`**`",
            Token::Slash => "`/`",
            Token::Percent => "`%`",
            Token::Bang => "`!`",
            Token::EqEq => "`==`",
            Token::NotEq => "`!=`",
            Token::EqEqEq => "`===`",
            Token::NotEqEq => "`!==`",
            Token::Lt => "`<`",
            Token::Le => "`<=`",
            Token::Gt => "`>`",
            Token::Ge => "`>=`",
            Token::AndAnd => "`&&`",
            Token::OrOr => "`||`",
            Token::Eof => "end of expression",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub span: Span,
}
