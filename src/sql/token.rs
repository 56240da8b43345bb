//! SQL tokens, the atomic units of SQL output.
//!
//! Every statement is written into a [`TokenStream`] first and only then
//! rendered, so placeholders keep the parameter they bind until the very
//! end. Rendering is generic ANSI SQL: double-quoted identifiers,
//! single-quoted strings and anonymous `?` placeholders.

use std::fmt;

use crate::semantic::tree::Parameter;

/// Reserved words used by generated statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    Distinct,
    From,
    Where,
    As,
    On,
    Join,
    Inner,
    LeftOuter,
    Cross,
    OrderBy,
    Asc,
    Desc,
    And,
    Or,
    Not,
    In,
    Between,
    Like,
    IsNull,
    IsNotNull,
    True,
    False,
    Null,
    Update,
    Set,
    DeleteFrom,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::Distinct => "DISTINCT",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::As => "AS",
            Keyword::On => "ON",
            Keyword::Join => "JOIN",
            Keyword::Inner => "INNER",
            Keyword::LeftOuter => "LEFT OUTER",
            Keyword::Cross => "CROSS",
            Keyword::OrderBy => "ORDER BY",
            Keyword::Asc => "ASC",
            Keyword::Desc => "DESC",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::In => "IN",
            Keyword::Between => "BETWEEN",
            Keyword::Like => "LIKE",
            Keyword::IsNull => "IS NULL",
            Keyword::IsNotNull => "IS NOT NULL",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Null => "NULL",
            Keyword::Update => "UPDATE",
            Keyword::Set => "SET",
            Keyword::DeleteFrom => "DELETE FROM",
        }
    }
}

/// One element of generated SQL.
///
/// Adding a variant forces every renderer to handle it (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    /// Punctuation or an operator, written as is.
    Symbol(&'static str),
    Space,
    /// Table, column or alias name; always quoted.
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// Function name, rendered upper-case.
    Function(String),
    /// A `?` placeholder. Carries the query parameter it binds so plans can
    /// list binders in placeholder order.
    Placeholder(Parameter),
    /// Text written without escaping.
    ///
    /// Only derived-table sub-selects from the model go through here; they
    /// are validated when the model is loaded. Never pass query input.
    Raw(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(keyword) => f.write_str(keyword.as_str()),
            Token::Symbol(symbol) => f.write_str(symbol),
            Token::Space => f.write_str(" "),
            Token::Ident(name) => write!(f, "\"{}\"", name.replace('"', "\"\"")),
            Token::Int(n) => write!(f, "{}", n),
            // Non-finite values have no SQL literal; lowering rejects them.
            Token::Float(x) if !x.is_finite() => f.write_str("NULL"),
            Token::Float(x) => f.write_str(ryu::Buffer::new().format_finite(*x)),
            Token::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Token::Function(name) => f.write_str(&name.to_uppercase()),
            Token::Placeholder(_) => f.write_str("?"),
            Token::Raw(text) => f.write_str(text),
        }
    }
}

/// A sequence of tokens, rendered to SQL with `to_string()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn keyword(&mut self, keyword: Keyword) -> &mut Self {
        self.push(Token::Keyword(keyword))
    }

    pub fn symbol(&mut self, symbol: &'static str) -> &mut Self {
        self.push(Token::Symbol(symbol))
    }

    pub fn ident(&mut self, name: &str) -> &mut Self {
        self.push(Token::Ident(name.to_string()))
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    /// `, `
    pub fn separator(&mut self) -> &mut Self {
        self.symbol(",").space()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Parameters of the `?` placeholders, in output order.
    pub fn placeholders(&self) -> impl Iterator<Item = &Parameter> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Placeholder(param) => Some(param),
            _ => None,
        })
    }
}

impl fmt::Display for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tokens.iter().try_for_each(|token| write!(f, "{}", token))
    }
}
