//! Parser for the object query language.
//!
//! Turns query text into a [`Statement`] parse tree. Queries are written
//! against mapped entity types and their attributes, not tables:
//!
//! - **Select**: `[select ...] from Entity alias [joins] [where ...] [order by ...]`
//! - **Joins**: `[inner | left [outer] | cross] join [fetch] path [alias] [with | on ...]`
//! - **Predicates**: comparisons, `in`, `member of`, `is null`, `like`, `between`
//! - **Update / delete**: single-entity bulk statements
//!
//! Lexing and parsing both recover from errors, so one call reports every
//! problem it can find. Any diagnostic means the statement is unusable.
//!
//! # Example
//!
//! ```ignore
//! use orql::parse;
//!
//! match parse::parse("select o from Order o where o.items[0].id = 1234").into_result() {
//!     Ok(statement) => println!("{:?}", statement),
//!     Err(diagnostics) => diagnostics.iter().for_each(|d| eprintln!("{}", d)),
//! }
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod span;

use std::fmt;

use chumsky::error::Rich;
use chumsky::input::Input as _;
use chumsky::span::{SimpleSpan, Span as _};
use chumsky::Parser as _;

pub use ast::*;
pub use span::{Span, Spanned};

/// A syntax error with the source range it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }

    fn from_rich<T: fmt::Display>(error: Rich<'_, T, SimpleSpan>) -> Self {
        let span = error.span();
        Self::new(span.start()..span.end(), error.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {:?})", self.message, self.span)
    }
}

impl std::error::Error for Diagnostic {}

/// Statement and diagnostics of one parse.
#[derive(Debug)]
pub struct ParseResult {
    pub statement: Option<Statement>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.statement.is_some() && self.diagnostics.is_empty()
    }

    /// The statement, or every diagnostic when parsing failed.
    pub fn into_result(self) -> Result<Statement, Vec<Diagnostic>> {
        match self.statement {
            Some(statement) if self.diagnostics.is_empty() => Ok(statement),
            _ => Err(self.diagnostics),
        }
    }
}

/// Lex and parse a query.
pub fn parse(source: &str) -> ParseResult {
    let (tokens, lex_errors) = lexer::lexer().parse(source).into_output_errors();
    let mut diagnostics: Vec<Diagnostic> =
        lex_errors.into_iter().map(Diagnostic::from_rich).collect();

    // Parsing a token stream with holes only produces follow-on errors.
    let tokens = match tokens {
        Some(tokens) if diagnostics.is_empty() => lexer::soften_keywords(source, tokens),
        _ => {
            return ParseResult {
                statement: None,
                diagnostics,
            }
        }
    };

    let end = source.len();
    let eoi: SimpleSpan = (end..end).into();
    let input = tokens
        .as_slice()
        .map(eoi, |(token, span): &(lexer::Token<'_>, SimpleSpan)| (token, span));
    let (statement, parse_errors) = parser::parser().parse(input).into_output_errors();
    diagnostics.extend(parse_errors.into_iter().map(Diagnostic::from_rich));

    tracing::trace!(
        diagnostics = diagnostics.len(),
        parsed = statement.is_some(),
        "parsed query"
    );

    ParseResult {
        statement,
        diagnostics,
    }
}
