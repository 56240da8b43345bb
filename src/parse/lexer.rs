//! Lexer for the object query language.
//!
//! Converts query text into a sequence of tokens with span information.
//! Keywords are matched case-insensitively (`SELECT`, `select` and `Select`
//! are the same token); identifiers keep their original spelling.

use chumsky::prelude::*;

/// A token in the object query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Clause Keywords
    // ========================================================================
    Select,
    Distinct,
    From,
    Where,
    Order,
    By,
    Asc,
    Desc,
    As,
    Update,
    Set,
    Delete,

    // ========================================================================
    // Join Keywords
    // ========================================================================
    Join,
    Inner,
    Left,
    Outer,
    Cross,
    Fetch,
    With,
    On,

    // ========================================================================
    // Predicate Keywords
    // ========================================================================
    And,
    Or,
    Not,
    In,
    Member,
    Of,
    Is,
    Null,
    Like,
    Between,
    True,
    False,

    // ========================================================================
    // Literals
    // ========================================================================
    /// An identifier (not a keyword).
    Ident(&'src str),
    /// A string literal (contents between the quotes, `''` still escaped).
    StringLit(&'src str),
    /// An integer or decimal number.
    Number(&'src str),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Select => write!(f, "select"),
            Token::Distinct => write!(f, "distinct"),
            Token::From => write!(f, "from"),
            Token::Where => write!(f, "where"),
            Token::Order => write!(f, "order"),
            Token::By => write!(f, "by"),
            Token::Asc => write!(f, "asc"),
            Token::Desc => write!(f, "desc"),
            Token::As => write!(f, "as"),
            Token::Update => write!(f, "update"),
            Token::Set => write!(f, "set"),
            Token::Delete => write!(f, "delete"),

            Token::Join => write!(f, "join"),
            Token::Inner => write!(f, "inner"),
            Token::Left => write!(f, "left"),
            Token::Outer => write!(f, "outer"),
            Token::Cross => write!(f, "cross"),
            Token::Fetch => write!(f, "fetch"),
            Token::With => write!(f, "with"),
            Token::On => write!(f, "on"),

            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
            Token::Member => write!(f, "member"),
            Token::Of => write!(f, "of"),
            Token::Is => write!(f, "is"),
            Token::Null => write!(f, "null"),
            Token::Like => write!(f, "like"),
            Token::Between => write!(f, "between"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),

            Token::Ident(s) => write!(f, "{}", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::Number(s) => write!(f, "{}", s),

            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Question => write!(f, "?"),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
        }
    }
}

/// Map an identifier string to a keyword token or return Ident.
fn keyword_or_ident(s: &str) -> Token<'_> {
    match s.to_ascii_lowercase().as_str() {
        "select" => Token::Select,
        "distinct" => Token::Distinct,
        "from" => Token::From,
        "where" => Token::Where,
        "order" => Token::Order,
        "by" => Token::By,
        "asc" => Token::Asc,
        "desc" => Token::Desc,
        "as" => Token::As,
        "update" => Token::Update,
        "set" => Token::Set,
        "delete" => Token::Delete,

        "join" => Token::Join,
        "inner" => Token::Inner,
        "left" => Token::Left,
        "outer" => Token::Outer,
        "cross" => Token::Cross,
        "fetch" => Token::Fetch,
        "with" => Token::With,
        "on" => Token::On,

        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "member" => Token::Member,
        "of" => Token::Of,
        "is" => Token::Is,
        "null" => Token::Null,
        "like" => Token::Like,
        "between" => Token::Between,
        "true" => Token::True,
        "false" => Token::False,

        _ => Token::Ident(s),
    }
}

/// Create a lexer for the object query language.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace and comments.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let ident = text::ident().map(keyword_or_ident);

    // 'it''s' keeps the doubled quote; the parser unescapes it
    let string_lit = just('\'')
        .ignore_then(
            choice((just("''").ignored(), none_of('\'').ignored()))
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''))
        .map(Token::StringLit);

    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(Token::Number);

    // Multi-char symbols first
    let symbol = choice((
        just("<>").to(Token::Ne),
        just("!=").to(Token::Ne),
        just("<=").to(Token::Le),
        just(">=").to(Token::Ge),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just(':').to(Token::Colon),
        just('?').to(Token::Question),
        just('=').to(Token::Eq),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let line_comment = just("--")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();

    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();

    let comment = line_comment.or(block_comment);

    let token = choice((ident, string_lit, number, symbol)).map_with(|tok, e| (tok, e.span()));

    token
        .padded_by(comment.padded().repeated())
        .padded()
        .repeated()
        .collect()
        .padded_by(comment.padded().repeated())
        .padded()
        .then_ignore(end())
}

impl Token<'_> {
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            Token::Ident(_)
                | Token::StringLit(_)
                | Token::Number(_)
                | Token::LParen
                | Token::RParen
                | Token::LBracket
                | Token::RBracket
                | Token::Comma
                | Token::Dot
                | Token::Colon
                | Token::Question
                | Token::Eq
                | Token::Ne
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Percent
        )
    }
}

/// Turn keywords that sit in name positions back into identifiers.
///
/// Entity and attribute names may collide with keywords (`from Order o`,
/// `o.set`). A keyword is re-read from the source as an identifier when it
/// directly follows `.`, `from`, `join`, `fetch`, `update` or `delete`, or a
/// comma separating from-clause spaces. `join fetch` and `delete from` keep
/// their keyword.
pub fn soften_keywords<'src>(
    source: &'src str,
    tokens: Vec<(Token<'src>, SimpleSpan)>,
) -> Vec<(Token<'src>, SimpleSpan)> {
    let mut out: Vec<(Token<'src>, SimpleSpan)> = Vec::with_capacity(tokens.len());
    // Whether each open parenthesis level is currently inside a from-clause.
    let mut in_from = vec![false];
    for (token, span) in tokens {
        let inside_from = in_from.last().copied().unwrap_or(false);
        let name_position = match out.last() {
            Some((Token::Dot, _)) => true,
            Some((Token::Comma, _)) => inside_from,
            Some((Token::From | Token::Join | Token::Fetch | Token::Update, _)) => {
                token != Token::Fetch
            }
            Some((Token::Delete, _)) => token != Token::From,
            _ => false,
        };
        let token = match source.get(span.start..span.end) {
            Some(text) if name_position && token.is_keyword() => Token::Ident(text),
            _ => token,
        };

        match token {
            Token::LParen => in_from.push(false),
            Token::RParen if in_from.len() > 1 => {
                in_from.pop();
            }
            Token::From => set_last(&mut in_from, true),
            Token::Select | Token::Where | Token::Order | Token::Set => set_last(&mut in_from, false),
            _ => {}
        }
        out.push((token, span));
    }
    out
}

fn set_last(levels: &mut [bool], value: bool) {
    if let Some(last) = levels.last_mut() {
        *last = value;
    }
}

/// Lex a source string into tokens.
///
/// Returns Ok with the token list on success, or Err with the lexer errors.
/// Keywords in name positions are already softened to identifiers.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(soften_keywords(source, tokens.unwrap_or_default()))
    } else {
        Err(errs)
    }
}
