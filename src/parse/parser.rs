//! Parser for the object query language using chumsky.
//!
//! Transforms the token stream produced by the lexer into the parse tree in
//! [`super::ast`]. Like the lexer, every parser here is generic over any
//! `ValueInput` yielding [`Token`]s with `SimpleSpan` spans.

use chumsky::input::ValueInput;
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::Token;
use super::span::Spanned;

type ParserError<'tokens, 'src> = extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>;

/// Convert a SimpleSpan to our Span type (Range<usize>)
fn to_span(span: SimpleSpan) -> std::ops::Range<usize> {
    span.start..span.end
}

/// Create the statement parser.
///
/// Accepts exactly one `select`, `update` or `delete` statement followed by
/// end of input.
pub fn parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Statement, ParserError<'tokens, 'src>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    let expr = expression().boxed();
    let predicate = predicate(expr.clone()).boxed();
    let query_spec = query_spec(expr.clone(), predicate.clone());

    // ==========================================================================
    // Select: query spec + order by
    // ==========================================================================

    let sort_order = choice((
        just(Token::Asc).to(SortOrder::Ascending),
        just(Token::Desc).to(SortOrder::Descending),
    ));

    let sort_spec = expr
        .clone()
        .then(sort_order.or_not())
        .map_with(|(expr, order), e| Spanned::new(SortSpec { expr, order }, to_span(e.span())));

    let order_by = just(Token::Order)
        .ignore_then(just(Token::By))
        .ignore_then(
            sort_spec
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .or_not()
        .map(Option::unwrap_or_default);

    let select = query_spec
        .then(order_by)
        .map(|(query, order_by)| Statement::Select(SelectStatement { query, order_by }));

    // ==========================================================================
    // Update / delete
    // ==========================================================================

    let where_clause = just(Token::Where).ignore_then(predicate.clone());

    let assignment = path(expr.clone())
        .map_with(|p, e| Spanned::new(p, to_span(e.span())))
        .then_ignore(just(Token::Eq))
        .then(expr.clone())
        .map_with(|(target, value), e| {
            Spanned::new(Assignment { target, value }, to_span(e.span()))
        });

    let update = just(Token::Update)
        .ignore_then(root_ref())
        .then_ignore(just(Token::Set))
        .then(
            assignment
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then(where_clause.clone().or_not())
        .map(|((target, assignments), where_clause)| {
            Statement::Update(UpdateStatement {
                target,
                assignments,
                where_clause,
            })
        });

    let delete = just(Token::Delete)
        .ignore_then(just(Token::From).or_not())
        .ignore_then(root_ref())
        .then(where_clause.or_not())
        .map(|(target, where_clause)| Statement::Delete(DeleteStatement { target, where_clause }));

    choice((select, update, delete)).then_ignore(end())
}

fn ident<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, String, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    select! {
        Token::Ident(s) => s.to_string(),
    }
    .labelled("identifier")
}

fn spanned_ident<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Spanned<String>, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    ident().map_with(|n, e| Spanned::new(n, to_span(e.span())))
}

/// `[as] alias`
fn alias<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Spanned<String>, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    just(Token::As).or_not().ignore_then(spanned_ident())
}

/// `com.example.Entity [as] alias`
fn root_ref<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Spanned<RootRef>, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    let entity_name = ident()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|parts, e| Spanned::new(parts.join("."), to_span(e.span())))
        .labelled("entity name");

    entity_name
        .then(alias().or_not())
        .map_with(|(entity_name, alias), e| {
            Spanned::new(RootRef { entity_name, alias }, to_span(e.span()))
        })
}

/// `a.b[expr].c`
fn path<'tokens, 'src: 'tokens, I, E>(
    expr: E,
) -> impl Parser<'tokens, I, Path, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
    E: Parser<'tokens, I, Spanned<Expr>, ParserError<'tokens, 'src>> + Clone + 'tokens,
{
    let index = expr.delimited_by(just(Token::LBracket), just(Token::RBracket));

    spanned_ident()
        .then(index.or_not())
        .map(|(name, index)| PathPart {
            name,
            index: index.map(Box::new),
        })
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|parts| Path { parts })
}

// ==========================================================================
// Expressions
// ==========================================================================

fn expression<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Spanned<Expr>, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    recursive(|expr| {
        let number = select! {
            Token::Number(n) => n,
        }
        .try_map(|n: &str, span| {
            if n.contains('.') {
                n.parse::<f64>()
                    .map(Literal::Decimal)
                    .map_err(|err| Rich::custom(span, format!("invalid decimal '{}': {}", n, err)))
            } else {
                n.parse::<i64>()
                    .map(Literal::Integer)
                    .map_err(|err| Rich::custom(span, format!("invalid integer '{}': {}", n, err)))
            }
        });

        let literal = choice((
            number,
            select! {
                Token::StringLit(s) => Literal::String(s.replace("''", "'")),
                Token::True => Literal::Boolean(true),
                Token::False => Literal::Boolean(false),
                Token::Null => Literal::Null,
            },
        ))
        .map(Expr::Literal)
        .labelled("literal");

        let named_parameter = just(Token::Colon)
            .ignore_then(ident())
            .map(Expr::NamedParameter);

        let ordinal = select! {
            Token::Number(n) => n,
        }
        .try_map(|n: &str, span| {
            n.parse::<u32>()
                .map_err(|err| Rich::custom(span, format!("invalid parameter position '{}': {}", n, err)))
        });

        let positional_parameter = just(Token::Question)
            .ignore_then(ordinal.or_not())
            .map(Expr::PositionalParameter);

        // name(arg) | name(distinct arg) | name(*)
        let function = spanned_ident()
            .then_ignore(just(Token::LParen))
            .then(just(Token::Distinct).or_not())
            .then(choice((
                just(Token::Star).to(None),
                expr.clone().map(|arg| Some(Box::new(arg))),
            )))
            .then_ignore(just(Token::RParen))
            .map(|((name, distinct), argument)| Expr::Function {
                name,
                distinct: distinct.is_some(),
                argument,
            });

        let atom = choice((
            literal,
            named_parameter,
            positional_parameter,
            function,
            path(expr.clone()).map(Expr::Path),
        ))
        .map_with(|ex, e| Spanned::new(ex, to_span(e.span())))
        .or(expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen)))
        .boxed();

        let unary = just(Token::Minus)
            .map_with(|_, e| to_span(e.span()))
            .repeated()
            .foldr(atom, |minus, operand: Spanned<Expr>| {
                let span = minus.start..operand.span.end;
                Spanned::new(Expr::Negate(Box::new(operand)), span)
            })
            .boxed();

        let product_op = choice((
            just(Token::Star).to(ArithmeticOp::Multiply),
            just(Token::Slash).to(ArithmeticOp::Divide),
            just(Token::Percent).to(ArithmeticOp::Modulo),
        ));

        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), fold_arithmetic)
            .boxed();

        let sum_op = choice((
            just(Token::Plus).to(ArithmeticOp::Add),
            just(Token::Minus).to(ArithmeticOp::Subtract),
        ));

        product
            .clone()
            .foldl(sum_op.then(product).repeated(), fold_arithmetic)
    })
}

fn fold_arithmetic(left: Spanned<Expr>, (op, right): (ArithmeticOp, Spanned<Expr>)) -> Spanned<Expr> {
    let span = left.span.start..right.span.end;
    Spanned::new(
        Expr::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

// ==========================================================================
// Predicates
// ==========================================================================


/// What follows the left-hand expression of a simple predicate.
enum PredicateTail {
    Comparison(ComparisonOp, Spanned<Expr>),
    IsNull { negated: bool },
    Negatable { negated: bool, tail: NegatableTail },
}

/// Predicate tails that accept a leading `not`.
enum NegatableTail {
    InList(Vec<Spanned<Expr>>),
    InSubQuery(Spanned<QuerySpec>),
    MemberOf(Spanned<Path>),
    Like(Spanned<Expr>),
    Between(Spanned<Expr>, Spanned<Expr>),
}

impl PredicateTail {
    fn complete(self, left: Spanned<Expr>) -> Predicate {
        match self {
            PredicateTail::Comparison(op, right) => Predicate::Comparison { op, left, right },
            PredicateTail::IsNull { negated } => Predicate::IsNull { expr: left, negated },
            PredicateTail::Negatable { negated, tail } => match tail {
                NegatableTail::InList(values) => Predicate::InList {
                    test: left,
                    values,
                    negated,
                },
                NegatableTail::InSubQuery(sub_query) => Predicate::InSubQuery {
                    test: left,
                    sub_query: Box::new(sub_query),
                    negated,
                },
                NegatableTail::MemberOf(collection) => Predicate::MemberOf {
                    element: left,
                    collection,
                    negated,
                },
                NegatableTail::Like(pattern) => Predicate::Like {
                    expr: left,
                    pattern,
                    negated,
                },
                NegatableTail::Between(low, high) => Predicate::Between {
                    expr: left,
                    low,
                    high,
                    negated,
                },
            },
        }
    }
}

fn predicate<'tokens, 'src: 'tokens, I, E>(
    expr: E,
) -> impl Parser<'tokens, I, Spanned<Predicate>, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
    E: Parser<'tokens, I, Spanned<Expr>, ParserError<'tokens, 'src>> + Clone + 'tokens,
{
    recursive(|predicate| {
        let sub_query = query_spec(expr.clone(), predicate.clone()).boxed();

        let comparison_op = select! {
            Token::Eq => ComparisonOp::Eq,
            Token::Ne => ComparisonOp::Ne,
            Token::Lt => ComparisonOp::Lt,
            Token::Le => ComparisonOp::Le,
            Token::Gt => ComparisonOp::Gt,
            Token::Ge => ComparisonOp::Ge,
        }
        .labelled("comparison operator");

        // A sub-query always starts with `select` or `from`, so it is tried
        // before the value list.
        let in_tail = just(Token::In).ignore_then(choice((
            sub_query
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(NegatableTail::InSubQuery),
            expr.clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(NegatableTail::InList),
        )));

        let member_of_tail = just(Token::Member)
            .ignore_then(just(Token::Of).or_not())
            .ignore_then(path(expr.clone()).map_with(|p, e| Spanned::new(p, to_span(e.span()))))
            .map(NegatableTail::MemberOf);

        let like_tail = just(Token::Like)
            .ignore_then(expr.clone())
            .map(NegatableTail::Like);

        let between_tail = just(Token::Between)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::And))
            .then(expr.clone())
            .map(|(low, high)| NegatableTail::Between(low, high));

        let tail = choice((
            comparison_op
                .then(expr.clone())
                .map(|(op, right)| PredicateTail::Comparison(op, right)),
            just(Token::Is)
                .ignore_then(just(Token::Not).or_not())
                .then_ignore(just(Token::Null))
                .map(|not| PredicateTail::IsNull { negated: not.is_some() }),
            just(Token::Not)
                .or_not()
                .then(choice((in_tail, member_of_tail, like_tail, between_tail)))
                .map(|(not, tail)| PredicateTail::Negatable {
                    negated: not.is_some(),
                    tail,
                }),
        ));

        let simple = expr
            .clone()
            .then(tail)
            .map_with(|(left, tail), e| Spanned::new(tail.complete(left), to_span(e.span())));

        let primary = simple
            .or(predicate
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)))
            .boxed();

        let negation = just(Token::Not)
            .map_with(|_, e| to_span(e.span()))
            .repeated()
            .foldr(primary, |not, operand: Spanned<Predicate>| {
                let span = not.start..operand.span.end;
                Spanned::new(Predicate::Not(Box::new(operand)), span)
            })
            .boxed();

        let conjunction = negation
            .clone()
            .foldl(just(Token::And).ignore_then(negation).repeated(), |left, right| {
                let span = left.span.start..right.span.end;
                Spanned::new(Predicate::And(Box::new(left), Box::new(right)), span)
            })
            .boxed();

        conjunction
            .clone()
            .foldl(just(Token::Or).ignore_then(conjunction).repeated(), |left, right| {
                let span = left.span.start..right.span.end;
                Spanned::new(Predicate::Or(Box::new(left), Box::new(right)), span)
            })
    })
}

// ==========================================================================
// Query specification
// ==========================================================================

fn query_spec<'tokens, 'src: 'tokens, I, E, P>(
    expr: E,
    predicate: P,
) -> impl Parser<'tokens, I, Spanned<QuerySpec>, ParserError<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
    E: Parser<'tokens, I, Spanned<Expr>, ParserError<'tokens, 'src>> + Clone + 'tokens,
    P: Parser<'tokens, I, Spanned<Predicate>, ParserError<'tokens, 'src>> + Clone + 'tokens,
{
    // select [distinct] expr [[as] alias], ...
    let selection = expr
        .clone()
        .then(alias().or_not())
        .map_with(|(expr, alias), e| Spanned::new(Selection { expr, alias }, to_span(e.span())));

    let select_clause = just(Token::Select)
        .ignore_then(just(Token::Distinct).or_not())
        .then(
            selection
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|(distinct, selections), e| {
            Spanned::new(
                SelectClause {
                    distinct: distinct.is_some(),
                    selections,
                },
                to_span(e.span()),
            )
        });

    // [inner | left [outer] | cross] join [fetch] path [[as] alias] [with | on predicate]
    let join_kind = choice((
        just(Token::Inner).to(JoinKind::Inner),
        just(Token::Left)
            .ignore_then(just(Token::Outer).or_not())
            .to(JoinKind::LeftOuter),
        just(Token::Cross).to(JoinKind::Cross),
    ))
    .or_not()
    .map(|kind| kind.unwrap_or(JoinKind::Inner));

    let join = join_kind
        .then_ignore(just(Token::Join))
        .then(just(Token::Fetch).or_not())
        .then(path(expr).map_with(|p, e| Spanned::new(p, to_span(e.span()))))
        .then(alias().or_not())
        .then(
            choice((just(Token::With), just(Token::On)))
                .ignore_then(predicate.clone())
                .or_not(),
        )
        .map_with(|((((kind, fetch), target), alias), predicate), e| {
            Spanned::new(
                Join {
                    kind,
                    fetch: fetch.is_some(),
                    target,
                    alias,
                    predicate,
                },
                to_span(e.span()),
            )
        });

    let from_space = root_ref()
        .then(join.repeated().collect::<Vec<_>>())
        .map_with(|(root, joins), e| Spanned::new(FromSpace { root, joins }, to_span(e.span())));

    let from_clause = just(Token::From)
        .ignore_then(
            from_space
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|spaces, e| Spanned::new(FromClause { spaces }, to_span(e.span())));

    let where_clause = just(Token::Where).ignore_then(predicate);

    select_clause
        .or_not()
        .then(from_clause)
        .then(where_clause.or_not())
        .map_with(|((select, from), where_clause), e| {
            Spanned::new(
                QuerySpec {
                    select,
                    from,
                    where_clause,
                },
                to_span(e.span()),
            )
        })
}
