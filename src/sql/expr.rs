//! SQL expression tree.
//!
//! Lowering builds these with the free constructors ([`table_col`],
//! [`lit_int`], ...) and the [`ExprExt`] combinators, then writes them into
//! a [`TokenStream`]. Parentheses are inserted from operator precedence, so
//! the tree never needs an explicit grouping node.

use crate::semantic::tree::Parameter;

use super::query::Query;
use super::token::{Keyword, Token, TokenStream};

// =============================================================================
// Expression tree
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `[table.]column`
    Column {
        table: Option<String>,
        column: String,
    },
    Literal(Literal),
    /// A bound query parameter, rendered as `?`
    Parameter(Parameter),
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    InList {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    /// `*`, only as a function argument
    Star,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    /// Binding strength; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Lte
            | BinaryOperator::Gt
            | BinaryOperator::Gte => 3,
            BinaryOperator::Plus | BinaryOperator::Minus => 4,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 5,
        }
    }

    /// `a op (b op c)` equals `(a op b) op c`.
    fn is_associative(self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Plus | BinaryOperator::Mul
        )
    }

    fn token(self) -> Token {
        match self {
            BinaryOperator::And => Token::Keyword(Keyword::And),
            BinaryOperator::Or => Token::Keyword(Keyword::Or),
            BinaryOperator::Eq => Token::Symbol("="),
            BinaryOperator::Ne => Token::Symbol("<>"),
            BinaryOperator::Lt => Token::Symbol("<"),
            BinaryOperator::Lte => Token::Symbol("<="),
            BinaryOperator::Gt => Token::Symbol(">"),
            BinaryOperator::Gte => Token::Symbol(">="),
            BinaryOperator::Plus => Token::Symbol("+"),
            BinaryOperator::Minus => Token::Symbol("-"),
            BinaryOperator::Mul => Token::Symbol("*"),
            BinaryOperator::Div => Token::Symbol("/"),
            BinaryOperator::Mod => Token::Symbol("%"),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

impl Expr {
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        self.write(&mut ts);
        ts
    }

    pub(crate) fn write(&self, ts: &mut TokenStream) {
        match self {
            Expr::Column { table, column } => {
                if let Some(table) = table {
                    ts.ident(table).symbol(".");
                }
                ts.ident(column);
            }

            Expr::Literal(literal) => {
                ts.push(match literal {
                    Literal::Int(n) => Token::Int(*n),
                    Literal::Float(x) => Token::Float(*x),
                    Literal::String(s) => Token::Str(s.clone()),
                    Literal::Bool(true) => Token::Keyword(Keyword::True),
                    Literal::Bool(false) => Token::Keyword(Keyword::False),
                    Literal::Null => Token::Keyword(Keyword::Null),
                });
            }

            Expr::Parameter(parameter) => {
                ts.push(Token::Placeholder(parameter.clone()));
            }

            Expr::Binary { left, op, right } => {
                write_operand(ts, left, *op, false);
                ts.space().push(op.token()).space();
                write_operand(ts, right, *op, true);
            }

            Expr::Not(inner) => {
                ts.keyword(Keyword::Not).space();
                write_grouped(ts, inner);
            }

            Expr::Negate(inner) => {
                ts.symbol("-");
                write_grouped(ts, inner);
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::Function(name.clone())).symbol("(");
                if *distinct {
                    ts.keyword(Keyword::Distinct).space();
                }
                write_list(ts, args);
                ts.symbol(")");
            }

            // `x IN ()` is not valid SQL; an empty list never matches.
            Expr::InList {
                values, negated, ..
            } if values.is_empty() => {
                ts.keyword(if *negated { Keyword::True } else { Keyword::False });
            }

            Expr::InList {
                expr,
                values,
                negated,
            } => {
                expr.write(ts);
                write_negation(ts, *negated);
                ts.space().keyword(Keyword::In).space().symbol("(");
                write_list(ts, values);
                ts.symbol(")");
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                expr.write(ts);
                write_negation(ts, *negated);
                ts.space().keyword(Keyword::In).space().symbol("(");
                subquery.write(ts);
                ts.symbol(")");
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                expr.write(ts);
                write_negation(ts, *negated);
                ts.space().keyword(Keyword::Between).space();
                low.write(ts);
                ts.space().keyword(Keyword::And).space();
                high.write(ts);
            }

            Expr::IsNull { expr, negated } => {
                expr.write(ts);
                ts.space().keyword(if *negated {
                    Keyword::IsNotNull
                } else {
                    Keyword::IsNull
                });
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                expr.write(ts);
                write_negation(ts, *negated);
                ts.space().keyword(Keyword::Like).space();
                pattern.write(ts);
            }

            Expr::Star => {
                ts.symbol("*");
            }
        }
    }
}

fn write_negation(ts: &mut TokenStream, negated: bool) {
    if negated {
        ts.space().keyword(Keyword::Not);
    }
}

fn write_list(ts: &mut TokenStream, exprs: &[Expr]) {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            ts.separator();
        }
        expr.write(ts);
    }
}

/// Operand of a unary operator: anything compound gets parentheses.
fn write_grouped(ts: &mut TokenStream, expr: &Expr) {
    if matches!(expr, Expr::Binary { .. }) {
        ts.symbol("(");
        expr.write(ts);
        ts.symbol(")");
    } else {
        expr.write(ts);
    }
}

/// Operands binding looser than `parent` need parentheses; a right operand
/// also needs them at equal strength unless the operator is associative
/// (`a - (b - c)`).
fn write_operand(ts: &mut TokenStream, operand: &Expr, parent: BinaryOperator, right_side: bool) {
    let grouped = match operand {
        Expr::Binary { op, .. } => {
            op.precedence() < parent.precedence()
                || (right_side
                    && op.precedence() == parent.precedence()
                    && !(*op == parent && parent.is_associative()))
        }
        _ => false,
    };
    if grouped {
        ts.symbol("(");
        operand.write(ts);
        ts.symbol(")");
    } else {
        operand.write(ts);
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(x: f64) -> Expr {
    Expr::Literal(Literal::Float(x))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![Expr::Star],
        distinct: false,
    }
}

/// AND together a list of conditions; `None` when the list is empty.
pub fn conjunction(conditions: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    conditions.into_iter().reduce(|acc, next| acc.and(next))
}

// =============================================================================
// Combinators
// =============================================================================

pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::Binary {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    fn not(self) -> Expr {
        Expr::Not(Box::new(self.into_expr()))
    }

    fn in_subquery(self, subquery: Query, negated: bool) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: Box::new(subquery),
            negated,
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n.into())
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}
