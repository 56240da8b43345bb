//! Parse tree for the object query language.
//!
//! The parse tree is a plain immutable value: both analysis phases walk the
//! same tree, so there is nothing to rewind between them. Every node that a
//! phase needs to find again is wrapped in [`Spanned`].

use crate::parse::span::Spanned;

// ============================================================================
// Statements
// ============================================================================

/// A complete parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// `[select ...] from ... [where ...] [order by ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub query: Spanned<QuerySpec>,
    pub order_by: Vec<Spanned<SortSpec>>,
}

/// `update Entity [alias] set path = expr, ... [where ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub target: Spanned<RootRef>,
    pub assignments: Vec<Spanned<Assignment>>,
    pub where_clause: Option<Spanned<Predicate>>,
}

/// `delete [from] Entity [alias] [where ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub target: Spanned<RootRef>,
    pub where_clause: Option<Spanned<Predicate>>,
}

/// A single `path = expr` assignment in an update statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Spanned<Path>,
    pub value: Spanned<Expr>,
}

// ============================================================================
// Query specification
// ============================================================================

/// The body shared by root queries and sub-queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub select: Option<Spanned<SelectClause>>,
    pub from: Spanned<FromClause>,
    pub where_clause: Option<Spanned<Predicate>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub selections: Vec<Spanned<Selection>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub expr: Spanned<Expr>,
    pub alias: Option<Spanned<String>>,
}

// ============================================================================
// From clause
// ============================================================================

/// `from space, space, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub spaces: Vec<Spanned<FromSpace>>,
}

/// One comma-separated from-clause item: a root reference and its joins.
#[derive(Debug, Clone, PartialEq)]
pub struct FromSpace {
    pub root: Spanned<RootRef>,
    pub joins: Vec<Spanned<Join>>,
}

/// A reference to a mapped type by (possibly qualified) name.
#[derive(Debug, Clone, PartialEq)]
pub struct RootRef {
    pub entity_name: Spanned<String>,
    pub alias: Option<Spanned<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    Cross,
}

/// A join inside a from-clause space.
///
/// The target is either an attribute path rooted at an alias
/// (`join o.items i`) or an entity name (`join Customer c on ...`); which one
/// is decided during from-clause indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub fetch: bool,
    pub target: Spanned<Path>,
    pub alias: Option<Spanned<String>>,
    pub predicate: Option<Spanned<Predicate>>,
}

// ============================================================================
// Expressions
// ============================================================================

/// A dotted identifier sequence with optional index operators.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub parts: Vec<PathPart>,
}

impl Path {
    /// The dotted form of the path, index operators rendered as `[]`.
    pub fn dotted(&self) -> String {
        self.parts
            .iter()
            .map(|p| {
                if p.index.is_some() {
                    format!("{}[]", p.name.value)
                } else {
                    p.name.value.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// True when no part carries an index operator.
    pub fn is_simple(&self) -> bool {
        self.parts.iter().all(|p| p.index.is_none())
    }
}

/// One segment of a [`Path`]: `name` or `name[expr]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPart {
    pub name: Spanned<String>,
    pub index: Option<Box<Spanned<Expr>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Decimal(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(Path),
    Literal(Literal),
    /// `:name`
    NamedParameter(String),
    /// `?` or `?N`
    PositionalParameter(Option<u32>),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    Negate(Box<Spanned<Expr>>),
    /// `name(arg)`, `name(distinct arg)` or `name(*)` (argument `None`)
    Function {
        name: Spanned<String>,
        distinct: bool,
        argument: Option<Box<Spanned<Expr>>>,
    },
}

// ============================================================================
// Predicates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Spanned<Predicate>>, Box<Spanned<Predicate>>),
    Or(Box<Spanned<Predicate>>, Box<Spanned<Predicate>>),
    Not(Box<Spanned<Predicate>>),
    Comparison {
        op: ComparisonOp,
        left: Spanned<Expr>,
        right: Spanned<Expr>,
    },
    InList {
        test: Spanned<Expr>,
        values: Vec<Spanned<Expr>>,
        negated: bool,
    },
    InSubQuery {
        test: Spanned<Expr>,
        sub_query: Box<Spanned<QuerySpec>>,
        negated: bool,
    },
    MemberOf {
        element: Spanned<Expr>,
        collection: Spanned<Path>,
        negated: bool,
    },
    IsNull {
        expr: Spanned<Expr>,
        negated: bool,
    },
    Like {
        expr: Spanned<Expr>,
        pattern: Spanned<Expr>,
        negated: bool,
    },
    Between {
        expr: Spanned<Expr>,
        low: Spanned<Expr>,
        high: Spanned<Expr>,
        negated: bool,
    },
}

// ============================================================================
// Order by
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub expr: Spanned<Expr>,
    pub order: Option<SortOrder>,
}
