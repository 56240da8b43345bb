//! SELECT queries.
//!
//! A [`Query`] is the flat, render-ready form of a select: one FROM table
//! followed by a join list. Table groups and spaces are flattened into it by
//! [`SqlSelect::to_query`](super::ast::SqlSelect::to_query).

use std::fmt;

use super::expr::{Expr, ExprExt};
use super::token::{Keyword, Token, TokenStream};

/// A SELECT list item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn write(&self, ts: &mut TokenStream) {
        self.expr.write(ts);
        write_alias(ts, self.alias.as_deref());
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

fn write_alias(ts: &mut TokenStream, alias: Option<&str>) {
    if let Some(alias) = alias {
        ts.space().keyword(Keyword::As).space().ident(alias);
    }
}

/// A table, or a derived table holding parenthesized sub-select text, with
/// an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
    pub derived: bool,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            alias: None,
            derived: false,
        }
    }

    /// A `(select ...)` source, written verbatim. The text must already be
    /// validated.
    pub fn derived(sql: &str) -> Self {
        Self {
            table: sql.trim().into(),
            alias: None,
            derived: true,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn write(&self, ts: &mut TokenStream) {
        if self.derived {
            ts.push(Token::Raw(self.table.clone()));
        } else {
            ts.ident(&self.table);
        }
        write_alias(ts, self.alias.as_deref());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    /// LEFT OUTER
    Left,
    Cross,
}

impl JoinType {
    fn keyword(self) -> Keyword {
        match self {
            JoinType::Inner => Keyword::Inner,
            JoinType::Left => Keyword::LeftOuter,
            JoinType::Cross => Keyword::Cross,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Expr>,
}

impl Join {
    fn write(&self, ts: &mut TokenStream) {
        ts.keyword(self.join_type.keyword())
            .space()
            .keyword(Keyword::Join)
            .space();
        self.table.write(ts);
        if let Some(on) = &self.on {
            ts.space().keyword(Keyword::On).space();
            on.write(ts);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }

    fn write(&self, ts: &mut TokenStream) {
        self.expr.write(ts);
        ts.space().keyword(match self.dir {
            SortDir::Asc => Keyword::Asc,
            SortDir::Desc => Keyword::Desc,
        });
    }
}

/// A SELECT statement, rendered on a single line.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "a query does nothing until rendered"]
pub struct Query {
    pub distinct: bool,
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Option<Expr>) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        self.write(&mut ts);
        ts
    }

    pub(crate) fn write(&self, ts: &mut TokenStream) {
        ts.keyword(Keyword::Select);
        if self.distinct {
            ts.space().keyword(Keyword::Distinct);
        }
        for (i, item) in self.select.iter().enumerate() {
            if i == 0 {
                ts.space();
            } else {
                ts.separator();
            }
            item.write(ts);
        }

        if let Some(from) = &self.from {
            ts.space().keyword(Keyword::From).space();
            from.write(ts);
        }
        for join in &self.joins {
            ts.space();
            join.write(ts);
        }

        write_where(ts, self.where_clause.as_ref());

        for (i, item) in self.order_by.iter().enumerate() {
            if i == 0 {
                ts.space().keyword(Keyword::OrderBy).space();
            } else {
                ts.separator();
            }
            item.write(ts);
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tokens())
    }
}

/// ` WHERE <filter>` when there is one.
pub(crate) fn write_where(ts: &mut TokenStream, filter: Option<&Expr>) {
    if let Some(filter) = filter {
        ts.space().keyword(Keyword::Where).space();
        filter.write(ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, lit_int, table_col};
    use crate::sql::test_utils::validate_sql;

    #[test]
    fn test_simple_select() {
        let query = Query::new()
            .select(vec![table_col("c_0", "id"), table_col("c_0", "name")])
            .from(TableRef::new("customers").with_alias("c_0"));

        let sql = query.to_string();
        assert_eq!(
            sql,
            "SELECT \"c_0\".\"id\", \"c_0\".\"name\" FROM \"customers\" AS \"c_0\""
        );
        validate_sql(&sql).unwrap();
    }

    #[test]
    fn test_joins_render_in_order() {
        let query = Query::new()
            .select(vec![table_col("o_0", "id")])
            .from(TableRef::new("orders").with_alias("o_0"))
            .join(
                JoinType::Inner,
                TableRef::new("customers").with_alias("c_0"),
                Some(table_col("o_0", "customer_id").eq(table_col("c_0", "id"))),
            )
            .join(
                JoinType::Left,
                TableRef::new("order_notes").with_alias("o_1"),
                Some(table_col("o_0", "id").eq(table_col("o_1", "id"))),
            )
            .join(JoinType::Cross, TableRef::new("funds").with_alias("f_0"), None);

        let sql = query.to_string();
        assert_eq!(
            sql,
            "SELECT \"o_0\".\"id\" FROM \"orders\" AS \"o_0\" \
             INNER JOIN \"customers\" AS \"c_0\" ON \"o_0\".\"customer_id\" = \"c_0\".\"id\" \
             LEFT OUTER JOIN \"order_notes\" AS \"o_1\" ON \"o_0\".\"id\" = \"o_1\".\"id\" \
             CROSS JOIN \"funds\" AS \"f_0\""
        );
        validate_sql(&sql).unwrap();
    }

    #[test]
    fn test_filter_ands_conditions() {
        let query = Query::new()
            .select(vec![col("id")])
            .from(TableRef::new("t"))
            .filter(col("a").eq(lit_int(1)))
            .filter(col("b").eq(lit_int(2)));

        assert!(query.to_string().ends_with("WHERE \"a\" = 1 AND \"b\" = 2"));
    }

    #[test]
    fn test_derived_table() {
        let query = Query::new()
            .select(vec![table_col("s_0", "id")])
            .from(TableRef::derived("  (select id from summaries) ").with_alias("s_0"));

        let sql = query.to_string();
        assert_eq!(
            sql,
            "SELECT \"s_0\".\"id\" FROM (select id from summaries) AS \"s_0\""
        );
        validate_sql(&sql).unwrap();
    }

    #[test]
    fn test_distinct_and_order_by() {
        let mut query = Query::new()
            .select(vec![SelectExpr::new(col("name")).with_alias("n")])
            .from(TableRef::new("t"));
        query.distinct = true;
        query.order_by = vec![OrderByExpr::desc(col("name")), OrderByExpr::asc(col("id"))];

        assert_eq!(
            query.to_string(),
            "SELECT DISTINCT \"name\" AS \"n\" FROM \"t\" ORDER BY \"name\" DESC, \"id\" ASC"
        );
    }
}
