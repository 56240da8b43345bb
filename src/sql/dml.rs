//! Bulk UPDATE and DELETE.
//!
//! Both address exactly one table by name, without an alias; column
//! references in the filter are qualified by that table name.

use super::expr::{Expr, ExprExt};
use super::query::write_where;
use super::token::{Keyword, TokenStream};

#[derive(Debug, Clone, PartialEq)]
#[must_use = "a statement does nothing until rendered"]
pub struct Update {
    pub table: String,
    /// `column = value`, in assignment order.
    pub assignments: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            filter: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, condition: Expr) -> Self {
        self.filter = Some(and_filter(self.filter.take(), condition));
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword(Keyword::Update).space().ident(&self.table);

        ts.space().keyword(Keyword::Set).space();
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                ts.separator();
            }
            ts.ident(column).space().symbol("=").space();
            value.write(&mut ts);
        }

        write_where(&mut ts, self.filter.as_ref());
        ts
    }
}

#[derive(Debug, Clone, PartialEq)]
#[must_use = "a statement does nothing until rendered"]
pub struct Delete {
    pub table: String,
    pub filter: Option<Expr>,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, condition: Expr) -> Self {
        self.filter = Some(and_filter(self.filter.take(), condition));
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword(Keyword::DeleteFrom).space().ident(&self.table);
        write_where(&mut ts, self.filter.as_ref());
        ts
    }
}

fn and_filter(existing: Option<Expr>, condition: Expr) -> Expr {
    match existing {
        Some(existing) => existing.and(condition),
        None => condition,
    }
}
