//! SQL generation module.
//!
//! Lowering turns a semantic [`Statement`](crate::semantic::Statement) into
//! an [`SqlAst`], which renders through a small type-safe builder:
//!
//! - [`converter`] - semantic tree to SQL AST
//! - [`ast`] - table spaces, table groups and statements
//! - [`plan`] - SQL text plus parameter binders
//! - [`query`] - flat SELECT rendering
//! - [`expr`] - expression tree and combinators
//! - [`dml`] - bulk UPDATE and DELETE
//! - [`token`] - tokens and their rendering

pub mod ast;
pub mod converter;
pub mod dml;
pub mod error;
pub mod expr;
pub mod plan;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use ast::{
    ColumnBinding, SqlAst, SqlSelect, SqlStatement, TableGroup, TableGroupJoin, TableSpace,
    TableSpecification, TableSpecificationJoin,
};
pub use converter::{convert, ConverterOptions, SecondaryTableJoinPolicy};
pub use error::{ConversionError, ConversionResult};
pub use expr::{
    col, conjunction, count_star, lit_bool, lit_float, lit_int, lit_null, lit_str, table_col,
    BinaryOperator, Expr, ExprExt, Literal,
};
pub use plan::{ParameterBinder, QueryPlan};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Keyword, Token, TokenStream};

pub use dml::{Delete, Update};
