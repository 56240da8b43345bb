//! Semantic analysis of parsed queries.
//!
//! Analysis runs in two phases over the same immutable parse tree:
//!
//! 1. **Index** - register every from-clause and from-element, with explicit
//!    or generated aliases ([`indexer`])
//! 2. **Build** - resolve paths, parameters and functions into the semantic
//!    query tree ([`builder`])
//!
//! followed by [`binding`], which fills in parameter types that the tree
//! leaves deferred. [`splitter`] turns a statement over a polymorphic root
//! into one statement per implementor.
//!
//! All per-compilation state lives in a [`ParsingContext`]; nothing is
//! shared between compilations except the metadata provider.

pub mod alias;
pub mod binding;
pub mod builder;
pub mod context;
pub mod error;
pub mod from_clause;
pub mod indexer;
pub mod splitter;
pub mod tree;

pub use alias::AliasGenerator;
pub use binding::infer_parameter_types;
pub use builder::build_statement;
pub use context::ParsingContext;
pub use error::{SemanticError, SemanticErrorKind, SemanticResult};
pub use from_clause::{
    FromClauseId, FromClauseIndex, FromClauseScope, FromElement, FromElementId, FromElementOrigin,
};
pub use indexer::index_statement;
pub use splitter::split;
pub use tree::Statement;
