//! # orql
//!
//! Compiles object queries, written against mapped entity types, to SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Query text                          │
//! │     select o from Order o where o.items[0].id = :id      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [parse]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Parse tree                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic: index, build, bind]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Semantic tree (typed, aliases resolved)         │
//! │          + metadata (entities, table shapes)             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic::split, sql::converter]
//! ┌─────────────────────────────────────────────────────────┐
//! │      SQL AST → SQL text + parameter binders              │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod config;
pub mod metadata;
pub mod parse;
pub mod semantic;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile, interpret, CompileError, CompileResult};
    pub use crate::metadata::{EntityDefinition, InMemoryMetadata, MetadataProvider};
    pub use crate::semantic::{SemanticError, SemanticErrorKind, Statement};
    pub use crate::sql::{
        ConversionError, ConverterOptions, ParameterBinder, QueryPlan, SecondaryTableJoinPolicy,
        SqlAst,
    };
}

// Also export at crate root for convenience
pub use compile::{compile, interpret, CompileError};
pub use sql::{ConverterOptions, QueryPlan, SqlAst};
