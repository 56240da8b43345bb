//! End-to-end compilation from query text to SQL.
//!
//! ```text
//! Query text → Parse → Index (phase 1) → Build (phase 2) → Bind → Split → SQL AST
//! ```
//!
//! # Example
//!
//! ```ignore
//! use orql::compile::compile;
//! use orql::metadata::InMemoryMetadata;
//! use orql::sql::ConverterOptions;
//!
//! let metadata = InMemoryMetadata::load("model.toml".as_ref())?;
//! let ast = compile(
//!     "select a from Account a where a.id = :id",
//!     &metadata,
//!     &ConverterOptions::default(),
//! )?;
//! for plan in ast.query_plans() {
//!     println!("{}", plan.sql);
//! }
//! ```

use crate::metadata::MetadataProvider;
use crate::parse::{self, Diagnostic};
use crate::semantic::{
    build_statement, index_statement, infer_parameter_types, ParsingContext, SemanticError,
    Statement,
};
use crate::sql::{convert, ConversionError, ConverterOptions, SqlAst};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
///
/// Syntax errors carry every parser diagnostic; semantic and conversion
/// errors stop at the first problem.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Syntax error: {}", join_diagnostics(.0))]
    Syntax(Vec<Diagnostic>),

    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

pub type CompileResult<T> = Result<T, CompileError>;

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Parse and analyze a query into a semantic tree.
///
/// Parameter types are inferred before returning. Polymorphic statements
/// are returned unsplit.
pub fn interpret(source: &str, metadata: &dyn MetadataProvider) -> CompileResult<Statement> {
    // Step 1: Parse
    let parsed = parse::parse(source)
        .into_result()
        .map_err(CompileError::Syntax)?;

    // Step 2: Register from-clauses and aliases
    let mut context = ParsingContext::new(metadata);
    index_statement(&parsed, &mut context)?;

    // Step 3: Build the semantic tree
    let mut statement = build_statement(&parsed, &context)?;

    // Step 4: Fill in deferred parameter types
    infer_parameter_types(&mut statement);

    tracing::debug!(
        parameters = statement.parameters().len(),
        "interpreted query"
    );
    Ok(statement)
}

/// Compile a query to SQL: one statement per implementor of a polymorphic
/// root, one otherwise.
pub fn compile(
    source: &str,
    metadata: &dyn MetadataProvider,
    options: &ConverterOptions,
) -> CompileResult<SqlAst> {
    let statement = interpret(source, metadata)?;
    Ok(convert(&statement, metadata, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityDefinition, InMemoryMetadata};
    use crate::semantic::SemanticErrorKind;

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::builder()
            .entity(
                EntityDefinition::new("Account")
                    .table("accounts")
                    .attribute("id", "long")
                    .attribute("name", "string"),
            )
            .build()
            .expect("valid model")
    }

    #[test]
    fn test_syntax_errors_are_reported_as_syntax() {
        let err = interpret("from Account a where", &metadata()).unwrap_err();
        match err {
            CompileError::Syntax(diagnostics) => assert!(!diagnostics.is_empty()),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_semantic_errors_are_reported_as_semantic() {
        let err = interpret("from Account a where a.missing = 1", &metadata()).unwrap_err();
        match err {
            CompileError::Semantic(e) => {
                assert_eq!(e.kind(), SemanticErrorKind::UnresolvedAttribute)
            }
            other => panic!("expected semantic error, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_simple_query() {
        let ast = compile(
            "select a.name from Account a where a.id = :id",
            &metadata(),
            &ConverterOptions::default(),
        )
        .unwrap();

        let plans = ast.query_plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(
            plans[0].sql,
            "SELECT \"a_0\".\"name\" FROM \"accounts\" AS \"a_0\" WHERE \"a_0\".\"id\" = ?"
        );
        assert_eq!(plans[0].binders.len(), 1);
        assert_eq!(plans[0].binders[0].position, 1);
    }
}
