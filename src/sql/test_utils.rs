//! Test utilities for SQL emission validation.
//!
//! Provides helpers for validating that emitted SQL is syntactically correct
//! using sqlparser-rs for roundtrip validation.

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Validates that a SQL string parses as generic ANSI SQL.
///
/// `?` placeholders are accepted by the generic dialect.
///
/// # Example
///
/// ```ignore
/// use crate::sql::test_utils::validate_sql;
///
/// validate_sql("SELECT * FROM \"users\"").unwrap();
/// ```
pub fn validate_sql(sql: &str) -> Result<(), String> {
    Parser::parse_sql(&GenericDialect {}, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL: {}\nSQL: {}", e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM users").unwrap();
        validate_sql("SELECT \"a_0\".\"id\" FROM \"accounts\" AS \"a_0\" WHERE \"a_0\".\"id\" = ?")
            .unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM users");
        assert!(result.is_err());
    }
}
