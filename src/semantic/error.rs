//! Error types for semantic analysis.
//!
//! Every semantic error is fatal to the compilation that raised it. Errors
//! are raised eagerly, at the point the offending node is built, and are
//! never conflated with syntax errors.

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// The category of a [`SemanticError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    DuplicateAlias,
    UnresolvedAttribute,
    AmbiguousAttribute,
    IllegalOperatorUse,
    UnresolvedType,
    ParsingContextMisuse,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    /// An alias was registered twice within one statement.
    #[error("Duplicate alias '{alias}'")]
    DuplicateAlias { alias: String },

    /// An attribute path segment does not exist.
    ///
    /// `owner` is the type searched, or `None` for an unqualified name that
    /// no from-element in scope exposes.
    #[error("{}", unresolved_message(.attribute, .owner.as_deref()))]
    UnresolvedAttribute {
        attribute: String,
        owner: Option<String>,
    },

    /// An unqualified attribute is exposed by more than one from-element.
    #[error("Ambiguous attribute '{attribute}' - exposed by: {}. Qualify it.", .aliases.join(", "))]
    AmbiguousAttribute {
        attribute: String,
        aliases: Vec<String>,
    },

    /// An operator applied where the operand type does not allow it
    /// (index access on a non-indexed collection, a cross join with a
    /// predicate, an unknown function, ...).
    #[error("Illegal operator use: {0}")]
    IllegalOperatorUse(String),

    /// An entity name that the metadata provider cannot resolve.
    #[error("Unknown entity type '{0}'")]
    UnresolvedType(String),

    /// Internal invariant violation in the tree builders. Not a user error.
    #[error("Internal error: {0}")]
    ParsingContextMisuse(String),
}

impl SemanticError {
    pub fn kind(&self) -> SemanticErrorKind {
        match self {
            SemanticError::DuplicateAlias { .. } => SemanticErrorKind::DuplicateAlias,
            SemanticError::UnresolvedAttribute { .. } => SemanticErrorKind::UnresolvedAttribute,
            SemanticError::AmbiguousAttribute { .. } => SemanticErrorKind::AmbiguousAttribute,
            SemanticError::IllegalOperatorUse(_) => SemanticErrorKind::IllegalOperatorUse,
            SemanticError::UnresolvedType(_) => SemanticErrorKind::UnresolvedType,
            SemanticError::ParsingContextMisuse(_) => SemanticErrorKind::ParsingContextMisuse,
        }
    }

    /// True for errors that indicate a bug rather than a bad query.
    pub fn is_internal(&self) -> bool {
        self.kind() == SemanticErrorKind::ParsingContextMisuse
    }

    pub(crate) fn unresolved_attribute(attribute: &str, owner: Option<&str>) -> Self {
        SemanticError::UnresolvedAttribute {
            attribute: attribute.to_string(),
            owner: owner.map(str::to_string),
        }
    }

    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        SemanticError::IllegalOperatorUse(message.into())
    }
}

fn unresolved_message(attribute: &str, owner: Option<&str>) -> String {
    match owner {
        Some(owner) => format!("Unknown attribute '{}' on '{}'", attribute, owner),
        None => format!("Unknown attribute '{}': no from-element in scope exposes it", attribute),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SemanticError::AmbiguousAttribute {
            attribute: "name".into(),
            aliases: vec!["a".into(), "f".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("name"));
        assert!(msg.contains("a, f"));

        let err = SemanticError::unresolved_attribute("nope", Some("Account"));
        assert_eq!(err.to_string(), "Unknown attribute 'nope' on 'Account'");
    }

    #[test]
    fn test_internal_errors_are_distinct() {
        assert!(SemanticError::ParsingContextMisuse("x".into()).is_internal());
        assert!(!SemanticError::UnresolvedType("X".into()).is_internal());
        assert_eq!(
            SemanticError::illegal("x").kind(),
            SemanticErrorKind::IllegalOperatorUse
        );
    }
}
