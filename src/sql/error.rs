//! Errors raised while lowering a semantic tree to the SQL AST.

/// Result type for SQL lowering.
pub type ConversionResult<T> = Result<T, ConversionError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// A cross join was given a join predicate.
    #[error("Illegal join specification: {0}")]
    IllegalJoinSpecification(String),

    #[error("No table mapping for entity '{0}'")]
    MissingTableShape(String),

    #[error("Attribute '{entity}.{attribute}' has no column mapping")]
    UnmappedAttribute { entity: String, attribute: String },

    #[error("Alias '{0}' does not name a table group")]
    UnknownAlias(String),

    #[error("Cannot lower to SQL: {0}")]
    Unsupported(String),
}

impl ConversionError {
    pub(crate) fn unmapped(entity: &str, attribute: &str) -> Self {
        ConversionError::UnmappedAttribute {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        ConversionError::Unsupported(message.into())
    }
}
