use std::path::PathBuf;

/// Errors raised while building or loading a domain model.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Entity '{0}' is defined more than once")]
    DuplicateEntity(String),

    #[error("Attribute '{attribute}' is defined more than once on '{entity}'")]
    DuplicateAttribute { entity: String, attribute: String },

    #[error("Entity '{entity}' extends unknown type '{super_type}'")]
    UnknownSuperType { entity: String, super_type: String },

    #[error("Inheritance cycle through '{0}'")]
    InheritanceCycle(String),

    #[error("Invalid type '{ty}' for attribute '{entity}.{attribute}'")]
    InvalidType {
        entity: String,
        attribute: String,
        ty: String,
    },

    #[error("Attribute '{entity}.{attribute}' refers to unknown entity '{target}'")]
    UnknownEntity {
        entity: String,
        attribute: String,
        target: String,
    },

    #[error("Collection '{entity}.{attribute}' is not mappable: {reason}")]
    InvalidCollection {
        entity: String,
        attribute: String,
        reason: String,
    },

    #[error("Derived table for '{entity}' is not a valid SELECT: {message}")]
    InvalidDerivedTable { entity: String, message: String },

    #[error("Entity '{0}' has no table")]
    MissingTable(String),

    #[error("Failed to read model file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse model file: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to parse model file: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported model file format: {0}")]
    UnsupportedFormat(PathBuf),
}

pub type MetadataResult<T> = Result<T, MetadataError>;
