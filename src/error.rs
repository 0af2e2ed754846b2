//! Crate-level error types.
//!
//! Schema and specification errors are caller defects and abort compilation
//! before storage is touched. Storage and settings errors wrap the failures
//! of their collaborators.

use crate::config::SettingsError;
use crate::storage::StorageError;

/// Errors raised while registering or navigating the entity schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Entity '{entity}' has no attribute '{attribute}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("Path '{path}' ends on relationship '{relationship}'; name a column of it")]
    PathEndsOnRelationship { path: String, relationship: String },

    #[error("Path '{path}' cannot descend through '{attribute}', which is not a relationship")]
    NotTraversable { path: String, attribute: String },

    #[error("Entity '{entity}' declares primary key '{column}' which is not one of its columns")]
    MissingPrimaryKey { entity: String, column: String },

    #[error("Entity '{entity}' declares '{name}' more than once")]
    DuplicateAttribute { entity: String, name: String },

    #[error("Relationship '{entity}.{relationship}' is invalid: {reason}")]
    InvalidRelationship {
        entity: String,
        relationship: String,
        reason: String,
    },

    #[error("Mapped attribute '{entity}.{name}' is malformed: {reason}")]
    MalformedMapped {
        entity: String,
        name: String,
        reason: String,
    },

    #[error("Unsupported expression in filter: {0}")]
    UnsupportedExpr(&'static str),

    #[error("Failed to parse schema definition: {0}")]
    Parse(String),
}

/// Errors in caller-supplied filter or projection specifications.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("Duplicate projection entries: {}", .0.join(", "))]
    DuplicateProjection(Vec<String>),

    #[error("Malformed projection '{input}': {reason}")]
    MalformedProjection { input: String, reason: String },

    #[error("Malformed filter value for '{path}': {value}")]
    MalformedFilterValue { path: String, value: String },

    #[error("skip_nones only applies to map filters, not expression trees")]
    SkipNonesOnTree,

    #[error("Filter path '{0}' resolves to a list or dict mapped attribute and cannot be compared")]
    FilterOnShapedMapped(String),
}

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for schema navigation.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
