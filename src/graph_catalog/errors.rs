//! # Graph Schema Error Types
//!
//! Errors raised by the schema catalogue, either while loading a schema
//! definition or while answering lookups during query lowering.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: unknown type, attribute or relationship names. These are
//!   caller errors: the request was expected to be validated against the live
//!   schema upstream, so they are never retried.
//! - **Resolution Errors**: a relationship whose declaration chain has no edge
//!   type, or whose inherited declarations disagree.
//! - **Configuration Errors**: file I/O and parsing issues during schema loading.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphSchemaError {
    #[error("No entity, interface or union found for `{type_name}`")]
    UnknownType { type_name: String },
    #[error("No entity found for `{entity}`")]
    UnknownEntity { entity: String },
    #[error("No attribute `{attribute}` found on `{type_name}`")]
    UnknownAttribute { type_name: String, attribute: String },
    #[error("No relationship `{field}` found on `{type_name}`")]
    UnknownRelationship { type_name: String, field: String },
    #[error("Relationship `{field}` on `{entity}` has no edge type anywhere in its declaration chain")]
    UnboundRelationship { entity: String, field: String },
    #[error("Relationship `{field}` on `{entity}` inherits conflicting implementations: {candidates}")]
    AmbiguousRelationshipProperty {
        entity: String,
        field: String,
        candidates: String,
    },
    #[error("Failed to read configuration file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse configuration: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl GraphSchemaError {
    /// Create an InvalidConfig error naming the definition it came from
    ///
    /// # Example
    /// ```ignore
    /// GraphSchemaError::invalid_config_with_context(
    ///     "Movie.actors",
    ///     "target type `Actress` is not defined"
    /// )
    /// ```
    pub fn invalid_config_with_context(
        definition: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        GraphSchemaError::InvalidConfig {
            message: format!("{}\n  Context: {}", message.into(), definition.into()),
        }
    }
}
