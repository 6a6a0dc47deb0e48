//! Error types for query lowering.
//!
//! Every error aborts the whole lowering call: no clause sequence is produced
//! for a request that fails anywhere in its tree.

use thiserror::Error;

use crate::graph_catalog::GraphSchemaError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryIrError {
    #[error("Schema lookup failed: {0}")]
    SchemaLookup(GraphSchemaError),

    #[error("Unsupported operator `{operator}` {context}")]
    UnsupportedOperator { operator: String, context: String },

    #[error("Field `{field}` is declared as computed but has no computation")]
    MissingComputation { field: String },

    #[error("Ambiguous relationship properties for `{entity}.{field}`: {candidates}")]
    AmbiguousRelationshipProperty {
        entity: String,
        field: String,
        candidates: String,
    },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid cursor `{cursor}`: {reason}")]
    InvalidCursor { cursor: String, reason: String },

    #[error("Selection nesting exceeds the maximum depth of {max_depth}")]
    NestingTooDeep { max_depth: usize },
}

impl From<GraphSchemaError> for QueryIrError {
    fn from(err: GraphSchemaError) -> Self {
        match err {
            GraphSchemaError::AmbiguousRelationshipProperty {
                entity,
                field,
                candidates,
            } => QueryIrError::AmbiguousRelationshipProperty {
                entity,
                field,
                candidates,
            },
            other => QueryIrError::SchemaLookup(other),
        }
    }
}

impl QueryIrError {
    pub fn unsupported_operator(operator: impl Into<String>, context: impl Into<String>) -> Self {
        QueryIrError::UnsupportedOperator {
            operator: operator.into(),
            context: context.into(),
        }
    }
}

pub type QueryIrResult<T> = Result<T, QueryIrError>;
