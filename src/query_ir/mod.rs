//! Query IR: typed selections lowered to Cypher clause sequences.
//!
//! An [`Operation`] names a target type, its filters, the fields to project,
//! the ordering and the window. [`lower`] walks it with a [`PlanCtx`] and
//! returns a [`ClauseSequence`](crate::clause_builder::ClauseSequence);
//! [`translate`] renders that sequence and collects its parameters.
//!
//! Abstract targets and relationships implemented differently per entity are
//! flattened into concrete branches by [`polymorphism`] before any clause is
//! emitted.

pub mod aggregation_filter;
pub mod computed_field;
pub mod connection;
pub mod cursor;
pub mod errors;
pub mod field;
pub mod filter;
pub mod operation;
pub mod pagination;
pub mod plan_ctx;
pub mod polymorphism;
pub mod relationship_field;
pub mod sort;

pub use aggregation_filter::{AggregationFilter, AggregationOperator, AggregationTarget};
pub use computed_field::{Computation, ComputedResult};
pub use connection::{ConnectionField, EdgeSelection};
pub use cursor::{edge_cursors, page_cursors, Cursor};
pub use errors::{QueryIrError, QueryIrResult};
pub use field::{lower_field, Field, FieldKind, LoweredField, RESOLVE_TYPE_KEY};
pub use filter::{
    lower_filter, ComparisonFilter, ComparisonOperator, ConnectionFilter, EdgeFilter, Filter,
    LogicalOperator, Measure, Quantifier, RelationshipFilter,
};
pub use operation::{lower, translate, CypherQuery, Operation};
pub use pagination::PaginationSpec;
pub use plan_ctx::PlanCtx;
pub use relationship_field::RelationshipField;
pub use sort::{SortDirection, SortKey, SortSpec};
