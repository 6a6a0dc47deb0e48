//! gqlgraph - typed graph query compiler
//!
//! This crate lowers a validated, typed selection tree over an
//! entity/relationship schema into a Cypher clause program through:
//! - A read-only schema catalogue with interfaces, unions and
//!   relationship-property types
//! - A query IR of fields, filters, sorting and pagination/connections
//! - Polymorphism resolution for abstract targets and declared relationships
//! - A structured clause builder and Cypher renderer

/// Debug print macro that only compiles in debug builds.
/// In release builds, this expands to nothing, so there's zero runtime cost.
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {
        #[cfg(debug_assertions)]
        eprintln!($($arg)*);
    };
}

pub mod clause_builder;
pub mod config;
pub mod graph_catalog;
pub mod query_ir;

pub use query_ir::{lower, translate, CypherQuery};
