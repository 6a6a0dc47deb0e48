pub mod config;
pub mod errors;
pub mod graph_schema;

// Re-export commonly used types
pub use config::{GraphSchemaConfig, GraphSchemaDefinition};
pub use errors::GraphSchemaError;
pub use graph_schema::{
    Attribute, Cardinality, CompositeType, Direction, EdgeBinding, EntitySchema, GraphSchema,
    InterfaceSchema, QueryLimit, RelationshipImplementation, RelationshipPropertiesSchema,
    RelationshipSchema, ScalarKind, UnionSchema,
};
