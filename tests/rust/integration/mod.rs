//! Integration tests - lower complete operations against the movies fixture
//! schema and check the rendered Cypher and parameters.
//!
//! No database is needed; assertions are made on the translator output only.

mod connection_tests;
mod error_tests;
mod filter_tests;
mod loading_tests;
mod polymorphism_tests;
mod translation_tests;

use gqlgraph::config::TranslatorConfig;
use gqlgraph::graph_catalog::{GraphSchema, GraphSchemaConfig};

pub(crate) const MOVIES_YAML: &str = include_str!("../../fixtures/movies.yaml");

pub(crate) fn movies_schema() -> GraphSchema {
    let _ = env_logger::builder().is_test(true).try_init();
    GraphSchemaConfig::from_yaml_str(MOVIES_YAML)
        .expect("fixture schema parses")
        .to_graph_schema()
        .expect("fixture schema is consistent")
}

pub(crate) fn default_config() -> TranslatorConfig {
    TranslatorConfig::default()
}
