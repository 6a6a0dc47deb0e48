//! Schema and translator configuration loaded from files.

use std::io::Write;

use anyhow::Result;
use tempfile::NamedTempFile;

use gqlgraph::config::TranslatorConfig;
use gqlgraph::graph_catalog::{GraphSchemaConfig, GraphSchemaError};
use gqlgraph::query_ir::{Field, Operation};
use gqlgraph::translate;

use super::MOVIES_YAML;

fn write_temp(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_translate_with_file_configuration() -> Result<()> {
    let schema_file = write_temp(MOVIES_YAML)?;
    let config_file = write_temp(
        "max_nesting_depth: 4\ndefault_limit: 25\nmax_limit: 50\ncypher_version_prefix: true\n",
    )?;

    let schema = GraphSchemaConfig::from_yaml_file(schema_file.path())?.to_graph_schema()?;
    let config = TranslatorConfig::from_yaml_file(config_file.path())?;
    assert_eq!(config.max_nesting_depth, 4);

    let query = translate(
        &Operation::new("Actor").field(Field::attribute("name")),
        &schema,
        &config,
    )?;
    assert_eq!(
        query.cypher,
        "CYPHER 5\nMATCH (this:Actor)\nWITH *\nLIMIT $param0\nRETURN this { .name } AS this"
    );
    assert_eq!(query.params["param0"], 25);
    Ok(())
}

#[test]
fn test_undefined_relationship_target_is_rejected() {
    let yaml = r#"
graph_schema:
  entities:
    - name: Movie
      attributes:
        - { name: title, type: String }
      relationships:
        - { field: director, target: Person, type: DIRECTED, direction: IN }
"#;
    let err = GraphSchemaConfig::from_yaml_str(yaml)
        .and_then(|config| config.to_graph_schema())
        .unwrap_err();
    match err {
        GraphSchemaError::InvalidConfig { message } => {
            assert!(message.contains("target type `Person` is not defined"));
            assert!(message.contains("Movie.director"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_translator_configuration() -> Result<()> {
    let file = write_temp("max_nesting_depth: 0\n")?;
    assert!(TranslatorConfig::from_yaml_file(file.path()).is_err());

    let file = write_temp("max_nesting_depth: 8\ndefault_limit: 500\nmax_limit: 100\n")?;
    assert!(TranslatorConfig::from_yaml_file(file.path()).is_err());
    Ok(())
}
