//! Every error aborts the whole lowering; nothing partial is returned.

use gqlgraph::config::TranslatorConfig;
use gqlgraph::graph_catalog::{GraphSchemaConfig, GraphSchemaError};
use gqlgraph::query_ir::{
    ComparisonOperator, ConnectionField, Field, Filter, LogicalOperator, Operation,
    PaginationSpec, QueryIrError, RelationshipField, SortDirection, SortSpec,
};
use gqlgraph::{lower, translate};

use super::{default_config, movies_schema};

const AMBIGUOUS_YAML: &str = r#"
graph_schema:
  interfaces:
    - name: Owned
      relationships:
        - { field: holder, target: Person, type: OWNS, direction: IN }
    - name: Lent
      relationships:
        - { field: holder, target: Person, type: BORROWED, direction: IN }
  entities:
    - name: Book
      implements: [Owned, Lent]
      attributes:
        - { name: title, type: String }
    - name: Person
      attributes:
        - { name: name, type: String }
"#;

#[test]
fn test_unknown_names() {
    let schema = movies_schema();
    let config = default_config();

    let unknown_type = lower(&Operation::new("Documentary"), &schema, &config).unwrap_err();
    assert_eq!(
        unknown_type,
        QueryIrError::SchemaLookup(GraphSchemaError::UnknownType {
            type_name: "Documentary".to_string()
        })
    );

    let unknown_attribute =
        lower(&Operation::new("Movie").field(Field::attribute("budget")), &schema, &config)
            .unwrap_err();
    assert_eq!(
        unknown_attribute,
        QueryIrError::SchemaLookup(GraphSchemaError::UnknownAttribute {
            type_name: "Movie".to_string(),
            attribute: "budget".to_string()
        })
    );

    let unknown_relationship = lower(
        &Operation::new("Movie").field(Field::relationship(
            "directors",
            RelationshipField::new("directors", Operation::new("Actor")),
        )),
        &schema,
        &config,
    )
    .unwrap_err();
    assert!(matches!(
        unknown_relationship,
        QueryIrError::SchemaLookup(GraphSchemaError::UnknownRelationship { .. })
    ));
}

#[test]
fn test_missing_computation_names_the_field() {
    let schema = movies_schema();
    let operation = Operation::new("Movie")
        .field(Field::attribute("title"))
        .field(Field::computed("boxOffice", None));
    let err = translate(&operation, &schema, &default_config()).unwrap_err();
    assert_eq!(
        err,
        QueryIrError::MissingComputation {
            field: "Movie.boxOffice".to_string()
        }
    );
    assert_eq!(
        err.to_string(),
        "Field `Movie.boxOffice` is declared as computed but has no computation"
    );
}

#[test]
fn test_invalid_cursor() {
    let schema = movies_schema();
    let operation = Operation::new("Movie").field(Field::connection(
        "actorsConnection",
        ConnectionField::new("actors").paginate(PaginationSpec::cursor(Some(1), Some("%%%"))),
    ));
    let err = translate(&operation, &schema, &default_config()).unwrap_err();
    match err {
        QueryIrError::InvalidCursor { cursor, .. } => assert_eq!(cursor, "%%%"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_nesting_too_deep() {
    let schema = movies_schema();
    let config = TranslatorConfig {
        max_nesting_depth: 2,
        ..TranslatorConfig::default()
    };
    let mut operation = Operation::new("Movie").field(Field::attribute("title"));
    for _ in 0..3 {
        let actor = Operation::new("Actor").field(Field::relationship(
            "favourite",
            RelationshipField::new("favourite", operation),
        ));
        operation = Operation::new("Movie").field(Field::relationship(
            "actors",
            RelationshipField::new("actors", actor),
        ));
    }
    let err = lower(&operation, &schema, &config).unwrap_err();
    assert_eq!(err, QueryIrError::NestingTooDeep { max_depth: 2 });
}

#[test]
fn test_edge_sort_needs_a_connection() {
    let schema = movies_schema();
    let operation = Operation::new("Movie")
        .sort(SortSpec::edge(None, "screenTime", SortDirection::Asc));
    assert!(matches!(
        lower(&operation, &schema, &default_config()),
        Err(QueryIrError::UnsupportedOperator { .. })
    ));
}

#[test]
fn test_operator_tokens() {
    assert!(matches!(
        "SIMILAR".parse::<ComparisonOperator>(),
        Err(QueryIrError::UnsupportedOperator { .. })
    ));
    assert!(matches!(
        Filter::logical(LogicalOperator::Not, vec![]),
        Err(QueryIrError::InvalidFilter(_))
    ));
}

#[test]
fn test_ambiguous_inherited_relationship() {
    let schema = GraphSchemaConfig::from_yaml_str(AMBIGUOUS_YAML)
        .unwrap()
        .to_graph_schema()
        .unwrap();
    let operation = Operation::new("Book").field(Field::relationship(
        "holder",
        RelationshipField::new("holder", Operation::new("Person").field(Field::attribute("name"))),
    ));
    let err = lower(&operation, &schema, &default_config()).unwrap_err();
    match err {
        QueryIrError::AmbiguousRelationshipProperty { entity, field, .. } => {
            assert_eq!(entity, "Book");
            assert_eq!(field, "holder");
        }
        other => panic!("unexpected error: {other}"),
    }
}
