//! End-to-end translation: nested selections, naming hygiene, determinism.

use std::collections::HashSet;

use gqlgraph::config::TranslatorConfig;
use gqlgraph::graph_catalog::Cardinality;
use gqlgraph::query_ir::{
    ComparisonOperator, Computation, ConnectionField, EdgeSelection, Field, Filter, Operation,
    PaginationSpec, QueryIrError, RelationshipField, SortDirection, SortSpec,
};
use gqlgraph::{lower, translate};

use super::{default_config, movies_schema};

fn nested_operation() -> Operation {
    Operation::new("Movie")
        .filter(Filter::compare("released", ComparisonOperator::GreaterThanEqual, 1990))
        .field(Field::attribute("title"))
        .field(Field::relationship(
            "actors",
            RelationshipField::new(
                "actors",
                Operation::new("Actor")
                    .field(Field::attribute("name"))
                    .field(Field::relationship(
                        "actedIn",
                        RelationshipField::new(
                            "actedIn",
                            Operation::new("Production").field(Field::attribute("title")),
                        ),
                    ))
                    .sort(SortSpec::node("name", SortDirection::Asc)),
            ),
        ))
        .field(Field::connection(
            "actorsConnection",
            ConnectionField::new("actors")
                .edges(
                    EdgeSelection::default()
                        .node(vec![Field::attribute("name")])
                        .properties(vec![Field::attribute("role")]),
                )
                .paginate(PaginationSpec::cursor(Some(5), None))
                .with_total_count()
                .with_page_info(),
        ))
        .field(Field::computed(
            "reviewScore",
            Some(Computation::scalar(
                "MATCH (this)<-[:REVIEWED]-(r:Review) RETURN avg(r.score) AS score",
                "score",
                Cardinality::Single,
            )),
        ))
        .sort(SortSpec::node("title", SortDirection::Asc))
        .paginate(PaginationSpec::offset(Some(10), Some(5)))
}

#[test]
fn test_simple_nested_read() {
    let schema = movies_schema();
    let operation = Operation::new("Movie")
        .filter(Filter::compare("title", ComparisonOperator::Equal, "The Matrix"))
        .field(Field::attribute("title"))
        .field(Field::relationship(
            "actors",
            RelationshipField::new(
                "actors",
                Operation::new("Actor").field(Field::attribute("name")),
            ),
        ));
    let query = translate(&operation, &schema, &default_config()).unwrap();
    assert_eq!(
        query.cypher,
        [
            "MATCH (this:Movie)",
            "WHERE this.title = $param0",
            "WITH *",
            "LIMIT $param1",
            "CALL {",
            "    WITH this",
            "    MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)",
            "    RETURN collect(this1 { .name }) AS var2",
            "}",
            "RETURN this { .title, actors: var2 } AS this",
        ]
        .join("\n")
    );
    assert_eq!(query.params["param0"], "The Matrix");
    assert_eq!(query.params["param1"], 20);
}

#[test]
fn test_translation_is_deterministic() {
    let schema = movies_schema();
    let config = default_config();
    let first = translate(&nested_operation(), &schema, &config).unwrap();
    let second = translate(&nested_operation(), &schema, &config).unwrap();
    assert_eq!(first, second);

    // A schema loaded again from the same document gives the same output
    let reloaded = movies_schema();
    let third = translate(&nested_operation(), &reloaded, &config).unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_lowering_is_idempotent() {
    let schema = movies_schema();
    let config = default_config();
    let operation = nested_operation();
    let sequence = lower(&operation, &schema, &config).unwrap();
    assert_eq!(sequence, lower(&operation.clone(), &schema, &config).unwrap());
}

#[test]
fn test_pattern_variables_are_unique() {
    let schema = movies_schema();
    let sequence = lower(&nested_operation(), &schema, &default_config()).unwrap();
    let variables = sequence.pattern_variables();
    assert!(!variables.is_empty());

    let mut seen = HashSet::new();
    for variable in &variables {
        assert!(seen.insert(variable.name().to_string()), "{} bound twice", variable);
    }
}

#[test]
fn test_params_match_references() {
    let schema = movies_schema();
    let query = translate(&nested_operation(), &schema, &default_config()).unwrap();
    for name in query.params.keys() {
        assert!(query.cypher.contains(&format!("${}", name)), "{} is unused", name);
    }
    // released filter, root skip/limit, cursor page size
    assert_eq!(query.params.len(), 4);
    assert_eq!(query.params["param0"], 1990);
    assert_eq!(query.params["param1"], 10);
    assert_eq!(query.params["param2"], 5);
    assert_eq!(query.params["param3"], 5);
}

#[test]
fn test_query_serializes_for_drivers() {
    let schema = movies_schema();
    let operation = Operation::new("Actor")
        .filter(Filter::compare("born", ComparisonOperator::LessThan, 1970))
        .field(Field::attribute("name"));
    let query = translate(&operation, &schema, &default_config()).unwrap();
    let json = serde_json::to_value(&query).unwrap();
    assert_eq!(
        json["cypher"],
        "MATCH (this:Actor)\nWHERE this.born < $param0\nRETURN this { .name } AS this"
    );
    assert_eq!(json["params"]["param0"], 1970);
}

#[test]
fn test_nesting_depth_limit() {
    let schema = movies_schema();
    let config = TranslatorConfig {
        max_nesting_depth: 1,
        ..TranslatorConfig::default()
    };
    let err = lower(&nested_operation(), &schema, &config).unwrap_err();
    assert_eq!(err, QueryIrError::NestingTooDeep { max_depth: 1 });

    let shallow = Operation::new("Movie").field(Field::relationship(
        "actors",
        RelationshipField::new("actors", Operation::new("Actor").field(Field::attribute("name"))),
    ));
    assert!(lower(&shallow, &schema, &config).is_ok());
}

#[test]
fn test_version_prefix_and_computed_field() {
    let schema = movies_schema();
    let config = TranslatorConfig {
        cypher_version_prefix: true,
        ..TranslatorConfig::default()
    };
    let query = translate(&nested_operation(), &schema, &config).unwrap();
    assert!(query.cypher.starts_with("CYPHER 5\nMATCH (this:Movie)\n"));
    assert!(query
        .cypher
        .contains("MATCH (this)<-[:REVIEWED]-(r:Review) RETURN avg(r.score) AS score"));
    assert!(query.cypher.contains("reviewScore: var"));
}
