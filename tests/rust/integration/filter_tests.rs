//! Filter semantics through full root operations.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use test_case::test_case;

use gqlgraph::query_ir::{
    AggregationFilter, AggregationOperator, ComparisonOperator, ConnectionFilter, EdgeFilter,
    Field, Filter, Operation, Quantifier, QueryIrError,
};
use gqlgraph::translate;

use super::{default_config, movies_schema};

/// WHERE line of a root read over `Actor` (no default limit)
fn actor_where(filter: Filter) -> Result<(String, BTreeMap<String, Value>), QueryIrError> {
    let schema = movies_schema();
    let operation = Operation::new("Actor")
        .filter(filter)
        .field(Field::attribute("name"));
    let query = translate(&operation, &schema, &default_config())?;
    let predicate = query
        .cypher
        .strip_prefix("MATCH (this:Actor)\nWHERE ")
        .and_then(|rest| rest.strip_suffix("\nRETURN this { .name } AS this"))
        .unwrap_or_default()
        .to_string();
    Ok((predicate, query.params))
}

#[test_case(ComparisonOperator::Equal, json!("Keanu"), "this.name = $param0" ; "equal")]
#[test_case(ComparisonOperator::NotEqual, json!("Keanu"), "NOT (this.name = $param0)" ; "not equal")]
#[test_case(ComparisonOperator::Contains, json!("ea"), "this.name CONTAINS $param0" ; "contains")]
#[test_case(ComparisonOperator::StartsWith, json!("K"), "this.name STARTS WITH $param0" ; "starts with")]
#[test_case(ComparisonOperator::EndsWith, json!("u"), "this.name ENDS WITH $param0" ; "ends with")]
#[test_case(ComparisonOperator::In, json!(["Keanu", "Carrie"]), "this.name IN $param0" ; "in list")]
#[test_case(ComparisonOperator::Matches, json!("K.*"), "this.name =~ $param0" ; "regex")]
fn test_string_comparisons(operator: ComparisonOperator, value: Value, expected: &str) {
    let (predicate, params) =
        actor_where(Filter::compare("name", operator, value.clone())).unwrap();
    assert_eq!(predicate, expected);
    assert_eq!(params["param0"], value);
}

#[test_case(ComparisonOperator::LessThan, "this.born < $param0" ; "lt")]
#[test_case(ComparisonOperator::LessThanEqual, "this.born <= $param0" ; "lte")]
#[test_case(ComparisonOperator::GreaterThan, "this.born > $param0" ; "gt")]
#[test_case(ComparisonOperator::GreaterThanEqual, "this.born >= $param0" ; "gte")]
fn test_ordering_comparisons(operator: ComparisonOperator, expected: &str) {
    let (predicate, _) = actor_where(Filter::compare("born", operator, 1964)).unwrap();
    assert_eq!(predicate, expected);
}

#[test]
fn test_null_comparisons() {
    let (predicate, params) =
        actor_where(Filter::compare("born", ComparisonOperator::Equal, Value::Null)).unwrap();
    assert_eq!(predicate, "this.born IS NULL");
    assert!(params.is_empty());

    let (predicate, _) =
        actor_where(Filter::compare("born", ComparisonOperator::NotEqual, Value::Null)).unwrap();
    assert_eq!(predicate, "this.born IS NOT NULL");

    let err = actor_where(Filter::compare("born", ComparisonOperator::GreaterThan, Value::Null))
        .unwrap_err();
    assert!(matches!(err, QueryIrError::InvalidFilter(_)));
}

#[test]
fn test_string_length() {
    let (predicate, _) =
        actor_where(Filter::length("name", ComparisonOperator::GreaterThan, 10)).unwrap();
    assert_eq!(predicate, "size(this.name) > $param0");

    let err = actor_where(Filter::length("born", ComparisonOperator::Equal, 4)).unwrap_err();
    assert!(matches!(err, QueryIrError::UnsupportedOperator { .. }));
}

#[test]
fn test_logical_composition() {
    let filter = Filter::or(vec![
        Filter::and(vec![
            Filter::compare("name", ComparisonOperator::StartsWith, "K"),
            Filter::compare("born", ComparisonOperator::LessThan, 1970),
        ]),
        Filter::not(Filter::compare("born", ComparisonOperator::Equal, Value::Null)),
    ]);
    let (predicate, params) = actor_where(filter).unwrap();
    assert_eq!(
        predicate,
        "((this.name STARTS WITH $param0 AND this.born < $param1) OR NOT (this.born IS NULL))"
    );
    assert_eq!(params.len(), 2);
}

#[test]
fn test_relationship_quantifiers() {
    let released = ConnectionFilter::Node(Box::new(Filter::compare(
        "released",
        ComparisonOperator::GreaterThan,
        2000,
    )));

    let (some, _) =
        actor_where(Filter::relationship("favourite", Quantifier::Some, Some(released.clone())))
            .unwrap();
    assert_eq!(
        some,
        "EXISTS {\n    MATCH (this)-[this0:FAVOURITE]->(this1:Movie)\n    WHERE this1.released > $param0\n}"
    );

    let (none, _) =
        actor_where(Filter::relationship("favourite", Quantifier::None, Some(released.clone())))
            .unwrap();
    assert!(none.starts_with("NOT (EXISTS {"));

    let (all, _) =
        actor_where(Filter::relationship("favourite", Quantifier::All, Some(released))).unwrap();
    assert!(all.starts_with("NOT (EXISTS {"));
    assert!(all.contains("WHERE NOT (this1.released > $param0)"));
}

#[test]
fn test_typed_edge_filter_on_abstract_target() {
    let mut by_type = BTreeMap::new();
    by_type.insert(
        "ActedIn".to_string(),
        Filter::compare("role", ComparisonOperator::Equal, "Neo"),
    );
    let (predicate, params) = actor_where(Filter::relationship(
        "actedIn",
        Quantifier::Some,
        Some(ConnectionFilter::Edge(EdgeFilter::Typed(by_type))),
    ))
    .unwrap();
    // Both branches carry the same property type, so both are constrained
    assert!(predicate.contains("WHERE this0.role = $param0"));
    assert!(predicate.contains("WHERE this2.role = $param1"));
    assert_eq!(params.len(), 2);

    let mut unknown = BTreeMap::new();
    unknown.insert(
        "Directed".to_string(),
        Filter::compare("role", ComparisonOperator::Equal, "Neo"),
    );
    let err = actor_where(Filter::relationship(
        "actedIn",
        Quantifier::Some,
        Some(ConnectionFilter::Edge(EdgeFilter::Typed(unknown))),
    ))
    .unwrap_err();
    assert!(matches!(err, QueryIrError::SchemaLookup(_)));
}

#[test]
fn test_count_aggregation() {
    let (predicate, params) = actor_where(Filter::Aggregation(AggregationFilter::count(
        "actedIn",
        ComparisonOperator::GreaterThanEqual,
        3,
    )))
    .unwrap();
    assert!(predicate.starts_with("(COUNT {\n    MATCH (this)-[this0:ACTED_IN]->(this1:Movie)\n}"));
    assert!(predicate.contains(" + COUNT {\n    MATCH (this)-[this2:ACTED_IN]->(this3:Series)\n}"));
    assert!(predicate.ends_with(") >= $param0"));
    assert_eq!(params["param0"], 3);
}

#[test]
fn test_aggregation_rejects_shortest_on_numbers() {
    let err = actor_where(Filter::Aggregation(AggregationFilter::node(
        "actedIn",
        "released",
        Some(AggregationOperator::Shortest),
        ComparisonOperator::GreaterThan,
        1990,
    )))
    .unwrap_err();
    assert!(matches!(err, QueryIrError::UnsupportedOperator { .. }));
}

#[test]
fn test_unknown_attribute() {
    let err = actor_where(Filter::compare("height", ComparisonOperator::Equal, 180)).unwrap_err();
    assert!(matches!(err, QueryIrError::SchemaLookup(_)));
}
