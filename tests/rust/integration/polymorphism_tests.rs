//! Abstract targets, declared relationships and merged ordering.

use std::collections::BTreeMap;

use gqlgraph::query_ir::{
    ComparisonOperator, ConnectionField, ConnectionFilter, EdgeFilter, EdgeSelection, Field,
    Filter, Operation, PaginationSpec, QueryIrError, RelationshipField, SortDirection, SortSpec,
};
use gqlgraph::translate;

use super::{default_config, movies_schema};

#[test]
fn test_edge_filter_keyed_by_property_type_constrains_one_branch() {
    let schema = movies_schema();
    let mut by_type = BTreeMap::new();
    by_type.insert(
        "ActedIn".to_string(),
        Filter::compare("screenTime", ComparisonOperator::GreaterThan, 30),
    );
    let operation = Operation::new("Production")
        .field(Field::attribute("title"))
        .field(Field::connection(
            "actorsConnection",
            ConnectionField::new("actors")
                .filter(ConnectionFilter::Edge(EdgeFilter::Typed(by_type)))
                .edges(EdgeSelection::default().node(vec![Field::attribute("name")]))
                .with_total_count(),
        ));
    let query = translate(&operation, &schema, &default_config()).unwrap();

    // Each root branch binds a concrete production, so the connection below
    // it traverses exactly one edge type
    assert!(query.cypher.contains("MATCH (this1:Movie)"));
    assert!(query.cypher.contains(
        "MATCH (this1)<-[this3:ACTED_IN]-(this4:Actor)\n            WHERE this3.screenTime > $param0\n"
    ));
    assert!(query.cypher.contains("MATCH (this8:Series)"));
    assert!(query.cypher.contains(
        "MATCH (this8)<-[this10:STARRED_IN]-(this11:Actor)\n            RETURN"
    ));
    assert_eq!(query.cypher.matches("screenTime").count(), 1);
    assert_eq!(query.params.len(), 1);
}

#[test]
fn test_interface_relationship_from_concrete_branch() {
    let schema = movies_schema();
    let operation = Operation::new("Actor").field(Field::relationship(
        "productions",
        RelationshipField::new(
            "actedIn",
            Operation::new("Production")
                .field(Field::typename())
                .field(Field::attribute("title"))
                .field(Field::attribute("episodes").on("Series")),
        ),
    ));
    let query = translate(&operation, &schema, &default_config()).unwrap();
    assert!(query.cypher.contains(
        r#"RETURN this2 { __typename: "Movie", .title, __resolveType: "Movie" } AS var0"#
    ));
    assert!(query.cypher.contains(
        r#"RETURN this4 { __typename: "Series", .title, .episodes, __resolveType: "Series" } AS var0"#
    ));
    assert!(query.cypher.contains("RETURN this { productions: var6 } AS this"));
}

#[test]
fn test_union_root_projects_members_by_condition() {
    let schema = movies_schema();
    let operation = Operation::new("SearchResult")
        .field(Field::attribute("title").on("Movie"))
        .field(Field::attribute("name").on("Actor"));
    let query = translate(&operation, &schema, &default_config()).unwrap();
    assert_eq!(
        query.cypher,
        [
            "CALL {",
            "    MATCH (this1:Actor)",
            "    RETURN this1 { .name, __resolveType: \"Actor\" } AS var0",
            "    UNION ALL",
            "    MATCH (this2:Movie)",
            "    RETURN this2 { .title, __resolveType: \"Movie\" } AS var0",
            "}",
            "WITH collect(var0) AS var3",
            "UNWIND var3 AS this",
            "RETURN this",
        ]
        .join("\n")
    );
}

#[test]
fn test_merged_sort_with_missing_keys_and_tie_break() {
    let schema = movies_schema();
    let operation = Operation::new("Production")
        .field(Field::attribute("title"))
        .sort(SortSpec::node("runtime", SortDirection::Desc))
        .sort(SortSpec::node("title", SortDirection::Asc))
        .paginate(PaginationSpec::offset(Some(2), Some(3)));
    let query = translate(&operation, &schema, &default_config()).unwrap();

    assert!(query.cypher.contains("AS var0, [this2.runtime, this2.title] AS var1"));
    assert!(query.cypher.contains("AS var0, [null, this3.title] AS var1"));
    assert!(query.cypher.contains(
        "    ORDER BY var6.keys[0] DESC, var6.keys[1] ASC, var5 ASC\n    SKIP $param0\n    LIMIT $param1\n"
    ));
    assert_eq!(query.params["param0"], 2);
    assert_eq!(query.params["param1"], 3);
}

#[test]
fn test_sort_key_missing_everywhere_is_rejected() {
    let schema = movies_schema();
    let operation = Operation::new("Production").sort(SortSpec::node("budget", SortDirection::Asc));
    let err = translate(&operation, &schema, &default_config()).unwrap_err();
    assert!(matches!(err, QueryIrError::SchemaLookup(_)));
}

#[test]
fn test_typed_edge_sort_applies_per_property_type() {
    let schema = movies_schema();
    let operation = Operation::new("Production").field(Field::connection(
        "actorsConnection",
        ConnectionField::new("actors")
            .edges(EdgeSelection::default().properties(vec![Field::attribute("role")]))
            .sort(SortSpec::edge(Some("StarredIn"), "episodeNr", SortDirection::Asc)),
    ));
    let query = translate(&operation, &schema, &default_config()).unwrap();
    assert!(query
        .cypher
        .contains("RETURN { properties: this4 { .role } } AS var2, [null] AS var3"));
    assert!(query
        .cypher
        .contains("RETURN { properties: this14 { .role } } AS var12, [this14.episodeNr] AS var13"));
    assert!(query.cypher.contains("actorsConnection: var10"));

    let unknown = Operation::new("Production").field(Field::connection(
        "actorsConnection",
        ConnectionField::new("actors").sort(SortSpec::edge(
            Some("StarredIn"),
            "screenTime",
            SortDirection::Asc,
        )),
    ));
    assert!(matches!(
        translate(&unknown, &schema, &default_config()),
        Err(QueryIrError::SchemaLookup(_))
    ));
}
