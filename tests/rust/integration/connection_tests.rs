//! Connections and pagination windows.

use serde_json::json;

use gqlgraph::config::TranslatorConfig;
use gqlgraph::query_ir::{
    edge_cursors, page_cursors, ConnectionField, Cursor, EdgeSelection, Field, Operation,
    PaginationSpec, QueryIrError, SortDirection, SortSpec,
};
use gqlgraph::translate;

use super::{default_config, movies_schema};

fn actors_connection(pagination: PaginationSpec) -> Operation {
    Operation::new("Movie")
        .field(Field::attribute("title"))
        .field(Field::connection(
            "actorsConnection",
            ConnectionField::new("actors")
                .edges(
                    EdgeSelection::default()
                        .node(vec![Field::attribute("name")])
                        .properties(vec![Field::attribute("role")]),
                )
                .paginate(pagination)
                .with_total_count()
                .with_page_info(),
        ))
}

#[test]
fn test_connection_shape() {
    let schema = movies_schema();
    let query = translate(
        &actors_connection(PaginationSpec::cursor(Some(2), None)),
        &schema,
        &default_config(),
    )
    .unwrap();
    assert_eq!(
        query.cypher,
        [
            "MATCH (this:Movie)",
            "WITH *",
            "LIMIT $param0",
            "CALL {",
            "    WITH this",
            "    CALL {",
            "        WITH this",
            "        MATCH (this)<-[this1:ACTED_IN]-(this2:Actor)",
            "        RETURN { node: this2 { .name }, properties: this1 { .role } } AS var0",
            "    }",
            "    WITH collect(var0) AS var3",
            "    WITH var3, size(var3) AS var4",
            "    CALL {",
            "        WITH var3",
            "        UNWIND range(0, size(var3) - 1) AS var5",
            "        WITH var3[var5] AS var6, var5",
            "        ORDER BY var5 ASC",
            "        LIMIT $param1",
            "        RETURN collect(var6) AS var7",
            "    }",
            "    RETURN { edges: var7, totalCount: var4, pageInfo: { hasNextPage: var4 > size(var7), hasPreviousPage: false } } AS var8",
            "}",
            "RETURN this { .title, actorsConnection: var8 } AS this",
        ]
        .join("\n")
    );
    assert_eq!(query.params["param0"], 20);
    assert_eq!(query.params["param1"], 2);
}

#[test]
fn test_zero_take_keeps_total() {
    let schema = movies_schema();
    let query = translate(
        &actors_connection(PaginationSpec::offset(Some(0), Some(0))),
        &schema,
        &default_config(),
    )
    .unwrap();
    // skip = 0 is never emitted; take = 0 still windows to an empty page
    assert!(!query.cypher.contains("SKIP"));
    assert!(query.cypher.contains("        LIMIT $param1\n"));
    assert_eq!(query.params["param1"], 0);
    assert!(query.cypher.contains("hasNextPage: var4 > size(var7)"));
}

#[test]
fn test_after_cursor_resumes_past_offset() {
    let schema = movies_schema();
    let after = Cursor::at(9).encode();
    let query = translate(
        &actors_connection(PaginationSpec::cursor(Some(3), Some(&after))),
        &schema,
        &default_config(),
    )
    .unwrap();
    assert!(query.cypher.contains("        SKIP $param1\n        LIMIT $param2\n"));
    assert_eq!(query.params["param1"], 10);
    assert_eq!(query.params["param2"], 3);
    assert!(query.cypher.contains(
        "pageInfo: { hasNextPage: var4 > ($param1 + size(var7)), hasPreviousPage: $param1 > 0 }"
    ));

    let (start, end) = page_cursors(10, 3, &[]).unwrap();
    assert_eq!(Cursor::decode(&start.unwrap()).unwrap().offset, 10);
    assert_eq!(Cursor::decode(&end.unwrap()).unwrap().offset, 12);
    assert_eq!(page_cursors(10, 0, &[]).unwrap(), (None, None));
}

#[test]
fn test_sorted_page_reports_cursor_sort_values() {
    let schema = movies_schema();
    let sorted = |after: Option<&str>| {
        Operation::new("Movie").field(Field::connection(
            "actorsConnection",
            ConnectionField::new("actors")
                .edges(EdgeSelection::default().node(vec![Field::attribute("name")]))
                .sort(SortSpec::node("name", SortDirection::Asc))
                .paginate(PaginationSpec::cursor(Some(2), after))
                .with_page_info(),
        ))
    };

    let first = translate(&sorted(None), &schema, &default_config()).unwrap();
    assert!(first
        .cypher
        .contains("RETURN collect(var7.row) AS var8, collect(var7.keys) AS var9\n"));
    assert!(first.cypher.contains("hasPreviousPage: false, sortValues: var9 }"));

    // The response layer turns the reported values into edge cursors
    let sort_values = vec![vec![json!("Carrie")], vec![json!("Keanu")]];
    let cursors = edge_cursors(0, 2, &sort_values).unwrap();
    let next = translate(&sorted(Some(&cursors[1])), &schema, &default_config()).unwrap();
    assert_eq!(next.params["param1"], 2);

    // A cursor issued for another ordering is refused
    let foreign = Cursor::at(1)
        .with_sort_values(vec![json!("Keanu"), json!(1964)])
        .encode();
    assert!(matches!(
        translate(&sorted(Some(&foreign)), &schema, &default_config()),
        Err(QueryIrError::InvalidCursor { .. })
    ));
}

#[test]
fn test_entity_maximum_clamps_requested_page() {
    let schema = movies_schema();
    let operation = Operation::new("Movie")
        .field(Field::attribute("title"))
        .paginate(PaginationSpec::offset(None, Some(500)));
    let query = translate(&operation, &schema, &default_config()).unwrap();
    assert_eq!(query.params["param0"], 100);
}

#[test]
fn test_global_limits_apply_without_entity_limits() {
    let schema = movies_schema();
    let config = TranslatorConfig {
        default_limit: Some(7),
        max_limit: Some(10),
        ..TranslatorConfig::default()
    };

    let defaulted = translate(
        &Operation::new("Actor").field(Field::attribute("name")),
        &schema,
        &config,
    )
    .unwrap();
    assert!(defaulted.cypher.contains("WITH *\nLIMIT $param0\n"));
    assert_eq!(defaulted.params["param0"], 7);

    let clamped = translate(
        &Operation::new("Actor")
            .field(Field::attribute("name"))
            .paginate(PaginationSpec::offset(Some(4), Some(50))),
        &schema,
        &config,
    )
    .unwrap();
    assert_eq!(clamped.params["param0"], 4);
    assert_eq!(clamped.params["param1"], 10);

    // Entity limits win over the global ones
    let movie = translate(
        &Operation::new("Movie").field(Field::attribute("title")),
        &schema,
        &config,
    )
    .unwrap();
    assert_eq!(movie.params["param0"], 20);
}
