mod common;

use common::{expect_fragment, movie_schema, translate};
use serde_json::json;

#[test]
fn connection_filter_projects_node_and_relationship() {
    let schema = movie_schema();
    let out = expect_fragment(
        &schema,
        "Movie",
        json!({
            "actorsConnection_SOME": {
                "node": { "name": "Tom" },
                "edge": { "role": "lead" }
            }
        }),
    );
    assert_eq!(
        out.fragment,
        "(EXISTS { (:Actor)-[:ACTED_IN]->(this) } AND \
         any(var2 IN [(var0:Actor)-[var1:ACTED_IN]->(this) | { node: var0, relationship: var1 }] WHERE \
         (var2.relationship.role = $nested_param0.p0 AND var2.node.name = $nested_param0.p1)))"
    );
    assert_eq!(
        out.params.get("nested_param0"),
        Some(&json!({ "p0": "lead", "p1": "Tom" }))
    );
}

#[test]
fn connection_node_side_supports_operators() {
    let schema = movie_schema();
    let out = expect_fragment(
        &schema,
        "Movie",
        json!({ "actorsConnection_SOME": { "node": { "name_CONTAINS": "om" } } }),
    );
    assert!(out.fragment.contains("var2.node.name CONTAINS $nested_param0.p0"));
}

#[test]
fn negated_connection_wraps_in_not() {
    let schema = movie_schema();
    let out = expect_fragment(
        &schema,
        "Movie",
        json!({ "actorsConnection_NOT": { "node": { "name": "Tom" } } }),
    );
    // Bare NOT on a connection quantifies with `none`.
    assert!(out.fragment.contains("none(var2 IN"));

    let out = expect_fragment(
        &schema,
        "Movie",
        json!({ "actorsConnection_NOT_ALL": { "node": { "name": "Tom" } } }),
    );
    assert!(out.fragment.starts_with("NOT ("));
    assert!(out.fragment.contains("all(var2 IN"));
}

#[test]
fn union_connection_fans_out_per_member_type() {
    let schema = movie_schema();
    let out = expect_fragment(
        &schema,
        "Actor",
        json!({
            "productionsConnection": {
                "Movie": { "node": { "title": "X" } },
                "Series": { "node": { "title": "Y" } }
            }
        }),
    );
    assert_eq!(
        out.fragment,
        "((EXISTS { (this)-[:ACTED_IN]->(:Movie) } AND \
         any(var2 IN [(this)-[var0:ACTED_IN]->(var1:Movie) | { node: var1, relationship: var0 }] WHERE \
         var2.node.title = $nested_param0.p0)) AND \
         (EXISTS { (this)-[:ACTED_IN]->(:Series) } AND \
         any(var5 IN [(this)-[var3:ACTED_IN]->(var4:Series) | { node: var4, relationship: var3 }] WHERE \
         var5.node.title = $nested_param1.p0)))"
    );
    assert_eq!(out.params.get("nested_param0"), Some(&json!({ "p0": "X" })));
    assert_eq!(out.params.get("nested_param1"), Some(&json!({ "p0": "Y" })));
}

#[test]
fn unknown_union_member_is_rejected() {
    let schema = movie_schema();
    let err = translate(
        &schema,
        "Actor",
        json!({ "productionsConnection": { "Documentary": { "node": {} } } }),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        graphweave_translate::Error::MissingReferencedType(name) if name == "Documentary"
    ));
}

#[test]
fn aggregate_count_filters() {
    let schema = movie_schema();

    let out = expect_fragment(&schema, "Movie", json!({ "actorsAggregate": { "count_GT": 2 } }));
    assert_eq!(
        out.fragment,
        "size([(:Actor)-[:ACTED_IN]->(this) | 1]) > $nested_param0.p0"
    );
    assert_eq!(out.params.get("nested_param0"), Some(&json!({ "p0": 2 })));

    let out = expect_fragment(&schema, "Movie", json!({ "actorsAggregate": { "count": 3 } }));
    assert_eq!(
        out.fragment,
        "size([(:Actor)-[:ACTED_IN]->(this) | 1]) = $nested_param0.p0"
    );
}

#[test]
fn aggregate_over_outbound_relationship() {
    let schema = movie_schema();
    let out = expect_fragment(&schema, "Movie", json!({ "genresAggregate": { "count_LTE": 3 } }));
    assert_eq!(
        out.fragment,
        "size([(this)-[:IN_GENRE]->(:Genre) | 1]) <= $nested_param0.p0"
    );
}

#[test]
fn aggregate_alongside_other_filters_keeps_prefixes_distinct() {
    let schema = movie_schema();
    let out = expect_fragment(
        &schema,
        "Movie",
        json!({
            "actorsAggregate": { "count_GT": 2 },
            "actorsConnection_SOME": { "node": { "name": "Tom" } }
        }),
    );
    assert!(out.fragment.contains("$nested_param0"));
    assert!(out.fragment.contains("$nested_param1"));
    assert!(out.params.contains_key("nested_param0"));
    assert!(out.params.contains_key("nested_param1"));
}
