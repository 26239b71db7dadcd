mod common;

use common::{expect_fragment, movie_schema, translate};
use serde_json::json;

#[test]
fn equality_binds_a_parameter() {
    let schema = movie_schema();
    let out = expect_fragment(&schema, "Movie", json!({ "title": "The Matrix" }));
    assert_eq!(out.fragment, "this.title = $param0");
    assert_eq!(out.params.get("param0"), Some(&json!("The Matrix")));
}

#[test]
fn empty_input_produces_no_predicate() {
    let schema = movie_schema();
    let out = translate(&schema, "Movie", json!({})).unwrap();
    assert!(out.is_none());
}

#[test]
fn comparison_operators() {
    let schema = movie_schema();

    let out = expect_fragment(&schema, "Movie", json!({ "runtime_GTE": 90 }));
    assert_eq!(out.fragment, "this.runtime >= $param0");

    let out = expect_fragment(&schema, "Movie", json!({ "title_STARTS_WITH": "The" }));
    assert_eq!(out.fragment, "this.title STARTS WITH $param0");

    let out = expect_fragment(&schema, "Movie", json!({ "title_ENDS_WITH": "Reloaded" }));
    assert_eq!(out.fragment, "this.title ENDS WITH $param0");

    let out = expect_fragment(&schema, "Movie", json!({ "title_CONTAINS": "Matrix" }));
    assert_eq!(out.fragment, "this.title CONTAINS $param0");

    let out = expect_fragment(&schema, "Movie", json!({ "title_MATCHES": "(?i)the .*" }));
    assert_eq!(out.fragment, "this.title =~ $param0");

    let out = expect_fragment(&schema, "Movie", json!({ "title_IN": ["A", "B"] }));
    assert_eq!(out.fragment, "this.title IN $param0");
    assert_eq!(out.params.get("param0"), Some(&json!(["A", "B"])));
}

#[test]
fn negated_operator_wraps_in_not() {
    let schema = movie_schema();
    let out = expect_fragment(&schema, "Movie", json!({ "title_NOT_CONTAINS": "Matrix" }));
    assert_eq!(out.fragment, "NOT (this.title CONTAINS $param0)");
}

#[test]
fn null_values_become_null_tests() {
    let schema = movie_schema();

    let out = expect_fragment(&schema, "Movie", json!({ "title": null }));
    assert_eq!(out.fragment, "this.title IS NULL");
    assert!(out.params.is_empty());

    let out = expect_fragment(&schema, "Movie", json!({ "title_NOT": null }));
    assert_eq!(out.fragment, "this.title IS NOT NULL");
    assert!(out.params.is_empty());
}

#[test]
fn renamed_field_compares_stored_property() {
    let schema = movie_schema();
    let out = expect_fragment(&schema, "Movie", json!({ "rating_GTE": 7.5 }));
    assert_eq!(out.fragment, "this.imdbRating >= $param0");
}

#[test]
fn coalesced_field_wraps_property_access() {
    let schema = movie_schema();

    let out = expect_fragment(&schema, "Movie", json!({ "tagline_CONTAINS": "dream" }));
    assert_eq!(out.fragment, "coalesce(this.tagline, 'n/a') CONTAINS $param0");

    // The default also applies to null tests.
    let out = expect_fragment(&schema, "Movie", json!({ "tagline": null }));
    assert_eq!(out.fragment, "coalesce(this.tagline, 'n/a') IS NULL");
}

#[test]
fn point_operators_use_distance_and_point_functions() {
    let schema = movie_schema();

    let value = json!({ "point": { "latitude": 51.5, "longitude": -0.1 }, "distance": 1000 });
    let out = expect_fragment(&schema, "Movie", json!({ "location_LT": value }));
    assert_eq!(
        out.fragment,
        "distance(this.location, point($param0.point)) < $param0.distance"
    );
    assert_eq!(out.params.get("param0"), Some(&value));

    let point = json!({ "latitude": 51.5, "longitude": -0.1 });
    let out = expect_fragment(&schema, "Movie", json!({ "location": point }));
    assert_eq!(out.fragment, "this.location = point($param0)");

    let out = expect_fragment(&schema, "Movie", json!({ "location_IN": [point] }));
    assert_eq!(out.fragment, "this.location IN [p IN $param0 | point(p)]");
}

#[test]
fn duration_comparisons_anchor_to_an_instant() {
    let schema = movie_schema();

    let out = expect_fragment(&schema, "Movie", json!({ "watchTime": "PT2H" }));
    assert_eq!(out.fragment, "this.watchTime = duration($param0)");

    let out = expect_fragment(&schema, "Movie", json!({ "watchTime_GT": "PT2H" }));
    assert_eq!(
        out.fragment,
        "(datetime() + this.watchTime) > (datetime() + duration($param0))"
    );
}

#[test]
fn temporal_values_are_validated() {
    let schema = movie_schema();

    let out = expect_fragment(
        &schema,
        "Movie",
        json!({ "released_GTE": "1999-03-31T00:00:00Z" }),
    );
    assert_eq!(out.fragment, "this.released >= $param0");

    let err = translate(&schema, "Movie", json!({ "released": "yesterday" })).unwrap_err();
    assert!(matches!(
        err,
        graphweave_translate::Error::InvalidValue { field, .. } if field == "released"
    ));

    // IN validates every element.
    let err = translate(
        &schema,
        "Movie",
        json!({ "released_IN": ["1999-03-31T00:00:00Z", "not a date"] }),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        graphweave_translate::Error::InvalidValue { .. }
    ));
}

#[test]
fn sibling_leaves_are_conjoined_in_key_order() {
    let schema = movie_schema();
    let out = expect_fragment(
        &schema,
        "Movie",
        json!({ "title": "A", "runtime_GTE": 90 }),
    );
    assert_eq!(
        out.fragment,
        "(this.runtime >= $param0 AND this.title = $param1)"
    );
    assert_eq!(out.params.get("param0"), Some(&json!(90)));
    assert_eq!(out.params.get("param1"), Some(&json!("A")));
}
