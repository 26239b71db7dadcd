use graphweave_schema::{
    ConnectionField, Direction, NodeModel, PropertyField, PropertyKind, RelationField,
    RelationshipModel, Schema,
};
use graphweave_translate::{QueryContext, Rendered, Result, translate_where};
use serde_json::Value;

/// A movie-catalog schema exercising every field kind.
pub fn movie_schema() -> Schema {
    let movie = NodeModel::new("Movie")
        .with_property(PropertyField::new("title", PropertyKind::Scalar))
        .with_property(PropertyField::new("runtime", PropertyKind::Scalar))
        .with_property(PropertyField::new("released", PropertyKind::Temporal))
        .with_property(PropertyField::new("location", PropertyKind::Point))
        .with_property(PropertyField::new("watchTime", PropertyKind::Duration))
        .with_property(
            PropertyField::new("rating", PropertyKind::Scalar).with_db_name("imdbRating"),
        )
        .with_property(
            PropertyField::new("tagline", PropertyKind::Scalar)
                .with_coalesce(serde_json::json!("n/a")),
        )
        .with_relation(RelationField::new("actors", "ACTED_IN", "Actor", Direction::In))
        .with_relation(RelationField::new("genres", "IN_GENRE", "Genre", Direction::Out))
        .with_connection(ConnectionField::new(
            "actorsConnection",
            RelationField::new("actors", "ACTED_IN", "Actor", Direction::In),
        ));

    let actor = NodeModel::new("Actor")
        .with_property(PropertyField::new("name", PropertyKind::Scalar))
        .with_relation(RelationField::new("movies", "ACTED_IN", "Movie", Direction::Out))
        .with_connection(
            ConnectionField::new(
                "productionsConnection",
                RelationField::new("productions", "ACTED_IN", "Movie", Direction::Out),
            )
            .with_union_members(vec!["Movie".to_string(), "Series".to_string()]),
        );

    let genre = NodeModel::new("Genre").with_property(PropertyField::new("name", PropertyKind::Scalar));
    let series = NodeModel::new("Series").with_property(PropertyField::new("title", PropertyKind::Scalar));

    Schema::new()
        .with_node(movie)
        .with_node(actor)
        .with_node(genre)
        .with_node(series)
        .with_relationship(
            RelationshipModel::new("ACTED_IN")
                .with_property(PropertyField::new("role", PropertyKind::Scalar))
                .with_property(PropertyField::new("screenTime", PropertyKind::Scalar)),
        )
}

/// Translates `input` for the named type with `this` bound as the target
/// variable.
pub fn translate(schema: &Schema, type_name: &str, input: Value) -> Result<Option<Rendered>> {
    let node = schema.node(type_name).expect("fixture type");
    let mut ctx = QueryContext::new(schema);
    let this = ctx.node_variable_named("this", node.labels.clone());
    translate_where(&mut ctx, node, this, &input)
}

/// Translation that must produce a fragment.
pub fn expect_fragment(schema: &Schema, type_name: &str, input: Value) -> Rendered {
    translate(schema, type_name, input)
        .expect("translation succeeds")
        .expect("produces a predicate")
}
