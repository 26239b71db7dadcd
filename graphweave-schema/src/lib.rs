use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Traversal direction of a relationship field, relative to the declaring
/// node type.
///
/// `Out` means the declaring node is the source of the edge, `In` means it
/// is the destination. Filter compilation orients match patterns
/// accordingly; the relationship type itself is direction-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Out,
    In,
}

/// Kind of a stored property, as far as filter compilation cares.
///
/// `Scalar` covers strings, numbers and booleans. `Point` and `Duration`
/// change how comparison operators are rendered (function-call forms
/// instead of plain infix); `Temporal` values are validated as RFC 3339
/// strings before being bound as parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Scalar,
    Enum,
    Temporal,
    Duration,
    Point,
}

/// A scalar/enum/temporal/point property of a node or relationship type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyField {
    /// Field name as it appears in filter keys.
    pub name: String,
    /// Stored property name, when it differs from `name`.
    pub db_name: Option<String>,
    pub kind: PropertyKind,
    /// Null-coalescing default applied to the stored property before any
    /// comparison.
    pub coalesce: Option<Value>,
}

impl PropertyField {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            db_name: None,
            kind,
            coalesce: None,
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    pub fn with_coalesce(mut self, default: Value) -> Self {
        self.coalesce = Some(default);
        self
    }

    /// The stored property name filters must compare against.
    pub fn db_property(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }
}

/// A relationship field: a traversal from the declaring node type to a
/// target node type over a typed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationField {
    /// Field name as it appears in filter keys.
    pub name: String,
    /// Relationship type on the edge, e.g. `ACTED_IN`.
    pub rel_type: String,
    /// Target node type name. Must be registered in the [`Schema`].
    pub target: String,
    pub direction: Direction,
}

impl RelationField {
    pub fn new(
        name: impl Into<String>,
        rel_type: impl Into<String>,
        target: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            name: name.into(),
            rel_type: rel_type.into(),
            target: target.into(),
            direction,
        }
    }
}

/// A connection field: an edge-property-aware projection over a
/// relationship, exposing both node-side and edge-side filters.
///
/// For a polymorphic connection, `union_members` lists the node type names
/// the connection may resolve to and the filter input is keyed by member
/// type name. A single-typed connection leaves it `None` and filter
/// compilation normalizes the input to the union shape internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionField {
    /// Field name as it appears in filter keys.
    pub name: String,
    pub relationship: RelationField,
    pub union_members: Option<Vec<String>>,
}

impl ConnectionField {
    pub fn new(name: impl Into<String>, relationship: RelationField) -> Self {
        Self {
            name: name.into(),
            relationship,
            union_members: None,
        }
    }

    pub fn with_union_members(mut self, members: Vec<String>) -> Self {
        self.union_members = Some(members);
        self
    }
}

/// Edge-property schema for a relationship type, looked up by connection
/// filter compilation when an `edge:` filter is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipModel {
    /// Relationship type name, e.g. `ACTED_IN`.
    pub name: String,
    pub properties: Vec<PropertyField>,
}

impl RelationshipModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: PropertyField) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyField> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }
}

/// An entity type: labels plus its property, relationship and connection
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeModel {
    pub name: String,
    /// Graph labels emitted in match patterns. Defaults to `[name]`.
    pub labels: Vec<String>,
    pub properties: Vec<PropertyField>,
    pub relations: Vec<RelationField>,
    pub connections: Vec<ConnectionField>,
}

impl NodeModel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            labels: vec![name.clone()],
            name,
            properties: Vec::new(),
            relations: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_property(mut self, property: PropertyField) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_relation(mut self, relation: RelationField) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_connection(mut self, connection: ConnectionField) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyField> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationField> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionField> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// All filterable field names, across every field kind. Filter-key
    /// decoding matches against these.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.relations.iter().map(|r| r.name.as_str()))
            .chain(self.connections.iter().map(|c| c.name.as_str()))
    }
}

/// Registry of the node types and relationship types known to one
/// compilation.
///
/// Produced by a separate schema-compilation phase; filter translation
/// only performs lookups against it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub nodes: Vec<NodeModel>,
    pub relationships: Vec<RelationshipModel>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: NodeModel) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipModel) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn node(&self, name: &str) -> Option<&NodeModel> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipModel> {
        self.relationships.iter().find(|r| r.name == name)
    }
}
