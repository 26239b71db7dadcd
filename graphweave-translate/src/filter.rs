//! Schema-aware coercion of a raw where-input into a discriminated filter
//! tree.
//!
//! Every leaf is classified against schema metadata exactly once, in
//! priority order: aggregate-marked relationship, relationship, connection,
//! then property. The predicate compiler downstream never re-derives leaf
//! kinds from key strings.

use graphweave_schema::{
    ConnectionField, NodeModel, PropertyField, PropertyKind, RelationField, Schema,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ast::{BinaryOp, Quantifier};
use crate::error::{Error, Result};
use crate::where_key::{self, Operator, ParsedKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Property(PropertyFilter),
    Relationship(RelationshipFilter),
    Connection(ConnectionFilter),
    Aggregate(AggregateFilter),
}

/// A comparison against a scalar/enum/temporal/point/duration property.
/// `operator: None` is plain equality; a null `value` tests nullness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub field: PropertyField,
    /// Accessor prefix (with trailing dot) prepended to the stored name.
    pub prefix: Option<String>,
    pub operator: Option<BinaryOp>,
    pub negated: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipFilter {
    pub field: RelationField,
    pub test: RelationshipTest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationshipTest {
    /// The filter value was literal null: an edge-existence test.
    /// `negated` inverts polarity ("field is null" means "edge absent").
    Absent { negated: bool },
    /// A quantified test over related nodes. `negated` wraps the whole
    /// predicate in a logical negation (`NOT_ALL` and friends).
    Quantified {
        quantifier: Quantifier,
        negated: bool,
        filter: Vec<FilterExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionFilter {
    pub field: ConnectionField,
    pub quantifier: Quantifier,
    pub negated: bool,
    /// Per-member-type connection inputs, normalized to the union shape:
    /// a single-typed connection contributes one entry keyed by its target
    /// type.
    pub entries: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFilter {
    pub field: RelationField,
    pub input: Value,
}

/// Coerces a where-input object into filter expressions for `node`.
///
/// An empty input yields an empty list ("no predicate"). Nesting past
/// `max_depth` fails with [`Error::FilterTooComplex`] before any stack
/// budget is at risk.
pub fn parse_where(
    schema: &Schema,
    node: &NodeModel,
    input: &Value,
    max_depth: usize,
) -> Result<Vec<FilterExpr>> {
    let obj = expect_object(input, &node.name)?;
    parse_object(schema, node, obj, 1, max_depth)
}

fn parse_object(
    schema: &Schema,
    node: &NodeModel,
    obj: &Map<String, Value>,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<FilterExpr>> {
    if depth > max_depth {
        return Err(Error::FilterTooComplex(max_depth));
    }

    let mut out = Vec::new();

    // Leaf predicates first, logical combinators after; sibling leaves and
    // sibling groups are conjoined by the compiler.
    for (key, value) in obj {
        if key == "AND" || key == "OR" {
            continue;
        }
        out.push(parse_leaf(schema, node, key, value, depth, max_depth)?);
    }

    for (key, value) in obj {
        let is_or = match key.as_str() {
            "OR" => true,
            "AND" => false,
            _ => continue,
        };
        let elements = value.as_array().ok_or_else(|| Error::InvalidValue {
            field: key.clone(),
            reason: "logical combinators take a list of where inputs".to_string(),
        })?;

        let mut parsed_elements = Vec::with_capacity(elements.len());
        for element in elements {
            let element_obj = expect_object(element, key)?;
            parsed_elements.push(parse_object(schema, node, element_obj, depth + 1, max_depth)?);
        }

        if is_or {
            // Each element is its own conjunction; the OR ranges over the
            // per-element results.
            let alternatives = parsed_elements
                .into_iter()
                .map(|mut filters| {
                    if filters.len() == 1 {
                        filters.remove(0)
                    } else {
                        FilterExpr::And(filters)
                    }
                })
                .collect();
            out.push(FilterExpr::Or(alternatives));
        } else {
            out.push(FilterExpr::And(
                parsed_elements.into_iter().flatten().collect(),
            ));
        }
    }

    Ok(out)
}

fn parse_leaf(
    schema: &Schema,
    node: &NodeModel,
    key: &str,
    value: &Value,
    depth: usize,
    max_depth: usize,
) -> Result<FilterExpr> {
    let parsed = where_key::parse_key(node.field_names(), &node.name, key)?;

    if parsed.aggregate {
        let relation = node
            .relation(parsed.field_name)
            .ok_or_else(|| Error::InvalidAggregateTarget(parsed.field_name.to_string()))?;
        if schema.node(&relation.target).is_none() {
            return Err(Error::MissingReferencedType(relation.target.clone()));
        }
        return Ok(FilterExpr::Aggregate(AggregateFilter {
            field: relation.clone(),
            input: value.clone(),
        }));
    }

    if let Some(relation) = node.relation(parsed.field_name) {
        return parse_relationship(schema, relation, &parsed, value, depth, max_depth);
    }

    if let Some(connection) = node.connection(parsed.field_name) {
        return parse_connection(schema, connection, &parsed, value);
    }

    let field = node
        .property(parsed.field_name)
        .ok_or_else(|| Error::UnknownField {
            field: parsed.field_name.to_string(),
            type_name: node.name.clone(),
        })?;
    coerce_property(field, &parsed, value).map(FilterExpr::Property)
}

fn parse_relationship(
    schema: &Schema,
    relation: &RelationField,
    parsed: &ParsedKey<'_>,
    value: &Value,
    depth: usize,
    max_depth: usize,
) -> Result<FilterExpr> {
    if value.is_null() {
        return Ok(FilterExpr::Relationship(RelationshipFilter {
            field: relation.clone(),
            test: RelationshipTest::Absent {
                negated: parsed.negated,
            },
        }));
    }

    let (quantifier, negated) = quantifier_for(parsed)?;
    let target = schema
        .node(&relation.target)
        .ok_or_else(|| Error::MissingReferencedType(relation.target.clone()))?;
    let obj = expect_object(value, parsed.field_name)?;
    let filter = parse_object(schema, target, obj, depth + 1, max_depth)?;

    Ok(FilterExpr::Relationship(RelationshipFilter {
        field: relation.clone(),
        test: RelationshipTest::Quantified {
            quantifier,
            negated,
            filter,
        },
    }))
}

fn parse_connection(
    schema: &Schema,
    connection: &ConnectionField,
    parsed: &ParsedKey<'_>,
    value: &Value,
) -> Result<FilterExpr> {
    let (quantifier, negated) = quantifier_for(parsed)?;
    let obj = expect_object(value, parsed.field_name)?;

    // Normalize the single-typed case to the union shape: one entry keyed
    // by the relationship's target type.
    let entries: Vec<(String, Value)> = match &connection.union_members {
        None => vec![(
            connection.relationship.target.clone(),
            Value::Object(obj.clone()),
        )],
        Some(members) => {
            let mut entries = Vec::with_capacity(obj.len());
            for (member, input) in obj {
                if !members.iter().any(|m| m == member) {
                    return Err(Error::MissingReferencedType(member.clone()));
                }
                entries.push((member.clone(), input.clone()));
            }
            entries
        }
    };

    for (member, _) in &entries {
        if schema.node(member).is_none() {
            return Err(Error::MissingReferencedType(member.clone()));
        }
    }

    Ok(FilterExpr::Connection(ConnectionFilter {
        field: connection.clone(),
        quantifier,
        negated,
        entries,
    }))
}

/// Validates and coerces a single property leaf. Also used by the built-in
/// connection compiler for `node:`/`edge:` sides.
pub(crate) fn coerce_property(
    field: &PropertyField,
    parsed: &ParsedKey<'_>,
    value: &Value,
) -> Result<PropertyFilter> {
    let operator = match parsed.operator {
        None => {
            if parsed.negated && !value.is_null() {
                // Bare NOT only makes sense as IS NOT NULL here.
                return Err(unsupported(parsed));
            }
            None
        }
        Some(op) => Some(property_operator(field, parsed, op)?),
    };

    if field.kind == PropertyKind::Temporal && !value.is_null() {
        validate_temporal(field, operator, value)?;
    }

    Ok(PropertyFilter {
        field: field.clone(),
        prefix: parsed.prefix.map(str::to_string),
        operator,
        negated: parsed.negated,
        value: value.clone(),
    })
}

fn property_operator(
    field: &PropertyField,
    parsed: &ParsedKey<'_>,
    op: Operator,
) -> Result<BinaryOp> {
    let mapped = match op {
        Operator::Lt => BinaryOp::Lt,
        Operator::Lte => BinaryOp::Lte,
        Operator::Gt => BinaryOp::Gt,
        Operator::Gte => BinaryOp::Gte,
        Operator::Contains => BinaryOp::Contains,
        Operator::StartsWith => BinaryOp::StartsWith,
        Operator::EndsWith => BinaryOp::EndsWith,
        Operator::Matches => BinaryOp::Matches,
        Operator::In => BinaryOp::In,
        // Explicitly unsupported; the operator exists in the vocabulary but
        // has no defined semantics.
        Operator::Includes => return Err(unsupported(parsed)),
        // Quantifiers only apply to relationship and connection fields.
        Operator::All | Operator::None | Operator::Single | Operator::Some => {
            return Err(unsupported(parsed));
        }
    };

    if matches!(field.kind, PropertyKind::Point | PropertyKind::Duration)
        && matches!(
            mapped,
            BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith | BinaryOp::Matches
        )
    {
        return Err(unsupported(parsed));
    }

    Ok(mapped)
}

fn validate_temporal(field: &PropertyField, operator: Option<BinaryOp>, value: &Value) -> Result<()> {
    let check = |v: &Value| -> Result<()> {
        let s = v.as_str().ok_or_else(|| Error::InvalidValue {
            field: field.name.clone(),
            reason: "temporal values must be RFC 3339 strings".to_string(),
        })?;
        chrono::DateTime::parse_from_rfc3339(s).map_err(|e| Error::InvalidValue {
            field: field.name.clone(),
            reason: format!("invalid RFC 3339 timestamp: {e}"),
        })?;
        Ok(())
    };

    if operator == Some(BinaryOp::In) {
        let list = value.as_array().ok_or_else(|| Error::InvalidValue {
            field: field.name.clone(),
            reason: "IN takes a list".to_string(),
        })?;
        for item in list {
            check(item)?;
        }
        Ok(())
    } else {
        check(value)
    }
}

fn quantifier_for(parsed: &ParsedKey<'_>) -> Result<(Quantifier, bool)> {
    match parsed.operator {
        // Bare NOT on a relationship is shorthand for NONE.
        None if parsed.negated => Ok((Quantifier::None, false)),
        None => Ok((Quantifier::Any, false)),
        Some(Operator::All) => Ok((Quantifier::All, parsed.negated)),
        Some(Operator::None) => Ok((Quantifier::None, parsed.negated)),
        Some(Operator::Single) => Ok((Quantifier::Single, parsed.negated)),
        Some(Operator::Some) => Ok((Quantifier::Any, parsed.negated)),
        Some(_) => Err(unsupported(parsed)),
    }
}

fn unsupported(parsed: &ParsedKey<'_>) -> Error {
    let operator = match (parsed.operator, parsed.negated) {
        (Some(op), true) => format!("NOT_{}", op.as_str()),
        (Some(op), false) => op.as_str().to_string(),
        (None, _) => "NOT".to_string(),
    };
    Error::UnsupportedOperator {
        operator,
        field: parsed.field_name.to_string(),
    }
}

fn expect_object<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| Error::InvalidValue {
        field: what.to_string(),
        reason: "expected a where-input object".to_string(),
    })
}
