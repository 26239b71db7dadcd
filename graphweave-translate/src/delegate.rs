//! Delegate contract for deferred fragments.
//!
//! Connection and aggregate predicates need identifiers that only exist
//! once the final compiler has allocated them, so their bodies are compiled
//! by delegates that receive the allocated accessor names and a unique
//! parameter prefix, and hand back a fragment plus a local parameter map.
//! The built-in delegates cover property-level connection filters and
//! count aggregates; callers with richer needs supply their own.

use serde_json::{Map, Value};

use graphweave_schema::{
    Direction, NodeModel, PropertyKind, RelationField, RelationshipModel, Schema,
};

use crate::ast::{BinaryOp, Quantifier, ValueRendering};
use crate::error::{Error, Result};
use crate::filter::{self, PropertyFilter};
use crate::render::{property_expr, render_operator};
use crate::where_key::{self, Operator};

/// A delegate-compiled fragment with its locally named parameters. The
/// caller nests the parameter map under the prefix the delegate was given.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateOutput {
    pub fragment: String,
    pub params: Map<String, Value>,
}

/// Inputs for compiling one connection filter body.
pub struct ConnectionArgs<'a> {
    pub schema: &'a Schema,
    pub node: &'a NodeModel,
    /// Relationship model carrying edge properties, when declared.
    pub relationship: Option<&'a RelationshipModel>,
    pub rel_type: &'a str,
    /// Accessor for the projected node, e.g. `var2.node`.
    pub node_accessor: String,
    /// Accessor for the projected relationship, e.g. `var2.relationship`.
    pub edge_accessor: String,
    /// Prefix the output's parameters will be nested under.
    pub param_prefix: String,
    pub quantifier: Quantifier,
    pub input: &'a Value,
}

/// Inputs for compiling one aggregate filter body.
pub struct AggregateArgs<'a> {
    pub schema: &'a Schema,
    /// The related node type being aggregated over.
    pub node: &'a NodeModel,
    pub relation: &'a RelationField,
    /// The parent variable's allocated identifier.
    pub parent: String,
    pub param_prefix: String,
    pub input: &'a Value,
}

pub trait ConnectionFilterCompiler {
    fn compile(&self, args: &ConnectionArgs<'_>) -> Result<DelegateOutput>;
}

pub trait AggregateFilterCompiler {
    fn compile(&self, args: &AggregateArgs<'_>) -> Result<DelegateOutput>;
}

/// The delegate pair the final compiler resolves deferred fragments with.
#[derive(Clone, Copy)]
pub struct Delegates<'a> {
    pub connection: &'a dyn ConnectionFilterCompiler,
    pub aggregate: &'a dyn AggregateFilterCompiler,
}

impl Delegates<'_> {
    /// The built-in delegates.
    pub fn basic() -> Delegates<'static> {
        Delegates {
            connection: &BasicConnectionFilterCompiler,
            aggregate: &BasicAggregateFilterCompiler,
        }
    }
}

impl Default for Delegates<'static> {
    fn default() -> Self {
        Delegates::basic()
    }
}

/// Compiles `node:`/`edge:` property filters against the projected pair,
/// with `AND`/`OR` combinators. Nested relationship traversal from inside
/// a connection body is out of scope for the built-in delegate.
pub struct BasicConnectionFilterCompiler;

impl ConnectionFilterCompiler for BasicConnectionFilterCompiler {
    fn compile(&self, args: &ConnectionArgs<'_>) -> Result<DelegateOutput> {
        let mut params = Map::new();
        let mut next_param = 0usize;
        let fragment = compile_connection_input(args, args.input, &mut params, &mut next_param)?;
        Ok(DelegateOutput { fragment, params })
    }
}

fn compile_connection_input(
    args: &ConnectionArgs<'_>,
    input: &Value,
    params: &mut Map<String, Value>,
    next_param: &mut usize,
) -> Result<String> {
    let obj = input.as_object().ok_or_else(|| Error::InvalidValue {
        field: args.node.name.clone(),
        reason: "expected a connection where-input object".to_string(),
    })?;

    let mut parts = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        match key.as_str() {
            "node" | "node_NOT" => {
                let body = compile_side(
                    &args.node_accessor,
                    args.node.properties.iter(),
                    &args.node.name,
                    value,
                    &args.param_prefix,
                    params,
                    next_param,
                )?;
                parts.push(negate_if(key.ends_with("_NOT"), body));
            }
            "edge" | "edge_NOT" => {
                let relationship = args.relationship.ok_or_else(|| Error::UnknownField {
                    field: key.clone(),
                    type_name: args.rel_type.to_string(),
                })?;
                let body = compile_side(
                    &args.edge_accessor,
                    relationship.properties.iter(),
                    &relationship.name,
                    value,
                    &args.param_prefix,
                    params,
                    next_param,
                )?;
                parts.push(negate_if(key.ends_with("_NOT"), body));
            }
            "AND" | "OR" => {
                let elements = value.as_array().ok_or_else(|| Error::InvalidValue {
                    field: key.clone(),
                    reason: "logical combinators take a list of where inputs".to_string(),
                })?;
                let mut branches = Vec::with_capacity(elements.len());
                for element in elements {
                    branches.push(compile_connection_input(args, element, params, next_param)?);
                }
                parts.push(join(branches, if key == "OR" { " OR " } else { " AND " }, "false"));
            }
            other => {
                return Err(Error::UnknownField {
                    field: other.to_string(),
                    type_name: args.node.name.clone(),
                });
            }
        }
    }

    Ok(join(parts, " AND ", "true"))
}

/// Compiles the property comparisons of one `node:`/`edge:` side against
/// its accessor.
fn compile_side<'f>(
    accessor: &str,
    fields: impl Iterator<Item = &'f graphweave_schema::PropertyField> + Clone,
    type_name: &str,
    input: &Value,
    param_prefix: &str,
    params: &mut Map<String, Value>,
    next_param: &mut usize,
) -> Result<String> {
    let obj = input.as_object().ok_or_else(|| Error::InvalidValue {
        field: type_name.to_string(),
        reason: "expected a where-input object".to_string(),
    })?;

    let mut parts = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        let parsed = where_key::parse_key(
            fields.clone().map(|f| f.name.as_str()),
            type_name,
            key,
        )?;
        let field = fields
            .clone()
            .find(|f| f.name == parsed.field_name)
            .ok_or_else(|| Error::UnknownField {
                field: parsed.field_name.to_string(),
                type_name: type_name.to_string(),
            })?;
        let coerced = filter::coerce_property(field, &parsed, value)?;
        parts.push(render_property_comparison(
            accessor,
            &coerced,
            param_prefix,
            params,
            next_param,
        ));
    }

    Ok(join(parts, " AND ", "true"))
}

fn render_property_comparison(
    accessor: &str,
    coerced: &PropertyFilter,
    param_prefix: &str,
    params: &mut Map<String, Value>,
    next_param: &mut usize,
) -> String {
    let property = property_expr(
        &format!("{accessor}.{}", coerced.field.db_property()),
        &coerced.field.coalesce,
    );

    if coerced.value.is_null() {
        return if coerced.negated {
            format!("{property} IS NOT NULL")
        } else {
            format!("{property} IS NULL")
        };
    }

    let local = format!("p{}", *next_param);
    *next_param += 1;
    params.insert(local.clone(), coerced.value.clone());

    let rendering = match coerced.field.kind {
        PropertyKind::Point => ValueRendering::Point,
        PropertyKind::Duration => ValueRendering::Duration,
        _ => ValueRendering::Plain,
    };
    let op = coerced.operator.unwrap_or(BinaryOp::Eq);
    let body = render_operator(&property, op, &format!("${param_prefix}.{local}"), rendering);
    negate_if(coerced.negated, body)
}

/// Compiles `count` family aggregate filters over the relationship's
/// traversal via a size-of-comprehension expression.
pub struct BasicAggregateFilterCompiler;

impl AggregateFilterCompiler for BasicAggregateFilterCompiler {
    fn compile(&self, args: &AggregateArgs<'_>) -> Result<DelegateOutput> {
        let obj = args.input.as_object().ok_or_else(|| Error::InvalidValue {
            field: args.relation.name.clone(),
            reason: "expected an aggregate where-input object".to_string(),
        })?;

        let count_expr = aggregate_count_expr(args);

        let mut params = Map::new();
        let mut next_param = 0usize;
        let mut parts = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            let parsed =
                where_key::parse_key(["count"].into_iter(), &args.relation.name, key)?;
            let op = match parsed.operator {
                None => BinaryOp::Eq,
                Some(Operator::Lt) => BinaryOp::Lt,
                Some(Operator::Lte) => BinaryOp::Lte,
                Some(Operator::Gt) => BinaryOp::Gt,
                Some(Operator::Gte) => BinaryOp::Gte,
                Some(other) => {
                    return Err(Error::UnsupportedOperator {
                        operator: other.as_str().to_string(),
                        field: key.clone(),
                    });
                }
            };

            let local = format!("p{next_param}");
            next_param += 1;
            params.insert(local.clone(), value.clone());

            let body = render_operator(
                &count_expr,
                op,
                &format!("${}.{local}", args.param_prefix),
                ValueRendering::Plain,
            );
            parts.push(negate_if(parsed.negated, body));
        }

        Ok(DelegateOutput {
            fragment: join(parts, " AND ", "true"),
            params,
        })
    }
}

fn aggregate_count_expr(args: &AggregateArgs<'_>) -> String {
    let labels = if args.node.labels.is_empty() {
        String::new()
    } else {
        format!(":{}", args.node.labels.join(":"))
    };
    let parent = format!("({})", args.parent);
    let child = format!("({labels})");
    let (source, target) = match args.relation.direction {
        Direction::Out => (parent, child),
        Direction::In => (child, parent),
    };
    format!(
        "size([{source}-[:{}]->{target} | 1])",
        args.relation.rel_type
    )
}

fn negate_if(negated: bool, body: String) -> String {
    if negated {
        format!("NOT ({body})")
    } else {
        body
    }
}

fn join(parts: Vec<String>, separator: &str, empty: &str) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(separator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphweave_schema::PropertyField;

    fn person() -> NodeModel {
        NodeModel::new("Person")
            .with_property(PropertyField::new("name", PropertyKind::Scalar))
            .with_property(PropertyField::new("age", PropertyKind::Scalar))
    }

    fn schema() -> Schema {
        Schema::new().with_node(person())
    }

    #[test]
    fn connection_node_side_uses_projected_accessor() {
        let schema = schema();
        let node = person();
        let input = serde_json::json!({ "node": { "name": "Tom", "age_GT": 30 } });
        let args = ConnectionArgs {
            schema: &schema,
            node: &node,
            relationship: None,
            rel_type: "ACTED_IN",
            node_accessor: "var2.node".to_string(),
            edge_accessor: "var2.relationship".to_string(),
            param_prefix: "nested_param0".to_string(),
            quantifier: Quantifier::Any,
            input: &input,
        };
        let out = BasicConnectionFilterCompiler.compile(&args).unwrap();
        assert_eq!(
            out.fragment,
            "(var2.node.age > $nested_param0.p0 AND var2.node.name = $nested_param0.p1)"
        );
        assert_eq!(out.params.get("p0"), Some(&serde_json::json!(30)));
        assert_eq!(out.params.get("p1"), Some(&serde_json::json!("Tom")));
    }

    #[test]
    fn edge_filter_without_relationship_model_is_rejected() {
        let schema = schema();
        let node = person();
        let input = serde_json::json!({ "edge": { "role": "lead" } });
        let args = ConnectionArgs {
            schema: &schema,
            node: &node,
            relationship: None,
            rel_type: "ACTED_IN",
            node_accessor: "var2.node".to_string(),
            edge_accessor: "var2.relationship".to_string(),
            param_prefix: "nested_param0".to_string(),
            quantifier: Quantifier::Any,
            input: &input,
        };
        let err = BasicConnectionFilterCompiler.compile(&args).unwrap_err();
        assert!(matches!(err, Error::UnknownField { field, .. } if field == "edge"));
    }

    #[test]
    fn aggregate_count_renders_size_comprehension() {
        let schema = schema();
        let node = person();
        let relation = RelationField::new("actors", "ACTED_IN", "Person", Direction::In);
        let input = serde_json::json!({ "count_GT": 2 });
        let args = AggregateArgs {
            schema: &schema,
            node: &node,
            relation: &relation,
            parent: "this".to_string(),
            param_prefix: "nested_param0".to_string(),
            input: &input,
        };
        let out = BasicAggregateFilterCompiler.compile(&args).unwrap();
        assert_eq!(
            out.fragment,
            "size([(:Person)-[:ACTED_IN]->(this) | 1]) > $nested_param0.p0"
        );
        assert_eq!(out.params.get("p0"), Some(&serde_json::json!(2)));
    }
}
