//! Final compilation: one pass over the predicate AST that allocates
//! identifiers through the context, resolves deferred fragments via the
//! delegate compilers, and serializes to a Cypher predicate fragment plus
//! a flat parameter map.

use serde_json::{Map, Value};

use crate::ast::{
    BinaryOp, Comparison, ComparisonTest, Deferred, MatchPattern, PatternEnd, Predicate,
    PropertyTarget, ValueRendering,
};
use crate::context::{QueryContext, Variable, VariableKind};
use crate::delegate::{AggregateArgs, ConnectionArgs, Delegates};
use crate::error::{Error, Result};

/// A compiled predicate fragment and the parameters it binds.
///
/// The fragment is meant to be embedded in a larger statement's `WHERE`
/// clause by the caller, with the parameters bound by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub fragment: String,
    pub params: Map<String, Value>,
}

/// Serializes `predicate`, assigning stable identifiers via `ctx`.
///
/// Deferred nodes are resolved here, with the delegate outputs' parameter
/// maps merged under unique `nested_param{n}` prefixes. Delegates may
/// themselves trigger further compilation; resolution is recursive, not a
/// single flat substitution.
pub fn render(
    ctx: &mut QueryContext<'_>,
    predicate: &Predicate,
    delegates: &Delegates<'_>,
) -> Result<Rendered> {
    let mut params = Map::new();
    let fragment = render_predicate(ctx, predicate, delegates, &mut params)?;
    Ok(Rendered { fragment, params })
}

fn render_predicate(
    ctx: &mut QueryContext<'_>,
    predicate: &Predicate,
    delegates: &Delegates<'_>,
    params: &mut Map<String, Value>,
) -> Result<String> {
    match predicate {
        Predicate::Comparison(comparison) => render_comparison(ctx, comparison, params),
        Predicate::Exists { pattern, negated } => {
            let pattern = render_pattern(ctx, pattern);
            if *negated {
                Ok(format!("NOT EXISTS {{ {pattern} }}"))
            } else {
                Ok(format!("EXISTS {{ {pattern} }}"))
            }
        }
        Predicate::Quantified {
            quantifier,
            pattern,
            binding,
            inner,
        } => {
            let pattern = render_pattern(ctx, pattern);
            let bind_name = ctx.variable_name(*binding);
            let head = comprehension_head(ctx, *binding);
            let inner = render_predicate(ctx, inner, delegates, params)?;
            Ok(format!(
                "{}({bind_name} IN [{pattern} | {head}] WHERE {inner})",
                quantifier.keyword()
            ))
        }
        Predicate::And(children) => {
            render_connective(ctx, children, " AND ", "true", delegates, params)
        }
        Predicate::Or(children) => {
            render_connective(ctx, children, " OR ", "false", delegates, params)
        }
        Predicate::Not(child) => {
            let inner = render_predicate(ctx, child, delegates, params)?;
            Ok(format!("NOT ({inner})"))
        }
        Predicate::Deferred(deferred) => render_deferred(ctx, deferred, delegates, params),
    }
}

fn render_connective(
    ctx: &mut QueryContext<'_>,
    children: &[Predicate],
    separator: &str,
    empty: &str,
    delegates: &Delegates<'_>,
    params: &mut Map<String, Value>,
) -> Result<String> {
    match children {
        [] => Ok(empty.to_string()),
        [single] => render_predicate(ctx, single, delegates, params),
        _ => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(render_predicate(ctx, child, delegates, params)?);
            }
            Ok(format!("({})", parts.join(separator)))
        }
    }
}

fn render_comparison(
    ctx: &mut QueryContext<'_>,
    comparison: &Comparison,
    params: &mut Map<String, Value>,
) -> Result<String> {
    let target = match &comparison.target {
        PropertyTarget::Variable(variable) => ctx.variable_name(*variable),
        PropertyTarget::Raw(accessor) => accessor.clone(),
    };
    let property = property_expr(
        &format!("{target}.{}", comparison.property),
        &comparison.coalesce,
    );

    match comparison.test {
        ComparisonTest::IsNull => Ok(format!("{property} IS NULL")),
        ComparisonTest::IsNotNull => Ok(format!("{property} IS NOT NULL")),
        ComparisonTest::Op { op, param } => {
            let name = ctx.param_name(param);
            params.insert(name.clone(), ctx.param_value(param).clone());
            Ok(render_operator(
                &property,
                op,
                &format!("${name}"),
                comparison.rendering,
            ))
        }
    }
}

/// Wraps the property access in its null-coalescing default, when one is
/// declared.
pub(crate) fn property_expr(access: &str, coalesce: &Option<Value>) -> String {
    match coalesce {
        Some(default) => format!("coalesce({access}, {})", cypher_literal(default)),
        None => access.to_string(),
    }
}

/// Renders one binary comparison. Point and duration properties use
/// function-call forms; everything else is plain infix.
pub(crate) fn render_operator(
    property: &str,
    op: BinaryOp,
    param: &str,
    rendering: ValueRendering,
) -> String {
    match rendering {
        ValueRendering::Point => match op {
            BinaryOp::Eq => format!("{property} = point({param})"),
            BinaryOp::In => format!("{property} IN [p IN {param} | point(p)]"),
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => format!(
                "distance({property}, point({param}.point)) {} {param}.distance",
                infix_symbol(op)
            ),
            // Coercion rejects string operators on point fields.
            _ => plain_operator(property, op, param),
        },
        ValueRendering::Duration => match op {
            BinaryOp::Eq => format!("{property} = duration({param})"),
            BinaryOp::In => format!("{property} IN [d IN {param} | duration(d)]"),
            // Durations are not directly ordered; anchor both sides to an
            // instant before comparing.
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => format!(
                "(datetime() + {property}) {} (datetime() + duration({param}))",
                infix_symbol(op)
            ),
            _ => plain_operator(property, op, param),
        },
        ValueRendering::Plain => plain_operator(property, op, param),
    }
}

fn plain_operator(property: &str, op: BinaryOp, param: &str) -> String {
    match op {
        BinaryOp::Eq => format!("{property} = {param}"),
        BinaryOp::In => format!("{property} IN {param}"),
        BinaryOp::Contains => format!("{property} CONTAINS {param}"),
        BinaryOp::StartsWith => format!("{property} STARTS WITH {param}"),
        BinaryOp::EndsWith => format!("{property} ENDS WITH {param}"),
        BinaryOp::Matches => format!("{property} =~ {param}"),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            format!("{property} {} {param}", infix_symbol(op))
        }
    }
}

fn infix_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Lt => "<",
        BinaryOp::Lte => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Gte => ">=",
        _ => "=",
    }
}

fn render_pattern(ctx: &mut QueryContext<'_>, pattern: &MatchPattern) -> String {
    let source = render_end(ctx, &pattern.source);
    let rel = if pattern.rel.show_variable {
        format!(
            "[{}:{}]",
            ctx.variable_name(pattern.rel.variable),
            pattern.rel.rel_type
        )
    } else {
        format!("[:{}]", pattern.rel.rel_type)
    };
    let target = render_end(ctx, &pattern.target);
    format!("{source}-{rel}->{target}")
}

fn render_end(ctx: &mut QueryContext<'_>, end: &PatternEnd) -> String {
    let name = if end.show_variable {
        ctx.variable_name(end.variable)
    } else {
        String::new()
    };
    let labels = if end.show_labels {
        match ctx.variable_kind(end.variable) {
            VariableKind::Node { labels } if !labels.is_empty() => {
                format!(":{}", labels.join(":"))
            }
            _ => String::new(),
        }
    } else {
        String::new()
    };
    format!("({name}{labels})")
}

fn comprehension_head(ctx: &mut QueryContext<'_>, binding: Variable) -> String {
    match ctx.variable_kind(binding).clone() {
        VariableKind::Projection { node, relationship } => format!(
            "{{ node: {}, relationship: {} }}",
            ctx.variable_name(node),
            ctx.variable_name(relationship)
        ),
        _ => ctx.variable_name(binding),
    }
}

fn render_deferred(
    ctx: &mut QueryContext<'_>,
    deferred: &Deferred,
    delegates: &Delegates<'_>,
    params: &mut Map<String, Value>,
) -> Result<String> {
    match deferred {
        Deferred::Aggregate {
            parent,
            relation,
            input,
        } => {
            let schema = ctx.schema();
            let node = schema
                .node(&relation.target)
                .ok_or_else(|| Error::MissingReferencedType(relation.target.clone()))?;
            let parent_name = ctx.variable_name(*parent);
            let prefix = ctx.nested_param_prefix();
            let out = delegates.aggregate.compile(&AggregateArgs {
                schema,
                node,
                relation,
                parent: parent_name,
                param_prefix: prefix.clone(),
                input,
            })?;
            if !out.params.is_empty() {
                params.insert(prefix, Value::Object(out.params));
            }
            Ok(out.fragment)
        }
        Deferred::Connection {
            projection,
            quantifier,
            type_name,
            rel_type,
            input,
        } => {
            let schema = ctx.schema();
            let node = schema
                .node(type_name)
                .ok_or_else(|| Error::MissingReferencedType(type_name.clone()))?;
            let relationship = schema.relationship(rel_type);
            let projection_name = ctx.variable_name(*projection);
            let prefix = ctx.nested_param_prefix();
            let out = delegates.connection.compile(&ConnectionArgs {
                schema,
                node,
                relationship,
                rel_type,
                node_accessor: format!("{projection_name}.node"),
                edge_accessor: format!("{projection_name}.relationship"),
                param_prefix: prefix.clone(),
                quantifier: *quantifier,
                input,
            })?;
            if !out.params.is_empty() {
                params.insert(prefix, Value::Object(out.params));
            }
            Ok(out.fragment)
        }
    }
}

/// Renders a JSON value as an inline Cypher literal. Only coalesce
/// defaults are inlined; user-filter values are always parameters.
pub(crate) fn cypher_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(cypher_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", cypher_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}
