//! Compiles the coerced filter tree into the predicate AST.
//!
//! All schema classification already happened during coercion; this pass
//! builds patterns and combinators, interning variables and parameters in
//! the context as it goes. No identifiers are named here.

use graphweave_schema::{Direction, PropertyKind, RelationField};

use crate::ast::{
    BinaryOp, Comparison, ComparisonTest, Deferred, MatchPattern, PatternEnd, Predicate,
    PropertyTarget, RelSegment, ValueRendering,
};
use crate::context::{QueryContext, Variable};
use crate::error::{Error, Result};
use crate::filter::{
    ConnectionFilter, FilterExpr, PropertyFilter, RelationshipFilter, RelationshipTest,
};

/// Compiles a node-local filter list into a single predicate.
///
/// Returns `None` when the list compiles to zero predicates, the identity
/// for conjunction.
pub fn compile_filters(
    ctx: &mut QueryContext<'_>,
    target: Variable,
    filters: &[FilterExpr],
) -> Result<Option<Predicate>> {
    let mut predicates = Vec::with_capacity(filters.len());
    for filter in filters {
        if let Some(predicate) = compile_expr(ctx, target, filter)? {
            predicates.push(predicate);
        }
    }
    if predicates.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Predicate::and(predicates)))
    }
}

fn compile_expr(
    ctx: &mut QueryContext<'_>,
    target: Variable,
    expr: &FilterExpr,
) -> Result<Option<Predicate>> {
    match expr {
        FilterExpr::And(children) => compile_filters(ctx, target, children),
        FilterExpr::Or(children) => compile_or(ctx, target, children),
        FilterExpr::Property(filter) => Ok(Some(compile_property(ctx, target, filter))),
        FilterExpr::Relationship(filter) => compile_relationship(ctx, target, filter),
        FilterExpr::Connection(filter) => compile_connection(ctx, target, filter),
        FilterExpr::Aggregate(filter) => Ok(Some(Predicate::Deferred(Deferred::Aggregate {
            parent: target,
            relation: filter.field.clone(),
            input: filter.input.clone(),
        }))),
    }
}

fn compile_or(
    ctx: &mut QueryContext<'_>,
    target: Variable,
    children: &[FilterExpr],
) -> Result<Option<Predicate>> {
    if children.is_empty() {
        // A disjunction with no alternatives is unsatisfiable.
        return Ok(Some(Predicate::Or(Vec::new())));
    }
    let mut alternatives = Vec::with_capacity(children.len());
    for child in children {
        match compile_expr(ctx, target, child)? {
            Some(predicate) => alternatives.push(predicate),
            // A vacuously-true alternative makes the whole disjunction
            // vacuous; absorb it like any other empty filter.
            None => return Ok(None),
        }
    }
    Ok(Some(Predicate::or(alternatives)))
}

fn compile_property(
    ctx: &mut QueryContext<'_>,
    target: Variable,
    filter: &PropertyFilter,
) -> Predicate {
    let mut property = filter.field.db_property().to_string();
    if let Some(prefix) = &filter.prefix {
        property = format!("{prefix}{property}");
    }

    let rendering = match filter.field.kind {
        PropertyKind::Point => ValueRendering::Point,
        PropertyKind::Duration => ValueRendering::Duration,
        _ => ValueRendering::Plain,
    };

    if filter.value.is_null() {
        let test = if filter.negated {
            ComparisonTest::IsNotNull
        } else {
            ComparisonTest::IsNull
        };
        return Predicate::Comparison(Comparison {
            target: PropertyTarget::Variable(target),
            property,
            coalesce: filter.field.coalesce.clone(),
            rendering,
            test,
        });
    }

    let op = filter.operator.unwrap_or(BinaryOp::Eq);
    let param = ctx.param(filter.value.clone());
    let comparison = Predicate::Comparison(Comparison {
        target: PropertyTarget::Variable(target),
        property,
        coalesce: filter.field.coalesce.clone(),
        rendering,
        test: ComparisonTest::Op { op, param },
    });

    if filter.negated {
        Predicate::not(comparison)
    } else {
        comparison
    }
}

fn compile_relationship(
    ctx: &mut QueryContext<'_>,
    parent: Variable,
    filter: &RelationshipFilter,
) -> Result<Option<Predicate>> {
    let target_model = ctx
        .schema()
        .node(&filter.field.target)
        .ok_or_else(|| Error::MissingReferencedType(filter.field.target.clone()))?;

    let child = ctx.node_variable(target_model.labels.clone());
    let rel = ctx.relationship_variable();
    let exists_pattern = relation_pattern(&filter.field, parent, child, rel, false, false);

    match &filter.test {
        RelationshipTest::Absent { negated } => {
            // Filtering for null tests edge existence with inverted
            // polarity: "field is null" means "no such edge".
            Ok(Some(Predicate::Exists {
                pattern: exists_pattern,
                negated: !negated,
            }))
        }
        RelationshipTest::Quantified {
            quantifier,
            negated,
            filter: nested,
        } => {
            let Some(inner) = compile_filters(ctx, child, nested)? else {
                // Nothing to quantify over; the whole predicate is omitted
                // rather than emitting a vacuous quantifier.
                return Ok(None);
            };
            let bound_pattern = relation_pattern(&filter.field, parent, child, rel, true, false);
            let predicate = Predicate::And(vec![
                Predicate::Exists {
                    pattern: exists_pattern,
                    negated: false,
                },
                Predicate::Quantified {
                    quantifier: *quantifier,
                    pattern: bound_pattern,
                    binding: child,
                    inner: Box::new(inner),
                },
            ]);
            Ok(Some(if *negated {
                Predicate::not(predicate)
            } else {
                predicate
            }))
        }
    }
}

fn compile_connection(
    ctx: &mut QueryContext<'_>,
    parent: Variable,
    filter: &ConnectionFilter,
) -> Result<Option<Predicate>> {
    if filter.entries.is_empty() {
        return Ok(None);
    }

    let relation = &filter.field.relationship;
    let mut per_type = Vec::with_capacity(filter.entries.len());
    for (type_name, input) in &filter.entries {
        let model = ctx
            .schema()
            .node(type_name)
            .ok_or_else(|| Error::MissingReferencedType(type_name.clone()))?;

        let child = ctx.node_variable(model.labels.clone());
        let rel = ctx.relationship_variable();
        let projection = ctx.projection_variable(child, rel);

        let exists_pattern = relation_pattern(relation, parent, child, rel, false, false);
        // The bound pattern also binds the relationship: connection
        // predicates project { node, relationship } pairs.
        let bound_pattern = relation_pattern(relation, parent, child, rel, true, true);

        per_type.push(Predicate::And(vec![
            Predicate::Exists {
                pattern: exists_pattern,
                negated: false,
            },
            Predicate::Quantified {
                quantifier: filter.quantifier,
                pattern: bound_pattern,
                binding: projection,
                inner: Box::new(Predicate::Deferred(Deferred::Connection {
                    projection,
                    quantifier: filter.quantifier,
                    type_name: type_name.clone(),
                    rel_type: relation.rel_type.clone(),
                    input: input.clone(),
                })),
            },
        ]));
    }

    let predicate = Predicate::and(per_type);
    Ok(Some(if filter.negated {
        Predicate::not(predicate)
    } else {
        predicate
    }))
}

/// Builds the traversal pattern for a relationship field. The pattern is
/// always rendered source-to-target; an inbound field swaps the endpoints.
/// The parent endpoint shows its variable (it correlates with the outer
/// scope), the child endpoint shows its labels and, when `bind_child`,
/// its variable.
fn relation_pattern(
    field: &RelationField,
    parent: Variable,
    child: Variable,
    rel: Variable,
    bind_child: bool,
    bind_rel: bool,
) -> MatchPattern {
    let parent_end = PatternEnd {
        variable: parent,
        show_variable: true,
        show_labels: false,
    };
    let child_end = PatternEnd {
        variable: child,
        show_variable: bind_child,
        show_labels: true,
    };
    let (source, target) = match field.direction {
        Direction::Out => (parent_end, child_end),
        Direction::In => (child_end, parent_end),
    };
    MatchPattern {
        source,
        rel: RelSegment {
            variable: rel,
            rel_type: field.rel_type.clone(),
            show_variable: bind_rel,
        },
        target,
    }
}
