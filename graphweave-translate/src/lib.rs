//! Translates schema-typed where-filter inputs into parameterized Cypher
//! predicate fragments.

pub mod ast;
pub mod compile;
pub mod context;
pub mod delegate;
pub mod error;
pub mod filter;
pub mod render;
pub mod where_key;

pub use context::{DEFAULT_MAX_DEPTH, Param, QueryContext, Variable};
pub use delegate::{
    AggregateArgs, AggregateFilterCompiler, BasicAggregateFilterCompiler,
    BasicConnectionFilterCompiler, ConnectionArgs, ConnectionFilterCompiler, DelegateOutput,
    Delegates,
};
pub use error::{Error, Result};
pub use render::Rendered;

use graphweave_schema::NodeModel;
use serde_json::Value;

/// Translates a where-input for `node` into a predicate fragment over the
/// `target` variable, using the built-in delegate compilers.
///
/// Returns `Ok(None)` when the input compiles to no predicate at all (an
/// empty object, or a filter absorbed by an empty nested filter); callers
/// then emit no `WHERE` clause.
///
/// # Example
///
/// ```ignore
/// let mut ctx = QueryContext::new(&schema);
/// let this = ctx.node_variable_named("this", movie.labels.clone());
/// let rendered = translate_where(&mut ctx, movie, this, &input)?;
/// if let Some(rendered) = rendered {
///     query.push_str(" WHERE ");
///     query.push_str(&rendered.fragment);
/// }
/// ```
pub fn translate_where(
    ctx: &mut QueryContext<'_>,
    node: &NodeModel,
    target: Variable,
    input: &Value,
) -> Result<Option<Rendered>> {
    translate_where_with(ctx, node, target, input, &Delegates::basic())
}

/// Like [`translate_where`], with caller-supplied delegate compilers for
/// connection and aggregate filter bodies.
pub fn translate_where_with(
    ctx: &mut QueryContext<'_>,
    node: &NodeModel,
    target: Variable,
    input: &Value,
    delegates: &Delegates<'_>,
) -> Result<Option<Rendered>> {
    let filters = filter::parse_where(ctx.schema(), node, input, ctx.max_depth())?;
    let Some(predicate) = compile::compile_filters(ctx, target, &filters)? else {
        return Ok(None);
    };
    render::render(ctx, &predicate, delegates).map(Some)
}
