//! Per-compilation state: interned variable/parameter handles and the
//! identifier allocation tables the final compiler fills in.
//!
//! Handles are indices into arenas owned by the [`QueryContext`], so two
//! structurally identical variables are still distinct identities: the
//! context names handles, never shapes. Names are assigned on first sight
//! during rendering, monotonically, and a handle keeps its name for the
//! rest of the compilation.

use std::collections::BTreeSet;

use graphweave_schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default bound on filter nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Opaque identity-bearing handle for a query variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable(pub(crate) usize);

/// Opaque identity-bearing handle for a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param(pub(crate) usize);

/// Structural metadata carried by a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariableKind {
    /// A graph node binding with its type labels.
    Node { labels: Vec<String> },
    /// A relationship binding.
    Relationship,
    /// A `{ node, relationship }` pair projected by connection predicates.
    Projection {
        node: Variable,
        relationship: Variable,
    },
}

#[derive(Debug, Clone)]
struct VariableSlot {
    kind: VariableKind,
    name: Option<String>,
}

#[derive(Debug, Clone)]
struct ParamSlot {
    value: Value,
    name: Option<String>,
}

/// Mutable state for one filter compilation.
///
/// A context is exclusively owned by one in-flight compilation; callers
/// construct a fresh one per request and discard it after rendering.
pub struct QueryContext<'s> {
    schema: &'s Schema,
    vars: Vec<VariableSlot>,
    params: Vec<ParamSlot>,
    reserved: BTreeSet<String>,
    next_var: usize,
    next_param: usize,
    next_nested: usize,
    max_depth: usize,
}

impl<'s> QueryContext<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            vars: Vec::new(),
            params: Vec::new(),
            reserved: BTreeSet::new(),
            next_var: 0,
            next_param: 0,
            next_nested: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Marks a name as externally taken so generated identifiers never
    /// collide with it.
    pub fn reserve_name(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// Interns a node variable; its name is assigned on first sight during
    /// rendering.
    pub fn node_variable(&mut self, labels: Vec<String>) -> Variable {
        self.intern(VariableKind::Node { labels }, None)
    }

    /// Interns a node variable under an externally supplied name, e.g. the
    /// caller's `this` binding. The name is reserved immediately.
    pub fn node_variable_named(&mut self, name: impl Into<String>, labels: Vec<String>) -> Variable {
        let name = name.into();
        self.reserved.insert(name.clone());
        self.intern(VariableKind::Node { labels }, Some(name))
    }

    pub fn relationship_variable(&mut self) -> Variable {
        self.intern(VariableKind::Relationship, None)
    }

    pub fn projection_variable(&mut self, node: Variable, relationship: Variable) -> Variable {
        self.intern(VariableKind::Projection { node, relationship }, None)
    }

    fn intern(&mut self, kind: VariableKind, name: Option<String>) -> Variable {
        self.vars.push(VariableSlot { kind, name });
        Variable(self.vars.len() - 1)
    }

    pub fn variable_kind(&self, variable: Variable) -> &VariableKind {
        &self.vars[variable.0].kind
    }

    /// Binds a value, returning a parameter handle.
    pub fn param(&mut self, value: Value) -> Param {
        self.params.push(ParamSlot { value, name: None });
        Param(self.params.len() - 1)
    }

    pub fn param_value(&self, param: Param) -> &Value {
        &self.params[param.0].value
    }

    /// Resolves a variable handle to its identifier, allocating one on
    /// first sight. Repeated lookups of the same handle return the same
    /// identifier.
    pub fn variable_name(&mut self, variable: Variable) -> String {
        if let Some(name) = &self.vars[variable.0].name {
            return name.clone();
        }
        let name = loop {
            let candidate = format!("var{}", self.next_var);
            self.next_var += 1;
            if !self.reserved.contains(&candidate) {
                break candidate;
            }
        };
        self.reserved.insert(name.clone());
        self.vars[variable.0].name = Some(name.clone());
        name
    }

    /// Resolves a parameter handle to its placeholder name, allocating one
    /// on first sight.
    pub fn param_name(&mut self, param: Param) -> String {
        if let Some(name) = &self.params[param.0].name {
            return name.clone();
        }
        let name = loop {
            let candidate = format!("param{}", self.next_param);
            self.next_param += 1;
            if !self.reserved.contains(&candidate) {
                break candidate;
            }
        };
        self.reserved.insert(name.clone());
        self.params[param.0].name = Some(name.clone());
        name
    }

    /// Allocates a unique prefix for a nested parameter map produced by a
    /// delegate compiler.
    pub fn nested_param_prefix(&mut self) -> String {
        let name = loop {
            let candidate = format!("nested_param{}", self.next_nested);
            self.next_nested += 1;
            if !self.reserved.contains(&candidate) {
                break candidate;
            }
        };
        self.reserved.insert(name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_handles_get_distinct_names() {
        let schema = Schema::new();
        let mut ctx = QueryContext::new(&schema);

        // Structurally identical, still two identities.
        let a = ctx.node_variable(vec!["Movie".to_string()]);
        let b = ctx.node_variable(vec!["Movie".to_string()]);

        let name_a = ctx.variable_name(a);
        let name_b = ctx.variable_name(b);
        assert_ne!(name_a, name_b);

        // Identity-stable across repeated lookups.
        assert_eq!(ctx.variable_name(a), name_a);
        assert_eq!(ctx.variable_name(b), name_b);
    }

    #[test]
    fn generated_names_skip_reserved() {
        let schema = Schema::new();
        let mut ctx = QueryContext::new(&schema);
        ctx.reserve_name("var0");
        ctx.reserve_name("param0");

        let v = ctx.node_variable(vec![]);
        assert_eq!(ctx.variable_name(v), "var1");

        let p = ctx.param(serde_json::json!(1));
        assert_eq!(ctx.param_name(p), "param1");
    }

    #[test]
    fn named_variable_keeps_external_name() {
        let schema = Schema::new();
        let mut ctx = QueryContext::new(&schema);
        let this = ctx.node_variable_named("this", vec!["Movie".to_string()]);
        assert_eq!(ctx.variable_name(this), "this");
    }

    #[test]
    fn nested_prefixes_are_unique() {
        let schema = Schema::new();
        let mut ctx = QueryContext::new(&schema);
        assert_eq!(ctx.nested_param_prefix(), "nested_param0");
        assert_eq!(ctx.nested_param_prefix(), "nested_param1");
    }
}
