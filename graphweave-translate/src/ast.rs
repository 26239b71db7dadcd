//! Predicate AST the filter compiler builds and the final compiler
//! serializes.
//!
//! Nodes are immutable once constructed; identifier allocation happens in a
//! separate render pass that walks the tree with the [`QueryContext`]
//! explicitly in hand. Nothing here holds names, only handles.
//!
//! [`QueryContext`]: crate::context::QueryContext

use graphweave_schema::RelationField;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{Param, Variable};

/// List-predicate quantifier over graph-traversal results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    All,
    Any,
    None,
    Single,
}

impl Quantifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Quantifier::All => "all",
            Quantifier::Any => "any",
            Quantifier::None => "none",
            Quantifier::Single => "single",
        }
    }
}

/// Binary comparison operators with a parameter operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    In,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

/// How a comparison's operator is rendered. Point and duration properties
/// go through function-call forms; this is a rendering detail, not a
/// semantic branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueRendering {
    Plain,
    Point,
    Duration,
}

/// What a comparison tests: nullness, or an operator against a bound
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonTest {
    IsNull,
    IsNotNull,
    Op { op: BinaryOp, param: Param },
}

/// The property expression a comparison applies to: a context variable or
/// a raw accessor string handed in by a delegate contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyTarget {
    Variable(Variable),
    Raw(String),
}

/// A single property comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub target: PropertyTarget,
    /// Stored property name, accessor prefix already applied.
    pub property: String,
    /// Null-coalescing default wrapped around the property before the
    /// comparison, when the field declares one.
    pub coalesce: Option<Value>,
    pub rendering: ValueRendering,
    pub test: ComparisonTest,
}

/// One endpoint of a match pattern, with independently togglable emission
/// of its variable binding and its type labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEnd {
    pub variable: Variable,
    pub show_variable: bool,
    pub show_labels: bool,
}

/// The relationship segment of a match pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelSegment {
    pub variable: Variable,
    pub rel_type: String,
    pub show_variable: bool,
}

/// A single-hop relationship traversal, always rendered source-to-target;
/// an inbound relationship field swaps its endpoints instead of reversing
/// the arrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPattern {
    pub source: PatternEnd,
    pub rel: RelSegment,
    pub target: PatternEnd,
}

/// A deferred fragment whose text depends on identifiers that are only
/// known once the final compiler has allocated them. Resolution calls the
/// matching delegate compiler with the allocated names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Deferred {
    /// Aggregate filter over a relationship, delegated with the parent
    /// variable's allocated identifier.
    Aggregate {
        parent: Variable,
        relation: RelationField,
        input: Value,
    },
    /// Connection-local `node:`/`edge:` filter, delegated with the
    /// projection's generated accessor names.
    Connection {
        projection: Variable,
        quantifier: Quantifier,
        type_name: String,
        rel_type: String,
        input: Value,
    },
}

/// The predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison(Comparison),
    /// Pattern existence; `negated` renders `NOT EXISTS`.
    Exists { pattern: MatchPattern, negated: bool },
    /// A quantified test over the pattern's traversal results, with
    /// `binding` introduced for the nested predicate.
    Quantified {
        quantifier: Quantifier,
        pattern: MatchPattern,
        binding: Variable,
        inner: Box<Predicate>,
    },
    And(Vec<Predicate>),
    /// An empty disjunction renders as the constant `false`.
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Deferred(Deferred),
}

impl Predicate {
    pub fn not(inner: Predicate) -> Predicate {
        Predicate::Not(Box::new(inner))
    }

    /// Conjunction that collapses the degenerate single-child case.
    pub fn and(mut children: Vec<Predicate>) -> Predicate {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Predicate::And(children)
        }
    }

    /// Disjunction that collapses the degenerate single-child case.
    pub fn or(mut children: Vec<Predicate>) -> Predicate {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Predicate::Or(children)
        }
    }
}
