//! Error and result types for filter translation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed filter key: `{0}`")]
    MalformedFilterKey(String),

    #[error("unknown field `{field}` on `{type_name}`")]
    UnknownField { field: String, type_name: String },

    #[error("aggregate filters must target relationship fields, `{0}` is not one")]
    InvalidAggregateTarget(String),

    #[error("operator {operator} is not supported on field `{field}`")]
    UnsupportedOperator { operator: String, field: String },

    #[error("filter references type `{0}`, which is not registered in the schema")]
    MissingReferencedType(String),

    #[error("filter nesting exceeds the maximum depth of {0}")]
    FilterTooComplex(usize),

    #[error("invalid filter value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}
