//! Filter-key decoding.
//!
//! A where-input key fuses an optional accessor prefix, a field name, an
//! optional `Aggregate` marker and an optional operator suffix into one
//! string, e.g. `title_NOT_CONTAINS` or `actorsAggregate`. The field name is
//! recovered by longest-match against the schema's known field names, so a
//! field whose name happens to end in an operator-like suffix never gets
//! misparsed.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Marker suffix for aggregate filter keys, recognized before operator
/// classification.
pub const AGGREGATE_SUFFIX: &str = "Aggregate";

/// Operator suffix vocabulary. `NOT_`-prefixed forms decode to the base
/// operator with [`ParsedKey::negated`] set; a bare `NOT` suffix decodes to
/// no operator with `negated` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    In,
    Includes,
    All,
    None,
    Single,
    Some,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Matches => "MATCHES",
            Operator::In => "IN",
            Operator::Includes => "INCLUDES",
            Operator::All => "ALL",
            Operator::None => "NONE",
            Operator::Single => "SINGLE",
            Operator::Some => "SOME",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "LT" => Operator::Lt,
            "LTE" => Operator::Lte,
            "GT" => Operator::Gt,
            "GTE" => Operator::Gte,
            "CONTAINS" => Operator::Contains,
            "STARTS_WITH" => Operator::StartsWith,
            "ENDS_WITH" => Operator::EndsWith,
            "MATCHES" => Operator::Matches,
            "IN" => Operator::In,
            "INCLUDES" => Operator::Includes,
            "ALL" => Operator::All,
            "NONE" => Operator::None,
            "SINGLE" => Operator::Single,
            "SOME" => Operator::Some,
            _ => return Option::None,
        };
        Option::Some(op)
    }

    const TOKENS: [&'static str; 14] = [
        "LT",
        "LTE",
        "GT",
        "GTE",
        "CONTAINS",
        "STARTS_WITH",
        "ENDS_WITH",
        "MATCHES",
        "IN",
        "INCLUDES",
        "ALL",
        "NONE",
        "SINGLE",
        "SOME",
    ];
}

/// Decoded form of one where-input key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    /// Accessor prefix including its trailing dot, e.g. `node.`.
    pub prefix: Option<&'a str>,
    pub field_name: &'a str,
    pub operator: Option<Operator>,
    /// Derived from a `NOT`/`NOT_` marker in the operator suffix.
    pub negated: bool,
    pub aggregate: bool,
}

/// Decodes `key` against the given known field names.
///
/// Longest-match wins when several field names could explain the key.
/// Keys that decode to a plausible field name absent from the schema fail
/// with [`Error::UnknownField`]; keys with no plausible decomposition fail
/// with [`Error::MalformedFilterKey`].
pub fn parse_key<'a, 'n>(
    field_names: impl Iterator<Item = &'n str>,
    type_name: &str,
    key: &'a str,
) -> Result<ParsedKey<'a>> {
    let (prefix, rest) = split_prefix(key);

    let mut best: Option<ParsedKey<'a>> = None;
    for name in field_names {
        let Some(tail) = rest.strip_prefix(name) else {
            continue;
        };
        let Some((aggregate, operator, negated)) = parse_tail(tail) else {
            continue;
        };
        let longer = best
            .as_ref()
            .map(|b| name.len() > b.field_name.len())
            .unwrap_or(true);
        if longer {
            best = Some(ParsedKey {
                prefix,
                field_name: &rest[..name.len()],
                operator,
                negated,
                aggregate,
            });
        }
    }

    match best {
        Some(parsed) => Ok(parsed),
        None => Err(undecoded_error(rest, type_name, key)),
    }
}

fn split_prefix(key: &str) -> (Option<&str>, &str) {
    if let Some(dot) = key.find('.')
        && key[..dot].chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return (Some(&key[..dot + 1]), &key[dot + 1..]);
    }
    (None, key)
}

/// Validates everything after the field name: an optional `Aggregate`
/// marker, then an optional `_<operator>` suffix.
fn parse_tail(tail: &str) -> Option<(bool, Option<Operator>, bool)> {
    let (aggregate, tail) = match tail.strip_prefix(AGGREGATE_SUFFIX) {
        Some(rest) => (true, rest),
        None => (false, tail),
    };
    if tail.is_empty() {
        return Some((aggregate, None, false));
    }
    let token = tail.strip_prefix('_')?;
    if token == "NOT" {
        return Some((aggregate, None, true));
    }
    if let Some(base) = token.strip_prefix("NOT_") {
        return Operator::from_token(base).map(|op| (aggregate, Some(op), true));
    }
    Operator::from_token(token).map(|op| (aggregate, Some(op), false))
}

/// No field matched: report `UnknownField` when the key still looks like
/// `<ident><markers>`, `MalformedFilterKey` otherwise.
fn undecoded_error(rest: &str, type_name: &str, key: &str) -> Error {
    let mut head = rest;
    let mut best_suffix = 0usize;
    for token in Operator::TOKENS {
        for suffix in [format!("_{token}"), format!("_NOT_{token}")] {
            if rest.ends_with(&suffix) && suffix.len() > best_suffix {
                best_suffix = suffix.len();
            }
        }
    }
    if rest.ends_with("_NOT") && best_suffix < "_NOT".len() {
        best_suffix = "_NOT".len();
    }
    head = &head[..head.len() - best_suffix];
    head = head.strip_suffix(AGGREGATE_SUFFIX).unwrap_or(head);

    if is_identifier(head) {
        Error::UnknownField {
            field: head.to_string(),
            type_name: type_name.to_string(),
        }
    } else {
        Error::MalformedFilterKey(key.to_string())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
