//! Predicate filter documents as they arrive on the wire.
//!
//! A filter is a recursive tree: leaf nodes (`equals`, `not`, `in`) test a
//! field path against literal values; composite nodes (`and`, `or`) combine
//! children. Deserialization accepts both the plain key names and the
//! `ods:` prefixed names used by published collection definitions.
//!
//! Shape rules (arity, leaf vs composite fields, value types) are *not*
//! enforced here. See [`crate::predicate::Predicate::from_filter`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;

// ── Operator ────────────────────────────────────────────────────────

/// Filter operators. Parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Equals,
    Not,
    In,
    And,
    Or,
}

impl Operator {
    /// `and` / `or` combine children instead of testing a field.
    pub fn is_composite(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => write!(f, "EQUALS"),
            Operator::Not => write!(f, "NOT"),
            Operator::In => write!(f, "IN"),
            Operator::And => write!(f, "AND"),
            Operator::Or => write!(f, "OR"),
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equals" => Ok(Operator::Equals),
            "not" => Ok(Operator::Not),
            "in" => Ok(Operator::In),
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            _ => Err(format!("unknown operator: '{}'", s)),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.to_string().to_ascii_lowercase()
    }
}

// ── Scalar literals ─────────────────────────────────────────────────

/// Kind of a literal, used to pick the index field variant and to reject
/// value lists that mix types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Boolean,
    Number,
    Text,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Boolean => write!(f, "boolean"),
            ScalarKind::Number => write!(f, "number"),
            ScalarKind::Text => write!(f, "text"),
        }
    }
}

/// A literal value a field is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Boolean(_) => ScalarKind::Boolean,
            Scalar::Integer(_) | Scalar::Float(_) => ScalarKind::Number,
            Scalar::Text(_) => ScalarKind::Text,
        }
    }

    /// Exact, case-sensitive equality against a document value.
    ///
    /// Integers and floats compare numerically. `null`, arrays and objects
    /// never match a literal.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Scalar::Text(s), Value::String(other)) => s == other,
            (Scalar::Boolean(b), Value::Bool(other)) => b == other,
            (Scalar::Integer(i), Value::Number(n)) => match n.as_i64() {
                Some(other) => other == *i,
                None => n.as_f64() == Some(*i as f64),
            },
            (Scalar::Float(f), Value::Number(n)) => n.as_f64() == Some(*f),
            _ => false,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Boolean(b) => Value::Bool(*b),
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Float(f) => Value::from(*f),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

// ── Predicate filter ────────────────────────────────────────────────

/// One node of a predicate filter tree, exactly as supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateFilter {
    #[serde(alias = "ods:predicateType")]
    pub operator: Operator,

    #[serde(default, alias = "ods:predicateKey", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, alias = "ods:predicateValue", skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,

    #[serde(default, alias = "ods:predicateValues", skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Scalar>>,

    #[serde(default, alias = "ods:hasPredicates", skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PredicateFilter>>,
}

impl PredicateFilter {
    fn leaf(operator: Operator, key: impl Into<String>) -> Self {
        Self {
            operator,
            key: Some(key.into()),
            value: None,
            values: None,
            children: None,
        }
    }

    fn composite(operator: Operator, children: Vec<PredicateFilter>) -> Self {
        Self {
            operator,
            key: None,
            value: None,
            values: None,
            children: Some(children),
        }
    }

    /// `key` equals `value`.
    pub fn equals(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::leaf(Operator::Equals, key)
        }
    }

    /// `key` does not equal `value`.
    pub fn not(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::leaf(Operator::Not, key)
        }
    }

    /// `key` equals one of `values`.
    pub fn one_of<V: Into<Scalar>>(key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            values: Some(values.into_iter().map(Into::into).collect()),
            ..Self::leaf(Operator::In, key)
        }
    }

    pub fn and(children: Vec<PredicateFilter>) -> Self {
        Self::composite(Operator::And, children)
    }

    pub fn or(children: Vec<PredicateFilter>) -> Self {
        Self::composite(Operator::Or, children)
    }

    /// Parse a filter from a JSON value.
    pub fn from_json(value: Value) -> Result<Self, FilterError> {
        Ok(serde_json::from_value(value)?)
    }
}
