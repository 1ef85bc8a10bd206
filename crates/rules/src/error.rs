//! Validation errors for predicate filters.

use crate::schema::{Operator, ScalarKind};

/// A predicate filter that cannot be interpreted.
///
/// Raised by the single validation pass shared by the query compiler and
/// the local evaluator, so both reject exactly the same filters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// The filter document does not have the expected shape.
    #[error("Malformed filter: {0}")]
    Malformed(String),

    #[error("{operator} requires a key")]
    MissingKey { operator: Operator },

    #[error("{operator} requires a value or a list of values")]
    MissingValue { operator: Operator },

    #[error("{operator} accepts either `value` or `values`, not both")]
    ValueAndValues { operator: Operator },

    #[error("{operator} takes {expected} value(s), got {found}")]
    Arity {
        operator: Operator,
        expected: &'static str,
        found: usize,
    },

    #[error("{operator} combines children and cannot carry a key or values")]
    LeafFieldsOnComposite { operator: Operator },

    #[error("{operator} is a leaf operator and cannot have children")]
    ChildrenOnLeaf { operator: Operator },

    #[error("{operator} requires at least one child")]
    EmptyChildren { operator: Operator },

    #[error("Values for key '{key}' mix {first} and {other}")]
    MixedValueTypes {
        key: String,
        first: ScalarKind,
        other: ScalarKind,
    },

    #[error("Invalid key '{key}': {reason}")]
    InvalidPath { key: String, reason: String },
}

impl From<serde_json::Error> for FilterError {
    fn from(e: serde_json::Error) -> Self {
        FilterError::Malformed(e.to_string())
    }
}
