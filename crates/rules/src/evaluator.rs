//! In-memory predicate evaluation against JSON documents.
//!
//! Semantics match the search index for every accepted filter:
//! - multi-valued fields match if any value matches
//! - `NOT` holds when no value equals the literal, including when the
//!   field is missing
//! - text compares exactly and case-sensitively

use serde_json::Value;

use crate::error::FilterError;
use crate::predicate::{Leaf, LeafTest, Predicate};
use crate::schema::PredicateFilter;

/// Decides predicate membership for a single document.
pub struct LocalEvaluator;

impl LocalEvaluator {
    /// Validate `filter` and evaluate it against `document`.
    ///
    /// Filters the compiler would reject fail here with the same error,
    /// never with a silent `false`.
    pub fn evaluate(filter: &PredicateFilter, document: &Value) -> Result<bool, FilterError> {
        let predicate = Predicate::from_filter(filter)?;
        Ok(Self::evaluate_predicate(&predicate, document))
    }

    /// Evaluate an already validated predicate.
    pub fn evaluate_predicate(predicate: &Predicate, document: &Value) -> bool {
        match predicate {
            Predicate::Leaf(leaf) => evaluate_leaf(leaf, document),
            Predicate::All(children) => children.iter().all(|c| Self::evaluate_predicate(c, document)),
            Predicate::Any(children) => children.iter().any(|c| Self::evaluate_predicate(c, document)),
        }
    }
}

fn evaluate_leaf(leaf: &Leaf, document: &Value) -> bool {
    let resolved = leaf.path.resolve(document);
    match &leaf.test {
        LeafTest::Equals(expected) => resolved.any(|v| expected.matches(v)),
        LeafTest::NotEquals(excluded) => !resolved.any(|v| excluded.matches(v)),
        LeafTest::OneOf(options) => resolved.any(|v| options.iter().any(|o| o.matches(v))),
    }
}
