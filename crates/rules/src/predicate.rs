//! Validated predicate trees.
//!
//! [`Predicate::from_filter`] is the single validation pass for filters.
//! Both the query compiler and the local evaluator consume its output, so
//! a filter is either accepted by both or rejected by both with the same
//! [`FilterError`].

use crate::error::FilterError;
use crate::path::FieldPath;
use crate::schema::{Operator, PredicateFilter, Scalar, ScalarKind};

// ── Types ───────────────────────────────────────────────────────────

/// A validated filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Leaf(Leaf),
    /// Every child must hold.
    All(Vec<Predicate>),
    /// At least one child must hold.
    Any(Vec<Predicate>),
}

/// A single field test.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Key as authored, kept for logs.
    pub key: String,
    pub path: FieldPath,
    pub test: LeafTest,
}

/// What a leaf checks at its path.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafTest {
    /// Some value at the path equals the literal.
    Equals(Scalar),
    /// No value at the path equals the literal (missing counts as "no value").
    NotEquals(Scalar),
    /// Some value at the path equals one of the literals.
    OneOf(Vec<Scalar>),
}

impl LeafTest {
    /// Kind shared by every literal in the test.
    pub fn kind(&self) -> ScalarKind {
        match self {
            LeafTest::Equals(v) | LeafTest::NotEquals(v) => v.kind(),
            // validation guarantees a non-empty, single-kind list
            LeafTest::OneOf(values) => values.first().map(Scalar::kind).unwrap_or(ScalarKind::Text),
        }
    }
}

impl Leaf {
    /// Field name this leaf targets in the search index.
    pub fn index_field(&self) -> String {
        self.path.index_field(self.test.kind())
    }
}

// ── Validation ──────────────────────────────────────────────────────

impl Predicate {
    /// Validate a raw filter tree.
    pub fn from_filter(filter: &PredicateFilter) -> Result<Self, FilterError> {
        if filter.operator.is_composite() {
            validate_composite(filter)
        } else {
            validate_leaf(filter).map(Predicate::Leaf)
        }
    }

    /// Number of leaf tests in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::Leaf(_) => 1,
            Predicate::All(children) | Predicate::Any(children) => {
                children.iter().map(Predicate::leaf_count).sum()
            }
        }
    }
}

impl TryFrom<&PredicateFilter> for Predicate {
    type Error = FilterError;

    fn try_from(filter: &PredicateFilter) -> Result<Self, Self::Error> {
        Predicate::from_filter(filter)
    }
}

fn validate_composite(filter: &PredicateFilter) -> Result<Predicate, FilterError> {
    let operator = filter.operator;
    if filter.key.is_some() || filter.value.is_some() || filter.values.is_some() {
        return Err(FilterError::LeafFieldsOnComposite { operator });
    }

    let children = match filter.children.as_deref() {
        Some(children) if !children.is_empty() => children,
        _ => return Err(FilterError::EmptyChildren { operator }),
    };

    let children = children
        .iter()
        .map(Predicate::from_filter)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match operator {
        Operator::And => Predicate::All(children),
        _ => Predicate::Any(children),
    })
}

fn validate_leaf(filter: &PredicateFilter) -> Result<Leaf, FilterError> {
    let operator = filter.operator;
    if filter.children.as_ref().is_some_and(|c| !c.is_empty()) {
        return Err(FilterError::ChildrenOnLeaf { operator });
    }

    let key = filter
        .key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(FilterError::MissingKey { operator })?;
    let path = FieldPath::parse(key)?;

    let mut values = match (&filter.value, filter.values.as_deref()) {
        (Some(_), Some(list)) if !list.is_empty() => {
            return Err(FilterError::ValueAndValues { operator })
        }
        (Some(value), _) => vec![value.clone()],
        (None, Some(list)) if !list.is_empty() => list.to_vec(),
        _ => return Err(FilterError::MissingValue { operator }),
    };

    let first = values[0].kind();
    if let Some(other) = values.iter().map(Scalar::kind).find(|k| *k != first) {
        return Err(FilterError::MixedValueTypes {
            key: key.to_string(),
            first,
            other,
        });
    }

    let found = values.len();
    let test = match operator {
        Operator::Equals if found == 1 => LeafTest::Equals(values.remove(0)),
        Operator::Equals => LeafTest::OneOf(values),
        Operator::Not if found == 1 => LeafTest::NotEquals(values.remove(0)),
        Operator::Not => {
            return Err(FilterError::Arity {
                operator,
                expected: "exactly one",
                found,
            })
        }
        Operator::In if found >= 2 => LeafTest::OneOf(values),
        Operator::In => {
            return Err(FilterError::Arity {
                operator,
                expected: "two or more",
                found,
            })
        }
        Operator::And | Operator::Or => return Err(FilterError::LeafFieldsOnComposite { operator }),
    };

    Ok(Leaf {
        key: key.to_string(),
        path,
        test,
    })
}
