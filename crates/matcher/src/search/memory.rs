//! In-memory search index.
//!
//! Documents are flattened the way the search backend indexes them:
//! nested object keys joined with `.`, arrays flattened into multi-valued
//! fields. Text values are also reachable through the `.keyword`
//! sub-field. Query semantics follow the boolean DSL: `term`, `terms`,
//! and `bool` with `must`, `must_not`, `should` and
//! `minimum_should_match`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use serde_json::Value;

use collecta_rules::path::KEYWORD_SUFFIX;
use collecta_rules::{BoolQuery, Scalar, SearchQuery};

use super::{PageRequest, SearchError, SearchIndex};

type FlatDoc = HashMap<String, Vec<Value>>;

struct IndexedDoc {
    source: Value,
    fields: FlatDoc,
    cursor: Option<Value>,
}

/// Vector-backed [`SearchIndex`] for tests and offline runs.
pub struct MemoryIndex {
    docs: Vec<IndexedDoc>,
    cursor_field: String,
    requests: AtomicUsize,
}

impl MemoryIndex {
    pub fn new(cursor_field: impl Into<String>, documents: impl IntoIterator<Item = Value>) -> Self {
        let cursor_field = cursor_field.into();
        let docs = documents
            .into_iter()
            .map(|source| {
                let mut fields = FlatDoc::new();
                flatten("", &source, &mut fields);
                let cursor = fields
                    .get(&cursor_field)
                    .and_then(|values| values.iter().find(|v| !v.is_null()).cloned());
                IndexedDoc {
                    source,
                    fields,
                    cursor,
                }
            })
            .collect();
        Self {
            docs,
            cursor_field,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of `search_page` calls served.
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Every document the query matches, in index order.
    pub fn matching(&self, query: &SearchQuery) -> Vec<&Value> {
        self.docs
            .iter()
            .filter(|d| matches_query(query, &d.fields))
            .map(|d| &d.source)
            .collect()
    }
}

#[async_trait::async_trait]
impl SearchIndex for MemoryIndex {
    fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    async fn search_page(&self, request: PageRequest<'_>) -> Result<Vec<Value>, SearchError> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);

        let mut hits: Vec<&IndexedDoc> = self
            .docs
            .iter()
            .filter(|d| matches_query(request.query, &d.fields))
            .collect();
        // descending, documents without a cursor last
        hits.sort_by(|a, b| compare_cursor(b.cursor.as_ref(), a.cursor.as_ref()));

        let page = hits
            .into_iter()
            .filter(|d| match request.search_after {
                None => true,
                Some(after) => compare_cursor(d.cursor.as_ref(), Some(after)) == Ordering::Less,
            })
            .take(request.size)
            .map(|d| d.source.clone())
            .collect();
        Ok(page)
    }
}

// ── Indexing ────────────────────────────────────────────────────────

fn flatten(prefix: &str, value: &Value, out: &mut FlatDoc) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&name, child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(prefix, item, out);
            }
        }
        scalar => {
            if prefix.is_empty() {
                return;
            }
            if scalar.is_string() {
                out.entry(format!("{}{}", prefix, KEYWORD_SUFFIX))
                    .or_default()
                    .push(scalar.clone());
            }
            out.entry(prefix.to_string()).or_default().push(scalar.clone());
        }
    }
}

/// Sort order for cursor values: numbers and strings compare naturally,
/// a missing cursor sorts below everything.
fn compare_cursor(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

// ── Query evaluation ────────────────────────────────────────────────

fn field_has(fields: &FlatDoc, field: &str, literal: &Scalar) -> bool {
    fields
        .get(field)
        .is_some_and(|values| values.iter().any(|v| literal.matches(v)))
}

fn matches_query(query: &SearchQuery, fields: &FlatDoc) -> bool {
    match query {
        SearchQuery::Term { field, value } => field_has(fields, field, value),
        SearchQuery::Terms { field, values } => values.iter().any(|v| field_has(fields, field, v)),
        SearchQuery::Bool(b) => matches_bool(b, fields),
    }
}

fn matches_bool(b: &BoolQuery, fields: &FlatDoc) -> bool {
    if !b.must.iter().all(|q| matches_query(q, fields)) {
        return false;
    }
    if b.must_not.iter().any(|q| matches_query(q, fields)) {
        return false;
    }
    // without a must clause, should defaults to requiring one match
    let default_required = usize::from(b.must.is_empty() && !b.should.is_empty());
    let required = b
        .minimum_should_match
        .map_or(default_required, |n| n as usize);
    let matched = b.should.iter().filter(|q| matches_query(q, fields)).count();
    matched >= required
}
