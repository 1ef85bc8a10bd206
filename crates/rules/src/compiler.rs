//! Predicate filter → search index query DSL.
//!
//! Leaf mapping:
//! - `EQUALS` with one value → `bool.must[term]`
//! - `NOT` → `bool.must_not[term]` (documents missing the field match)
//! - `EQUALS` with several values, `IN` → `terms`
//!
//! Composite mapping:
//! - `AND` → `bool.must` over compiled children
//! - `OR` → `bool.should` with `minimum_should_match: 1`
//!
//! Text literals target the `.keyword` sub-field so matching is exact and
//! case-sensitive, the same as [`crate::evaluator::LocalEvaluator`].

use serde_json::{json, Map, Value};

use crate::error::FilterError;
use crate::predicate::{Leaf, LeafTest, Predicate};
use crate::schema::{PredicateFilter, Scalar};

/// A compiled query in the search index's boolean DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    Term { field: String, value: Scalar },
    Terms { field: String, values: Vec<Scalar> },
    Bool(BoolQuery),
}

/// Boolean combination of sub-queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<SearchQuery>,
    pub must_not: Vec<SearchQuery>,
    pub should: Vec<SearchQuery>,
    pub minimum_should_match: Option<u32>,
}

impl SearchQuery {
    /// Render the query as the JSON body expected under `"query"`.
    pub fn to_dsl(&self) -> Value {
        match self {
            SearchQuery::Term { field, value } => json!({
                "term": { field.as_str(): { "value": value.to_json() } }
            }),
            SearchQuery::Terms { field, values } => json!({
                "terms": { field.as_str(): values.iter().map(Scalar::to_json).collect::<Vec<_>>() }
            }),
            SearchQuery::Bool(b) => {
                let mut body = Map::new();
                for (name, clauses) in [("must", &b.must), ("must_not", &b.must_not), ("should", &b.should)] {
                    if !clauses.is_empty() {
                        body.insert(
                            name.to_string(),
                            Value::Array(clauses.iter().map(SearchQuery::to_dsl).collect()),
                        );
                    }
                }
                if let Some(n) = b.minimum_should_match {
                    body.insert("minimum_should_match".to_string(), json!(n));
                }
                json!({ "bool": body })
            }
        }
    }
}

/// Translates predicate filters into search queries.
pub struct QueryCompiler;

impl QueryCompiler {
    /// Validate and compile a raw filter.
    pub fn compile(filter: &PredicateFilter) -> Result<SearchQuery, FilterError> {
        let predicate = Predicate::from_filter(filter)?;
        Ok(Self::compile_predicate(&predicate))
    }

    /// Compile an already validated predicate. Infallible.
    pub fn compile_predicate(predicate: &Predicate) -> SearchQuery {
        match predicate {
            Predicate::Leaf(leaf) => compile_leaf(leaf),
            Predicate::All(children) => SearchQuery::Bool(BoolQuery {
                must: children.iter().map(Self::compile_predicate).collect(),
                ..Default::default()
            }),
            Predicate::Any(children) => SearchQuery::Bool(BoolQuery {
                should: children.iter().map(Self::compile_predicate).collect(),
                minimum_should_match: Some(1),
                ..Default::default()
            }),
        }
    }
}

fn compile_leaf(leaf: &Leaf) -> SearchQuery {
    let field = leaf.index_field();
    match &leaf.test {
        LeafTest::Equals(value) => SearchQuery::Bool(BoolQuery {
            must: vec![SearchQuery::Term {
                field,
                value: value.clone(),
            }],
            ..Default::default()
        }),
        LeafTest::NotEquals(value) => SearchQuery::Bool(BoolQuery {
            must_not: vec![SearchQuery::Term {
                field,
                value: value.clone(),
            }],
            ..Default::default()
        }),
        LeafTest::OneOf(values) => SearchQuery::Terms {
            field,
            values: values.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_json(filter: Value) -> Value {
        let filter = PredicateFilter::from_json(filter).unwrap();
        QueryCompiler::compile(&filter).unwrap().to_dsl()
    }

    #[test]
    fn equals_compiles_to_must_term_on_keyword() {
        let dsl = compile_json(json!({
            "operator": "EQUALS",
            "key": "$['dcterms:identifier']",
            "values": ["https://doi.org/TEST/ZZZ-X4T-YYV"]
        }));
        assert_eq!(
            dsl,
            json!({"bool": {"must": [
                {"term": {"dcterms:identifier.keyword": {"value": "https://doi.org/TEST/ZZZ-X4T-YYV"}}}
            ]}})
        );
    }

    #[test]
    fn not_compiles_to_must_not_term() {
        let dsl = compile_json(json!({
            "operator": "NOT",
            "key": "$['ods:physicalSpecimenIDType']",
            "value": "Local"
        }));
        assert_eq!(
            dsl,
            json!({"bool": {"must_not": [
                {"term": {"ods:physicalSpecimenIDType.keyword": {"value": "Local"}}}
            ]}})
        );
    }

    #[test]
    fn in_compiles_to_terms() {
        let dsl = compile_json(json!({
            "operator": "IN",
            "key": "$['ods:topicDiscipline']",
            "values": ["Botany", "Zoology"]
        }));
        assert_eq!(dsl, json!({"terms": {"ods:topicDiscipline.keyword": ["Botany", "Zoology"]}}));
    }

    #[test]
    fn non_text_values_use_the_raw_field() {
        let dsl = compile_json(json!({"operator": "EQUALS", "key": "$['ods:isKnownToContainMedia']", "value": false}));
        assert_eq!(
            dsl,
            json!({"bool": {"must": [{"term": {"ods:isKnownToContainMedia": {"value": false}}}]}})
        );
    }

    #[test]
    fn or_requires_one_should_clause() {
        let dsl = compile_json(json!({
            "operator": "OR",
            "children": [
                {"operator": "EQUALS", "key": "$['ods:topicDiscipline']", "values": ["Botany"]},
                {"operator": "EQUALS", "key": "$['ods:version']", "values": [2]}
            ]
        }));
        assert_eq!(
            dsl,
            json!({"bool": {
                "should": [
                    {"bool": {"must": [{"term": {"ods:topicDiscipline.keyword": {"value": "Botany"}}}]}},
                    {"bool": {"must": [{"term": {"ods:version": {"value": 2}}}]}}
                ],
                "minimum_should_match": 1
            }})
        );
    }

    #[test]
    fn and_nests_children_under_must() {
        let dsl = compile_json(json!({
            "operator": "AND",
            "children": [
                {"operator": "EQUALS", "key": "$['ods:isKnownToContainMedia']", "values": [false]},
                {"operator": "EQUALS", "key": "$['dwc:preparations']", "values": ["herbarium sheet"]}
            ]
        }));
        let must = dsl["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(
            must[1],
            json!({"bool": {"must": [{"term": {"dwc:preparations.keyword": {"value": "herbarium sheet"}}}]}})
        );
        assert!(dsl["bool"].get("minimum_should_match").is_none());
    }

    #[test]
    fn nested_paths_drop_array_selectors() {
        let dsl = compile_json(json!({
            "operator": "EQUALS",
            "key": "$['ods:hasEvents'][*]['ods:hasLocation']['dwc:country']",
            "value": "Germany"
        }));
        assert!(dsl["bool"]["must"][0]["term"]
            .get("ods:hasEvents.ods:hasLocation.dwc:country.keyword")
            .is_some());
    }

    #[test]
    fn invalid_filters_fail_to_compile() {
        let filter = PredicateFilter::from_json(json!({"operator": "IN", "key": "a", "values": ["only"]})).unwrap();
        assert!(QueryCompiler::compile(&filter).is_err());
    }
}
