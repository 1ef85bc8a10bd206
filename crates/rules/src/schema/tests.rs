//! Tests for schema types.

use super::*;
use serde_json::json;

const HERBARIUM_COLLECTION_YAML: &str = r#"
id: https://hdl.handle.net/TEST/HERB-001
name: Herbarium sheets without media
filter:
  operator: and
  children:
    - operator: equals
      key: "$['ods:isKnownToContainMedia']"
      value: false
    - operator: equals
      key: "$['dwc:preparations']"
      value: herbarium sheet
"#;

const ODS_COLLECTION_JSON: &str = r#"{
  "@id": "https://hdl.handle.net/TEST/XXX-XXX-XXX",
  "ltc:collectionName": "Botany or version two",
  "ods:status": "Active",
  "ods:hasTargetDigitalObjectFilter": {
    "ods:predicateType": "OR",
    "ods:hasPredicates": [
      {"ods:predicateType": "EQUALS", "ods:predicateKey": "$['ods:topicDiscipline']", "ods:predicateValues": ["Botany"]},
      {"ods:predicateType": "EQUALS", "ods:predicateKey": "$['ods:version']", "ods:predicateValues": [2]}
    ]
  }
}"#;

#[test]
fn parse_yaml_collection_definition() {
    let def: CollectionDefinition = serde_yaml::from_str(HERBARIUM_COLLECTION_YAML).unwrap();

    assert_eq!(def.id, "https://hdl.handle.net/TEST/HERB-001");
    assert_eq!(def.name.as_deref(), Some("Herbarium sheets without media"));
    assert_eq!(def.status, CollectionStatus::Active);
    assert_eq!(def.uri(), def.id);

    let children = def.filter.children.as_ref().unwrap();
    assert_eq!(def.filter.operator, Operator::And);
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].value, Some(Scalar::Boolean(false)));
    assert_eq!(children[1].value, Some(Scalar::Text("herbarium sheet".into())));
}

#[test]
fn parse_ods_prefixed_collection_definition() {
    let def: CollectionDefinition = serde_json::from_str(ODS_COLLECTION_JSON).unwrap();

    assert_eq!(def.id, "https://hdl.handle.net/TEST/XXX-XXX-XXX");
    assert_eq!(def.filter.operator, Operator::Or);
    let children = def.filter.children.as_ref().unwrap();
    assert_eq!(children[0].key.as_deref(), Some("$['ods:topicDiscipline']"));
    assert_eq!(children[1].values, Some(vec![Scalar::Integer(2)]));
}

#[test]
fn operator_parsing_ignores_case() {
    for raw in ["equals", "EQUALS", "Equals"] {
        assert_eq!(raw.parse::<Operator>().unwrap(), Operator::Equals);
    }
    assert_eq!("In".parse::<Operator>().unwrap(), Operator::In);
    assert!("between".parse::<Operator>().is_err());
}

#[test]
fn unknown_operator_is_malformed() {
    let err = PredicateFilter::from_json(json!({"operator": "LIKE", "key": "a", "value": "b"})).unwrap_err();
    assert!(matches!(err, crate::FilterError::Malformed(_)));
}

#[test]
fn scalar_literals_keep_their_kind() {
    let values: Vec<Scalar> = serde_json::from_value(json!([true, 3, 2.5, "3"])).unwrap();
    assert_eq!(
        values,
        vec![
            Scalar::Boolean(true),
            Scalar::Integer(3),
            Scalar::Float(2.5),
            Scalar::Text("3".into()),
        ]
    );
}

#[test]
fn scalar_matching_is_exact() {
    assert!(Scalar::from("Botany").matches(&json!("Botany")));
    assert!(!Scalar::from("Botany").matches(&json!("botany")));
    assert!(Scalar::from(2i64).matches(&json!(2)));
    assert!(Scalar::from(2i64).matches(&json!(2.0)));
    assert!(!Scalar::from(2i64).matches(&json!("2")));
    assert!(!Scalar::from(false).matches(&json!(null)));
}

#[test]
fn filter_serializes_with_plain_keys() {
    let filter = PredicateFilter::one_of("$['ods:topicDiscipline']", ["Botany", "Zoology"]);
    let out = serde_json::to_value(&filter).unwrap();

    assert_eq!(out["operator"], "in");
    assert_eq!(out["values"], json!(["Botany", "Zoology"]));
    assert!(out.get("children").is_none());
}

#[test]
fn tombstone_event_does_not_trigger_scan() {
    let filter = PredicateFilter::equals("a", "b");
    let update = CollectionEvent {
        action: CollectionAction::Update,
        collection: CollectionDefinition::new("C1", filter.clone()),
    };
    let tombstone = CollectionEvent {
        action: CollectionAction::Tombstone,
        collection: CollectionDefinition::new("C1", filter.clone()),
    };
    let stale = CollectionEvent {
        action: CollectionAction::Create,
        collection: CollectionDefinition::new("C1", filter).tombstoned(),
    };

    assert!(update.triggers_scan());
    assert!(!tombstone.triggers_scan());
    assert!(!stale.triggers_scan());
}

#[test]
fn event_accepts_upper_case_action() {
    let event: CollectionEvent = serde_json::from_value(json!({
        "action": "CREATE",
        "virtualCollection": {
            "id": "C1",
            "filter": {"operator": "EQUALS", "key": "a", "value": "b"}
        }
    }))
    .unwrap();
    assert_eq!(event.action, CollectionAction::Create);
    assert_eq!(event.collection.uri(), "C1");
}
