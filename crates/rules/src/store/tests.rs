//! Tests for collection stores.

use std::fs;

use tempfile::TempDir;

use super::*;
use crate::schema::{CollectionDefinition, PredicateFilter};

const BOTANY_YAML: &str = r#"
id: https://hdl.handle.net/TEST/BOT-001
name: Botany
filter:
  operator: in
  key: "$['ods:topicDiscipline']"
  values: [Botany, Mycology]
"#;

const TOMBSTONED_YAML: &str = r#"
id: https://hdl.handle.net/TEST/OLD-001
status: tombstoned
filter:
  operator: equals
  key: "$['ods:topicDiscipline']"
  value: Zoology
"#;

const VERSION_JSON: &str = r#"{
  "id": "https://hdl.handle.net/TEST/VER-002",
  "filter": {"operator": "EQUALS", "key": "$['ods:version']", "value": 2}
}"#;

fn temp_store() -> (TempDir, FileCollectionStore) {
    let dir = TempDir::new().expect("create tempdir");
    let store = FileCollectionStore::new(dir.path());
    (dir, store)
}

#[test]
fn load_definition_from_yaml_file() {
    let (dir, _store) = temp_store();
    let path = dir.path().join("botany.yml");
    fs::write(&path, BOTANY_YAML).unwrap();

    let def = FileCollectionStore::load_file(&path).unwrap();
    assert_eq!(def.id, "https://hdl.handle.net/TEST/BOT-001");
    assert_eq!(def.filter.values.as_ref().map(Vec::len), Some(2));
}

#[test]
fn scan_skips_dotfiles_unsupported_and_tombstoned() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("botany.yaml"), BOTANY_YAML).unwrap();
    fs::write(dir.path().join(".draft.yml"), BOTANY_YAML).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a collection").unwrap();
    fs::write(dir.path().join("old.yml"), TOMBSTONED_YAML).unwrap();

    let report = store.scan().unwrap();

    assert_eq!(report.definitions.len(), 1);
    let skipped = report
        .results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();
    assert_eq!(skipped, 3);
}

#[test]
fn scan_recurses_and_reads_json() {
    let (dir, store) = temp_store();
    let nested = dir.path().join("versions");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("v2.json"), VERSION_JSON).unwrap();
    fs::write(dir.path().join("botany.yml"), BOTANY_YAML).unwrap();

    let report = store.scan().unwrap();
    let mut ids: Vec<_> = report.definitions.iter().map(|d| d.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["https://hdl.handle.net/TEST/BOT-001", "https://hdl.handle.net/TEST/VER-002"]);
}

#[test]
fn broken_file_does_not_abort_scan() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("botany.yml"), BOTANY_YAML).unwrap();
    fs::write(dir.path().join("broken.yml"), "id: [unclosed").unwrap();
    fs::write(dir.path().join("anonymous.yml"), "id: ''\nfilter: {operator: equals, key: a, value: b}\n").unwrap();

    let report = store.scan().unwrap();
    assert_eq!(report.definitions.len(), 1);
    assert_eq!(report.failed().count(), 2);
}

#[test]
fn duplicate_ids_keep_the_later_file() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("a.yml"), BOTANY_YAML).unwrap();
    fs::write(
        dir.path().join("b.yml"),
        BOTANY_YAML.replace("name: Botany", "name: Botany v2"),
    )
    .unwrap();

    let report = store.scan().unwrap();
    assert_eq!(report.definitions.len(), 1);
    assert_eq!(report.definitions[0].name.as_deref(), Some("Botany v2"));
}

#[test]
fn missing_directory_is_an_error() {
    let (dir, _) = temp_store();
    let store = FileCollectionStore::new(dir.path().join("does-not-exist"));
    assert!(matches!(store.scan(), Err(StoreError::Io(_))));
}

#[tokio::test]
async fn fetch_active_returns_scanned_definitions() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("botany.yml"), BOTANY_YAML).unwrap();
    fs::write(dir.path().join("old.yml"), TOMBSTONED_YAML).unwrap();

    let active = store.fetch_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].is_active());
}

#[tokio::test]
async fn memory_store_filters_tombstoned() {
    let filter = PredicateFilter::equals("a", "b");
    let store = MemoryCollectionStore::new(vec![
        CollectionDefinition::new("C1", filter.clone()),
        CollectionDefinition::new("C2", filter.clone()).tombstoned(),
    ]);

    assert_eq!(store.fetch_active().await.unwrap().len(), 1);

    store.upsert(CollectionDefinition::new("C2", filter));
    assert_eq!(store.fetch_active().await.unwrap().len(), 2);
    assert_eq!(store.fetch_count(), 2);
}
