//! Integration tests for stream matching against the collection cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use collecta_core::{Agent, CandidateEntity, EntityEnvelope, MEMBER_OF};
use collecta_matcher::{BatchReport, RelationshipAnnotator, StreamMatcher};
use collecta_queue::{ChannelPublisher, DeadLetter, EntityPublisher, PublishedStreams, QueueError};
use collecta_rules::{
    CollectionCache, CollectionDefinition, FileCollectionStore, MemoryCollectionStore, PredicateFilter,
};
use tempfile::TempDir;

fn annotator() -> RelationshipAnnotator {
    RelationshipAnnotator::new(Agent {
        id: "https://doi.org/10.5281/zenodo.17182153".to_string(),
        name: "Virtual Collection Service".to_string(),
        role: "virtual-collection-manager".to_string(),
    })
}

fn botany_or_v2() -> CollectionDefinition {
    CollectionDefinition::new(
        "C-OR",
        PredicateFilter::or(vec![
            PredicateFilter::equals("topic", "Botany"),
            PredicateFilter::equals("version", 2i64),
        ]),
    )
}

async fn loaded_cache(definitions: Vec<CollectionDefinition>) -> Arc<CollectionCache> {
    let cache = Arc::new(CollectionCache::new(Arc::new(MemoryCollectionStore::new(definitions))));
    cache.refresh().await.unwrap();
    cache
}

async fn matcher(definitions: Vec<CollectionDefinition>) -> (StreamMatcher, PublishedStreams) {
    let (publisher, streams) = ChannelPublisher::new();
    let cache = loaded_cache(definitions).await;
    (StreamMatcher::new(cache, Arc::new(publisher), annotator()), streams)
}

#[tokio::test]
async fn or_filter_matches_through_either_branch() {
    let (stream, mut published) = matcher(vec![botany_or_v2()]).await;
    let entities = vec![
        CandidateEntity::new("E1").with_field("topic", "Botany").with_field("version", 1i64),
        CandidateEntity::new("E2").with_field("topic", "Zoology").with_field("version", 2i64),
        CandidateEntity::new("E3").with_field("topic", "Zoology").with_field("version", 1i64),
    ];

    let report = stream.run_entities(entities).await;
    assert_eq!(
        report,
        BatchReport {
            entities: 3,
            rejected: 0,
            evaluated: 3,
            matched: 2,
            emitted: 2,
            failed: 0,
        }
    );

    let ids: Vec<_> = published.drain_entities().into_iter().map(|e| e.entity.id().to_string()).collect();
    assert_eq!(ids, vec!["E1", "E2"]);
}

#[tokio::test]
async fn one_emission_per_matched_collection() {
    let definitions = vec![
        botany_or_v2(),
        CollectionDefinition::new("C-BOTANY", PredicateFilter::equals("topic", "Botany")),
        CollectionDefinition::new("C-ZOOLOGY", PredicateFilter::equals("topic", "Zoology")),
    ];
    let (stream, mut published) = matcher(definitions).await;

    let report = stream
        .run_entities(vec![CandidateEntity::new("E1").with_field("topic", "Botany")])
        .await;
    assert_eq!(report.evaluated, 3);
    assert_eq!(report.matched, 2);

    let out = published.drain_entities();
    assert_eq!(out.len(), 2);
    // relationships accumulate on the entity across matches
    let last = &out[1].entity;
    assert!(last.has_relationship(MEMBER_OF, "C-OR"));
    assert!(last.has_relationship(MEMBER_OF, "C-BOTANY"));
    assert!(!last.has_relationship(MEMBER_OF, "C-ZOOLOGY"));
}

#[tokio::test]
async fn already_annotated_entity_keeps_one_relationship() {
    let (stream, mut published) = matcher(vec![botany_or_v2()]).await;
    let entity = CandidateEntity::new("E1").with_field("topic", "Botany");

    stream.run_entities(vec![entity]).await;
    let first = published.drain_entities().remove(0).entity;
    assert_eq!(first.relationships().len(), 1);

    stream.run_entities(vec![first]).await;
    let second = published.drain_entities().remove(0).entity;
    assert_eq!(second.relationships().len(), 1);
}

#[tokio::test]
async fn envelope_passthrough_survives_matching() {
    let (stream, mut published) = matcher(vec![botany_or_v2()]).await;
    let envelope: EntityEnvelope = serde_json::from_value(json!({
        "type": "ods:DigitalSpecimen",
        "entity": {"@id": "E1", "topic": "Botany"},
        "forceMasSchedule": false
    }))
    .unwrap();

    stream.run(vec![envelope]).await;
    let out = published.drain_entities();
    assert_eq!(out[0].kind.as_deref(), Some("ods:DigitalSpecimen"));
    assert_eq!(out[0].extra.get("forceMasSchedule"), Some(&json!(false)));
}

#[tokio::test]
async fn empty_cache_matches_nothing() {
    let (stream, mut published) = matcher(Vec::new()).await;
    let report = stream
        .run_entities(vec![CandidateEntity::new("E1").with_field("topic", "Botany")])
        .await;

    assert_eq!(report.entities, 1);
    assert_eq!(report.evaluated, 0);
    assert!(published.drain_entities().is_empty());
}

#[tokio::test]
async fn invalid_cached_filters_are_skipped() {
    let bad = PredicateFilter::from_json(json!({"operator": "NOT", "key": "topic", "values": ["a", "b"]})).unwrap();
    let (stream, mut published) = matcher(vec![
        CollectionDefinition::new("C-BAD", bad),
        CollectionDefinition::new("C-BOTANY", PredicateFilter::equals("topic", "Botany")),
    ])
    .await;

    let report = stream
        .run_entities(vec![CandidateEntity::new("E1").with_field("topic", "Botany")])
        .await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(published.drain_entities().len(), 1);
}

/// Fails every `fail_every`-th publish.
struct FlakyPublisher {
    inner: ChannelPublisher,
    calls: AtomicUsize,
    fail_every: usize,
}

#[async_trait]
impl EntityPublisher for FlakyPublisher {
    async fn publish(&self, envelope: &EntityEnvelope) -> Result<(), QueueError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n % self.fail_every == 0 {
            return Err(QueueError::Publish("broker unavailable".to_string()));
        }
        self.inner.publish(envelope).await
    }

    async fn dead_letter(&self, letter: DeadLetter) -> Result<(), QueueError> {
        self.inner.dead_letter(letter).await
    }
}

#[tokio::test]
async fn a_failed_pair_does_not_stop_the_batch() {
    let (inner, mut published) = ChannelPublisher::new();
    let publisher = Arc::new(FlakyPublisher {
        inner,
        calls: AtomicUsize::new(0),
        fail_every: 2,
    });
    let cache = loaded_cache(vec![
        CollectionDefinition::new("C1", PredicateFilter::equals("topic", "Botany")),
        CollectionDefinition::new("C2", PredicateFilter::not("topic", "Zoology")),
    ])
    .await;
    let stream = StreamMatcher::new(cache, publisher, annotator());

    let entities = vec![
        CandidateEntity::new("E1").with_field("topic", "Botany"),
        CandidateEntity::new("E2").with_field("topic", "Botany"),
    ];
    let report = stream.run_entities(entities).await;

    assert_eq!(report.matched, 4);
    assert_eq!(report.emitted, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(published.drain_entities().len(), 2);
}

#[tokio::test]
async fn batch_sees_the_latest_published_snapshot() {
    let store = Arc::new(MemoryCollectionStore::new(vec![botany_or_v2()]));
    let cache = Arc::new(CollectionCache::new(store.clone()));
    cache.refresh().await.unwrap();

    let held = cache.get();
    store.replace(Vec::new());
    cache.refresh().await.unwrap();

    assert_eq!(held.len(), 1);
    assert!(cache.get().is_empty());

    let (publisher, mut published) = ChannelPublisher::new();
    let stream = StreamMatcher::new(cache, Arc::new(publisher), annotator());
    let report = stream
        .run_entities(vec![CandidateEntity::new("E1").with_field("topic", "Botany")])
        .await;
    assert_eq!(report.matched, 0);
    assert!(published.drain_entities().is_empty());
}

#[tokio::test]
async fn definitions_load_from_a_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("botany.yml"),
        r#"
id: https://hdl.handle.net/TEST/BOTANY
name: Botany specimens
filter:
  operator: OR
  children:
    - operator: EQUALS
      key: "$['ods:topicDiscipline']"
      value: Botany
    - operator: EQUALS
      key: "$['ods:version']"
      value: 2
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("retired.yml"),
        r#"
id: https://hdl.handle.net/TEST/RETIRED
status: tombstoned
filter:
  operator: EQUALS
  key: "$['ods:topicDiscipline']"
  value: Zoology
"#,
    )
    .unwrap();

    let cache = Arc::new(CollectionCache::new(Arc::new(FileCollectionStore::new(dir.path()))));
    assert_eq!(cache.refresh().await.unwrap(), 1);

    let (publisher, mut published) = ChannelPublisher::new();
    let stream = StreamMatcher::new(cache, Arc::new(publisher), annotator());
    let report = stream
        .run_entities(vec![
            CandidateEntity::new("E1").with_field("ods:topicDiscipline", "Zoology").with_field("ods:version", 2i64),
            CandidateEntity::new("E2").with_field("ods:topicDiscipline", "Zoology").with_field("ods:version", 1i64),
        ])
        .await;

    assert_eq!(report.matched, 1);
    let out = published.drain_entities();
    assert_eq!(out[0].entity.id(), "E1");
    assert!(out[0].entity.has_relationship(MEMBER_OF, "https://hdl.handle.net/TEST/BOTANY"));
}
