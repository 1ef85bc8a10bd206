//! Stream membership matching for inbound entities.
//!
//! Each batch is checked against one cache snapshot, taken once at the
//! start of [`StreamMatcher::run`]. Every (entity, collection) pair is
//! independent: a failure on one pair is logged and the rest of the
//! batch carries on.

use std::sync::Arc;

use tracing::{debug, error, info};

use collecta_core::{CandidateEntity, EntityEnvelope};
use collecta_queue::EntityPublisher;
use collecta_rules::{CollectionCache, LocalEvaluator};

use crate::annotator::RelationshipAnnotator;

/// Outcome counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Entities received.
    pub entities: usize,
    /// Inbound messages rejected before matching (dead-lettered).
    pub rejected: usize,
    /// (entity, collection) pairs evaluated.
    pub evaluated: usize,
    pub matched: usize,
    /// Matched pairs successfully published.
    pub emitted: usize,
    /// Matched pairs that failed and need manual action.
    pub failed: usize,
}

/// Checks inbound entities against every cached collection.
pub struct StreamMatcher {
    cache: Arc<CollectionCache>,
    publisher: Arc<dyn EntityPublisher>,
    annotator: RelationshipAnnotator,
}

impl StreamMatcher {
    pub fn new(
        cache: Arc<CollectionCache>,
        publisher: Arc<dyn EntityPublisher>,
        annotator: RelationshipAnnotator,
    ) -> Self {
        Self {
            cache,
            publisher,
            annotator,
        }
    }

    /// Match bare entities.
    pub async fn run_entities(&self, entities: Vec<CandidateEntity>) -> BatchReport {
        self.run(entities.into_iter().map(EntityEnvelope::wrap).collect())
            .await
    }

    /// Match a batch of envelopes, emitting the envelope once per matched
    /// collection. Envelope passthrough keys are kept on every emission.
    pub async fn run(&self, envelopes: Vec<EntityEnvelope>) -> BatchReport {
        let snapshot = self.cache.get();
        let mut report = BatchReport {
            entities: envelopes.len(),
            ..Default::default()
        };

        if snapshot.is_empty() {
            debug!(entities = report.entities, "no active collections, nothing to match");
            return report;
        }

        for mut envelope in envelopes {
            // filters see the entity as received, not earlier annotations
            let document = envelope.entity.to_document();

            for collection in snapshot.iter() {
                report.evaluated += 1;
                if !LocalEvaluator::evaluate_predicate(&collection.predicate, &document) {
                    continue;
                }
                report.matched += 1;

                if let Err(e) = self
                    .annotator
                    .annotate(&mut envelope.entity, collection.id(), collection.uri())
                {
                    error!(
                        entity_id = %envelope.entity.id(),
                        collection_id = %collection.id(),
                        error = %e,
                        "cannot annotate matched entity, manual action required"
                    );
                    report.failed += 1;
                    continue;
                }

                match self.publisher.publish(&envelope).await {
                    Ok(()) => report.emitted += 1,
                    Err(e) => {
                        error!(
                            entity_id = %envelope.entity.id(),
                            collection_id = %collection.id(),
                            error = %e,
                            "failed to publish matched entity, manual action required"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            generation = snapshot.generation(),
            entities = report.entities,
            matched = report.matched,
            emitted = report.emitted,
            failed = report.failed,
            "stream batch matched"
        );
        report
    }
}
