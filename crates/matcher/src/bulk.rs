//! Bulk membership scan for one collection.
//!
//! ```text
//! filter ──compile──► query ──page 1──► hits ──annotate/publish──┐
//!                       ▲                                        │
//!                       └──── search_after(last cursor) ◄────────┘
//! ```
//!
//! Pages are fetched strictly in cursor order and each page is fully
//! processed before the next request. The scan ends on the first empty
//! page, so `N` matches at page size `P` cost `ceil(N/P) + 1` requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use collecta_core::{CandidateEntity, EntityEnvelope};
use collecta_queue::{DeadLetter, EntityPublisher};
use collecta_rules::{CollectionDefinition, QueryCompiler};

use crate::annotator::RelationshipAnnotator;
use crate::error::MatchError;
use crate::search::{PageRequest, SearchIndex};

type RunLock = Arc<tokio::sync::Mutex<()>>;

/// Pages the search index for every entity matching a collection filter.
pub struct BulkMatcher {
    index: Arc<dyn SearchIndex>,
    publisher: Arc<dyn EntityPublisher>,
    annotator: RelationshipAnnotator,
    page_size: usize,
    /// One lock per running collection id; runs for the same id never overlap.
    runs: Mutex<HashMap<String, RunLock>>,
}

/// A claim on a collection's run lock. The registry entry is removed when
/// the last claim for that id is dropped.
struct RunSlot<'a> {
    runs: &'a Mutex<HashMap<String, RunLock>>,
    collection_id: String,
    lock: RunLock,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        // registry entry plus this slot
        if Arc::strong_count(&self.lock) == 2 {
            runs.remove(&self.collection_id);
        }
    }
}

impl BulkMatcher {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        publisher: Arc<dyn EntityPublisher>,
        annotator: RelationshipAnnotator,
        page_size: usize,
    ) -> Self {
        Self {
            index,
            publisher,
            annotator,
            page_size: page_size.max(1),
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Scan the index for `definition` and emit every match.
    ///
    /// Returns how many entities were annotated and published. An invalid
    /// filter fails before any request is made; a failed page request
    /// aborts the run. Entities that fail to parse or publish are logged,
    /// not counted, and do not stop the scan.
    pub async fn run(&self, definition: &CollectionDefinition) -> Result<u64, MatchError> {
        let query = QueryCompiler::compile(&definition.filter)?;
        debug!(collection_id = %definition.id, query = %query.to_dsl(), "compiled collection filter");

        let slot = self.claim_run(&definition.id);
        let _guard = slot.lock.lock().await;

        info!(
            collection_id = %definition.id,
            page_size = self.page_size,
            "starting bulk membership scan"
        );

        let mut cursor: Option<Value> = None;
        let mut page: u64 = 0;
        let mut processed: u64 = 0;

        loop {
            page += 1;
            let hits = self
                .index
                .search_page(PageRequest {
                    query: &query,
                    size: self.page_size,
                    search_after: cursor.as_ref(),
                })
                .await?;

            if hits.is_empty() {
                break;
            }

            let next = hits
                .last()
                .and_then(|hit| self.index.cursor_of(hit))
                .ok_or_else(|| MatchError::MissingCursor {
                    collection_id: definition.id.clone(),
                    page,
                    field: self.index.cursor_field().to_string(),
                })?;

            let hit_count = hits.len();
            let mut page_processed = 0u64;
            for hit in hits {
                if self.process_hit(definition, hit).await {
                    page_processed += 1;
                }
            }
            processed += page_processed;

            info!(
                collection_id = %definition.id,
                page,
                hits = hit_count,
                processed = page_processed,
                total = processed,
                "processed page"
            );
            cursor = Some(next);
        }

        info!(
            collection_id = %definition.id,
            pages = page,
            processed,
            "bulk membership scan finished"
        );
        Ok(processed)
    }

    /// Annotate and publish one hit. Returns whether it counts as processed.
    async fn process_hit(&self, definition: &CollectionDefinition, hit: Value) -> bool {
        let hit_id = self
            .index
            .cursor_of(&hit)
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let mut entity = match CandidateEntity::from_document(hit.clone()) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(collection_id = %definition.id, hit_id = %hit_id, error = %e, "dead-lettering unreadable search hit");
                let letter = DeadLetter::new(hit_id, hit.to_string(), e.to_string());
                if let Err(e) = self.publisher.dead_letter(letter).await {
                    error!(collection_id = %definition.id, error = %e, "failed to dead-letter search hit");
                }
                return false;
            }
        };

        if let Err(e) = self.annotator.annotate(&mut entity, &definition.id, definition.uri()) {
            error!(
                collection_id = %definition.id,
                entity_id = %entity.id(),
                error = %e,
                "cannot annotate search hit, manual action required"
            );
            return false;
        }

        let entity_id = entity.id().to_string();
        match self.publisher.publish(&EntityEnvelope::wrap(entity)).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    collection_id = %definition.id,
                    entity_id = %entity_id,
                    error = %e,
                    "failed to publish annotated entity, manual action required"
                );
                false
            }
        }
    }

    fn claim_run(&self, collection_id: &str) -> RunSlot<'_> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = runs.entry(collection_id.to_string()).or_default().clone();
        RunSlot {
            runs: &self.runs,
            collection_id: collection_id.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn active_runs(&self) -> usize {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
