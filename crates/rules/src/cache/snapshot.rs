//! Immutable view of the active collections at one point in time.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::predicate::Predicate;
use crate::schema::CollectionDefinition;

/// A collection definition paired with its validated predicate.
#[derive(Debug, Clone)]
pub struct CachedCollection {
    pub definition: CollectionDefinition,
    pub predicate: Predicate,
}

impl CachedCollection {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn uri(&self) -> &str {
        self.definition.uri()
    }
}

/// Every active, valid collection as of one load.
///
/// Snapshots are never mutated after construction; a refresh builds a new
/// one and swaps it in whole.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    collections: Vec<CachedCollection>,
}

impl Snapshot {
    /// The placeholder served before the first successful load.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            loaded_at: None,
            collections: Vec::new(),
        }
    }

    /// Validate `definitions` into a snapshot tagged with `generation`.
    ///
    /// Tombstoned definitions and definitions whose filter fails validation
    /// are left out; the latter are logged.
    pub fn build(generation: u64, definitions: Vec<CollectionDefinition>) -> Self {
        let collections = definitions
            .into_iter()
            .filter(CollectionDefinition::is_active)
            .filter_map(|definition| match Predicate::from_filter(&definition.filter) {
                Ok(predicate) => Some(CachedCollection {
                    definition,
                    predicate,
                }),
                Err(e) => {
                    warn!(collection_id = %definition.id, error = %e, "excluding collection with invalid filter");
                    None
                }
            })
            .collect();

        Self {
            generation,
            loaded_at: Some(Utc::now()),
            collections,
        }
    }

    /// Monotonic load counter; 0 means nothing has been loaded yet.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn collections(&self) -> &[CachedCollection] {
        &self.collections
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedCollection> {
        self.collections.iter()
    }

    pub fn find(&self, id: &str) -> Option<&CachedCollection> {
        self.collections.iter().find(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
