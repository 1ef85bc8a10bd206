//! Sources of collection definitions.
//!
//! The cache only needs "give me every active definition"; where they come
//! from is behind [`CollectionStore`]. Two implementations ship here:
//! a directory of YAML/JSON files and an in-memory list.

mod error;
mod file;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

pub use self::error::{LoadResult, LoadStatus, Result, StoreError};
pub use self::file::{FileCollectionStore, ScanReport};

use crate::schema::CollectionDefinition;

/// Repository of collection definitions.
#[async_trait::async_trait]
pub trait CollectionStore: Send + Sync {
    /// Every non-tombstoned definition currently known.
    async fn fetch_active(&self) -> Result<Vec<CollectionDefinition>>;
}

/// In-memory store, replaced wholesale by its owner.
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    definitions: RwLock<Vec<CollectionDefinition>>,
    fetches: AtomicUsize,
}

impl MemoryCollectionStore {
    pub fn new(definitions: Vec<CollectionDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Swap the full definition list.
    pub fn replace(&self, definitions: Vec<CollectionDefinition>) {
        *self.definitions.write().unwrap_or_else(|e| e.into_inner()) = definitions;
    }

    /// Insert or overwrite one definition by id.
    pub fn upsert(&self, definition: CollectionDefinition) {
        let mut guard = self.definitions.write().unwrap_or_else(|e| e.into_inner());
        match guard.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => *existing = definition,
            None => guard.push(definition),
        }
    }

    /// Number of `fetch_active` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn fetch_active(&self) -> Result<Vec<CollectionDefinition>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let guard = self.definitions.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.iter().filter(|d| d.is_active()).cloned().collect())
    }
}
