//! In-process cache of active collection definitions.
//!
//! Readers take an `Arc<Snapshot>` and keep using it for as long as they
//! like; a refresh publishes a complete new snapshot with one atomic swap,
//! so no reader ever sees a mix of old and new definitions.
//!
//! ```text
//! CollectionStore ──fetch_active──► Snapshot::build ──store──► ArcSwap<Snapshot>
//!                                                                  │ load_full
//!                                                       stream / bulk matchers
//! ```

mod refresh;
mod snapshot;


use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{error, info};

pub use self::refresh::spawn_refresh_task;
pub use self::snapshot::{CachedCollection, Snapshot};

use crate::store::{CollectionStore, StoreError};

/// Atomically swappable set of active collections.
pub struct CollectionCache {
    store: Arc<dyn CollectionStore>,
    current: ArcSwap<Snapshot>,
    /// Serializes refreshes so generations are published in order.
    write_lock: Mutex<()>,
}

impl CollectionCache {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            store,
            current: ArcSwap::from_pointee(Snapshot::empty()),
            write_lock: Mutex::new(()),
        }
    }

    /// Load definitions from the store and publish a new snapshot.
    ///
    /// On error the previous snapshot stays in place and the error is
    /// returned. Returns the number of collections in the new snapshot.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let previous = self.current.load_full();

        let definitions = match self.store.fetch_active().await {
            Ok(defs) => defs,
            Err(e) => {
                error!(
                    error = %e,
                    generation = previous.generation(),
                    "collection refresh failed, keeping previous snapshot"
                );
                return Err(e);
            }
        };

        let fetched = definitions.len();
        let snapshot = Snapshot::build(previous.generation() + 1, definitions);
        let count = snapshot.len();
        info!(
            generation = snapshot.generation(),
            collections = count,
            excluded = fetched - count,
            "collection cache refreshed"
        );
        self.current.store(Arc::new(snapshot));
        Ok(count)
    }

    /// Current snapshot. Never blocks and never observes a partial update.
    pub fn get(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Whether at least one load has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.current.load().generation() > 0
    }
}

impl std::fmt::Debug for CollectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.load();
        f.debug_struct("CollectionCache")
            .field("generation", &current.generation())
            .field("collections", &current.len())
            .finish()
    }
}
