//! Matcher error types.

use collecta_core::CollectaError;
use collecta_queue::QueueError;
use collecta_rules::{FilterError, StoreError};

use crate::search::SearchError;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Search index error: {0}")]
    Search(#[from] SearchError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Collection store error: {0}")]
    Store(#[from] StoreError),

    #[error("Entity error: {0}")]
    Entity(#[from] CollectaError),

    /// A page's last hit carries no sort key, so the scan cannot resume.
    #[error("Hit on page {page} of collection '{collection_id}' has no cursor field '{field}'")]
    MissingCursor {
        collection_id: String,
        page: u64,
        field: String,
    },
}
