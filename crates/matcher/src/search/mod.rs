//! Search index collaborator.
//!
//! The bulk matcher only needs "give me the next page of documents
//! matching this query, sorted descending on the cursor field, after this
//! cursor". [`OpenSearchIndex`] talks to a real cluster over HTTP;
//! [`MemoryIndex`] answers the same contract from a vector of documents.

mod memory;
mod opensearch;

pub use memory::MemoryIndex;
pub use opensearch::OpenSearchIndex;

use serde_json::Value;

use collecta_rules::{FieldPath, Resolved, SearchQuery};

/// One page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub query: &'a SearchQuery,
    pub size: usize,
    /// Sort value of the previous page's last hit; `None` for the first page.
    pub search_after: Option<&'a Value>,
}

/// Errors specific to the search index.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Transport(String),

    #[error("Search index returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected search response: {0}")]
    Response(String),

    #[error("Invalid search configuration: {0}")]
    Config(String),
}

/// Abstraction over a paginated search backend.
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Source field whose value orders results and resumes pagination.
    fn cursor_field(&self) -> &str;

    /// Fetch one page of raw `_source` documents, ordered by the cursor
    /// field descending. An empty page means the scan is complete.
    async fn search_page(&self, request: PageRequest<'_>) -> Result<Vec<Value>, SearchError>;

    /// Read the cursor value of `hit`.
    fn cursor_of(&self, hit: &Value) -> Option<Value> {
        let path = FieldPath::parse(self.cursor_field()).ok()?;
        match path.resolve(hit) {
            Resolved::Found(values) => values
                .into_iter()
                .find(|v| !v.is_null())
                .cloned(),
            Resolved::Missing => None,
        }
    }
}
