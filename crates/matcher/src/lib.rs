//! Collection membership matching pipelines.
//!
//! - [`BulkMatcher`]: pages a search index for one collection's filter
//! - [`StreamMatcher`]: checks inbound entities against every cached filter
//! - [`RelationshipAnnotator`]: records membership idempotently
//! - [`MessageRouter`]: glues bus messages to the two matchers

pub mod annotator;
pub mod bulk;
pub mod error;
pub mod router;
pub mod search;
pub mod stream;

pub use annotator::RelationshipAnnotator;
pub use bulk::BulkMatcher;
pub use error::MatchError;
pub use router::MessageRouter;
pub use search::{MemoryIndex, OpenSearchIndex, PageRequest, SearchError, SearchIndex};
pub use stream::{BatchReport, StreamMatcher};
