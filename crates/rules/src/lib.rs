//! Collection membership rule engine.
//!
//! This crate provides:
//! - Predicate filter model with serde deserialization
//! - Typed field paths shared by both evaluators
//! - One validation pass producing a [`predicate::Predicate`] tree
//! - Search-index query compiler and in-memory document evaluator
//! - Collection definitions, a file-backed store and the snapshot cache

pub mod cache;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod path;
pub mod predicate;
pub mod schema;
pub mod store;

pub use cache::{spawn_refresh_task, CachedCollection, CollectionCache, Snapshot};
pub use compiler::{BoolQuery, QueryCompiler, SearchQuery};
pub use error::FilterError;
pub use evaluator::LocalEvaluator;
pub use path::{FieldPath, PathSegment, Resolved};
pub use predicate::{Leaf, LeafTest, Predicate};
pub use schema::*;
pub use store::{
    CollectionStore, FileCollectionStore, LoadResult, LoadStatus, MemoryCollectionStore, ScanReport,
    StoreError,
};
