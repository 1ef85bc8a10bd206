//! Wire-level schema types with serde deserialization.
//!
//! - `PredicateFilter`: recursive filter tree as authored
//! - `CollectionDefinition`: a filter plus collection identity and status
//! - `CollectionEvent`: create/update/tombstone notifications

mod collection;
mod filter;

pub use collection::*;
pub use filter::*;

#[cfg(test)]
mod tests;
