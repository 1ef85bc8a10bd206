//! Message-bus plumbing for the collection matcher.
//!
//! Transport-agnostic contracts (inbound [`QueueConsumer`], outbound
//! [`EntityPublisher`]) plus the pieces every transport shares: JSON
//! parsing with per-message failure split and size/time micro-batching.

pub mod batcher;
pub mod channel;
pub mod consumer;
pub mod error;
pub mod lines;
pub mod parser;
pub mod publisher;

pub use batcher::MicroBatcher;
pub use channel::ChannelConsumer;
pub use consumer::{QueueConsumer, QueueMessage};
pub use error::QueueError;
pub use lines::LineConsumer;
pub use parser::{parse_batch, parse_message, ParseFailure};
pub use publisher::{ChannelPublisher, DeadLetter, EntityPublisher, JsonLinesPublisher, PublishedStreams};
