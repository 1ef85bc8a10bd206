//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Message body is not valid JSON or does not fit the expected schema.
    #[error("message parse error: {0}")]
    Parse(String),

    #[error("publish error: {0}")]
    Publish(String),

    /// The inbound source is exhausted; no further messages will arrive.
    #[error("queue closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
