//! Queue consumer trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// A raw message received from a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Identifier assigned by the transport (line number, delivery tag, ...).
    pub id: String,
    /// Raw JSON body.
    pub body: String,
    /// Transport handle for acknowledging the message.
    pub receipt_handle: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Delivery attempt, starting at 1.
    pub attempt_count: u32,
}

impl QueueMessage {
    /// A first-attempt message whose receipt handle is its id.
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            receipt_handle: id.clone(),
            id,
            body: body.into(),
            timestamp: Utc::now(),
            attempt_count: 1,
        }
    }
}

/// Trait for inbound queue backends.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Wait for at least one message and return up to `max_messages`.
    ///
    /// Returns [`QueueError::Closed`] once the source is exhausted.
    async fn poll_batch(&self, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_uses_id_as_receipt_handle() {
        let msg = QueueMessage::new("line-7", r#"{"entity":{"@id":"S1"}}"#);
        assert_eq!(msg.receipt_handle, "line-7");
        assert_eq!(msg.attempt_count, 1);
    }

    #[test]
    fn message_survives_serde() {
        let msg = QueueMessage::new("m-1", "{}");
        let json = serde_json::to_string(&msg).unwrap();
        let back: QueueMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
