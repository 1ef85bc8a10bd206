//! In-process consumer fed by a tokio channel.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::consumer::{QueueConsumer, QueueMessage};
use crate::error::QueueError;

/// Consumer over an `mpsc` receiver; closes when every sender is dropped.
pub struct ChannelConsumer {
    rx: Mutex<mpsc::Receiver<QueueMessage>>,
}

impl ChannelConsumer {
    /// Create a consumer and the sender that feeds it.
    pub fn new(buffer: usize) -> (mpsc::Sender<QueueMessage>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl QueueConsumer for ChannelConsumer {
    async fn poll_batch(&self, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut rx = self.rx.lock().await;
        let first = rx.recv().await.ok_or(QueueError::Closed)?;
        let mut batch = vec![first];
        while batch.len() < max_messages {
            match rx.try_recv() {
                Ok(msg) => batch.push(msg),
                Err(_) => break,
            }
        }
        Ok(batch)
    }
}
