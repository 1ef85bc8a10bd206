//! Outbound side of the message bus.
//!
//! Publishing is fire-and-forget: a failed publish is reported to the
//! caller once and never retried here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use collecta_core::EntityEnvelope;

use crate::error::QueueError;

/// An inbound message that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    pub message_id: String,
    pub body: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Sink for annotated entities and dead letters.
#[async_trait]
pub trait EntityPublisher: Send + Sync {
    /// Emit one annotated entity downstream.
    async fn publish(&self, envelope: &EntityEnvelope) -> Result<(), QueueError>;

    /// Route an unprocessable inbound message to the dead-letter sink.
    async fn dead_letter(&self, letter: DeadLetter) -> Result<(), QueueError>;
}

// ── JSON lines ──────────────────────────────────────────────────────

/// Writes envelopes as NDJSON to one writer and dead letters to another.
pub struct JsonLinesPublisher<W, D> {
    out: Mutex<W>,
    dead: Mutex<D>,
}

impl<W, D> JsonLinesPublisher<W, D>
where
    W: AsyncWrite + Unpin + Send,
    D: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W, dead: D) -> Self {
        Self {
            out: Mutex::new(out),
            dead: Mutex::new(dead),
        }
    }

    /// Give back the writers, e.g. to inspect buffered output.
    pub fn into_inner(self) -> (W, D) {
        (self.out.into_inner(), self.dead.into_inner())
    }
}

async fn write_line<T: Serialize + ?Sized, W: AsyncWrite + Unpin>(writer: &mut W, value: &T) -> Result<(), QueueError> {
    let mut line = serde_json::to_vec(value).map_err(|e| QueueError::Publish(e.to_string()))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl<W, D> EntityPublisher for JsonLinesPublisher<W, D>
where
    W: AsyncWrite + Unpin + Send,
    D: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, envelope: &EntityEnvelope) -> Result<(), QueueError> {
        let mut out = self.out.lock().await;
        write_line(&mut *out, envelope).await
    }

    async fn dead_letter(&self, letter: DeadLetter) -> Result<(), QueueError> {
        let mut dead = self.dead.lock().await;
        write_line(&mut *dead, &letter).await
    }
}

// ── Channels ────────────────────────────────────────────────────────

/// Receiving ends of a [`ChannelPublisher`].
pub struct PublishedStreams {
    pub entities: mpsc::UnboundedReceiver<EntityEnvelope>,
    pub dead_letters: mpsc::UnboundedReceiver<DeadLetter>,
}

impl PublishedStreams {
    /// Everything published so far, without waiting.
    pub fn drain_entities(&mut self) -> Vec<EntityEnvelope> {
        std::iter::from_fn(|| self.entities.try_recv().ok()).collect()
    }

    pub fn drain_dead_letters(&mut self) -> Vec<DeadLetter> {
        std::iter::from_fn(|| self.dead_letters.try_recv().ok()).collect()
    }
}

/// Forwards envelopes and dead letters to unbounded tokio channels.
#[derive(Clone)]
pub struct ChannelPublisher {
    entities: mpsc::UnboundedSender<EntityEnvelope>,
    dead_letters: mpsc::UnboundedSender<DeadLetter>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, PublishedStreams) {
        let (entities, entities_rx) = mpsc::unbounded_channel();
        let (dead_letters, dead_rx) = mpsc::unbounded_channel();
        (
            Self {
                entities,
                dead_letters,
            },
            PublishedStreams {
                entities: entities_rx,
                dead_letters: dead_rx,
            },
        )
    }
}

#[async_trait]
impl EntityPublisher for ChannelPublisher {
    async fn publish(&self, envelope: &EntityEnvelope) -> Result<(), QueueError> {
        self.entities
            .send(envelope.clone())
            .map_err(|_| QueueError::Publish("entity channel closed".to_string()))
    }

    async fn dead_letter(&self, letter: DeadLetter) -> Result<(), QueueError> {
        self.dead_letters
            .send(letter)
            .map_err(|_| QueueError::Publish("dead-letter channel closed".to_string()))
    }
}
