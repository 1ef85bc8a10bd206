//! Routes raw bus messages to the matchers.

use std::sync::Arc;

use tracing::{error, info, warn};

use collecta_core::EntityEnvelope;
use collecta_queue::{
    parse_batch, parse_message, DeadLetter, EntityPublisher, QueueConsumer, QueueError, QueueMessage,
};
use collecta_rules::CollectionEvent;

use crate::bulk::BulkMatcher;
use crate::error::MatchError;
use crate::stream::{BatchReport, StreamMatcher};

pub struct MessageRouter {
    stream: StreamMatcher,
    bulk: BulkMatcher,
    publisher: Arc<dyn EntityPublisher>,
}

impl MessageRouter {
    pub fn new(stream: StreamMatcher, bulk: BulkMatcher, publisher: Arc<dyn EntityPublisher>) -> Self {
        Self {
            stream,
            bulk,
            publisher,
        }
    }

    /// Parse a batch of entity messages and match the good ones.
    ///
    /// Messages that do not parse are dead-lettered and counted in
    /// [`BatchReport::rejected`].
    pub async fn route_entities(&self, messages: Vec<QueueMessage>) -> BatchReport {
        let (envelopes, failures) = parse_batch::<EntityEnvelope>(messages);
        let rejected = failures.len();

        for failure in failures {
            self.dead_letter(DeadLetter::new(
                failure.message.id,
                failure.message.body,
                failure.error.to_string(),
            ))
            .await;
        }

        let mut report = self.stream.run(envelopes).await;
        report.rejected = rejected;
        report
    }

    /// Handle one collection change event.
    ///
    /// Returns the number of entities processed by the triggered scan, or
    /// `None` when the event was dead-lettered or does not call for a scan.
    pub async fn route_event(&self, message: QueueMessage) -> Result<Option<u64>, MatchError> {
        let event: CollectionEvent = match parse_message(&message) {
            Ok(event) => event,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "dead-lettering unreadable collection event");
                self.dead_letter(DeadLetter::new(message.id, message.body, e.to_string()))
                    .await;
                return Ok(None);
            }
        };

        if !event.triggers_scan() {
            info!(
                collection_id = %event.collection.id,
                action = ?event.action,
                "collection event does not require a scan"
            );
            return Ok(None);
        }

        self.bulk.run(&event.collection).await.map(Some)
    }

    /// Drain `consumer` of collection events, one at a time, until it closes.
    ///
    /// A failed scan is logged and does not stop the loop. Returns the
    /// number of scans that completed.
    pub async fn consume_events(&self, consumer: &dyn QueueConsumer) -> u64 {
        let mut scans = 0;
        loop {
            let messages = match consumer.poll_batch(1).await {
                Ok(messages) => messages,
                Err(QueueError::Closed) => break,
                Err(e) => {
                    error!(error = %e, "reading collection events failed");
                    break;
                }
            };
            for message in messages {
                let message_id = message.id.clone();
                match self.route_event(message).await {
                    Ok(Some(processed)) => {
                        scans += 1;
                        info!(message_id = %message_id, processed, "collection scan complete");
                    }
                    Ok(None) => {}
                    Err(e) => error!(
                        message_id = %message_id,
                        error = %e,
                        "collection scan failed, manual action required"
                    ),
                }
            }
        }
        scans
    }

    async fn dead_letter(&self, letter: DeadLetter) {
        let message_id = letter.message_id.clone();
        if let Err(e) = self.publisher.dead_letter(letter).await {
            error!(message_id = %message_id, error = %e, "failed to dead-letter message");
        }
    }
}
