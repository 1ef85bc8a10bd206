//! Parse queue message JSON bodies into typed payloads.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::consumer::QueueMessage;
use crate::error::QueueError;

/// A message that could not be parsed, kept whole for dead-lettering.
#[derive(Debug)]
pub struct ParseFailure {
    pub message: QueueMessage,
    pub error: QueueError,
}

/// Parse a single message body into `T`.
///
/// Rejects bodies that are not valid JSON and bodies that do not fit `T`.
pub fn parse_message<T: DeserializeOwned>(msg: &QueueMessage) -> Result<T, QueueError> {
    serde_json::from_str(&msg.body).map_err(|e| {
        let kind = if e.is_syntax() || e.is_eof() {
            "Invalid JSON"
        } else {
            "Unexpected shape"
        };
        QueueError::Parse(format!("{} in message {}: {}", kind, msg.id, e))
    })
}

/// Parse a batch of messages, separating successes from failures.
///
/// Good messages are never blocked by bad ones. Successes keep their
/// input order.
pub fn parse_batch<T: DeserializeOwned>(messages: Vec<QueueMessage>) -> (Vec<T>, Vec<ParseFailure>) {
    let mut parsed = Vec::with_capacity(messages.len());
    let mut failures = Vec::new();

    for message in messages {
        match parse_message(&message) {
            Ok(value) => parsed.push(value),
            Err(error) => {
                warn!(message_id = %message.id, error = %error, "Failed to parse queue message");
                failures.push(ParseFailure { message, error });
            }
        }
    }

    (parsed, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use collecta_core::EntityEnvelope;

    fn make_msg(id: &str, body: &str) -> QueueMessage {
        QueueMessage::new(id, body)
    }

    #[test]
    fn test_parse_entity_envelope() {
        let body = r#"{
            "type": "ods:DigitalSpecimen",
            "entity": {
                "@id": "https://doi.org/TEST/ZZZ-X4T-YYV",
                "ods:topicDiscipline": "Botany"
            }
        }"#;
        let envelope: EntityEnvelope = parse_message(&make_msg("msg-1", body)).unwrap();

        assert_eq!(envelope.entity.id(), "https://doi.org/TEST/ZZZ-X4T-YYV");
        assert_eq!(envelope.entity.document()["ods:topicDiscipline"], "Botany");
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_message::<EntityEnvelope>(&make_msg("msg-bad", "not json at all")).unwrap_err();

        assert!(matches!(err, QueueError::Parse(_)));
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_parse_wrong_shape() {
        let err = parse_message::<EntityEnvelope>(&make_msg("msg-shape", r#"{"entity": 42}"#)).unwrap_err();
        assert!(err.to_string().contains("Unexpected shape"));
    }

    #[test]
    fn test_parse_batch_partial_success() {
        let messages = vec![
            make_msg("good-1", r#"{"entity":{"@id":"S1"}}"#),
            make_msg("bad-1", "invalid json"),
            make_msg("good-2", r#"{"entity":{"id":"S2","ods:version":2}}"#),
            make_msg("bad-2", r#"{"entity":{"ods:version":2}}"#),
        ];

        let (envelopes, failures) = parse_batch::<EntityEnvelope>(messages);

        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].entity.id(), "S1");
        assert_eq!(envelopes[1].entity.id(), "S2");
        let failed: Vec<_> = failures.iter().map(|f| f.message.id.as_str()).collect();
        assert_eq!(failed, vec!["bad-1", "bad-2"]);
        assert_eq!(failures[0].message.body, "invalid json");
    }
}
