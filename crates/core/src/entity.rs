use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CollectaError;

/// Relationship type recorded when an entity joins a collection.
pub const MEMBER_OF: &str = "member-of";

/// Keys read for the entity identifier, in order of preference.
pub const ID_FIELDS: [&str; 2] = ["@id", "id"];

/// Key holding the entity's relationship list.
pub const RELATIONSHIPS_FIELD: &str = "ods:hasEntityRelationships";

const RELATIONSHIP_TYPE_KEYS: [&str; 2] = ["relationshipType", "dwc:relationshipOfResource"];
const RELATIONSHIP_TARGET_KEYS: [&str; 2] = ["targetId", "dwc:relatedResourceID"];

/// A structured record tested for collection membership.
///
/// The entity is the JSON object it arrived as. Filters are evaluated
/// against that object and it is emitted downstream with only new
/// relationship records appended. The identifier and the relationship
/// list are read through accessors; existing relationship records are
/// kept exactly as written, whoever wrote them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct CandidateEntity {
    id: String,
    document: Map<String, Value>,
}

impl CandidateEntity {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut document = Map::new();
        document.insert(ID_FIELDS[0].to_string(), Value::String(id.clone()));
        Self { id, document }
    }

    /// Builder-style helper for setting a top-level field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.document.insert(key.into(), value.into());
        if let Some(id) = identifier(&self.document) {
            self.id = id;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// The entity as a JSON document, exactly as received plus any
    /// appended relationships.
    pub fn to_document(&self) -> Value {
        Value::Object(self.document.clone())
    }

    /// Build an entity from a raw JSON document (e.g. a search hit).
    pub fn from_document(doc: Value) -> Result<Self, CollectaError> {
        match doc {
            Value::Object(map) => Self::try_from(map),
            other => Err(CollectaError::NotAnObject(other.to_string())),
        }
    }

    /// Recorded relationships, raw.
    pub fn relationships(&self) -> &[Value] {
        self.document
            .get(RELATIONSHIPS_FIELD)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether a relationship of `relationship_type` to `target_id` is
    /// already recorded. Darwin Core key names are recognized as well.
    pub fn has_relationship(&self, relationship_type: &str, target_id: &str) -> bool {
        self.relationships().iter().any(|record| {
            first_str(record, &RELATIONSHIP_TYPE_KEYS) == Some(relationship_type)
                && first_str(record, &RELATIONSHIP_TARGET_KEYS) == Some(target_id)
        })
    }

    /// Append a relationship record, creating the list if absent.
    pub fn push_relationship(&mut self, record: &RelationshipRecord) -> Result<(), CollectaError> {
        let value = serde_json::to_value(record)?;
        let list = self
            .document
            .entry(RELATIONSHIPS_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));
        match list {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(CollectaError::InvalidRelationships(other.to_string())),
        }
    }
}

impl TryFrom<Map<String, Value>> for CandidateEntity {
    type Error = CollectaError;

    fn try_from(document: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = identifier(&document).ok_or(CollectaError::MissingIdentifier)?;
        match document.get(RELATIONSHIPS_FIELD) {
            None | Some(Value::Array(_)) => Ok(Self { id, document }),
            Some(other) => Err(CollectaError::InvalidRelationships(other.to_string())),
        }
    }
}

impl Serialize for CandidateEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

fn identifier(document: &Map<String, Value>) -> Option<String> {
    ID_FIELDS
        .iter()
        .find_map(|key| document.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn first_str<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| record.get(*key).and_then(Value::as_str))
}

/// A membership edge appended by this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub relationship_type: String,
    pub subject_id: String,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_uri: Option<String>,
    pub established_at: DateTime<Utc>,
    pub asserting_agent: Agent,
}

/// The software agent that asserts a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: String,
}

/// Wire envelope around a candidate entity on the message bus.
///
/// Extra keys are passed through untouched to the outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEnvelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub entity: CandidateEntity,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityEnvelope {
    /// Wrap a bare entity (e.g. one fetched from the search index).
    pub fn wrap(entity: CandidateEntity) -> Self {
        Self {
            kind: None,
            entity,
            extra: Map::new(),
        }
    }
}
