//! Idempotent membership annotation.

use chrono::Utc;
use tracing::{debug, warn};

use collecta_core::config::ApplicationConfig;
use collecta_core::{Agent, CandidateEntity, CollectaError, RelationshipRecord, MEMBER_OF};

/// Appends `member-of` relationships asserted by this service.
#[derive(Debug, Clone)]
pub struct RelationshipAnnotator {
    agent: Agent,
}

impl RelationshipAnnotator {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub fn from_config(app: &ApplicationConfig) -> Self {
        Self::new(Agent {
            id: app.pid.clone(),
            name: app.name.clone(),
            role: app.role.clone(),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Record that `entity` belongs to the collection.
    ///
    /// Returns `Ok(false)` without touching the entity if a `member-of`
    /// relationship to `collection_id` already exists.
    pub fn annotate(
        &self,
        entity: &mut CandidateEntity,
        collection_id: &str,
        collection_uri: &str,
    ) -> Result<bool, CollectaError> {
        if entity.has_relationship(MEMBER_OF, collection_id) {
            warn!(
                entity_id = %entity.id(),
                collection_id = %collection_id,
                "entity already belongs to collection, skipping relationship"
            );
            return Ok(false);
        }

        let record = RelationshipRecord {
            relationship_type: MEMBER_OF.to_string(),
            subject_id: entity.id().to_string(),
            target_id: collection_id.to_string(),
            target_uri: Some(collection_uri.to_string()),
            established_at: Utc::now(),
            asserting_agent: self.agent.clone(),
        };
        entity.push_relationship(&record)?;
        debug!(entity_id = %entity.id(), collection_id = %collection_id, "added membership relationship");
        Ok(true)
    }
}
