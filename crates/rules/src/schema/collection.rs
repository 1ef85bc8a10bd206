//! Collection definitions and the lifecycle events that change them.

use serde::{Deserialize, Serialize};

use super::filter::PredicateFilter;

/// Lifecycle state of a collection definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionStatus {
    #[default]
    #[serde(rename = "active", alias = "Active", alias = "ACTIVE")]
    Active,
    #[serde(rename = "tombstoned", alias = "Tombstoned", alias = "TOMBSTONED", alias = "tombstone")]
    Tombstoned,
}

/// A named virtual collection whose membership is defined by a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDefinition {
    #[serde(alias = "@id")]
    pub id: String,

    /// Resolvable URI for the collection; defaults to `id` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, alias = "ltc:collectionName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(alias = "ods:hasTargetDigitalObjectFilter")]
    pub filter: PredicateFilter,

    #[serde(default, alias = "ods:status")]
    pub status: CollectionStatus,
}

impl CollectionDefinition {
    pub fn new(id: impl Into<String>, filter: PredicateFilter) -> Self {
        Self {
            id: id.into(),
            uri: None,
            name: None,
            filter,
            status: CollectionStatus::Active,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tombstoned(mut self) -> Self {
        self.status = CollectionStatus::Tombstoned;
        self
    }

    /// URI recorded on membership relationships.
    pub fn uri(&self) -> &str {
        self.uri.as_deref().unwrap_or(&self.id)
    }

    pub fn is_active(&self) -> bool {
        self.status == CollectionStatus::Active
    }
}

/// What happened to a collection definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionAction {
    #[serde(alias = "CREATE", alias = "Create")]
    Create,
    #[serde(alias = "UPDATE", alias = "Update")]
    Update,
    #[serde(alias = "TOMBSTONE", alias = "Tombstone")]
    Tombstone,
}

/// Notification that a collection definition was created, updated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEvent {
    pub action: CollectionAction,
    #[serde(alias = "virtualCollection")]
    pub collection: CollectionDefinition,
}

impl CollectionEvent {
    /// Whether this event should trigger a bulk membership scan.
    pub fn triggers_scan(&self) -> bool {
        self.action != CollectionAction::Tombstone && self.collection.is_active()
    }
}
