//! Domain records for the three-layer modeling core.
//!
//! # Responsibility
//! - Define the canonical and per-layer records persisted by repositories.
//! - Keep one canonical identity per real-world entity, referenced by up to
//!   three layer instances.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Model parent links are plain ids resolved by lookup, never pointers.
//! - Timestamps are epoch milliseconds written by storage.

pub mod attribute;
pub mod data_model;
pub mod layer;
pub mod object;
pub mod property;
pub mod registry;
pub mod relationship;

use uuid::Uuid;

pub type DomainId = Uuid;
pub type DataAreaId = Uuid;
pub type SystemId = Uuid;
pub type DataModelId = Uuid;
pub type ObjectId = Uuid;
pub type ModelObjectId = Uuid;
pub type AttributeId = Uuid;
pub type ModelAttributeId = Uuid;
pub type RelationshipId = Uuid;
pub type PropertyId = Uuid;

/// Kind of record, used in errors and change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Domain,
    DataArea,
    System,
    Model,
    Object,
    ModelObject,
    Attribute,
    ModelAttribute,
    Relationship,
    Property,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::DataArea => "data_area",
            Self::System => "system",
            Self::Model => "model",
            Self::Object => "object",
            Self::ModelObject => "model_object",
            Self::Attribute => "attribute",
            Self::ModelAttribute => "model_attribute",
            Self::Relationship => "relationship",
            Self::Property => "property",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
