//! Generic key/value annotations on any modeling entity.
//!
//! # Invariants
//! - A property is keyed by `(entity_type, entity_id, model_id, name, layer)`.
//! - `layer = None` marks a model-wide property.
//! - `entity_id` is not checked against the target table, and the value is
//!   not checked against the declared `property_type`.

use super::layer::Layer;
use super::{AttributeId, DataModelId, ModelAttributeId, ModelObjectId, ObjectId, PropertyId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Model,
    Object,
    ModelObject,
    Attribute,
    ModelAttribute,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Object => "object",
            Self::ModelObject => "model_object",
            Self::Attribute => "attribute",
            Self::ModelAttribute => "model_attribute",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "model" => Some(Self::Model),
            "object" => Some(Self::Object),
            "model_object" => Some(Self::ModelObject),
            "attribute" => Some(Self::Attribute),
            "model_attribute" => Some(Self::ModelAttribute),
            _ => None,
        }
    }
}

/// Typed reference to the entity a property annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entityType", content = "entityId", rename_all = "snake_case")]
pub enum EntityRef {
    Model(DataModelId),
    Object(ObjectId),
    ModelObject(ModelObjectId),
    Attribute(AttributeId),
    ModelAttribute(ModelAttributeId),
}

impl EntityRef {
    pub fn new(entity_type: EntityType, entity_id: Uuid) -> Self {
        match entity_type {
            EntityType::Model => Self::Model(entity_id),
            EntityType::Object => Self::Object(entity_id),
            EntityType::ModelObject => Self::ModelObject(entity_id),
            EntityType::Attribute => Self::Attribute(entity_id),
            EntityType::ModelAttribute => Self::ModelAttribute(entity_id),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Model(_) => EntityType::Model,
            Self::Object(_) => EntityType::Object,
            Self::ModelObject(_) => EntityType::ModelObject,
            Self::Attribute(_) => EntityType::Attribute,
            Self::ModelAttribute(_) => EntityType::ModelAttribute,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match *self {
            Self::Model(id)
            | Self::Object(id)
            | Self::ModelObject(id)
            | Self::Attribute(id)
            | Self::ModelAttribute(id) => id,
        }
    }
}

/// Type-erased property payload.
///
/// Persisted as adjacently tagged JSON so every variant round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Json(JsonValue),
    Array(Vec<JsonValue>),
}

impl PropertyValue {
    /// Whether the payload survives a JSON round trip. JSON has no NaN or
    /// infinity, so non-finite numbers would come back as `null`.
    pub fn is_json_safe(&self) -> bool {
        match self {
            Self::Number(value) => value.is_finite(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: PropertyId,
    pub entity: EntityRef,
    pub model_id: Option<DataModelId>,
    pub property_name: String,
    pub property_value: PropertyValue,
    /// Caller-declared tag, stored verbatim.
    pub property_type: String,
    pub layer: Option<Layer>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Upsert input for one property row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWrite {
    pub entity: EntityRef,
    pub model_id: Option<DataModelId>,
    pub property_name: String,
    pub property_value: PropertyValue,
    pub property_type: String,
    pub layer: Option<Layer>,
}
