//! Canonical data objects and their per-model instances.
//!
//! # Invariants
//! - One `DataObject` row per real-world entity, created once at the model
//!   where it was first defined and never copied across layers.
//! - `DataModelObject` is unique per `(object_id, model_id)`.

use super::{DataAreaId, DataModelId, DomainId, ModelObjectId, ObjectId, SystemId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Canvas coordinates carried forward between layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Canonical, layer-independent entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
    pub id: ObjectId,
    pub name: String,
    pub description: Option<String>,
    pub object_type: Option<String>,
    /// Model where the object was first defined.
    pub model_id: DataModelId,
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    pub source_system_id: Option<SystemId>,
    pub target_system_id: Option<SystemId>,
    pub position: Option<Position>,
    pub metadata: Option<JsonValue>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Binding of a canonical object into one model, with layer-local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelObject {
    pub id: ModelObjectId,
    pub object_id: ObjectId,
    pub model_id: DataModelId,
    pub target_system_id: Option<SystemId>,
    pub position: Option<Position>,
    pub metadata: Option<JsonValue>,
    pub is_visible: bool,
    pub layer_specific_config: Option<JsonValue>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataObject {
    pub name: String,
    pub model_id: DataModelId,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    pub source_system_id: Option<SystemId>,
    pub target_system_id: Option<SystemId>,
    pub position: Option<Position>,
    pub metadata: Option<JsonValue>,
}

impl NewDataObject {
    pub fn new(name: impl Into<String>, model_id: DataModelId) -> Self {
        Self {
            name: name.into(),
            model_id,
            description: None,
            object_type: None,
            domain_id: None,
            data_area_id: None,
            source_system_id: None,
            target_system_id: None,
            position: None,
            metadata: None,
        }
    }
}

/// Partial update for a canonical object. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    pub source_system_id: Option<SystemId>,
    pub target_system_id: Option<SystemId>,
    pub position: Option<Position>,
    pub metadata: Option<JsonValue>,
}

/// Layer-local state used when binding an object into a model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePlacement {
    pub target_system_id: Option<SystemId>,
    pub position: Option<Position>,
    pub metadata: Option<JsonValue>,
    pub is_visible: bool,
    pub layer_specific_config: Option<JsonValue>,
}

impl Default for InstancePlacement {
    fn default() -> Self {
        Self {
            target_system_id: None,
            position: None,
            metadata: None,
            is_visible: true,
            layer_specific_config: None,
        }
    }
}

impl InstancePlacement {
    /// Placement that carries the canonical object's position and metadata.
    pub fn carried_from(object: &DataObject) -> Self {
        Self {
            target_system_id: object.target_system_id,
            position: object.position,
            metadata: object.metadata.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelObjectPatch {
    pub target_system_id: Option<SystemId>,
    pub position: Option<Position>,
    pub metadata: Option<JsonValue>,
    pub is_visible: Option<bool>,
    pub layer_specific_config: Option<JsonValue>,
}
