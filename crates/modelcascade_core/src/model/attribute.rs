//! Canonical attributes and their per-instance overrides.
//!
//! # Invariants
//! - An `Attribute` is owned by exactly one `DataObject`.
//! - Type fields refine monotonically: logical derives from conceptual and
//!   physical derives from logical, unless a caller overrides them.
//! - `DataModelAttribute` is unique per `(attribute_id, model_object_id)`.

use super::layer::Layer;
use super::{AttributeId, DataModelId, ModelAttributeId, ModelObjectId, ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: AttributeId,
    pub object_id: ObjectId,
    pub name: String,
    pub description: Option<String>,
    pub conceptual_type: Option<String>,
    pub logical_type: Option<String>,
    pub physical_type: Option<String>,
    pub length: Option<i64>,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub order_index: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Attribute {
    /// Returns the type recorded for one layer.
    pub fn type_for(&self, layer: Layer) -> Option<&str> {
        match layer {
            Layer::Conceptual => self.conceptual_type.as_deref(),
            Layer::Logical => self.logical_type.as_deref(),
            Layer::Physical => self.physical_type.as_deref(),
        }
    }

    pub fn is_key(&self) -> bool {
        self.is_primary_key || self.is_foreign_key
    }
}

/// Attribute binding inside one model instance.
///
/// `None` fields inherit the canonical attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelAttribute {
    pub id: ModelAttributeId,
    pub attribute_id: AttributeId,
    pub model_object_id: ModelObjectId,
    pub model_id: DataModelId,
    pub conceptual_type: Option<String>,
    pub logical_type: Option<String>,
    pub physical_type: Option<String>,
    pub length: Option<i64>,
    pub nullable: Option<bool>,
    pub is_primary_key: Option<bool>,
    pub is_foreign_key: Option<bool>,
    pub order_index: Option<i64>,
    pub layer_specific_config: Option<JsonValue>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DataModelAttribute {
    pub fn is_key(&self) -> bool {
        self.is_primary_key.unwrap_or(false) || self.is_foreign_key.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttribute {
    pub object_id: ObjectId,
    pub name: String,
    pub description: Option<String>,
    pub conceptual_type: Option<String>,
    pub logical_type: Option<String>,
    pub physical_type: Option<String>,
    pub length: Option<i64>,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    /// Appended after existing attributes when `None`.
    pub order_index: Option<i64>,
}

impl NewAttribute {
    pub fn new(object_id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            object_id,
            name: name.into(),
            description: None,
            conceptual_type: None,
            logical_type: None,
            physical_type: None,
            length: None,
            nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
            order_index: None,
        }
    }

    pub fn with_conceptual_type(mut self, conceptual_type: impl Into<String>) -> Self {
        self.conceptual_type = Some(conceptual_type.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.is_foreign_key = true;
        self
    }
}

/// Partial update for a canonical attribute. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub conceptual_type: Option<String>,
    pub logical_type: Option<String>,
    pub physical_type: Option<String>,
    pub length: Option<i64>,
    pub nullable: Option<bool>,
    pub is_primary_key: Option<bool>,
    pub is_foreign_key: Option<bool>,
    pub order_index: Option<i64>,
}

impl AttributePatch {
    pub fn apply_to(&self, attribute: &mut Attribute) {
        if let Some(name) = &self.name {
            attribute.name = name.clone();
        }
        if let Some(description) = &self.description {
            attribute.description = Some(description.clone());
        }
        if let Some(value) = &self.conceptual_type {
            attribute.conceptual_type = Some(value.clone());
        }
        if let Some(value) = &self.logical_type {
            attribute.logical_type = Some(value.clone());
        }
        if let Some(value) = &self.physical_type {
            attribute.physical_type = Some(value.clone());
        }
        if let Some(length) = self.length {
            attribute.length = Some(length);
        }
        if let Some(nullable) = self.nullable {
            attribute.nullable = nullable;
        }
        if let Some(flag) = self.is_primary_key {
            attribute.is_primary_key = flag;
        }
        if let Some(flag) = self.is_foreign_key {
            attribute.is_foreign_key = flag;
        }
        if let Some(order_index) = self.order_index {
            attribute.order_index = order_index;
        }
    }
}

/// Insert input for one `DataModelAttribute` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModelAttribute {
    pub attribute_id: AttributeId,
    pub model_object_id: ModelObjectId,
    pub model_id: DataModelId,
    pub conceptual_type: Option<String>,
    pub logical_type: Option<String>,
    pub physical_type: Option<String>,
    pub length: Option<i64>,
    pub nullable: Option<bool>,
    pub is_primary_key: Option<bool>,
    pub is_foreign_key: Option<bool>,
    pub order_index: Option<i64>,
}

impl NewModelAttribute {
    /// Binding that mirrors the canonical attribute's current values.
    pub fn mirroring(
        attribute: &Attribute,
        model_object_id: ModelObjectId,
        model_id: DataModelId,
    ) -> Self {
        Self {
            attribute_id: attribute.id,
            model_object_id,
            model_id,
            conceptual_type: attribute.conceptual_type.clone(),
            logical_type: attribute.logical_type.clone(),
            physical_type: attribute.physical_type.clone(),
            length: attribute.length,
            nullable: Some(attribute.nullable),
            is_primary_key: Some(attribute.is_primary_key),
            is_foreign_key: Some(attribute.is_foreign_key),
            order_index: Some(attribute.order_index),
        }
    }
}
