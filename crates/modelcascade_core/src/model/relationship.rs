//! Global (object-level) and model-specific (layer-scoped) relationships.
//!
//! The two kinds live in separate tables and are never merged.

use super::{AttributeId, DataModelId, ModelAttributeId, ModelObjectId, ObjectId, RelationshipId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLevel {
    Object,
    Attribute,
}

impl RelationshipLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Attribute => "attribute",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "object" => Some(Self::Object),
            "attribute" => Some(Self::Attribute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:1")]
    ManyToOne,
    #[serde(rename = "M:N")]
    ManyToMany,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "1:1",
            Self::OneToMany => "1:N",
            Self::ManyToOne => "N:1",
            Self::ManyToMany => "M:N",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "1:1" => Some(Self::OneToOne),
            "1:N" => Some(Self::OneToMany),
            "N:1" => Some(Self::ManyToOne),
            "M:N" | "N:M" => Some(Self::ManyToMany),
            _ => None,
        }
    }
}

/// Relationship between two canonical objects, independent of layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRelationship {
    pub id: RelationshipId,
    pub source_object_id: ObjectId,
    pub target_object_id: ObjectId,
    pub relationship_level: RelationshipLevel,
    pub source_attribute_id: Option<AttributeId>,
    pub target_attribute_id: Option<AttributeId>,
    pub relationship_type: Cardinality,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GlobalRelationship {
    pub fn touches(&self, object_id: ObjectId) -> bool {
        self.source_object_id == object_id || self.target_object_id == object_id
    }
}

/// Relationship between two instances inside one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelObjectRelationship {
    pub id: RelationshipId,
    pub model_id: DataModelId,
    pub source_model_object_id: ModelObjectId,
    pub target_model_object_id: ModelObjectId,
    pub relationship_level: RelationshipLevel,
    pub source_attribute_id: Option<ModelAttributeId>,
    pub target_attribute_id: Option<ModelAttributeId>,
    pub relationship_type: Cardinality,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Opaque edge routing hints owned by the diagram renderer.
    pub routing: Option<JsonValue>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ModelObjectRelationship {
    pub fn touches(&self, model_object_id: ModelObjectId) -> bool {
        self.source_model_object_id == model_object_id
            || self.target_model_object_id == model_object_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Relationship {
    Global(GlobalRelationship),
    ModelSpecific(ModelObjectRelationship),
}

impl Relationship {
    pub fn id(&self) -> RelationshipId {
        match self {
            Self::Global(rel) => rel.id,
            Self::ModelSpecific(rel) => rel.id,
        }
    }

    pub fn level(&self) -> RelationshipLevel {
        match self {
            Self::Global(rel) => rel.relationship_level,
            Self::ModelSpecific(rel) => rel.relationship_level,
        }
    }
}

/// Endpoints of a relationship, which also fix its scope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RelationshipEndpoints {
    Global {
        source_object_id: ObjectId,
        target_object_id: ObjectId,
        source_attribute_id: Option<AttributeId>,
        target_attribute_id: Option<AttributeId>,
    },
    ModelSpecific {
        model_id: DataModelId,
        source_model_object_id: ModelObjectId,
        target_model_object_id: ModelObjectId,
        source_attribute_id: Option<ModelAttributeId>,
        target_attribute_id: Option<ModelAttributeId>,
        routing: Option<JsonValue>,
    },
}

impl RelationshipEndpoints {
    pub fn global(source_object_id: ObjectId, target_object_id: ObjectId) -> Self {
        Self::Global {
            source_object_id,
            target_object_id,
            source_attribute_id: None,
            target_attribute_id: None,
        }
    }

    pub fn model_specific(
        model_id: DataModelId,
        source_model_object_id: ModelObjectId,
        target_model_object_id: ModelObjectId,
    ) -> Self {
        Self::ModelSpecific {
            model_id,
            source_model_object_id,
            target_model_object_id,
            source_attribute_id: None,
            target_attribute_id: None,
            routing: None,
        }
    }

    fn attribute_pins_present(&self) -> bool {
        match self {
            Self::Global {
                source_attribute_id,
                target_attribute_id,
                ..
            } => source_attribute_id.is_some() && target_attribute_id.is_some(),
            Self::ModelSpecific {
                source_attribute_id,
                target_attribute_id,
                ..
            } => source_attribute_id.is_some() && target_attribute_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelationship {
    pub endpoints: RelationshipEndpoints,
    /// Inferred from the attribute pins when omitted.
    pub relationship_level: Option<RelationshipLevel>,
    pub relationship_type: Cardinality,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl NewRelationship {
    pub fn new(endpoints: RelationshipEndpoints, relationship_type: Cardinality) -> Self {
        Self {
            endpoints,
            relationship_level: None,
            relationship_type,
            name: None,
            description: None,
        }
    }

    /// Level used for persistence: explicit when given, otherwise attribute
    /// level exactly when both attribute pins are present.
    pub fn effective_level(&self) -> RelationshipLevel {
        self.relationship_level.unwrap_or_else(|| {
            if self.endpoints.attribute_pins_present() {
                RelationshipLevel::Attribute
            } else {
                RelationshipLevel::Object
            }
        })
    }
}
