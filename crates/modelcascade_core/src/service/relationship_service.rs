//! Relationship resolver.
//!
//! # Responsibility
//! - Validate and persist global (object-level) and model-specific
//!   (instance-level) relationships.
//! - Suggest a relationship level from layer and key flags.
//!
//! # Invariants
//! - Both endpoints exist in the target scope before anything is written.
//! - Model-specific endpoints belong to the relationship's model.
//! - Attribute pins belong to their endpoint and are only accepted at
//!   attribute level; attribute level requires both pins.
//! - Suggested levels are hints; an explicit level always wins.

use crate::error::{ServiceError, ServiceResult};
use crate::events::{ChangeAction, DomainEvent};
use crate::model::layer::Layer;
use crate::model::object::DataModelObject;
use crate::model::relationship::{
    GlobalRelationship, ModelObjectRelationship, NewRelationship, Relationship,
    RelationshipEndpoints, RelationshipLevel,
};
use crate::model::{
    AttributeId, DataModelId, EntityKind, ModelAttributeId, ModelObjectId, ObjectId,
    RelationshipId,
};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::object_repo::{ObjectRepository, SqliteObjectRepository};
use crate::repo::relationship_repo::{RelationshipRepository, SqliteRelationshipRepository};
use crate::service::object_service::require_model;
use crate::service::ServiceContext;
use rusqlite::Connection;
use uuid::Uuid;

pub struct RelationshipService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> RelationshipService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    fn relationships(&self) -> SqliteRelationshipRepository<'conn> {
        SqliteRelationshipRepository::new(self.ctx.conn())
    }

    /// Validates endpoints and persists the relationship in its scope.
    ///
    /// # Errors
    /// - `NotFound` for a missing model, endpoint or pinned attribute.
    /// - `ValidationFailed` for endpoints outside the model, pins that do not
    ///   belong to their endpoint, or pins inconsistent with the level.
    pub fn create_relationship(&self, input: &NewRelationship) -> ServiceResult<Relationship> {
        self.ctx.write("relationship_create", |conn, events| {
            let level = input.effective_level();
            let layer = match &input.endpoints {
                RelationshipEndpoints::Global {
                    source_object_id,
                    target_object_id,
                    source_attribute_id,
                    target_attribute_id,
                } => {
                    validate_global(
                        conn,
                        level,
                        (*source_object_id, *source_attribute_id),
                        (*target_object_id, *target_attribute_id),
                    )?;
                    None
                }
                RelationshipEndpoints::ModelSpecific {
                    model_id,
                    source_model_object_id,
                    target_model_object_id,
                    source_attribute_id,
                    target_attribute_id,
                    ..
                } => Some(validate_model_specific(
                    conn,
                    *model_id,
                    level,
                    (*source_model_object_id, *source_attribute_id),
                    (*target_model_object_id, *target_attribute_id),
                )?),
            };

            let relationship = SqliteRelationshipRepository::new(conn).create_relationship(input)?;
            let mut event =
                DomainEvent::new(EntityKind::Relationship, relationship.id(), ChangeAction::Created);
            event.layer = layer;
            events.push(event);
            Ok(relationship)
        })
    }

    pub fn get_relationship(&self, id: RelationshipId) -> ServiceResult<Option<Relationship>> {
        Ok(self.relationships().get_relationship(id)?)
    }

    /// Deletes a relationship from whichever table holds it.
    pub fn delete_relationship(&self, id: RelationshipId) -> ServiceResult<()> {
        self.ctx.write("relationship_delete", |conn, events| {
            SqliteRelationshipRepository::new(conn).delete_relationship(id)?;
            events.push(DomainEvent::new(
                EntityKind::Relationship,
                id,
                ChangeAction::Deleted,
            ));
            Ok(())
        })
    }

    pub fn list_global_relationships(
        &self,
        object_id: ObjectId,
    ) -> ServiceResult<Vec<GlobalRelationship>> {
        Ok(self.relationships().list_global_for_object(object_id)?)
    }

    pub fn list_model_relationships(
        &self,
        model_id: DataModelId,
    ) -> ServiceResult<Vec<ModelObjectRelationship>> {
        Ok(self.relationships().list_model_relationships(model_id)?)
    }

    /// Advisory level for a relationship between two instances of one model.
    ///
    /// Conceptual models suggest object level. Logical and physical models
    /// suggest attribute level when both instances expose a primary- or
    /// foreign-key flagged attribute, and object level otherwise.
    pub fn suggest_relationship_level(
        &self,
        model_id: DataModelId,
        source_model_object_id: ModelObjectId,
        target_model_object_id: ModelObjectId,
    ) -> ServiceResult<RelationshipLevel> {
        let conn = self.ctx.conn();
        let model = require_model(conn, model_id)?;
        if model.layer == Layer::Conceptual {
            return Ok(RelationshipLevel::Object);
        }
        let source = require_instance_in_model(conn, source_model_object_id, model_id)?;
        let target = require_instance_in_model(conn, target_model_object_id, model_id)?;
        if exposes_key(conn, &source)? && exposes_key(conn, &target)? {
            Ok(RelationshipLevel::Attribute)
        } else {
            Ok(RelationshipLevel::Object)
        }
    }
}

fn require_pins_for_level(
    level: RelationshipLevel,
    source_pin: Option<Uuid>,
    target_pin: Option<Uuid>,
) -> ServiceResult<()> {
    match (level, source_pin.is_some(), target_pin.is_some()) {
        (RelationshipLevel::Attribute, true, true) => Ok(()),
        (RelationshipLevel::Attribute, _, _) => Err(ServiceError::validation(
            "attribute-level relationships need both source and target attributes",
        )),
        (RelationshipLevel::Object, false, false) => Ok(()),
        (RelationshipLevel::Object, _, _) => Err(ServiceError::validation(
            "object-level relationships cannot pin attributes",
        )),
    }
}

fn validate_global(
    conn: &Connection,
    level: RelationshipLevel,
    source: (ObjectId, Option<AttributeId>),
    target: (ObjectId, Option<AttributeId>),
) -> ServiceResult<()> {
    let objects = SqliteObjectRepository::new(conn);
    for (object_id, _) in [source, target] {
        objects
            .get_object(object_id)?
            .ok_or(ServiceError::not_found(EntityKind::Object, object_id))?;
    }
    require_pins_for_level(level, source.1, target.1)?;

    let attributes = SqliteAttributeRepository::new(conn);
    for (object_id, pin) in [source, target] {
        let Some(attribute_id) = pin else { continue };
        let attribute = attributes
            .get_attribute(attribute_id)?
            .ok_or(ServiceError::not_found(EntityKind::Attribute, attribute_id))?;
        if attribute.object_id != object_id {
            return Err(ServiceError::validation(format!(
                "attribute {attribute_id} does not belong to object {object_id}"
            )));
        }
    }
    Ok(())
}

/// Returns the model's layer once every endpoint checks out.
fn validate_model_specific(
    conn: &Connection,
    model_id: DataModelId,
    level: RelationshipLevel,
    source: (ModelObjectId, Option<ModelAttributeId>),
    target: (ModelObjectId, Option<ModelAttributeId>),
) -> ServiceResult<Layer> {
    let model = require_model(conn, model_id)?;
    for (model_object_id, _) in [source, target] {
        require_instance_in_model(conn, model_object_id, model_id)?;
    }
    require_pins_for_level(level, source.1, target.1)?;

    let attributes = SqliteAttributeRepository::new(conn);
    for (model_object_id, pin) in [source, target] {
        let Some(binding_id) = pin else { continue };
        let binding = attributes
            .get_model_attribute(binding_id)?
            .ok_or(ServiceError::not_found(EntityKind::ModelAttribute, binding_id))?;
        if binding.model_object_id != model_object_id {
            return Err(ServiceError::validation(format!(
                "model attribute {binding_id} does not belong to model object {model_object_id}"
            )));
        }
    }
    Ok(model.layer)
}

fn require_instance_in_model(
    conn: &Connection,
    model_object_id: ModelObjectId,
    model_id: DataModelId,
) -> ServiceResult<DataModelObject> {
    let instance = SqliteObjectRepository::new(conn)
        .get_model_object(model_object_id)?
        .ok_or(ServiceError::not_found(EntityKind::ModelObject, model_object_id))?;
    if instance.model_id != model_id {
        return Err(ServiceError::validation(format!(
            "model object {model_object_id} belongs to model {}, not {model_id}",
            instance.model_id
        )));
    }
    Ok(instance)
}

/// Whether the instance has a key-flagged binding, falling back to the
/// canonical flags for bindings that inherit them.
fn exposes_key(conn: &Connection, instance: &DataModelObject) -> ServiceResult<bool> {
    let attributes = SqliteAttributeRepository::new(conn);
    for binding in attributes.list_model_attributes_for_model_object(instance.id)? {
        let primary = match binding.is_primary_key {
            Some(flag) => flag,
            None => attributes
                .get_attribute(binding.attribute_id)?
                .is_some_and(|attribute| attribute.is_primary_key),
        };
        let foreign = match binding.is_foreign_key {
            Some(flag) => flag,
            None => attributes
                .get_attribute(binding.attribute_id)?
                .is_some_and(|attribute| attribute.is_foreign_key),
        };
        if primary || foreign {
            return Ok(true);
        }
    }
    Ok(false)
}
