//! Canonical object and model-instance use-cases.
//!
//! # Responsibility
//! - Create canonical objects together with their instance in the defining
//!   model.
//! - Bind objects into further models and maintain layer-local state.
//! - Delete objects and instances with their dependents in dependency order.
//!
//! # Invariants
//! - Dependents are removed before the rows they reference: relationships,
//!   then model attributes, then instances, then attributes, then the object.
//! - Properties of every removed entity are removed with it.

use crate::cascade::LayerTypes;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{ChangeAction, DomainEvent};
use crate::model::attribute::{Attribute, NewModelAttribute};
use crate::model::data_model::DataModel;
use crate::model::object::{
    DataModelObject, DataObject, InstancePlacement, ModelObjectPatch, NewDataObject, ObjectPatch,
};
use crate::model::property::EntityRef;
use crate::model::{DataModelId, EntityKind, ModelObjectId, ObjectId};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::model_repo::{ModelRepository, SqliteModelRepository};
use crate::repo::object_repo::{ObjectRepository, ObjectScope, SqliteObjectRepository};
use crate::repo::property_repo::{PropertyRepository, SqlitePropertyRepository};
use crate::repo::relationship_repo::{RelationshipRepository, SqliteRelationshipRepository};
use crate::service::{require_name, require_registry_refs, ServiceContext};
use log::info;
use rusqlite::Connection;
use serde::Serialize;

/// Canonical object with its instance in the defining model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedObject {
    pub object: DataObject,
    pub instance: DataModelObject,
}

pub struct ObjectService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> ObjectService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    fn objects(&self) -> SqliteObjectRepository<'conn> {
        SqliteObjectRepository::new(self.ctx.conn())
    }

    /// Creates a canonical object and binds it into `input.model_id`.
    ///
    /// # Errors
    /// - `ValidationFailed` when the name is blank.
    /// - `NotFound` when the model or a registry reference is missing.
    pub fn create_object(&self, input: &NewDataObject) -> ServiceResult<CreatedObject> {
        require_name(&input.name, "object name")?;
        self.ctx.write("object_create", |conn, events| {
            require_registry_refs(
                conn,
                input.domain_id,
                input.data_area_id,
                &[input.source_system_id, input.target_system_id],
            )?;
            let model = require_model(conn, input.model_id)?;
            let object = SqliteObjectRepository::new(conn).create_object(input)?;
            events.push(
                DomainEvent::new(EntityKind::Object, object.id, ChangeAction::Created)
                    .in_layer(model.layer),
            );
            let (instance, _) = bind_into_model(
                conn,
                &object,
                &model,
                &InstancePlacement::carried_from(&object),
                &[],
                events,
            )?;
            Ok(CreatedObject { object, instance })
        })
    }

    pub fn get_object(&self, id: ObjectId) -> ServiceResult<Option<DataObject>> {
        Ok(self.objects().get_object(id)?)
    }

    pub fn list_objects(&self, scope: &ObjectScope) -> ServiceResult<Vec<DataObject>> {
        Ok(self.objects().list_objects(scope)?)
    }

    pub fn update_object(&self, id: ObjectId, patch: &ObjectPatch) -> ServiceResult<DataObject> {
        if let Some(name) = &patch.name {
            require_name(name, "object name")?;
        }
        self.ctx.write("object_update", |conn, events| {
            let repo = SqliteObjectRepository::new(conn);
            let mut object = repo
                .get_object(id)?
                .ok_or(ServiceError::not_found(EntityKind::Object, id))?;
            apply_object_patch(&mut object, patch);
            require_registry_refs(
                conn,
                object.domain_id,
                object.data_area_id,
                &[object.source_system_id, object.target_system_id],
            )?;
            repo.update_object(&object)?;
            events.push(DomainEvent::new(
                EntityKind::Object,
                id,
                ChangeAction::Updated,
            ));
            repo.get_object(id)?
                .ok_or(ServiceError::not_found(EntityKind::Object, id))
        })
    }

    /// Deletes an object, its instances, attributes, relationships and
    /// properties in one transaction.
    pub fn delete_object(&self, id: ObjectId) -> ServiceResult<()> {
        self.ctx
            .write("object_delete", |conn, events| delete_object_cascade(conn, id, events))
    }

    /// Binds an existing object into another model, creating one model
    /// attribute per canonical attribute.
    ///
    /// # Errors
    /// - `ValidationFailed` when the object already has an instance there.
    pub fn add_object_to_model(
        &self,
        object_id: ObjectId,
        model_id: DataModelId,
        placement: &InstancePlacement,
    ) -> ServiceResult<DataModelObject> {
        self.ctx.write("model_object_create", |conn, events| {
            let object = SqliteObjectRepository::new(conn)
                .get_object(object_id)?
                .ok_or(ServiceError::not_found(EntityKind::Object, object_id))?;
            let model = require_model(conn, model_id)?;
            require_registry_refs(conn, None, None, &[placement.target_system_id])?;
            let attributes = SqliteAttributeRepository::new(conn).list_attributes(object_id)?;
            let bindings = attributes
                .iter()
                .map(|attribute| (attribute, canonical_types(attribute)))
                .collect::<Vec<_>>();
            let (instance, _) =
                bind_into_model(conn, &object, &model, placement, &bindings, events)?;
            Ok(instance)
        })
    }

    pub fn get_model_object(&self, id: ModelObjectId) -> ServiceResult<Option<DataModelObject>> {
        Ok(self.objects().get_model_object(id)?)
    }

    pub fn list_model_objects_in_model(
        &self,
        model_id: DataModelId,
    ) -> ServiceResult<Vec<DataModelObject>> {
        Ok(self.objects().list_model_objects_in_model(model_id)?)
    }

    pub fn list_model_objects_for_object(
        &self,
        object_id: ObjectId,
    ) -> ServiceResult<Vec<DataModelObject>> {
        Ok(self.objects().list_model_objects_for_object(object_id)?)
    }

    /// Updates position, metadata, visibility or layer config of one instance.
    pub fn update_model_object(
        &self,
        id: ModelObjectId,
        patch: &ModelObjectPatch,
    ) -> ServiceResult<DataModelObject> {
        self.ctx.write("model_object_update", |conn, events| {
            let repo = SqliteObjectRepository::new(conn);
            let mut instance = repo
                .get_model_object(id)?
                .ok_or(ServiceError::not_found(EntityKind::ModelObject, id))?;
            require_registry_refs(conn, None, None, &[patch.target_system_id])?;
            if let Some(system_id) = patch.target_system_id {
                instance.target_system_id = Some(system_id);
            }
            if let Some(position) = patch.position {
                instance.position = Some(position);
            }
            if let Some(metadata) = &patch.metadata {
                instance.metadata = Some(metadata.clone());
            }
            if let Some(is_visible) = patch.is_visible {
                instance.is_visible = is_visible;
            }
            if let Some(config) = &patch.layer_specific_config {
                instance.layer_specific_config = Some(config.clone());
            }
            repo.update_model_object(&instance)?;
            let model = require_model(conn, instance.model_id)?;
            events.push(
                DomainEvent::new(EntityKind::ModelObject, id, ChangeAction::Updated)
                    .in_layer(model.layer),
            );
            repo.get_model_object(id)?
                .ok_or(ServiceError::not_found(EntityKind::ModelObject, id))
        })
    }

    /// Removes one instance with its model attributes and model-specific
    /// relationships; the canonical object stays.
    pub fn delete_model_object(&self, id: ModelObjectId) -> ServiceResult<()> {
        self.ctx.write("model_object_delete", |conn, events| {
            let instance = SqliteObjectRepository::new(conn)
                .get_model_object(id)?
                .ok_or(ServiceError::not_found(EntityKind::ModelObject, id))?;
            delete_model_object_cascade(conn, &instance, events)
        })
    }
}

fn apply_object_patch(object: &mut DataObject, patch: &ObjectPatch) {
    if let Some(name) = &patch.name {
        object.name = name.trim().to_string();
    }
    if let Some(description) = &patch.description {
        object.description = Some(description.clone());
    }
    if let Some(object_type) = &patch.object_type {
        object.object_type = Some(object_type.clone());
    }
    if let Some(domain_id) = patch.domain_id {
        object.domain_id = Some(domain_id);
    }
    if let Some(data_area_id) = patch.data_area_id {
        object.data_area_id = Some(data_area_id);
    }
    if let Some(system_id) = patch.source_system_id {
        object.source_system_id = Some(system_id);
    }
    if let Some(system_id) = patch.target_system_id {
        object.target_system_id = Some(system_id);
    }
    if let Some(position) = patch.position {
        object.position = Some(position);
    }
    if let Some(metadata) = &patch.metadata {
        object.metadata = Some(metadata.clone());
    }
}

fn canonical_types(attribute: &Attribute) -> LayerTypes {
    LayerTypes {
        conceptual: attribute.conceptual_type.clone(),
        logical: attribute.logical_type.clone(),
        physical: attribute.physical_type.clone(),
        length: attribute.length,
    }
}

pub(crate) fn require_model(conn: &Connection, id: DataModelId) -> ServiceResult<DataModel> {
    SqliteModelRepository::new(conn)
        .get_model(id)?
        .ok_or(ServiceError::not_found(EntityKind::Model, id))
}

/// Creates the instance of `object` in `model` and one model attribute per
/// `(attribute, types)` pair. Returns the instance and the number of model
/// attributes created.
pub(crate) fn bind_into_model(
    conn: &Connection,
    object: &DataObject,
    model: &DataModel,
    placement: &InstancePlacement,
    bindings: &[(&Attribute, LayerTypes)],
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<(DataModelObject, usize)> {
    let instance =
        SqliteObjectRepository::new(conn).create_model_object(object.id, model.id, placement)?;
    events.push(
        DomainEvent::new(EntityKind::ModelObject, instance.id, ChangeAction::Created)
            .in_layer(model.layer),
    );

    let attributes = SqliteAttributeRepository::new(conn);
    for (attribute, types) in bindings {
        attributes.create_model_attribute(&typed_binding(attribute, types, &instance))?;
    }
    Ok((instance, bindings.len()))
}

/// Binding of `attribute` under `instance` carrying `types` instead of the
/// canonical type fields.
pub(crate) fn typed_binding(
    attribute: &Attribute,
    types: &LayerTypes,
    instance: &DataModelObject,
) -> NewModelAttribute {
    NewModelAttribute {
        conceptual_type: types.conceptual.clone(),
        logical_type: types.logical.clone(),
        physical_type: types.physical.clone(),
        length: types.length,
        ..NewModelAttribute::mirroring(attribute, instance.id, instance.model_id)
    }
}

/// Deletes one instance and everything that hangs off it.
pub(crate) fn delete_model_object_cascade(
    conn: &Connection,
    instance: &DataModelObject,
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<()> {
    let relationships = SqliteRelationshipRepository::new(conn);
    let attributes = SqliteAttributeRepository::new(conn);
    let properties = SqlitePropertyRepository::new(conn);
    let layer = SqliteModelRepository::new(conn)
        .get_model(instance.model_id)?
        .map(|model| model.layer);

    let mut removed_relationships = relationships.delete_model_for_model_object(instance.id)?;
    let bindings = attributes.list_model_attributes_for_model_object(instance.id)?;
    for binding in &bindings {
        removed_relationships += relationships.delete_model_for_model_attribute(binding.id)?;
        properties.delete_for_entity(EntityRef::ModelAttribute(binding.id))?;
        attributes.delete_model_attribute(binding.id)?;
    }
    properties.delete_for_entity(EntityRef::ModelObject(instance.id))?;
    SqliteObjectRepository::new(conn).delete_model_object(instance.id)?;

    info!(
        "event=model_object_delete module=service status=ok model_attributes={} relationships={}",
        bindings.len(),
        removed_relationships
    );
    let mut event = DomainEvent::new(EntityKind::ModelObject, instance.id, ChangeAction::Deleted);
    event.layer = layer;
    events.push(event);
    Ok(())
}

/// Deletes one canonical object and everything that references it.
pub(crate) fn delete_object_cascade(
    conn: &Connection,
    object_id: ObjectId,
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<()> {
    let objects = SqliteObjectRepository::new(conn);
    let attributes = SqliteAttributeRepository::new(conn);
    let relationships = SqliteRelationshipRepository::new(conn);
    let properties = SqlitePropertyRepository::new(conn);

    objects
        .get_object(object_id)?
        .ok_or(ServiceError::not_found(EntityKind::Object, object_id))?;

    let removed_relationships = relationships.delete_global_for_object(object_id)?;
    let instances = objects.list_model_objects_for_object(object_id)?;
    for instance in &instances {
        delete_model_object_cascade(conn, instance, events)?;
    }

    let canonical = attributes.list_attributes(object_id)?;
    for attribute in &canonical {
        delete_attribute_rows(conn, attribute, events)?;
    }

    properties.delete_for_entity(EntityRef::Object(object_id))?;
    objects.delete_object(object_id)?;

    info!(
        "event=object_delete module=service status=ok instances={} attributes={} relationships={}",
        instances.len(),
        canonical.len(),
        removed_relationships
    );
    events.push(DomainEvent::new(
        EntityKind::Object,
        object_id,
        ChangeAction::Deleted,
    ));
    Ok(())
}

/// Deletes one canonical attribute with its bindings, the relationships
/// pinned to it or its bindings, and their properties.
pub(crate) fn delete_attribute_rows(
    conn: &Connection,
    attribute: &Attribute,
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<()> {
    let attributes = SqliteAttributeRepository::new(conn);
    let relationships = SqliteRelationshipRepository::new(conn);
    let properties = SqlitePropertyRepository::new(conn);

    relationships.delete_global_for_attribute(attribute.id)?;
    for binding in attributes.list_model_attributes_for_attribute(attribute.id)? {
        relationships.delete_model_for_model_attribute(binding.id)?;
        properties.delete_for_entity(EntityRef::ModelAttribute(binding.id))?;
        attributes.delete_model_attribute(binding.id)?;
    }
    properties.delete_for_entity(EntityRef::Attribute(attribute.id))?;
    attributes.delete_attribute(attribute.id)?;
    events.push(DomainEvent::new(
        EntityKind::Attribute,
        attribute.id,
        ChangeAction::Deleted,
    ));
    Ok(())
}
