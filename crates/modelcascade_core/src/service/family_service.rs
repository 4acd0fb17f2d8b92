//! Model family builder.
//!
//! # Responsibility
//! - Create a conceptual/logical/physical model triple in one transaction.
//! - Bind selected canonical objects into all three layers with cascaded
//!   attribute types.
//!
//! # Invariants
//! - Either every model, instance and model attribute of the family commits,
//!   or none does.
//! - Logical and physical members point at the conceptual root through
//!   `parent_model_id`.
//! - Canonical objects are reused, never copied. A selected object is
//!   rebound to the family's conceptual model; when it was defined in a
//!   standalone model its instance there moves into the conceptual model, so
//!   it ends up with exactly one instance per family layer.
//! - Model attributes created here carry the strict cascade:
//!   `logical = conceptual_to_logical(conceptual)` and
//!   `physical = logical_to_physical(logical)`.

use crate::cascade::{cascade_types, LayerTypes};
use crate::error::ServiceResult;
use crate::events::{ChangeAction, DomainEvent};
use crate::model::attribute::Attribute;
use crate::model::data_model::{DataModel, NewDataModel};
use crate::model::layer::Layer;
use crate::model::object::{DataModelObject, DataObject, InstancePlacement};
use crate::model::{DataAreaId, DomainId, EntityKind, ObjectId, SystemId};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::model_repo::{ModelRepository, SqliteModelRepository};
use crate::repo::object_repo::{ObjectRepository, SqliteObjectRepository};
use crate::repo::relationship_repo::{RelationshipRepository, SqliteRelationshipRepository};
use crate::service::object_service::{bind_into_model, typed_binding};
use crate::service::{require_name, require_registry_refs, ServiceContext};
use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Input for [`FamilyService::create_family`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilySeed {
    pub name: String,
    pub target_system_id: SystemId,
    pub domain_id: DomainId,
    pub data_area_id: DataAreaId,
    /// Objects to bind; entries outside the seed's domain, area and target
    /// system are skipped. `None` builds an empty family.
    pub selected_object_ids: Option<Vec<ObjectId>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyCounts {
    pub models: usize,
    pub objects: usize,
    pub model_objects: usize,
    pub model_attributes: usize,
    pub canonical_attributes_filled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyCreated {
    pub conceptual: DataModel,
    pub logical: DataModel,
    pub physical: DataModel,
    pub created_counts: FamilyCounts,
}

pub struct FamilyService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> FamilyService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    /// Creates a model family and populates it from the selected objects.
    ///
    /// # Errors
    /// - `ValidationFailed` for a blank name.
    /// - `NotFound` when the domain, data area or target system is missing;
    ///   nothing is written in that case.
    /// - `TransactionFailed` when the commit fails; nothing is persisted.
    pub fn create_family(&self, seed: &FamilySeed) -> ServiceResult<FamilyCreated> {
        require_name(&seed.name, "family name")?;
        let created = self.ctx.write("family_create", |conn, events| {
            require_registry_refs(
                conn,
                Some(seed.domain_id),
                Some(seed.data_area_id),
                &[Some(seed.target_system_id)],
            )?;

            let models = SqliteModelRepository::new(conn);
            let conceptual = models.create_model(&family_member(seed, Layer::Conceptual, None))?;
            let logical =
                models.create_model(&family_member(seed, Layer::Logical, Some(&conceptual)))?;
            let physical =
                models.create_model(&family_member(seed, Layer::Physical, Some(&conceptual)))?;
            for model in [&conceptual, &logical, &physical] {
                events.push(
                    DomainEvent::new(EntityKind::Model, model.id, ChangeAction::Created)
                        .in_layer(model.layer),
                );
            }

            let sources = resolve_sources(conn, seed)?;
            let mut counts = FamilyCounts {
                models: 3,
                objects: sources.len(),
                ..FamilyCounts::default()
            };

            let attribute_repo = SqliteAttributeRepository::new(conn);
            for object in &sources {
                let mut attributes = attribute_repo.list_attributes(object.id)?;
                for attribute in &mut attributes {
                    if fill_canonical_types(attribute) {
                        attribute_repo.update_attribute(attribute)?;
                        counts.canonical_attributes_filled += 1;
                    }
                }
                let bindings = attributes
                    .iter()
                    .map(|attribute| (attribute, cascade_types(attribute)))
                    .collect::<Vec<_>>();

                let placement = InstancePlacement {
                    target_system_id: Some(seed.target_system_id),
                    ..InstancePlacement::carried_from(object)
                };
                counts.model_attributes +=
                    adopt_into_root(conn, object, &conceptual, &placement, &bindings, events)?;
                counts.model_objects += 1;
                for model in [&logical, &physical] {
                    let (_, bound) =
                        bind_into_model(conn, object, model, &placement, &bindings, events)?;
                    counts.model_objects += 1;
                    counts.model_attributes += bound;
                }
            }

            Ok(FamilyCreated {
                conceptual,
                logical,
                physical,
                created_counts: counts,
            })
        })?;

        info!(
            "event=family_create module=service status=ok conceptual_id={} objects={} model_objects={} model_attributes={}",
            created.conceptual.id,
            created.created_counts.objects,
            created.created_counts.model_objects,
            created.created_counts.model_attributes
        );
        Ok(created)
    }
}

fn family_member(seed: &FamilySeed, layer: Layer, root: Option<&DataModel>) -> NewDataModel {
    NewDataModel {
        name: match layer {
            Layer::Conceptual => seed.name.trim().to_string(),
            other => format!("{} ({})", seed.name.trim(), other),
        },
        layer,
        parent_model_id: root.map(|model| model.id),
        target_system_id: Some(seed.target_system_id),
        domain_id: Some(seed.domain_id),
        data_area_id: Some(seed.data_area_id),
    }
}

/// Selected objects in the seed's scope, deduplicated, in selection order.
fn resolve_sources(conn: &Connection, seed: &FamilySeed) -> ServiceResult<Vec<DataObject>> {
    let Some(selected) = &seed.selected_object_ids else {
        return Ok(Vec::new());
    };
    let objects = SqliteObjectRepository::new(conn);
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    let mut skipped = 0usize;
    for object_id in selected {
        if !seen.insert(*object_id) {
            continue;
        }
        match objects.get_object(*object_id)? {
            Some(object)
                if object.domain_id == Some(seed.domain_id)
                    && object.data_area_id == Some(seed.data_area_id)
                    && object.target_system_id == Some(seed.target_system_id) =>
            {
                sources.push(object);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        info!(
            "event=family_sources module=service status=filtered selected={} skipped={}",
            seen.len(),
            skipped
        );
    }
    Ok(sources)
}

/// Binds `object` into the family root and makes the root its defining model.
///
/// An instance in a standalone defining model (no parent, no members) moves
/// into the root with its bindings retyped to the strict cascade; the
/// model-specific relationships it had there are dropped. Objects defined
/// inside another family keep that instance and get a fresh one.
/// Returns the number of bindings in the root instance.
fn adopt_into_root(
    conn: &Connection,
    object: &DataObject,
    root: &DataModel,
    placement: &InstancePlacement,
    bindings: &[(&Attribute, LayerTypes)],
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<usize> {
    let objects = SqliteObjectRepository::new(conn);
    let models = SqliteModelRepository::new(conn);
    let movable = match models.get_model(object.model_id)? {
        Some(model) => {
            model.parent_model_id.is_none() && models.list_family(model.id)?.len() == 1
        }
        None => false,
    };
    let staged = if movable {
        objects.find_model_object(object.id, object.model_id)?
    } else {
        None
    };
    objects.set_object_model(object.id, root.id)?;
    events.push(
        DomainEvent::new(EntityKind::Object, object.id, ChangeAction::Updated)
            .in_layer(root.layer),
    );

    let Some(instance) = staged else {
        let (_, bound) = bind_into_model(conn, object, root, placement, bindings, events)?;
        return Ok(bound);
    };

    let dropped =
        SqliteRelationshipRepository::new(conn).delete_model_for_model_object(instance.id)?;
    objects.move_model_object(instance.id, root.id, placement.target_system_id)?;
    let attributes = SqliteAttributeRepository::new(conn);
    attributes.move_model_attributes(instance.id, root.id)?;
    for (attribute, types) in bindings {
        match attributes.find_model_attribute(attribute.id, instance.id)? {
            Some(binding) => attributes.set_model_attribute_types(binding.id, types)?,
            None => {
                let moved = DataModelObject {
                    model_id: root.id,
                    ..instance.clone()
                };
                attributes.create_model_attribute(&typed_binding(attribute, types, &moved))?;
            }
        }
    }
    events.push(
        DomainEvent::new(EntityKind::ModelObject, instance.id, ChangeAction::Updated)
            .in_layer(root.layer),
    );
    info!(
        "event=family_adopt module=service status=ok object_id={} model_object_id={} dropped_relationships={}",
        object.id, instance.id, dropped
    );
    Ok(bindings.len())
}

/// Fills blank logical/physical types on the canonical attribute.
/// Returns whether anything changed.
fn fill_canonical_types(attribute: &mut Attribute) -> bool {
    let derived = cascade_types(attribute);
    let mut changed = false;
    if attribute.logical_type.is_none() && derived.logical.is_some() {
        attribute.logical_type = derived.logical;
        changed = true;
    }
    if attribute.physical_type.is_none() && derived.physical.is_some() {
        attribute.physical_type = derived.physical;
        if attribute.length.is_none() {
            attribute.length = derived.length;
        }
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::{family_member, FamilySeed};
    use crate::model::layer::Layer;
    use uuid::Uuid;

    fn seed() -> FamilySeed {
        FamilySeed {
            name: "  Sales Model ".to_string(),
            target_system_id: Uuid::new_v4(),
            domain_id: Uuid::new_v4(),
            data_area_id: Uuid::new_v4(),
            selected_object_ids: None,
        }
    }

    #[test]
    fn conceptual_member_keeps_seed_name_and_has_no_parent() {
        let member = family_member(&seed(), Layer::Conceptual, None);
        assert_eq!(member.name, "Sales Model");
        assert!(member.parent_model_id.is_none());
    }

    #[test]
    fn child_members_are_suffixed_by_layer() {
        let seed = seed();
        let member = family_member(&seed, Layer::Physical, None);
        assert_eq!(member.name, "Sales Model (physical)");
        assert_eq!(member.target_system_id, Some(seed.target_system_id));
    }
}
