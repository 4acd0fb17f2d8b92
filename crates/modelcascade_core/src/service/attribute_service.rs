//! Attribute use-cases and the logical-to-physical cascade.
//!
//! # Responsibility
//! - Create attributes with derived downstream types and bind them into
//!   every existing instance of their object.
//! - Apply patches and propagate logical type edits to the physical sibling.
//! - Enhance single attributes or whole objects one layer at a time.
//!
//! # Invariants
//! - The patch to the canonical attribute commits on its own merits; the
//!   physical cascade runs inside a savepoint and can never fail the update.
//! - A logical type edit on a logical-layer object re-derives the canonical
//!   physical type (unless the patch sets one) and rewrites the binding in
//!   the defining model, so both stay monotonic with the new logical type.
//! - An unresolved cascade is logged at warn level and returned as a value.
//! - Sibling lookup is structural first (family root + layer, then the same
//!   canonical ids) and falls back to name matching only when that fails.
//! - Bulk enhancement runs one transaction per attribute; one failure never
//!   aborts the rest.

use crate::cascade::{derive_layer_type, fill_missing_types, LayerTypes};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{ChangeAction, DomainEvent};
use crate::model::attribute::{
    Attribute, AttributePatch, DataModelAttribute, NewAttribute, NewModelAttribute,
};
use crate::model::data_model::DataModel;
use crate::model::layer::Layer;
use crate::model::object::DataObject;
use crate::model::{AttributeId, EntityKind, ModelAttributeId, ObjectId};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::model_repo::{ModelRepository, SqliteModelRepository};
use crate::repo::object_repo::{ObjectRepository, SqliteObjectRepository};
use crate::service::object_service::{delete_attribute_rows, require_model};
use crate::service::{require_name, ServiceContext};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;

static LOGICAL_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)logical").expect("valid logical name regex"));

const CASCADE_SAVEPOINT: &str = "attribute_cascade";

/// Result of propagating a logical type edit to the physical layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CascadeOutcome {
    /// The update did not touch a logical type of a logical-layer object.
    NotApplicable,
    #[serde(rename_all = "camelCase")]
    Propagated {
        model_attribute_id: ModelAttributeId,
        physical_type: String,
        length: Option<i64>,
    },
    Unresolved { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedAttribute {
    pub attribute: Attribute,
    pub cascade: CascadeOutcome,
}

#[derive(Debug)]
pub struct EnhanceResult {
    pub attribute_id: AttributeId,
    pub outcome: ServiceResult<Attribute>,
}

/// Per-attribute outcome of a bulk enhancement.
#[derive(Debug)]
pub struct BulkEnhanceReport {
    pub object_id: ObjectId,
    pub target_layer: Layer,
    pub results: Vec<EnhanceResult>,
}

impl BulkEnhanceReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &Attribute> {
        self.results
            .iter()
            .filter_map(|result| result.outcome.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (AttributeId, &ServiceError)> {
        self.results.iter().filter_map(|result| {
            result
                .outcome
                .as_ref()
                .err()
                .map(|err| (result.attribute_id, err))
        })
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

pub struct AttributeService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> AttributeService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    fn attributes(&self) -> SqliteAttributeRepository<'conn> {
        SqliteAttributeRepository::new(self.ctx.conn())
    }

    /// Creates an attribute, deriving missing logical/physical types, and
    /// binds it into every instance of its object.
    ///
    /// # Errors
    /// - `ValidationFailed` when the name is blank.
    /// - `NotFound` when the owning object is missing.
    pub fn create_attribute(&self, input: &NewAttribute) -> ServiceResult<Attribute> {
        require_name(&input.name, "attribute name")?;
        self.ctx.write("attribute_create", |conn, events| {
            let objects = SqliteObjectRepository::new(conn);
            objects
                .get_object(input.object_id)?
                .ok_or(ServiceError::not_found(EntityKind::Object, input.object_id))?;

            let mut types = LayerTypes {
                conceptual: non_blank(&input.conceptual_type),
                logical: non_blank(&input.logical_type),
                physical: non_blank(&input.physical_type),
                length: input.length,
            };
            fill_missing_types(&mut types);
            let resolved = NewAttribute {
                conceptual_type: types.conceptual,
                logical_type: types.logical,
                physical_type: types.physical,
                length: types.length,
                ..input.clone()
            };

            let repo = SqliteAttributeRepository::new(conn);
            let attribute = repo.create_attribute(&resolved)?;
            events.push(DomainEvent::new(
                EntityKind::Attribute,
                attribute.id,
                ChangeAction::Created,
            ));

            for instance in objects.list_model_objects_for_object(attribute.object_id)? {
                let binding = repo.create_model_attribute(&NewModelAttribute::mirroring(
                    &attribute,
                    instance.id,
                    instance.model_id,
                ))?;
                let layer = require_model(conn, instance.model_id)?.layer;
                events.push(
                    DomainEvent::new(
                        EntityKind::ModelAttribute,
                        binding.id,
                        ChangeAction::Created,
                    )
                    .in_layer(layer),
                );
            }
            Ok(attribute)
        })
    }

    pub fn get_attribute(&self, id: AttributeId) -> ServiceResult<Option<Attribute>> {
        Ok(self.attributes().get_attribute(id)?)
    }

    pub fn list_attributes(&self, object_id: ObjectId) -> ServiceResult<Vec<Attribute>> {
        Ok(self.attributes().list_attributes(object_id)?)
    }

    pub fn list_model_attributes(
        &self,
        attribute_id: AttributeId,
    ) -> ServiceResult<Vec<DataModelAttribute>> {
        Ok(self
            .attributes()
            .list_model_attributes_for_attribute(attribute_id)?)
    }

    /// Applies `patch` and, for logical-layer objects whose logical type
    /// changed, rewrites the physical sibling's type and length.
    ///
    /// # Errors
    /// - `NotFound` when the attribute is missing.
    /// - `ValidationFailed` when the patch blanks the name.
    ///
    /// Cascade problems never surface here; see [`CascadeOutcome`].
    pub fn update_attribute(
        &self,
        id: AttributeId,
        patch: &AttributePatch,
    ) -> ServiceResult<UpdatedAttribute> {
        if let Some(name) = &patch.name {
            require_name(name, "attribute name")?;
        }
        self.ctx.write("attribute_update", |conn, events| {
            let repo = SqliteAttributeRepository::new(conn);
            let mut attribute = repo
                .get_attribute(id)?
                .ok_or(ServiceError::not_found(EntityKind::Attribute, id))?;
            patch.apply_to(&mut attribute);
            attribute.name = attribute.name.trim().to_string();

            let owner = match patch.logical_type {
                Some(_) => logical_owner(conn, &attribute)?,
                None => None,
            };
            if owner.is_some() && patch.physical_type.is_none() {
                if let Some(derived) =
                    derive_layer_type(attribute.logical_type.as_deref(), Layer::Physical)
                {
                    attribute.physical_type = Some(derived.type_name);
                    attribute.length = patch.length.or(derived.length);
                }
            }
            repo.update_attribute(&attribute)?;
            events.push(DomainEvent::new(
                EntityKind::Attribute,
                id,
                ChangeAction::Updated,
            ));
            let attribute = repo
                .get_attribute(id)?
                .ok_or(ServiceError::not_found(EntityKind::Attribute, id))?;

            let cascade = match owner {
                Some((object, model)) => {
                    sync_defining_binding(conn, &object, &model, &attribute, events)?;
                    cascade_from_logical(conn, &object, &model, &attribute, events)?
                }
                None => CascadeOutcome::NotApplicable,
            };
            Ok(UpdatedAttribute { attribute, cascade })
        })
    }

    /// Deletes an attribute with its bindings, pinned relationships and
    /// properties.
    pub fn delete_attribute(&self, id: AttributeId) -> ServiceResult<()> {
        self.ctx.write("attribute_delete", |conn, events| {
            let attribute = SqliteAttributeRepository::new(conn)
                .get_attribute(id)?
                .ok_or(ServiceError::not_found(EntityKind::Attribute, id))?;
            delete_attribute_rows(conn, &attribute, events)
        })
    }

    /// Derives the `target_layer` type from the layer above it and stores it
    /// with its default length.
    ///
    /// Targeting the conceptual layer, or an attribute without the upstream
    /// type, returns the attribute unchanged.
    pub fn enhance_attribute(
        &self,
        id: AttributeId,
        target_layer: Layer,
    ) -> ServiceResult<Attribute> {
        self.ctx.write("attribute_enhance", |conn, events| {
            let repo = SqliteAttributeRepository::new(conn);
            let mut attribute = repo
                .get_attribute(id)?
                .ok_or(ServiceError::not_found(EntityKind::Attribute, id))?;

            let Some(upstream) = target_layer.upstream() else {
                return Ok(attribute);
            };
            let Some(derived) = derive_layer_type(attribute.type_for(upstream), target_layer)
            else {
                return Ok(attribute);
            };

            let unchanged = attribute.type_for(target_layer) == Some(derived.type_name.as_str())
                && attribute.length == derived.length;
            if unchanged {
                return Ok(attribute);
            }

            match target_layer {
                Layer::Logical => attribute.logical_type = Some(derived.type_name),
                Layer::Physical => attribute.physical_type = Some(derived.type_name),
                Layer::Conceptual => return Ok(attribute),
            }
            attribute.length = derived.length;
            repo.update_attribute(&attribute)?;
            events.push(
                DomainEvent::new(EntityKind::Attribute, id, ChangeAction::Updated)
                    .in_layer(target_layer),
            );
            repo.get_attribute(id)?
                .ok_or(ServiceError::not_found(EntityKind::Attribute, id))
        })
    }

    /// Enhances every attribute of an object independently.
    ///
    /// # Errors
    /// - `NotFound` when the object is missing. Per-attribute failures are
    ///   reported inside the returned report instead.
    pub fn bulk_enhance_attributes(
        &self,
        object_id: ObjectId,
        target_layer: Layer,
    ) -> ServiceResult<BulkEnhanceReport> {
        SqliteObjectRepository::new(self.ctx.conn())
            .get_object(object_id)?
            .ok_or(ServiceError::not_found(EntityKind::Object, object_id))?;

        let attributes = self.attributes().list_attributes(object_id)?;
        let results = attributes
            .iter()
            .map(|attribute| EnhanceResult {
                attribute_id: attribute.id,
                outcome: self.enhance_attribute(attribute.id, target_layer),
            })
            .collect::<Vec<_>>();
        let report = BulkEnhanceReport {
            object_id,
            target_layer,
            results,
        };

        let failed = report.failed().count();
        if failed > 0 {
            warn!(
                "event=attribute_bulk_enhance module=service status=partial total={} failed={} layer={}",
                report.results.len(),
                failed,
                target_layer
            );
        } else {
            info!(
                "event=attribute_bulk_enhance module=service status=ok total={} layer={}",
                report.results.len(),
                target_layer
            );
        }
        Ok(report)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Owning object and its defining model when that model is logical.
fn logical_owner(
    conn: &Connection,
    attribute: &Attribute,
) -> ServiceResult<Option<(DataObject, DataModel)>> {
    let object = SqliteObjectRepository::new(conn)
        .get_object(attribute.object_id)?
        .ok_or(ServiceError::not_found(EntityKind::Object, attribute.object_id))?;
    let model = require_model(conn, object.model_id)?;
    Ok((model.layer == Layer::Logical).then_some((object, model)))
}

/// Mirrors the canonical types onto the binding in the defining model.
fn sync_defining_binding(
    conn: &Connection,
    object: &DataObject,
    model: &DataModel,
    attribute: &Attribute,
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<()> {
    let objects = SqliteObjectRepository::new(conn);
    let Some(instance) = objects.find_model_object(object.id, model.id)? else {
        return Ok(());
    };
    let attributes = SqliteAttributeRepository::new(conn);
    let Some(binding) = attributes.find_model_attribute(attribute.id, instance.id)? else {
        return Ok(());
    };
    attributes.set_model_attribute_types(
        binding.id,
        &LayerTypes {
            conceptual: attribute.conceptual_type.clone(),
            logical: attribute.logical_type.clone(),
            physical: attribute.physical_type.clone(),
            length: attribute.length,
        },
    )?;
    events.push(
        DomainEvent::new(EntityKind::ModelAttribute, binding.id, ChangeAction::Updated)
            .in_layer(model.layer),
    );
    Ok(())
}

/// Runs the physical cascade for an attribute whose logical type was patched.
///
/// Storage errors inside the cascade roll back to the savepoint and become an
/// `Unresolved` outcome.
fn cascade_from_logical(
    conn: &Connection,
    object: &DataObject,
    model: &DataModel,
    attribute: &Attribute,
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<CascadeOutcome> {
    conn.execute_batch(&format!("SAVEPOINT {CASCADE_SAVEPOINT};"))?;
    let mut cascade_events = Vec::new();
    let outcome = match propagate_to_physical(conn, object, model, attribute, &mut cascade_events)
    {
        Ok(outcome) => {
            conn.execute_batch(&format!("RELEASE {CASCADE_SAVEPOINT};"))?;
            events.append(&mut cascade_events);
            outcome
        }
        Err(err) => {
            conn.execute_batch(&format!(
                "ROLLBACK TO {CASCADE_SAVEPOINT}; RELEASE {CASCADE_SAVEPOINT};"
            ))?;
            CascadeOutcome::Unresolved {
                reason: format!("cascade write failed: {err}"),
            }
        }
    };

    match &outcome {
        CascadeOutcome::Unresolved { reason } => warn!(
            "event=attribute_cascade module=service status=unresolved attribute_id={} reason={}",
            attribute.id, reason
        ),
        CascadeOutcome::Propagated {
            model_attribute_id, ..
        } => info!(
            "event=attribute_cascade module=service status=ok attribute_id={} model_attribute_id={}",
            attribute.id, model_attribute_id
        ),
        CascadeOutcome::NotApplicable => {}
    }
    Ok(outcome)
}

fn propagate_to_physical(
    conn: &Connection,
    object: &DataObject,
    logical_model: &DataModel,
    attribute: &Attribute,
    events: &mut Vec<DomainEvent>,
) -> ServiceResult<CascadeOutcome> {
    let unresolved = |reason: &str| -> ServiceResult<CascadeOutcome> {
        Ok(CascadeOutcome::Unresolved {
            reason: reason.to_string(),
        })
    };

    let Some(derived) = derive_layer_type(attribute.logical_type.as_deref(), Layer::Physical)
    else {
        return unresolved("logical type is blank");
    };
    let Some(physical_model) = resolve_physical_sibling(conn, logical_model)? else {
        return unresolved("no physical sibling model");
    };

    let objects = SqliteObjectRepository::new(conn);
    let instance = match objects.find_model_object(object.id, physical_model.id)? {
        Some(instance) => Some(instance),
        None => objects.find_model_object_by_object_name(physical_model.id, &object.name)?,
    };
    let Some(instance) = instance else {
        return unresolved("no physical instance of the owning object");
    };

    let attributes = SqliteAttributeRepository::new(conn);
    let binding = match attributes.find_model_attribute(attribute.id, instance.id)? {
        Some(binding) => Some(binding),
        None => attributes.find_model_attribute_by_name(instance.id, &attribute.name)?,
    };
    let Some(binding) = binding else {
        return unresolved("no physical attribute binding");
    };

    attributes.set_model_attribute_types(
        binding.id,
        &LayerTypes {
            conceptual: binding.conceptual_type.clone(),
            logical: attribute.logical_type.clone(),
            physical: Some(derived.type_name.clone()),
            length: derived.length,
        },
    )?;
    events.push(
        DomainEvent::new(
            EntityKind::ModelAttribute,
            binding.id,
            ChangeAction::Updated,
        )
        .in_layer(Layer::Physical),
    );
    Ok(CascadeOutcome::Propagated {
        model_attribute_id: binding.id,
        physical_type: derived.type_name,
        length: derived.length,
    })
}

/// Physical member of the logical model's family, or a physical model named
/// like the logical one with "logical" replaced by "physical".
fn resolve_physical_sibling(
    conn: &Connection,
    logical_model: &DataModel,
) -> ServiceResult<Option<DataModel>> {
    let models = SqliteModelRepository::new(conn);
    if let Some(root_id) = logical_model.parent_model_id {
        if let Some(sibling) = models.find_family_member(root_id, Layer::Physical)? {
            return Ok(Some(sibling));
        }
    }

    if !LOGICAL_WORD_RE.is_match(&logical_model.name) {
        return Ok(None);
    }
    let physical_name = LOGICAL_WORD_RE.replace_all(&logical_model.name, "physical");
    Ok(models
        .find_by_name(&physical_name, Layer::Physical)?
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::{BulkEnhanceReport, EnhanceResult, LOGICAL_WORD_RE};
    use crate::error::ServiceError;
    use crate::model::layer::Layer;
    use uuid::Uuid;

    #[test]
    fn logical_word_is_replaced_case_insensitively() {
        assert_eq!(
            LOGICAL_WORD_RE.replace_all("Sales (Logical)", "physical"),
            "Sales (physical)"
        );
    }

    #[test]
    fn report_splits_successes_and_failures() {
        let failing = Uuid::new_v4();
        let report = BulkEnhanceReport {
            object_id: Uuid::new_v4(),
            target_layer: Layer::Physical,
            results: vec![EnhanceResult {
                attribute_id: failing,
                outcome: Err(ServiceError::validation("boom")),
            }],
        };
        assert_eq!(report.succeeded().count(), 0);
        assert_eq!(report.failed().map(|(id, _)| id).collect::<Vec<_>>(), vec![failing]);
        assert!(!report.is_complete_success());
    }
}
