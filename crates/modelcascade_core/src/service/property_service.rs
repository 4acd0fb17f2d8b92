//! Property store use-cases.

use crate::error::{ServiceError, ServiceResult};
use crate::events::{ChangeAction, DomainEvent};
use crate::model::property::{EntityRef, Property, PropertyWrite};
use crate::model::{DataModelId, EntityKind, PropertyId};
use crate::repo::property_repo::{PropertyRepository, SqlitePropertyRepository};
use crate::service::{require_name, ServiceContext};

pub struct PropertyService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> PropertyService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    fn properties(&self) -> SqlitePropertyRepository<'conn> {
        SqlitePropertyRepository::new(self.ctx.conn())
    }

    /// Creates or replaces the property identified by entity, model, name
    /// and layer.
    ///
    /// Name, type and value are stored exactly as given; `property_type` is a
    /// caller tag and is not checked against the value. Blank names or types
    /// and non-finite numbers are rejected.
    pub fn set_property(&self, input: &PropertyWrite) -> ServiceResult<Property> {
        require_name(&input.property_name, "property name")?;
        require_name(&input.property_type, "property type")?;
        if !input.property_value.is_json_safe() {
            return Err(ServiceError::validation(format!(
                "property `{}` has a non-finite number value",
                input.property_name
            )));
        }
        self.ctx.write("property_set", |conn, events| {
            let properties = SqlitePropertyRepository::new(conn);
            let existed = properties
                .list_for_entity(input.entity)?
                .iter()
                .any(|existing| same_key(existing, input));
            let property = properties.upsert_property(input)?;
            let action = if existed {
                ChangeAction::Updated
            } else {
                ChangeAction::Created
            };
            let mut event = DomainEvent::new(EntityKind::Property, property.id, action);
            event.layer = property.layer;
            events.push(event);
            Ok(property)
        })
    }

    pub fn get_property(&self, id: PropertyId) -> ServiceResult<Option<Property>> {
        Ok(self.properties().get_property(id)?)
    }

    /// Every property attached to one entity, across models and layers.
    pub fn get_properties(&self, entity: EntityRef) -> ServiceResult<Vec<Property>> {
        Ok(self.properties().list_for_entity(entity)?)
    }

    pub fn list_properties_in_model(&self, model_id: DataModelId) -> ServiceResult<Vec<Property>> {
        Ok(self.properties().list_in_model(model_id)?)
    }

    pub fn delete_property(&self, id: PropertyId) -> ServiceResult<()> {
        self.ctx.write("property_delete", |conn, events| {
            SqlitePropertyRepository::new(conn).delete_property(id)?;
            events.push(DomainEvent::new(
                EntityKind::Property,
                id,
                ChangeAction::Deleted,
            ));
            Ok(())
        })
    }

    /// Removes every property of one entity and returns how many went.
    pub fn clear_properties(&self, entity: EntityRef) -> ServiceResult<usize> {
        if entity.entity_id().is_nil() {
            return Err(ServiceError::validation("entity id must not be nil"));
        }
        self.ctx.write("property_clear", |conn, events| {
            let removed = SqlitePropertyRepository::new(conn).delete_for_entity(entity)?;
            if removed > 0 {
                events.push(DomainEvent::new(
                    EntityKind::Property,
                    entity.entity_id(),
                    ChangeAction::Deleted,
                ));
            }
            Ok(removed)
        })
    }
}

fn same_key(existing: &Property, input: &PropertyWrite) -> bool {
    existing.model_id == input.model_id
        && existing.layer == input.layer
        && existing.property_name == input.property_name
}
