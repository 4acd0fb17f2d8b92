//! Reference registry and data model use-cases.
//!
//! # Invariants
//! - A conceptual model never has a parent.
//! - A logical or physical model's parent, when given, is a conceptual model.

use crate::error::{ServiceError, ServiceResult};
use crate::events::{ChangeAction, DomainEvent};
use crate::model::data_model::{DataModel, NewDataModel};
use crate::model::layer::Layer;
use crate::model::registry::{DataArea, Domain, NewDataArea, NewDomain, NewSystem, System};
use crate::model::{DataAreaId, DataModelId, DomainId, EntityKind, SystemId};
use crate::repo::model_repo::{ModelRepository, SqliteModelRepository};
use crate::repo::registry_repo::{RegistryRepository, SqliteRegistryRepository};
use crate::service::{require_name, require_registry_refs, ServiceContext};

pub struct RegistryService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> RegistryService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    fn registry(&self) -> SqliteRegistryRepository<'conn> {
        SqliteRegistryRepository::new(self.ctx.conn())
    }

    fn models(&self) -> SqliteModelRepository<'conn> {
        SqliteModelRepository::new(self.ctx.conn())
    }

    pub fn create_domain(&self, input: &NewDomain) -> ServiceResult<Domain> {
        require_name(&input.name, "domain name")?;
        self.ctx.write("domain_create", |conn, events| {
            let domain = SqliteRegistryRepository::new(conn).create_domain(input)?;
            events.push(DomainEvent::new(
                EntityKind::Domain,
                domain.id,
                ChangeAction::Created,
            ));
            Ok(domain)
        })
    }

    pub fn get_domain(&self, id: DomainId) -> ServiceResult<Option<Domain>> {
        Ok(self.registry().get_domain(id)?)
    }

    pub fn list_domains(&self) -> ServiceResult<Vec<Domain>> {
        Ok(self.registry().list_domains()?)
    }

    /// Creates a data area under an existing domain.
    pub fn create_data_area(&self, input: &NewDataArea) -> ServiceResult<DataArea> {
        require_name(&input.name, "data area name")?;
        self.ctx.write("data_area_create", |conn, events| {
            let registry = SqliteRegistryRepository::new(conn);
            registry
                .get_domain(input.domain_id)?
                .ok_or(ServiceError::not_found(EntityKind::Domain, input.domain_id))?;
            let area = registry.create_data_area(input)?;
            events.push(DomainEvent::new(
                EntityKind::DataArea,
                area.id,
                ChangeAction::Created,
            ));
            Ok(area)
        })
    }

    pub fn get_data_area(&self, id: DataAreaId) -> ServiceResult<Option<DataArea>> {
        Ok(self.registry().get_data_area(id)?)
    }

    pub fn list_data_areas(&self, domain_id: Option<DomainId>) -> ServiceResult<Vec<DataArea>> {
        Ok(self.registry().list_data_areas(domain_id)?)
    }

    pub fn create_system(&self, input: &NewSystem) -> ServiceResult<System> {
        require_name(&input.name, "system name")?;
        self.ctx.write("system_create", |conn, events| {
            let system = SqliteRegistryRepository::new(conn).create_system(input)?;
            events.push(DomainEvent::new(
                EntityKind::System,
                system.id,
                ChangeAction::Created,
            ));
            Ok(system)
        })
    }

    pub fn get_system(&self, id: SystemId) -> ServiceResult<Option<System>> {
        Ok(self.registry().get_system(id)?)
    }

    pub fn find_system_by_name(&self, name: &str) -> ServiceResult<Option<System>> {
        Ok(self.registry().find_system_by_name(name)?)
    }

    pub fn list_systems(&self) -> ServiceResult<Vec<System>> {
        Ok(self.registry().list_systems()?)
    }

    /// Creates one standalone model outside family creation.
    ///
    /// # Errors
    /// - `ValidationFailed` for a blank name, a conceptual model with a
    ///   parent, or a parent that is not conceptual.
    /// - `NotFound` for a missing parent or registry reference.
    pub fn create_model(&self, input: &NewDataModel) -> ServiceResult<DataModel> {
        require_name(&input.name, "model name")?;
        if input.layer == Layer::Conceptual && input.parent_model_id.is_some() {
            return Err(ServiceError::validation(
                "conceptual models cannot have a parent model",
            ));
        }

        self.ctx.write("model_create", |conn, events| {
            require_registry_refs(
                conn,
                input.domain_id,
                input.data_area_id,
                &[input.target_system_id],
            )?;
            let models = SqliteModelRepository::new(conn);
            if let Some(parent_id) = input.parent_model_id {
                let parent = models
                    .get_model(parent_id)?
                    .ok_or(ServiceError::not_found(EntityKind::Model, parent_id))?;
                if parent.layer != Layer::Conceptual {
                    return Err(ServiceError::validation(format!(
                        "parent model {parent_id} is {}, expected conceptual",
                        parent.layer
                    )));
                }
            }
            let model = models.create_model(input)?;
            events.push(
                DomainEvent::new(EntityKind::Model, model.id, ChangeAction::Created)
                    .in_layer(model.layer),
            );
            Ok(model)
        })
    }

    pub fn get_model(&self, id: DataModelId) -> ServiceResult<Option<DataModel>> {
        Ok(self.models().get_model(id)?)
    }

    pub fn list_models(&self, layer: Option<Layer>) -> ServiceResult<Vec<DataModel>> {
        Ok(self.models().list_models(layer)?)
    }

    /// Lists a family starting from any of its members, root first.
    pub fn list_family(&self, model_id: DataModelId) -> ServiceResult<Vec<DataModel>> {
        let models = self.models();
        let model = models
            .get_model(model_id)?
            .ok_or(ServiceError::not_found(EntityKind::Model, model_id))?;
        Ok(models.list_family(model.family_root_id())?)
    }
}
