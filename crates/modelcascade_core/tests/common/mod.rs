#![allow(dead_code)]

use modelcascade_core::model::attribute::{Attribute, NewAttribute};
use modelcascade_core::model::data_model::{DataModel, NewDataModel};
use modelcascade_core::model::object::{DataObject, NewDataObject};
use modelcascade_core::model::registry::{DataArea, Domain, NewDataArea, NewDomain, NewSystem, System};
use modelcascade_core::{FamilySeed, Layer, ServiceContext};

pub struct Registry {
    pub domain: Domain,
    pub area: DataArea,
    pub system: System,
}

pub fn seed_registry(ctx: &ServiceContext<'_>, system_name: &str) -> Registry {
    let registry = ctx.registry();
    let domain = registry
        .create_domain(&NewDomain {
            name: "Sales".to_string(),
            ..NewDomain::default()
        })
        .unwrap();
    let area = registry
        .create_data_area(&NewDataArea {
            domain_id: domain.id,
            name: "Orders".to_string(),
            description: None,
            color_hex: None,
        })
        .unwrap();
    let system = registry
        .create_system(&NewSystem::named(system_name))
        .unwrap();
    Registry {
        domain,
        area,
        system,
    }
}

/// Standalone model scoped to the registry, used to define canonical objects.
pub fn staging_model(ctx: &ServiceContext<'_>, reg: &Registry, layer: Layer) -> DataModel {
    ctx.registry()
        .create_model(&NewDataModel {
            target_system_id: Some(reg.system.id),
            domain_id: Some(reg.domain.id),
            data_area_id: Some(reg.area.id),
            ..NewDataModel::new("Staging", layer)
        })
        .unwrap()
}

pub fn scoped_object(
    ctx: &ServiceContext<'_>,
    reg: &Registry,
    model: &DataModel,
    name: &str,
) -> DataObject {
    ctx.objects()
        .create_object(&NewDataObject {
            domain_id: Some(reg.domain.id),
            data_area_id: Some(reg.area.id),
            target_system_id: Some(reg.system.id),
            ..NewDataObject::new(name, model.id)
        })
        .unwrap()
        .object
}

pub fn typed_attribute(
    ctx: &ServiceContext<'_>,
    object: &DataObject,
    name: &str,
    conceptual_type: &str,
) -> Attribute {
    ctx.attributes()
        .create_attribute(&NewAttribute::new(object.id, name).with_conceptual_type(conceptual_type))
        .unwrap()
}

pub fn family_seed(reg: &Registry, name: &str, objects: &[&DataObject]) -> FamilySeed {
    FamilySeed {
        name: name.to_string(),
        target_system_id: reg.system.id,
        domain_id: reg.domain.id,
        data_area_id: reg.area.id,
        selected_object_ids: Some(objects.iter().map(|object| object.id).collect()),
    }
}
