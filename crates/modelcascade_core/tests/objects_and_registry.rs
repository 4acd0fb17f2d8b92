mod common;

use common::{family_seed, scoped_object, seed_registry, staging_model, typed_attribute};
use modelcascade_core::db::open_db_in_memory;
use modelcascade_core::model::data_model::NewDataModel;
use modelcascade_core::model::object::{
    InstancePlacement, ModelObjectPatch, NewDataObject, ObjectPatch, Position,
};
use modelcascade_core::model::property::{EntityRef, PropertyValue, PropertyWrite};
use modelcascade_core::model::registry::{NewDataArea, NewDomain, NewSystem};
use modelcascade_core::model::relationship::{Cardinality, NewRelationship, RelationshipEndpoints};
use modelcascade_core::repo::object_repo::ObjectScope;
use modelcascade_core::{
    ChangeAction, EntityKind, Layer, RecordingEventSink, ServiceContext, ServiceError,
};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

#[test]
fn registry_creates_and_lists_reference_data() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");

    assert_eq!(reg.system.category, "other");
    assert_eq!(reg.system.system_type, "database");
    assert_eq!(ctx.registry().list_domains().unwrap().len(), 1);
    assert_eq!(
        ctx.registry()
            .list_data_areas(Some(reg.domain.id))
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        ctx.registry().get_system(reg.system.id).unwrap(),
        Some(reg.system.clone())
    );

    let err = ctx
        .registry()
        .create_data_area(&NewDataArea {
            domain_id: Uuid::new_v4(),
            name: "Orphan".to_string(),
            description: None,
            color_hex: None,
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let err = ctx
        .registry()
        .create_system(&NewSystem::named("Data Lake"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    let err = ctx
        .registry()
        .create_domain(&NewDomain::default())
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));
}

#[test]
fn standalone_models_validate_their_parent() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let registry = ctx.registry();

    let root = registry
        .create_model(&NewDataModel::new("Root", Layer::Conceptual))
        .unwrap();
    let logical = registry
        .create_model(&NewDataModel {
            parent_model_id: Some(root.id),
            ..NewDataModel::new("Root (logical)", Layer::Logical)
        })
        .unwrap();

    let err = registry
        .create_model(&NewDataModel {
            parent_model_id: Some(root.id),
            ..NewDataModel::new("Nested", Layer::Conceptual)
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    let err = registry
        .create_model(&NewDataModel {
            parent_model_id: Some(logical.id),
            ..NewDataModel::new("Grandchild", Layer::Physical)
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    let err = registry
        .create_model(&NewDataModel {
            parent_model_id: Some(Uuid::new_v4()),
            ..NewDataModel::new("Lost", Layer::Physical)
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    assert_eq!(registry.list_models(Some(Layer::Logical)).unwrap().len(), 1);
    assert_eq!(registry.list_family(logical.id).unwrap().len(), 2);
}

#[test]
fn create_object_binds_its_defining_model_and_rejects_bad_references() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);

    let created = ctx
        .objects()
        .create_object(&NewDataObject {
            position: Some(Position { x: 10.0, y: 20.0 }),
            ..NewDataObject::new("Customer", staging.id)
        })
        .unwrap();
    assert_eq!(created.instance.object_id, created.object.id);
    assert_eq!(created.instance.model_id, staging.id);
    assert_eq!(created.instance.position, Some(Position { x: 10.0, y: 20.0 }));
    assert!(created.instance.is_visible);

    let err = ctx
        .objects()
        .create_object(&NewDataObject::new("Ghost", Uuid::new_v4()))
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let err = ctx
        .objects()
        .create_object(&NewDataObject {
            target_system_id: Some(Uuid::new_v4()),
            ..NewDataObject::new("Ghost", staging.id)
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
    assert_eq!(count(&conn, "data_objects"), 1);
}

#[test]
fn objects_update_list_and_rebind() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let customer = scoped_object(&ctx, &reg, &staging, "Customer");
    typed_attribute(&ctx, &customer, "name", "Name");

    let updated = ctx
        .objects()
        .update_object(
            customer.id,
            &ObjectPatch {
                name: Some("Client".to_string()),
                object_type: Some("entity".to_string()),
                ..ObjectPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Client");
    assert_eq!(updated.domain_id, Some(reg.domain.id));

    let scoped = ctx
        .objects()
        .list_objects(&ObjectScope {
            domain_id: Some(reg.domain.id),
            ..ObjectScope::default()
        })
        .unwrap();
    assert_eq!(scoped.len(), 1);

    let other = ctx
        .registry()
        .create_model(&NewDataModel::new("Other", Layer::Logical))
        .unwrap();
    let rebound = ctx
        .objects()
        .add_object_to_model(customer.id, other.id, &InstancePlacement::default())
        .unwrap();
    assert_eq!(
        ctx.attributes()
            .list_model_attributes(
                ctx.attributes().list_attributes(customer.id).unwrap()[0].id
            )
            .unwrap()
            .len(),
        2
    );

    let err = ctx
        .objects()
        .add_object_to_model(customer.id, other.id, &InstancePlacement::default())
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    let moved = ctx
        .objects()
        .update_model_object(
            rebound.id,
            &ModelObjectPatch {
                position: Some(Position { x: 1.0, y: 2.0 }),
                ..ModelObjectPatch::default()
            },
        )
        .unwrap();
    assert_eq!(moved.position, Some(Position { x: 1.0, y: 2.0 }));
}

#[test]
fn deleting_an_instance_removes_its_rows_but_keeps_the_object() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let user = scoped_object(&ctx, &reg, &staging, "User");
    let product = scoped_object(&ctx, &reg, &staging, "Product");
    typed_attribute(&ctx, &user, "user_id", "Identifier");
    let family = ctx
        .families()
        .create_family(&family_seed(&reg, "Catalog", &[&user, &product]))
        .unwrap();

    let logical = ctx
        .objects()
        .list_model_objects_in_model(family.logical.id)
        .unwrap();
    let user_logical = logical.iter().find(|mo| mo.object_id == user.id).unwrap();
    let product_logical = logical.iter().find(|mo| mo.object_id == product.id).unwrap();
    ctx.relationships()
        .create_relationship(&NewRelationship::new(
            RelationshipEndpoints::model_specific(
                family.logical.id,
                user_logical.id,
                product_logical.id,
            ),
            Cardinality::OneToOne,
        ))
        .unwrap();

    ctx.objects().delete_model_object(user_logical.id).unwrap();

    assert_eq!(ctx.objects().get_model_object(user_logical.id).unwrap(), None);
    assert!(ctx.objects().get_object(user.id).unwrap().is_some());
    assert!(ctx
        .relationships()
        .list_model_relationships(family.logical.id)
        .unwrap()
        .is_empty());
    assert_eq!(
        count_where(&conn, "data_model_attributes", "model_object_id", user_logical.id),
        0
    );
}

#[test]
fn deleting_an_object_cascades_through_every_layer() {
    let conn = open_db_in_memory().unwrap();
    let sink = Arc::new(RecordingEventSink::new());
    let ctx = ServiceContext::new(&conn).with_events(sink.clone());
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let user = scoped_object(&ctx, &reg, &staging, "User");
    let product = scoped_object(&ctx, &reg, &staging, "Product");
    let user_id = typed_attribute(&ctx, &user, "user_id", "Identifier");
    ctx.families()
        .create_family(&family_seed(&reg, "Catalog", &[&user, &product]))
        .unwrap();
    ctx.relationships()
        .create_relationship(&NewRelationship::new(
            RelationshipEndpoints::global(product.id, user.id),
            Cardinality::ManyToOne,
        ))
        .unwrap();
    ctx.properties()
        .set_property(&PropertyWrite {
            entity: EntityRef::Attribute(user_id.id),
            model_id: None,
            property_name: "sensitivity".to_string(),
            property_value: PropertyValue::String("low".to_string()),
            property_type: "string".to_string(),
            layer: None,
        })
        .unwrap();
    sink.clear();

    ctx.objects().delete_object(user.id).unwrap();

    assert_eq!(ctx.objects().get_object(user.id).unwrap(), None);
    assert_eq!(count_where(&conn, "data_model_objects", "object_id", user.id), 0);
    assert_eq!(count_where(&conn, "attributes", "object_id", user.id), 0);
    assert_eq!(count_where(&conn, "data_model_attributes", "attribute_id", user_id.id), 0);
    assert_eq!(count_where(&conn, "properties", "entity_id", user_id.id), 0);
    assert!(ctx
        .relationships()
        .list_global_relationships(product.id)
        .unwrap()
        .is_empty());
    assert!(ctx.objects().get_object(product.id).unwrap().is_some());

    let events = sink.events();
    assert!(events.iter().any(|event| event.kind == EntityKind::Object
        && event.entity_id == user.id
        && event.action == ChangeAction::Deleted));

    let err = ctx.objects().delete_object(user.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[test]
fn events_are_published_only_after_commit() {
    let conn = open_db_in_memory().unwrap();
    let sink = Arc::new(RecordingEventSink::new());
    let ctx = ServiceContext::new(&conn).with_events(sink.clone());
    let reg = seed_registry(&ctx, "Data Lake");

    let created = ctx
        .families()
        .create_family(&family_seed(&reg, "Evented", &[]))
        .unwrap();
    let model_events = sink
        .events()
        .into_iter()
        .filter(|event| event.kind == EntityKind::Model)
        .collect::<Vec<_>>();
    assert_eq!(model_events.len(), 3);
    assert_eq!(model_events[0].entity_id, created.conceptual.id);
    assert_eq!(model_events[2].layer, Some(Layer::Physical));

    sink.clear();
    let failed = ctx.families().create_family(&modelcascade_core::FamilySeed {
        domain_id: Uuid::new_v4(),
        ..family_seed(&reg, "Broken", &[])
    });
    assert!(failed.is_err());
    assert!(sink.events().is_empty());
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

fn count_where(conn: &Connection, table: &str, column: &str, id: Uuid) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1;"),
        [id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}
