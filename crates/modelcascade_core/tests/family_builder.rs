mod common;

use common::{family_seed, scoped_object, seed_registry, staging_model, typed_attribute};
use modelcascade_core::db::open_db_in_memory;
use modelcascade_core::model::registry::NewDomain;
use modelcascade_core::{FamilySeed, Layer, ServiceContext, ServiceError};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn family_creates_three_linked_models_with_target_system() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");

    let created = ctx
        .families()
        .create_family(&family_seed(&reg, "Sales Model", &[]))
        .unwrap();

    assert_eq!(created.conceptual.layer, Layer::Conceptual);
    assert_eq!(created.logical.layer, Layer::Logical);
    assert_eq!(created.physical.layer, Layer::Physical);
    assert_eq!(created.conceptual.parent_model_id, None);
    assert_eq!(created.logical.parent_model_id, Some(created.conceptual.id));
    assert_eq!(created.physical.parent_model_id, Some(created.conceptual.id));
    for model in [&created.conceptual, &created.logical, &created.physical] {
        assert_eq!(model.target_system_id, Some(reg.system.id));
        assert_eq!(model.domain_id, Some(reg.domain.id));
        assert_eq!(model.data_area_id, Some(reg.area.id));
    }
    assert_eq!(created.created_counts.models, 3);
    assert_eq!(created.created_counts.objects, 0);

    let family = ctx.registry().list_family(created.physical.id).unwrap();
    assert_eq!(family.len(), 3);
    assert_eq!(family[0].id, created.conceptual.id);
}

#[test]
fn qa_verification_family_binds_every_selected_object_into_all_layers() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);

    let names = ["Customer", "Order", "OrderLine", "Product", "Invoice", "Payment"];
    let objects = names
        .iter()
        .map(|name| scoped_object(&ctx, &reg, &staging, name))
        .collect::<Vec<_>>();
    typed_attribute(&ctx, &objects[0], "customer_id", "Identifier");
    typed_attribute(&ctx, &objects[0], "email", "Text");

    let lake_system = ctx
        .registry()
        .find_system_by_name("data lake")
        .unwrap()
        .expect("Data Lake should be registered");
    let seed = family_seed(
        &reg,
        "QA Verification Model",
        &objects.iter().collect::<Vec<_>>(),
    );
    assert_eq!(seed.target_system_id, lake_system.id);

    let created = ctx.families().create_family(&seed).unwrap();
    assert_eq!(created.created_counts.objects, 6);
    assert_eq!(created.created_counts.model_objects, 18);
    assert_eq!(created.created_counts.model_attributes, 6);
    assert_eq!(created.logical.name, "QA Verification Model (logical)");

    assert!(count(&conn, "data_objects") >= 6);
    for object in &objects {
        let stored = ctx.objects().get_object(object.id).unwrap().unwrap();
        assert!(stored.domain_id.is_some());
        assert!(stored.data_area_id.is_some());
        assert_eq!(stored.target_system_id, created.conceptual.target_system_id);

        let instances = ctx.objects().list_model_objects_for_object(object.id).unwrap();
        for model in [&created.conceptual, &created.logical, &created.physical] {
            let instance = instances
                .iter()
                .find(|instance| instance.model_id == model.id)
                .expect("object should have an instance in every family model");
            assert_eq!(instance.target_system_id, Some(reg.system.id));
        }
    }
}

#[test]
fn family_model_attributes_carry_the_strict_cascade() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let user = scoped_object(&ctx, &reg, &staging, "User");
    let user_id = typed_attribute(&ctx, &user, "user_id", "Identifier");
    let email = typed_attribute(&ctx, &user, "email", "Text");

    let created = ctx
        .families()
        .create_family(&family_seed(&reg, "Accounts", &[&user]))
        .unwrap();

    let bindings = ctx.attributes().list_model_attributes(user_id.id).unwrap();
    let in_physical = bindings
        .iter()
        .find(|binding| binding.model_id == created.physical.id)
        .unwrap();
    assert_eq!(in_physical.conceptual_type.as_deref(), Some("Identifier"));
    assert_eq!(in_physical.logical_type.as_deref(), Some("UUID"));
    assert_eq!(in_physical.physical_type.as_deref(), Some("uuid"));

    let bindings = ctx.attributes().list_model_attributes(email.id).unwrap();
    let in_logical = bindings
        .iter()
        .find(|binding| binding.model_id == created.logical.id)
        .unwrap();
    assert_eq!(in_logical.logical_type.as_deref(), Some("VARCHAR"));
    assert_eq!(in_logical.physical_type.as_deref(), Some("varchar"));
    assert_eq!(in_logical.length, Some(255));
}

#[test]
fn family_skips_objects_outside_the_seed_scope() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let inside = scoped_object(&ctx, &reg, &staging, "Customer");

    let other_domain = ctx
        .registry()
        .create_domain(&NewDomain {
            name: "Finance".to_string(),
            ..NewDomain::default()
        })
        .unwrap();
    let outside = ctx
        .objects()
        .create_object(&modelcascade_core::model::object::NewDataObject {
            domain_id: Some(other_domain.id),
            ..modelcascade_core::model::object::NewDataObject::new("Ledger", staging.id)
        })
        .unwrap()
        .object;

    let mut seed = family_seed(&reg, "Scoped", &[&inside, &outside, &inside]);
    seed.selected_object_ids
        .as_mut()
        .unwrap()
        .push(Uuid::new_v4());
    let created = ctx.families().create_family(&seed).unwrap();

    assert_eq!(created.created_counts.objects, 1);
    assert_eq!(
        ctx.objects()
            .list_model_objects_in_model(created.logical.id)
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        ctx.objects()
            .list_model_objects_for_object(outside.id)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn family_with_missing_target_system_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let models_before = count(&conn, "data_models");

    let seed = FamilySeed {
        target_system_id: Uuid::new_v4(),
        ..family_seed(&reg, "Orphan", &[])
    };
    let err = ctx.families().create_family(&seed).unwrap_err();

    assert!(matches!(err, ServiceError::NotFound { .. }));
    assert_eq!(count(&conn, "data_models"), models_before);
}

#[test]
fn family_rejects_blank_name() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");

    let err = ctx
        .families()
        .create_family(&family_seed(&reg, "   ", &[]))
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));
    assert_eq!(count(&conn, "data_models"), 0);
}

#[test]
fn family_fills_blank_canonical_types_and_keeps_overrides() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let order = scoped_object(&ctx, &reg, &staging, "Order");
    let total = typed_attribute(&ctx, &order, "total", "Money");

    conn.execute(
        "UPDATE attributes SET logical_type = NULL, physical_type = NULL, length = NULL WHERE id = ?1;",
        [total.id.to_string()],
    )
    .unwrap();

    let created = ctx
        .families()
        .create_family(&family_seed(&reg, "Billing", &[&order]))
        .unwrap();
    assert_eq!(created.created_counts.canonical_attributes_filled, 1);

    let refreshed = ctx.attributes().get_attribute(total.id).unwrap().unwrap();
    assert_eq!(refreshed.logical_type.as_deref(), Some("DECIMAL"));
    assert_eq!(refreshed.physical_type.as_deref(), Some("numeric"));
    assert_eq!(refreshed.length, Some(18));
}

#[test]
fn family_adopts_objects_from_a_standalone_staging_model() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let user = scoped_object(&ctx, &reg, &staging, "User");
    let user_id = typed_attribute(&ctx, &user, "user_id", "Identifier");

    let created = ctx
        .families()
        .create_family(&family_seed(&reg, "Accounts", &[&user]))
        .unwrap();
    assert_eq!(created.created_counts.model_objects, 3);
    assert_eq!(created.created_counts.model_attributes, 3);

    let stored = ctx.objects().get_object(user.id).unwrap().unwrap();
    assert_eq!(stored.model_id, created.conceptual.id);

    let instances = ctx.objects().list_model_objects_for_object(user.id).unwrap();
    assert_eq!(instances.len(), 3);
    let mut placed = instances
        .iter()
        .map(|instance| instance.model_id)
        .collect::<Vec<_>>();
    placed.sort();
    let mut family_ids = vec![created.conceptual.id, created.logical.id, created.physical.id];
    family_ids.sort();
    assert_eq!(placed, family_ids);
    assert!(ctx
        .objects()
        .list_model_objects_in_model(staging.id)
        .unwrap()
        .is_empty());

    let bindings = ctx.attributes().list_model_attributes(user_id.id).unwrap();
    assert_eq!(bindings.len(), 3);
    let in_conceptual = bindings
        .iter()
        .find(|binding| binding.model_id == created.conceptual.id)
        .unwrap();
    assert_eq!(in_conceptual.logical_type.as_deref(), Some("UUID"));
    assert_eq!(in_conceptual.physical_type.as_deref(), Some("uuid"));
}

#[test]
fn object_defined_in_another_family_keeps_that_instance() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let first = ctx
        .families()
        .create_family(&family_seed(&reg, "Billing", &[]))
        .unwrap();
    let invoice = scoped_object(&ctx, &reg, &first.conceptual, "Invoice");

    let second = ctx
        .families()
        .create_family(&family_seed(&reg, "Reporting", &[&invoice]))
        .unwrap();

    let stored = ctx.objects().get_object(invoice.id).unwrap().unwrap();
    assert_eq!(stored.model_id, second.conceptual.id);

    let instances = ctx
        .objects()
        .list_model_objects_for_object(invoice.id)
        .unwrap();
    assert!(instances
        .iter()
        .any(|instance| instance.model_id == first.conceptual.id));
    for model in [&second.conceptual, &second.logical, &second.physical] {
        assert_eq!(
            instances
                .iter()
                .filter(|instance| instance.model_id == model.id)
                .count(),
            1
        );
    }
}

#[test]
fn failed_binding_write_rolls_back_the_whole_family() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    let order = scoped_object(&ctx, &reg, &staging, "Order");
    typed_attribute(&ctx, &order, "order_id", "Identifier");
    conn.execute_batch(
        "CREATE TRIGGER reject_new_bindings
         BEFORE INSERT ON data_model_attributes
         BEGIN SELECT RAISE(ABORT, 'bindings locked'); END;",
    )
    .unwrap();

    let models_before = count(&conn, "data_models");
    let instances_before = count(&conn, "data_model_objects");
    let err = ctx
        .families()
        .create_family(&family_seed(&reg, "Fulfilment", &[&order]))
        .unwrap_err();

    assert!(matches!(err, ServiceError::TransactionFailed { .. }));
    assert_eq!(count(&conn, "data_models"), models_before);
    assert_eq!(count(&conn, "data_model_objects"), instances_before);
    let stored = ctx.objects().get_object(order.id).unwrap().unwrap();
    assert_eq!(stored.model_id, staging.id);
    let instances = ctx.objects().list_model_objects_for_object(order.id).unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].model_id, staging.id);
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}
