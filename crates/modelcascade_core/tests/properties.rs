use modelcascade_core::db::open_db_in_memory;
use modelcascade_core::model::data_model::NewDataModel;
use modelcascade_core::model::property::{EntityRef, PropertyValue, PropertyWrite};
use modelcascade_core::{Layer, ServiceContext, ServiceError};
use serde_json::json;
use uuid::Uuid;

fn write(entity: EntityRef, name: &str, value: PropertyValue, layer: Option<Layer>) -> PropertyWrite {
    PropertyWrite {
        entity,
        model_id: None,
        property_name: name.to_string(),
        property_value: value,
        property_type: "tag".to_string(),
        layer,
    }
}

#[test]
fn set_property_round_trips_every_value_kind() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let entity = EntityRef::Object(Uuid::new_v4());

    let values = [
        ("owner", PropertyValue::String("data-team".to_string())),
        ("weight", PropertyValue::Number(0.75)),
        ("pii", PropertyValue::Boolean(true)),
        ("lineage", PropertyValue::Json(json!({ "source": "crm", "hops": 2 }))),
        ("tags", PropertyValue::Array(vec![json!("gold"), json!(3)])),
    ];
    for (name, value) in &values {
        ctx.properties()
            .set_property(&write(entity, name, value.clone(), None))
            .unwrap();
    }

    let stored = ctx.properties().get_properties(entity).unwrap();
    assert_eq!(stored.len(), values.len());
    for (name, value) in &values {
        let property = stored
            .iter()
            .find(|property| property.property_name == *name)
            .unwrap();
        assert_eq!(&property.property_value, value);
        assert_eq!(property.entity, entity);
    }
}

#[test]
fn set_property_upserts_on_the_full_key() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let model = ctx
        .registry()
        .create_model(&NewDataModel::new("Sales", Layer::Conceptual))
        .unwrap();
    let entity = EntityRef::Attribute(Uuid::new_v4());

    let first = ctx
        .properties()
        .set_property(&PropertyWrite {
            model_id: Some(model.id),
            ..write(entity, "format", PropertyValue::String("iso".to_string()), None)
        })
        .unwrap();
    let replaced = ctx
        .properties()
        .set_property(&PropertyWrite {
            model_id: Some(model.id),
            ..write(entity, "format", PropertyValue::String("epoch".to_string()), None)
        })
        .unwrap();
    assert_eq!(first.id, replaced.id);
    assert_eq!(
        replaced.property_value,
        PropertyValue::String("epoch".to_string())
    );

    let layered = ctx
        .properties()
        .set_property(&PropertyWrite {
            model_id: Some(model.id),
            ..write(
                entity,
                "format",
                PropertyValue::String("timestamp".to_string()),
                Some(Layer::Physical),
            )
        })
        .unwrap();
    assert_ne!(layered.id, first.id);
    assert_eq!(layered.layer, Some(Layer::Physical));

    let other_model = ctx
        .properties()
        .set_property(&write(entity, "format", PropertyValue::Boolean(false), None))
        .unwrap();
    assert_ne!(other_model.id, first.id);

    assert_eq!(ctx.properties().get_properties(entity).unwrap().len(), 3);
    assert_eq!(
        ctx.properties()
            .list_properties_in_model(model.id)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn set_property_rejects_blank_name_or_type() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let entity = EntityRef::Model(Uuid::new_v4());

    let err = ctx
        .properties()
        .set_property(&write(entity, " ", PropertyValue::Boolean(true), None))
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    let err = ctx
        .properties()
        .set_property(&PropertyWrite {
            property_type: String::new(),
            ..write(entity, "flag", PropertyValue::Boolean(true), None)
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));
}

#[test]
fn delete_and_clear_properties() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let entity = EntityRef::ModelObject(Uuid::new_v4());

    let kept = ctx
        .properties()
        .set_property(&write(entity, "color", PropertyValue::String("#fff".to_string()), None))
        .unwrap();
    ctx.properties()
        .set_property(&write(entity, "pinned", PropertyValue::Boolean(true), None))
        .unwrap();

    ctx.properties().delete_property(kept.id).unwrap();
    assert_eq!(ctx.properties().get_property(kept.id).unwrap(), None);
    let err = ctx.properties().delete_property(kept.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    assert_eq!(ctx.properties().clear_properties(entity).unwrap(), 1);
    assert!(ctx.properties().get_properties(entity).unwrap().is_empty());
}

#[test]
fn set_property_stores_name_and_type_exactly_as_given() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let entity = EntityRef::Object(Uuid::new_v4());

    let stored = ctx
        .properties()
        .set_property(&PropertyWrite {
            property_type: " tag ".to_string(),
            ..write(entity, " Owner ", PropertyValue::String("ops".to_string()), None)
        })
        .unwrap();
    assert_eq!(stored.property_name, " Owner ");
    assert_eq!(stored.property_type, " tag ");

    let trimmed = ctx
        .properties()
        .set_property(&write(entity, "Owner", PropertyValue::String("dev".to_string()), None))
        .unwrap();
    assert_ne!(trimmed.id, stored.id);

    let reread = ctx.properties().get_properties(entity).unwrap();
    assert!(reread
        .iter()
        .any(|property| property.id == stored.id && property.property_name == " Owner "));
}

#[test]
fn set_property_rejects_non_finite_numbers() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let entity = EntityRef::Object(Uuid::new_v4());

    for value in [f64::NAN, f64::INFINITY] {
        let err = ctx
            .properties()
            .set_property(&write(entity, "weight", PropertyValue::Number(value), None))
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
    }
    assert!(ctx.properties().get_properties(entity).unwrap().is_empty());
}
