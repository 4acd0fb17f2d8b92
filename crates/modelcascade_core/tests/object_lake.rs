mod common;

use common::{family_seed, scoped_object, seed_registry, staging_model, Registry};
use modelcascade_core::db::open_db_in_memory;
use modelcascade_core::model::attribute::NewAttribute;
use modelcascade_core::model::object::{DataObject, ModelObjectPatch};
use modelcascade_core::model::property::{EntityRef, PropertyValue, PropertyWrite};
use modelcascade_core::model::relationship::{Cardinality, NewRelationship, RelationshipEndpoints};
use modelcascade_core::{
    FamilyCreated, LakeFilters, LakeSortBy, Layer, ObjectLakeObject, PageLimits, ServiceContext,
    SortOrder,
};
use rusqlite::Connection;

struct Catalog {
    reg: Registry,
    family: FamilyCreated,
    user: DataObject,
    product: DataObject,
}

/// "User" (user_id, email) and "Product" in one family, related globally
/// 1:N and through their logical instances.
fn seed_catalog(ctx: &ServiceContext<'_>) -> Catalog {
    let reg = seed_registry(ctx, "Data Lake");
    let staging = staging_model(ctx, &reg, Layer::Conceptual);
    let user = scoped_object(ctx, &reg, &staging, "User");
    let product = scoped_object(ctx, &reg, &staging, "Product");
    ctx.attributes()
        .create_attribute(
            &NewAttribute::new(user.id, "user_id")
                .with_conceptual_type("Identifier")
                .primary_key(),
        )
        .unwrap();
    ctx.attributes()
        .create_attribute(&NewAttribute::new(user.id, "email").with_conceptual_type("Text"))
        .unwrap();

    let family = ctx
        .families()
        .create_family(&family_seed(&reg, "Catalog", &[&user, &product]))
        .unwrap();

    ctx.relationships()
        .create_relationship(&NewRelationship::new(
            RelationshipEndpoints::global(user.id, product.id),
            Cardinality::OneToMany,
        ))
        .unwrap();
    let instances = ctx
        .objects()
        .list_model_objects_in_model(family.logical.id)
        .unwrap();
    let user_logical = instances.iter().find(|mo| mo.object_id == user.id).unwrap();
    let product_logical = instances
        .iter()
        .find(|mo| mo.object_id == product.id)
        .unwrap();
    ctx.relationships()
        .create_relationship(&NewRelationship::new(
            RelationshipEndpoints::model_specific(
                family.logical.id,
                user_logical.id,
                product_logical.id,
            ),
            Cardinality::OneToMany,
        ))
        .unwrap();

    Catalog {
        reg,
        family,
        user,
        product,
    }
}

fn find<'a>(objects: &'a [ObjectLakeObject], name: &str) -> &'a ObjectLakeObject {
    objects
        .iter()
        .find(|entry| entry.object.name == name)
        .unwrap_or_else(|| panic!("{name} missing from lake"))
}

#[test]
fn unfiltered_lake_returns_objects_with_both_relationship_scopes() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let catalog = seed_catalog(&ctx);

    let response = ctx
        .lake()
        .query_object_lake(&LakeFilters::default())
        .unwrap();
    assert_eq!(response.objects.len(), 2);
    assert_eq!(response.meta.total_count, 2);
    assert!(!response.meta.has_more);
    assert_eq!(response.meta.page, 1);
    assert_eq!(response.applied_filters.page_size, Some(50));

    let user = find(&response.objects, "User");
    assert_eq!(user.relationships.global.len(), 1);
    assert_eq!(user.relationships.model_specific.len(), 1);
    assert_eq!(user.stats.relationship_count, 2);
    assert_eq!(user.stats.attribute_count, user.attributes.len());
    assert_eq!(user.stats.model_instance_count, user.model_instances.len());
    assert_eq!(user.model_instances.len(), 3);
    assert_eq!(user.domain.as_ref().map(|d| d.id), Some(catalog.reg.domain.id));
    assert_eq!(
        user.target_system.as_ref().map(|s| s.name.as_str()),
        Some("Data Lake")
    );

    let user_id = user
        .attributes
        .iter()
        .find(|attr| attr.attribute.name == "user_id")
        .unwrap();
    let physical = &user_id.metadata_by_model[&catalog.family.physical.id];
    assert_eq!(physical.physical_type.as_deref(), Some("uuid"));
    assert_eq!(user_id.metadata_by_model.len(), 3);

    let product = find(&response.objects, "Product");
    assert_eq!(product.relationships.global.len(), 1);
    assert!(product.attributes.is_empty());
}

#[test]
fn layer_filter_drops_objects_without_visible_instances_in_that_layer() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let catalog = seed_catalog(&ctx);

    let hidden = ctx
        .objects()
        .list_model_objects_for_object(catalog.product.id)
        .unwrap()
        .into_iter()
        .find(|mo| mo.model_id == catalog.family.logical.id)
        .unwrap();
    ctx.objects()
        .update_model_object(
            hidden.id,
            &ModelObjectPatch {
                is_visible: Some(false),
                ..ModelObjectPatch::default()
            },
        )
        .unwrap();

    let logical_only = LakeFilters {
        layer: Some(Layer::Logical),
        ..LakeFilters::default()
    };
    let response = ctx.lake().query_object_lake(&logical_only).unwrap();
    assert_eq!(response.objects.len(), 1);
    let user = &response.objects[0];
    assert_eq!(user.object.id, catalog.user.id);
    assert_eq!(user.model_instances.len(), 1);
    assert_eq!(user.stats.model_instance_count, 1);
    assert!(user
        .attributes
        .iter()
        .all(|attr| attr.metadata_by_model.len() == 1));

    let with_hidden = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            include_hidden: true,
            ..logical_only
        })
        .unwrap();
    assert_eq!(with_hidden.objects.len(), 2);

    let unfiltered = ctx
        .lake()
        .query_object_lake(&LakeFilters::default())
        .unwrap();
    let product = find(&unfiltered.objects, "Product");
    assert_eq!(product.model_instances.len(), 2);
    assert!(product
        .model_instances
        .iter()
        .all(|instance| instance.instance.is_visible));
}

#[test]
fn lake_filters_by_search_attributes_and_relationship_type() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    seed_catalog(&ctx);

    let search = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            search: Some("  pRoD ".to_string()),
            ..LakeFilters::default()
        })
        .unwrap();
    assert_eq!(search.objects.len(), 1);
    assert_eq!(search.applied_filters.search.as_deref(), Some("pRoD"));

    let with_attributes = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            has_attributes: Some(true),
            ..LakeFilters::default()
        })
        .unwrap();
    assert_eq!(with_attributes.objects.len(), 1);
    assert_eq!(with_attributes.objects[0].object.name, "User");

    let many_to_many = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            relationship_type: Some(Cardinality::ManyToMany),
            ..LakeFilters::default()
        })
        .unwrap();
    assert!(many_to_many.objects.is_empty());

    let one_to_many = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            relationship_type: Some(Cardinality::OneToMany),
            ..LakeFilters::default()
        })
        .unwrap();
    assert_eq!(one_to_many.objects.len(), 2);
}

#[test]
fn lake_sorts_and_paginates_with_id_tie_break() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn).with_page_limits(PageLimits {
        default_page_size: 2,
        max_page_size: 3,
    });
    let reg = seed_registry(&ctx, "Data Lake");
    let staging = staging_model(&ctx, &reg, Layer::Conceptual);
    for name in ["delta", "Alpha", "charlie", "Bravo", "alpha"] {
        scoped_object(&ctx, &reg, &staging, name);
    }

    let first = ctx
        .lake()
        .query_object_lake(&LakeFilters::default())
        .unwrap();
    assert_eq!(first.meta.page_size, 2);
    assert_eq!(first.meta.total_count, 5);
    assert!(first.meta.has_more);
    let names = first
        .objects
        .iter()
        .map(|entry| entry.object.name.to_lowercase())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["alpha", "alpha"]);
    assert!(first.objects[0].object.id < first.objects[1].object.id);

    let last = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            page: 2,
            page_size: Some(99),
            sort_order: SortOrder::Desc,
            ..LakeFilters::default()
        })
        .unwrap();
    assert_eq!(last.meta.page_size, 3);
    assert!(!last.meta.has_more);
    let names = last
        .objects
        .iter()
        .map(|entry| entry.object.name.to_lowercase())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["alpha", "alpha"]);

    let by_count = ctx
        .lake()
        .query_object_lake(&LakeFilters {
            sort_by: LakeSortBy::AttributeCount,
            page_size: Some(3),
            ..LakeFilters::default()
        })
        .unwrap();
    let ids = by_count
        .objects
        .iter()
        .map(|entry| entry.object.id)
        .collect::<Vec<_>>();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn lake_carries_properties_per_level_and_never_writes() {
    let conn = open_db_in_memory().unwrap();
    let ctx = ServiceContext::new(&conn);
    let catalog = seed_catalog(&ctx);
    ctx.properties()
        .set_property(&PropertyWrite {
            entity: EntityRef::Object(catalog.user.id),
            model_id: None,
            property_name: "steward".to_string(),
            property_value: PropertyValue::String("ops".to_string()),
            property_type: "string".to_string(),
            layer: None,
        })
        .unwrap();

    let before = changes(&conn);
    let response = ctx
        .lake()
        .query_object_lake(&LakeFilters::default())
        .unwrap();
    assert_eq!(changes(&conn), before);

    let user = find(&response.objects, "User");
    assert_eq!(user.properties.len(), 1);
    assert_eq!(user.properties[0].property_name, "steward");
    assert!(find(&response.objects, "Product").properties.is_empty());

    let rendered = serde_json::to_value(&response).unwrap();
    assert!(rendered["objects"][0]["relationships"]["modelSpecific"].is_array());
    assert!(rendered["meta"]["generatedAt"].as_i64().unwrap() > 0);
}

fn changes(conn: &Connection) -> i64 {
    conn.query_row("SELECT total_changes();", [], |row| row.get(0))
        .unwrap()
}
