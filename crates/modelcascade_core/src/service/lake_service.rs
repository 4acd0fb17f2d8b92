//! Object Lake aggregation.
//!
//! # Responsibility
//! - Compose one cross-layer read view per canonical object: instances,
//!   attributes with per-model overrides, relationships and properties.
//! - Apply filters, sorting and pagination over the composed set.
//!
//! # Invariants
//! - Read-only; never opens a write transaction.
//! - Missing optional relations render as `None` or empty lists.
//! - `stats` counts are computed after instance filtering.
//! - Sort ties break by object id ascending.

use crate::error::ServiceResult;
use crate::model::attribute::{Attribute, DataModelAttribute};
use crate::model::data_model::DataModel;
use crate::model::layer::Layer;
use crate::model::object::{DataModelObject, DataObject};
use crate::model::property::{EntityType, Property};
use crate::model::registry::{DataArea, Domain, System};
use crate::model::relationship::{Cardinality, GlobalRelationship, ModelObjectRelationship};
use crate::model::{DataAreaId, DataModelId, DomainId, ModelObjectId, ObjectId, SystemId};
use crate::repo::lake_repo::{LakeObjectQuery, LakeReader};
use crate::service::ServiceContext;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LakeSortBy {
    #[default]
    Name,
    UpdatedAt,
    AttributeCount,
    RelationshipCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Object Lake query filters.
///
/// Every field is optional on the wire; the response echoes the normalized
/// copy as `appliedFilters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LakeFilters {
    /// Case-insensitive substring match on name or description.
    pub search: Option<String>,
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    pub system_id: Option<SystemId>,
    pub model_id: Option<DataModelId>,
    pub layer: Option<Layer>,
    pub object_type: Option<String>,
    pub has_attributes: Option<bool>,
    pub relationship_type: Option<Cardinality>,
    pub include_hidden: bool,
    pub sort_by: LakeSortBy,
    pub sort_order: SortOrder,
    /// 1-based; `0` reads as the first page.
    pub page: u32,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeModelInstance {
    #[serde(flatten)]
    pub instance: DataModelObject,
    pub model: Option<DataModel>,
    pub relationships: Vec<ModelObjectRelationship>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeAttribute {
    #[serde(flatten)]
    pub attribute: Attribute,
    /// Per-model overrides, restricted to the instances kept in the view.
    pub metadata_by_model: BTreeMap<DataModelId, DataModelAttribute>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeRelationships {
    pub global: Vec<GlobalRelationship>,
    pub model_specific: Vec<ModelObjectRelationship>,
}

impl LakeRelationships {
    pub fn len(&self) -> usize {
        self.global.len() + self.model_specific.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_cardinality(&self, cardinality: Cardinality) -> bool {
        self.global
            .iter()
            .any(|rel| rel.relationship_type == cardinality)
            || self
                .model_specific
                .iter()
                .any(|rel| rel.relationship_type == cardinality)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeStats {
    pub attribute_count: usize,
    pub relationship_count: usize,
    pub model_instance_count: usize,
    pub last_updated: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLakeObject {
    #[serde(flatten)]
    pub object: DataObject,
    pub domain: Option<Domain>,
    pub data_area: Option<DataArea>,
    pub source_system: Option<System>,
    pub target_system: Option<System>,
    pub base_model: Option<DataModel>,
    pub model_instances: Vec<LakeModelInstance>,
    pub attributes: Vec<LakeAttribute>,
    pub relationships: LakeRelationships,
    pub stats: LakeStats,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeMeta {
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
    pub total_count: usize,
    /// Epoch milliseconds.
    pub generated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLakeResponse {
    pub objects: Vec<ObjectLakeObject>,
    pub applied_filters: LakeFilters,
    pub meta: LakeMeta,
}

pub struct LakeService<'conn> {
    ctx: ServiceContext<'conn>,
}

impl<'conn> LakeService<'conn> {
    pub fn new(ctx: ServiceContext<'conn>) -> Self {
        Self { ctx }
    }

    /// Builds one page of the Object Lake view.
    ///
    /// Each record family is loaded with its own bulk statement, so a
    /// response may mix points in time under concurrent writes.
    pub fn query_object_lake(&self, filters: &LakeFilters) -> ServiceResult<ObjectLakeResponse> {
        let started_at = Instant::now();
        let applied = self.normalize(filters);
        let reader = LakeReader::new(self.ctx.conn());

        let mut objects = reader.objects(&LakeObjectQuery {
            domain_id: applied.domain_id,
            data_area_id: applied.data_area_id,
            system_id: applied.system_id,
            model_id: applied.model_id,
            object_type: applied.object_type.clone(),
        })?;
        if let Some(needle) = applied.search.as_deref().map(str::to_lowercase) {
            objects.retain(|object| matches_search(object, &needle));
        }

        let snapshot = LakeSnapshot::load(&reader, &objects)?;
        let mut composed = objects
            .into_iter()
            .filter_map(|object| snapshot.compose(object, &applied))
            .collect::<Vec<_>>();
        sort_objects(&mut composed, applied.sort_by, applied.sort_order);

        let total_count = composed.len();
        let page_size = applied.page_size.unwrap_or(self.ctx.page_limits().default_page_size);
        let offset = (applied.page as usize - 1).saturating_mul(page_size as usize);
        let page_objects = composed
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect::<Vec<_>>();

        let meta = LakeMeta {
            page: applied.page,
            page_size,
            has_more: total_count > (applied.page as usize).saturating_mul(page_size as usize),
            total_count,
            generated_at: now_epoch_ms(),
        };
        debug!(
            "event=lake_query module=service status=ok duration_ms={} total={} returned={} page={}",
            started_at.elapsed().as_millis(),
            total_count,
            page_objects.len(),
            meta.page
        );

        Ok(ObjectLakeResponse {
            objects: page_objects,
            applied_filters: applied,
            meta,
        })
    }

    fn normalize(&self, filters: &LakeFilters) -> LakeFilters {
        let trimmed = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        LakeFilters {
            search: trimmed(&filters.search),
            object_type: trimmed(&filters.object_type),
            page: filters.page.max(1),
            page_size: Some(self.ctx.page_limits().normalize(filters.page_size)),
            ..filters.clone()
        }
    }
}

/// Every record family needed to compose the view for a set of objects.
struct LakeSnapshot {
    instances_by_object: HashMap<ObjectId, Vec<DataModelObject>>,
    models: HashMap<DataModelId, DataModel>,
    attributes_by_object: HashMap<ObjectId, Vec<Attribute>>,
    bindings_by_attribute: HashMap<Uuid, Vec<DataModelAttribute>>,
    global_by_object: HashMap<ObjectId, Vec<GlobalRelationship>>,
    model_rels_by_instance: HashMap<ModelObjectId, Vec<ModelObjectRelationship>>,
    properties: HashMap<(EntityType, Uuid), Vec<Property>>,
    domains: HashMap<DomainId, Domain>,
    data_areas: HashMap<DataAreaId, DataArea>,
    systems: HashMap<SystemId, System>,
}

impl LakeSnapshot {
    fn load(reader: &LakeReader<'_>, objects: &[DataObject]) -> ServiceResult<Self> {
        let object_ids = objects.iter().map(|object| object.id).collect::<Vec<_>>();

        let instances = reader.model_objects_for_objects(&object_ids)?;
        let instance_ids = instances.iter().map(|mo| mo.id).collect::<Vec<_>>();
        let model_ids = unique(
            instances
                .iter()
                .map(|mo| mo.model_id)
                .chain(objects.iter().map(|object| object.model_id)),
        );

        let attributes = reader.attributes_for_objects(&object_ids)?;
        let attribute_ids = attributes.iter().map(|attr| attr.id).collect::<Vec<_>>();
        let bindings = reader.model_attributes_for_attributes(&attribute_ids)?;

        let mut properties: HashMap<(EntityType, Uuid), Vec<Property>> = HashMap::new();
        for (entity_type, ids) in [
            (EntityType::Object, &object_ids),
            (EntityType::ModelObject, &instance_ids),
            (EntityType::Attribute, &attribute_ids),
        ] {
            for property in reader.properties(entity_type, ids)? {
                properties
                    .entry((entity_type, property.entity.entity_id()))
                    .or_default()
                    .push(property);
            }
        }

        let domain_ids = unique(objects.iter().filter_map(|object| object.domain_id));
        let area_ids = unique(objects.iter().filter_map(|object| object.data_area_id));
        let system_ids = unique(objects.iter().flat_map(|object| {
            [object.source_system_id, object.target_system_id]
                .into_iter()
                .flatten()
        }));

        Ok(Self {
            global_by_object: group_by_endpoints(
                reader.global_relationships(&object_ids)?,
                |rel| (rel.source_object_id, rel.target_object_id),
            ),
            model_rels_by_instance: group_by_endpoints(
                reader.model_relationships(&instance_ids)?,
                |rel| (rel.source_model_object_id, rel.target_model_object_id),
            ),
            instances_by_object: group_by(instances, |mo| mo.object_id),
            models: index_by(reader.models(&model_ids)?, |model| model.id),
            attributes_by_object: group_by(attributes, |attr| attr.object_id),
            bindings_by_attribute: group_by(bindings, |binding| binding.attribute_id),
            properties,
            domains: index_by(reader.domains(&domain_ids)?, |domain| domain.id),
            data_areas: index_by(reader.data_areas(&area_ids)?, |area| area.id),
            systems: index_by(reader.systems(&system_ids)?, |system| system.id),
        })
    }

    fn properties_of(&self, entity_type: EntityType, id: Uuid) -> Vec<Property> {
        self.properties
            .get(&(entity_type, id))
            .cloned()
            .unwrap_or_default()
    }

    /// Composes one object, or `None` when post-load filters reject it.
    fn compose(&self, object: DataObject, filters: &LakeFilters) -> Option<ObjectLakeObject> {
        let instances = self
            .instances_by_object
            .get(&object.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|mo| filters.include_hidden || mo.is_visible)
            .filter(|mo| match filters.layer {
                Some(layer) => self
                    .models
                    .get(&mo.model_id)
                    .is_some_and(|model| model.layer == layer),
                None => true,
            })
            .collect::<Vec<_>>();
        if filters.layer.is_some() && instances.is_empty() {
            return None;
        }

        let mut model_specific = Vec::new();
        let mut seen_model_rels = HashSet::new();
        let model_instances = instances
            .iter()
            .map(|mo| {
                let relationships = self
                    .model_rels_by_instance
                    .get(&mo.id)
                    .cloned()
                    .unwrap_or_default();
                for rel in &relationships {
                    if seen_model_rels.insert(rel.id) {
                        model_specific.push(rel.clone());
                    }
                }
                LakeModelInstance {
                    instance: (*mo).clone(),
                    model: self.models.get(&mo.model_id).cloned(),
                    relationships,
                    properties: self.properties_of(EntityType::ModelObject, mo.id),
                }
            })
            .collect::<Vec<_>>();

        let kept_models = instances
            .iter()
            .map(|mo| mo.model_id)
            .collect::<HashSet<_>>();
        let attributes = self
            .attributes_by_object
            .get(&object.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|attribute| LakeAttribute {
                metadata_by_model: self
                    .bindings_by_attribute
                    .get(&attribute.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .filter(|binding| kept_models.contains(&binding.model_id))
                    .map(|binding| (binding.model_id, binding.clone()))
                    .collect(),
                properties: self.properties_of(EntityType::Attribute, attribute.id),
                attribute: attribute.clone(),
            })
            .collect::<Vec<_>>();

        let relationships = LakeRelationships {
            global: self
                .global_by_object
                .get(&object.id)
                .cloned()
                .unwrap_or_default(),
            model_specific,
        };

        if let Some(wanted) = filters.has_attributes {
            if wanted == attributes.is_empty() {
                return None;
            }
        }
        if let Some(cardinality) = filters.relationship_type {
            if !relationships.has_cardinality(cardinality) {
                return None;
            }
        }

        let last_updated = attributes
            .iter()
            .map(|attr| attr.attribute.updated_at)
            .chain(instances.iter().map(|mo| mo.updated_at))
            .fold(object.updated_at, i64::max);
        let stats = LakeStats {
            attribute_count: attributes.len(),
            relationship_count: relationships.len(),
            model_instance_count: model_instances.len(),
            last_updated,
        };

        Some(ObjectLakeObject {
            domain: object.domain_id.and_then(|id| self.domains.get(&id).cloned()),
            data_area: object
                .data_area_id
                .and_then(|id| self.data_areas.get(&id).cloned()),
            source_system: object
                .source_system_id
                .and_then(|id| self.systems.get(&id).cloned()),
            target_system: object
                .target_system_id
                .and_then(|id| self.systems.get(&id).cloned()),
            base_model: self.models.get(&object.model_id).cloned(),
            properties: self.properties_of(EntityType::Object, object.id),
            model_instances,
            attributes,
            relationships,
            stats,
            object,
        })
    }
}

fn matches_search(object: &DataObject, needle: &str) -> bool {
    object.name.to_lowercase().contains(needle)
        || object
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(needle))
}

fn sort_objects(objects: &mut [ObjectLakeObject], sort_by: LakeSortBy, order: SortOrder) {
    objects.sort_by(|left, right| {
        let primary = match sort_by {
            LakeSortBy::Name => left
                .object
                .name
                .to_lowercase()
                .cmp(&right.object.name.to_lowercase()),
            LakeSortBy::UpdatedAt => left.stats.last_updated.cmp(&right.stats.last_updated),
            LakeSortBy::AttributeCount => {
                left.stats.attribute_count.cmp(&right.stats.attribute_count)
            }
            LakeSortBy::RelationshipCount => left
                .stats
                .relationship_count
                .cmp(&right.stats.relationship_count),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        match primary {
            Ordering::Equal => left.object.id.cmp(&right.object.id),
            other => other,
        }
    });
}

fn unique(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

fn group_by<T>(items: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for item in items {
        grouped.entry(key(&item)).or_default().push(item);
    }
    grouped
}

/// Groups edges under both endpoints; a self-edge is listed once.
fn group_by_endpoints<T: Clone>(
    items: Vec<T>,
    endpoints: impl Fn(&T) -> (Uuid, Uuid),
) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for item in items {
        let (source, target) = endpoints(&item);
        if source != target {
            grouped.entry(target).or_default().push(item.clone());
        }
        grouped.entry(source).or_default().push(item);
    }
    grouped
}

fn index_by<T>(items: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{group_by_endpoints, matches_search, LakeFilters, LakeSortBy, SortOrder};
    use crate::model::object::DataObject;
    use serde_json::json;
    use uuid::Uuid;

    fn object(name: &str, description: Option<&str>) -> DataObject {
        DataObject {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            object_type: None,
            model_id: Uuid::new_v4(),
            domain_id: None,
            data_area_id: None,
            source_system_id: None,
            target_system_id: None,
            position: None,
            metadata: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn search_matches_name_or_description_case_insensitively() {
        assert!(matches_search(&object("Customer", None), "tom"));
        assert!(matches_search(
            &object("Party", Some("Every Customer record")),
            "customer"
        ));
        assert!(!matches_search(&object("Order", Some("sales")), "customer"));
    }

    #[test]
    fn edges_are_grouped_under_both_endpoints_once() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let grouped = group_by_endpoints(vec![(a, b), (b, c), (c, c)], |edge| *edge);
        assert_eq!(grouped[&a], vec![(a, b)]);
        assert_eq!(grouped[&b], vec![(a, b), (b, c)]);
        assert_eq!(grouped[&c], vec![(b, c), (c, c)]);
    }

    #[test]
    fn filters_deserialize_with_defaults() {
        let filters: LakeFilters =
            serde_json::from_value(json!({ "layer": "logical", "sortOrder": "desc" }))
                .expect("filters should parse");
        assert_eq!(filters.sort_by, LakeSortBy::Name);
        assert_eq!(filters.sort_order, SortOrder::Desc);
        assert!(!filters.include_hidden);
        assert_eq!(filters.page, 0);
    }
}
