//! Read-only bulk loaders backing the Object Lake view.
//!
//! # Responsibility
//! - Load each record family for a set of objects in a bounded number of
//!   `IN (...)` queries instead of one query per object.
//!
//! # Invariants
//! - Never writes.
//! - Id lists are split into chunks of at most `ID_CHUNK_SIZE` binds per
//!   placeholder group, keeping statements under SQLite's variable limit.
//! - Each loader is an independent statement; callers get no snapshot across
//!   loaders.

use crate::model::attribute::{Attribute, DataModelAttribute};
use crate::model::data_model::DataModel;
use crate::model::object::{DataModelObject, DataObject};
use crate::model::property::{EntityType, Property};
use crate::model::registry::{DataArea, Domain, System};
use crate::model::relationship::{GlobalRelationship, ModelObjectRelationship};
use crate::model::{
    AttributeId, DataAreaId, DataModelId, DomainId, ModelObjectId, ObjectId, SystemId,
};
use crate::repo::attribute_repo::{
    parse_attribute_row, parse_model_attribute_row, ATTRIBUTE_SELECT_SQL,
    MODEL_ATTRIBUTE_SELECT_SQL,
};
use crate::repo::model_repo::{parse_model_row, MODEL_SELECT_SQL};
use crate::repo::object_repo::{
    parse_model_object_row, parse_object_row, MODEL_OBJECT_SELECT_SQL, OBJECT_SELECT_SQL,
};
use crate::repo::property_repo::{parse_property_row, PROPERTY_SELECT_SQL};
use crate::repo::registry_repo::{
    parse_data_area_row, parse_domain_row, parse_system_row, DATA_AREA_SELECT_SQL,
    DOMAIN_SELECT_SQL, SYSTEM_SELECT_SQL,
};
use crate::repo::relationship_repo::{
    parse_global_row, parse_model_relationship_row, GLOBAL_SELECT_SQL, MODEL_REL_SELECT_SQL,
};
use crate::repo::{placeholders, RepoResult, ID_CHUNK_SIZE};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::HashSet;
use uuid::Uuid;

/// Filters that can be pushed down into the object query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LakeObjectQuery {
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    /// Matches either the source or the target system.
    pub system_id: Option<SystemId>,
    /// Restricts to objects with an instance in this model.
    pub model_id: Option<DataModelId>,
    /// Case-insensitive exact match.
    pub object_type: Option<String>,
}

/// Read-only loader over one connection.
pub struct LakeReader<'conn> {
    conn: &'conn Connection,
}

impl<'conn> LakeReader<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn objects(&self, query: &LakeObjectQuery) -> RepoResult<Vec<DataObject>> {
        let mut sql = format!("{OBJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(domain_id) = query.domain_id {
            sql.push_str(" AND domain_id = ?");
            bind_values.push(Value::Text(domain_id.to_string()));
        }
        if let Some(data_area_id) = query.data_area_id {
            sql.push_str(" AND data_area_id = ?");
            bind_values.push(Value::Text(data_area_id.to_string()));
        }
        if let Some(system_id) = query.system_id {
            sql.push_str(" AND (target_system_id = ? OR source_system_id = ?)");
            bind_values.push(Value::Text(system_id.to_string()));
            bind_values.push(Value::Text(system_id.to_string()));
        }
        if let Some(model_id) = query.model_id {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1 FROM data_model_objects mo
                    WHERE mo.object_id = data_objects.id AND mo.model_id = ?
                )",
            );
            bind_values.push(Value::Text(model_id.to_string()));
        }
        if let Some(object_type) = query
            .object_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            sql.push_str(" AND lower(object_type) = lower(?)");
            bind_values.push(Value::Text(object_type.to_string()));
        }
        sql.push_str(" ORDER BY id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_object_row(row)?);
        }
        Ok(items)
    }

    pub fn model_objects_for_objects(
        &self,
        object_ids: &[ObjectId],
    ) -> RepoResult<Vec<DataModelObject>> {
        self.load_chunked(
            object_ids,
            |marks| {
                format!("{MODEL_OBJECT_SELECT_SQL} WHERE object_id IN ({marks}) ORDER BY created_at ASC, id ASC;")
            },
            1,
            parse_model_object_row,
        )
    }

    pub fn models(&self, model_ids: &[DataModelId]) -> RepoResult<Vec<DataModel>> {
        self.load_chunked(
            model_ids,
            |marks| format!("{MODEL_SELECT_SQL} WHERE id IN ({marks});"),
            1,
            parse_model_row,
        )
    }

    pub fn attributes_for_objects(&self, object_ids: &[ObjectId]) -> RepoResult<Vec<Attribute>> {
        self.load_chunked(
            object_ids,
            |marks| {
                format!(
                    "{ATTRIBUTE_SELECT_SQL} WHERE object_id IN ({marks})
                     ORDER BY order_index ASC, name ASC, id ASC;"
                )
            },
            1,
            parse_attribute_row,
        )
    }

    pub fn model_attributes_for_attributes(
        &self,
        attribute_ids: &[AttributeId],
    ) -> RepoResult<Vec<DataModelAttribute>> {
        self.load_chunked(
            attribute_ids,
            |marks| {
                format!(
                    "{MODEL_ATTRIBUTE_SELECT_SQL} WHERE attribute_id IN ({marks})
                     ORDER BY created_at ASC, id ASC;"
                )
            },
            1,
            parse_model_attribute_row,
        )
    }

    /// Global relationships touching any of `object_ids`, deduplicated by id.
    pub fn global_relationships(
        &self,
        object_ids: &[ObjectId],
    ) -> RepoResult<Vec<GlobalRelationship>> {
        let rows = self.load_chunked(
            object_ids,
            |marks| {
                format!(
                    "{GLOBAL_SELECT_SQL}
                     WHERE source_object_id IN ({marks}) OR target_object_id IN ({marks})
                     ORDER BY created_at ASC, id ASC;"
                )
            },
            2,
            parse_global_row,
        )?;
        let mut seen = HashSet::new();
        Ok(rows.into_iter().filter(|rel| seen.insert(rel.id)).collect())
    }

    /// Model-specific relationships touching any of `model_object_ids`,
    /// deduplicated by id.
    pub fn model_relationships(
        &self,
        model_object_ids: &[ModelObjectId],
    ) -> RepoResult<Vec<ModelObjectRelationship>> {
        let rows = self.load_chunked(
            model_object_ids,
            |marks| {
                format!(
                    "{MODEL_REL_SELECT_SQL}
                     WHERE source_model_object_id IN ({marks})
                        OR target_model_object_id IN ({marks})
                     ORDER BY created_at ASC, id ASC;"
                )
            },
            2,
            parse_model_relationship_row,
        )?;
        let mut seen = HashSet::new();
        Ok(rows.into_iter().filter(|rel| seen.insert(rel.id)).collect())
    }

    pub fn properties(&self, entity_type: EntityType, entity_ids: &[Uuid]) -> RepoResult<Vec<Property>> {
        let type_tag = entity_type.as_str();
        self.load_chunked(
            entity_ids,
            |marks| {
                format!(
                    "{PROPERTY_SELECT_SQL}
                     WHERE entity_type = '{type_tag}' AND entity_id IN ({marks})
                     ORDER BY property_name ASC, id ASC;"
                )
            },
            1,
            parse_property_row,
        )
    }

    pub fn domains(&self, ids: &[DomainId]) -> RepoResult<Vec<Domain>> {
        self.load_chunked(
            ids,
            |marks| format!("{DOMAIN_SELECT_SQL} WHERE id IN ({marks});"),
            1,
            parse_domain_row,
        )
    }

    pub fn data_areas(&self, ids: &[DataAreaId]) -> RepoResult<Vec<DataArea>> {
        self.load_chunked(
            ids,
            |marks| format!("{DATA_AREA_SELECT_SQL} WHERE id IN ({marks});"),
            1,
            parse_data_area_row,
        )
    }

    pub fn systems(&self, ids: &[SystemId]) -> RepoResult<Vec<System>> {
        self.load_chunked(
            ids,
            |marks| format!("{SYSTEM_SELECT_SQL} WHERE id IN ({marks});"),
            1,
            parse_system_row,
        )
    }

    /// Runs `sql_for(marks)` once per chunk of `ids`, binding the chunk
    /// `groups` times (one per `IN (...)` group in the statement).
    fn load_chunked<T>(
        &self,
        ids: &[Uuid],
        sql_for: impl Fn(&str) -> String,
        groups: usize,
        parse: fn(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        let mut items = Vec::new();
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let sql = sql_for(&placeholders(chunk.len()));
            let binds = (0..groups)
                .flat_map(|_| chunk.iter().map(|id| Value::Text(id.to_string())))
                .collect::<Vec<_>>();
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(binds))?;
            while let Some(row) = rows.next()? {
                items.push(parse(row)?);
            }
        }
        Ok(items)
    }
}
