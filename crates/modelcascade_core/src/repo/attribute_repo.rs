//! Canonical attribute and model-attribute persistence.
//!
//! # Invariants
//! - `(attribute_id, model_object_id)` is unique; duplicates surface as
//!   `Conflict`.
//! - Attribute listing is deterministic: `order_index ASC, name ASC, id ASC`.

use crate::cascade::LayerTypes;
use crate::model::attribute::{Attribute, DataModelAttribute, NewAttribute, NewModelAttribute};
use crate::model::{
    AttributeId, DataModelId, EntityKind, ModelAttributeId, ModelObjectId, ObjectId,
};
use crate::repo::{
    bool_to_int, conflict_on_unique, get_bool, get_json, get_opt_bool, get_uuid, RepoError,
    RepoResult, NOW_MS_SQL,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

pub(crate) const ATTRIBUTE_SELECT_SQL: &str = "SELECT
    id,
    object_id,
    name,
    description,
    conceptual_type,
    logical_type,
    physical_type,
    length,
    nullable,
    is_primary_key,
    is_foreign_key,
    order_index,
    created_at,
    updated_at
FROM attributes";

pub(crate) const MODEL_ATTRIBUTE_SELECT_SQL: &str = "SELECT
    id,
    attribute_id,
    model_object_id,
    model_id,
    conceptual_type,
    logical_type,
    physical_type,
    length,
    nullable,
    is_primary_key,
    is_foreign_key,
    order_index,
    layer_specific_config,
    created_at,
    updated_at
FROM data_model_attributes";

/// Repository interface for attributes and their per-instance bindings.
pub trait AttributeRepository {
    fn create_attribute(&self, input: &NewAttribute) -> RepoResult<Attribute>;
    fn get_attribute(&self, id: AttributeId) -> RepoResult<Option<Attribute>>;
    fn list_attributes(&self, object_id: ObjectId) -> RepoResult<Vec<Attribute>>;
    fn update_attribute(&self, attribute: &Attribute) -> RepoResult<()>;
    fn delete_attribute(&self, id: AttributeId) -> RepoResult<()>;
    fn next_order_index(&self, object_id: ObjectId) -> RepoResult<i64>;

    fn create_model_attribute(&self, input: &NewModelAttribute) -> RepoResult<DataModelAttribute>;
    fn get_model_attribute(&self, id: ModelAttributeId) -> RepoResult<Option<DataModelAttribute>>;
    fn find_model_attribute(
        &self,
        attribute_id: AttributeId,
        model_object_id: ModelObjectId,
    ) -> RepoResult<Option<DataModelAttribute>>;
    /// Finds the binding under `model_object_id` whose canonical attribute is
    /// named `name`.
    fn find_model_attribute_by_name(
        &self,
        model_object_id: ModelObjectId,
        name: &str,
    ) -> RepoResult<Option<DataModelAttribute>>;
    fn list_model_attributes_for_model_object(
        &self,
        model_object_id: ModelObjectId,
    ) -> RepoResult<Vec<DataModelAttribute>>;
    fn list_model_attributes_for_attribute(
        &self,
        attribute_id: AttributeId,
    ) -> RepoResult<Vec<DataModelAttribute>>;
    /// Overwrites the per-layer types and length of one binding.
    fn set_model_attribute_types(&self, id: ModelAttributeId, types: &LayerTypes)
        -> RepoResult<()>;
    /// Re-parents every binding under `model_object_id` into `model_id`.
    fn move_model_attributes(
        &self,
        model_object_id: ModelObjectId,
        model_id: DataModelId,
    ) -> RepoResult<usize>;
    fn delete_model_attribute(&self, id: ModelAttributeId) -> RepoResult<()>;
}

/// SQLite-backed attribute repository.
pub struct SqliteAttributeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttributeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn collect_attributes(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Attribute>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_attribute_row(row)?);
        }
        Ok(items)
    }

    fn collect_bindings(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<DataModelAttribute>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_model_attribute_row(row)?);
        }
        Ok(items)
    }
}

impl AttributeRepository for SqliteAttributeRepository<'_> {
    fn create_attribute(&self, input: &NewAttribute) -> RepoResult<Attribute> {
        let id = Uuid::new_v4();
        let order_index = match input.order_index {
            Some(order_index) => order_index,
            None => self.next_order_index(input.object_id)?,
        };
        self.conn.execute(
            "INSERT INTO attributes (
                id,
                object_id,
                name,
                description,
                conceptual_type,
                logical_type,
                physical_type,
                length,
                nullable,
                is_primary_key,
                is_foreign_key,
                order_index
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                id.to_string(),
                input.object_id.to_string(),
                input.name.trim(),
                input.description.as_deref(),
                input.conceptual_type.as_deref(),
                input.logical_type.as_deref(),
                input.physical_type.as_deref(),
                input.length,
                bool_to_int(input.nullable),
                bool_to_int(input.is_primary_key),
                bool_to_int(input.is_foreign_key),
                order_index,
            ],
        )?;
        self.get_attribute(id)?
            .ok_or(RepoError::not_found(EntityKind::Attribute, id))
    }

    fn get_attribute(&self, id: AttributeId) -> RepoResult<Option<Attribute>> {
        Ok(self
            .collect_attributes(
                &format!("{ATTRIBUTE_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn list_attributes(&self, object_id: ObjectId) -> RepoResult<Vec<Attribute>> {
        self.collect_attributes(
            &format!(
                "{ATTRIBUTE_SELECT_SQL} WHERE object_id = ?1 ORDER BY order_index ASC, name ASC, id ASC;"
            ),
            [object_id.to_string()],
        )
    }

    fn update_attribute(&self, attribute: &Attribute) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE attributes
                 SET
                    name = ?2,
                    description = ?3,
                    conceptual_type = ?4,
                    logical_type = ?5,
                    physical_type = ?6,
                    length = ?7,
                    nullable = ?8,
                    is_primary_key = ?9,
                    is_foreign_key = ?10,
                    order_index = ?11,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                attribute.id.to_string(),
                attribute.name.trim(),
                attribute.description.as_deref(),
                attribute.conceptual_type.as_deref(),
                attribute.logical_type.as_deref(),
                attribute.physical_type.as_deref(),
                attribute.length,
                bool_to_int(attribute.nullable),
                bool_to_int(attribute.is_primary_key),
                bool_to_int(attribute.is_foreign_key),
                attribute.order_index,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Attribute, attribute.id));
        }
        Ok(())
    }

    fn delete_attribute(&self, id: AttributeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM attributes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Attribute, id));
        }
        Ok(())
    }

    fn next_order_index(&self, object_id: ObjectId) -> RepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), -1) + 1 FROM attributes WHERE object_id = ?1;",
            [object_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn create_model_attribute(&self, input: &NewModelAttribute) -> RepoResult<DataModelAttribute> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO data_model_attributes (
                    id,
                    attribute_id,
                    model_object_id,
                    model_id,
                    conceptual_type,
                    logical_type,
                    physical_type,
                    length,
                    nullable,
                    is_primary_key,
                    is_foreign_key,
                    order_index
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                params![
                    id.to_string(),
                    input.attribute_id.to_string(),
                    input.model_object_id.to_string(),
                    input.model_id.to_string(),
                    input.conceptual_type.as_deref(),
                    input.logical_type.as_deref(),
                    input.physical_type.as_deref(),
                    input.length,
                    input.nullable.map(bool_to_int),
                    input.is_primary_key.map(bool_to_int),
                    input.is_foreign_key.map(bool_to_int),
                    input.order_index,
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || {
                    format!(
                        "attribute {} already bound to model object {}",
                        input.attribute_id, input.model_object_id
                    )
                })
            })?;
        self.get_model_attribute(id)?
            .ok_or(RepoError::not_found(EntityKind::ModelAttribute, id))
    }

    fn get_model_attribute(&self, id: ModelAttributeId) -> RepoResult<Option<DataModelAttribute>> {
        Ok(self
            .collect_bindings(
                &format!("{MODEL_ATTRIBUTE_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn find_model_attribute(
        &self,
        attribute_id: AttributeId,
        model_object_id: ModelObjectId,
    ) -> RepoResult<Option<DataModelAttribute>> {
        Ok(self
            .collect_bindings(
                &format!(
                    "{MODEL_ATTRIBUTE_SELECT_SQL} WHERE attribute_id = ?1 AND model_object_id = ?2;"
                ),
                [attribute_id.to_string(), model_object_id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn find_model_attribute_by_name(
        &self,
        model_object_id: ModelObjectId,
        name: &str,
    ) -> RepoResult<Option<DataModelAttribute>> {
        Ok(self
            .collect_bindings(
                "SELECT
                    ma.id AS id,
                    ma.attribute_id AS attribute_id,
                    ma.model_object_id AS model_object_id,
                    ma.model_id AS model_id,
                    ma.conceptual_type AS conceptual_type,
                    ma.logical_type AS logical_type,
                    ma.physical_type AS physical_type,
                    ma.length AS length,
                    ma.nullable AS nullable,
                    ma.is_primary_key AS is_primary_key,
                    ma.is_foreign_key AS is_foreign_key,
                    ma.order_index AS order_index,
                    ma.layer_specific_config AS layer_specific_config,
                    ma.created_at AS created_at,
                    ma.updated_at AS updated_at
                 FROM data_model_attributes ma
                 INNER JOIN attributes a ON a.id = ma.attribute_id
                 WHERE ma.model_object_id = ?1
                   AND lower(a.name) = lower(?2)
                 ORDER BY ma.created_at ASC, ma.id ASC
                 LIMIT 1;",
                [model_object_id.to_string(), name.trim().to_string()],
            )?
            .into_iter()
            .next())
    }

    fn list_model_attributes_for_model_object(
        &self,
        model_object_id: ModelObjectId,
    ) -> RepoResult<Vec<DataModelAttribute>> {
        self.collect_bindings(
            &format!(
                "{MODEL_ATTRIBUTE_SELECT_SQL} WHERE model_object_id = ?1 ORDER BY order_index ASC, id ASC;"
            ),
            [model_object_id.to_string()],
        )
    }

    fn list_model_attributes_for_attribute(
        &self,
        attribute_id: AttributeId,
    ) -> RepoResult<Vec<DataModelAttribute>> {
        self.collect_bindings(
            &format!(
                "{MODEL_ATTRIBUTE_SELECT_SQL} WHERE attribute_id = ?1 ORDER BY created_at ASC, id ASC;"
            ),
            [attribute_id.to_string()],
        )
    }

    fn set_model_attribute_types(
        &self,
        id: ModelAttributeId,
        types: &LayerTypes,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE data_model_attributes
                 SET conceptual_type = ?2,
                     logical_type = ?3,
                     physical_type = ?4,
                     length = ?5,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id.to_string(),
                types.conceptual.as_deref(),
                types.logical.as_deref(),
                types.physical.as_deref(),
                types.length,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::ModelAttribute, id));
        }
        Ok(())
    }

    fn move_model_attributes(
        &self,
        model_object_id: ModelObjectId,
        model_id: DataModelId,
    ) -> RepoResult<usize> {
        Ok(self.conn.execute(
            &format!(
                "UPDATE data_model_attributes
                 SET model_id = ?2, updated_at = {NOW_MS_SQL}
                 WHERE model_object_id = ?1;"
            ),
            params![model_object_id.to_string(), model_id.to_string()],
        )?)
    }

    fn delete_model_attribute(&self, id: ModelAttributeId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM data_model_attributes WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::ModelAttribute, id));
        }
        Ok(())
    }
}

pub(crate) fn parse_attribute_row(row: &Row<'_>) -> RepoResult<Attribute> {
    Ok(Attribute {
        id: get_uuid(row, "id")?,
        object_id: get_uuid(row, "object_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        conceptual_type: row.get("conceptual_type")?,
        logical_type: row.get("logical_type")?,
        physical_type: row.get("physical_type")?,
        length: row.get("length")?,
        nullable: get_bool(row, "nullable")?,
        is_primary_key: get_bool(row, "is_primary_key")?,
        is_foreign_key: get_bool(row, "is_foreign_key")?,
        order_index: row.get("order_index")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_model_attribute_row(row: &Row<'_>) -> RepoResult<DataModelAttribute> {
    Ok(DataModelAttribute {
        id: get_uuid(row, "id")?,
        attribute_id: get_uuid(row, "attribute_id")?,
        model_object_id: get_uuid(row, "model_object_id")?,
        model_id: get_uuid(row, "model_id")?,
        conceptual_type: row.get("conceptual_type")?,
        logical_type: row.get("logical_type")?,
        physical_type: row.get("physical_type")?,
        length: row.get("length")?,
        nullable: get_opt_bool(row, "nullable")?,
        is_primary_key: get_opt_bool(row, "is_primary_key")?,
        is_foreign_key: get_opt_bool(row, "is_foreign_key")?,
        order_index: row.get("order_index")?,
        layer_specific_config: get_json(row, "layer_specific_config")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
