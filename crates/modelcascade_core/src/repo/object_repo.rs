//! Canonical object and model-instance persistence.
//!
//! # Responsibility
//! - CRUD over `data_objects` (one row per real-world entity).
//! - CRUD over `data_model_objects` (one row per object per model).
//!
//! # Invariants
//! - `(object_id, model_id)` is unique; duplicates surface as `Conflict`.
//! - Deleting rows here does not cascade; callers remove dependents first.

use crate::model::object::{DataModelObject, DataObject, InstancePlacement, NewDataObject};
use crate::model::{DataAreaId, DataModelId, DomainId, EntityKind, ModelObjectId, ObjectId, SystemId};
use crate::repo::{
    bool_to_int, conflict_on_unique, get_bool, get_json, get_opt_uuid, get_position, get_uuid,
    json_to_db, RepoError, RepoResult, NOW_MS_SQL,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

pub(crate) const OBJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    object_type,
    model_id,
    domain_id,
    data_area_id,
    source_system_id,
    target_system_id,
    position_x,
    position_y,
    metadata,
    created_at,
    updated_at
FROM data_objects";

pub(crate) const MODEL_OBJECT_SELECT_SQL: &str = "SELECT
    id,
    object_id,
    model_id,
    target_system_id,
    position_x,
    position_y,
    metadata,
    is_visible,
    layer_specific_config,
    created_at,
    updated_at
FROM data_model_objects";

/// Scope filter for canonical object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectScope {
    pub domain_id: Option<DomainId>,
    pub data_area_id: Option<DataAreaId>,
    pub target_system_id: Option<SystemId>,
}

/// Repository interface for canonical objects and their instances.
pub trait ObjectRepository {
    fn create_object(&self, input: &NewDataObject) -> RepoResult<DataObject>;
    fn get_object(&self, id: ObjectId) -> RepoResult<Option<DataObject>>;
    fn update_object(&self, object: &DataObject) -> RepoResult<()>;
    fn list_objects(&self, scope: &ObjectScope) -> RepoResult<Vec<DataObject>>;
    fn delete_object(&self, id: ObjectId) -> RepoResult<()>;
    /// Points the canonical object at a new defining model.
    fn set_object_model(&self, id: ObjectId, model_id: DataModelId) -> RepoResult<()>;

    fn create_model_object(
        &self,
        object_id: ObjectId,
        model_id: DataModelId,
        placement: &InstancePlacement,
    ) -> RepoResult<DataModelObject>;
    fn get_model_object(&self, id: ModelObjectId) -> RepoResult<Option<DataModelObject>>;
    fn find_model_object(
        &self,
        object_id: ObjectId,
        model_id: DataModelId,
    ) -> RepoResult<Option<DataModelObject>>;
    fn list_model_objects_for_object(&self, object_id: ObjectId)
        -> RepoResult<Vec<DataModelObject>>;
    fn list_model_objects_in_model(&self, model_id: DataModelId)
        -> RepoResult<Vec<DataModelObject>>;
    /// Finds the instance in `model_id` whose canonical object is named `name`.
    fn find_model_object_by_object_name(
        &self,
        model_id: DataModelId,
        name: &str,
    ) -> RepoResult<Option<DataModelObject>>;
    fn update_model_object(&self, instance: &DataModelObject) -> RepoResult<()>;
    /// Re-parents one instance into `model_id`, keeping its layer-local state.
    fn move_model_object(
        &self,
        id: ModelObjectId,
        model_id: DataModelId,
        target_system_id: Option<SystemId>,
    ) -> RepoResult<()>;
    fn delete_model_object(&self, id: ModelObjectId) -> RepoResult<()>;
}

/// SQLite-backed object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn collect_objects(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<DataObject>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_object_row(row)?);
        }
        Ok(items)
    }

    fn collect_instances(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<DataModelObject>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_model_object_row(row)?);
        }
        Ok(items)
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn create_object(&self, input: &NewDataObject) -> RepoResult<DataObject> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO data_objects (
                id,
                name,
                description,
                object_type,
                model_id,
                domain_id,
                data_area_id,
                source_system_id,
                target_system_id,
                position_x,
                position_y,
                metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                id.to_string(),
                input.name.trim(),
                input.description.as_deref(),
                input.object_type.as_deref(),
                input.model_id.to_string(),
                input.domain_id.map(|value| value.to_string()),
                input.data_area_id.map(|value| value.to_string()),
                input.source_system_id.map(|value| value.to_string()),
                input.target_system_id.map(|value| value.to_string()),
                input.position.map(|position| position.x),
                input.position.map(|position| position.y),
                json_to_db(input.metadata.as_ref()),
            ],
        )?;
        self.get_object(id)?
            .ok_or(RepoError::not_found(EntityKind::Object, id))
    }

    fn get_object(&self, id: ObjectId) -> RepoResult<Option<DataObject>> {
        Ok(self
            .collect_objects(&format!("{OBJECT_SELECT_SQL} WHERE id = ?1;"), [id.to_string()])?
            .into_iter()
            .next())
    }

    fn update_object(&self, object: &DataObject) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE data_objects
                 SET
                    name = ?2,
                    description = ?3,
                    object_type = ?4,
                    domain_id = ?5,
                    data_area_id = ?6,
                    source_system_id = ?7,
                    target_system_id = ?8,
                    position_x = ?9,
                    position_y = ?10,
                    metadata = ?11,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                object.id.to_string(),
                object.name.trim(),
                object.description.as_deref(),
                object.object_type.as_deref(),
                object.domain_id.map(|value| value.to_string()),
                object.data_area_id.map(|value| value.to_string()),
                object.source_system_id.map(|value| value.to_string()),
                object.target_system_id.map(|value| value.to_string()),
                object.position.map(|position| position.x),
                object.position.map(|position| position.y),
                json_to_db(object.metadata.as_ref()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Object, object.id));
        }
        Ok(())
    }

    fn set_object_model(&self, id: ObjectId, model_id: DataModelId) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE data_objects
                 SET model_id = ?2, updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id.to_string(), model_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Object, id));
        }
        Ok(())
    }

    fn list_objects(&self, scope: &ObjectScope) -> RepoResult<Vec<DataObject>> {
        let mut sql = format!("{OBJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(domain_id) = scope.domain_id {
            sql.push_str(" AND domain_id = ?");
            bind_values.push(Value::Text(domain_id.to_string()));
        }
        if let Some(data_area_id) = scope.data_area_id {
            sql.push_str(" AND data_area_id = ?");
            bind_values.push(Value::Text(data_area_id.to_string()));
        }
        if let Some(system_id) = scope.target_system_id {
            sql.push_str(" AND target_system_id = ?");
            bind_values.push(Value::Text(system_id.to_string()));
        }
        sql.push_str(" ORDER BY name ASC, id ASC");

        self.collect_objects(&sql, params_from_iter(bind_values))
    }

    fn delete_object(&self, id: ObjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM data_objects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Object, id));
        }
        Ok(())
    }

    fn create_model_object(
        &self,
        object_id: ObjectId,
        model_id: DataModelId,
        placement: &InstancePlacement,
    ) -> RepoResult<DataModelObject> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO data_model_objects (
                    id,
                    object_id,
                    model_id,
                    target_system_id,
                    position_x,
                    position_y,
                    metadata,
                    is_visible,
                    layer_specific_config
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    id.to_string(),
                    object_id.to_string(),
                    model_id.to_string(),
                    placement.target_system_id.map(|value| value.to_string()),
                    placement.position.map(|position| position.x),
                    placement.position.map(|position| position.y),
                    json_to_db(placement.metadata.as_ref()),
                    bool_to_int(placement.is_visible),
                    json_to_db(placement.layer_specific_config.as_ref()),
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || {
                    format!("object {object_id} already has an instance in model {model_id}")
                })
            })?;
        self.get_model_object(id)?
            .ok_or(RepoError::not_found(EntityKind::ModelObject, id))
    }

    fn get_model_object(&self, id: ModelObjectId) -> RepoResult<Option<DataModelObject>> {
        Ok(self
            .collect_instances(
                &format!("{MODEL_OBJECT_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn find_model_object(
        &self,
        object_id: ObjectId,
        model_id: DataModelId,
    ) -> RepoResult<Option<DataModelObject>> {
        Ok(self
            .collect_instances(
                &format!("{MODEL_OBJECT_SELECT_SQL} WHERE object_id = ?1 AND model_id = ?2;"),
                [object_id.to_string(), model_id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn list_model_objects_for_object(
        &self,
        object_id: ObjectId,
    ) -> RepoResult<Vec<DataModelObject>> {
        self.collect_instances(
            &format!("{MODEL_OBJECT_SELECT_SQL} WHERE object_id = ?1 ORDER BY created_at ASC, id ASC;"),
            [object_id.to_string()],
        )
    }

    fn list_model_objects_in_model(
        &self,
        model_id: DataModelId,
    ) -> RepoResult<Vec<DataModelObject>> {
        self.collect_instances(
            &format!("{MODEL_OBJECT_SELECT_SQL} WHERE model_id = ?1 ORDER BY created_at ASC, id ASC;"),
            [model_id.to_string()],
        )
    }

    fn find_model_object_by_object_name(
        &self,
        model_id: DataModelId,
        name: &str,
    ) -> RepoResult<Option<DataModelObject>> {
        Ok(self
            .collect_instances(
                "SELECT
                    mo.id AS id,
                    mo.object_id AS object_id,
                    mo.model_id AS model_id,
                    mo.target_system_id AS target_system_id,
                    mo.position_x AS position_x,
                    mo.position_y AS position_y,
                    mo.metadata AS metadata,
                    mo.is_visible AS is_visible,
                    mo.layer_specific_config AS layer_specific_config,
                    mo.created_at AS created_at,
                    mo.updated_at AS updated_at
                 FROM data_model_objects mo
                 INNER JOIN data_objects o ON o.id = mo.object_id
                 WHERE mo.model_id = ?1
                   AND lower(o.name) = lower(?2)
                 ORDER BY mo.created_at ASC, mo.id ASC
                 LIMIT 1;",
                [model_id.to_string(), name.trim().to_string()],
            )?
            .into_iter()
            .next())
    }

    fn update_model_object(&self, instance: &DataModelObject) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE data_model_objects
                 SET
                    target_system_id = ?2,
                    position_x = ?3,
                    position_y = ?4,
                    metadata = ?5,
                    is_visible = ?6,
                    layer_specific_config = ?7,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                instance.id.to_string(),
                instance.target_system_id.map(|value| value.to_string()),
                instance.position.map(|position| position.x),
                instance.position.map(|position| position.y),
                json_to_db(instance.metadata.as_ref()),
                bool_to_int(instance.is_visible),
                json_to_db(instance.layer_specific_config.as_ref()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::ModelObject, instance.id));
        }
        Ok(())
    }

    fn move_model_object(
        &self,
        id: ModelObjectId,
        model_id: DataModelId,
        target_system_id: Option<SystemId>,
    ) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE data_model_objects
                     SET
                        model_id = ?2,
                        target_system_id = ?3,
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![
                    id.to_string(),
                    model_id.to_string(),
                    target_system_id.map(|value| value.to_string()),
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || {
                    format!("instance {id} cannot move: object already bound into model {model_id}")
                })
            })?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::ModelObject, id));
        }
        Ok(())
    }

    fn delete_model_object(&self, id: ModelObjectId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM data_model_objects WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::ModelObject, id));
        }
        Ok(())
    }
}

pub(crate) fn parse_object_row(row: &Row<'_>) -> RepoResult<DataObject> {
    Ok(DataObject {
        id: get_uuid(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        object_type: row.get("object_type")?,
        model_id: get_uuid(row, "model_id")?,
        domain_id: get_opt_uuid(row, "domain_id")?,
        data_area_id: get_opt_uuid(row, "data_area_id")?,
        source_system_id: get_opt_uuid(row, "source_system_id")?,
        target_system_id: get_opt_uuid(row, "target_system_id")?,
        position: get_position(row)?,
        metadata: get_json(row, "metadata")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_model_object_row(row: &Row<'_>) -> RepoResult<DataModelObject> {
    Ok(DataModelObject {
        id: get_uuid(row, "id")?,
        object_id: get_uuid(row, "object_id")?,
        model_id: get_uuid(row, "model_id")?,
        target_system_id: get_opt_uuid(row, "target_system_id")?,
        position: get_position(row)?,
        metadata: get_json(row, "metadata")?,
        is_visible: get_bool(row, "is_visible")?,
        layer_specific_config: get_json(row, "layer_specific_config")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
