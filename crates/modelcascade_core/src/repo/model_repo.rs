//! Data model persistence and family lookups.
//!
//! # Invariants
//! - Conceptual models never carry a parent.
//! - Family members are found by `parent_model_id` + `layer`, never by
//!   following in-memory links.

use crate::model::data_model::{DataModel, NewDataModel};
use crate::model::layer::Layer;
use crate::model::{DataModelId, EntityKind};
use crate::repo::{get_opt_uuid, get_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

pub(crate) const MODEL_SELECT_SQL: &str = "SELECT
    id,
    name,
    layer,
    parent_model_id,
    target_system_id,
    domain_id,
    data_area_id,
    created_at,
    updated_at
FROM data_models";

/// Repository interface for data models.
pub trait ModelRepository {
    fn create_model(&self, input: &NewDataModel) -> RepoResult<DataModel>;
    fn get_model(&self, id: DataModelId) -> RepoResult<Option<DataModel>>;
    fn list_models(&self, layer: Option<Layer>) -> RepoResult<Vec<DataModel>>;
    /// Lists the conceptual root followed by its children, ordered by layer.
    fn list_family(&self, root_id: DataModelId) -> RepoResult<Vec<DataModel>>;
    /// Finds the model of `layer` whose parent is `root_id`.
    fn find_family_member(&self, root_id: DataModelId, layer: Layer)
        -> RepoResult<Option<DataModel>>;
    /// Finds models of `layer` whose name equals `name` case-insensitively.
    fn find_by_name(&self, name: &str, layer: Layer) -> RepoResult<Vec<DataModel>>;
}

/// SQLite-backed model repository.
pub struct SqliteModelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteModelRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<DataModel>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_model_row(row)?);
        }
        Ok(items)
    }
}

impl ModelRepository for SqliteModelRepository<'_> {
    fn create_model(&self, input: &NewDataModel) -> RepoResult<DataModel> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO data_models (
                id,
                name,
                layer,
                parent_model_id,
                target_system_id,
                domain_id,
                data_area_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id.to_string(),
                input.name.trim(),
                input.layer.as_str(),
                input.parent_model_id.map(|value| value.to_string()),
                input.target_system_id.map(|value| value.to_string()),
                input.domain_id.map(|value| value.to_string()),
                input.data_area_id.map(|value| value.to_string()),
            ],
        )?;
        self.get_model(id)?
            .ok_or(RepoError::not_found(EntityKind::Model, id))
    }

    fn get_model(&self, id: DataModelId) -> RepoResult<Option<DataModel>> {
        Ok(self
            .collect(
                &format!("{MODEL_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn list_models(&self, layer: Option<Layer>) -> RepoResult<Vec<DataModel>> {
        match layer {
            Some(layer) => self.collect(
                &format!("{MODEL_SELECT_SQL} WHERE layer = ?1 ORDER BY name ASC, id ASC;"),
                [layer.as_str()],
            ),
            None => self.collect(&format!("{MODEL_SELECT_SQL} ORDER BY name ASC, id ASC;"), []),
        }
    }

    fn list_family(&self, root_id: DataModelId) -> RepoResult<Vec<DataModel>> {
        self.collect(
            &format!(
                "{MODEL_SELECT_SQL}
                 WHERE id = ?1 OR parent_model_id = ?1
                 ORDER BY CASE layer
                     WHEN 'conceptual' THEN 0
                     WHEN 'logical' THEN 1
                     ELSE 2
                 END ASC, id ASC;"
            ),
            [root_id.to_string()],
        )
    }

    fn find_family_member(
        &self,
        root_id: DataModelId,
        layer: Layer,
    ) -> RepoResult<Option<DataModel>> {
        Ok(self
            .collect(
                &format!(
                    "{MODEL_SELECT_SQL}
                     WHERE parent_model_id = ?1 AND layer = ?2
                     ORDER BY created_at ASC, id ASC
                     LIMIT 1;"
                ),
                params![root_id.to_string(), layer.as_str()],
            )?
            .into_iter()
            .next())
    }

    fn find_by_name(&self, name: &str, layer: Layer) -> RepoResult<Vec<DataModel>> {
        self.collect(
            &format!(
                "{MODEL_SELECT_SQL}
                 WHERE lower(name) = lower(?1) AND layer = ?2
                 ORDER BY created_at ASC, id ASC;"
            ),
            params![name.trim(), layer.as_str()],
        )
    }
}

pub(crate) fn parse_model_row(row: &Row<'_>) -> RepoResult<DataModel> {
    let layer_text: String = row.get("layer")?;
    let layer = Layer::parse(&layer_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid layer `{layer_text}` in data_models.layer"))
    })?;

    Ok(DataModel {
        id: get_uuid(row, "id")?,
        name: row.get("name")?,
        layer,
        parent_model_id: get_opt_uuid(row, "parent_model_id")?,
        target_system_id: get_opt_uuid(row, "target_system_id")?,
        domain_id: get_opt_uuid(row, "domain_id")?,
        data_area_id: get_opt_uuid(row, "data_area_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
