//! Polymorphic property persistence.
//!
//! # Invariants
//! - One row per `(entity_type, entity_id, model_id, property_name, layer)`;
//!   `NULL` model/layer participate in the key as "unset".
//! - Values are stored as adjacently tagged JSON and decoded on read.

use crate::model::layer::Layer;
use crate::model::property::{EntityRef, EntityType, Property, PropertyValue, PropertyWrite};
use crate::model::{DataModelId, EntityKind, PropertyId};
use crate::repo::{get_opt_uuid, get_uuid, parse_uuid, RepoError, RepoResult, NOW_MS_SQL};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub(crate) const PROPERTY_SELECT_SQL: &str = "SELECT
    id,
    entity_type,
    entity_id,
    model_id,
    property_name,
    property_value,
    property_type,
    layer,
    created_at,
    updated_at
FROM properties";

/// Repository interface for entity annotations.
pub trait PropertyRepository {
    /// Inserts or replaces the value for the write's key; returns the stored row.
    fn upsert_property(&self, input: &PropertyWrite) -> RepoResult<Property>;
    fn get_property(&self, id: PropertyId) -> RepoResult<Option<Property>>;
    fn list_for_entity(&self, entity: EntityRef) -> RepoResult<Vec<Property>>;
    fn list_in_model(&self, model_id: DataModelId) -> RepoResult<Vec<Property>>;
    fn delete_property(&self, id: PropertyId) -> RepoResult<()>;
    /// Removes every property of one entity; returns rows removed.
    fn delete_for_entity(&self, entity: EntityRef) -> RepoResult<usize>;
}

/// SQLite-backed property repository.
pub struct SqlitePropertyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePropertyRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Property>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_property_row(row)?);
        }
        Ok(items)
    }
}

impl PropertyRepository for SqlitePropertyRepository<'_> {
    fn upsert_property(&self, input: &PropertyWrite) -> RepoResult<Property> {
        let entity_type = input.entity.entity_type().as_str();
        let entity_id = input.entity.entity_id().to_string();
        let model_id = input.model_id.map(|value| value.to_string());
        let layer = input.layer.map(Layer::as_str);
        let payload = encode_value(&input.property_value)?;

        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM properties
                 WHERE entity_type = ?1
                   AND entity_id = ?2
                   AND model_id IS ?3
                   AND property_name = ?4
                   AND layer IS ?5;",
                params![entity_type, entity_id, model_id, input.property_name.as_str(), layer],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(existing) => {
                self.conn.execute(
                    &format!(
                        "UPDATE properties
                         SET property_value = ?2,
                             property_type = ?3,
                             updated_at = {NOW_MS_SQL}
                         WHERE id = ?1;"
                    ),
                    params![existing, payload, input.property_type.as_str()],
                )?;
                parse_uuid(&existing, "id")?
            }
            None => {
                let id = Uuid::new_v4();
                self.conn.execute(
                    "INSERT INTO properties (
                        id,
                        entity_type,
                        entity_id,
                        model_id,
                        property_name,
                        property_value,
                        property_type,
                        layer
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                    params![
                        id.to_string(),
                        entity_type,
                        entity_id,
                        model_id,
                        input.property_name.as_str(),
                        payload,
                        input.property_type.as_str(),
                        layer,
                    ],
                )?;
                id
            }
        };

        self.get_property(id)?
            .ok_or(RepoError::not_found(EntityKind::Property, id))
    }

    fn get_property(&self, id: PropertyId) -> RepoResult<Option<Property>> {
        Ok(self
            .collect(
                &format!("{PROPERTY_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn list_for_entity(&self, entity: EntityRef) -> RepoResult<Vec<Property>> {
        self.collect(
            &format!(
                "{PROPERTY_SELECT_SQL}
                 WHERE entity_type = ?1 AND entity_id = ?2
                 ORDER BY property_name ASC, created_at ASC, id ASC;"
            ),
            params![
                entity.entity_type().as_str(),
                entity.entity_id().to_string()
            ],
        )
    }

    fn list_in_model(&self, model_id: DataModelId) -> RepoResult<Vec<Property>> {
        self.collect(
            &format!(
                "{PROPERTY_SELECT_SQL}
                 WHERE model_id = ?1
                 ORDER BY entity_type ASC, entity_id ASC, property_name ASC, id ASC;"
            ),
            [model_id.to_string()],
        )
    }

    fn delete_property(&self, id: PropertyId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM properties WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Property, id));
        }
        Ok(())
    }

    fn delete_for_entity(&self, entity: EntityRef) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM properties WHERE entity_type = ?1 AND entity_id = ?2;",
            params![
                entity.entity_type().as_str(),
                entity.entity_id().to_string()
            ],
        )?)
    }
}

fn encode_value(value: &PropertyValue) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("unencodable property value: {err}")))
}

pub(crate) fn parse_property_row(row: &Row<'_>) -> RepoResult<Property> {
    let entity_type_text: String = row.get("entity_type")?;
    let entity_type = EntityType::parse(&entity_type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid entity_type `{entity_type_text}` in properties.entity_type"
        ))
    })?;
    let layer = match row.get::<_, Option<String>>("layer")? {
        Some(text) => Some(Layer::parse(&text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid layer `{text}` in properties.layer"))
        })?),
        None => None,
    };
    let payload: String = row.get("property_value")?;
    let property_value = serde_json::from_str(&payload).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in properties.property_value: {err}"))
    })?;

    Ok(Property {
        id: get_uuid(row, "id")?,
        entity: EntityRef::new(entity_type, get_uuid(row, "entity_id")?),
        model_id: get_opt_uuid(row, "model_id")?,
        property_name: row.get("property_name")?,
        property_value,
        property_type: row.get("property_type")?,
        layer,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
