//! Global and model-specific relationship persistence.
//!
//! # Invariants
//! - Global and model-specific rows live in separate tables and are never
//!   merged; an id is looked up in the global table first.
//! - Endpoint validation happens in the service layer; this layer only
//!   persists what it is given.

use crate::model::relationship::{
    Cardinality, GlobalRelationship, ModelObjectRelationship, NewRelationship, Relationship,
    RelationshipEndpoints, RelationshipLevel,
};
use crate::model::{
    AttributeId, DataModelId, EntityKind, ModelAttributeId, ModelObjectId, ObjectId,
    RelationshipId,
};
use crate::repo::{get_json, get_opt_uuid, get_uuid, json_to_db, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

pub(crate) const GLOBAL_SELECT_SQL: &str = "SELECT
    id,
    source_object_id,
    target_object_id,
    relationship_level,
    source_attribute_id,
    target_attribute_id,
    relationship_type,
    name,
    description,
    created_at,
    updated_at
FROM relationships";

pub(crate) const MODEL_REL_SELECT_SQL: &str = "SELECT
    id,
    model_id,
    source_model_object_id,
    target_model_object_id,
    relationship_level,
    source_attribute_id,
    target_attribute_id,
    relationship_type,
    name,
    description,
    routing,
    created_at,
    updated_at
FROM model_object_relationships";

/// Repository interface for both relationship scopes.
pub trait RelationshipRepository {
    /// Persists into the table selected by the endpoint scope.
    fn create_relationship(&self, input: &NewRelationship) -> RepoResult<Relationship>;
    fn get_relationship(&self, id: RelationshipId) -> RepoResult<Option<Relationship>>;
    fn delete_relationship(&self, id: RelationshipId) -> RepoResult<()>;

    fn list_global_for_object(&self, object_id: ObjectId) -> RepoResult<Vec<GlobalRelationship>>;
    fn list_global_for_attribute(
        &self,
        attribute_id: AttributeId,
    ) -> RepoResult<Vec<GlobalRelationship>>;
    fn list_model_relationships(
        &self,
        model_id: DataModelId,
    ) -> RepoResult<Vec<ModelObjectRelationship>>;
    fn list_model_for_model_object(
        &self,
        model_object_id: ModelObjectId,
    ) -> RepoResult<Vec<ModelObjectRelationship>>;
    fn list_model_for_model_attribute(
        &self,
        model_attribute_id: ModelAttributeId,
    ) -> RepoResult<Vec<ModelObjectRelationship>>;

    /// Deletes every global row touching `object_id`; returns rows removed.
    fn delete_global_for_object(&self, object_id: ObjectId) -> RepoResult<usize>;
    fn delete_global_for_attribute(&self, attribute_id: AttributeId) -> RepoResult<usize>;
    fn delete_model_for_model_object(&self, model_object_id: ModelObjectId) -> RepoResult<usize>;
    fn delete_model_for_model_attribute(
        &self,
        model_attribute_id: ModelAttributeId,
    ) -> RepoResult<usize>;
}

/// SQLite-backed relationship repository.
pub struct SqliteRelationshipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRelationshipRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn collect_global(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<GlobalRelationship>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_global_row(row)?);
        }
        Ok(items)
    }

    fn collect_model(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<ModelObjectRelationship>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_model_relationship_row(row)?);
        }
        Ok(items)
    }

    fn get_global(&self, id: RelationshipId) -> RepoResult<Option<GlobalRelationship>> {
        Ok(self
            .collect_global(
                &format!("{GLOBAL_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn get_model(&self, id: RelationshipId) -> RepoResult<Option<ModelObjectRelationship>> {
        Ok(self
            .collect_model(
                &format!("{MODEL_REL_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }
}

impl RelationshipRepository for SqliteRelationshipRepository<'_> {
    fn create_relationship(&self, input: &NewRelationship) -> RepoResult<Relationship> {
        let id = Uuid::new_v4();
        let level = input.effective_level();
        match &input.endpoints {
            RelationshipEndpoints::Global {
                source_object_id,
                target_object_id,
                source_attribute_id,
                target_attribute_id,
            } => {
                self.conn.execute(
                    "INSERT INTO relationships (
                        id,
                        source_object_id,
                        target_object_id,
                        relationship_level,
                        source_attribute_id,
                        target_attribute_id,
                        relationship_type,
                        name,
                        description
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                    params![
                        id.to_string(),
                        source_object_id.to_string(),
                        target_object_id.to_string(),
                        level.as_str(),
                        source_attribute_id.map(|value| value.to_string()),
                        target_attribute_id.map(|value| value.to_string()),
                        input.relationship_type.as_str(),
                        input.name.as_deref(),
                        input.description.as_deref(),
                    ],
                )?;
                self.get_global(id)?
                    .map(Relationship::Global)
                    .ok_or(RepoError::not_found(EntityKind::Relationship, id))
            }
            RelationshipEndpoints::ModelSpecific {
                model_id,
                source_model_object_id,
                target_model_object_id,
                source_attribute_id,
                target_attribute_id,
                routing,
            } => {
                self.conn.execute(
                    "INSERT INTO model_object_relationships (
                        id,
                        model_id,
                        source_model_object_id,
                        target_model_object_id,
                        relationship_level,
                        source_attribute_id,
                        target_attribute_id,
                        relationship_type,
                        name,
                        description,
                        routing
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                    params![
                        id.to_string(),
                        model_id.to_string(),
                        source_model_object_id.to_string(),
                        target_model_object_id.to_string(),
                        level.as_str(),
                        source_attribute_id.map(|value| value.to_string()),
                        target_attribute_id.map(|value| value.to_string()),
                        input.relationship_type.as_str(),
                        input.name.as_deref(),
                        input.description.as_deref(),
                        json_to_db(routing.as_ref()),
                    ],
                )?;
                self.get_model(id)?
                    .map(Relationship::ModelSpecific)
                    .ok_or(RepoError::not_found(EntityKind::Relationship, id))
            }
        }
    }

    fn get_relationship(&self, id: RelationshipId) -> RepoResult<Option<Relationship>> {
        if let Some(global) = self.get_global(id)? {
            return Ok(Some(Relationship::Global(global)));
        }
        Ok(self.get_model(id)?.map(Relationship::ModelSpecific))
    }

    fn delete_relationship(&self, id: RelationshipId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM relationships WHERE id = ?1;", [id.to_string()])?;
        if changed > 0 {
            return Ok(());
        }
        let changed = self.conn.execute(
            "DELETE FROM model_object_relationships WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Relationship, id));
        }
        Ok(())
    }

    fn list_global_for_object(&self, object_id: ObjectId) -> RepoResult<Vec<GlobalRelationship>> {
        self.collect_global(
            &format!(
                "{GLOBAL_SELECT_SQL}
                 WHERE source_object_id = ?1 OR target_object_id = ?1
                 ORDER BY created_at ASC, id ASC;"
            ),
            [object_id.to_string()],
        )
    }

    fn list_global_for_attribute(
        &self,
        attribute_id: AttributeId,
    ) -> RepoResult<Vec<GlobalRelationship>> {
        self.collect_global(
            &format!(
                "{GLOBAL_SELECT_SQL}
                 WHERE source_attribute_id = ?1 OR target_attribute_id = ?1
                 ORDER BY created_at ASC, id ASC;"
            ),
            [attribute_id.to_string()],
        )
    }

    fn list_model_relationships(
        &self,
        model_id: DataModelId,
    ) -> RepoResult<Vec<ModelObjectRelationship>> {
        self.collect_model(
            &format!("{MODEL_REL_SELECT_SQL} WHERE model_id = ?1 ORDER BY created_at ASC, id ASC;"),
            [model_id.to_string()],
        )
    }

    fn list_model_for_model_object(
        &self,
        model_object_id: ModelObjectId,
    ) -> RepoResult<Vec<ModelObjectRelationship>> {
        self.collect_model(
            &format!(
                "{MODEL_REL_SELECT_SQL}
                 WHERE source_model_object_id = ?1 OR target_model_object_id = ?1
                 ORDER BY created_at ASC, id ASC;"
            ),
            [model_object_id.to_string()],
        )
    }

    fn list_model_for_model_attribute(
        &self,
        model_attribute_id: ModelAttributeId,
    ) -> RepoResult<Vec<ModelObjectRelationship>> {
        self.collect_model(
            &format!(
                "{MODEL_REL_SELECT_SQL}
                 WHERE source_attribute_id = ?1 OR target_attribute_id = ?1
                 ORDER BY created_at ASC, id ASC;"
            ),
            [model_attribute_id.to_string()],
        )
    }

    fn delete_global_for_object(&self, object_id: ObjectId) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM relationships WHERE source_object_id = ?1 OR target_object_id = ?1;",
            [object_id.to_string()],
        )?)
    }

    fn delete_global_for_attribute(&self, attribute_id: AttributeId) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM relationships WHERE source_attribute_id = ?1 OR target_attribute_id = ?1;",
            [attribute_id.to_string()],
        )?)
    }

    fn delete_model_for_model_object(&self, model_object_id: ModelObjectId) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM model_object_relationships
             WHERE source_model_object_id = ?1 OR target_model_object_id = ?1;",
            [model_object_id.to_string()],
        )?)
    }

    fn delete_model_for_model_attribute(
        &self,
        model_attribute_id: ModelAttributeId,
    ) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM model_object_relationships
             WHERE source_attribute_id = ?1 OR target_attribute_id = ?1;",
            [model_attribute_id.to_string()],
        )?)
    }
}

fn parse_level(row: &Row<'_>, table: &str) -> RepoResult<RelationshipLevel> {
    let value: String = row.get("relationship_level")?;
    RelationshipLevel::parse(&value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid relationship_level `{value}` in {table}"
        ))
    })
}

fn parse_cardinality(row: &Row<'_>, table: &str) -> RepoResult<Cardinality> {
    let value: String = row.get("relationship_type")?;
    Cardinality::parse(&value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid relationship_type `{value}` in {table}"))
    })
}

pub(crate) fn parse_global_row(row: &Row<'_>) -> RepoResult<GlobalRelationship> {
    Ok(GlobalRelationship {
        id: get_uuid(row, "id")?,
        source_object_id: get_uuid(row, "source_object_id")?,
        target_object_id: get_uuid(row, "target_object_id")?,
        relationship_level: parse_level(row, "relationships")?,
        source_attribute_id: get_opt_uuid(row, "source_attribute_id")?,
        target_attribute_id: get_opt_uuid(row, "target_attribute_id")?,
        relationship_type: parse_cardinality(row, "relationships")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_model_relationship_row(row: &Row<'_>) -> RepoResult<ModelObjectRelationship> {
    Ok(ModelObjectRelationship {
        id: get_uuid(row, "id")?,
        model_id: get_uuid(row, "model_id")?,
        source_model_object_id: get_uuid(row, "source_model_object_id")?,
        target_model_object_id: get_uuid(row, "target_model_object_id")?,
        relationship_level: parse_level(row, "model_object_relationships")?,
        source_attribute_id: get_opt_uuid(row, "source_attribute_id")?,
        target_attribute_id: get_opt_uuid(row, "target_attribute_id")?,
        relationship_type: parse_cardinality(row, "model_object_relationships")?,
        name: row.get("name")?,
        description: row.get("description")?,
        routing: get_json(row, "routing")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
