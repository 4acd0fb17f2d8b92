//! Reference registry persistence (domains, data areas, systems).
//!
//! # Invariants
//! - A data area always belongs to an existing domain.
//! - Domain and system names are unique; data area names are unique per domain.

use crate::model::registry::{DataArea, Domain, NewDataArea, NewDomain, NewSystem, System};
use crate::model::{DataAreaId, DomainId, EntityKind, SystemId};
use crate::repo::{conflict_on_unique, get_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

pub(crate) const DOMAIN_SELECT_SQL: &str =
    "SELECT id, name, description, color_hex, created_at, updated_at FROM domains";
pub(crate) const DATA_AREA_SELECT_SQL: &str =
    "SELECT id, domain_id, name, description, color_hex, created_at, updated_at FROM data_areas";
pub(crate) const SYSTEM_SELECT_SQL: &str =
    "SELECT id, name, category, system_type, description, created_at, updated_at FROM systems";

/// Repository interface for reference registries.
pub trait RegistryRepository {
    fn create_domain(&self, input: &NewDomain) -> RepoResult<Domain>;
    fn get_domain(&self, id: DomainId) -> RepoResult<Option<Domain>>;
    fn list_domains(&self) -> RepoResult<Vec<Domain>>;
    fn create_data_area(&self, input: &NewDataArea) -> RepoResult<DataArea>;
    fn get_data_area(&self, id: DataAreaId) -> RepoResult<Option<DataArea>>;
    fn list_data_areas(&self, domain_id: Option<DomainId>) -> RepoResult<Vec<DataArea>>;
    fn create_system(&self, input: &NewSystem) -> RepoResult<System>;
    fn get_system(&self, id: SystemId) -> RepoResult<Option<System>>;
    fn find_system_by_name(&self, name: &str) -> RepoResult<Option<System>>;
    fn list_systems(&self) -> RepoResult<Vec<System>>;
}

/// SQLite-backed registry repository.
pub struct SqliteRegistryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_rows<T>(
        &self,
        sql: &str,
        key: Option<&str>,
        parse: fn(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match key {
            Some(key) => stmt.query([key])?,
            None => stmt.query([])?,
        };
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse(row)?);
        }
        Ok(items)
    }

    fn query_one<T>(
        &self,
        sql: &str,
        key: &str,
        parse: fn(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Option<T>> {
        Ok(self.query_rows(sql, Some(key), parse)?.into_iter().next())
    }
}

impl RegistryRepository for SqliteRegistryRepository<'_> {
    fn create_domain(&self, input: &NewDomain) -> RepoResult<Domain> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO domains (id, name, description, color_hex) VALUES (?1, ?2, ?3, ?4);",
                params![
                    id.to_string(),
                    input.name.trim(),
                    input.description.as_deref(),
                    input.color_hex.as_deref(),
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || format!("domain `{}` already exists", input.name))
            })?;
        self.get_domain(id)?
            .ok_or(RepoError::not_found(EntityKind::Domain, id))
    }

    fn get_domain(&self, id: DomainId) -> RepoResult<Option<Domain>> {
        self.query_one(
            &format!("{DOMAIN_SELECT_SQL} WHERE id = ?1;"),
            &id.to_string(),
            parse_domain_row,
        )
    }

    fn list_domains(&self) -> RepoResult<Vec<Domain>> {
        self.query_rows(
            &format!("{DOMAIN_SELECT_SQL} ORDER BY name ASC, id ASC;"),
            None,
            parse_domain_row,
        )
    }

    fn create_data_area(&self, input: &NewDataArea) -> RepoResult<DataArea> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO data_areas (id, domain_id, name, description, color_hex)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    id.to_string(),
                    input.domain_id.to_string(),
                    input.name.trim(),
                    input.description.as_deref(),
                    input.color_hex.as_deref(),
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || {
                    format!("data area `{}` already exists in domain", input.name)
                })
            })?;
        self.get_data_area(id)?
            .ok_or(RepoError::not_found(EntityKind::DataArea, id))
    }

    fn get_data_area(&self, id: DataAreaId) -> RepoResult<Option<DataArea>> {
        self.query_one(
            &format!("{DATA_AREA_SELECT_SQL} WHERE id = ?1;"),
            &id.to_string(),
            parse_data_area_row,
        )
    }

    fn list_data_areas(&self, domain_id: Option<DomainId>) -> RepoResult<Vec<DataArea>> {
        match domain_id {
            Some(domain_id) => self.query_rows(
                &format!("{DATA_AREA_SELECT_SQL} WHERE domain_id = ?1 ORDER BY name ASC, id ASC;"),
                Some(&domain_id.to_string()),
                parse_data_area_row,
            ),
            None => self.query_rows(
                &format!("{DATA_AREA_SELECT_SQL} ORDER BY name ASC, id ASC;"),
                None,
                parse_data_area_row,
            ),
        }
    }

    fn create_system(&self, input: &NewSystem) -> RepoResult<System> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO systems (id, name, category, system_type, description)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    id.to_string(),
                    input.name.trim(),
                    non_blank_or(&input.category, "other"),
                    non_blank_or(&input.system_type, "database"),
                    input.description.as_deref(),
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || format!("system `{}` already exists", input.name))
            })?;
        self.get_system(id)?
            .ok_or(RepoError::not_found(EntityKind::System, id))
    }

    fn get_system(&self, id: SystemId) -> RepoResult<Option<System>> {
        self.query_one(
            &format!("{SYSTEM_SELECT_SQL} WHERE id = ?1;"),
            &id.to_string(),
            parse_system_row,
        )
    }

    fn find_system_by_name(&self, name: &str) -> RepoResult<Option<System>> {
        self.query_one(
            &format!("{SYSTEM_SELECT_SQL} WHERE lower(name) = lower(?1) ORDER BY id ASC LIMIT 1;"),
            name.trim(),
            parse_system_row,
        )
    }

    fn list_systems(&self) -> RepoResult<Vec<System>> {
        self.query_rows(
            &format!("{SYSTEM_SELECT_SQL} ORDER BY name ASC, id ASC;"),
            None,
            parse_system_row,
        )
    }
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}

pub(crate) fn parse_domain_row(row: &Row<'_>) -> RepoResult<Domain> {
    Ok(Domain {
        id: get_uuid(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        color_hex: row.get("color_hex")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_data_area_row(row: &Row<'_>) -> RepoResult<DataArea> {
    Ok(DataArea {
        id: get_uuid(row, "id")?,
        domain_id: get_uuid(row, "domain_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        color_hex: row.get("color_hex")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_system_row(row: &Row<'_>) -> RepoResult<System> {
    Ok(System {
        id: get_uuid(row, "id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        system_type: row.get("system_type")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
