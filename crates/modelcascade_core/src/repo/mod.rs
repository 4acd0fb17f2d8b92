//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories never open transactions; services own transaction scope
//!   and hand repositories the transaction's connection.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod attribute_repo;
pub mod lake_repo;
pub mod model_repo;
pub mod object_repo;
pub mod property_repo;
pub mod registry_repo;
pub mod relationship_repo;

use crate::db::DbError;
use crate::model::object::Position;
use crate::model::EntityKind;
use rusqlite::{ErrorCode, Row};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

/// SQL expression for the current epoch-millisecond timestamp.
pub(crate) const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

/// Maps a UNIQUE constraint failure to `Conflict`, passing other errors on.
pub(crate) fn conflict_on_unique(err: rusqlite::Error, message: impl FnOnce() -> String) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == ErrorCode::ConstraintViolation
            && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            return RepoError::Conflict(message());
        }
    }
    err.into()
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn get_uuid(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let value: String = row.get(column)?;
    parse_uuid(&value, column)
}

pub(crate) fn get_opt_uuid(row: &Row<'_>, column: &'static str) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|value| parse_uuid(&value, column))
        .transpose()
}

pub(crate) fn get_bool(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn get_opt_bool(row: &Row<'_>, column: &'static str) -> RepoResult<Option<bool>> {
    match row.get::<_, Option<i64>>(column)? {
        None => Ok(None),
        Some(0) => Ok(Some(false)),
        Some(1) => Ok(Some(true)),
        Some(other) => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn get_json(row: &Row<'_>, column: &'static str) -> RepoResult<Option<JsonValue>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| {
            serde_json::from_str(&text)
                .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
        })
        .transpose()
}

pub(crate) fn get_position(row: &Row<'_>) -> RepoResult<Option<Position>> {
    let x: Option<f64> = row.get("position_x")?;
    let y: Option<f64> = row.get("position_y")?;
    Ok(match (x, y) {
        (Some(x), Some(y)) => Some(Position { x, y }),
        _ => None,
    })
}

pub(crate) fn json_to_db(value: Option<&JsonValue>) -> Option<String> {
    value.map(JsonValue::to_string)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Builds `?, ?, ?` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Upper bound on ids bound into one `IN (...)` list.
pub(crate) const ID_CHUNK_SIZE: usize = 400;
