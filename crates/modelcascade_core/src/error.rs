//! Service-level error taxonomy.
//!
//! # Invariants
//! - `NotFound` and `ValidationFailed` are raised before any write.
//! - `TransactionFailed` means the whole operation was rolled back.
//! - Unresolved attribute cascades are values, never errors.

use crate::db::DbError;
use crate::model::EntityKind;
use crate::repo::RepoError;
use thiserror::Error;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("transaction failed (retryable={retryable}): {source}")]
    TransactionFailed {
        retryable: bool,
        #[source]
        source: DbError,
    },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl ServiceError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Commit failures are always worth a retry from the caller's side.
    pub(crate) fn commit_failed(err: rusqlite::Error) -> Self {
        Self::TransactionFailed {
            retryable: true,
            source: DbError::Sqlite(err),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed {
                retryable: true,
                ..
            }
        )
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Conflict(message) => Self::ValidationFailed(message),
            RepoError::InvalidData(message) => Self::InvalidData(message),
            RepoError::Db(source) => Self::TransactionFailed {
                retryable: source.is_busy(),
                source,
            },
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::model::EntityKind;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_keeps_kind_and_id() {
        let id = Uuid::new_v4();
        let err = ServiceError::from(RepoError::not_found(EntityKind::Attribute, id));
        assert!(matches!(
            err,
            ServiceError::NotFound { kind: EntityKind::Attribute, id: found } if found == id
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_maps_to_validation_failure() {
        let err = ServiceError::from(RepoError::Conflict("duplicate".to_string()));
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
    }

    #[test]
    fn commit_failures_are_retryable() {
        let err = ServiceError::commit_failed(rusqlite::Error::InvalidQuery);
        assert!(err.is_retryable());
    }
}
