//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own transaction scope: every multi-row mutation runs in one IMMEDIATE
//!   transaction and commits all rows or none.
//! - Publish domain events after commit.
//!
//! # Invariants
//! - Services are stateless per call; the only shared state is the database.
//! - Validation and existence checks run inside the write transaction,
//!   before the first write.

pub mod attribute_service;
pub mod family_service;
pub mod lake_service;
pub mod object_service;
pub mod property_service;
pub mod registry_service;
pub mod relationship_service;

use crate::config::PageLimits;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{publish_all, DomainEvent, EventSink, NoopEventSink};
use crate::model::{DataAreaId, DomainId, EntityKind, SystemId};
use crate::repo::registry_repo::{RegistryRepository, SqliteRegistryRepository};
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;
use std::time::Instant;

use attribute_service::AttributeService;
use family_service::FamilyService;
use lake_service::LakeService;
use object_service::ObjectService;
use property_service::PropertyService;
use registry_service::RegistryService;
use relationship_service::RelationshipService;

/// Connection plus event sink shared by every service.
///
/// Each request-handling worker builds its own context over its own
/// connection.
#[derive(Clone)]
pub struct ServiceContext<'conn> {
    conn: &'conn Connection,
    events: Arc<dyn EventSink>,
    page_limits: PageLimits,
}

impl<'conn> ServiceContext<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            events: Arc::new(NoopEventSink),
            page_limits: PageLimits::default(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_page_limits(mut self, page_limits: PageLimits) -> Self {
        self.page_limits = page_limits;
        self
    }

    pub fn registry(&self) -> RegistryService<'conn> {
        RegistryService::new(self.clone())
    }

    pub fn objects(&self) -> ObjectService<'conn> {
        ObjectService::new(self.clone())
    }

    pub fn families(&self) -> FamilyService<'conn> {
        FamilyService::new(self.clone())
    }

    pub fn attributes(&self) -> AttributeService<'conn> {
        AttributeService::new(self.clone())
    }

    pub fn relationships(&self) -> RelationshipService<'conn> {
        RelationshipService::new(self.clone())
    }

    pub fn properties(&self) -> PropertyService<'conn> {
        PropertyService::new(self.clone())
    }

    pub fn lake(&self) -> LakeService<'conn> {
        LakeService::new(self.clone())
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }

    pub(crate) fn page_limits(&self) -> PageLimits {
        self.page_limits
    }

    /// Runs `op` in one IMMEDIATE transaction and publishes the events it
    /// collected once the commit succeeds.
    ///
    /// Any error returned by `op` drops the transaction, rolling back every
    /// write it made.
    pub(crate) fn write<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&Connection, &mut Vec<DomainEvent>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut events = Vec::new();

        let value = match op(&*tx, &mut events) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "event={} module=service status=rolled_back duration_ms={} error={}",
                    operation,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        tx.commit().map_err(ServiceError::commit_failed)?;

        debug!(
            "event={} module=service status=ok duration_ms={} events={}",
            operation,
            started_at.elapsed().as_millis(),
            events.len()
        );
        publish_all(self.events.as_ref(), events);
        Ok(value)
    }
}

/// Rejects blank names with `ValidationFailed`.
pub(crate) fn require_name(value: &str, field: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Checks that every given registry reference exists, and that the data area
/// belongs to the domain when both are given.
pub(crate) fn require_registry_refs(
    conn: &Connection,
    domain_id: Option<DomainId>,
    data_area_id: Option<DataAreaId>,
    system_ids: &[Option<SystemId>],
) -> ServiceResult<()> {
    let registry = SqliteRegistryRepository::new(conn);
    if let Some(domain_id) = domain_id {
        registry
            .get_domain(domain_id)?
            .ok_or(ServiceError::not_found(EntityKind::Domain, domain_id))?;
    }
    if let Some(data_area_id) = data_area_id {
        let area = registry
            .get_data_area(data_area_id)?
            .ok_or(ServiceError::not_found(EntityKind::DataArea, data_area_id))?;
        if let Some(domain_id) = domain_id {
            if area.domain_id != domain_id {
                return Err(ServiceError::validation(format!(
                    "data area {data_area_id} does not belong to domain {domain_id}"
                )));
            }
        }
    }
    for system_id in system_ids.iter().flatten() {
        registry
            .get_system(*system_id)?
            .ok_or(ServiceError::not_found(EntityKind::System, *system_id))?;
    }
    Ok(())
}
