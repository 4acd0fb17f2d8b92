//! Core engine for three-layer data modeling.
//! This crate is the single source of truth for cascade and family invariants.

pub mod cascade;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cascade::type_mapping::{
    conceptual_to_logical, default_length, logical_to_physical, split_type_length,
};
pub use cascade::{cascade_types, derive_layer_type, DerivedType, LayerTypes};
pub use config::{ConfigError, CoreConfig, PageLimits};
pub use db::{open_db, open_db_in_memory, open_db_with_timeout, DbError, DbResult};
pub use error::{ServiceError, ServiceResult};
pub use events::{ChangeAction, DomainEvent, EventSink, NoopEventSink, RecordingEventSink};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogSettings,
    LoggingError,
};
pub use model::layer::Layer;
pub use model::EntityKind;
pub use repo::{RepoError, RepoResult};
pub use service::attribute_service::{
    AttributeService, BulkEnhanceReport, CascadeOutcome, EnhanceResult, UpdatedAttribute,
};
pub use service::family_service::{FamilyCounts, FamilyCreated, FamilySeed, FamilyService};
pub use service::lake_service::{
    LakeFilters, LakeService, LakeSortBy, ObjectLakeObject, ObjectLakeResponse, SortOrder,
};
pub use service::object_service::{CreatedObject, ObjectService};
pub use service::property_service::PropertyService;
pub use service::registry_service::RegistryService;
pub use service::relationship_service::RelationshipService;
pub use service::ServiceContext;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
