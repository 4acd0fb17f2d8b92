//! Fire-and-forget change notifications for cache invalidation.
//!
//! # Invariants
//! - Events are published only after the owning transaction commits.
//! - Delivery is at-most-once; sinks must not fail the caller.

use crate::model::layer::Layer;
use crate::model::EntityKind;
use log::debug;
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl ChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    pub layer: Option<Layer>,
    pub action: ChangeAction,
}

impl DomainEvent {
    pub fn new(kind: EntityKind, entity_id: Uuid, action: ChangeAction) -> Self {
        Self {
            kind,
            entity_id,
            layer: None,
            action,
        }
    }

    pub fn in_layer(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }
}

/// Receiver of committed change events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &DomainEvent) {}
}

/// Keeps published events in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything published so far, in order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

pub(crate) fn publish_all(sink: &dyn EventSink, events: Vec<DomainEvent>) {
    for event in &events {
        debug!(
            "event=domain_event module=events status=published kind={} action={} layer={}",
            event.kind,
            event.action.as_str(),
            event.layer.map_or("none", Layer::as_str)
        );
        sink.publish(event);
    }
}
