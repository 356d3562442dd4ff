//! Structured repository events and the sinks that receive them.
//!
//! Each repository is handed an `Arc<dyn EventSink>` at construction and
//! reports cache traffic, writes and integrity gaps through it.

use std::sync::{Arc, Mutex};

use crate::db::UnitOfWorkState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEvent {
    /// A read served from memory
    CacheHit { entity: &'static str, id: i32 },
    /// A read that had to reach the store
    CacheMiss { entity: &'static str, id: i32 },
    /// A bulk read from the store
    Loaded { entity: &'static str, count: usize },
    Saved { entity: &'static str, id: i32 },
    Updated { entity: &'static str, id: i32 },
    Deleted { entity: &'static str, id: i32 },
    /// A save reported as absent instead of failing
    WriteRejected { entity: &'static str, reason: String },
    UnitOfWork {
        operation: String,
        state: UnitOfWorkState,
    },
    /// A join row whose player no longer exists; dropped from the result
    DanglingReference { race_id: i32, player_id: i32 },
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: &RepositoryEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn shared() -> Arc<dyn EventSink> {
        Arc::new(Self)
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, event: &RepositoryEvent) {
        match event {
            RepositoryEvent::CacheHit { entity, id } => {
                tracing::trace!(entity, id, "Cache hit");
            }
            RepositoryEvent::CacheMiss { entity, id } => {
                tracing::debug!(entity, id, "Cache miss");
            }
            RepositoryEvent::Loaded { entity, count } => {
                tracing::debug!(entity, count, "Loaded rows from store");
            }
            RepositoryEvent::Saved { entity, id } => {
                tracing::info!(entity, id, "Saved");
            }
            RepositoryEvent::Updated { entity, id } => {
                tracing::info!(entity, id, "Updated");
            }
            RepositoryEvent::Deleted { entity, id } => {
                tracing::info!(entity, id, "Deleted");
            }
            RepositoryEvent::WriteRejected { entity, reason } => {
                tracing::info!(entity, reason = %reason, "Write rejected");
            }
            RepositoryEvent::UnitOfWork { operation, state } => {
                tracing::debug!(operation = %operation, state = %state, "Unit of work");
            }
            RepositoryEvent::DanglingReference { race_id, player_id } => {
                tracing::warn!(race_id, player_id, "Dropping reference to missing player");
            }
        }
    }
}

/// Keeps every event in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RepositoryEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RepositoryEvent> {
        self.lock().clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&RepositoryEvent) -> bool) -> usize {
        self.lock().iter().filter(|event| predicate(event)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RepositoryEvent>> {
        // A panicking recorder cannot leave the Vec half-written
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &RepositoryEvent) {
        self.lock().push(event.clone());
    }
}
