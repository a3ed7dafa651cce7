//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{EventService, VersionService};
use crate::store::{MemoryPermissionStore, MemoryVersionStore, PermissionStore, VersionStore};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event CRUD and sharing.
    pub event_service: Arc<EventService>,
    /// History, diff, changelog and rollback.
    pub version_service: Arc<VersionService>,
}

impl AppState {
    /// Wires both services over the given stores.
    #[must_use]
    pub fn new(versions: Arc<dyn VersionStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self {
            event_service: Arc::new(EventService::new(
                Arc::clone(&versions),
                Arc::clone(&permissions),
            )),
            version_service: Arc::new(VersionService::new(versions, permissions)),
        }
    }

    /// State backed by fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryVersionStore::new()),
            Arc::new(MemoryPermissionStore::new()),
        )
    }
}
