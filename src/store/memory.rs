//! In-memory stores with per-event fine-grained locking.
//!
//! [`MemoryVersionStore`] keeps each event's history in its own
//! `Arc<Mutex<Vec<EventSnapshot>>>` inside an outer `RwLock<HashMap<..>>`.
//! The per-event mutex is the serialization point for version allocation:
//! two `record` calls on the same event are strictly ordered, calls on
//! different events run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use super::{PermissionStore, VersionStore, next_version};
use crate::domain::{
    ActorId, ChangeType, EventId, EventSnapshot, NewSnapshot, PermissionLevel, VersionNumber,
};
use crate::error::GatewayError;

type History = Arc<Mutex<Vec<EventSnapshot>>>;

/// Version store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    histories: RwLock<HashMap<EventId, History>>,
}

impl MemoryVersionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the history slot for an event, creating it only for `create`.
    async fn slot(
        &self,
        event_id: EventId,
        change_type: ChangeType,
    ) -> Result<History, GatewayError> {
        if let Some(history) = self.histories.read().await.get(&event_id) {
            return Ok(Arc::clone(history));
        }
        if change_type != ChangeType::Create {
            return Err(GatewayError::EventNotFound(*event_id.as_uuid()));
        }
        let mut map = self.histories.write().await;
        Ok(Arc::clone(map.entry(event_id).or_default()))
    }

    async fn existing(&self, event_id: EventId) -> Result<History, GatewayError> {
        self.histories
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or(GatewayError::EventNotFound(*event_id.as_uuid()))
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn record(&self, new: NewSnapshot) -> Result<EventSnapshot, GatewayError> {
        let history = self.slot(new.event_id, new.change_type).await?;
        let mut versions = history.lock().await;

        let last = versions.last();
        let version = next_version(&new, last.map(|s| s.version_number))?;
        let now = Utc::now();
        let created_at = last.map_or(now, |s| s.created_at.max(now));

        let snapshot = new.into_snapshot(version, created_at);
        versions.push(snapshot.clone());
        tracing::info!(
            event_id = %snapshot.event_id,
            version = %snapshot.version_number,
            change_type = %snapshot.change_type,
            "snapshot recorded"
        );
        Ok(snapshot)
    }

    async fn get(
        &self,
        event_id: EventId,
        version: VersionNumber,
    ) -> Result<EventSnapshot, GatewayError> {
        let not_found = || GatewayError::VersionNotFound {
            event: *event_id.as_uuid(),
            version: version.get(),
        };
        let history = self.existing(event_id).await.map_err(|_| not_found())?;
        let versions = history.lock().await;
        // Versions are dense from 1, so the number doubles as an index.
        usize::try_from(version.get() - 1)
            .ok()
            .and_then(|idx| versions.get(idx))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list(&self, event_id: EventId) -> Result<Vec<EventSnapshot>, GatewayError> {
        let history = self.existing(event_id).await?;
        let versions = history.lock().await;
        if versions.is_empty() {
            return Err(GatewayError::EventNotFound(*event_id.as_uuid()));
        }
        Ok(versions.clone())
    }

    async fn latest(&self, event_id: EventId) -> Result<EventSnapshot, GatewayError> {
        let history = self.existing(event_id).await?;
        let versions = history.lock().await;
        versions
            .last()
            .cloned()
            .ok_or(GatewayError::EventNotFound(*event_id.as_uuid()))
    }

    async fn event_ids(&self) -> Result<Vec<EventId>, GatewayError> {
        let map = self.histories.read().await;
        let mut ids = Vec::with_capacity(map.len());
        for (id, history) in map.iter() {
            if !history.lock().await.is_empty() {
                ids.push(*id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Permission store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    grants: RwLock<HashMap<EventId, HashMap<ActorId, PermissionLevel>>>,
}

impl MemoryPermissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn grant(
        &self,
        event_id: EventId,
        actor: ActorId,
        level: PermissionLevel,
    ) -> Result<(), GatewayError> {
        self.grants
            .write()
            .await
            .entry(event_id)
            .or_default()
            .insert(actor, level);
        Ok(())
    }

    async fn revoke(&self, event_id: EventId, actor: ActorId) -> Result<bool, GatewayError> {
        let mut map = self.grants.write().await;
        Ok(map
            .get_mut(&event_id)
            .and_then(|actors| actors.remove(&actor))
            .is_some())
    }

    async fn level_of(
        &self,
        event_id: EventId,
        actor: ActorId,
    ) -> Result<Option<PermissionLevel>, GatewayError> {
        Ok(self
            .grants
            .read()
            .await
            .get(&event_id)
            .and_then(|actors| actors.get(&actor))
            .copied())
    }

    async fn events_for(
        &self,
        actor: ActorId,
    ) -> Result<Vec<(EventId, PermissionLevel)>, GatewayError> {
        let map = self.grants.read().await;
        let mut events: Vec<(EventId, PermissionLevel)> = map
            .iter()
            .filter_map(|(event_id, actors)| actors.get(&actor).map(|level| (*event_id, *level)))
            .collect();
        events.sort_by_key(|(id, _)| *id);
        Ok(events)
    }

    async fn grants_for(
        &self,
        event_id: EventId,
    ) -> Result<Vec<(ActorId, PermissionLevel)>, GatewayError> {
        let map = self.grants.read().await;
        let mut grants: Vec<(ActorId, PermissionLevel)> = map
            .get(&event_id)
            .map(|actors| actors.iter().map(|(a, l)| (*a, *l)).collect())
            .unwrap_or_default();
        grants.sort_by(|(a, la), (b, lb)| lb.cmp(la).then_with(|| a.cmp(b)));
        Ok(grants)
    }
}
