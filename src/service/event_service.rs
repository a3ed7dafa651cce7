//! Event CRUD: the mutating front door of the version store.
//!
//! An event's current state is its latest snapshot. Every successful
//! create/update/delete records exactly one new version; sharing changes
//! touch only the permission store.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::diff::{DiffOptions, compare_payloads};
use crate::domain::payload::{END_TIME, IS_DELETED, LOCATION, START_TIME, TITLE};
use crate::domain::{
    ActorId, ChangeType, EventId, EventPayload, EventSnapshot, FieldChange, NewSnapshot,
    PermissionLevel,
};
use crate::error::GatewayError;
use crate::store::{PermissionStore, VersionStore};

const MAX_TITLE_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 500;
/// Upper bound on events in one batch create.
pub const MAX_BATCH_EVENTS: usize = 100;
/// Re-read and re-merge rounds before a contended write gives up.
const MERGE_ATTEMPTS: usize = 5;

/// Orchestration layer for event mutations and sharing.
#[derive(Debug, Clone)]
pub struct EventService {
    versions: Arc<dyn VersionStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(versions: Arc<dyn VersionStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self {
            versions,
            permissions,
        }
    }

    /// Returns the underlying permission store.
    #[must_use]
    pub fn permissions(&self) -> &Arc<dyn PermissionStore> {
        &self.permissions
    }

    /// Creates a new event owned by `actor` and records version 1.
    ///
    /// The owner grant is written first so the event is never readable
    /// without an owner; it is withdrawn again if recording fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the payload fails
    /// validation, or a store error.
    pub async fn create(
        &self,
        actor: ActorId,
        payload: EventPayload,
    ) -> Result<EventSnapshot, GatewayError> {
        reject_reserved(&payload)?;
        validate(&payload)?;
        self.create_validated(actor, payload).await
    }

    /// Creates several events for `actor` in request order.
    ///
    /// Every payload is validated before anything is written, so an invalid
    /// item rejects the whole batch. Storage happens per event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an empty or oversized
    /// batch or any invalid payload (naming its index), or a store error.
    pub async fn create_batch(
        &self,
        actor: ActorId,
        payloads: Vec<EventPayload>,
    ) -> Result<Vec<EventSnapshot>, GatewayError> {
        if payloads.is_empty() || payloads.len() > MAX_BATCH_EVENTS {
            return Err(GatewayError::InvalidRequest(format!(
                "a batch holds between 1 and {MAX_BATCH_EVENTS} events, got {}",
                payloads.len()
            )));
        }
        for (index, payload) in payloads.iter().enumerate() {
            reject_reserved(payload)
                .and_then(|()| validate(payload))
                .map_err(|err| match err {
                    GatewayError::InvalidRequest(msg) => {
                        GatewayError::InvalidRequest(format!("events[{index}]: {msg}"))
                    }
                    other => other,
                })?;
        }

        let mut created = Vec::with_capacity(payloads.len());
        for payload in payloads {
            created.push(self.create_validated(actor, payload).await?);
        }
        tracing::info!(%actor, count = created.len(), "event batch created");
        Ok(created)
    }

    async fn create_validated(
        &self,
        actor: ActorId,
        payload: EventPayload,
    ) -> Result<EventSnapshot, GatewayError> {
        let event_id = EventId::new();
        self.permissions
            .grant(event_id, actor, PermissionLevel::Owner)
            .await?;
        let recorded = self
            .versions
            .record(NewSnapshot {
                event_id,
                payload,
                changed_by: actor,
                change_type: ChangeType::Create,
                summary: "Initial creation".to_string(),
                based_on: None,
            })
            .await;
        let snapshot = match recorded {
            Ok(snapshot) => snapshot,
            Err(err) => {
                if let Err(revoke_err) = self.permissions.revoke(event_id, actor).await {
                    tracing::warn!(%event_id, %actor, error = %revoke_err, "orphaned owner grant");
                }
                return Err(err);
            }
        };

        tracing::info!(%event_id, %actor, "event created");
        Ok(snapshot)
    }

    /// Current state of a live event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for unknown or deleted events
    /// and [`GatewayError::PermissionDenied`] below Viewer.
    pub async fn get(
        &self,
        actor: ActorId,
        event_id: EventId,
    ) -> Result<EventSnapshot, GatewayError> {
        let current = self.live(event_id).await?;
        self.permissions
            .require(event_id, actor, PermissionLevel::Viewer)
            .await?;
        Ok(current)
    }

    /// Current state of every live event `actor` can view.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn list(&self, actor: ActorId) -> Result<Vec<EventSnapshot>, GatewayError> {
        let grants = self.permissions.events_for(actor).await?;
        let mut events = Vec::with_capacity(grants.len());
        for (event_id, _) in grants {
            match self.versions.latest(event_id).await {
                Ok(snapshot) if !snapshot.is_tombstone() => events.push(snapshot),
                Ok(_) | Err(GatewayError::EventNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(events)
    }

    /// Applies a partial update and records a new version.
    ///
    /// Fields in `patch` overwrite the current ones; `null` clears a field.
    /// A patch that changes nothing records nothing and returns the
    /// current version. If another writer records a version between the
    /// read and the append, the patch is merged again over that version.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`],
    /// [`GatewayError::PermissionDenied`] below Editor,
    /// [`GatewayError::InvalidRequest`] if the merged payload is invalid,
    /// [`GatewayError::ConcurrencyConflict`] if every merge round lost a
    /// race, or a store error.
    pub async fn update(
        &self,
        actor: ActorId,
        event_id: EventId,
        patch: &serde_json::Map<String, Value>,
    ) -> Result<EventSnapshot, GatewayError> {
        for _ in 0..MERGE_ATTEMPTS {
            let current = self.live(event_id).await?;
            self.permissions
                .require(event_id, actor, PermissionLevel::Editor)
                .await?;
            if patch.contains_key(IS_DELETED) {
                return Err(reserved_field());
            }

            let payload = current.payload.merged(patch);
            validate(&payload)?;
            let changes = compare_payloads(&current.payload, &payload, DiffOptions::default());
            if changes.is_empty() {
                return Ok(current);
            }

            let recorded = self
                .versions
                .record(NewSnapshot {
                    event_id,
                    payload,
                    changed_by: actor,
                    change_type: ChangeType::Update,
                    summary: update_summary(&changes),
                    based_on: Some(current.version_number),
                })
                .await;
            match recorded {
                Ok(snapshot) => {
                    tracing::info!(%event_id, %actor, version = %snapshot.version_number, "event updated");
                    return Ok(snapshot);
                }
                Err(GatewayError::StaleVersion { based_on, .. }) => {
                    tracing::debug!(%event_id, based_on, "concurrent write, merging again");
                }
                Err(err) => return Err(err),
            }
        }
        Err(GatewayError::ConcurrencyConflict(*event_id.as_uuid()))
    }

    /// Tombstones a live event. History stays readable.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`],
    /// [`GatewayError::PermissionDenied`] below Owner, or a store error.
    pub async fn delete(
        &self,
        actor: ActorId,
        event_id: EventId,
    ) -> Result<EventSnapshot, GatewayError> {
        for _ in 0..MERGE_ATTEMPTS {
            let current = self.live(event_id).await?;
            self.permissions
                .require(event_id, actor, PermissionLevel::Owner)
                .await?;

            let recorded = self
                .versions
                .record(NewSnapshot {
                    event_id,
                    payload: current.payload.tombstoned(),
                    changed_by: actor,
                    change_type: ChangeType::Delete,
                    summary: "Event deleted".to_string(),
                    based_on: Some(current.version_number),
                })
                .await;
            match recorded {
                Ok(snapshot) => {
                    tracing::info!(%event_id, %actor, version = %snapshot.version_number, "event deleted");
                    return Ok(snapshot);
                }
                Err(GatewayError::StaleVersion { based_on, .. }) => {
                    tracing::debug!(%event_id, based_on, "concurrent write, re-reading before delete");
                }
                Err(err) => return Err(err),
            }
        }
        Err(GatewayError::ConcurrencyConflict(*event_id.as_uuid()))
    }

    /// Every grant on the event, highest level first.
    ///
    /// The owner appears as an Owner grant. Tombstoned events keep their
    /// grants, so this stays readable after a delete like the history does.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] or
    /// [`GatewayError::PermissionDenied`] below Viewer.
    pub async fn grants(
        &self,
        actor: ActorId,
        event_id: EventId,
    ) -> Result<Vec<(ActorId, PermissionLevel)>, GatewayError> {
        self.versions.latest(event_id).await?;
        self.permissions
            .require(event_id, actor, PermissionLevel::Viewer)
            .await?;
        self.permissions.grants_for(event_id).await
    }

    /// Grants `target` a level on the event. Owner only.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`],
    /// [`GatewayError::PermissionDenied`] below Owner,
    /// [`GatewayError::InvalidRequest`] when changing one's own grant, or a
    /// store error.
    pub async fn share(
        &self,
        actor: ActorId,
        event_id: EventId,
        target: ActorId,
        level: PermissionLevel,
    ) -> Result<(), GatewayError> {
        self.authorize_sharing(actor, event_id, target).await?;
        self.permissions.grant(event_id, target, level).await?;
        tracing::info!(%event_id, %actor, %target, %level, "permission granted");
        Ok(())
    }

    /// Revokes `target`'s grant on the event. Owner only.
    ///
    /// # Errors
    ///
    /// As for [`Self::share`]; additionally [`GatewayError::InvalidRequest`]
    /// if `target` holds no grant.
    pub async fn unshare(
        &self,
        actor: ActorId,
        event_id: EventId,
        target: ActorId,
    ) -> Result<(), GatewayError> {
        self.authorize_sharing(actor, event_id, target).await?;
        if !self.permissions.revoke(event_id, target).await? {
            return Err(GatewayError::InvalidRequest(format!(
                "actor {target} holds no permission on event {event_id}"
            )));
        }
        tracing::info!(%event_id, %actor, %target, "permission revoked");
        Ok(())
    }

    async fn authorize_sharing(
        &self,
        actor: ActorId,
        event_id: EventId,
        target: ActorId,
    ) -> Result<(), GatewayError> {
        self.versions.latest(event_id).await?;
        self.permissions
            .require(event_id, actor, PermissionLevel::Owner)
            .await?;
        if actor == target {
            return Err(GatewayError::InvalidRequest(
                "owners cannot change their own permission".to_string(),
            ));
        }
        Ok(())
    }

    /// Latest snapshot, treating tombstoned events as missing.
    async fn live(&self, event_id: EventId) -> Result<EventSnapshot, GatewayError> {
        let current = self.versions.latest(event_id).await?;
        if current.is_tombstone() {
            return Err(GatewayError::EventNotFound(*event_id.as_uuid()));
        }
        Ok(current)
    }
}

fn reserved_field() -> GatewayError {
    GatewayError::InvalidRequest(format!("field `{IS_DELETED}` is managed by the server"))
}

fn reject_reserved(payload: &EventPayload) -> Result<(), GatewayError> {
    if payload.contains(IS_DELETED) {
        return Err(reserved_field());
    }
    Ok(())
}

fn update_summary(changes: &[FieldChange]) -> String {
    let fields: Vec<&str> = changes.iter().map(|c| c.field_name.as_str()).collect();
    format!("Updated: {}", fields.join(", "))
}

/// Business-field validation. The version store never re-validates.
fn validate(payload: &EventPayload) -> Result<(), GatewayError> {
    match payload.get(TITLE) {
        Some(Value::String(title))
            if !title.trim().is_empty() && title.chars().count() <= MAX_TITLE_CHARS => {}
        _ => {
            return Err(GatewayError::InvalidRequest(format!(
                "`{TITLE}` must be a non-empty string of at most {MAX_TITLE_CHARS} characters"
            )));
        }
    }

    match payload.get(LOCATION) {
        None => {}
        Some(Value::String(loc)) if loc.chars().count() <= MAX_LOCATION_CHARS => {}
        Some(_) => {
            return Err(GatewayError::InvalidRequest(format!(
                "`{LOCATION}` must be a string of at most {MAX_LOCATION_CHARS} characters"
            )));
        }
    }

    let start = timestamp(payload, START_TIME)?;
    let end = timestamp(payload, END_TIME)?;
    if let (Some(start), Some(end)) = (start, end)
        && end <= start
    {
        return Err(GatewayError::InvalidRequest(format!(
            "`{END_TIME}` must be after `{START_TIME}`"
        )));
    }
    Ok(())
}

fn timestamp(
    payload: &EventPayload,
    field: &str,
) -> Result<Option<DateTime<FixedOffset>>, GatewayError> {
    match payload.get(field) {
        None => Ok(None),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(Some)
            .map_err(|e| GatewayError::InvalidRequest(format!("`{field}`: {e}"))),
        Some(_) => Err(GatewayError::InvalidRequest(format!(
            "`{field}` must be an RFC 3339 timestamp string"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::store::{MemoryPermissionStore, MemoryVersionStore};
    use async_trait::async_trait;
    use serde_json::json;

    fn service() -> EventService {
        EventService::new(
            Arc::new(MemoryVersionStore::new()),
            Arc::new(MemoryPermissionStore::new()),
        )
    }

    fn payload(value: Value) -> EventPayload {
        let Ok(p) = serde_json::from_value(value) else {
            panic!("payload literal must be an object");
        };
        p
    }

    fn patch(value: Value) -> serde_json::Map<String, Value> {
        let Some(map) = value.as_object().cloned() else {
            panic!("patch literal must be an object");
        };
        map
    }

    #[tokio::test]
    async fn create_records_v1_and_grants_owner() {
        let svc = service();
        let owner = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        assert_eq!(v1.version_number.get(), 1);
        assert_eq!(v1.change_type, ChangeType::Create);
        assert_eq!(v1.summary, "Initial creation");
        assert!(matches!(
            svc.permissions().level_of(v1.event_id, owner).await,
            Ok(Some(PermissionLevel::Owner))
        ));
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let svc = service();
        let actor = ActorId::new();
        for bad in [
            json!({}),
            json!({"title": "  "}),
            json!({"title": "x", "location": 5}),
            json!({"title": "x", "start_time": "tomorrow"}),
            json!({"title": "x", "start_time": "2024-01-01T10:00:00Z", "end_time": "2024-01-01T09:00:00Z"}),
            json!({"title": "x", "is_deleted": true}),
        ] {
            let result = svc.create(actor, payload(bad.clone())).await;
            assert!(
                matches!(result, Err(GatewayError::InvalidRequest(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn update_merges_and_summarizes() {
        let svc = service();
        let owner = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(v2) = svc
            .update(owner, v1.event_id, &patch(json!({"location": "Room A"})))
            .await
        else {
            panic!("update failed");
        };
        assert_eq!(v2.version_number.get(), 2);
        assert_eq!(v2.payload.title(), Some("Standup"));
        assert_eq!(v2.summary, "Updated: location");

        let Ok(v3) = svc
            .update(owner, v1.event_id, &patch(json!({"location": null})))
            .await
        else {
            panic!("update failed");
        };
        assert!(!v3.payload.contains(LOCATION));
    }

    #[tokio::test]
    async fn noop_update_records_nothing() {
        let svc = service();
        let owner = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(same) = svc
            .update(owner, v1.event_id, &patch(json!({"title": "Standup"})))
            .await
        else {
            panic!("update failed");
        };
        assert_eq!(same.version_number.get(), 1);
    }

    #[tokio::test]
    async fn viewer_cannot_update() {
        let svc = service();
        let owner = ActorId::new();
        let viewer = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(()) = svc
            .share(owner, v1.event_id, viewer, PermissionLevel::Viewer)
            .await
        else {
            panic!("share failed");
        };
        assert!(svc.get(viewer, v1.event_id).await.is_ok());
        let result = svc
            .update(viewer, v1.event_id, &patch(json!({"title": "Mine"})))
            .await;
        assert!(matches!(result, Err(GatewayError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn delete_tombstones_event() {
        let svc = service();
        let owner = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(tomb) = svc.delete(owner, v1.event_id).await else {
            panic!("delete failed");
        };
        assert_eq!(tomb.change_type, ChangeType::Delete);
        assert!(tomb.is_tombstone());
        assert_eq!(tomb.payload.title(), Some("Standup"));

        assert!(matches!(
            svc.get(owner, v1.event_id).await,
            Err(GatewayError::EventNotFound(_))
        ));
        assert!(matches!(
            svc.delete(owner, v1.event_id).await,
            Err(GatewayError::EventNotFound(_))
        ));
        let Ok(listed) = svc.list(owner).await else {
            panic!("list failed");
        };
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn editor_cannot_delete_or_share() {
        let svc = service();
        let owner = ActorId::new();
        let editor = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(()) = svc
            .share(owner, v1.event_id, editor, PermissionLevel::Editor)
            .await
        else {
            panic!("share failed");
        };
        assert!(matches!(
            svc.delete(editor, v1.event_id).await,
            Err(GatewayError::PermissionDenied { .. })
        ));
        assert!(matches!(
            svc.share(editor, v1.event_id, ActorId::new(), PermissionLevel::Viewer)
                .await,
            Err(GatewayError::PermissionDenied { .. })
        ));
    }

    #[tokio::test]
    async fn unshare_removes_access() {
        let svc = service();
        let owner = ActorId::new();
        let guest = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(()) = svc
            .share(owner, v1.event_id, guest, PermissionLevel::Viewer)
            .await
        else {
            panic!("share failed");
        };
        let Ok(()) = svc.unshare(owner, v1.event_id, guest).await else {
            panic!("unshare failed");
        };
        assert!(matches!(
            svc.get(guest, v1.event_id).await,
            Err(GatewayError::PermissionDenied { .. })
        ));
        assert!(matches!(
            svc.unshare(owner, v1.event_id, guest).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            svc.unshare(owner, v1.event_id, owner).await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn simultaneous_updates_get_sequential_versions() {
        let svc = service();
        let owner = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let id = v1.event_id;

        let a = patch(json!({"location": "Room A"}));
        let b = patch(json!({"description": "daily sync"}));
        let (ra, rb) = tokio::join!(svc.update(owner, id, &a), svc.update(owner, id, &b));
        let (Ok(sa), Ok(sb)) = (ra, rb) else {
            panic!("both updates must succeed");
        };
        let mut numbers = [sa.version_number.get(), sb.version_number.get()];
        numbers.sort_unstable();
        assert_eq!(numbers, [2, 3]);

        let Ok(latest) = svc.get(owner, id).await else {
            panic!("get failed");
        };
        assert_eq!(latest.version_number.get(), 3);
        assert_eq!(latest.payload.get(LOCATION), Some(&json!("Room A")));
        assert_eq!(latest.payload.get("description"), Some(&json!("daily sync")));
    }

    /// Records a rival edit just before the first based-on append it sees.
    #[derive(Debug)]
    struct InterleavingStore {
        inner: MemoryVersionStore,
        rival: serde_json::Map<String, Value>,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl VersionStore for InterleavingStore {
        async fn record(&self, new: NewSnapshot) -> Result<EventSnapshot, GatewayError> {
            use std::sync::atomic::Ordering;
            if new.based_on.is_some() && !self.fired.swap(true, Ordering::SeqCst) {
                let current = self.inner.latest(new.event_id).await?;
                self.inner
                    .record(NewSnapshot {
                        event_id: new.event_id,
                        payload: current.payload.merged(&self.rival),
                        changed_by: ActorId::new(),
                        change_type: ChangeType::Update,
                        summary: "Updated: rival".to_string(),
                        based_on: Some(current.version_number),
                    })
                    .await?;
            }
            self.inner.record(new).await
        }

        async fn get(
            &self,
            event_id: EventId,
            version: crate::domain::VersionNumber,
        ) -> Result<EventSnapshot, GatewayError> {
            self.inner.get(event_id, version).await
        }

        async fn list(&self, event_id: EventId) -> Result<Vec<EventSnapshot>, GatewayError> {
            self.inner.list(event_id).await
        }

        async fn latest(&self, event_id: EventId) -> Result<EventSnapshot, GatewayError> {
            self.inner.latest(event_id).await
        }

        async fn event_ids(&self) -> Result<Vec<EventId>, GatewayError> {
            self.inner.event_ids().await
        }
    }

    #[tokio::test]
    async fn update_merges_again_over_an_intervening_write() {
        let svc = EventService::new(
            Arc::new(InterleavingStore {
                inner: MemoryVersionStore::new(),
                rival: patch(json!({"description": "daily sync"})),
                fired: std::sync::atomic::AtomicBool::new(false),
            }),
            Arc::new(MemoryPermissionStore::new()),
        );
        let owner = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };

        let Ok(v3) = svc
            .update(owner, v1.event_id, &patch(json!({"location": "Room A"})))
            .await
        else {
            panic!("update failed");
        };
        assert_eq!(v3.version_number.get(), 3);
        assert_eq!(v3.summary, "Updated: location");
        assert_eq!(v3.payload.get(LOCATION), Some(&json!("Room A")));
        assert_eq!(v3.payload.get("description"), Some(&json!("daily sync")));
    }

    /// Refuses every append.
    #[derive(Debug, Default)]
    struct FailingStore;

    #[async_trait]
    impl VersionStore for FailingStore {
        async fn record(&self, _new: NewSnapshot) -> Result<EventSnapshot, GatewayError> {
            Err(GatewayError::PersistenceError("disk full".to_string()))
        }

        async fn get(
            &self,
            event_id: EventId,
            _version: crate::domain::VersionNumber,
        ) -> Result<EventSnapshot, GatewayError> {
            Err(GatewayError::EventNotFound(*event_id.as_uuid()))
        }

        async fn list(&self, event_id: EventId) -> Result<Vec<EventSnapshot>, GatewayError> {
            Err(GatewayError::EventNotFound(*event_id.as_uuid()))
        }

        async fn latest(&self, event_id: EventId) -> Result<EventSnapshot, GatewayError> {
            Err(GatewayError::EventNotFound(*event_id.as_uuid()))
        }

        async fn event_ids(&self) -> Result<Vec<EventId>, GatewayError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn failed_create_leaves_no_owner_grant() {
        let permissions = Arc::new(MemoryPermissionStore::new());
        let svc = EventService::new(
            Arc::new(FailingStore),
            Arc::clone(&permissions) as Arc<dyn PermissionStore>,
        );
        let owner = ActorId::new();
        let result = svc.create(owner, payload(json!({"title": "Standup"}))).await;
        assert!(matches!(result, Err(GatewayError::PersistenceError(_))));

        let Ok(owned) = permissions.events_for(owner).await else {
            panic!("events_for failed");
        };
        assert!(owned.is_empty());
    }

    #[tokio::test]
    async fn batch_creates_each_event_at_v1() {
        let svc = service();
        let owner = ActorId::new();
        let Ok(events) = svc
            .create_batch(
                owner,
                vec![
                    payload(json!({"title": "Standup"})),
                    payload(json!({"title": "Retro", "location": "Room B"})),
                ],
            )
            .await
        else {
            panic!("batch failed");
        };
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.version_number.get() == 1));
        assert_ne!(events[0].event_id, events[1].event_id);
        assert_eq!(events[1].payload.title(), Some("Retro"));

        let Ok(listed) = svc.list(owner).await else {
            panic!("list failed");
        };
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn batch_with_one_invalid_item_writes_nothing() {
        let svc = service();
        let owner = ActorId::new();
        let result = svc
            .create_batch(
                owner,
                vec![
                    payload(json!({"title": "Standup"})),
                    payload(json!({"title": ""})),
                ],
            )
            .await;
        let Err(GatewayError::InvalidRequest(msg)) = result else {
            panic!("invalid batch must be rejected");
        };
        assert!(msg.starts_with("events[1]"), "{msg}");

        let Ok(listed) = svc.list(owner).await else {
            panic!("list failed");
        };
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn batch_size_is_bounded() {
        let svc = service();
        let owner = ActorId::new();
        assert!(matches!(
            svc.create_batch(owner, Vec::new()).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        let oversized = vec![payload(json!({"title": "x"})); MAX_BATCH_EVENTS + 1];
        assert!(matches!(
            svc.create_batch(owner, oversized).await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn grants_are_listed_to_viewers_only() {
        let svc = service();
        let owner = ActorId::new();
        let viewer = ActorId::new();
        let Ok(v1) = svc.create(owner, payload(json!({"title": "Standup"}))).await else {
            panic!("create failed");
        };
        let Ok(()) = svc
            .share(owner, v1.event_id, viewer, PermissionLevel::Viewer)
            .await
        else {
            panic!("share failed");
        };

        let Ok(grants) = svc.grants(viewer, v1.event_id).await else {
            panic!("grants failed");
        };
        assert_eq!(
            grants,
            vec![
                (owner, PermissionLevel::Owner),
                (viewer, PermissionLevel::Viewer)
            ]
        );
        assert!(matches!(
            svc.grants(ActorId::new(), v1.event_id).await,
            Err(GatewayError::PermissionDenied { .. })
        ));
        assert!(matches!(
            svc.grants(owner, EventId::new()).await,
            Err(GatewayError::EventNotFound(_))
        ));
    }
}
