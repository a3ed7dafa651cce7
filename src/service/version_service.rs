//! Version history service: browse, diff, changelog and rollback.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::diff::{self, DiffOptions};
use crate::domain::{
    ActorId, ChangeType, EventId, EventSnapshot, FieldChange, NewSnapshot, PermissionLevel,
    VersionNumber,
};
use crate::error::GatewayError;
use crate::store::{PermissionStore, VersionStore};

/// One changelog line: a version plus its delta against the predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChangelogEntry {
    /// The version this entry describes.
    pub snapshot: EventSnapshot,
    /// Changes from the previous version; empty for the first version.
    pub changes: Vec<FieldChange>,
    /// `true` only for the first version (nothing to compare against).
    pub initial: bool,
}

/// Read and rollback operations over an event's version history.
///
/// Reads go straight to the [`VersionStore`]; nothing is cached.
#[derive(Debug, Clone)]
pub struct VersionService {
    versions: Arc<dyn VersionStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl VersionService {
    /// Creates a new `VersionService`.
    #[must_use]
    pub fn new(versions: Arc<dyn VersionStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self {
            versions,
            permissions,
        }
    }

    /// Checks that the event exists and `actor` may read its history.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] first, then
    /// [`GatewayError::PermissionDenied`] below Viewer.
    pub async fn authorize_read(
        &self,
        event_id: EventId,
        actor: ActorId,
    ) -> Result<(), GatewayError> {
        self.versions.latest(event_id).await?;
        self.permissions
            .require(event_id, actor, PermissionLevel::Viewer)
            .await?;
        Ok(())
    }

    /// Number of events with at least one recorded version.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn tracked_events(&self) -> Result<usize, GatewayError> {
        Ok(self.versions.event_ids().await?.len())
    }

    /// Every version of the event, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] if the event has no versions.
    pub async fn history(&self, event_id: EventId) -> Result<Vec<EventSnapshot>, GatewayError> {
        self.versions.list(event_id).await
    }

    /// One version of the event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VersionNotFound`] if absent.
    pub async fn version(
        &self,
        event_id: EventId,
        version: VersionNumber,
    ) -> Result<EventSnapshot, GatewayError> {
        self.versions.get(event_id, version).await
    }

    /// Field-level diff from version `from` to version `to`.
    ///
    /// Nested values are compared as whole values; see [`diff`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VersionNotFound`] if either version is absent.
    pub async fn diff(
        &self,
        event_id: EventId,
        from: VersionNumber,
        to: VersionNumber,
        options: DiffOptions,
    ) -> Result<Vec<FieldChange>, GatewayError> {
        let a = self.versions.get(event_id, from).await?;
        let b = self.versions.get(event_id, to).await?;
        Ok(diff::compare_with(&a, &b, options))
    }

    /// Every version with its delta against the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] if the event has no versions.
    pub async fn changelog(&self, event_id: EventId) -> Result<Vec<ChangelogEntry>, GatewayError> {
        let history = self.versions.list(event_id).await?;
        Ok(assemble_changelog(history))
    }

    /// Republishes version `target`'s payload as a new current version.
    ///
    /// Never rewrites history: the target and every other version stay as
    /// they are and the result is always a new version, even when `target`
    /// already is the latest one.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::EventNotFound`] if the event has no versions.
    /// - [`GatewayError::PermissionDenied`] if `actor` is below Editor.
    /// - [`GatewayError::VersionNotFound`] if `target` does not exist.
    pub async fn rollback(
        &self,
        event_id: EventId,
        target: VersionNumber,
        actor: ActorId,
    ) -> Result<EventSnapshot, GatewayError> {
        self.versions.latest(event_id).await?;
        self.permissions
            .require(event_id, actor, PermissionLevel::Editor)
            .await?;
        let source = self.versions.get(event_id, target).await?;

        let snapshot = self
            .versions
            .record(NewSnapshot {
                event_id,
                payload: source.payload,
                changed_by: actor,
                change_type: ChangeType::Rollback,
                summary: format!("Rollback to version {target}"),
                based_on: None,
            })
            .await?;

        tracing::info!(
            %event_id,
            %actor,
            target = %target,
            version = %snapshot.version_number,
            "event rolled back"
        );
        Ok(snapshot)
    }
}

/// Pairs each snapshot of an ascending history with its predecessor diff.
#[must_use]
pub fn assemble_changelog(history: Vec<EventSnapshot>) -> Vec<ChangelogEntry> {
    let mut entries: Vec<ChangelogEntry> = Vec::with_capacity(history.len());
    for snapshot in history {
        let changes = entries
            .last()
            .map(|prev| diff::compare(&prev.snapshot, &snapshot))
            .unwrap_or_default();
        let initial = entries.is_empty();
        entries.push(ChangelogEntry {
            snapshot,
            changes,
            initial,
        });
    }
    entries
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, EventPayload};
    use crate::store::{MemoryPermissionStore, MemoryVersionStore};
    use serde_json::json;

    struct Fixture {
        service: VersionService,
        permissions: Arc<MemoryPermissionStore>,
        event_id: EventId,
        owner: ActorId,
    }

    fn version(n: u32) -> VersionNumber {
        let Ok(v) = VersionNumber::try_from(n) else {
            panic!("positive version");
        };
        v
    }

    /// Standup scenario: v1 `{title}` then v2 `{title, location}`.
    async fn standup() -> Fixture {
        let store = Arc::new(MemoryVersionStore::new());
        let permissions = Arc::new(MemoryPermissionStore::new());
        let service = VersionService::new(
            Arc::clone(&store) as Arc<dyn VersionStore>,
            Arc::clone(&permissions) as Arc<dyn PermissionStore>,
        );
        let event_id = EventId::new();
        let owner = ActorId::new();
        let Ok(()) = permissions
            .grant(event_id, owner, PermissionLevel::Owner)
            .await
        else {
            panic!("grant failed");
        };

        let v1 = EventPayload::new().with("title", "Standup");
        let v2 = v1.clone().with("location", "Room A");
        for (payload, change_type) in [(v1, ChangeType::Create), (v2, ChangeType::Update)] {
            let Ok(_) = store
                .record(NewSnapshot {
                    event_id,
                    payload,
                    changed_by: owner,
                    change_type,
                    summary: String::new(),
                    based_on: None,
                })
                .await
            else {
                panic!("record failed");
            };
        }

        Fixture {
            service,
            permissions,
            event_id,
            owner,
        }
    }

    #[tokio::test]
    async fn rollback_creates_new_version_with_target_payload() {
        let fx = standup().await;
        let Ok(before) = fx.service.history(fx.event_id).await else {
            panic!("history failed");
        };

        let Ok(v3) = fx.service.rollback(fx.event_id, version(1), fx.owner).await else {
            panic!("rollback failed");
        };
        assert_eq!(v3.version_number, version(3));
        assert_eq!(v3.change_type, ChangeType::Rollback);
        assert_eq!(v3.payload, before[0].payload);
        assert_eq!(v3.summary, "Rollback to version 1");

        let Ok(after) = fx.service.history(fx.event_id).await else {
            panic!("history failed");
        };
        assert_eq!(after.len(), 3);
        assert_eq!(&after[..2], &before[..]);
    }

    #[tokio::test]
    async fn changelog_after_rollback() {
        let fx = standup().await;
        let Ok(_) = fx.service.rollback(fx.event_id, version(1), fx.owner).await else {
            panic!("rollback failed");
        };

        let Ok(log) = fx.service.changelog(fx.event_id).await else {
            panic!("changelog failed");
        };
        assert_eq!(log.len(), 3);
        assert!(log[0].initial);
        assert!(log[0].changes.is_empty());
        assert!(!log[1].initial);
        assert_eq!(log[1].changes[0].change_kind, ChangeKind::Added);
        assert_eq!(
            log[2].changes,
            vec![FieldChange {
                field_name: "location".to_string(),
                old_value: Some(json!("Room A")),
                new_value: None,
                change_kind: ChangeKind::Removed,
            }]
        );
    }

    #[tokio::test]
    async fn rollback_to_latest_still_advances() {
        let fx = standup().await;
        let Ok(v3) = fx.service.rollback(fx.event_id, version(2), fx.owner).await else {
            panic!("rollback failed");
        };
        assert_eq!(v3.version_number, version(3));
        let Ok(changes) = fx
            .service
            .diff(fx.event_id, version(2), version(3), DiffOptions::default())
            .await
        else {
            panic!("diff failed");
        };
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn rollback_requires_editor() {
        let fx = standup().await;
        let viewer = ActorId::new();
        let Ok(()) = fx
            .permissions
            .grant(fx.event_id, viewer, PermissionLevel::Viewer)
            .await
        else {
            panic!("grant failed");
        };

        let result = fx.service.rollback(fx.event_id, version(1), viewer).await;
        assert!(matches!(result, Err(GatewayError::PermissionDenied { .. })));
        let stranger = fx
            .service
            .rollback(fx.event_id, version(1), ActorId::new())
            .await;
        assert!(matches!(stranger, Err(GatewayError::PermissionDenied { .. })));

        let Ok(()) = fx
            .permissions
            .grant(fx.event_id, viewer, PermissionLevel::Editor)
            .await
        else {
            panic!("grant failed");
        };
        let promoted = fx.service.rollback(fx.event_id, version(1), viewer).await;
        assert!(promoted.is_ok());
    }

    #[tokio::test]
    async fn rollback_to_missing_version_is_not_found() {
        let fx = standup().await;
        let result = fx.service.rollback(fx.event_id, version(9), fx.owner).await;
        assert!(matches!(
            result,
            Err(GatewayError::VersionNotFound { version: 9, .. })
        ));
        let Ok(history) = fx.service.history(fx.event_id).await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn rollback_on_unknown_event_is_not_found() {
        let fx = standup().await;
        let result = fx
            .service
            .rollback(EventId::new(), version(1), fx.owner)
            .await;
        assert!(matches!(result, Err(GatewayError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn reads_need_viewer_after_existence() {
        let fx = standup().await;
        assert!(fx.service.authorize_read(fx.event_id, fx.owner).await.is_ok());
        assert!(matches!(
            fx.service.authorize_read(fx.event_id, ActorId::new()).await,
            Err(GatewayError::PermissionDenied { .. })
        ));
        assert!(matches!(
            fx.service.authorize_read(EventId::new(), fx.owner).await,
            Err(GatewayError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn changelog_of_unknown_event_is_not_found() {
        let fx = standup().await;
        assert!(matches!(
            fx.service.changelog(EventId::new()).await,
            Err(GatewayError::EventNotFound(_))
        ));
    }
}
