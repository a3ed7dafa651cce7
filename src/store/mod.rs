//! Storage layer: append-only version history and sharing permissions.
//!
//! Two traits describe the storage seams:
//!
//! - [`VersionStore`] persists the immutable snapshot sequence of each event.
//! - [`PermissionStore`] persists who may do what on an event.
//!
//! Each has an in-memory backend (per-event locking, used for tests and
//! persistence-disabled deployments) and a PostgreSQL backend built on
//! `sqlx::PgPool`.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod retry;

use async_trait::async_trait;

use crate::domain::{
    ActorId, ChangeType, EventId, EventSnapshot, NewSnapshot, PermissionLevel, VersionNumber,
};
use crate::error::GatewayError;

pub use memory::{MemoryPermissionStore, MemoryVersionStore};
pub use postgres::{PostgresPermissionStore, PostgresVersionStore};
pub use retry::RetryPolicy;

/// Append-only store of event snapshots.
///
/// # Guarantees
///
/// - Version numbers per event are `1..=N` with no gaps and no reuse, even
///   under concurrent `record` calls on the same event.
/// - Stored snapshots are never modified or removed.
/// - A `record` call either writes the whole snapshot or nothing.
#[async_trait]
pub trait VersionStore: Send + Sync + std::fmt::Debug {
    /// Allocates the next version number for `new.event_id` and appends
    /// the snapshot.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for a `create` on an event that
    ///   already has versions.
    /// - [`GatewayError::EventNotFound`] for any other change type on an
    ///   event without versions.
    /// - [`GatewayError::ConcurrencyConflict`] when allocation keeps losing
    ///   races past the retry budget.
    /// - [`GatewayError::PersistenceError`] on storage failure.
    async fn record(&self, new: NewSnapshot) -> Result<EventSnapshot, GatewayError>;

    /// Returns one version of an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VersionNotFound`] if absent.
    async fn get(
        &self,
        event_id: EventId,
        version: VersionNumber,
    ) -> Result<EventSnapshot, GatewayError>;

    /// Returns every version of an event in ascending version order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] if the event has no versions.
    async fn list(&self, event_id: EventId) -> Result<Vec<EventSnapshot>, GatewayError>;

    /// Returns the highest version of an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] if the event has no versions.
    async fn latest(&self, event_id: EventId) -> Result<EventSnapshot, GatewayError>;

    /// Returns the IDs of every event with at least one version.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn event_ids(&self) -> Result<Vec<EventId>, GatewayError>;
}

/// Store of per-event sharing grants.
#[async_trait]
pub trait PermissionStore: Send + Sync + std::fmt::Debug {
    /// Grants (or replaces) `actor`'s level on `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn grant(
        &self,
        event_id: EventId,
        actor: ActorId,
        level: PermissionLevel,
    ) -> Result<(), GatewayError>;

    /// Removes `actor`'s grant. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn revoke(&self, event_id: EventId, actor: ActorId) -> Result<bool, GatewayError>;

    /// Returns `actor`'s level on `event_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn level_of(
        &self,
        event_id: EventId,
        actor: ActorId,
    ) -> Result<Option<PermissionLevel>, GatewayError>;

    /// Returns every event `actor` holds a grant on.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn events_for(
        &self,
        actor: ActorId,
    ) -> Result<Vec<(EventId, PermissionLevel)>, GatewayError>;

    /// Returns every grant on `event_id`, highest level first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn grants_for(
        &self,
        event_id: EventId,
    ) -> Result<Vec<(ActorId, PermissionLevel)>, GatewayError>;

    /// Fails unless `actor` holds at least `required` on `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PermissionDenied`] if the actor's level is
    /// missing or lower than `required`.
    async fn require(
        &self,
        event_id: EventId,
        actor: ActorId,
        required: PermissionLevel,
    ) -> Result<PermissionLevel, GatewayError> {
        match self.level_of(event_id, actor).await? {
            Some(level) if level >= required => Ok(level),
            _ => Err(GatewayError::PermissionDenied {
                event: *event_id.as_uuid(),
                actor: *actor.as_uuid(),
                required: required.to_string(),
            }),
        }
    }
}

/// Computes the version number a `record` call should allocate, given the
/// event's current highest version.
///
/// # Errors
///
/// See [`VersionStore::record`] for the create/not-found rules; returns
/// [`GatewayError::StaleVersion`] when `new.based_on` is set and differs
/// from `current`.
pub fn next_version(
    new: &NewSnapshot,
    current: Option<VersionNumber>,
) -> Result<VersionNumber, GatewayError> {
    let event_id = new.event_id;
    if let Some(based_on) = new.based_on
        && current.is_some_and(|v| v != based_on)
    {
        return Err(GatewayError::StaleVersion {
            event: *event_id.as_uuid(),
            based_on: based_on.get(),
        });
    }
    match (new.change_type, current) {
        (ChangeType::Create, None) => Ok(VersionNumber::INITIAL),
        (ChangeType::Create, Some(_)) => Err(GatewayError::InvalidRequest(format!(
            "event {event_id} already exists"
        ))),
        (_, None) => Err(GatewayError::EventNotFound(*event_id.as_uuid())),
        (_, Some(v)) => v.next(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventPayload;

    fn new_snapshot(change_type: ChangeType, based_on: Option<VersionNumber>) -> NewSnapshot {
        NewSnapshot {
            event_id: EventId::new(),
            payload: EventPayload::new().with("title", "Standup"),
            changed_by: ActorId::new(),
            change_type,
            summary: String::new(),
            based_on,
        }
    }

    fn version(n: i64) -> VersionNumber {
        let Ok(v) = VersionNumber::try_from(n) else {
            panic!("{n} is a valid version");
        };
        v
    }

    #[test]
    fn create_allocates_first_version() {
        let Ok(v) = next_version(&new_snapshot(ChangeType::Create, None), None) else {
            panic!("create on empty history must succeed");
        };
        assert_eq!(v, VersionNumber::INITIAL);
    }

    #[test]
    fn create_on_existing_history_is_rejected() {
        let result = next_version(
            &new_snapshot(ChangeType::Create, None),
            Some(VersionNumber::INITIAL),
        );
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn update_without_history_is_not_found() {
        for ct in [ChangeType::Update, ChangeType::Delete, ChangeType::Rollback] {
            let result = next_version(&new_snapshot(ct, None), None);
            assert!(matches!(result, Err(GatewayError::EventNotFound(_))));
        }
    }

    #[test]
    fn update_allocates_max_plus_one() {
        let Ok(next) = next_version(&new_snapshot(ChangeType::Update, None), Some(version(3)))
        else {
            panic!("update must succeed");
        };
        assert_eq!(next.get(), 4);
    }

    #[test]
    fn based_on_must_still_be_latest() {
        let current = Some(version(3));
        let Ok(next) = next_version(
            &new_snapshot(ChangeType::Update, Some(version(3))),
            current,
        ) else {
            panic!("based on the latest version must succeed");
        };
        assert_eq!(next.get(), 4);

        let stale = next_version(&new_snapshot(ChangeType::Update, Some(version(2))), current);
        assert!(matches!(
            stale,
            Err(GatewayError::StaleVersion { based_on: 2, .. })
        ));
    }
}
