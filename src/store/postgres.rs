//! PostgreSQL implementation of the storage layer.
//!
//! Version allocation relies on the `UNIQUE (event_id, version_number)`
//! constraint: each attempt reads the current maximum and inserts
//! `max + 1` in one transaction. A concurrent writer that commits the same
//! number first makes the insert fail with a unique violation, and the
//! attempt is repeated against the new maximum. After
//! [`RetryPolicy::version_retry_limit`] lost races the call fails with
//! [`GatewayError::ConcurrencyConflict`].
//!
//! Every `record` call tags its row with a fresh `record_key`. If `COMMIT`
//! fails, the key tells whether the row landed before the attempt is
//! retried, so a lost commit acknowledgement never appends twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{PermissionRow, SnapshotRow};
use super::retry::{AllocationError, RetryPolicy};
use super::{PermissionStore, VersionStore, next_version};
use crate::domain::{
    ActorId, EventId, EventSnapshot, NewSnapshot, PermissionLevel, VersionNumber,
};
use crate::error::GatewayError;

const SNAPSHOT_COLUMNS: &str =
    "event_id, version_number, payload, changed_by, change_type, summary, created_at";

/// PostgreSQL-backed version store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresVersionStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresVersionStore {
    /// Creates a new version store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// One read-max-then-insert attempt inside a single transaction.
    async fn try_record(
        &self,
        new: &NewSnapshot,
        record_key: Uuid,
    ) -> Result<EventSnapshot, AllocationError> {
        let mut tx = self.pool.begin().await?;

        let (current, last_at) = sqlx::query_as::<_, (Option<i32>, Option<DateTime<Utc>>)>(
            "SELECT MAX(version_number), MAX(created_at) FROM event_versions WHERE event_id = $1",
        )
        .bind(*new.event_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        let current = current
            .map(|v| VersionNumber::try_from(i64::from(v)))
            .transpose()
            .map_err(AllocationError::Rejected)?;
        let version = next_version(new, current).map_err(AllocationError::Rejected)?;
        let version_column = i32::try_from(version).map_err(AllocationError::Rejected)?;
        let payload = serde_json::to_value(&new.payload)
            .map_err(|e| AllocationError::Rejected(GatewayError::from(e)))?;

        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "INSERT INTO event_versions \
             (event_id, version_number, payload, changed_by, change_type, summary, created_at, record_key) \
             VALUES ($1, $2, $3, $4, $5, $6, GREATEST(now(), COALESCE($7, now())), $8) \
             RETURNING created_at",
        )
        .bind(*new.event_id.as_uuid())
        .bind(version_column)
        .bind(&payload)
        .bind(*new.changed_by.as_uuid())
        .bind(new.change_type.as_str())
        .bind(&new.summary)
        .bind(last_at)
        .bind(record_key)
        .fetch_one(&mut *tx)
        .await?;

        match tx.commit().await {
            Ok(()) => Ok(new.clone().into_snapshot(version, created_at)),
            Err(err) => self.settle_commit(record_key, err).await,
        }
    }

    /// Resolves a failed `COMMIT` whose outcome is unknown.
    ///
    /// A row carrying `record_key` means the commit landed and is returned
    /// as the result. No row means nothing was written and the original
    /// error goes back to the retry loop. If the lookup fails too, the
    /// outcome stays unknown and the call fails without retrying.
    async fn settle_commit(
        &self,
        record_key: Uuid,
        err: sqlx::Error,
    ) -> Result<EventSnapshot, AllocationError> {
        let landed = self
            .retry
            .run_transient("settle commit", || self.fetch_by_record_key(record_key))
            .await;
        if let Ok(Some(_)) = &landed {
            tracing::warn!(error = %err, %record_key, "commit acknowledgement lost, row is present");
        }
        settle_outcome(err, landed)
    }

    async fn fetch_by_record_key(
        &self,
        record_key: Uuid,
    ) -> Result<Option<SnapshotRow>, sqlx::Error> {
        sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM event_versions WHERE record_key = $1"
        ))
        .bind(record_key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn fetch_all(&self, event_id: EventId) -> Result<Vec<SnapshotRow>, sqlx::Error> {
        sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM event_versions \
             WHERE event_id = $1 ORDER BY version_number ASC"
        ))
        .bind(*event_id.as_uuid())
        .fetch_all(&self.pool)
        .await
    }

    async fn fetch_one(
        &self,
        event_id: EventId,
        version: i32,
    ) -> Result<Option<SnapshotRow>, sqlx::Error> {
        sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM event_versions \
             WHERE event_id = $1 AND version_number = $2"
        ))
        .bind(*event_id.as_uuid())
        .bind(version)
        .fetch_optional(&self.pool)
        .await
    }

    async fn fetch_latest(&self, event_id: EventId) -> Result<Option<SnapshotRow>, sqlx::Error> {
        sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM event_versions \
             WHERE event_id = $1 ORDER BY version_number DESC LIMIT 1"
        ))
        .bind(*event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
    }

    async fn fetch_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT event_id FROM event_versions ORDER BY event_id",
        )
        .fetch_all(&self.pool)
        .await
    }
}

/// Decides a failed commit from the `record_key` lookup.
fn settle_outcome(
    commit_err: sqlx::Error,
    landed: Result<Option<SnapshotRow>, sqlx::Error>,
) -> Result<EventSnapshot, AllocationError> {
    match landed {
        Ok(Some(row)) => EventSnapshot::try_from(row).map_err(AllocationError::Rejected),
        Ok(None) => Err(AllocationError::Db(commit_err)),
        Err(lookup) => Err(AllocationError::Rejected(GatewayError::PersistenceError(
            format!("commit outcome unknown ({commit_err}); lookup failed: {lookup}"),
        ))),
    }
}

#[async_trait]
impl VersionStore for PostgresVersionStore {
    async fn record(&self, new: NewSnapshot) -> Result<EventSnapshot, GatewayError> {
        let record_key = Uuid::new_v4();
        let snapshot = self
            .retry
            .run_allocation(new.event_id, || self.try_record(&new, record_key))
            .await?;
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
        let not_found = GatewayError::VersionNotFound {
            event: *event_id.as_uuid(),
            version: version.get(),
        };
        // Nothing past the column range can have been stored.
        let Ok(column) = i32::try_from(version) else {
            return Err(not_found);
        };
        self.retry
            .run_transient("get version", || self.fetch_one(event_id, column))
            .await?
            .ok_or(not_found)?
            .try_into()
    }

    async fn list(&self, event_id: EventId) -> Result<Vec<EventSnapshot>, GatewayError> {
        let rows = self
            .retry
            .run_transient("list versions", || self.fetch_all(event_id))
            .await?;
        if rows.is_empty() {
            return Err(GatewayError::EventNotFound(*event_id.as_uuid()));
        }
        rows.into_iter().map(EventSnapshot::try_from).collect()
    }

    async fn latest(&self, event_id: EventId) -> Result<EventSnapshot, GatewayError> {
        self.retry
            .run_transient("latest version", || self.fetch_latest(event_id))
            .await?
            .ok_or(GatewayError::EventNotFound(*event_id.as_uuid()))?
            .try_into()
    }

    async fn event_ids(&self) -> Result<Vec<EventId>, GatewayError> {
        let ids = self
            .retry
            .run_transient("list event ids", || self.fetch_ids())
            .await?;
        Ok(ids.into_iter().map(EventId::from_uuid).collect())
    }
}

/// PostgreSQL-backed permission store.
#[derive(Debug, Clone)]
pub struct PostgresPermissionStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresPermissionStore {
    /// Creates a new permission store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    async fn grant(
        &self,
        event_id: EventId,
        actor: ActorId,
        level: PermissionLevel,
    ) -> Result<(), GatewayError> {
        self.retry
            .run_transient("grant permission", || {
                sqlx::query(
                    "INSERT INTO event_permissions (event_id, actor_id, level) VALUES ($1, $2, $3) \
                     ON CONFLICT (event_id, actor_id) \
                     DO UPDATE SET level = EXCLUDED.level, updated_at = now()",
                )
                .bind(*event_id.as_uuid())
                .bind(*actor.as_uuid())
                .bind(level.as_str())
                .execute(&self.pool)
            })
            .await?;
        Ok(())
    }

    async fn revoke(&self, event_id: EventId, actor: ActorId) -> Result<bool, GatewayError> {
        let result = self
            .retry
            .run_transient("revoke permission", || {
                sqlx::query("DELETE FROM event_permissions WHERE event_id = $1 AND actor_id = $2")
                    .bind(*event_id.as_uuid())
                    .bind(*actor.as_uuid())
                    .execute(&self.pool)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn level_of(
        &self,
        event_id: EventId,
        actor: ActorId,
    ) -> Result<Option<PermissionLevel>, GatewayError> {
        let level = self
            .retry
            .run_transient("load permission", || {
                sqlx::query_scalar::<_, String>(
                    "SELECT level FROM event_permissions WHERE event_id = $1 AND actor_id = $2",
                )
                .bind(*event_id.as_uuid())
                .bind(*actor.as_uuid())
                .fetch_optional(&self.pool)
            })
            .await?;
        level.map(|l| l.parse()).transpose()
    }

    async fn grants_for(
        &self,
        event_id: EventId,
    ) -> Result<Vec<(ActorId, PermissionLevel)>, GatewayError> {
        let rows = self
            .retry
            .run_transient("list grants", || {
                sqlx::query_as::<_, (Uuid, String)>(
                    "SELECT actor_id, level FROM event_permissions WHERE event_id = $1",
                )
                .bind(*event_id.as_uuid())
                .fetch_all(&self.pool)
            })
            .await?;
        let mut grants = rows
            .into_iter()
            .map(|(actor, level)| -> Result<_, GatewayError> {
                Ok((ActorId::from(actor), level.parse::<PermissionLevel>()?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        grants.sort_by(|(a, la), (b, lb)| lb.cmp(la).then_with(|| a.cmp(b)));
        Ok(grants)
    }

    async fn events_for(
        &self,
        actor: ActorId,
    ) -> Result<Vec<(EventId, PermissionLevel)>, GatewayError> {
        let rows = self
            .retry
            .run_transient("list permissions", || {
                sqlx::query_as::<_, PermissionRow>(
                    "SELECT event_id, level FROM event_permissions \
                     WHERE actor_id = $1 ORDER BY event_id",
                )
                .bind(*actor.as_uuid())
                .fetch_all(&self.pool)
            })
            .await?;
        rows.into_iter()
            .map(|row| -> Result<_, GatewayError> {
                Ok((EventId::from_uuid(row.event_id), row.level.parse()?))
            })
            .collect()
    }
}
