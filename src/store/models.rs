//! Database row models for the PostgreSQL backend.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ActorId, EventId, EventPayload, EventSnapshot, VersionNumber};
use crate::error::GatewayError;

/// A row from the `event_versions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    /// Owning event.
    pub event_id: Uuid,
    /// Version number (`> 0`, enforced by a CHECK constraint).
    pub version_number: i32,
    /// JSONB payload.
    pub payload: serde_json::Value,
    /// Acting user.
    pub changed_by: Uuid,
    /// Change type discriminator (`"create"`, `"update"`, ...).
    pub change_type: String,
    /// Human-readable summary.
    pub summary: String,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for EventSnapshot {
    type Error = GatewayError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let version_number = VersionNumber::try_from(i64::from(row.version_number))
            .map_err(|_| {
                GatewayError::Internal(format!(
                    "stored version {} of event {} is not positive",
                    row.version_number, row.event_id
                ))
            })?;
        Ok(Self {
            event_id: EventId::from_uuid(row.event_id),
            version_number,
            payload: serde_json::from_value::<EventPayload>(row.payload)?,
            changed_by: ActorId::from_uuid(row.changed_by),
            change_type: row.change_type.parse()?,
            summary: row.summary,
            created_at: row.created_at,
        })
    }
}

/// A row from the `event_permissions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PermissionRow {
    /// Event the grant applies to.
    pub event_id: Uuid,
    /// Permission level discriminator (`"viewer"`, `"editor"`, `"owner"`).
    pub level: String,
}
