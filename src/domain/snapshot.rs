//! Immutable per-version records of an event.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ActorId, EventId, EventPayload, VersionNumber};
use crate::error::GatewayError;

/// Kind of mutation that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// First version of a new event.
    Create,
    /// Field update of an existing event.
    Update,
    /// Tombstone; the event is no longer live.
    Delete,
    /// Republication of an earlier version's payload.
    Rollback,
}

impl ChangeType {
    /// Stable string form used on the wire and in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "rollback" => Ok(Self::Rollback),
            other => Err(GatewayError::Internal(format!(
                "unknown change type in store: {other}"
            ))),
        }
    }
}

/// One immutable version of an event.
///
/// Written exactly once by a version store and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventSnapshot {
    /// Owning event; identical for every version of it.
    pub event_id: EventId,
    /// Position in the event's history, starting at 1.
    pub version_number: VersionNumber,
    /// Complete field-set of the event at this version.
    pub payload: EventPayload,
    /// Actor that produced this version.
    pub changed_by: ActorId,
    /// Mutation that produced this version.
    pub change_type: ChangeType,
    /// Short human-readable description of the mutation.
    pub summary: String,
    /// Write timestamp, non-decreasing along the history.
    pub created_at: DateTime<Utc>,
}

impl EventSnapshot {
    /// Returns `true` if this snapshot marks the event as deleted.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_deleted()
    }
}

/// Input to a version store `record` call: everything except the fields
/// the store allocates (`version_number`, `created_at`).
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    /// Owning event.
    pub event_id: EventId,
    /// Full payload to store.
    pub payload: EventPayload,
    /// Acting user.
    pub changed_by: ActorId,
    /// Mutation kind.
    pub change_type: ChangeType,
    /// Human-readable description.
    pub summary: String,
    /// Version the payload was derived from. When set, the store refuses
    /// to append unless this is still the latest version.
    pub based_on: Option<VersionNumber>,
}

impl NewSnapshot {
    /// Materializes the snapshot once the store has allocated its slot.
    #[must_use]
    pub fn into_snapshot(
        self,
        version_number: VersionNumber,
        created_at: DateTime<Utc>,
    ) -> EventSnapshot {
        EventSnapshot {
            event_id: self.event_id,
            version_number,
            payload: self.payload,
            changed_by: self.changed_by,
            change_type: self.change_type,
            summary: self.summary,
            created_at,
        }
    }
}
