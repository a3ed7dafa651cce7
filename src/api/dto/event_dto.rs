//! Event CRUD and sharing DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{
    ActorId, ChangeType, EventId, EventPayload, EventSnapshot, PermissionLevel, VersionNumber,
};

/// Request body for `PATCH /events/:id`.
///
/// Any subset of event fields. A `null` clears the field.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct EventPatch(pub serde_json::Map<String, Value>);

/// Current state of an event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    /// Event identifier.
    pub event_id: EventId,
    /// Current version number.
    pub version: VersionNumber,
    /// Current field-set.
    pub payload: EventPayload,
    /// Mutation that produced the current version.
    pub change_type: ChangeType,
    /// Actor that produced the current version.
    pub updated_by: ActorId,
    /// When the current version was written.
    pub updated_at: DateTime<Utc>,
}

impl From<EventSnapshot> for EventResponse {
    fn from(s: EventSnapshot) -> Self {
        Self {
            event_id: s.event_id,
            version: s.version_number,
            payload: s.payload,
            change_type: s.change_type,
            updated_by: s.changed_by,
            updated_at: s.created_at,
        }
    }
}

/// Request body for `POST /events/batch`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchCreateRequest {
    /// Events to create, 1 to 100.
    pub events: Vec<EventPayload>,
}

/// Response body for `GET /events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Live events visible to the caller.
    pub data: Vec<EventResponse>,
}

/// Request body for `PUT /events/:id/permissions/:actor_id`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantPermissionRequest {
    /// Level to grant.
    pub level: PermissionLevel,
}

/// Response body for a successful grant.
#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionResponse {
    /// Event the grant applies to.
    pub event_id: EventId,
    /// Actor that received the grant.
    pub actor_id: ActorId,
    /// Granted level.
    pub level: PermissionLevel,
}

/// Response body for `GET /events/:id/permissions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionListResponse {
    /// Event the grants apply to.
    pub event_id: EventId,
    /// Grants, highest level first.
    pub data: Vec<PermissionResponse>,
}
