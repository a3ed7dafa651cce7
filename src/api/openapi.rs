//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    BatchCreateRequest, ChangelogResponse, DiffResponse, EventListResponse, EventPatch,
    EventResponse, GrantPermissionRequest, HistoryResponse, PaginationMeta,
    PermissionListResponse, PermissionResponse,
};
use super::handlers::{events, permissions, system, versions};
use crate::domain::{
    ActorId, ChangeKind, ChangeType, EventId, EventPayload, EventSnapshot, FieldChange,
    PermissionLevel, VersionNumber,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::ChangelogEntry;
use crate::service::diff::DiffSummary;

/// Generated API description served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "tempo-gateway",
        description = "Versioned event scheduling: history, diffs, changelog and rollback."
    ),
    paths(
        events::create_event,
        events::create_events_batch,
        events::list_events,
        events::get_event,
        events::update_event,
        events::delete_event,
        permissions::list_permissions,
        permissions::grant_permission,
        permissions::revoke_permission,
        versions::list_versions,
        versions::get_version,
        versions::diff_versions,
        versions::changelog,
        versions::rollback,
        system::health_handler,
    ),
    components(schemas(
        ActorId,
        BatchCreateRequest,
        ChangeKind,
        ChangeType,
        ChangelogEntry,
        ChangelogResponse,
        DiffResponse,
        DiffSummary,
        ErrorBody,
        ErrorResponse,
        EventId,
        EventListResponse,
        EventPatch,
        EventPayload,
        EventResponse,
        EventSnapshot,
        FieldChange,
        GrantPermissionRequest,
        HistoryResponse,
        PaginationMeta,
        PermissionLevel,
        PermissionListResponse,
        PermissionResponse,
        VersionNumber,
        system::HealthResponse,
    )),
    tags(
        (name = "Events", description = "Event CRUD"),
        (name = "Permissions", description = "Sharing"),
        (name = "Versions", description = "History, diff, changelog and rollback"),
        (name = "System", description = "Service status"),
    )
)]
pub struct ApiDoc;
