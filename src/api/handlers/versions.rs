//! Version history handlers: list, get, diff, changelog, rollback.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::actor::Actor;
use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::dto::{
    ChangelogResponse, DiffParams, DiffResponse, EventResponse, HistoryResponse, PaginationParams,
};
use crate::app_state::AppState;
use crate::domain::{EventId, EventSnapshot, VersionNumber};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::diff::{self, DiffOptions, DiffSummary};

/// `GET /events/:id/versions`: Paginated version history.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] or
/// [`GatewayError::PermissionDenied`].
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/versions",
    tag = "Versions",
    summary = "List versions",
    description = "Returns the event's snapshots in ascending version order.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
        PaginationParams,
    ),
    responses(
        (status = 200, description = "Version history page", body = HistoryResponse),
        (status = 403, description = "Caller lacks Viewer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_versions(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from(id);
    state.version_service.authorize_read(event_id, actor).await?;

    let history = state.version_service.history(event_id).await?;
    let (data, pagination) = params.paginate(history);
    Ok(Json(HistoryResponse {
        event_id,
        data,
        pagination,
    }))
}

/// `GET /events/:id/versions/:version`: One snapshot.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidVersion`] for a non-positive number,
/// otherwise as for [`list_versions`] plus
/// [`GatewayError::VersionNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/versions/{version}",
    tag = "Versions",
    summary = "Get a version",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("version" = i64, Path, description = "Version number (1-based)"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Snapshot", body = EventSnapshot),
        (status = 400, description = "Version number is not positive", body = ErrorResponse),
        (status = 403, description = "Caller lacks Viewer", body = ErrorResponse),
        (status = 404, description = "Event or version not found", body = ErrorResponse),
    )
)]
pub async fn get_version(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath((id, version)): ApiPath<(Uuid, i64)>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from(id);
    let version = VersionNumber::try_from(version)?;
    state.version_service.authorize_read(event_id, actor).await?;

    let snapshot = state.version_service.version(event_id, version).await?;
    Ok(Json(snapshot))
}

/// `GET /events/:id/diff?from=&to=`: Field-level diff between two versions.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidVersion`] for a non-positive number,
/// [`GatewayError::EventNotFound`], [`GatewayError::PermissionDenied`] or
/// [`GatewayError::VersionNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/diff",
    tag = "Versions",
    summary = "Diff two versions",
    description = "Compares version `from` against version `to`. Changes are listed in canonical field order; swapping the versions swaps added and removed.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
        DiffParams,
    ),
    responses(
        (status = 200, description = "Field changes", body = DiffResponse),
        (status = 400, description = "Version number is not positive", body = ErrorResponse),
        (status = 403, description = "Caller lacks Viewer", body = ErrorResponse),
        (status = 404, description = "Event or version not found", body = ErrorResponse),
    )
)]
pub async fn diff_versions(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DiffParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from(id);
    let from = VersionNumber::try_from(params.from)?;
    let to = VersionNumber::try_from(params.to)?;
    state.version_service.authorize_read(event_id, actor).await?;

    let options = DiffOptions {
        include_unchanged: params.include_unchanged,
    };
    let changes = state
        .version_service
        .diff(event_id, from, to, options)
        .await?;
    let text = diff::render_text(&changes, &format!("v{from}"), &format!("v{to}"));

    Ok(Json(DiffResponse {
        event_id,
        from,
        to,
        summary: DiffSummary::of(&changes),
        changes,
        text,
    }))
}

/// `GET /events/:id/changelog`: Paginated per-version deltas.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] or
/// [`GatewayError::PermissionDenied`].
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/changelog",
    tag = "Versions",
    summary = "Changelog",
    description = "Every version with its changes against the previous one. The first entry is marked initial and carries no changes.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
        PaginationParams,
    ),
    responses(
        (status = 200, description = "Changelog page", body = ChangelogResponse),
        (status = 403, description = "Caller lacks Viewer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn changelog(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from(id);
    state.version_service.authorize_read(event_id, actor).await?;

    let entries = state.version_service.changelog(event_id).await?;
    let (data, pagination) = params.paginate(entries);
    Ok(Json(ChangelogResponse {
        event_id,
        data,
        pagination,
    }))
}

/// `POST /events/:id/rollback/:version`: Republish an earlier version.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidVersion`], [`GatewayError::EventNotFound`],
/// [`GatewayError::PermissionDenied`] or [`GatewayError::VersionNotFound`],
/// checked in that order.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/rollback/{version}",
    tag = "Versions",
    summary = "Roll back to a version",
    description = "Records a new version whose fields equal the target version's. Existing versions are never modified.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("version" = i64, Path, description = "Target version number"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "New current version", body = EventResponse),
        (status = 400, description = "Version number is not positive", body = ErrorResponse),
        (status = 403, description = "Caller lacks Editor", body = ErrorResponse),
        (status = 404, description = "Event or version not found", body = ErrorResponse),
        (status = 409, description = "Version allocation kept conflicting", body = ErrorResponse),
    )
)]
pub async fn rollback(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath((id, version)): ApiPath<(Uuid, i64)>,
) -> Result<impl IntoResponse, GatewayError> {
    let target = VersionNumber::try_from(version)?;
    let snapshot = state
        .version_service
        .rollback(EventId::from(id), target, actor)
        .await?;
    Ok(Json(EventResponse::from(snapshot)))
}

/// Version history routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/versions", get(list_versions))
        .route("/events/{id}/versions/{version}", get(get_version))
        .route("/events/{id}/diff", get(diff_versions))
        .route("/events/{id}/changelog", get(changelog))
        .route("/events/{id}/rollback/{version}", post(rollback))
}
