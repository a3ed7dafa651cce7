//! Sharing handlers: grant and revoke permissions on an event.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::actor::Actor;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::dto::{GrantPermissionRequest, PermissionListResponse, PermissionResponse};
use crate::app_state::AppState;
use crate::domain::{ActorId, EventId};
use crate::error::{ErrorResponse, GatewayError};

/// `PUT /events/:id/permissions/:actor_id`: Grant or change a level.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`],
/// [`GatewayError::PermissionDenied`] when the caller is not the owner, or
/// [`GatewayError::InvalidRequest`] when targeting oneself.
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}/permissions/{actor_id}",
    tag = "Permissions",
    summary = "Grant a permission",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("actor_id" = Uuid, Path, description = "User receiving the grant"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    request_body = GrantPermissionRequest,
    responses(
        (status = 200, description = "Grant stored", body = PermissionResponse),
        (status = 400, description = "Invalid target", body = ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn grant_permission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath((id, target)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<GrantPermissionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from(id);
    let target = ActorId::from(target);
    state
        .event_service
        .share(actor, event_id, target, req.level)
        .await?;
    Ok(Json(PermissionResponse {
        event_id,
        actor_id: target,
        level: req.level,
    }))
}

/// `DELETE /events/:id/permissions/:actor_id`: Revoke a grant.
///
/// # Errors
///
/// As for [`grant_permission`]; also [`GatewayError::InvalidRequest`] if the
/// target holds no grant.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}/permissions/{actor_id}",
    tag = "Permissions",
    summary = "Revoke a permission",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("actor_id" = Uuid, Path, description = "User losing the grant"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 204, description = "Grant removed"),
        (status = 400, description = "Invalid target", body = ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath((id, target)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .event_service
        .unshare(actor, EventId::from(id), ActorId::from(target))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /events/:id/permissions`: Everyone holding a grant on the event.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] or
/// [`GatewayError::PermissionDenied`] below Viewer.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/permissions",
    tag = "Permissions",
    summary = "List permissions",
    description = "Lists every grant on the event, highest level first. The owner is listed as an owner grant.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Grants on the event", body = PermissionListResponse),
        (status = 403, description = "Caller lacks Viewer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from(id);
    let data = state
        .event_service
        .grants(actor, event_id)
        .await?
        .into_iter()
        .map(|(actor_id, level)| PermissionResponse {
            event_id,
            actor_id,
            level,
        })
        .collect();
    Ok(Json(PermissionListResponse { event_id, data }))
}

/// Permission routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/permissions", get(list_permissions))
        .route(
            "/events/{id}/permissions/{actor_id}",
            put(grant_permission).delete(revoke_permission),
        )
}
