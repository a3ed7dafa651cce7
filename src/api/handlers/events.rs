//! Event CRUD handlers: create, batch create, list, get, update, delete.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::actor::Actor;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::dto::{BatchCreateRequest, EventListResponse, EventPatch, EventResponse};
use crate::app_state::AppState;
use crate::domain::{EventId, EventPayload};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::MAX_BATCH_EVENTS;

/// `POST /events`: Create an event owned by the caller.
///
/// # Errors
///
/// Returns [`GatewayError`] on validation failure or a store error.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates an event from the given field-set. The caller becomes its owner and version 1 is recorded.",
    params(("x-actor-id" = uuid::Uuid, Header, description = "Acting user")),
    request_body = EventPayload,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Invalid event fields", body = ErrorResponse),
        (status = 401, description = "Missing actor header", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(payload): ApiJson<EventPayload>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.event_service.create(actor, payload).await?;
    Ok((StatusCode::CREATED, Json(EventResponse::from(snapshot))))
}

/// `POST /events/batch`: Create several events owned by the caller.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the batch is empty, holds
/// more than [`MAX_BATCH_EVENTS`] events or any event is invalid; nothing
/// is created in that case.
#[utoipa::path(
    post,
    path = "/api/v1/events/batch",
    tag = "Events",
    summary = "Create events in bulk",
    description = "Validates every event first and rejects the whole batch if any is invalid. Each created event starts at version 1 and is owned by the caller.",
    params(("x-actor-id" = uuid::Uuid, Header, description = "Acting user")),
    request_body = BatchCreateRequest,
    responses(
        (status = 201, description = "Events created, in request order", body = EventListResponse),
        (status = 400, description = "Invalid batch", body = ErrorResponse),
        (status = 401, description = "Missing actor header", body = ErrorResponse),
    )
)]
pub async fn create_events_batch(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<BatchCreateRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let data = state
        .event_service
        .create_batch(actor, req.events)
        .await?
        .into_iter()
        .map(EventResponse::from)
        .collect();
    Ok((StatusCode::CREATED, Json(EventListResponse { data })))
}

/// `GET /events`: List live events the caller can see.
///
/// # Errors
///
/// Returns [`GatewayError`] on a store error.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List events",
    description = "Returns the current version of every non-deleted event the caller holds a permission on.",
    params(("x-actor-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 200, description = "Visible events", body = EventListResponse),
        (status = 401, description = "Missing actor header", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let data = state
        .event_service
        .list(actor)
        .await?
        .into_iter()
        .map(EventResponse::from)
        .collect();
    Ok(Json(EventListResponse { data }))
}

/// `GET /events/:id`: Current state of an event.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] or
/// [`GatewayError::PermissionDenied`].
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an event",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Current event state", body = EventResponse),
        (status = 403, description = "Caller lacks Viewer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.event_service.get(actor, EventId::from(id)).await?;
    Ok(Json(EventResponse::from(snapshot)))
}

/// `PATCH /events/:id`: Merge fields into an event.
///
/// # Errors
///
/// Returns [`GatewayError`] on validation, permission or store failure.
#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Update an event",
    description = "Merges the given fields into the current version and records a new version. A null value clears a field. A patch that changes nothing records no version.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    request_body = EventPatch,
    responses(
        (status = 200, description = "Updated event", body = EventResponse),
        (status = 400, description = "Invalid event fields", body = ErrorResponse),
        (status = 403, description = "Caller lacks Editor", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Version allocation kept conflicting", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<EventPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state
        .event_service
        .update(actor, EventId::from(id), &patch.0)
        .await?;
    Ok(Json(EventResponse::from(snapshot)))
}

/// `DELETE /events/:id`: Tombstone an event.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] or
/// [`GatewayError::PermissionDenied`].
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete an event",
    description = "Records a delete version. History stays readable and a rollback restores the event.",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-actor-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Tombstone version", body = EventResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.event_service.delete(actor, EventId::from(id)).await?;
    Ok(Json(EventResponse::from(snapshot)))
}

/// Event CRUD routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/batch", post(create_events_batch))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
}
