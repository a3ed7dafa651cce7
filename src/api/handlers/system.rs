//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` when the version store answered, `degraded` otherwise.
    status: &'static str,
    /// Number of events with at least one version; absent when degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    tracked_events: Option<usize>,
    timestamp: String,
    version: &'static str,
}

/// `GET /health`: service and storage status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reads the version store. Returns 503 when it cannot be read.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Version store unavailable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label, tracked_events) = match state.version_service.tracked_events().await {
        Ok(count) => (StatusCode::OK, "healthy", Some(count)),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", None)
        }
    };
    (
        status,
        Json(HealthResponse {
            status: label,
            tracked_events,
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
