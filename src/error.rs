//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2002,
///     "message": "version 7 not found for event 5f0c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`GatewayError`] for the ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                          |
/// |-----------|-----------------------|--------------------------------------|
/// | 1000–1999 | Validation / Identity | 400 Bad Request / 401 Unauthorized   |
/// | 2000–2999 | Access / State        | 403 Forbidden / 404 / 409 Conflict   |
/// | 3000–3999 | Server                | 500 Internal Server Error            |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A version number supplied by the client is not a positive integer.
    #[error("invalid version number: {0}")]
    InvalidVersion(i64),

    /// The request carries no usable actor identity.
    #[error("missing or malformed actor identity")]
    Unauthenticated,

    /// The actor lacks the permission level required by the operation.
    #[error("actor {actor} lacks {required} permission on event {event}")]
    PermissionDenied {
        /// Event the operation targeted.
        event: uuid::Uuid,
        /// Actor that attempted the operation.
        actor: uuid::Uuid,
        /// Minimum level the operation requires.
        required: String,
    },

    /// Event with the given ID has no recorded versions (or is deleted).
    #[error("event not found: {0}")]
    EventNotFound(uuid::Uuid),

    /// The requested version does not exist for the event.
    #[error("version {version} not found for event {event}")]
    VersionNotFound {
        /// Event whose history was searched.
        event: uuid::Uuid,
        /// Version number that was requested.
        version: u32,
    },

    /// The snapshot was derived from a version that is no longer the
    /// latest one.
    #[error("event {event} moved past version {based_on}")]
    StaleVersion {
        /// Event being written.
        event: uuid::Uuid,
        /// Version the caller read before deriving the new payload.
        based_on: u32,
    },

    /// Version number allocation lost a race too many times.
    #[error("concurrent modification of event {0}; retry the operation")]
    ConcurrencyConflict(uuid::Uuid),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidVersion(_) => 1002,
            Self::Unauthenticated => 1003,
            Self::EventNotFound(_) => 2001,
            Self::VersionNotFound { .. } => 2002,
            Self::PermissionDenied { .. } => 2003,
            Self::ConcurrencyConflict(_) => 2004,
            Self::StaleVersion { .. } => 2005,
            Self::PersistenceError(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidVersion(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Self::EventNotFound(_) | Self::VersionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ConcurrencyConflict(_) | Self::StaleVersion { .. } => StatusCode::CONFLICT,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("payload serialization: {err}"))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_map_to_404() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            GatewayError::EventNotFound(id).status_code(),
            StatusCode::NOT_FOUND
        );
        let err = GatewayError::VersionNotFound {
            event: id,
            version: 3,
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2002);
    }

    #[test]
    fn error_kinds_map_to_conventional_statuses() {
        let id = uuid::Uuid::new_v4();
        let denied = GatewayError::PermissionDenied {
            event: id,
            actor: id,
            required: "editor".to_string(),
        };
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::ConcurrencyConflict(id).status_code(),
            StatusCode::CONFLICT
        );
        let stale = GatewayError::StaleVersion {
            event: id,
            based_on: 1,
        };
        assert_eq!(stale.status_code(), StatusCode::CONFLICT);
        assert_eq!(stale.error_code(), 2005);
        assert_eq!(
            GatewayError::InvalidVersion(0).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::PersistenceError("down".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn into_response_carries_status() {
        let response = GatewayError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
