//! `Path`, `Query` and `Json` wrappers whose rejections are [`GatewayError`]s.
//!
//! axum's own extractors answer malformed input with a `text/plain` body.
//! These wrappers keep every client error on the JSON error envelope.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

/// Path parameters, rejected as [`GatewayError::InvalidRequest`].
#[derive(Debug, Clone, Copy)]
pub struct ApiPath<T>(pub T);

/// Query string, rejected as [`GatewayError::InvalidRequest`].
#[derive(Debug, Clone, Copy)]
pub struct ApiQuery<T>(pub T);

/// JSON request body, rejected as [`GatewayError::InvalidRequest`].
#[derive(Debug, Clone, Copy)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(path_error(&rejection)),
        }
    }
}

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection: QueryRejection| {
                GatewayError::InvalidRequest(rejection.body_text())
            })
    }
}

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection: JsonRejection| {
                GatewayError::InvalidRequest(rejection.body_text())
            })
    }
}

/// A route that declares fewer parameters than the handler reads is a
/// server bug, not a client error.
fn path_error(rejection: &PathRejection) -> GatewayError {
    if rejection.status().is_server_error() {
        GatewayError::Internal(rejection.body_text())
    } else {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}
