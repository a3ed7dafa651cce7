//! Acting-user extraction.
//!
//! Authentication happens upstream; the gateway receives the resolved user
//! as a UUID in the `X-Actor-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::ActorId;
use crate::error::GatewayError;

/// Header carrying the authenticated user's ID.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user performing the current request.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub ActorId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<ActorId>().ok())
            .map(Actor)
            .ok_or(GatewayError::Unauthenticated)
    }
}
