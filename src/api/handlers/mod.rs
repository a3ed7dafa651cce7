//! REST endpoint handlers organized by resource.

pub mod events;
pub mod permissions;
pub mod system;
pub mod versions;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(permissions::routes())
        .merge(versions::routes())
}
