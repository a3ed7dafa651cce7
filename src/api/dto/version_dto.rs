//! History, diff and changelog DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::PaginationMeta;
use crate::domain::{EventId, EventSnapshot, FieldChange, VersionNumber};
use crate::service::ChangelogEntry;
use crate::service::diff::DiffSummary;

/// Response body for `GET /events/:id/versions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Event identifier.
    pub event_id: EventId,
    /// Snapshots in ascending version order.
    pub data: Vec<EventSnapshot>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `GET /events/:id/changelog`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChangelogResponse {
    /// Event identifier.
    pub event_id: EventId,
    /// Per-version entries in ascending version order.
    pub data: Vec<ChangelogEntry>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Query parameters for `GET /events/:id/diff`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DiffParams {
    /// Older version number.
    pub from: i64,
    /// Newer version number.
    pub to: i64,
    /// Also list fields that did not change.
    #[serde(default)]
    pub include_unchanged: bool,
}

/// Response body for `GET /events/:id/diff`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DiffResponse {
    /// Event identifier.
    pub event_id: EventId,
    /// Older version.
    pub from: VersionNumber,
    /// Newer version.
    pub to: VersionNumber,
    /// Field changes in canonical field order.
    pub changes: Vec<FieldChange>,
    /// Counts per change kind.
    pub summary: DiffSummary,
    /// Unified-style text rendering of `changes`.
    pub text: String,
}
