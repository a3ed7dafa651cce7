//! Field-level change records produced by the diff engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Classification of one field between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only in the newer snapshot.
    Added,
    /// Present only in the older snapshot.
    Removed,
    /// Present in both with different values.
    Modified,
    /// Present in both with equal values.
    Unchanged,
}

/// Before/after state of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldChange {
    /// Payload field name.
    pub field_name: String,
    /// Value in the older snapshot (`null` if absent).
    #[schema(value_type = Option<Object>)]
    pub old_value: Option<Value>,
    /// Value in the newer snapshot (`null` if absent).
    #[schema(value_type = Option<Object>)]
    pub new_value: Option<Value>,
    /// Classification of the change.
    pub change_kind: ChangeKind,
}
