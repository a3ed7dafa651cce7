//! Full field-set of an event at one version.
//!
//! [`EventPayload`] is a complete copy of the event's fields, never a
//! delta. Fields are stored by name; a JSON `null` is treated as "field
//! absent" and dropped on construction, so `{"location": null}` and `{}`
//! describe the same event.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Event title (required on create).
pub const TITLE: &str = "title";
/// Free-form description.
pub const DESCRIPTION: &str = "description";
/// Where the event takes place.
pub const LOCATION: &str = "location";
/// RFC 3339 start timestamp.
pub const START_TIME: &str = "start_time";
/// RFC 3339 end timestamp.
pub const END_TIME: &str = "end_time";
/// Whether the event recurs.
pub const IS_RECURRING: &str = "is_recurring";
/// Recurrence kind (`daily`, `weekly`, ...).
pub const RECURRENCE_TYPE: &str = "recurrence_type";
/// Structured recurrence details.
pub const RECURRENCE_PATTERN: &str = "recurrence_pattern";
/// Tombstone marker set by delete.
pub const IS_DELETED: &str = "is_deleted";

/// Canonical order in which fields are reported. Fields outside this list
/// sort after it, lexicographically.
pub const CANONICAL_FIELDS: [&str; 9] = [
    TITLE,
    DESCRIPTION,
    LOCATION,
    START_TIME,
    END_TIME,
    IS_RECURRING,
    RECURRENCE_TYPE,
    RECURRENCE_PATTERN,
    IS_DELETED,
];

/// Orders two field names by [`CANONICAL_FIELDS`] position, unknown names last.
#[must_use]
pub fn canonical_cmp(a: &str, b: &str) -> Ordering {
    let rank = |name: &str| {
        CANONICAL_FIELDS
            .iter()
            .position(|f| *f == name)
            .unwrap_or(CANONICAL_FIELDS.len())
    };
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

/// The complete set of fields of an event at one version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
#[schema(value_type = Object)]
pub struct EventPayload(BTreeMap<String, Value>);

impl EventPayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets `field` to `value`. A `null` value removes the field.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if value.is_null() {
            self.0.remove(&field);
        } else {
            self.0.insert(field, value);
        }
    }

    /// Builder-style [`Self::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value.into());
        self
    }

    /// Returns `true` if the payload has a field called `field`.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names in canonical order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_by(|a, b| canonical_cmp(a, b));
        names
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The event title, when present and a string.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get(TITLE).and_then(Value::as_str)
    }

    /// Returns `true` if this payload carries the delete tombstone.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.get(IS_DELETED).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Copy of this payload with the tombstone marker set.
    #[must_use]
    pub fn tombstoned(&self) -> Self {
        self.clone().with(IS_DELETED, true)
    }

    /// Applies `patch` on top of this payload. Patch fields overwrite,
    /// `null` patch values clear the field.
    #[must_use]
    pub fn merged(&self, patch: &serde_json::Map<String, Value>) -> Self {
        let mut out = self.clone();
        for (field, value) in patch {
            out.set(field.clone(), value.clone());
        }
        out
    }
}

impl From<BTreeMap<String, Value>> for EventPayload {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
    }
}

impl From<serde_json::Map<String, Value>> for EventPayload {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
    }
}

impl From<EventPayload> for BTreeMap<String, Value> {
    fn from(payload: EventPayload) -> Self {
        payload.0
    }
}
