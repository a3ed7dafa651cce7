//! Field-level diff between two event snapshots.
//!
//! [`compare`] is a pure function over two already-materialized payloads:
//! no I/O, no clock, no randomness. The same two inputs always produce the
//! same output.
//!
//! # Scope
//!
//! Comparison is one level deep. Structured values (a list of attendees, a
//! recurrence pattern object) are compared as whole values: if anything
//! inside them differs, the whole field is reported as `modified` with the
//! complete old and new values. Nested contents are never diffed
//! recursively.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::payload::canonical_cmp;
use crate::domain::{ChangeKind, EventPayload, EventSnapshot, FieldChange};

/// Options for [`compare_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Also report fields whose value is the same in both snapshots.
    pub include_unchanged: bool,
}

/// Counts of each change kind in a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DiffSummary {
    /// Number of entries that are not `unchanged`.
    pub total_changes: usize,
    /// Fields only in the newer snapshot.
    pub added: usize,
    /// Fields only in the older snapshot.
    pub removed: usize,
    /// Fields present in both with different values.
    pub modified: usize,
}

impl DiffSummary {
    /// Tallies a change list.
    #[must_use]
    pub fn of(changes: &[FieldChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.change_kind {
                ChangeKind::Added => summary.added += 1,
                ChangeKind::Removed => summary.removed += 1,
                ChangeKind::Modified => summary.modified += 1,
                ChangeKind::Unchanged => continue,
            }
            summary.total_changes += 1;
        }
        summary
    }
}

/// Compares two snapshots, reporting only changed fields.
///
/// Fields are reported in canonical field order (see
/// [`crate::domain::payload::CANONICAL_FIELDS`]), never in the insertion
/// order of either payload.
#[must_use]
pub fn compare(a: &EventSnapshot, b: &EventSnapshot) -> Vec<FieldChange> {
    compare_payloads(&a.payload, &b.payload, DiffOptions::default())
}

/// [`compare`] with explicit options.
#[must_use]
pub fn compare_with(a: &EventSnapshot, b: &EventSnapshot, options: DiffOptions) -> Vec<FieldChange> {
    compare_payloads(&a.payload, &b.payload, options)
}

/// Payload-level comparison backing [`compare`].
#[must_use]
pub fn compare_payloads(
    old: &EventPayload,
    new: &EventPayload,
    options: DiffOptions,
) -> Vec<FieldChange> {
    let mut fields: Vec<&str> = old.field_names();
    fields.extend(new.field_names());
    fields.sort_by(|x, y| canonical_cmp(x, y));
    fields.dedup();

    fields
        .into_iter()
        .filter_map(|field| {
            let before = old.get(field);
            let after = new.get(field);
            let kind = classify(before, after)?;
            if kind == ChangeKind::Unchanged && !options.include_unchanged {
                return None;
            }
            Some(FieldChange {
                field_name: field.to_string(),
                old_value: before.cloned(),
                new_value: after.cloned(),
                change_kind: kind,
            })
        })
        .collect()
}

fn classify(before: Option<&Value>, after: Option<&Value>) -> Option<ChangeKind> {
    match (before, after) {
        (None, None) => None,
        (None, Some(_)) => Some(ChangeKind::Added),
        (Some(_), None) => Some(ChangeKind::Removed),
        (Some(x), Some(y)) if x == y => Some(ChangeKind::Unchanged),
        (Some(_), Some(_)) => Some(ChangeKind::Modified),
    }
}

/// Renders a change list as a unified-style text diff.
///
/// ```text
/// --- version 1
/// +++ version 2
/// -location: "Room A"
/// +location: "Room B"
/// ```
#[must_use]
pub fn render_text(changes: &[FieldChange], from_label: &str, to_label: &str) -> String {
    let mut lines = vec![format!("--- {from_label}"), format!("+++ {to_label}")];
    for change in changes {
        if change.change_kind == ChangeKind::Unchanged {
            if let Some(v) = &change.new_value {
                lines.push(format!(" {}: {v}", change.field_name));
            }
            continue;
        }
        if let Some(v) = &change.old_value {
            lines.push(format!("-{}: {v}", change.field_name));
        }
        if let Some(v) = &change.new_value {
            lines.push(format!("+{}: {v}", change.field_name));
        }
    }
    lines.join("\n")
}
