//! Domain layer: identifiers, payloads, snapshots and permissions.
//!
//! This module contains the server-side domain model: event and actor
//! identity, version numbers, the full-copy event payload, immutable
//! snapshots, the field changes the diff engine reports, and the sharing
//! hierarchy.

pub mod field_change;
pub mod ids;
pub mod payload;
pub mod permission;
pub mod snapshot;
pub mod version;

pub use field_change::{ChangeKind, FieldChange};
pub use ids::{ActorId, EventId};
pub use payload::EventPayload;
pub use permission::PermissionLevel;
pub use snapshot::{ChangeType, EventSnapshot, NewSnapshot};
pub use version::VersionNumber;
