//! Service layer: business logic orchestration.
//!
//! - [`diff`] is the pure field-level diff engine.
//! - [`VersionService`] serves history, diffs, changelogs and rollback.
//! - [`EventService`] performs event mutations, each of which records a
//!   new snapshot through the [`crate::store::VersionStore`].

pub mod diff;
pub mod event_service;
pub mod version_service;

pub use event_service::{EventService, MAX_BATCH_EVENTS};
pub use version_service::{ChangelogEntry, VersionService};
