//! # tempo-gateway
//!
//! REST service for collaboratively edited calendar events with a full,
//! immutable version history.
//!
//! Every mutation of an event (create, update, delete, rollback) appends a
//! complete snapshot with the next version number. On top of that history
//! the service offers field-level diffs between any two versions, a
//! changelog, and rollback, which republishes an old snapshot as a new
//! version rather than rewriting the past.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── EventService, VersionService (service/)
//!     ├── diff engine (service/diff)
//!     │
//!     ├── VersionStore, PermissionStore (store/)
//!     │
//!     └── In-memory or PostgreSQL backend
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
