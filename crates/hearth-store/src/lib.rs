//! # hearth-store
//!
//! `SQLite` persistence accessor for the Hearth health assistant.
//!
//! - **Connection pool**: [`sqlite::connection`] — r2d2 pool with WAL
//!   and foreign-key pragmas
//! - **Migrations**: [`sqlite::migrations`] — embedded SQL, versioned,
//!   idempotent
//! - **Repositories**: [`sqlite::repositories`] — stateless per-entity
//!   CRUD over `&Connection`
//! - **Facade**: [`store::MemoryStore`] — pooled, busy-retrying typed
//!   operations used by every other component
//!
//! ## Crate Position
//!
//! Storage layer. Depends on hearth-core. Depended on by hearth-memory
//! and hearth-runtime.

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use sqlite::connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use sqlite::migrations::run_migrations;
pub use sqlite::repositories::event::CreateEventOptions;
pub use sqlite::repositories::history::CreateHistoryOptions;
pub use sqlite::repositories::insight::CreateInsightOptions;
pub use sqlite::repositories::issue::{CreateIssueOptions, IssueChanges};
pub use store::MemoryStore;
