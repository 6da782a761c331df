//! # byrdocs-db
//!
//! Persistence layer for BYR Docs Publish.
//!
//! The web deployment keeps users, GitHub App installations, repository
//! bindings and staged file changes in a relational store reached through an
//! ORM. This crate models exactly the operations the core needs from that
//! store (keyed create/read/update/delete/upsert) so the domain logic in
//! `byrdocs-core` never depends on a concrete database.
//!
//! ## Architecture
//!
//! ```text
//! byrdocs-cli → byrdocs-core → (ChangeStore / AccountStore traits)
//!                    ↑
//!               byrdocs-db (row types, memory + JSONL backends)
//! ```
//!
//! ## Modules
//!
//! - `model`: row types (`User`, `GitHubInstallation`, `RepositoryBinding`, `FileChange`)
//! - `traits`: store abstractions
//! - `backend`: `MemoryStore` and the file-backed `JsonlStore`
//!
//! ## Usage
//!
//! ```ignore
//! use byrdocs_db::{open_store, StoreConfig};
//!
//! let store = open_store(&StoreConfig::jsonl("/tmp/byrdocs"))?;
//! let staged = store.list_changes(user_id)?;
//! ```

pub mod backend;
pub mod error;
pub mod model;
pub mod traits;

pub use backend::{open_store, JsonlStore, MemoryStore, StoreBackendKind, StoreConfig};
pub use error::{DbError, DbResult};
pub use model::{
    AccountType, ChangeStatus, FileChange, GitHubInstallation, RepositoryBinding, User, UserId,
};
pub use traits::{AccountStore, ChangeStore, Store};
