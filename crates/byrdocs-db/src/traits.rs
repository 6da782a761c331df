//! Store traits.
//!
//! Uniqueness ("one binding per user", "one change per (user, md5)") is the
//! store's job, enforced by upsert and keyed delete. Callers never lock.

use crate::error::DbResult;
use crate::model::{FileChange, GitHubInstallation, RepositoryBinding, User, UserId};

/// Staged file changes keyed by `(user, md5)`.
pub trait ChangeStore: Send + Sync {
    /// All changes of a user, ordered by md5 ascending.
    fn list_changes(&self, user: UserId) -> DbResult<Vec<FileChange>>;

    /// One change, if present.
    fn get_change(&self, user: UserId, md5: &str) -> DbResult<Option<FileChange>>;

    /// Insert or replace the change with the same `(user, md5)`.
    fn upsert_change(&self, change: FileChange) -> DbResult<()>;

    /// Delete one change. Returns whether a row was removed.
    fn delete_change(&self, user: UserId, md5: &str) -> DbResult<bool>;

    /// Delete every change of a user in one operation. Returns the count removed.
    fn delete_all_changes(&self, user: UserId) -> DbResult<usize>;
}

/// Users, installations and repository bindings.
pub trait AccountStore: Send + Sync {
    /// Insert or replace a user by GitHub id.
    fn upsert_user(&self, user: User) -> DbResult<()>;

    /// Look up a user.
    fn get_user(&self, id: UserId) -> DbResult<Option<User>>;

    /// Insert or replace an installation by installation id.
    fn upsert_installation(&self, installation: GitHubInstallation) -> DbResult<()>;

    /// Look up an installation.
    fn get_installation(&self, installation_id: u64) -> DbResult<Option<GitHubInstallation>>;

    /// All installations, ordered by id.
    fn list_installations(&self) -> DbResult<Vec<GitHubInstallation>>;

    /// Set the suspended flag. `NotFound` if the installation is absent.
    fn set_installation_suspended(&self, installation_id: u64, suspended: bool) -> DbResult<()>;

    /// Set the repository name. `NotFound` if the installation is absent.
    fn set_installation_repository(
        &self,
        installation_id: u64,
        repository_name: Option<String>,
    ) -> DbResult<()>;

    /// Delete an installation. `NotFound` if absent.
    fn delete_installation(&self, installation_id: u64) -> DbResult<()>;

    /// The binding of a user, if any.
    fn get_binding(&self, user: UserId) -> DbResult<Option<RepositoryBinding>>;

    /// Create a binding. `Conflict` if the user already has one.
    fn create_binding(&self, binding: RepositoryBinding) -> DbResult<()>;

    /// Delete the binding of a user. Returns whether a row was removed.
    fn delete_binding(&self, user: UserId) -> DbResult<bool>;

    /// Delete every binding pointing at an installation. Returns the count removed.
    fn delete_bindings_for_installation(&self, installation_id: u64) -> DbResult<usize>;
}

/// A backend serving both tables groups.
pub trait Store: ChangeStore + AccountStore {}

impl<T: ChangeStore + AccountStore> Store for T {}
