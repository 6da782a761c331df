//! In-memory store backend.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::error::{DbError, DbResult};
use crate::model::{FileChange, GitHubInstallation, RepositoryBinding, User, UserId};
use crate::traits::{AccountStore, ChangeStore};

/// All tables of the store.
///
/// `BTreeMap` keys give the ordering the traits promise for free.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) installations: BTreeMap<u64, GitHubInstallation>,
    pub(crate) bindings: BTreeMap<UserId, RepositoryBinding>,
    pub(crate) changes: BTreeMap<(UserId, String), FileChange>,
}

/// Store keeping every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub(crate) fn read(&self) -> DbResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))
    }

    pub(crate) fn write(&self) -> DbResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))
    }
}

// ============================================================================
// Mutations
// ============================================================================

impl Tables {
    pub(crate) fn upsert_change(&mut self, change: FileChange) -> DbResult<()> {
        trace!(
            "Upserting change {} ({}) for user {}",
            change.md5_hash,
            change.status,
            change.user_id
        );
        self.changes
            .insert((change.user_id, change.md5_hash.clone()), change);
        Ok(())
    }

    pub(crate) fn delete_change(&mut self, user: UserId, md5: &str) -> DbResult<bool> {
        Ok(self.changes.remove(&(user, md5.to_string())).is_some())
    }

    pub(crate) fn delete_all_changes(&mut self, user: UserId) -> DbResult<usize> {
        let before = self.changes.len();
        self.changes.retain(|(owner, _), _| *owner != user);
        Ok(before - self.changes.len())
    }

    pub(crate) fn upsert_user(&mut self, user: User) -> DbResult<()> {
        self.users.insert(user.github_user_id, user);
        Ok(())
    }

    pub(crate) fn upsert_installation(&mut self, installation: GitHubInstallation) -> DbResult<()> {
        self.installations
            .insert(installation.installation_id, installation);
        Ok(())
    }

    fn installation_mut(&mut self, installation_id: u64) -> DbResult<&mut GitHubInstallation> {
        self.installations
            .get_mut(&installation_id)
            .ok_or_else(|| DbError::not_found("installation", installation_id))
    }

    pub(crate) fn set_installation_suspended(
        &mut self,
        installation_id: u64,
        suspended: bool,
    ) -> DbResult<()> {
        self.installation_mut(installation_id)?.is_suspended = suspended;
        Ok(())
    }

    pub(crate) fn set_installation_repository(
        &mut self,
        installation_id: u64,
        repository_name: Option<String>,
    ) -> DbResult<()> {
        self.installation_mut(installation_id)?.repository_name = repository_name;
        Ok(())
    }

    pub(crate) fn delete_installation(&mut self, installation_id: u64) -> DbResult<()> {
        self.installations
            .remove(&installation_id)
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("installation", installation_id))
    }

    pub(crate) fn create_binding(&mut self, binding: RepositoryBinding) -> DbResult<()> {
        if self.bindings.contains_key(&binding.user_id) {
            return Err(DbError::conflict("binding", binding.user_id));
        }
        self.bindings.insert(binding.user_id, binding);
        Ok(())
    }

    pub(crate) fn delete_binding(&mut self, user: UserId) -> DbResult<bool> {
        Ok(self.bindings.remove(&user).is_some())
    }

    pub(crate) fn delete_bindings_for_installation(&mut self, installation_id: u64) -> DbResult<usize> {
        let before = self.bindings.len();
        self.bindings
            .retain(|_, b| b.installation_id != installation_id);
        Ok(before - self.bindings.len())
    }
}

impl ChangeStore for MemoryStore {
    fn list_changes(&self, user: UserId) -> DbResult<Vec<FileChange>> {
        let tables = self.read()?;
        Ok(tables
            .changes
            .values()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect())
    }

    fn get_change(&self, user: UserId, md5: &str) -> DbResult<Option<FileChange>> {
        let tables = self.read()?;
        Ok(tables.changes.get(&(user, md5.to_string())).cloned())
    }

    fn upsert_change(&self, change: FileChange) -> DbResult<()> {
        self.write()?.upsert_change(change)
    }

    fn delete_change(&self, user: UserId, md5: &str) -> DbResult<bool> {
        self.write()?.delete_change(user, md5)
    }

    fn delete_all_changes(&self, user: UserId) -> DbResult<usize> {
        self.write()?.delete_all_changes(user)
    }
}

impl AccountStore for MemoryStore {
    fn upsert_user(&self, user: User) -> DbResult<()> {
        self.write()?.upsert_user(user)
    }

    fn get_user(&self, id: UserId) -> DbResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    fn upsert_installation(&self, installation: GitHubInstallation) -> DbResult<()> {
        self.write()?.upsert_installation(installation)
    }

    fn get_installation(&self, installation_id: u64) -> DbResult<Option<GitHubInstallation>> {
        Ok(self.read()?.installations.get(&installation_id).cloned())
    }

    fn list_installations(&self) -> DbResult<Vec<GitHubInstallation>> {
        Ok(self.read()?.installations.values().cloned().collect())
    }

    fn set_installation_suspended(&self, installation_id: u64, suspended: bool) -> DbResult<()> {
        self.write()?
            .set_installation_suspended(installation_id, suspended)
    }

    fn set_installation_repository(
        &self,
        installation_id: u64,
        repository_name: Option<String>,
    ) -> DbResult<()> {
        self.write()?
            .set_installation_repository(installation_id, repository_name)
    }

    fn delete_installation(&self, installation_id: u64) -> DbResult<()> {
        self.write()?.delete_installation(installation_id)
    }

    fn get_binding(&self, user: UserId) -> DbResult<Option<RepositoryBinding>> {
        Ok(self.read()?.bindings.get(&user).cloned())
    }

    fn create_binding(&self, binding: RepositoryBinding) -> DbResult<()> {
        self.write()?.create_binding(binding)
    }

    fn delete_binding(&self, user: UserId) -> DbResult<bool> {
        self.write()?.delete_binding(user)
    }

    fn delete_bindings_for_installation(&self, installation_id: u64) -> DbResult<usize> {
        self.write()?
            .delete_bindings_for_installation(installation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountType, ChangeStatus};
    use chrono::Utc;

    fn change(user: u64, md5: &str, status: ChangeStatus) -> FileChange {
        FileChange {
            user_id: UserId(user),
            md5_hash: md5.to_string(),
            filename: format!("{}.yml", md5),
            status,
            content: "content".to_string(),
            previous_content: None,
            updated_at: Utc::now(),
        }
    }

    fn installation(id: u64) -> GitHubInstallation {
        GitHubInstallation {
            installation_id: id,
            account_login: "octo".to_string(),
            account_type: AccountType::User,
            repository_name: Some("archive".to_string()),
            is_suspended: false,
        }
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let store = MemoryStore::new();
        store
            .upsert_change(change(1, "b", ChangeStatus::Created))
            .unwrap();
        store
            .upsert_change(change(1, "b", ChangeStatus::Modified))
            .unwrap();

        let all = store.list_changes(UserId(1)).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, ChangeStatus::Modified);
    }

    #[test]
    fn test_list_changes_sorted_and_scoped_to_user() {
        let store = MemoryStore::new();
        for md5 in ["c", "a", "b"] {
            store
                .upsert_change(change(1, md5, ChangeStatus::Created))
                .unwrap();
        }
        store
            .upsert_change(change(2, "z", ChangeStatus::Created))
            .unwrap();

        let ids: Vec<String> = store
            .list_changes(UserId(1))
            .unwrap()
            .into_iter()
            .map(|c| c.md5_hash)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_all_changes_only_touches_one_user() {
        let store = MemoryStore::new();
        store
            .upsert_change(change(1, "a", ChangeStatus::Created))
            .unwrap();
        store
            .upsert_change(change(1, "b", ChangeStatus::Deleted))
            .unwrap();
        store
            .upsert_change(change(2, "a", ChangeStatus::Created))
            .unwrap();

        assert_eq!(store.delete_all_changes(UserId(1)).unwrap(), 2);
        assert!(store.list_changes(UserId(1)).unwrap().is_empty());
        assert_eq!(store.list_changes(UserId(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_binding_is_unique_per_user() {
        let store = MemoryStore::new();
        let binding = RepositoryBinding {
            user_id: UserId(7),
            installation_id: 10,
            created_at: Utc::now(),
        };
        store.create_binding(binding.clone()).unwrap();
        let err = store.create_binding(binding).unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[test]
    fn test_missing_installation_updates_report_not_found() {
        let store = MemoryStore::new();
        let err = store.set_installation_suspended(99, true).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.delete_installation(99).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_bindings_for_installation() {
        let store = MemoryStore::new();
        store.upsert_installation(installation(10)).unwrap();
        for user in [1, 2] {
            store
                .create_binding(RepositoryBinding {
                    user_id: UserId(user),
                    installation_id: 10,
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        assert_eq!(store.delete_bindings_for_installation(10).unwrap(), 2);
        assert!(store.get_binding(UserId(1)).unwrap().is_none());
    }
}
