//! File-backed store backend.
//!
//! Each table is kept in memory and rewritten to its own JSONL file after
//! every mutation:
//!
//! - `users.jsonl`
//! - `installations.jsonl`
//! - `bindings.jsonl`
//! - `changes.jsonl`
//!
//! Files are replaced through a temporary sibling and a rename so a crash
//! mid-write leaves the previous table intact. A mutation is applied to a
//! copy of the tables and only becomes visible once the copy is on disk.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::memory::{MemoryStore, Tables};
use crate::error::{DbError, DbResult};
use crate::model::{FileChange, GitHubInstallation, RepositoryBinding, User, UserId};
use crate::traits::{AccountStore, ChangeStore};

const USERS_FILENAME: &str = "users.jsonl";
const INSTALLATIONS_FILENAME: &str = "installations.jsonl";
const BINDINGS_FILENAME: &str = "bindings.jsonl";
const CHANGES_FILENAME: &str = "changes.jsonl";

/// Store persisting its tables as JSONL files in one directory.
#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    inner: MemoryStore,
}

impl JsonlStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: &Path) -> DbResult<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            DbError::store_io(dir, format!("Failed to create store directory: {}", e))
        })?;

        let mut tables = Tables::default();
        for user in read_table::<User>(&dir.join(USERS_FILENAME))? {
            tables.users.insert(user.github_user_id, user);
        }
        for inst in read_table::<GitHubInstallation>(&dir.join(INSTALLATIONS_FILENAME))? {
            tables.installations.insert(inst.installation_id, inst);
        }
        for binding in read_table::<RepositoryBinding>(&dir.join(BINDINGS_FILENAME))? {
            tables.bindings.insert(binding.user_id, binding);
        }
        for change in read_table::<FileChange>(&dir.join(CHANGES_FILENAME))? {
            tables
                .changes
                .insert((change.user_id, change.md5_hash.clone()), change);
        }

        debug!(
            "Loaded store from {:?}: {} users, {} installations, {} bindings, {} changes",
            dir,
            tables.users.len(),
            tables.installations.len(),
            tables.bindings.len(),
            tables.changes.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            inner: MemoryStore::from_tables(tables),
        })
    }

    /// Directory holding the table files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Apply `op` to a copy of the tables, write the copy when `changed`
    /// says so, then swap it in. On a failed write nothing changes.
    fn mutate<R>(
        &self,
        op: impl FnOnce(&mut Tables) -> DbResult<R>,
        changed: impl FnOnce(&R) -> bool,
    ) -> DbResult<R> {
        let mut tables = self.inner.write()?;
        let mut next = tables.clone();
        let result = op(&mut next)?;
        if changed(&result) {
            self.persist(&next)?;
            *tables = next;
        }
        Ok(result)
    }

    fn persist(&self, tables: &Tables) -> DbResult<()> {
        write_table(&self.dir.join(USERS_FILENAME), tables.users.values())?;
        write_table(
            &self.dir.join(INSTALLATIONS_FILENAME),
            tables.installations.values(),
        )?;
        write_table(&self.dir.join(BINDINGS_FILENAME), tables.bindings.values())?;
        write_table(&self.dir.join(CHANGES_FILENAME), tables.changes.values())?;
        Ok(())
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> DbResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| DbError::store_io(path, format!("Failed to open: {}", e)))?;
    let mut rows = Vec::new();

    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| DbError::store_io(path, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|e| DbError::StoreParse {
            path: path.to_path_buf(),
            line: line_num + 1,
            message: e.to_string(),
        })?;
        rows.push(row);
    }

    Ok(rows)
}

fn write_table<'a, T, I>(path: &Path, rows: I) -> DbResult<()>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    let tmp = path.with_extension("jsonl.tmp");
    {
        let file = File::create(&tmp)
            .map_err(|e| DbError::store_io(&tmp, format!("Failed to create: {}", e)))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)
        .map_err(|e| DbError::store_io(path, format!("Failed to replace: {}", e)))?;
    Ok(())
}

impl ChangeStore for JsonlStore {
    fn list_changes(&self, user: UserId) -> DbResult<Vec<FileChange>> {
        self.inner.list_changes(user)
    }

    fn get_change(&self, user: UserId, md5: &str) -> DbResult<Option<FileChange>> {
        self.inner.get_change(user, md5)
    }

    fn upsert_change(&self, change: FileChange) -> DbResult<()> {
        self.mutate(|t| t.upsert_change(change), |_| true)
    }

    fn delete_change(&self, user: UserId, md5: &str) -> DbResult<bool> {
        self.mutate(|t| t.delete_change(user, md5), |removed| *removed)
    }

    fn delete_all_changes(&self, user: UserId) -> DbResult<usize> {
        self.mutate(|t| t.delete_all_changes(user), |removed| *removed > 0)
    }
}

impl AccountStore for JsonlStore {
    fn upsert_user(&self, user: User) -> DbResult<()> {
        self.mutate(|t| t.upsert_user(user), |_| true)
    }

    fn get_user(&self, id: UserId) -> DbResult<Option<User>> {
        self.inner.get_user(id)
    }

    fn upsert_installation(&self, installation: GitHubInstallation) -> DbResult<()> {
        self.mutate(|t| t.upsert_installation(installation), |_| true)
    }

    fn get_installation(&self, installation_id: u64) -> DbResult<Option<GitHubInstallation>> {
        self.inner.get_installation(installation_id)
    }

    fn list_installations(&self) -> DbResult<Vec<GitHubInstallation>> {
        self.inner.list_installations()
    }

    fn set_installation_suspended(&self, installation_id: u64, suspended: bool) -> DbResult<()> {
        self.mutate(
            |t| t.set_installation_suspended(installation_id, suspended),
            |_| true,
        )
    }

    fn set_installation_repository(
        &self,
        installation_id: u64,
        repository_name: Option<String>,
    ) -> DbResult<()> {
        self.mutate(
            |t| t.set_installation_repository(installation_id, repository_name),
            |_| true,
        )
    }

    fn delete_installation(&self, installation_id: u64) -> DbResult<()> {
        self.mutate(|t| t.delete_installation(installation_id), |_| true)
    }

    fn get_binding(&self, user: UserId) -> DbResult<Option<RepositoryBinding>> {
        self.inner.get_binding(user)
    }

    fn create_binding(&self, binding: RepositoryBinding) -> DbResult<()> {
        self.mutate(|t| t.create_binding(binding), |_| true)
    }

    fn delete_binding(&self, user: UserId) -> DbResult<bool> {
        self.mutate(|t| t.delete_binding(user), |removed| *removed)
    }

    fn delete_bindings_for_installation(&self, installation_id: u64) -> DbResult<usize> {
        self.mutate(
            |t| t.delete_bindings_for_installation(installation_id),
            |removed| *removed > 0,
        )
    }
}
