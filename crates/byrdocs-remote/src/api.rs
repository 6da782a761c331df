//! GitHub REST surface consumed by the publish flow.
//!
//! The trait is deliberately narrow: only the calls the orchestrator and the
//! binding flow make. Every call takes the user's OAuth token explicitly
//! because tokens are stored per user, not per client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RemoteResult;

/// `owner/repo` coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// The user behind a token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// Repository as listed for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: RepositoryOwner,
    #[serde(default)]
    pub fork: bool,
    pub default_branch: String,
    #[serde(default)]
    pub html_url: String,
}

impl Repository {
    /// Coordinates of this repository.
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner.login, &self.name)
    }
}

/// Tip of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    /// Commit the branch points at.
    pub commit_sha: String,
    /// Root tree of that commit.
    pub tree_sha: String,
}

/// One entry of a tree to create on top of a base tree.
///
/// `sha: None` serializes as `"sha": null`, which removes the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: Option<String>,
}

impl TreeEntry {
    /// Regular file pointing at an existing blob.
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            kind: "blob".to_string(),
            sha: Some(sha.into()),
        }
    }

    /// Removal of a path from the base tree.
    pub fn removal(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            kind: "blob".to_string(),
            sha: None,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.sha.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    /// `<fork-owner>:<branch>`.
    pub head: String,
    /// Target branch on the upstream repository.
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

/// GitHub operations used by BYR Docs Publish.
pub trait GitHubApi: Send + Sync {
    fn authenticated_user(&self, token: &str) -> RemoteResult<AuthenticatedUser>;

    /// One page of the repositories owned by the authenticated user.
    fn list_user_repos(&self, token: &str, page: u32, per_page: u32)
        -> RemoteResult<Vec<Repository>>;

    fn get_repository(&self, token: &str, repo: &RepoRef) -> RemoteResult<Repository>;

    fn get_branch(&self, token: &str, repo: &RepoRef, branch: &str) -> RemoteResult<BranchInfo>;

    /// Whether `candidate`'s default branch shares history with `upstream_branch`.
    fn shares_history(
        &self,
        token: &str,
        upstream: &RepoRef,
        upstream_branch: &str,
        candidate: &Repository,
    ) -> RemoteResult<bool>;

    /// Point `heads/<branch>` at `sha`.
    fn update_branch_ref(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> RemoteResult<()>;

    /// Create `refs/heads/<branch>` at `sha`.
    fn create_branch_ref(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> RemoteResult<()>;

    /// Returns the blob sha.
    fn create_blob(&self, token: &str, repo: &RepoRef, content: &str) -> RemoteResult<String>;

    /// Returns the tree sha.
    fn create_tree(
        &self,
        token: &str,
        repo: &RepoRef,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> RemoteResult<String>;

    /// Returns the commit sha.
    fn create_commit(
        &self,
        token: &str,
        repo: &RepoRef,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> RemoteResult<String>;

    fn create_pull_request(
        &self,
        token: &str,
        repo: &RepoRef,
        pull: &NewPullRequest,
    ) -> RemoteResult<PullRequest>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_entry_serializes_null_sha() {
        let json = serde_json::to_value(TreeEntry::removal("metadata/a.yml")).unwrap();
        assert_eq!(json["sha"], serde_json::Value::Null);
        assert_eq!(json["type"], "blob");
        assert_eq!(json["mode"], "100644");
    }

    #[test]
    fn test_repo_ref_display() {
        assert_eq!(RepoRef::new("byrdocs", "archive").to_string(), "byrdocs/archive");
    }
}
