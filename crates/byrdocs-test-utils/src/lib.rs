//! Shared test fakes for the byrdocs crates.
//!
//! [`FakeGitHub`] answers every [`GitHubApi`] call in process, records the
//! call names in order, and keeps what was written (blobs, trees, commit
//! messages, pull requests) for assertions.

use std::sync::Mutex;

use byrdocs_remote::{
    AuthenticatedUser, BranchInfo, GitHubApi, NewPullRequest, PullRequest, RemoteError,
    RemoteResult, RepoRef, Repository, RepositoryOwner, TreeEntry,
};

/// GitHub account the fake signs in as.
pub const USER_ID: u64 = 583231;
pub const LOGIN: &str = "octocat";

/// Number of the pull request the fake opens.
pub const PULL_NUMBER: u64 = 1024;

pub fn repository(owner: &str, name: &str, fork: bool) -> Repository {
    Repository {
        id: 1,
        name: name.to_string(),
        full_name: format!("{}/{}", owner, name),
        owner: RepositoryOwner {
            login: owner.to_string(),
        },
        fork,
        default_branch: "master".to_string(),
        html_url: format!("https://github.com/{}/{}", owner, name),
    }
}

pub struct FakeGitHub {
    pub calls: Mutex<Vec<String>>,
    pub blobs: Mutex<Vec<String>>,
    pub trees: Mutex<Vec<Vec<TreeEntry>>>,
    pub commits: Mutex<Vec<String>>,
    pub pulls: Mutex<Vec<NewPullRequest>>,
    /// Repositories listed for the signed-in user, paged.
    pub repos: Vec<Repository>,
    /// Full names of forks that do not share history with upstream.
    pub unrelated: Vec<String>,
    /// Call name that fails with HTTP 422.
    pub fail_on: Option<&'static str>,
}

impl Default for FakeGitHub {
    /// One archive fork and one unrelated repository.
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            blobs: Mutex::default(),
            trees: Mutex::default(),
            commits: Mutex::default(),
            pulls: Mutex::default(),
            repos: vec![
                repository(LOGIN, "byrdocs-archive", true),
                repository(LOGIN, "dotfiles", false),
            ],
            unrelated: Vec::new(),
            fail_on: None,
        }
    }
}

impl FakeGitHub {
    pub fn failing_on(call: &'static str) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    fn record(&self, call: &'static str) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.fail_on == Some(call) {
            return Err(RemoteError::Api {
                method: "POST".to_string(),
                path: format!("/{}", call),
                status: 422,
                message: "Reference already exists".to_string(),
            });
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

impl GitHubApi for FakeGitHub {
    fn authenticated_user(&self, _token: &str) -> RemoteResult<AuthenticatedUser> {
        self.record("authenticated_user")?;
        Ok(AuthenticatedUser {
            id: USER_ID,
            login: LOGIN.to_string(),
        })
    }

    fn list_user_repos(&self, _token: &str, page: u32, per_page: u32) -> RemoteResult<Vec<Repository>> {
        self.record("list_user_repos")?;
        let start = (page.saturating_sub(1) * per_page) as usize;
        Ok(self
            .repos
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    fn get_repository(&self, _token: &str, repo: &RepoRef) -> RemoteResult<Repository> {
        self.record("get_repository")?;
        Ok(repository(&repo.owner, &repo.repo, repo.owner != "byrdocs"))
    }

    fn get_branch(&self, _token: &str, repo: &RepoRef, branch: &str) -> RemoteResult<BranchInfo> {
        self.record("get_branch")?;
        Ok(BranchInfo {
            name: branch.to_string(),
            commit_sha: format!("{}-head", repo.owner),
            tree_sha: format!("{}-tree", repo.owner),
        })
    }

    fn shares_history(
        &self,
        _token: &str,
        _upstream: &RepoRef,
        _upstream_branch: &str,
        candidate: &Repository,
    ) -> RemoteResult<bool> {
        self.record("shares_history")?;
        Ok(!self.unrelated.contains(&candidate.full_name))
    }

    fn update_branch_ref(
        &self,
        _token: &str,
        _repo: &RepoRef,
        _branch: &str,
        _sha: &str,
        _force: bool,
    ) -> RemoteResult<()> {
        self.record("update_branch_ref")
    }

    fn create_branch_ref(&self, _token: &str, _repo: &RepoRef, _branch: &str, _sha: &str) -> RemoteResult<()> {
        self.record("create_branch_ref")
    }

    fn create_blob(&self, _token: &str, _repo: &RepoRef, content: &str) -> RemoteResult<String> {
        self.record("create_blob")?;
        let mut blobs = self.blobs.lock().unwrap();
        blobs.push(content.to_string());
        Ok(format!("blob-{}", blobs.len()))
    }

    fn create_tree(
        &self,
        _token: &str,
        _repo: &RepoRef,
        _base_tree: &str,
        entries: &[TreeEntry],
    ) -> RemoteResult<String> {
        self.record("create_tree")?;
        self.trees.lock().unwrap().push(entries.to_vec());
        Ok("tree-1".to_string())
    }

    fn create_commit(
        &self,
        _token: &str,
        _repo: &RepoRef,
        message: &str,
        _tree: &str,
        _parents: &[String],
    ) -> RemoteResult<String> {
        self.record("create_commit")?;
        self.commits.lock().unwrap().push(message.to_string());
        Ok("commit-1".to_string())
    }

    fn create_pull_request(
        &self,
        _token: &str,
        repo: &RepoRef,
        pull: &NewPullRequest,
    ) -> RemoteResult<PullRequest> {
        self.record("create_pull_request")?;
        self.pulls.lock().unwrap().push(pull.clone());
        Ok(PullRequest {
            number: PULL_NUMBER,
            html_url: format!("https://github.com/{}/pull/{}", repo, PULL_NUMBER),
        })
    }
}
