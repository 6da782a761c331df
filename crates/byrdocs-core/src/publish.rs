//! Publishing staged changes as a pull request.
//!
//! The sequence is fixed and strictly ordered:
//!
//! ```text
//! CheckBinding → SyncUpstream → CreateBranch → CommitFiles → CreatePullRequest
//! ```
//!
//! Each step is a separate method on [`Publisher`] so a UI can show progress,
//! and each records its output in a [`PublishSession`] for the next one. A
//! failing step halts the sequence; nothing already done remotely is rolled
//! back (a failure after CreateBranch leaves the branch behind). Steps are not
//! safe to retry blindly: CreateBranch with an existing name fails.

use std::fmt;
use std::sync::Arc;

use byrdocs_db::{ChangeStatus, FileChange, Store, UserId};
use byrdocs_remote::{
    BranchInfo, GitHubApi, NewPullRequest, RemoteError, RepoRef, TreeEntry,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::commit_message::{self, CommitMessage};
use crate::constants::metadata_path;
use crate::errors::{PublishError, PublishResult};

// ============================================================================
// Steps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PublishStep {
    CheckBinding,
    SyncUpstream,
    CreateBranch,
    CommitFiles,
    CreatePullRequest,
}

impl PublishStep {
    pub const ALL: [PublishStep; 5] = [
        Self::CheckBinding,
        Self::SyncUpstream,
        Self::CreateBranch,
        Self::CommitFiles,
        Self::CreatePullRequest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::CheckBinding => "Check binding",
            Self::SyncUpstream => "Sync upstream",
            Self::CreateBranch => "Create branch",
            Self::CommitFiles => "Commit files",
            Self::CreatePullRequest => "Create pull request",
        }
    }

    /// 1-based position in the sequence.
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress notification from [`Publisher::run`].
#[derive(Debug)]
pub enum StepEvent<'a> {
    Started(PublishStep),
    Finished(PublishStep),
    Failed(PublishStep, &'a PublishError),
}

pub trait PublishObserver {
    fn on_event(&mut self, event: StepEvent<'_>);
}

impl<F: FnMut(StepEvent<'_>)> PublishObserver for F {
    fn on_event(&mut self, event: StepEvent<'_>) {
        self(event)
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PublishObserver for NoopObserver {
    fn on_event(&mut self, _event: StepEvent<'_>) {}
}

// ============================================================================
// Session
// ============================================================================

/// The user's bound fork, resolved by CheckBinding.
#[derive(Debug, Clone)]
pub struct BoundFork {
    pub repo: RepoRef,
    pub username: String,
    pub(crate) token: String,
}

/// Outputs accumulated across steps of one publish.
#[derive(Debug, Clone)]
pub struct PublishSession {
    pub user: UserId,
    pub fork: Option<BoundFork>,
    /// Staged changes captured at CheckBinding.
    pub files: Vec<FileChange>,
    /// Upstream default branch, the pull request base.
    pub upstream_branch: Option<String>,
    /// Fork default branch after sync.
    pub fork_branch: Option<String>,
    /// Tip the new branch was created from.
    pub base: Option<BranchInfo>,
    pub branch: Option<String>,
    pub message: Option<CommitMessage>,
    pub commit_sha: Option<String>,
    pub pull_request_url: Option<String>,
    pub pull_request_number: Option<u64>,
}

impl PublishSession {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            fork: None,
            files: Vec::new(),
            upstream_branch: None,
            fork_branch: None,
            base: None,
            branch: None,
            message: None,
            commit_sha: None,
            pull_request_url: None,
            pull_request_number: None,
        }
    }
}

fn require<'a, T>(
    value: &'a Option<T>,
    step: PublishStep,
    missing: &'static str,
) -> PublishResult<&'a T> {
    value
        .as_ref()
        .ok_or(PublishError::StepOutOfOrder { step, missing })
}

fn step_failed(step: PublishStep) -> impl Fn(RemoteError) -> PublishError {
    move |err| {
        let message = match err {
            RemoteError::Api { message, status, .. } => format!("{} (HTTP {})", message, status),
            other => other.to_string(),
        };
        PublishError::StepFailed { step, message }
    }
}

/// Branch name `<username>-<timestamp>` with `:` and `.` replaced by `-`.
pub fn branch_name(username: &str, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}-{}", username, stamp)
}

/// Result of a complete publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub pull_request_url: String,
    pub pull_request_number: u64,
    pub branch: String,
    pub commit_sha: String,
    /// Filenames included in the commit.
    pub files: Vec<String>,
}

// ============================================================================
// Publisher
// ============================================================================

pub struct Publisher {
    github: Arc<dyn GitHubApi>,
    store: Arc<dyn Store>,
    upstream: RepoRef,
    clock: Arc<dyn Clock>,
}

impl Publisher {
    pub fn new(
        github: Arc<dyn GitHubApi>,
        store: Arc<dyn Store>,
        upstream: RepoRef,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            github,
            store,
            upstream,
            clock,
        }
    }

    /// Resolve the user's fork and token and capture the staged changes.
    ///
    /// Fails with `NothingToPublish` before any remote call if nothing is staged.
    pub fn check_binding(&self, session: &mut PublishSession) -> PublishResult<()> {
        let user = self
            .store
            .get_user(session.user)?
            .ok_or(PublishError::UnknownUser(session.user.value()))?;

        let files = self.store.list_changes(session.user)?;
        if files.is_empty() {
            return Err(PublishError::NothingToPublish);
        }

        let binding = self
            .store
            .get_binding(session.user)?
            .ok_or(PublishError::NotBound)?;
        let installation = self
            .store
            .get_installation(binding.installation_id)?
            .ok_or(PublishError::NotBound)?;
        if installation.is_suspended {
            return Err(PublishError::InstallationUnavailable {
                installation_id: installation.installation_id,
                reason: "installation is suspended".to_string(),
            });
        }
        let repo_name = installation.repository_name.clone().ok_or_else(|| {
            PublishError::InstallationUnavailable {
                installation_id: installation.installation_id,
                reason: "no repository selected".to_string(),
            }
        })?;

        let repo = RepoRef::new(&installation.account_login, repo_name);
        debug!("{} publishes through {}", user.username, repo);
        session.fork = Some(BoundFork {
            repo,
            username: user.username,
            token: user.access_token,
        });
        session.files = files;
        Ok(())
    }

    /// Force the fork's default branch to the upstream default branch tip.
    pub fn sync_upstream(&self, session: &mut PublishSession) -> PublishResult<()> {
        const STEP: PublishStep = PublishStep::SyncUpstream;
        let fork = require(&session.fork, STEP, "bound fork")?;
        let gh = &self.github;
        let err = step_failed(STEP);

        let upstream_repo = gh
            .get_repository(&fork.token, &self.upstream)
            .map_err(&err)?;
        let upstream_tip = gh
            .get_branch(&fork.token, &self.upstream, &upstream_repo.default_branch)
            .map_err(&err)?;
        let fork_repo = gh.get_repository(&fork.token, &fork.repo).map_err(&err)?;

        gh.update_branch_ref(
            &fork.token,
            &fork.repo,
            &fork_repo.default_branch,
            &upstream_tip.commit_sha,
            true,
        )
        .map_err(&err)?;

        debug!(
            "Reset {}:{} to {}",
            fork.repo, fork_repo.default_branch, upstream_tip.commit_sha
        );
        session.upstream_branch = Some(upstream_repo.default_branch);
        session.fork_branch = Some(fork_repo.default_branch);
        Ok(())
    }

    /// Create `<username>-<timestamp>` from the synced fork tip.
    pub fn create_branch(&self, session: &mut PublishSession) -> PublishResult<()> {
        const STEP: PublishStep = PublishStep::CreateBranch;
        let fork = require(&session.fork, STEP, "bound fork")?;
        let fork_branch = require(&session.fork_branch, STEP, "synced fork branch")?;
        let err = step_failed(STEP);

        let base = self
            .github
            .get_branch(&fork.token, &fork.repo, fork_branch)
            .map_err(&err)?;
        let name = branch_name(&fork.username, self.clock.now());
        self.github
            .create_branch_ref(&fork.token, &fork.repo, &name, &base.commit_sha)
            .map_err(&err)?;

        debug!("Created branch {} at {}", name, base.commit_sha);
        session.base = Some(base);
        session.branch = Some(name);
        Ok(())
    }

    /// One blob per created/modified file, one tree, one commit, then move
    /// the new branch onto it.
    pub fn commit_files(&self, session: &mut PublishSession) -> PublishResult<()> {
        const STEP: PublishStep = PublishStep::CommitFiles;
        let fork = require(&session.fork, STEP, "bound fork")?;
        let base = require(&session.base, STEP, "branch base")?;
        let branch = require(&session.branch, STEP, "branch")?;
        if session.files.is_empty() {
            return Err(PublishError::NothingToPublish);
        }
        let err = step_failed(STEP);

        let mut entries = Vec::with_capacity(session.files.len());
        for file in &session.files {
            let path = metadata_path(&file.filename);
            match file.status {
                ChangeStatus::Created | ChangeStatus::Modified => {
                    let sha = self
                        .github
                        .create_blob(&fork.token, &fork.repo, &file.content)
                        .map_err(&err)?;
                    entries.push(TreeEntry::blob(path, sha));
                }
                ChangeStatus::Deleted => entries.push(TreeEntry::removal(path)),
            }
        }

        let tree = self
            .github
            .create_tree(&fork.token, &fork.repo, &base.tree_sha, &entries)
            .map_err(&err)?;
        let message = commit_message::generate(&session.files);
        let commit = self
            .github
            .create_commit(
                &fork.token,
                &fork.repo,
                &message.full(),
                &tree,
                &[base.commit_sha.clone()],
            )
            .map_err(&err)?;
        self.github
            .update_branch_ref(&fork.token, &fork.repo, branch, &commit, false)
            .map_err(&err)?;

        debug!("Committed {} files as {}", entries.len(), commit);
        session.message = Some(message);
        session.commit_sha = Some(commit);
        Ok(())
    }

    /// Open the pull request, then clear the user's staged changes.
    pub fn create_pull_request(&self, session: &mut PublishSession) -> PublishResult<()> {
        const STEP: PublishStep = PublishStep::CreatePullRequest;
        let fork = require(&session.fork, STEP, "bound fork")?;
        let branch = require(&session.branch, STEP, "branch")?;
        let message = require(&session.message, STEP, "commit")?;
        let upstream_branch = require(&session.upstream_branch, STEP, "upstream branch")?;

        let pull = NewPullRequest {
            title: message.title.clone(),
            body: message.body.clone(),
            head: format!("{}:{}", fork.repo.owner, branch),
            base: upstream_branch.clone(),
        };
        let pr = self
            .github
            .create_pull_request(&fork.token, &self.upstream, &pull)
            .map_err(step_failed(STEP))?;

        let cleared = self.store.delete_all_changes(session.user)?;
        info!("Opened pull request #{}, cleared {} staged changes", pr.number, cleared);
        session.pull_request_url = Some(pr.html_url);
        session.pull_request_number = Some(pr.number);
        Ok(())
    }

    fn run_step(&self, step: PublishStep, session: &mut PublishSession) -> PublishResult<()> {
        match step {
            PublishStep::CheckBinding => self.check_binding(session),
            PublishStep::SyncUpstream => self.sync_upstream(session),
            PublishStep::CreateBranch => self.create_branch(session),
            PublishStep::CommitFiles => self.commit_files(session),
            PublishStep::CreatePullRequest => self.create_pull_request(session),
        }
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(
        &self,
        user: UserId,
        observer: &mut dyn PublishObserver,
    ) -> PublishResult<PublishOutcome> {
        let mut session = PublishSession::new(user);

        for step in PublishStep::ALL {
            observer.on_event(StepEvent::Started(step));
            if let Err(e) = self.run_step(step, &mut session) {
                warn!("Publish halted at {}: {}", step, e);
                observer.on_event(StepEvent::Failed(step, &e));
                return Err(e);
            }
            observer.on_event(StepEvent::Finished(step));
        }

        Ok(PublishOutcome {
            pull_request_url: session.pull_request_url.unwrap_or_default(),
            pull_request_number: session.pull_request_number.unwrap_or_default(),
            branch: session.branch.unwrap_or_default(),
            commit_sha: session.commit_sha.unwrap_or_default(),
            files: session.files.into_iter().map(|f| f.filename).collect(),
        })
    }
}
