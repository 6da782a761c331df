//! Repository binding: which fork a user publishes through.
//!
//! A user binds to a GitHub App installation whose single selected repository
//! is a fork of the upstream archive. Candidate forks are discovered from the
//! user's own repositories and checked for shared history with upstream.
//!
//! Listing candidates and resolving the current binding are independent reads
//! and run concurrently. Ancestry checks on the candidates also run in
//! parallel, one GitHub call per fork.

use std::sync::Arc;

use byrdocs_db::{RepositoryBinding, Store, UserId};
use byrdocs_remote::{GitHubApi, RepoRef, Repository};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::constants::REPOS_PAGE_SIZE;
use crate::errors::{PublishError, PublishResult};

/// A fork the user could publish through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFork {
    pub owner: String,
    pub name: String,
    pub html_url: String,
    /// Installation whose selected repository is this fork, if the app is installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<u64>,
}

/// The user's current binding, joined with its installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundRepository {
    pub installation_id: u64,
    pub owner: String,
    /// `None` while the installation has no single repository selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_suspended: bool,
    pub created_at: DateTime<Utc>,
}

impl BoundRepository {
    /// Usable as a publish target.
    pub fn is_ready(&self) -> bool {
        !self.is_suspended && self.name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOverview {
    pub candidates: Vec<CandidateFork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<BoundRepository>,
}

pub struct BindingService {
    github: Arc<dyn GitHubApi>,
    store: Arc<dyn Store>,
    upstream: RepoRef,
    clock: Arc<dyn Clock>,
}

impl BindingService {
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

    fn token(&self, user: UserId) -> PublishResult<String> {
        self.store
            .get_user(user)?
            .map(|u| u.access_token)
            .ok_or(PublishError::UnknownUser(user.value()))
    }

    /// Candidate forks and the current binding, fetched concurrently.
    pub fn overview(&self, user: UserId) -> PublishResult<BindingOverview> {
        let (candidates, current) =
            rayon::join(|| self.candidate_forks(user), || self.current_binding(user));
        Ok(BindingOverview {
            candidates: candidates?,
            current: current?,
        })
    }

    /// Every repository the user owns that is a fork sharing history with
    /// upstream, in listing order.
    pub fn candidate_forks(&self, user: UserId) -> PublishResult<Vec<CandidateFork>> {
        let token = self.token(user)?;
        let forks: Vec<Repository> = self
            .list_all_repos(&token)?
            .into_iter()
            .filter(|r| r.fork)
            .collect();
        debug!("Checking {} forks against {}", forks.len(), self.upstream);

        let upstream_repo = self.github.get_repository(&token, &self.upstream)?;
        let upstream_branch = upstream_repo.default_branch;

        // Parallel ancestry checks; collect keeps input order.
        let related: Vec<bool> = forks
            .par_iter()
            .map(|fork| {
                match self
                    .github
                    .shares_history(&token, &self.upstream, &upstream_branch, fork)
                {
                    Ok(shared) => shared,
                    Err(e) => {
                        warn!("Skipping {}: ancestry check failed: {}", fork.full_name, e);
                        false
                    }
                }
            })
            .collect();

        let installations = self.store.list_installations()?;
        Ok(forks
            .into_iter()
            .zip(related)
            .filter_map(|(fork, shared)| shared.then_some(fork))
            .map(|fork| {
                let installation_id = installations
                    .iter()
                    .find(|i| {
                        i.account_login.eq_ignore_ascii_case(&fork.owner.login)
                            && i.repository_name.as_deref() == Some(fork.name.as_str())
                    })
                    .map(|i| i.installation_id);
                CandidateFork {
                    owner: fork.owner.login,
                    name: fork.name,
                    html_url: fork.html_url,
                    installation_id,
                }
            })
            .collect())
    }

    fn list_all_repos(&self, token: &str) -> PublishResult<Vec<Repository>> {
        let mut repos = Vec::new();
        for page in 1.. {
            let batch = self.github.list_user_repos(token, page, REPOS_PAGE_SIZE)?;
            let short = batch.len() < REPOS_PAGE_SIZE as usize;
            repos.extend(batch);
            if short {
                break;
            }
        }
        Ok(repos)
    }

    pub fn current_binding(&self, user: UserId) -> PublishResult<Option<BoundRepository>> {
        let Some(binding) = self.store.get_binding(user)? else {
            return Ok(None);
        };
        let Some(installation) = self.store.get_installation(binding.installation_id)? else {
            debug!(
                "Binding of {} points at missing installation {}",
                user, binding.installation_id
            );
            return Ok(None);
        };
        Ok(Some(BoundRepository {
            installation_id: installation.installation_id,
            owner: installation.account_login,
            name: installation.repository_name,
            is_suspended: installation.is_suspended,
            created_at: binding.created_at,
        }))
    }

    /// Replace the user's binding with `installation_id`.
    pub fn bind(&self, user: UserId, installation_id: u64) -> PublishResult<BoundRepository> {
        self.token(user)?;
        let installation = self
            .store
            .get_installation(installation_id)?
            .ok_or_else(|| PublishError::InstallationUnavailable {
                installation_id,
                reason: "unknown installation".to_string(),
            })?;
        if installation.is_suspended {
            return Err(PublishError::InstallationUnavailable {
                installation_id,
                reason: "installation is suspended".to_string(),
            });
        }
        if installation.repository_name.is_none() {
            return Err(PublishError::InstallationUnavailable {
                installation_id,
                reason: "no repository selected".to_string(),
            });
        }

        let created_at = self.clock.now();
        self.store.delete_binding(user)?;
        self.store.create_binding(RepositoryBinding {
            user_id: user,
            installation_id,
            created_at,
        })?;
        info!("Bound user {} to installation {}", user, installation_id);

        Ok(BoundRepository {
            installation_id,
            owner: installation.account_login,
            name: installation.repository_name,
            is_suspended: false,
            created_at,
        })
    }

    /// Remove the user's binding. Returns whether one existed.
    pub fn unbind(&self, user: UserId) -> PublishResult<bool> {
        let removed = self.store.delete_binding(user)?;
        debug!("Unbind user {}: removed={}", user, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use byrdocs_test_utils::{repository as repo, FakeGitHub};
    use byrdocs_db::{AccountStore, AccountType, GitHubInstallation, MemoryStore, User};

    fn store_with_user() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(User {
                github_user_id: UserId(1),
                username: "octo".to_string(),
                access_token: "token".to_string(),
            })
            .unwrap();
        store
    }

    fn installation(id: u64, repo: Option<&str>, suspended: bool) -> GitHubInstallation {
        GitHubInstallation {
            installation_id: id,
            account_login: "octo".to_string(),
            account_type: AccountType::User,
            repository_name: repo.map(str::to_string),
            is_suspended: suspended,
        }
    }

    fn service(store: Arc<MemoryStore>) -> BindingService {
        service_with(store, FakeGitHub::default())
    }

    fn service_with(store: Arc<MemoryStore>, github: FakeGitHub) -> BindingService {
        BindingService::new(
            Arc::new(github),
            store,
            RepoRef::new("byrdocs", "byrdocs-archive"),
            Arc::new(FixedClock::at_date(2024, 5, 1)),
        )
    }

    #[test]
    fn test_bind_replaces_existing_binding() {
        let store = store_with_user();
        store.upsert_installation(installation(10, Some("archive"), false)).unwrap();
        store.upsert_installation(installation(11, Some("archive-2"), false)).unwrap();
        let svc = service(store.clone());

        svc.bind(UserId(1), 10).unwrap();
        let bound = svc.bind(UserId(1), 11).unwrap();
        assert_eq!(bound.installation_id, 11);
        assert!(bound.is_ready());

        let current = svc.current_binding(UserId(1)).unwrap().unwrap();
        assert_eq!(current.name.as_deref(), Some("archive-2"));
    }

    #[test]
    fn test_bind_rejects_unusable_installations() {
        let store = store_with_user();
        store.upsert_installation(installation(20, Some("archive"), true)).unwrap();
        store.upsert_installation(installation(21, None, false)).unwrap();
        let svc = service(store.clone());

        for id in [20, 21, 22] {
            assert!(matches!(
                svc.bind(UserId(1), id),
                Err(PublishError::InstallationUnavailable { installation_id, .. }) if installation_id == id
            ));
        }
        assert!(store.get_binding(UserId(1)).unwrap().is_none());
    }

    #[test]
    fn test_unbind() {
        let store = store_with_user();
        store.upsert_installation(installation(10, Some("archive"), false)).unwrap();
        let svc = service(store);
        svc.bind(UserId(1), 10).unwrap();
        assert!(svc.unbind(UserId(1)).unwrap());
        assert!(!svc.unbind(UserId(1)).unwrap());
        assert!(svc.current_binding(UserId(1)).unwrap().is_none());
    }

    #[test]
    fn test_unknown_user_cannot_bind() {
        let svc = service(Arc::new(MemoryStore::new()));
        assert!(matches!(
            svc.bind(UserId(9), 10),
            Err(PublishError::UnknownUser(9))
        ));
    }

    #[test]
    fn test_candidate_forks_pages_filters_and_keeps_order() {
        let store = store_with_user();
        store.upsert_installation(installation(30, Some("fork-150"), false)).unwrap();

        let mut repos: Vec<Repository> = (0..150)
            .map(|i| repo("octo", &format!("fork-{}", i), i % 50 == 0))
            .collect();
        repos.push(repo("octo", "fork-150", true));
        let github = FakeGitHub {
            repos,
            unrelated: vec!["octo/fork-50".to_string()],
            ..FakeGitHub::default()
        };
        let svc = service_with(store, github);

        let overview = svc.overview(UserId(1)).unwrap();
        let names: Vec<&str> = overview.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["fork-0", "fork-100", "fork-150"]);
        assert_eq!(overview.candidates[2].installation_id, Some(30));
        assert_eq!(overview.candidates[0].installation_id, None);
        assert!(overview.current.is_none());
    }
}
