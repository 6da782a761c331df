//! Blocking `reqwest` implementation of [`GitHubApi`].
//!
//! There is no retry or timeout policy beyond reqwest's defaults: a transient
//! failure surfaces immediately to the caller as a [`RemoteError`].

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

use crate::api::{
    AuthenticatedUser, BranchInfo, GitHubApi, NewPullRequest, PullRequest, RepoRef, Repository,
    TreeEntry,
};
use crate::{RemoteError, RemoteResult};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// OAuth token endpoint.
const OAUTH_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

const USER_AGENT: &str = concat!("byrdocs-publish/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    name: String,
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    tree: ShaResponse,
}

/// GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
}

impl GitHubClient {
    /// Create a client against `api_url` (normally [`DEFAULT_API_URL`]).
    pub fn new(api_url: impl Into<String>) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> RemoteResult<T> {
        let url = format!("{}{}", self.api_url, path);
        debug!("GitHub {} {}", method, path);

        let mut request = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiMessage>(&text)
                .map(|m| m.message)
                .unwrap_or(text);
            return Err(RemoteError::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().map_err(|e| RemoteError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

impl GitHubApi for GitHubClient {
    fn authenticated_user(&self, token: &str) -> RemoteResult<AuthenticatedUser> {
        self.request(Method::GET, "/user", token, None)
    }

    fn list_user_repos(
        &self,
        token: &str,
        page: u32,
        per_page: u32,
    ) -> RemoteResult<Vec<Repository>> {
        let path = format!(
            "/user/repos?affiliation=owner&sort=updated&page={}&per_page={}",
            page, per_page
        );
        self.request(Method::GET, &path, token, None)
    }

    fn get_repository(&self, token: &str, repo: &RepoRef) -> RemoteResult<Repository> {
        let path = format!("/repos/{}/{}", repo.owner, repo.repo);
        self.request(Method::GET, &path, token, None)
    }

    fn get_branch(&self, token: &str, repo: &RepoRef, branch: &str) -> RemoteResult<BranchInfo> {
        let path = format!("/repos/{}/{}/branches/{}", repo.owner, repo.repo, branch);
        let response: BranchResponse = self.request(Method::GET, &path, token, None)?;
        Ok(BranchInfo {
            name: response.name,
            commit_sha: response.commit.sha,
            tree_sha: response.commit.commit.tree.sha,
        })
    }

    fn shares_history(
        &self,
        token: &str,
        upstream: &RepoRef,
        upstream_branch: &str,
        candidate: &Repository,
    ) -> RemoteResult<bool> {
        let path = format!(
            "/repos/{}/{}/compare/{}...{}:{}",
            upstream.owner,
            upstream.repo,
            upstream_branch,
            candidate.owner.login,
            candidate.default_branch
        );
        match self.request::<serde_json::Value>(Method::GET, &path, token, None) {
            Ok(_) => Ok(true),
            Err(RemoteError::Api { status: 404, .. }) => {
                trace!("{} shares no history with {}", candidate.full_name, upstream);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn update_branch_ref(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> RemoteResult<()> {
        let path = format!("/repos/{}/{}/git/refs/heads/{}", repo.owner, repo.repo, branch);
        self.request::<serde_json::Value>(
            Method::PATCH,
            &path,
            token,
            Some(json!({ "sha": sha, "force": force })),
        )?;
        Ok(())
    }

    fn create_branch_ref(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> RemoteResult<()> {
        let path = format!("/repos/{}/{}/git/refs", repo.owner, repo.repo);
        self.request::<serde_json::Value>(
            Method::POST,
            &path,
            token,
            Some(json!({ "ref": format!("refs/heads/{}", branch), "sha": sha })),
        )?;
        Ok(())
    }

    fn create_blob(&self, token: &str, repo: &RepoRef, content: &str) -> RemoteResult<String> {
        let path = format!("/repos/{}/{}/git/blobs", repo.owner, repo.repo);
        let response: ShaResponse = self.request(
            Method::POST,
            &path,
            token,
            Some(json!({ "content": content, "encoding": "utf-8" })),
        )?;
        Ok(response.sha)
    }

    fn create_tree(
        &self,
        token: &str,
        repo: &RepoRef,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> RemoteResult<String> {
        let path = format!("/repos/{}/{}/git/trees", repo.owner, repo.repo);
        let response: ShaResponse = self.request(
            Method::POST,
            &path,
            token,
            Some(json!({ "base_tree": base_tree, "tree": entries })),
        )?;
        Ok(response.sha)
    }

    fn create_commit(
        &self,
        token: &str,
        repo: &RepoRef,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> RemoteResult<String> {
        let path = format!("/repos/{}/{}/git/commits", repo.owner, repo.repo);
        let response: ShaResponse = self.request(
            Method::POST,
            &path,
            token,
            Some(json!({ "message": message, "tree": tree, "parents": parents })),
        )?;
        Ok(response.sha)
    }

    fn create_pull_request(
        &self,
        token: &str,
        repo: &RepoRef,
        pull: &NewPullRequest,
    ) -> RemoteResult<PullRequest> {
        let path = format!("/repos/{}/{}/pulls", repo.owner, repo.repo);
        let body = serde_json::to_value(pull).map_err(|e| RemoteError::Decode {
            url: path.clone(),
            message: e.to_string(),
        })?;
        self.request(Method::POST, &path, token, Some(body))
    }
}

#[derive(Deserialize)]
struct OAuthResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange an OAuth authorization code for a user access token.
pub fn exchange_oauth_code(client_id: &str, client_secret: &str, code: &str) -> RemoteResult<String> {
    let response: OAuthResponse = Client::builder()
        .user_agent(USER_AGENT)
        .build()?
        .post(OAUTH_TOKEN_URL)
        .header(ACCEPT, "application/json")
        .json(&json!({
            "client_id": client_id,
            "client_secret": client_secret,
            "code": code,
        }))
        .send()?
        .json()?;

    match response {
        OAuthResponse {
            access_token: Some(token),
            ..
        } => Ok(token),
        OAuthResponse {
            error,
            error_description,
            ..
        } => Err(RemoteError::OAuth(
            error_description
                .or(error)
                .unwrap_or_else(|| "no access token in response".to_string()),
        )),
    }
}
