//! Remote services for BYR Docs Publish.
//!
//! This crate isolates every network-facing concern so the domain logic in
//! `byrdocs-core` can be exercised with in-process fakes:
//!
//! - [`api`]: the [`GitHubApi`] trait and its wire types
//! - [`client`]: the `reqwest` implementation of [`GitHubApi`] and OAuth
//! - [`webhook`]: HMAC-SHA256 delivery verification and event payloads
//! - [`feed`]: metadata feed and file host access

use thiserror::Error;

pub mod api;
pub mod client;
pub mod feed;
pub mod webhook;

pub use api::{
    AuthenticatedUser, BranchInfo, GitHubApi, NewPullRequest, PullRequest, RepoRef, Repository,
    RepositoryOwner, TreeEntry,
};
pub use client::{exchange_oauth_code, GitHubClient, DEFAULT_API_URL};
pub use feed::{FeedClient, FileHost};
pub use webhook::{parse_event, verify_signature, WebhookEvent};

/// Result type alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("GitHub API {method} {path} failed with status {status}: {message}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Webhook signature is missing or invalid")]
    InvalidSignature,

    #[error("Malformed webhook payload for `{event}`: {message}")]
    InvalidPayload { event: String, message: String },

    #[error("OAuth code exchange failed: {0}")]
    OAuth(String),
}

impl RemoteError {
    /// HTTP status of a failed API call, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
