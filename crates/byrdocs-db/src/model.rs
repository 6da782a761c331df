//! Row types stored by the persistence layer.
//!
//! Each type mirrors one table of the relational schema:
//!
//! | Type | Unique key |
//! |------|------------|
//! | [`User`] | `github_user_id` |
//! | [`GitHubInstallation`] | `installation_id` |
//! | [`RepositoryBinding`] | `user_id` (one binding per user) |
//! | [`FileChange`] | `(user_id, md5_hash)` |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// UserId
// ============================================================================

/// GitHub numeric user id, used as the primary key for users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    /// Create a user id from a GitHub user id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// User
// ============================================================================

/// A signed-in contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// GitHub user id.
    pub github_user_id: UserId,

    /// GitHub login.
    pub username: String,

    /// OAuth access token used for GitHub calls on behalf of this user.
    pub access_token: String,
}

// ============================================================================
// GitHubInstallation
// ============================================================================

/// Account type a GitHub App was installed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    User,
    Organization,
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Organization" => Ok(Self::Organization),
            other => Err(format!("Unknown account type: '{}'", other)),
        }
    }
}

/// A GitHub App installation, maintained from webhook deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubInstallation {
    /// GitHub installation id.
    pub installation_id: u64,

    /// Login of the account the app is installed on.
    pub account_login: String,

    /// Type of that account.
    pub account_type: AccountType,

    /// Repository the installation was granted, if exactly one is selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,

    /// Whether the installation is currently suspended.
    #[serde(default)]
    pub is_suspended: bool,
}

// ============================================================================
// RepositoryBinding
// ============================================================================

/// Link between a user and the installation whose repository is their fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryBinding {
    /// Owning user.
    pub user_id: UserId,

    /// Installation holding the fork.
    pub installation_id: u64,

    /// When the binding was created.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// FileChange
// ============================================================================

/// Local intent recorded for one metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// The file does not exist upstream yet.
    Created,
    /// The file exists upstream and has been edited.
    Modified,
    /// The file exists upstream and should be removed.
    Deleted,
}

impl ChangeStatus {
    /// Lowercase name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staged, unpublished change to one metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Owning user.
    pub user_id: UserId,

    /// 32-hex content hash of the described file; also the metadata file stem.
    pub md5_hash: String,

    /// Metadata file name (`<md5>.yml`).
    pub filename: String,

    /// Staged intent.
    pub status: ChangeStatus,

    /// Proposed canonical YAML (empty when deleted).
    pub content: String,

    /// Canonical YAML of the state being superseded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_content: Option<String>,

    /// Last time the row was written.
    pub updated_at: DateTime<Utc>,
}

impl FileChange {
    /// Composite key of this row.
    pub fn key(&self) -> (UserId, &str) {
        (self.user_id, self.md5_hash.as_str())
    }
}
