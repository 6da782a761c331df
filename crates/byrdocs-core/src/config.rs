//! Configuration for BYR Docs Publish.
//!
//! [`PublishConfig`] is loaded from `~/.byrdocs/config.yaml`. Every field has a
//! default, so a missing file is a valid (if anonymous) setup.
//!
//! # Example YAML
//!
//! ```yaml
//! feed_url: https://files.byrdocs.org/metadata2.json
//! feed_ttl_secs: 300
//! upstream:
//!   owner: byrdocs
//!   repo: byrdocs-archive
//! store: jsonl
//! data_dir: /var/lib/byrdocs
//! webhook_secret: change-me
//! oauth:
//!   client_id: Iv1.0123456789abcdef
//!   client_secret: "..."
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use byrdocs_db::{StoreBackendKind, StoreConfig};
use byrdocs_remote::{RepoRef, DEFAULT_API_URL};
use serde::{Deserialize, Serialize};

use crate::constants::{
    BYRDOCS_HOME_DIR, CONFIG_FILENAME, DATA_DIR, DEFAULT_FEED_TTL_SECS, DEFAULT_FEED_URL,
    DEFAULT_SCHEMA_BASE, DEFAULT_SITE_URL, DEFAULT_UPSTREAM_OWNER, DEFAULT_UPSTREAM_REPO,
    FILE_URL_PREFIX,
};
use crate::errors::PublishError;

// ============================================================================
// Sections
// ============================================================================

/// The canonical archive repository pull requests are opened against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_owner")]
    pub owner: String,
    #[serde(default = "default_upstream_repo")]
    pub repo: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            owner: default_upstream_owner(),
            repo: default_upstream_repo(),
        }
    }
}

impl UpstreamConfig {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.repo)
    }
}

fn default_upstream_owner() -> String {
    DEFAULT_UPSTREAM_OWNER.to_string()
}

fn default_upstream_repo() -> String {
    DEFAULT_UPSTREAM_REPO.to_string()
}

/// GitHub OAuth app credentials, needed only for `login --code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Fixed identity, overriding the saved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub github_user_id: u64,
}

// ============================================================================
// PublishConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Base URL of the JSON schemas referenced from YAML headers.
    #[serde(default = "default_schema_base")]
    pub schema_base: String,

    /// Metadata feed URL, or a local file path.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_feed_ttl_secs")]
    pub feed_ttl_secs: u64,

    /// Public prefix uploaded files are served from.
    #[serde(default = "default_file_host_url")]
    pub file_host_url: String,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Where the store and session live. Defaults to `~/.byrdocs/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreBackendKind,

    /// Shared secret for webhook signatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserConfig>,
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}
fn default_schema_base() -> String {
    DEFAULT_SCHEMA_BASE.to_string()
}
fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}
fn default_feed_ttl_secs() -> u64 {
    DEFAULT_FEED_TTL_SECS
}
fn default_file_host_url() -> String {
    FILE_URL_PREFIX.to_string()
}
fn default_github_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            schema_base: default_schema_base(),
            feed_url: default_feed_url(),
            feed_ttl_secs: default_feed_ttl_secs(),
            file_host_url: default_file_host_url(),
            github_api_url: default_github_api_url(),
            upstream: UpstreamConfig::default(),
            data_dir: None,
            store: StoreBackendKind::default(),
            webhook_secret: None,
            oauth: None,
            user: None,
        }
    }
}

impl PublishConfig {
    /// Load from `~/.byrdocs/config.yaml`, or defaults if there is no home
    /// directory or no file.
    pub fn load_default() -> Result<Self, PublishError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidConfig`] if the file cannot be read or
    /// parsed, or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, PublishError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PublishError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        // An empty file is a valid, all-default config.
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                PublishError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        for warning in config.validate()? {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// `~/.byrdocs`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(BYRDOCS_HOME_DIR))
    }

    /// `~/.byrdocs/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// In-memory store, no home directory access.
    pub fn default_for_testing() -> Self {
        Self {
            store: StoreBackendKind::Memory,
            data_dir: Some(std::env::temp_dir().join("byrdocs-test")),
            ..Self::default()
        }
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| Self::default_dir().map(|d| d.join(DATA_DIR)))
            .unwrap_or_else(|| PathBuf::from(BYRDOCS_HOME_DIR).join(DATA_DIR))
    }

    pub fn store_config(&self) -> StoreConfig {
        match self.store {
            StoreBackendKind::Memory => StoreConfig::memory(),
            StoreBackendKind::Jsonl => StoreConfig::jsonl(self.data_dir()),
        }
    }

    pub fn feed_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.feed_ttl_secs.min(i64::MAX as u64) as i64)
    }

    /// Check the configuration.
    ///
    /// Returns warnings for questionable but usable settings.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidConfig`] if the upstream repository is
    /// incomplete or a URL is empty.
    pub fn validate(&self) -> Result<Vec<String>, PublishError> {
        if self.upstream.owner.trim().is_empty() || self.upstream.repo.trim().is_empty() {
            return Err(PublishError::InvalidConfig(
                "upstream.owner and upstream.repo must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("feed_url", &self.feed_url),
            ("github_api_url", &self.github_api_url),
            ("file_host_url", &self.file_host_url),
        ] {
            if value.trim().is_empty() {
                return Err(PublishError::InvalidConfig(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        let mut warnings = Vec::new();
        if self.feed_ttl_secs == 0 {
            warnings.push("feed_ttl_secs is 0; the metadata feed is refetched on every read".to_string());
        }
        if self.webhook_secret.as_deref().map_or(true, str::is_empty) {
            warnings.push("webhook_secret is not set; webhook deliveries will be rejected".to_string());
        }
        if let Some(oauth) = &self.oauth {
            if oauth.client_id.is_empty() || oauth.client_secret.is_empty() {
                warnings.push("oauth.client_id or oauth.client_secret is empty".to_string());
            }
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PublishConfig::default();
        assert_eq!(config.feed_ttl_secs, 300);
        assert_eq!(config.upstream.repo_ref().to_string(), "byrdocs/byrdocs-archive");
        assert_eq!(config.store, StoreBackendKind::Jsonl);
        assert_eq!(config.github_api_url, "https://api.github.com");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = PublishConfig::from_path(&temp.path().join("nope.yaml")).unwrap();
        assert_eq!(config, PublishConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "store: memory\nfeed_ttl_secs: 60\nupstream:\n  owner: fork-org\nuser:\n  username: octo\n  github_user_id: 42\n",
        )
        .unwrap();

        let config = PublishConfig::from_path(&path).unwrap();
        assert_eq!(config.store, StoreBackendKind::Memory);
        assert_eq!(config.feed_ttl(), chrono::Duration::seconds(60));
        assert_eq!(config.upstream.owner, "fork-org");
        assert_eq!(config.upstream.repo, "byrdocs-archive");
        assert_eq!(config.user.map(|u| u.github_user_id), Some(42));
    }

    #[test]
    fn test_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "not: [valid: yaml").unwrap();
        assert!(matches!(
            PublishConfig::from_path(&path),
            Err(PublishError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = PublishConfig::default();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("webhook_secret")));

        config.webhook_secret = Some("s".to_string());
        config.feed_ttl_secs = 0;
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("feed_ttl_secs"));

        config.upstream.repo = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_follows_data_dir() {
        let config = PublishConfig {
            data_dir: Some(PathBuf::from("/srv/byrdocs")),
            ..PublishConfig::default()
        };
        let store = config.store_config();
        assert_eq!(store.backend, StoreBackendKind::Jsonl);
        assert_eq!(store.path, PathBuf::from("/srv/byrdocs"));
    }
}
