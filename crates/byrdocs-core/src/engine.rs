//! BYR Docs Publish engine – the facade over every core operation.
//!
//! The [`ArchiveEngine`] wires configuration, the store, the GitHub client,
//! the cached metadata feed and the clock together, and exposes the
//! operations the CLI (or any other front end) needs.

use std::path::Path;
use std::sync::Arc;

use byrdocs_db::{open_store, FileChange, Store, User, UserId};
use byrdocs_remote::{exchange_oauth_code, FileHost, GitHubApi, GitHubClient};
use serde::Serialize;
use tracing::{debug, info};

use crate::binding::{BindingOverview, BindingService, BoundRepository};
use crate::clock::{Clock, SystemClock};
use crate::config::PublishConfig;
use crate::constants::SESSION_FILENAME;
use crate::diff::DiffLine;
use crate::errors::{PublishError, PublishResult};
use crate::feed::{source_for, CachedFeed, FeedSource, MetadataFeed};
use crate::publish::{PublishObserver, PublishOutcome, Publisher};
use crate::reconcile::{file_diff, reconcile, FileStatus, ReconcileSummary, ReconciledFile};
use crate::record::MetadataRecord;
use crate::session::{Session, SessionFile};
use crate::staging::{self, StagedDeletion};
use crate::upload::{plan_upload, CancelFlag, ObjectStorage, UploadPlan};
use crate::validate::{validate_text, ValidationOutcome};
use crate::webhook::{handle_webhook, WebhookOutcome};
use crate::yaml::YamlCodec;

/// Reconciled view of a user's workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub user: UserId,
    pub summary: ReconcileSummary,
    /// Every file, unchanged ones included, sorted by id.
    pub files: Vec<ReconciledFile>,
}

impl StatusReport {
    /// Files that publishing would touch.
    pub fn pending(&self) -> impl Iterator<Item = &ReconciledFile> {
        self.files
            .iter()
            .filter(|f| f.status != FileStatus::Unchanged)
    }
}

// ============================================================================
// ArchiveEngine
// ============================================================================

/// The main engine for BYR Docs Publish.
///
/// # Construction
///
/// Use [`ArchiveEngine::with_defaults`] or [`ArchiveEngine::with_config`] for
/// CLI usage, and [`ArchiveEngine::from_parts`] to inject fakes in tests.
///
/// # Example
///
/// ```ignore
/// use byrdocs_core::ArchiveEngine;
///
/// let engine = ArchiveEngine::with_defaults()?;
/// let user = engine.current_user()?;
/// let status = engine.status(user)?;
/// println!("{} pending", status.summary.pending());
/// ```
pub struct ArchiveEngine {
    config: PublishConfig,
    codec: YamlCodec,
    store: Arc<dyn Store>,
    github: Arc<dyn GitHubApi>,
    feed: CachedFeed,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    session: SessionFile,
}

impl ArchiveEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build an engine talking to the real services named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or an HTTP client
    /// cannot be built.
    pub fn from_config(config: PublishConfig) -> anyhow::Result<Self> {
        let store = open_store(&config.store_config())?;
        let github: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(&config.github_api_url)?);
        let feed = source_for(&config.feed_url)?;
        let storage: Arc<dyn ObjectStorage> = Arc::new(FileHost::new(&config.file_host_url)?);
        Ok(Self::from_parts(
            config,
            store,
            github,
            feed,
            storage,
            Arc::new(SystemClock),
        ))
    }

    /// Load `~/.byrdocs/config.yaml` (or defaults) and build an engine.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let config = PublishConfig::load_default()?;
        Self::from_config(config)
    }

    /// Load the configuration at `path` and build an engine.
    pub fn with_config(path: &Path) -> anyhow::Result<Self> {
        let config = PublishConfig::from_path(path)?;
        Self::from_config(config)
    }

    /// Assemble an engine from explicit collaborators.
    pub fn from_parts(
        config: PublishConfig,
        store: Arc<dyn Store>,
        github: Arc<dyn GitHubApi>,
        feed: Box<dyn FeedSource>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let codec = YamlCodec::new(&config.schema_base);
        let feed = CachedFeed::new(feed, config.feed_ttl(), clock.clone());
        let session = SessionFile::new(config.data_dir().join(SESSION_FILENAME));
        Self {
            config,
            codec,
            store,
            github,
            feed,
            storage,
            clock,
            session,
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn codec(&self) -> &YamlCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// The signed-in user: `config.user` if set, else the saved session.
    pub fn current_user(&self) -> PublishResult<UserId> {
        if let Some(user) = &self.config.user {
            return Ok(UserId(user.github_user_id));
        }
        self.session
            .load()?
            .map(|s| s.github_user_id)
            .ok_or(PublishError::NotSignedIn)
    }

    pub fn current_session(&self) -> PublishResult<Option<Session>> {
        self.session.load()
    }

    /// Sign in with an OAuth access token.
    pub fn login_with_token(&self, token: &str) -> PublishResult<Session> {
        let me = self.github.authenticated_user(token)?;
        self.store.upsert_user(User {
            github_user_id: UserId(me.id),
            username: me.login.clone(),
            access_token: token.to_string(),
        })?;

        let session = Session {
            github_user_id: UserId(me.id),
            username: me.login,
            signed_in_at: self.clock.now(),
        };
        self.session.save(&session)?;
        info!("Signed in as {}", session.username);
        Ok(session)
    }

    /// Sign in by exchanging an OAuth authorization code.
    pub fn login_with_code(&self, code: &str) -> PublishResult<Session> {
        let oauth = self.config.oauth.as_ref().ok_or_else(|| {
            PublishError::InvalidConfig("oauth.client_id and oauth.client_secret are not set".to_string())
        })?;
        let token = exchange_oauth_code(&oauth.client_id, &oauth.client_secret, code)?;
        self.login_with_token(&token)
    }

    /// Forget the saved session. Returns whether one existed.
    pub fn logout(&self) -> PublishResult<bool> {
        self.session.clear()
    }

    // -------------------------------------------------------------------------
    // Feed and status
    // -------------------------------------------------------------------------

    pub fn feed(&self) -> PublishResult<Arc<MetadataFeed>> {
        self.feed.get()
    }

    /// Drop the cached feed so the next read refetches.
    pub fn refresh_feed(&self) {
        self.feed.invalidate();
    }

    pub fn status(&self, user: UserId) -> PublishResult<StatusReport> {
        let feed = self.feed()?;
        let staged = self.store.list_changes(user)?;
        let files = reconcile(&self.codec, &feed.records, &staged);
        debug!("Reconciled {} records with {} staged changes", feed.len(), staged.len());
        Ok(StatusReport {
            user,
            summary: ReconcileSummary::from_files(&files),
            files,
        })
    }

    /// The reconciled file for `id`.
    pub fn show(&self, user: UserId, id: &str) -> PublishResult<ReconciledFile> {
        self.status(user)?
            .files
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| PublishError::RecordNotFound(id.to_string()))
    }

    pub fn file_diff(&self, user: UserId, id: &str) -> PublishResult<Vec<DiffLine>> {
        Ok(file_diff(&self.show(user, id)?))
    }

    // -------------------------------------------------------------------------
    // Staging
    // -------------------------------------------------------------------------

    pub fn validate_text(&self, text: &str) -> ValidationOutcome {
        validate_text(text, self.clock.as_ref())
    }

    /// Parse a YAML file and stage it.
    pub fn stage_file(&self, user: UserId, path: &Path) -> PublishResult<FileChange> {
        let text = std::fs::read_to_string(path)?;
        let record = self.codec.parse(&text)?;
        self.stage_record(user, &record)
    }

    pub fn stage_record(&self, user: UserId, record: &MetadataRecord) -> PublishResult<FileChange> {
        let feed = self.feed()?;
        staging::stage_edit(
            self.store.as_ref(),
            &self.codec,
            user,
            record,
            feed.get(&record.id),
            self.clock.as_ref(),
        )
    }

    pub fn stage_deletion(&self, user: UserId, id: &str) -> PublishResult<StagedDeletion> {
        let feed = self.feed()?;
        staging::stage_delete(
            self.store.as_ref(),
            &self.codec,
            user,
            id,
            feed.get(id),
            self.clock.as_ref(),
        )
    }

    pub fn revert(&self, user: UserId, id: &str) -> PublishResult<()> {
        staging::revert(self.store.as_ref(), user, id)
    }

    // -------------------------------------------------------------------------
    // Publishing and binding
    // -------------------------------------------------------------------------

    pub fn publisher(&self) -> Publisher {
        Publisher::new(
            self.github.clone(),
            self.store.clone(),
            self.config.upstream.repo_ref(),
            self.clock.clone(),
        )
    }

    /// Run the full publish sequence for `user`.
    pub fn publish(
        &self,
        user: UserId,
        observer: &mut dyn PublishObserver,
    ) -> PublishResult<PublishOutcome> {
        self.publisher().run(user, observer)
    }

    fn binding(&self) -> BindingService {
        BindingService::new(
            self.github.clone(),
            self.store.clone(),
            self.config.upstream.repo_ref(),
            self.clock.clone(),
        )
    }

    pub fn binding_overview(&self, user: UserId) -> PublishResult<BindingOverview> {
        self.binding().overview(user)
    }

    pub fn current_binding(&self, user: UserId) -> PublishResult<Option<BoundRepository>> {
        self.binding().current_binding(user)
    }

    pub fn bind(&self, user: UserId, installation_id: u64) -> PublishResult<BoundRepository> {
        self.binding().bind(user, installation_id)
    }

    pub fn unbind(&self, user: UserId) -> PublishResult<bool> {
        self.binding().unbind(user)
    }

    // -------------------------------------------------------------------------
    // Webhooks and uploads
    // -------------------------------------------------------------------------

    pub fn handle_webhook(
        &self,
        event: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> PublishResult<WebhookOutcome> {
        handle_webhook(
            self.store.as_ref(),
            self.config.webhook_secret.as_deref(),
            event,
            body,
            signature,
        )
    }

    pub fn plan_upload(&self, path: &Path, cancel: &CancelFlag) -> PublishResult<UploadPlan> {
        plan_upload(self.storage.as_ref(), path, cancel)
    }
}

impl std::fmt::Debug for ArchiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEngine")
            .field("upstream", &self.config.upstream.repo_ref().to_string())
            .field("feed", &self.feed.location())
            .field("session", &self.session.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::UserConfig;
    use crate::feed::FileFeedSource;
    use byrdocs_test_utils::{FakeGitHub, LOGIN, USER_ID};
    use byrdocs_db::MemoryStore;
    use tempfile::TempDir;

    struct NoStorage;

    impl ObjectStorage for NoStorage {
        fn exists(&self, _key: &str) -> PublishResult<bool> {
            Ok(false)
        }

        fn url_for(&self, key: &str) -> String {
            format!("https://byrdocs.org/files/{}", key)
        }
    }

    fn engine(temp: &TempDir, config: PublishConfig) -> ArchiveEngine {
        let feed_path = temp.path().join("metadata.json");
        std::fs::write(&feed_path, r#"{"data":[],"courses":[]}"#).unwrap();
        ArchiveEngine::from_parts(
            PublishConfig {
                data_dir: Some(temp.path().join("data")),
                ..config
            },
            Arc::new(MemoryStore::new()),
            Arc::new(FakeGitHub::default()),
            Box::new(FileFeedSource::new(feed_path)),
            Arc::new(NoStorage),
            Arc::new(FixedClock::at_date(2024, 5, 1)),
        )
    }

    #[test]
    fn test_not_signed_in_until_login() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, PublishConfig::default_for_testing());
        assert!(matches!(engine.current_user(), Err(PublishError::NotSignedIn)));

        let session = engine.login_with_token("gho_token").unwrap();
        assert_eq!(session.username, LOGIN);
        assert_eq!(engine.current_user().unwrap(), UserId(USER_ID));
        let user = engine.store().get_user(UserId(USER_ID)).unwrap().unwrap();
        assert_eq!(user.access_token, "gho_token");

        assert!(engine.logout().unwrap());
        assert!(matches!(engine.current_user(), Err(PublishError::NotSignedIn)));
    }

    #[test]
    fn test_configured_user_overrides_session() {
        let temp = TempDir::new().unwrap();
        let config = PublishConfig {
            user: Some(UserConfig {
                username: "ci".to_string(),
                github_user_id: 99,
            }),
            ..PublishConfig::default_for_testing()
        };
        assert_eq!(engine(&temp, config).current_user().unwrap(), UserId(99));
    }

    #[test]
    fn test_login_with_code_requires_oauth_config() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, PublishConfig::default_for_testing());
        assert!(matches!(
            engine.login_with_code("abc"),
            Err(PublishError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_webhook_without_secret_is_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, PublishConfig::default_for_testing());
        assert!(matches!(
            engine.handle_webhook("installation", b"{}", None),
            Err(PublishError::WebhookSecretMissing)
        ));
    }

    #[test]
    fn test_show_unknown_id() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, PublishConfig::default_for_testing());
        assert!(matches!(
            engine.show(UserId(1), "0123456789abcdef0123456789abcdef"),
            Err(PublishError::RecordNotFound(_))
        ));
    }
}
