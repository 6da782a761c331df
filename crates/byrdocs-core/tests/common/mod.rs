//! Shared fixtures for byrdocs-core integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use byrdocs_core::{
    ArchiveEngine, BookData, FileFeedSource, FileType, FixedClock, MetadataRecord, ObjectStorage,
    Payload, PublishConfig, PublishResult,
};
use byrdocs_db::{AccountStore, AccountType, GitHubInstallation, MemoryStore};

pub use byrdocs_test_utils::{FakeGitHub, LOGIN, USER_ID};

pub const INSTALLATION_ID: u64 = 77;

pub struct OpenStorage;

impl ObjectStorage for OpenStorage {
    fn exists(&self, _key: &str) -> PublishResult<bool> {
        Ok(false)
    }

    fn url_for(&self, key: &str) -> String {
        format!("https://byrdocs.org/files/{}", key)
    }
}

pub struct Harness {
    pub engine: ArchiveEngine,
    pub github: Arc<FakeGitHub>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
}

/// Engine over a memory store, a feed file holding `remote`, and `github`.
pub fn harness(dir: &Path, remote: &[MetadataRecord], github: FakeGitHub) -> Harness {
    let feed_path = dir.join("metadata.json");
    std::fs::write(
        &feed_path,
        serde_json::json!({ "data": remote, "courses": ["高等数学"] }).to_string(),
    )
    .unwrap();

    let github = Arc::new(github);
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::at_date(2024, 5, 20));
    let config = PublishConfig {
        data_dir: Some(dir.join("data")),
        webhook_secret: Some("hook-secret".to_string()),
        ..PublishConfig::default_for_testing()
    };
    let engine = ArchiveEngine::from_parts(
        config,
        store.clone(),
        github.clone(),
        Box::new(FileFeedSource::new(feed_path)),
        Arc::new(OpenStorage),
        clock.clone(),
    );
    Harness {
        engine,
        github,
        store,
        clock,
    }
}

impl Harness {
    /// Sign in and bind to a ready installation.
    pub fn sign_in_and_bind(&self) -> byrdocs_core::UserId {
        let session = self.engine.login_with_token("gho_test").unwrap();
        self.store
            .upsert_installation(GitHubInstallation {
                installation_id: INSTALLATION_ID,
                account_login: LOGIN.to_string(),
                account_type: AccountType::User,
                repository_name: Some("byrdocs-archive".to_string()),
                is_suspended: false,
            })
            .unwrap();
        self.engine
            .bind(session.github_user_id, INSTALLATION_ID)
            .unwrap();
        session.github_user_id
    }
}

pub fn book(id: &str, title: &str) -> MetadataRecord {
    MetadataRecord::new(
        id,
        format!("https://byrdocs.org/files/{}.pdf", id),
        Payload::Book(BookData {
            title: title.to_string(),
            authors: vec!["严蔚敏".to_string(), "吴伟民".to_string()],
            translators: vec![],
            edition: Some("2".to_string()),
            publisher: Some("清华大学出版社".to_string()),
            publish_year: Some("2007".to_string()),
            isbn: vec!["978-7-302-14751-0".to_string()],
            filetype: FileType::Pdf,
        }),
    )
}
