//! Shared test utilities for byrdocs-cli integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use byrdocs_core::{BookData, FileType, MetadataRecord, Payload, YamlCodec};

pub const USER_ID: u64 = 583231;
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const UPSTREAM_ID: &str = "0123456789abcdef0123456789abcdef";
pub const NEW_ID: &str = "fedcba9876543210fedcba9876543210";

/// The `byrdocs` binary.
#[allow(deprecated)]
pub fn byrdocs_cmd() -> Command {
    Command::cargo_bin("byrdocs").expect("byrdocs binary should exist")
}

/// A temp workspace: config with a jsonl store, a local feed holding one
/// book, and a fixed user.
pub struct Workspace {
    pub root: PathBuf,
    pub config: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path) -> Self {
        let feed = root.join("metadata.json");
        std::fs::write(
            &feed,
            serde_json::json!({ "data": [book(UPSTREAM_ID, "数据结构")] }).to_string(),
        )
        .unwrap();

        let config = root.join("config.yaml");
        std::fs::write(
            &config,
            format!(
                "feed_url: {}\nstore: jsonl\ndata_dir: {}\nwebhook_secret: {}\ngithub_api_url: http://127.0.0.1:9\nuser:\n  username: octocat\n  github_user_id: {}\n",
                feed.display(),
                root.join("data").display(),
                WEBHOOK_SECRET,
                USER_ID
            ),
        )
        .unwrap();

        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// `byrdocs --config <config> --color never`
    pub fn cmd(&self) -> Command {
        let mut cmd = byrdocs_cmd();
        cmd.env_remove("BYRDOCS_GITHUB_TOKEN")
            .arg("--config")
            .arg(&self.config)
            .arg("--color")
            .arg("never");
        cmd
    }

    /// Write `record` as canonical YAML and return its path.
    pub fn write_record(&self, record: &MetadataRecord) -> PathBuf {
        let path = self.root.join(record.filename());
        std::fs::write(&path, YamlCodec::new("https://byrdocs.org/schema").serialize(record)).unwrap();
        path
    }
}

pub fn book(id: &str, title: &str) -> MetadataRecord {
    MetadataRecord::new(
        id,
        format!("https://byrdocs.org/files/{}.pdf", id),
        Payload::Book(BookData {
            title: title.to_string(),
            authors: vec!["严蔚敏".to_string()],
            translators: vec![],
            edition: None,
            publisher: Some("清华大学出版社".to_string()),
            publish_year: Some("2007".to_string()),
            isbn: vec!["978-7-302-14751-0".to_string()],
            filetype: FileType::Pdf,
        }),
    )
}
