//! Who is signed in on this machine.
//!
//! The session is a small JSON file under the data directory naming the
//! GitHub user. The user's token itself lives in the store's user table.

use std::fs;
use std::path::{Path, PathBuf};

use byrdocs_db::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PublishResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub github_user_id: UserId,
    pub username: String,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved session, if any.
    pub fn load(&self) -> PublishResult<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn save(&self, session: &Session) -> PublishResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        debug!("Saved session for {} to {}", session.username, self.path.display());
        Ok(())
    }

    /// Remove the session file. Returns whether one existed.
    pub fn clear(&self) -> PublishResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_clear() {
        let temp = TempDir::new().unwrap();
        let file = SessionFile::new(temp.path().join("data").join("session.json"));
        assert!(file.load().unwrap().is_none());

        let session = Session {
            github_user_id: UserId(42),
            username: "octo".to_string(),
            signed_in_at: Utc::now(),
        };
        file.save(&session).unwrap();
        assert_eq!(file.load().unwrap(), Some(session));

        assert!(file.clear().unwrap());
        assert!(!file.clear().unwrap());
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.json");
        fs::write(&path, "{").unwrap();
        assert!(SessionFile::new(path).load().is_err());
    }
}
