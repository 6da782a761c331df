//! Metadata feed download and file host lookups.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::debug;

use crate::{RemoteError, RemoteResult};

const USER_AGENT: &str = concat!("byrdocs-publish/", env!("CARGO_PKG_VERSION"));

/// Downloads the published metadata document.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>) -> RemoteResult<Self> {
        Ok(Self {
            http: Client::builder().user_agent(USER_AGENT).build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw feed document.
    pub fn fetch_text(&self) -> RemoteResult<String> {
        debug!("Fetching metadata feed from {}", self.url);
        let response = self.http.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Api {
                method: "GET".to_string(),
                path: self.url.clone(),
                status: status.as_u16(),
                message: "metadata feed unavailable".to_string(),
            });
        }
        Ok(response.text()?)
    }
}

/// Public file host serving uploaded documents at `<base>/<key>`.
#[derive(Debug, Clone)]
pub struct FileHost {
    http: Client,
    base_url: String,
}

impl FileHost {
    pub fn new(base_url: impl Into<String>) -> RemoteResult<Self> {
        Ok(Self {
            http: Client::builder().user_agent(USER_AGENT).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Public URL of `key`.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Whether an object already exists under `key`.
    pub fn exists(&self, key: &str) -> RemoteResult<bool> {
        let url = self.url_for(key);
        let response = self.http.head(&url).send()?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(RemoteError::Api {
                method: "HEAD".to_string(),
                path: url,
                status: s.as_u16(),
                message: "unexpected status from file host".to_string(),
            }),
        }
    }
}
