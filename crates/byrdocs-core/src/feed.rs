//! The published metadata feed.
//!
//! The archive publishes every record as one JSON document:
//!
//! ```json
//! {"data": [{"id": "...", "url": "...", "type": "book", "data": {...}}], "courses": ["..."]}
//! ```
//!
//! A bare array of records is accepted too. Entries that do not decode are
//! skipped with a warning rather than failing the whole feed.
//!
//! [`CachedFeed`] keeps the last document for the configured TTL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byrdocs_remote::FeedClient;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::errors::{PublishError, PublishResult};
use crate::record::MetadataRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFeed {
    pub records: Vec<MetadataRecord>,
    pub courses: Vec<String>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFeed {
    Document {
        #[serde(default)]
        data: Vec<Value>,
        #[serde(default)]
        courses: Vec<String>,
    },
    Records(Vec<Value>),
}

impl MetadataFeed {
    pub fn new(records: Vec<MetadataRecord>, courses: Vec<String>) -> Self {
        // First record wins on duplicate ids, matching `reconcile`.
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            index.entry(record.id.clone()).or_insert(i);
        }
        Self {
            records,
            courses,
            index,
        }
    }

    /// Decode a feed document.
    pub fn parse(text: &str) -> PublishResult<Self> {
        let raw: RawFeed =
            serde_json::from_str(text).map_err(|e| PublishError::Feed(e.to_string()))?;
        let (entries, courses) = match raw {
            RawFeed::Document { data, courses } => (data, courses),
            RawFeed::Records(data) => (data, Vec::new()),
        };

        let total = entries.len();
        let records: Vec<MetadataRecord> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping feed entry {}: {}", i, e);
                    None
                }
            })
            .collect();
        debug!("Parsed {}/{} feed records", records.len(), total);

        Ok(Self::new(records, courses))
    }

    pub fn get(&self, id: &str) -> Option<&MetadataRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Where a feed document comes from.
pub trait FeedSource: Send + Sync {
    fn fetch(&self) -> PublishResult<MetadataFeed>;

    /// URL or path, for messages.
    fn location(&self) -> String;
}

impl FeedSource for FeedClient {
    fn fetch(&self) -> PublishResult<MetadataFeed> {
        let text = self
            .fetch_text()
            .map_err(|e| PublishError::Feed(e.to_string()))?;
        MetadataFeed::parse(&text)
    }

    fn location(&self) -> String {
        self.url().to_string()
    }
}

/// A feed document on disk, for offline use and tests.
#[derive(Debug, Clone)]
pub struct FileFeedSource {
    path: PathBuf,
}

impl FileFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedSource for FileFeedSource {
    fn fetch(&self) -> PublishResult<MetadataFeed> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            PublishError::Feed(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        MetadataFeed::parse(&text)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick a source for `location`: http(s) URLs are downloaded, anything else
/// is read as a local file.
pub fn source_for(location: &str) -> PublishResult<Box<dyn FeedSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(FeedClient::new(location)?))
    } else {
        let path = location.strip_prefix("file://").unwrap_or(location);
        Ok(Box::new(FileFeedSource::new(path)))
    }
}

// ============================================================================
// CachedFeed
// ============================================================================

/// A [`FeedSource`] behind a [`TtlCache`].
pub struct CachedFeed {
    source: Box<dyn FeedSource>,
    cache: TtlCache<Arc<MetadataFeed>>,
}

impl CachedFeed {
    pub fn new(source: Box<dyn FeedSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl, clock),
        }
    }

    /// The feed, refetched if the cached copy is older than the TTL.
    pub fn get(&self) -> PublishResult<Arc<MetadataFeed>> {
        self.cache.get_or_try_insert_with(|| {
            debug!("Refreshing metadata feed from {}", self.source.location());
            self.source.fetch().map(Arc::new)
        })
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.cache.fetched_at()
    }

    pub fn location(&self) -> String {
        self.source.location()
    }
}
