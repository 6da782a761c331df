//! Client side of the file upload boundary.
//!
//! Files are addressed by content: the object key is `<md5>.<ext>`, and the
//! same md5 becomes the metadata record id. Hashing runs in fixed-size chunks
//! and checks a [`CancelFlag`] between them so a long hash can be aborted.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byrdocs_remote::FileHost;
use md5::{Digest, Md5};
use serde::Serialize;
use tracing::debug;

use crate::constants::UPLOAD_CHUNK_SIZE;
use crate::errors::{PublishError, PublishResult};
use crate::record::FileType;

/// Shared abort signal.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lowercase hex MD5 of the file at `path`.
pub fn hash_file(path: &Path, cancel: &CancelFlag) -> PublishResult<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];

    loop {
        if cancel.is_cancelled() {
            debug!("Hashing {} cancelled", path.display());
            return Err(PublishError::Cancelled);
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Where uploaded files end up.
pub trait ObjectStorage: Send + Sync {
    fn exists(&self, key: &str) -> PublishResult<bool>;

    fn url_for(&self, key: &str) -> String;
}

impl ObjectStorage for FileHost {
    fn exists(&self, key: &str) -> PublishResult<bool> {
        Ok(FileHost::exists(self, key)?)
    }

    fn url_for(&self, key: &str) -> String {
        FileHost::url_for(self, key)
    }
}

/// What uploading a file would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPlan {
    pub md5: String,
    pub filetype: FileType,
    /// `<md5>.<ext>`
    pub key: String,
    /// Public URL to put in the record.
    pub url: String,
    pub size: u64,
}

/// Hash `path` and check its key is still free.
pub fn plan_upload(
    storage: &dyn ObjectStorage,
    path: &Path,
    cancel: &CancelFlag,
) -> PublishResult<UploadPlan> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let filetype: FileType = extension
        .parse()
        .map_err(|_| PublishError::UnsupportedExtension(extension.clone()))?;

    let size = std::fs::metadata(path)?.len();
    let md5 = hash_file(path, cancel)?;
    let key = format!("{}.{}", md5, filetype.as_str());

    if storage.exists(&key)? {
        return Err(PublishError::AlreadyUploaded { key });
    }
    debug!("Upload plan for {}: {} ({} bytes)", path.display(), key, size);

    Ok(UploadPlan {
        url: storage.url_for(&key),
        md5,
        filetype,
        key,
        size,
    })
}
