//! Common constants used throughout byrdocs-core.
//!
//! Paths, URLs, and limits shared by the codec, validators, and publisher.

// ============================================================================
// Directory Names
// ============================================================================

/// The name of the global configuration directory (`~/.byrdocs/`).
pub const BYRDOCS_HOME_DIR: &str = ".byrdocs";

/// Config file within [`BYRDOCS_HOME_DIR`].
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Default store directory within [`BYRDOCS_HOME_DIR`].
pub const DATA_DIR: &str = "data";

/// File recording the signed-in user, within the data directory.
pub const SESSION_FILENAME: &str = "session.json";

// ============================================================================
// Archive layout
// ============================================================================

/// Directory holding metadata files in the archive repository.
pub const METADATA_DIR: &str = "metadata";

/// Extension of metadata files.
pub const METADATA_EXTENSION: &str = "yml";

// ============================================================================
// Remote defaults
// ============================================================================

/// Public site.
pub const DEFAULT_SITE_URL: &str = "https://byrdocs.org";

/// Base of the JSON schemas referenced from metadata headers.
pub const DEFAULT_SCHEMA_BASE: &str = "https://byrdocs.org/schema";

/// Published metadata feed.
pub const DEFAULT_FEED_URL: &str = "https://files.byrdocs.org/metadata2.json";

/// Feed cache lifetime in seconds.
pub const DEFAULT_FEED_TTL_SECS: u64 = 300;

/// Canonical upstream archive.
pub const DEFAULT_UPSTREAM_OWNER: &str = "byrdocs";
pub const DEFAULT_UPSTREAM_REPO: &str = "byrdocs-archive";

/// Every record URL must start with this prefix.
pub const FILE_URL_PREFIX: &str = "https://byrdocs.org/files/";

/// Page size when listing a user's repositories.
pub const REPOS_PAGE_SIZE: u32 = 100;

// ============================================================================
// Validation
// ============================================================================

/// Lowest year accepted in a test's year range.
pub const MIN_RANGE_YEAR: i32 = 2000;

/// First month (1-based) of the next academic year.
pub const ACADEMIC_YEAR_ROLLOVER_MONTH: u32 = 8;

// ============================================================================
// Uploads / commits
// ============================================================================

/// Read size when hashing upload candidates.
pub const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Footer line appended to every generated commit and pull request body.
pub const COMMIT_ATTRIBUTION: &str = "此提交由 BYR Docs Publish 自动生成";

/// Repository path of the metadata file for `id`.
pub fn metadata_path(filename: &str) -> String {
    format!("{}/{}", METADATA_DIR, filename)
}

/// Metadata file name for `id`.
pub fn metadata_filename(id: &str) -> String {
    format!("{}.{}", id, METADATA_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_naming() {
        let filename = metadata_filename("0123456789abcdef0123456789abcdef");
        assert_eq!(filename, "0123456789abcdef0123456789abcdef.yml");
        assert_eq!(
            metadata_path(&filename),
            "metadata/0123456789abcdef0123456789abcdef.yml"
        );
    }
}
