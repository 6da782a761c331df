//! Reconciliation of upstream metadata with a user's staged changes.
//!
//! [`reconcile`] merges the feed snapshot and the user's [`FileChange`] rows
//! into one list of [`ReconciledFile`]s sorted by id. Nothing here is
//! persisted; the view is recomputed on every read.
//!
//! Conflicts are flagged, not raised:
//! - a staged deletion whose captured content no longer matches upstream is a
//!   [`ConflictType::Deletion`] conflict
//! - a staged creation whose id already exists upstream is a
//!   [`ConflictType::Content`] conflict
//! - a staged edit or deletion whose upstream record is gone is also a
//!   [`ConflictType::Deletion`] conflict

use std::collections::{HashMap, HashSet};

use byrdocs_db::{ChangeStatus, FileChange};
use serde::Serialize;

use crate::constants::metadata_filename;
use crate::diff::{diff_lines, DiffLine};
use crate::record::MetadataRecord;
use crate::yaml::YamlCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Unchanged,
    Created,
    Modified,
    Deleted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// A "new" record's id already exists upstream.
    Content,
    /// Upstream changed after the user staged its deletion, or removed a
    /// file the user staged an edit or deletion for.
    Deletion,
}

/// Merged view of one metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledFile {
    pub id: String,
    pub filename: String,
    pub status: FileStatus,
    /// Proposed text, or the current upstream text for unchanged and deleted files.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_content: Option<String>,
    pub has_conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_type: Option<ConflictType>,
    /// True iff a staged row exists.
    pub can_revert: bool,
}

impl ReconciledFile {
    fn unchanged(id: &str, content: String) -> Self {
        Self {
            id: id.to_string(),
            filename: metadata_filename(id),
            status: FileStatus::Unchanged,
            content,
            previous_content: None,
            has_conflict: false,
            conflict_type: None,
            can_revert: false,
        }
    }

    fn staged(change: &FileChange, status: FileStatus) -> Self {
        Self {
            id: change.md5_hash.clone(),
            filename: change.filename.clone(),
            status,
            content: change.content.clone(),
            previous_content: change.previous_content.clone(),
            has_conflict: false,
            conflict_type: None,
            can_revert: true,
        }
    }

    fn conflict(mut self, kind: ConflictType) -> Self {
        self.has_conflict = true;
        self.conflict_type = Some(kind);
        self
    }
}

/// Merge `remote` with the user's `staged` rows.
pub fn reconcile(
    codec: &YamlCodec,
    remote: &[MetadataRecord],
    staged: &[FileChange],
) -> Vec<ReconciledFile> {
    let by_id: HashMap<&str, &FileChange> =
        staged.iter().map(|c| (c.md5_hash.as_str(), c)).collect();

    let mut files: Vec<ReconciledFile> = Vec::with_capacity(remote.len() + staged.len());
    let mut seen: HashSet<&str> = HashSet::with_capacity(remote.len());

    for record in remote {
        if !seen.insert(record.id.as_str()) {
            continue;
        }

        let Some(change) = by_id.get(record.id.as_str()) else {
            files.push(ReconciledFile::unchanged(&record.id, codec.serialize(record)));
            continue;
        };

        let file = match change.status {
            ChangeStatus::Deleted => {
                let current = codec.serialize(record);
                let previous = change.previous_content.clone().unwrap_or_default();
                let file = ReconciledFile {
                    content: current.clone(),
                    ..ReconciledFile::staged(change, FileStatus::Deleted)
                };
                if current != previous {
                    file.conflict(ConflictType::Deletion)
                } else {
                    file
                }
            }
            ChangeStatus::Modified => {
                let mut file = ReconciledFile::staged(change, FileStatus::Modified);
                if file.previous_content.as_deref().map_or(true, str::is_empty) {
                    file.previous_content = Some(codec.serialize(record));
                }
                file
            }
            ChangeStatus::Created => {
                ReconciledFile::staged(change, FileStatus::Created).conflict(ConflictType::Content)
            }
        };
        files.push(file);
    }

    files.extend(
        staged
            .iter()
            .filter(|c| c.status == ChangeStatus::Created && !seen.contains(c.md5_hash.as_str()))
            .map(|c| ReconciledFile::staged(c, FileStatus::Created)),
    );

    // Upstream dropped the record under a staged edit or deletion.
    files.extend(
        staged
            .iter()
            .filter(|c| c.status != ChangeStatus::Created && !seen.contains(c.md5_hash.as_str()))
            .map(|c| {
                let file = match c.status {
                    ChangeStatus::Deleted => ReconciledFile {
                        content: String::new(),
                        ..ReconciledFile::staged(c, FileStatus::Deleted)
                    },
                    _ => ReconciledFile::staged(c, FileStatus::Modified),
                };
                file.conflict(ConflictType::Deletion)
            }),
    );

    files.sort_by(|a, b| a.id.cmp(&b.id));
    files
}

/// Line diff of what publishing `file` would change.
///
/// Created files diff from empty, deleted files to empty, modified files from
/// their previous content.
pub fn file_diff(file: &ReconciledFile) -> Vec<DiffLine> {
    match file.status {
        FileStatus::Created => diff_lines("", &file.content),
        FileStatus::Deleted => diff_lines(&file.content, ""),
        FileStatus::Modified => {
            diff_lines(file.previous_content.as_deref().unwrap_or(""), &file.content)
        }
        FileStatus::Unchanged => diff_lines(&file.content, &file.content),
    }
}

/// Per-status counts of a reconciled list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub total: usize,
    pub unchanged: usize,
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    pub conflicts: usize,
}

impl ReconcileSummary {
    pub fn from_files(files: &[ReconciledFile]) -> Self {
        let mut summary = Self {
            total: files.len(),
            ..Self::default()
        };
        for file in files {
            match file.status {
                FileStatus::Unchanged => summary.unchanged += 1,
                FileStatus::Created => summary.created += 1,
                FileStatus::Modified => summary.modified += 1,
                FileStatus::Deleted => summary.deleted += 1,
            }
            if file.has_conflict {
                summary.conflicts += 1;
            }
        }
        summary
    }

    /// Number of files publishing would touch.
    pub fn pending(&self) -> usize {
        self.created + self.modified + self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DocContent, DocData, FileType, Payload};
    use byrdocs_db::UserId;
    use chrono::Utc;

    fn id(n: u8) -> String {
        format!("{:032x}", n)
    }

    fn doc(n: u8, title: &str) -> MetadataRecord {
        MetadataRecord::new(
            id(n),
            format!("https://byrdocs.org/files/{}.pdf", id(n)),
            Payload::Doc(DocData {
                title: title.to_string(),
                filetype: FileType::Pdf,
                course: vec![],
                content: vec![DocContent::Courseware],
            }),
        )
    }

    fn change(n: u8, status: ChangeStatus, content: &str, previous: Option<&str>) -> FileChange {
        FileChange {
            user_id: UserId(1),
            md5_hash: id(n),
            filename: metadata_filename(&id(n)),
            status,
            content: content.to_string(),
            previous_content: previous.map(str::to_string),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unstaged_records_are_unchanged_and_sorted() {
        let codec = YamlCodec::default();
        let files = reconcile(&codec, &[doc(2, "B"), doc(1, "A")], &[]);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, id(1));
        assert!(files.iter().all(|f| f.status == FileStatus::Unchanged && !f.can_revert));
        assert_eq!(files[1].content, codec.serialize(&doc(2, "B")));
    }

    #[test]
    fn test_deletion_conflict_tracks_upstream_drift() {
        let codec = YamlCodec::default();
        let original = doc(1, "A");
        let staged = vec![change(
            1,
            ChangeStatus::Deleted,
            "",
            Some(&codec.serialize(&original)),
        )];

        let clean = reconcile(&codec, &[original.clone()], &staged);
        assert_eq!(clean[0].status, FileStatus::Deleted);
        assert!(!clean[0].has_conflict);

        let drifted = reconcile(&codec, &[doc(1, "A (revised)")], &staged);
        assert!(drifted[0].has_conflict);
        assert_eq!(drifted[0].conflict_type, Some(ConflictType::Deletion));
        assert_eq!(drifted[0].content, codec.serialize(&doc(1, "A (revised)")));
        assert_eq!(drifted[0].previous_content, staged[0].previous_content);
    }

    #[test]
    fn test_modified_backfills_missing_previous_content() {
        let codec = YamlCodec::default();
        let staged = vec![change(1, ChangeStatus::Modified, "new text\n", None)];
        let files = reconcile(&codec, &[doc(1, "A")], &staged);
        assert_eq!(files[0].status, FileStatus::Modified);
        assert_eq!(files[0].previous_content, Some(codec.serialize(&doc(1, "A"))));
        assert_eq!(files[0].content, "new text\n");
        assert!(files[0].can_revert);
    }

    #[test]
    fn test_created_collision_and_local_creation() {
        let codec = YamlCodec::default();
        let staged = vec![
            change(1, ChangeStatus::Created, "mine\n", None),
            change(3, ChangeStatus::Created, "new\n", None),
        ];
        let files = reconcile(&codec, &[doc(1, "A"), doc(2, "B")], &staged);

        let statuses: Vec<(String, FileStatus, bool)> = files
            .iter()
            .map(|f| (f.id.clone(), f.status, f.has_conflict))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (id(1), FileStatus::Created, true),
                (id(2), FileStatus::Unchanged, false),
                (id(3), FileStatus::Created, false),
            ]
        );
        assert_eq!(files[0].conflict_type, Some(ConflictType::Content));

        let summary = ReconcileSummary::from_files(&files);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.conflicts, 1);
        assert_eq!(summary.pending(), 2);
    }

    #[test]
    fn test_staged_rows_without_upstream_record_conflict() {
        let codec = YamlCodec::default();
        let staged = vec![
            change(4, ChangeStatus::Modified, "edited\n", Some("old\n")),
            change(5, ChangeStatus::Deleted, "", Some("old\n")),
        ];
        let files = reconcile(&codec, &[doc(1, "A")], &staged);
        assert_eq!(files.len(), 3);

        let edited = &files[1];
        assert_eq!(edited.id, id(4));
        assert_eq!(edited.status, FileStatus::Modified);
        assert_eq!(edited.content, "edited\n");
        assert_eq!(edited.conflict_type, Some(ConflictType::Deletion));
        assert!(edited.can_revert);

        let deleted = &files[2];
        assert_eq!(deleted.status, FileStatus::Deleted);
        assert_eq!(deleted.content, "");
        assert_eq!(deleted.previous_content.as_deref(), Some("old\n"));
        assert!(deleted.has_conflict);

        let summary = ReconcileSummary::from_files(&files);
        assert_eq!(summary.conflicts, 2);
        assert_eq!(summary.pending(), 2);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let codec = YamlCodec::default();
        let remote = vec![doc(1, "A"), doc(2, "B")];
        let staged = vec![change(2, ChangeStatus::Deleted, "", Some("x\n"))];
        let first = serde_json::to_string(&reconcile(&codec, &remote, &staged)).unwrap();
        let second = serde_json::to_string(&reconcile(&codec, &remote, &staged)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_diff_directions() {
        let codec = YamlCodec::default();
        let staged = vec![change(5, ChangeStatus::Created, "a\nb\n", None)];
        let files = reconcile(&codec, &[], &staged);
        let lines = file_diff(&files[0]);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.kind == crate::diff::DiffKind::Added));
    }
}
