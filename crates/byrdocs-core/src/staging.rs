//! Staged change lifecycle.
//!
//! A user's pending edits live in the [`ChangeStore`] as one [`FileChange`]
//! per `(user, id)`. This module decides how a new edit or deletion folds into
//! whatever is already staged for that id.
//!
//! ## Transitions
//!
//! | Existing row | Edit | Delete |
//! |--------------|------|--------|
//! | none, not upstream | `created` | `RecordNotFound` |
//! | none, upstream | `modified` (previous = upstream) | `deleted` (previous = upstream) |
//! | `created` | `created` | row removed |
//! | `modified` | `modified`, previous kept | `deleted` (previous = upstream) |
//! | `deleted` | `modified`, previous kept | unchanged |
//!
//! Reverting removes the row whatever its status.

use byrdocs_db::{ChangeStatus, ChangeStore, FileChange, UserId};
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::constants::metadata_filename;
use crate::errors::{PublishError, PublishResult};
use crate::record::MetadataRecord;
use crate::validate::validate_record;
use crate::yaml::YamlCodec;

// ============================================================================
// Edit
// ============================================================================

/// Stage `record` as the user's proposed content for its id.
///
/// `remote` is the upstream record with the same id, if any. The record must
/// pass [`validate_record`]; otherwise nothing is written.
pub fn stage_edit<S: ChangeStore + ?Sized>(
    store: &S,
    codec: &YamlCodec,
    user: UserId,
    record: &MetadataRecord,
    remote: Option<&MetadataRecord>,
    clock: &dyn Clock,
) -> PublishResult<FileChange> {
    let errors = validate_record(record, clock);
    if !errors.is_empty() {
        return Err(PublishError::ValidationFailed(errors));
    }

    let content = codec.serialize(record);
    let remote_content = || remote.map(|r| codec.serialize(r));

    let (status, previous_content) = match store.get_change(user, &record.id)? {
        None => match remote {
            None => (ChangeStatus::Created, None),
            Some(_) => (ChangeStatus::Modified, remote_content()),
        },
        Some(existing) => match existing.status {
            ChangeStatus::Created => (ChangeStatus::Created, None),
            ChangeStatus::Modified | ChangeStatus::Deleted => (
                ChangeStatus::Modified,
                existing.previous_content.or_else(remote_content),
            ),
        },
    };

    let change = FileChange {
        user_id: user,
        md5_hash: record.id.clone(),
        filename: record.filename(),
        status,
        content,
        previous_content,
        updated_at: clock.now(),
    };
    debug!("Staging {} as {}", change.filename, change.status);
    store.upsert_change(change.clone())?;
    Ok(change)
}

// ============================================================================
// Delete
// ============================================================================

/// Result of staging a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum StagedDeletion {
    /// A pending local change was dropped; nothing upstream to delete.
    Discarded { id: String },
    /// An upstream file is now staged for removal.
    Staged { change: FileChange },
}

/// Stage removal of `id`.
///
/// A purely local creation is simply dropped. So is any leftover row whose
/// upstream counterpart has disappeared.
pub fn stage_delete<S: ChangeStore + ?Sized>(
    store: &S,
    codec: &YamlCodec,
    user: UserId,
    id: &str,
    remote: Option<&MetadataRecord>,
    clock: &dyn Clock,
) -> PublishResult<StagedDeletion> {
    let existing = store.get_change(user, id)?;

    let remote = match (remote, &existing) {
        (_, Some(row)) if row.status == ChangeStatus::Created => {
            store.delete_change(user, id)?;
            debug!("Discarded staged creation of {}", row.filename);
            return Ok(StagedDeletion::Discarded { id: id.to_string() });
        }
        (None, Some(row)) => {
            store.delete_change(user, id)?;
            debug!("Upstream no longer has {}, discarded staged row", row.filename);
            return Ok(StagedDeletion::Discarded { id: id.to_string() });
        }
        (None, None) => return Err(PublishError::RecordNotFound(id.to_string())),
        (Some(remote), _) => remote,
    };

    if let Some(row) = existing.filter(|row| row.status == ChangeStatus::Deleted) {
        return Ok(StagedDeletion::Staged { change: row });
    }

    let change = FileChange {
        user_id: user,
        md5_hash: id.to_string(),
        filename: metadata_filename(id),
        status: ChangeStatus::Deleted,
        content: String::new(),
        previous_content: Some(codec.serialize(remote)),
        updated_at: clock.now(),
    };
    debug!("Staging deletion of {}", change.filename);
    store.upsert_change(change.clone())?;
    Ok(StagedDeletion::Staged { change })
}

// ============================================================================
// Revert
// ============================================================================

/// Discard the staged change for `id`.
pub fn revert<S: ChangeStore + ?Sized>(store: &S, user: UserId, id: &str) -> PublishResult<()> {
    if store.delete_change(user, id)? {
        debug!("Reverted staged change for {}", id);
        Ok(())
    } else {
        Err(PublishError::NothingToRevert(id.to_string()))
    }
}
