//! Error types for byrdocs-core.

use byrdocs_db::DbError;
use byrdocs_remote::RemoteError;
use thiserror::Error;

use crate::publish::PublishStep;
use crate::validate::FieldError;

/// Result type alias for byrdocs-core operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Domain-specific errors for BYR Docs Publish operations.
#[derive(Error, Debug)]
pub enum PublishError {
    // =========================================================================
    // Configuration / session
    // =========================================================================
    /// Configuration file is unreadable or invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No user is signed in.
    #[error("Not signed in. Run `byrdocs login` first.")]
    NotSignedIn,

    /// The signed-in user is unknown to the store.
    #[error("User {0} not found. Run `byrdocs login` again.")]
    UnknownUser(u64),

    // =========================================================================
    // Records and staging
    // =========================================================================
    /// Metadata text could not be parsed into a record.
    #[error("Invalid metadata: {0}")]
    InvalidRecord(String),

    /// A record failed field validation; nothing was staged.
    #[error("Validation failed: {}", format_field_errors(.0))]
    ValidationFailed(Vec<FieldError>),

    /// The id exists neither upstream nor in the user's staged changes.
    #[error("Record `{0}` not found.")]
    RecordNotFound(String),

    /// Revert requested for an id with no staged change.
    #[error("No staged change for `{0}`. Nothing to revert.")]
    NothingToRevert(String),

    // =========================================================================
    // Publishing
    // =========================================================================
    /// The user has no staged changes.
    #[error("No staged changes. Nothing to publish.")]
    NothingToPublish,

    /// The user has not bound a fork yet.
    #[error("No repository bound. Run `byrdocs forks` and `byrdocs bind <installation-id>` first.")]
    NotBound,

    /// The installation cannot be used as a publish target.
    #[error("Installation {installation_id} cannot be used: {reason}")]
    InstallationUnavailable {
        /// The installation id.
        installation_id: u64,
        /// Why it cannot be used.
        reason: String,
    },

    /// A publish step was invoked before the steps it depends on.
    #[error("Step `{step}` cannot run yet: {missing} is not available")]
    StepOutOfOrder {
        /// The step that was invoked.
        step: PublishStep,
        /// The missing output of an earlier step.
        missing: &'static str,
    },

    /// A publish step failed on the remote side. The sequence halted here.
    #[error("{step} failed: {message}")]
    StepFailed {
        /// The failing step.
        step: PublishStep,
        /// Human-readable failure message.
        message: String,
    },

    // =========================================================================
    // Webhooks
    // =========================================================================
    /// Webhook signature is missing or does not match.
    #[error("Webhook signature verification failed.")]
    InvalidSignature,

    /// No webhook secret is configured.
    #[error("No webhook secret configured. Set `webhook_secret` in config.yaml.")]
    WebhookSecretMissing,

    // =========================================================================
    // Feed and uploads
    // =========================================================================
    /// The metadata feed could not be loaded.
    #[error("Metadata feed unavailable: {0}")]
    Feed(String),

    /// The operation was cancelled by the user.
    #[error("Operation cancelled.")]
    Cancelled,

    /// The upload key already exists on the file host.
    #[error("File `{key}` has already been uploaded.")]
    AlreadyUploaded {
        /// The `<md5>.<ext>` key.
        key: String,
    },

    /// Only pdf and zip files are accepted.
    #[error("Unsupported file extension `{0}`. Only pdf and zip are accepted.")]
    UnsupportedExtension(String),

    // =========================================================================
    // Wrapped errors
    // =========================================================================
    /// Store error.
    #[error("Store error: {0}")]
    Db(#[from] DbError),

    /// Remote service error outside the publish sequence.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PublishError {
    /// Field errors carried by a validation failure.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Self::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }

    /// Whether the error means the user has to sign in.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::NotSignedIn | Self::UnknownUser(_) | Self::InvalidSignature
        )
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_lists_fields() {
        let err = PublishError::ValidationFailed(vec![
            FieldError::new("data.title", "Title is required"),
            FieldError::new("data.isbn[0]", "Invalid ISBN"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: data.title: Title is required; data.isbn[0]: Invalid ISBN"
        );
        assert_eq!(err.field_errors().map(|f| f.len()), Some(2));
    }

    #[test]
    fn test_step_failed_names_step() {
        let err = PublishError::StepFailed {
            step: PublishStep::CreateBranch,
            message: "Reference already exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Create branch failed: Reference already exists"
        );
    }
}
