//! # byrdocs-core
//!
//! **BYR Docs Publish** – core library.
//!
//! Contributors edit the metadata of the BYR Docs archive (books, past exams
//! and course documents) locally, review the result against the published
//! feed, and publish it as a pull request from their own fork.
//!
//! ## Main Types
//!
//! - [`ArchiveEngine`] – the entry point for every operation
//! - [`MetadataRecord`] – one archived file's metadata
//! - [`PublishError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`record`], [`yaml`] – the record model and its canonical YAML form
//! - [`validate`], [`isbn`] – field validators
//! - [`staging`], [`reconcile`], [`diff`] – local edits and how they compare to upstream
//! - [`publish`], [`commit_message`] – the pull request sequence
//! - [`binding`], [`webhook`] – which fork a user publishes through
//! - [`feed`], [`cache`] – the published metadata feed
//! - [`upload`] – content-addressed upload keys
//!
//! ## Example
//!
//! ```ignore
//! use byrdocs_core::{ArchiveEngine, NoopObserver};
//! use std::path::Path;
//!
//! let engine = ArchiveEngine::with_defaults()?;
//! let user = engine.current_user()?;
//!
//! engine.stage_file(user, Path::new("0123456789abcdef0123456789abcdef.yml"))?;
//! let outcome = engine.publish(user, &mut NoopObserver)?;
//! println!("Opened {}", outcome.pull_request_url);
//! ```

pub mod binding;
pub mod cache;
pub mod clock;
pub mod commit_message;
pub mod config;
pub mod constants;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod feed;
pub mod isbn;
pub mod publish;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod staging;
pub mod upload;
pub mod validate;
pub mod webhook;
pub mod yaml;

pub use binding::{BindingOverview, BindingService, BoundRepository, CandidateFork};
pub use cache::TtlCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use commit_message::CommitMessage;
pub use config::{OAuthConfig, PublishConfig, UpstreamConfig, UserConfig};
pub use diff::{diff_lines, render_unified, summarize, DiffKind, DiffLine, DiffStats};
pub use engine::{ArchiveEngine, StatusReport};
pub use errors::{PublishError, PublishResult};
pub use feed::{CachedFeed, FeedSource, FileFeedSource, MetadataFeed};
pub use publish::{
    branch_name, NoopObserver, PublishObserver, PublishOutcome, PublishSession, PublishStep,
    Publisher, StepEvent,
};
pub use reconcile::{ConflictType, FileStatus, ReconcileSummary, ReconciledFile};
pub use record::{
    BookData, Course, CourseType, DocContent, DocData, ExamStage, FileType, MetadataRecord,
    Payload, RecordKind, Semester, TestContent, TestData, TestTime,
};
pub use session::Session;
pub use staging::StagedDeletion;
pub use upload::{CancelFlag, ObjectStorage, UploadPlan};
pub use validate::{FieldError, ValidationOutcome};
pub use webhook::WebhookOutcome;
pub use yaml::{parse_record, YamlCodec};

// Store and remote types that appear in the public API.
pub use byrdocs_db::{ChangeStatus, FileChange, UserId};
pub use byrdocs_remote::RepoRef;
