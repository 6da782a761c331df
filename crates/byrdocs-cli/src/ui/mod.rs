//! # CLI UI Module
//!
//! Styling and formatting layer for `byrdocs` output.
//!
//! Output is scannable (`[ok]`/`[err]` prefixes), respects `NO_COLOR`, and
//! every listing command has a `--json` form for scripts.
//!
//! - `style`: color mode, message prefixes, status and diff coloring
//! - `format`: small text formatters
//! - `table`: comfy-table listings
//! - `progress`: publish step progress and spinners

pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use progress::{Progress, ProgressMode, StepProgress};
pub use style::{ColorMode, MessageType, Style};
