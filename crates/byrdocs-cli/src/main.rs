//! # byrdocs CLI
//!
//! Command-line interface for BYR Docs Publish.
//!
//! This binary provides human-friendly access to `byrdocs-core`.
//! Run `byrdocs --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
