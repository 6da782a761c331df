//! CLI definition and command dispatch for `byrdocs`.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--verbose`, `--color`)
//! 2. Environment variables (`BYRDOCS_CONFIG`, `BYRDOCS_VERBOSE`, `BYRDOCS_COLOR`)
//! 3. Config file (`~/.byrdocs/config.yaml` or the path from `--config`)
//! 4. Built-in defaults

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{ArgGroup, Parser, Subcommand};
use serde_json::json;

use crate::ui::{format, table, ColorMode, MessageType, Progress, ProgressMode, StepProgress, Style};

use byrdocs_core::isbn::{format_isbn, to_isbn13, validate_isbn};
use byrdocs_core::upload::hash_file;
use byrdocs_core::{
    ArchiveEngine, CancelFlag, FileStatus, PublishError, StagedDeletion, UserId, WebhookOutcome,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// BYR Docs Publish – edit archive metadata and open pull requests
#[derive(Parser, Debug)]
#[command(name = "byrdocs")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "BYRDOCS_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.byrdocs/config.yaml)
    #[arg(long, global = true, env = "BYRDOCS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto
    #[arg(
        long,
        global = true,
        env = "BYRDOCS_COLOR",
        default_value = "auto",
        value_parser = ColorMode::from_str
    )]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with a GitHub OAuth token or authorization code
    #[command(group(ArgGroup::new("credential").required(true).args(["token", "code"])))]
    #[command(after_help = r#"EXAMPLES:
    # Sign in with a token
    byrdocs login --token gho_xxx

    # Or from the environment
    BYRDOCS_GITHUB_TOKEN=gho_xxx byrdocs login

    # Exchange an OAuth code (needs oauth.client_id/client_secret in config)
    byrdocs login --code 0123abcd
"#)]
    Login {
        /// GitHub access token
        #[arg(long, env = "BYRDOCS_GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// OAuth authorization code
        #[arg(long)]
        code: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Show staged changes against the published feed
    #[command(after_help = r#"EXAMPLES:
    byrdocs status
    byrdocs status --json | jq '.summary'
"#)]
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Refetch the metadata feed first
        #[arg(long)]
        refresh: bool,
    },

    /// Print the current YAML of one record
    Show {
        /// Record id (32-character md5)
        id: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Line diff of one record against upstream
    Diff {
        /// Record id (32-character md5)
        id: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check metadata YAML files without staging them
    #[command(after_help = r#"EXAMPLES:
    byrdocs validate 0123456789abcdef0123456789abcdef.yml
    byrdocs validate metadata/*.yml --json
"#)]
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Stage metadata YAML files as creations or edits
    Stage {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Stage removal of records by id
    #[command(name = "rm")]
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Drop staged changes by id
    Revert {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Open a pull request with every staged change
    #[command(after_help = r#"STEPS:
    1. Check binding    2. Sync upstream    3. Create branch
    4. Commit files     5. Create pull request

A failed step stops the sequence. Staged changes are kept until the pull
request is open.
"#)]
    Publish {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List forks of the archive and the current binding
    Forks {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Publish through the fork of an app installation
    Bind {
        installation_id: u64,
    },

    /// Remove the current binding
    Unbind,

    /// Apply a GitHub webhook delivery from a file
    #[command(after_help = r#"EXAMPLES:
    byrdocs webhook --event installation payload.json --signature sha256=...
"#)]
    Webhook {
        /// Value of the X-GitHub-Event header
        #[arg(long)]
        event: String,

        /// Raw request body
        payload: PathBuf,

        /// Value of the X-Hub-Signature-256 header
        #[arg(long)]
        signature: Option<String>,
    },

    /// Validate and format ISBNs
    Isbn {
        #[arg(required = true)]
        isbns: Vec<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compute the upload key of a pdf or zip file
    Hash {
        file: PathBuf,

        /// Also check the key is free on the file host
        #[arg(long)]
        check: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Returns `ExitCode::SUCCESS` on success, or `ExitCode::FAILURE` on error.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always, debug only with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "byrdocs_core={0},byrdocs_db={0},byrdocs_remote={0},byrdocs_cli={0}",
        log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let style = Style::new(cli.color);

    // Offline commands need no engine.
    let command = match cli.command {
        Command::Isbn { isbns, json } => return finish(&style, handle_isbn(&style, &isbns, json)),
        Command::Hash {
            file,
            check: false,
            json,
        } => return finish(&style, handle_hash(&style, &file, json)),
        other => other,
    };

    tracing::debug!("Config override: {:?}", cli.config);
    let engine = match &cli.config {
        Some(path) => ArchiveEngine::with_config(path),
        None => ArchiveEngine::with_defaults(),
    };
    let engine = match engine {
        Ok(engine) => engine,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your config at ~/.byrdocs/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context("Failed to initialize", Some(&e.to_string()), Some(&hint))
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Command::Login { token, code } => handle_login(&style, &engine, token, code),
        Command::Logout => handle_logout(&style, &engine),
        Command::Status { json, refresh } => handle_status(&style, &engine, json, refresh),
        Command::Show { id, json } => handle_show(&engine, &id, json),
        Command::Diff { id, json } => handle_diff(&style, &engine, &id, json),
        Command::Validate { files, json } => handle_validate(&style, &engine, &files, json),
        Command::Stage { files } => handle_stage(&style, &engine, &files),
        Command::Rm { ids } => handle_rm(&style, &engine, &ids),
        Command::Revert { ids } => handle_revert(&style, &engine, &ids),
        Command::Publish { json } => handle_publish(&style, &engine, json),
        Command::Forks { json } => handle_forks(&style, &engine, json),
        Command::Bind { installation_id } => handle_bind(&style, &engine, installation_id),
        Command::Unbind => handle_unbind(&style, &engine),
        Command::Webhook {
            event,
            payload,
            signature,
        } => handle_webhook(&style, &engine, &event, &payload, signature.as_deref()),
        Command::Hash { file, json, .. } => handle_hash_check(&style, &engine, &file, json),
        Command::Isbn { isbns, json } => handle_isbn(&style, &isbns, json),
    };

    finish(&style, result)
}

fn finish(style: &Style, result: Result<(), PublishError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style.message(MessageType::Err, &e.to_string()));
            ExitCode::FAILURE
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), PublishError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Session
// ============================================================================

fn handle_login(
    style: &Style,
    engine: &ArchiveEngine,
    token: Option<String>,
    code: Option<String>,
) -> Result<(), PublishError> {
    let session = match (token, code) {
        (_, Some(code)) => engine.login_with_code(&code)?,
        (Some(token), None) => engine.login_with_token(&token)?,
        (None, None) => return Err(PublishError::NotSignedIn),
    };
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("Signed in as {} ({})", session.username, session.github_user_id)
        )
    );
    if engine.current_binding(session.github_user_id)?.is_none() {
        println!(
            "{}",
            style.message(MessageType::Hint, "Run `byrdocs forks` to choose a fork to publish through")
        );
    }
    Ok(())
}

fn handle_logout(style: &Style, engine: &ArchiveEngine) -> Result<(), PublishError> {
    if engine.logout()? {
        println!("{}", style.message(MessageType::Ok, "Signed out"));
    } else {
        println!("{}", style.message(MessageType::Skip, "Not signed in"));
    }
    Ok(())
}

// ============================================================================
// Inspecting
// ============================================================================

fn handle_status(
    style: &Style,
    engine: &ArchiveEngine,
    json: bool,
    refresh: bool,
) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    if refresh {
        engine.refresh_feed();
    }
    let report = engine.status(user)?;

    if json {
        let pending: Vec<_> = report.pending().collect();
        return print_json(&json!({
            "user": report.user,
            "summary": report.summary,
            "files": pending,
        }));
    }

    println!("{}", style.section("STATUS"));
    println!();
    println!("  {}", style.key_value("User", &user.to_string()));
    match engine.current_binding(user)? {
        Some(bound) => {
            let name = bound.name.as_deref().unwrap_or("(no repository selected)");
            let mut repo = format!("{}/{} (installation {})", bound.owner, name, bound.installation_id);
            if bound.is_suspended {
                repo.push_str(" [suspended]");
            }
            println!("  {}", style.key_value("Fork", &repo));
        }
        None => println!("  {}", style.key_value("Fork", "(not bound)")),
    }
    println!();
    println!("{}", table::render_summary_table(&report.summary));

    if report.summary.pending() == 0 {
        println!();
        println!("nothing to publish, no staged changes");
        return Ok(());
    }

    println!();
    println!("Changes to be published:");
    println!("  (use \"byrdocs revert <id>...\" to drop a change)");
    println!();
    for file in report.pending() {
        println!("{}", style.file_status(file.status, &file.filename, file.has_conflict));
    }
    if report.summary.conflicts > 0 {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Warn,
                &format!(
                    "{} in conflict with upstream; review with `byrdocs diff <id>`",
                    format::plural(report.summary.conflicts, "file")
                )
            )
        );
    }
    Ok(())
}

fn handle_show(engine: &ArchiveEngine, id: &str, json: bool) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    let file = engine.show(user, id)?;
    if json {
        return print_json(&file);
    }
    match file.status {
        FileStatus::Deleted => print!("{}", file.previous_content.unwrap_or_default()),
        _ => print!("{}", file.content),
    }
    Ok(())
}

fn handle_diff(style: &Style, engine: &ArchiveEngine, id: &str, json: bool) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    let lines = engine.file_diff(user, id)?;
    if json {
        return print_json(&lines);
    }
    let stats = byrdocs_core::summarize(&lines);
    if stats.is_empty() {
        println!("{}", style.message(MessageType::Info, &format!("{} is unchanged", id)));
        return Ok(());
    }
    for line in &lines {
        println!("{}", style.diff_line(line));
    }
    println!();
    println!(
        "{}",
        style.message_detail("Lines", &format!("+{} -{}", stats.added, stats.removed))
    );
    Ok(())
}

// ============================================================================
// Staging
// ============================================================================

fn handle_validate(
    style: &Style,
    engine: &ArchiveEngine,
    files: &[PathBuf],
    json: bool,
) -> Result<(), PublishError> {
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(path)?;
        results.push((path, engine.validate_text(&text)));
    }
    let invalid = results.iter().filter(|(_, o)| !o.is_valid()).count();

    if json {
        let report: Vec<_> = results
            .iter()
            .map(|(path, outcome)| {
                json!({
                    "path": path.display().to_string(),
                    "valid": outcome.is_valid(),
                    "errors": outcome.errors,
                })
            })
            .collect();
        print_json(&report)?;
    } else {
        for (path, outcome) in &results {
            let name = path.display().to_string();
            if outcome.is_valid() {
                println!("{}", style.message(MessageType::Ok, &name));
            } else {
                println!("{}", style.message(MessageType::Err, &name));
                println!("{}", table::render_field_errors(&outcome.errors));
            }
        }
    }

    if invalid > 0 {
        return Err(PublishError::InvalidRecord(format!(
            "{} of {} failed validation",
            format::plural(invalid, "file"),
            files.len()
        )));
    }
    Ok(())
}

fn handle_stage(style: &Style, engine: &ArchiveEngine, files: &[PathBuf]) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    for path in files {
        let change = engine.stage_file(user, path)?;
        println!(
            "{}",
            style.message(
                MessageType::Ok,
                &format!("Staged {} ({})", change.filename, change.status)
            )
        );
    }
    Ok(())
}

fn handle_rm(style: &Style, engine: &ArchiveEngine, ids: &[String]) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    for id in ids {
        match engine.stage_deletion(user, id)? {
            StagedDeletion::Staged { change } => println!(
                "{}",
                style.message(MessageType::Ok, &format!("Staged removal of {}", change.filename))
            ),
            StagedDeletion::Discarded { id } => println!(
                "{}",
                style.message(
                    MessageType::Info,
                    &format!("Discarded local change to {}; nothing upstream to remove", id)
                )
            ),
        }
    }
    Ok(())
}

fn handle_revert(style: &Style, engine: &ArchiveEngine, ids: &[String]) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    for id in ids {
        engine.revert(user, id)?;
        println!("{}", style.message(MessageType::Ok, &format!("Reverted {}", id)));
    }
    Ok(())
}

// ============================================================================
// Publishing
// ============================================================================

fn handle_publish(style: &Style, engine: &ArchiveEngine, json: bool) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    let mut progress = StepProgress::new(ProgressMode::detect(json), style.clone());
    let outcome = engine.publish(user, &mut progress)?;

    if json {
        return print_json(&outcome);
    }
    println!();
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("Opened pull request #{}", outcome.pull_request_number)
        )
    );
    println!("{}", style.message_detail("URL", &style.link(&outcome.pull_request_url)));
    println!("{}", style.message_detail("Branch", &outcome.branch));
    println!(
        "{}",
        style.message_detail("Files", &format::plural(outcome.files.len(), "file"))
    );
    Ok(())
}

fn handle_forks(style: &Style, engine: &ArchiveEngine, json: bool) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    let spinner = Progress::spinner("Checking forks", ProgressMode::detect(json));
    let overview = engine.binding_overview(user);
    spinner.finish_clear();
    let overview = overview?;

    if json {
        return print_json(&overview);
    }

    match &overview.current {
        Some(bound) => println!(
            "  {}",
            style.key_value(
                "Bound",
                &format!(
                    "{}/{} (installation {}, since {})",
                    bound.owner,
                    bound.name.as_deref().unwrap_or("?"),
                    bound.installation_id,
                    format::format_relative_time(bound.created_at, engine.clock().now())
                )
            )
        ),
        None => println!("  {}", style.key_value("Bound", "(none)")),
    }
    println!();

    if overview.candidates.is_empty() {
        println!(
            "{}",
            style.message(
                MessageType::Hint,
                &format!(
                    "No forks of {} found. Fork it on GitHub first.",
                    engine.config().upstream.repo_ref()
                )
            )
        );
        return Ok(());
    }
    println!("{}", table::render_forks_table(&overview.candidates));
    if overview.candidates.iter().any(|c| c.installation_id.is_none()) {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Hint,
                "Install the GitHub app on a fork, then run `byrdocs bind <installation>`"
            )
        );
    }
    Ok(())
}

fn handle_bind(style: &Style, engine: &ArchiveEngine, installation_id: u64) -> Result<(), PublishError> {
    let user = engine.current_user()?;
    let bound = engine.bind(user, installation_id)?;
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!(
                "Bound to {}/{}",
                bound.owner,
                bound.name.as_deref().unwrap_or("?")
            )
        )
    );
    Ok(())
}

fn handle_unbind(style: &Style, engine: &ArchiveEngine) -> Result<(), PublishError> {
    let user: UserId = engine.current_user()?;
    if engine.unbind(user)? {
        println!("{}", style.message(MessageType::Ok, "Unbound"));
    } else {
        println!("{}", style.message(MessageType::Skip, "No repository was bound"));
    }
    Ok(())
}

fn handle_webhook(
    style: &Style,
    engine: &ArchiveEngine,
    event: &str,
    payload: &std::path::Path,
    signature: Option<&str>,
) -> Result<(), PublishError> {
    let body = std::fs::read(payload)?;
    match engine.handle_webhook(event, &body, signature)? {
        WebhookOutcome::Applied {
            event,
            action,
            installation_id,
        } => println!(
            "{}",
            style.message(
                MessageType::Ok,
                &format!("Applied {}.{} for installation {}", event, action, installation_id)
            )
        ),
        WebhookOutcome::Ignored { event, action } => println!(
            "{}",
            style.message(
                MessageType::Skip,
                &format!("Ignored {}.{}", event, action.as_deref().unwrap_or("-"))
            )
        ),
    }
    Ok(())
}

// ============================================================================
// Offline tools
// ============================================================================

fn handle_isbn(style: &Style, isbns: &[String], json: bool) -> Result<(), PublishError> {
    let checked: Vec<_> = isbns
        .iter()
        .map(|isbn| (isbn, validate_isbn(isbn), to_isbn13(isbn), format_isbn(isbn)))
        .collect();

    if json {
        let report: Vec<_> = checked
            .iter()
            .map(|(input, valid, isbn13, formatted)| {
                json!({
                    "input": input,
                    "valid": valid,
                    "isbn13": isbn13,
                    "formatted": formatted,
                })
            })
            .collect();
        print_json(&report)?;
    } else {
        for (input, valid, _, formatted) in &checked {
            match (valid, formatted) {
                (true, Some(formatted)) => println!(
                    "{}",
                    style.message(MessageType::Ok, &format!("{} -> {}", input, formatted))
                ),
                _ => println!(
                    "{}",
                    style.message(MessageType::Err, &format!("{} is not a valid ISBN", input))
                ),
            }
        }
    }

    let invalid = checked.iter().filter(|(_, valid, _, _)| !valid).count();
    if invalid > 0 {
        return Err(PublishError::InvalidRecord(format!(
            "{} invalid",
            format::plural(invalid, "ISBN")
        )));
    }
    Ok(())
}

fn handle_hash(style: &Style, file: &std::path::Path, json: bool) -> Result<(), PublishError> {
    let cancel = CancelFlag::new();
    let spinner = Progress::spinner("Hashing", ProgressMode::detect(json));
    let md5 = hash_file(file, &cancel);
    spinner.finish_clear();
    let md5 = md5?;
    let size = std::fs::metadata(file)?.len();

    if json {
        return print_json(&json!({ "md5": md5, "size": size }));
    }
    println!("{}", style.message(MessageType::Ok, &md5));
    println!("{}", style.message_detail("Size", &format::format_bytes(size)));
    Ok(())
}

fn handle_hash_check(
    style: &Style,
    engine: &ArchiveEngine,
    file: &std::path::Path,
    json: bool,
) -> Result<(), PublishError> {
    let cancel = CancelFlag::new();
    let spinner = Progress::spinner("Hashing", ProgressMode::detect(json));
    let plan = engine.plan_upload(file, &cancel);
    spinner.finish_clear();
    let plan = plan?;

    if json {
        return print_json(&plan);
    }
    println!("{}", style.message(MessageType::Ok, &format!("{} is free", plan.key)));
    println!("{}", style.message_detail("URL", &style.link(&plan.url)));
    println!("{}", style.message_detail("Size", &format::format_bytes(plan.size)));
    Ok(())
}
