//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |
//! | `[skip]` | Skipped | Dim |

use std::io::IsTerminal;
use std::str::FromStr;

use byrdocs_core::{DiffKind, DiffLine, FileStatus};
use owo_colors::OwoColorize;

// ============================================================================
// ColorMode
// ============================================================================

/// Color output mode, from `--color` / `BYRDOCS_COLOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    Always,
    Never,
    /// Color when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "auto" => Ok(Self::Auto),
            other => Err(format!("invalid color mode '{}'", other)),
        }
    }
}

impl ColorMode {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            // https://no-color.org/
            Self::Auto => std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal(),
        }
    }
}

// ============================================================================
// MessageType
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    Hint,
    Skip,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
            Self::Skip => "[skip]",
        }
    }
}

// ============================================================================
// Style
// ============================================================================

/// Main styling interface for CLI output.
///
/// ```
/// use byrdocs_cli::ui::{ColorMode, MessageType, Style};
///
/// let style = Style::new(ColorMode::Never);
/// assert_eq!(style.message(MessageType::Ok, "Staged"), "[ok] Staged");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Style {
    color_mode: ColorMode,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// `[ok] text`, with the prefix colored by type.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if !self.colors_enabled() {
            return format!("{} {}", prefix, text);
        }
        let colored_prefix = match msg_type {
            MessageType::Ok => prefix.green().to_string(),
            MessageType::Err => prefix.red().to_string(),
            MessageType::Warn => prefix.yellow().to_string(),
            MessageType::Info => prefix.blue().to_string(),
            MessageType::Hint => prefix.cyan().to_string(),
            MessageType::Skip => prefix.dimmed().to_string(),
        };
        format!("{} {}", colored_prefix, text)
    }

    /// Detail line under a message, indented to align past the prefix.
    pub fn message_detail(&self, label: &str, value: &str) -> String {
        format!("     {}: {}", label, value)
    }

    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Error message followed by optional `Cause:` and `Hint:` lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        if let Some(cause) = cause {
            output.push_str(&format!("\n      Cause: {}", cause));
        }
        if let Some(hint) = hint {
            output.push_str(&format!("\n      Hint: {}", hint));
        }
        output
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.colors_enabled() {
            format!("{}: {}", key.dimmed(), value)
        } else {
            format!("{}: {}", key, value)
        }
    }

    pub fn link(&self, url: &str) -> String {
        if self.colors_enabled() {
            url.cyan().underline().to_string()
        } else {
            url.to_string()
        }
    }

    /// Git-style status line, e.g. `        created:    <id>.yml`.
    pub fn file_status(&self, status: FileStatus, filename: &str, conflict: bool) -> String {
        let label = format!("{}:", status);
        let suffix = if conflict { " (conflict)" } else { "" };
        if !self.colors_enabled() {
            return format!("        {:<11} {}{}", label, filename, suffix);
        }
        let label = format!("{:<11}", label);
        let (label, name) = match status {
            FileStatus::Created => (label.green().to_string(), filename.green().to_string()),
            FileStatus::Modified => (label.yellow().to_string(), filename.yellow().to_string()),
            FileStatus::Deleted => (label.red().to_string(), filename.red().to_string()),
            FileStatus::Unchanged => (label.dimmed().to_string(), filename.to_string()),
        };
        format!("        {} {}{}", label, name, suffix.red())
    }

    /// One diff line with `+`/`-` markers.
    pub fn diff_line(&self, line: &DiffLine) -> String {
        let (sigil, text) = match line.kind {
            DiffKind::Added => ('+', &line.content),
            DiffKind::Removed => ('-', &line.content),
            DiffKind::Unchanged => (' ', &line.content),
        };
        let rendered = format!("{} {}", sigil, text);
        if !self.colors_enabled() {
            return rendered;
        }
        match line.kind {
            DiffKind::Added => rendered.green().to_string(),
            DiffKind::Removed => rendered.red().to_string(),
            DiffKind::Unchanged => rendered.dimmed().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_mode_from_str() {
        assert_eq!("always".parse::<ColorMode>(), Ok(ColorMode::Always));
        assert_eq!("NEVER".parse::<ColorMode>(), Ok(ColorMode::Never));
        assert_eq!("auto".parse::<ColorMode>(), Ok(ColorMode::Auto));
        assert!("rainbow".parse::<ColorMode>().is_err());
        assert!(ColorMode::Always.is_enabled());
        assert!(!ColorMode::Never.is_enabled());
    }

    #[test]
    fn test_message_no_color() {
        let style = Style::new(ColorMode::Never);
        assert_eq!(style.message(MessageType::Ok, "Success"), "[ok] Success");
        assert_eq!(style.message(MessageType::Hint, "Try again"), "[hint] Try again");
        assert_eq!(style.message_detail("Branch", "octo-1"), "     Branch: octo-1");
    }

    #[test]
    fn test_error_with_context() {
        let style = Style::new(ColorMode::Never);
        let output = style.error_with_context("Publish failed", Some("HTTP 422"), Some("Retry"));
        assert_eq!(output, "[err] Publish failed\n      Cause: HTTP 422\n      Hint: Retry");
    }

    #[test]
    fn test_file_status() {
        let style = Style::new(ColorMode::Never);
        assert_eq!(
            style.file_status(FileStatus::Created, "a.yml", false),
            "        created:    a.yml"
        );
        assert_eq!(
            style.file_status(FileStatus::Deleted, "b.yml", true),
            "        deleted:    b.yml (conflict)"
        );
    }

    #[test]
    fn test_diff_line() {
        let style = Style::new(ColorMode::Never);
        let line = DiffLine {
            kind: DiffKind::Removed,
            content: "title: \"Old\"".to_string(),
            old_line_number: Some(3),
            new_line_number: None,
        };
        assert_eq!(style.diff_line(&line), "- title: \"Old\"");
    }
}
