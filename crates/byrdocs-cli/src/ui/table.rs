//! Table rendering using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `byrdocs status` | `render_summary_table()` |
//! | `byrdocs forks` | `render_forks_table()` |
//! | `byrdocs validate` | `render_field_errors()` |

use byrdocs_core::{CandidateFork, FieldError, ReconcileSummary};
use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, ContentArrangement, Table, Width};

use super::format::truncate_str;

/// Terminal width, or 80 when unknown.
pub fn terminal_width() -> u16 {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0)
        .unwrap_or(80)
}

fn borderless() -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table
}

/// Counts per status.
///
/// ```text
/// TOTAL   CREATED   MODIFIED   DELETED   CONFLICTS
///   412         2          1         0           0
/// ```
pub fn render_summary_table(summary: &ReconcileSummary) -> String {
    let mut table = borderless();
    let right = |s: &str| Cell::new(s).set_alignment(CellAlignment::Right);
    table.set_header(vec![
        right("TOTAL"),
        right("CREATED"),
        right("MODIFIED"),
        right("DELETED"),
        right("CONFLICTS"),
    ]);
    table.add_row(
        [
            summary.total,
            summary.created,
            summary.modified,
            summary.deleted,
            summary.conflicts,
        ]
        .into_iter()
        .map(|n| Cell::new(n).set_alignment(CellAlignment::Right)),
    );
    table.trim_fmt().to_string()
}

/// Forks the user could bind.
///
/// ```text
/// REPOSITORY                 INSTALLATION   URL
/// octocat/byrdocs-archive    77             https://github.com/octocat/byrdocs-archive
/// ```
pub fn render_forks_table(forks: &[CandidateFork]) -> String {
    if forks.is_empty() {
        return String::new();
    }

    let mut table = borderless();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(terminal_width());
    table.set_header(vec![
        Cell::new("REPOSITORY"),
        Cell::new("INSTALLATION"),
        Cell::new("URL"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(20)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(20)),
    ]);

    for fork in forks {
        let installation = fork
            .installation_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(truncate_str(&format!("{}/{}", fork.owner, fork.name), 40)),
            Cell::new(installation),
            Cell::new(&fork.html_url),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Field validation errors.
///
/// ```text
/// FIELD         PROBLEM
/// data.isbn[0]  invalid ISBN
/// ```
pub fn render_field_errors(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let mut table = borderless();
    table.set_header(vec![Cell::new("FIELD"), Cell::new("PROBLEM")]);
    for error in errors {
        table.add_row(vec![Cell::new(&error.field), Cell::new(&error.message)]);
    }
    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_table() {
        let summary = ReconcileSummary {
            total: 412,
            unchanged: 409,
            created: 2,
            modified: 1,
            deleted: 0,
            conflicts: 0,
        };
        let output = render_summary_table(&summary);
        assert!(output.contains("CREATED"));
        assert!(output.contains("412"));
    }

    #[test]
    fn test_forks_table() {
        assert!(render_forks_table(&[]).is_empty());
        let forks = vec![CandidateFork {
            owner: "octocat".to_string(),
            name: "byrdocs-archive".to_string(),
            html_url: "https://github.com/octocat/byrdocs-archive".to_string(),
            installation_id: None,
        }];
        let output = render_forks_table(&forks);
        assert!(output.contains("octocat/byrdocs-archive"));
        assert!(output.contains('-'));
    }

    #[test]
    fn test_field_errors_table() {
        let output = render_field_errors(&[FieldError::new("data.isbn[0]", "invalid ISBN")]);
        assert!(output.contains("data.isbn[0]"));
        assert!(output.contains("invalid ISBN"));
    }
}
