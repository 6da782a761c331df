//! Commit and pull request text for a batch of staged changes.
//!
//! Titles follow the archive's conventions:
//! - one file: `创建了<name>`, `修改了<name>` or `删除了<name>`
//! - several files: counts joined by `，`, e.g. `创建了 2 个文件，修改了 1 个文件`
//!
//! The body lists every file under its operation and ends with a fixed
//! attribution line.

use byrdocs_db::{ChangeStatus, FileChange};

use crate::constants::COMMIT_ATTRIBUTION;
use crate::yaml::parse_record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub title: String,
    pub body: String,
}

impl CommitMessage {
    /// Title, blank line, body.
    pub fn full(&self) -> String {
        format!("{}\n\n{}", self.title, self.body)
    }
}

fn verb(status: ChangeStatus) -> &'static str {
    match status {
        ChangeStatus::Created => "创建了",
        ChangeStatus::Modified => "修改了",
        ChangeStatus::Deleted => "删除了",
    }
}

fn heading(status: ChangeStatus) -> &'static str {
    match status {
        ChangeStatus::Created => "新增文件：",
        ChangeStatus::Modified => "修改文件：",
        ChangeStatus::Deleted => "删除文件：",
    }
}

const ORDER: [ChangeStatus; 3] = [
    ChangeStatus::Created,
    ChangeStatus::Modified,
    ChangeStatus::Deleted,
];

/// Human name of the file a change touches.
///
/// Parsed from the proposed content, or from the previous content for a
/// deletion. Falls back to the filename when neither parses.
pub fn display_name(change: &FileChange) -> String {
    let text = match change.status {
        ChangeStatus::Deleted => change.previous_content.as_deref().unwrap_or(""),
        _ => change.content.as_str(),
    };
    parse_record(text)
        .ok()
        .map(|record| record.display_name())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| change.filename.clone())
}

pub fn generate(changes: &[FileChange]) -> CommitMessage {
    let title = match changes {
        [single] => format!("{}{}", verb(single.status), display_name(single)),
        _ => ORDER
            .iter()
            .filter_map(|status| {
                let count = changes.iter().filter(|c| c.status == *status).count();
                (count > 0).then(|| format!("{} {} 个文件", verb(*status), count))
            })
            .collect::<Vec<_>>()
            .join("，"),
    };

    let mut sections = Vec::new();
    for status in ORDER {
        let lines: Vec<String> = changes
            .iter()
            .filter(|c| c.status == status)
            .map(|c| format!("- {} ({})", display_name(c), c.filename))
            .collect();
        if !lines.is_empty() {
            sections.push(format!("{}\n{}", heading(status), lines.join("\n")));
        }
    }
    sections.push(COMMIT_ATTRIBUTION.to_string());

    CommitMessage {
        title,
        body: sections.join("\n\n"),
    }
}
