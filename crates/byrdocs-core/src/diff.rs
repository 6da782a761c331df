//! Line diff for reviewing staged changes.
//!
//! A longest-common-subsequence table over lines, quadratic in the line
//! count. Each [`DiffLine`] carries independent old/new line numbers for
//! side-by-side rendering.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub content: String,
    /// Set for removed and unchanged lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line_number: Option<usize>,
    /// Set for added and unchanged lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line_number: Option<usize>,
}

/// Split on `\n`, dropping the empty element after a trailing newline.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Diff `old` against `new` line by line.
///
/// Within a changed hunk removals are emitted before additions.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let a = split_lines(old);
    let b = split_lines(new);
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    let (mut old_no, mut new_no) = (0, 0);

    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            old_no += 1;
            new_no += 1;
            out.push(DiffLine {
                kind: DiffKind::Unchanged,
                content: a[i].to_string(),
                old_line_number: Some(old_no),
                new_line_number: Some(new_no),
            });
            i += 1;
            j += 1;
        } else if i < n && (j == m || lcs[i + 1][j] >= lcs[i][j + 1]) {
            old_no += 1;
            out.push(DiffLine {
                kind: DiffKind::Removed,
                content: a[i].to_string(),
                old_line_number: Some(old_no),
                new_line_number: None,
            });
            i += 1;
        } else {
            new_no += 1;
            out.push(DiffLine {
                kind: DiffKind::Added,
                content: b[j].to_string(),
                old_line_number: None,
                new_line_number: Some(new_no),
            });
            j += 1;
        }
    }

    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

pub fn summarize(lines: &[DiffLine]) -> DiffStats {
    lines.iter().fold(DiffStats::default(), |mut stats, line| {
        match line.kind {
            DiffKind::Added => stats.added += 1,
            DiffKind::Removed => stats.removed += 1,
            DiffKind::Unchanged => {}
        }
        stats
    })
}

/// Plain-text rendering with old/new line-number gutters.
///
/// ```text
///  1  1   id: "..."
///  2    - title: "Old"
///     2 + title: "New"
/// ```
pub fn render_unified(lines: &[DiffLine]) -> String {
    let widest = lines
        .iter()
        .flat_map(|l| [l.old_line_number, l.new_line_number])
        .flatten()
        .max()
        .unwrap_or(0);
    let width = widest.to_string().len();

    let gutter = |n: Option<usize>| match n {
        Some(n) => format!("{:>width$}", n, width = width),
        None => " ".repeat(width),
    };

    let mut out = String::new();
    for line in lines {
        let sigil = match line.kind {
            DiffKind::Added => '+',
            DiffKind::Removed => '-',
            DiffKind::Unchanged => ' ',
        };
        out.push_str(&format!(
            "{} {} {} {}\n",
            gutter(line.old_line_number),
            gutter(line.new_line_number),
            sigil,
            line.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(lines: &[DiffLine]) -> Vec<DiffKind> {
        lines.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn test_trailing_newline_adds_no_phantom_line() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
    }

    #[test]
    fn test_modified_line_numbering() {
        let lines = diff_lines("id\ntitle: old\nyear\n", "id\ntitle: new\nyear\nextra\n");
        use DiffKind::*;
        assert_eq!(
            kinds(&lines),
            vec![Unchanged, Removed, Added, Unchanged, Added]
        );
        let numbers: Vec<(Option<usize>, Option<usize>)> = lines
            .iter()
            .map(|l| (l.old_line_number, l.new_line_number))
            .collect();
        assert_eq!(
            numbers,
            vec![
                (Some(1), Some(1)),
                (Some(2), None),
                (None, Some(2)),
                (Some(3), Some(3)),
                (None, Some(4)),
            ]
        );
        assert_eq!(summarize(&lines), DiffStats { added: 2, removed: 1 });
    }

    #[test]
    fn test_created_and_deleted_files() {
        let created = diff_lines("", "a\nb\n");
        assert!(created.iter().all(|l| l.kind == DiffKind::Added && l.old_line_number.is_none()));

        let deleted = diff_lines("a\nb\n", "");
        assert!(deleted.iter().all(|l| l.kind == DiffKind::Removed && l.new_line_number.is_none()));
        assert_eq!(deleted.len(), 2);
    }

    #[test]
    fn test_identical_text_is_all_unchanged_and_repeatable() {
        let text = "x\ny\nz\n";
        let first = diff_lines(text, text);
        assert!(summarize(&first).is_empty());
        assert_eq!(first, diff_lines(text, text));
    }

    #[test]
    fn test_numbering_is_monotonic() {
        let lines = diff_lines("a\nb\nc\nd\ne\n", "b\nx\nd\ne\ny\n");
        let olds: Vec<usize> = lines.iter().filter_map(|l| l.old_line_number).collect();
        let news: Vec<usize> = lines.iter().filter_map(|l| l.new_line_number).collect();
        assert_eq!(olds, (1..=5).collect::<Vec<_>>());
        assert_eq!(news, (1..=5).collect::<Vec<_>>());
        for line in &lines {
            if line.kind == DiffKind::Unchanged {
                assert!(line.old_line_number.is_some() && line.new_line_number.is_some());
            }
        }
    }

    #[test]
    fn test_render_unified_gutters() {
        let text = render_unified(&diff_lines("a\nb\n", "a\nc\n"));
        assert_eq!(text, "1 1   a\n2   - b\n  2 + c\n");
    }
}
