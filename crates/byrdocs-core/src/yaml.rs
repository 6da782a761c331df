//! Canonical YAML codec for metadata files.
//!
//! Serialization is hand-written rather than delegated to `serde_yaml` so the
//! output is byte-stable: reconciliation compares serialized text for
//! equality, and archive diffs stay minimal.
//!
//! Layout rules:
//! - a `yaml-language-server` schema comment, then a blank line
//! - `id`, `url`, `type`, then the `data` block in a fixed key order
//! - every string scalar double-quoted, never wrapped
//! - lists as block sequences; blank entries are dropped and a list left
//!   empty is omitted, except `content`, which is always written
//! - optional scalars are omitted when absent or blank

use std::fmt::Write;

use crate::constants::DEFAULT_SCHEMA_BASE;
use crate::errors::{PublishError, PublishResult};
use crate::record::{BookData, Course, DocData, MetadataRecord, Payload, TestData};

const INDENT: &str = "  ";

/// Serializer/parser bound to one schema base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlCodec {
    schema_base: String,
}

impl Default for YamlCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_BASE)
    }
}

impl YamlCodec {
    pub fn new(schema_base: impl Into<String>) -> Self {
        Self {
            schema_base: schema_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Schema URL referenced by records of `kind`.
    pub fn schema_url(&self, kind: crate::record::RecordKind) -> String {
        format!("{}/{}.yaml", self.schema_base, kind)
    }

    /// Canonical text of `record`.
    pub fn serialize(&self, record: &MetadataRecord) -> String {
        let mut w = Writer::default();
        w.line(0, &format!(
            "# yaml-language-server: $schema={}",
            self.schema_url(record.kind())
        ));
        w.blank();
        w.scalar(0, "id", &record.id);
        w.scalar(0, "url", &record.url);
        w.scalar(0, "type", record.kind().as_str());
        w.key(0, "data");
        match &record.payload {
            Payload::Book(data) => write_book(&mut w, data),
            Payload::Test(data) => write_test(&mut w, data),
            Payload::Doc(data) => write_doc(&mut w, data),
        }
        w.finish()
    }

    /// Parse canonical or hand-written YAML.
    pub fn parse(&self, text: &str) -> PublishResult<MetadataRecord> {
        parse_record(text)
    }

    /// Re-emit `text` in canonical form.
    pub fn canonicalize(&self, text: &str) -> PublishResult<String> {
        Ok(self.serialize(&parse_record(text)?))
    }
}

/// Parse metadata YAML into a record.
pub fn parse_record(text: &str) -> PublishResult<MetadataRecord> {
    serde_yaml::from_str(text).map_err(|e| PublishError::InvalidRecord(e.to_string()))
}

// ============================================================================
// Payload writers
// ============================================================================

fn write_book(w: &mut Writer, data: &BookData) {
    w.scalar(1, "title", &data.title);
    w.list(1, "authors", &data.authors);
    w.list(1, "translators", &data.translators);
    w.opt_scalar(1, "edition", data.edition.as_deref());
    w.opt_scalar(1, "publisher", data.publisher.as_deref());
    w.opt_scalar(1, "publish_year", data.publish_year.as_deref());
    w.list(1, "isbn", &data.isbn);
    w.scalar(1, "filetype", data.filetype.as_str());
}

fn write_test(w: &mut Writer, data: &TestData) {
    w.list(1, "college", &data.college);

    w.key(1, "course");
    if let Some(kind) = data.course.kind {
        w.scalar(2, "type", kind.label());
    }
    w.scalar(2, "name", &data.course.name);

    let time = &data.time;
    w.key(1, "time");
    w.scalar(2, "start", &time.start);
    w.scalar(2, "end", &time.end);
    w.opt_scalar(2, "semester", time.semester.map(|s| s.as_str()));
    w.opt_scalar(2, "stage", time.stage.map(|s| s.label()));

    w.scalar(1, "filetype", data.filetype.as_str());
    let content: Vec<&str> = data.content.iter().map(|c| c.label()).collect();
    w.required_list(1, "content", &content);
}

fn write_doc(w: &mut Writer, data: &DocData) {
    w.scalar(1, "title", &data.title);
    w.scalar(1, "filetype", data.filetype.as_str());
    write_courses(w, 1, &data.course);
    let content: Vec<&str> = data.content.iter().map(|c| c.label()).collect();
    w.required_list(1, "content", &content);
}

fn write_courses(w: &mut Writer, depth: usize, courses: &[Course]) {
    let courses: Vec<&Course> = courses
        .iter()
        .filter(|c| c.kind.is_some() || !c.name.trim().is_empty())
        .collect();
    if courses.is_empty() {
        return;
    }
    w.key(depth, "course");
    for course in courses {
        // The first key of a sequence item shares the line with the dash.
        match course.kind {
            Some(kind) => {
                w.line(depth + 1, &format!("- type: {}", quote(kind.label())));
                w.scalar(depth + 2, "name", &course.name);
            }
            None => w.line(depth + 1, &format!("- name: {}", quote(&course.name))),
        }
    }
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Default)]
struct Writer {
    out: String,
}

impl Writer {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn key(&mut self, depth: usize, key: &str) {
        self.line(depth, &format!("{}:", key));
    }

    fn scalar(&mut self, depth: usize, key: &str, value: &str) {
        self.line(depth, &format!("{}: {}", key, quote(value)));
    }

    fn opt_scalar(&mut self, depth: usize, key: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.scalar(depth, key, value);
        }
    }

    /// Non-blank entries; nothing at all if none remain.
    fn list<S: AsRef<str>>(&mut self, depth: usize, key: &str, items: &[S]) {
        let items: Vec<&str> = items
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.trim().is_empty())
            .collect();
        if !items.is_empty() {
            self.required_list(depth, key, &items);
        }
    }

    fn required_list(&mut self, depth: usize, key: &str, items: &[&str]) {
        if items.is_empty() {
            self.line(depth, &format!("{}: []", key));
            return;
        }
        self.key(depth, key);
        for item in items {
            self.line(depth + 1, &format!("- {}", quote(item)));
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Double-quoted scalar using escapes that JSON and YAML share.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if needs_escape(c) => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Characters a YAML reader rejects, or folds as a line break, when they
/// appear raw inside a quoted scalar.
fn needs_escape(c: char) -> bool {
    matches!(
        c as u32,
        0x00..=0x1f | 0x7f..=0x9f | 0x2028 | 0x2029 | 0xfeff | 0xfffe | 0xffff
    )
}
