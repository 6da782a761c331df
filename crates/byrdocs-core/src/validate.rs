//! Field validators.
//!
//! Every function here is pure: the current date comes from an injected
//! [`Clock`]. Problems are returned as values ([`FieldError`], [`UrlError`],
//! [`YearRangeError`]) so callers can render them inline.

use std::fmt;
use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::clock::Clock;
use crate::constants::{ACADEMIC_YEAR_ROLLOVER_MONTH, FILE_URL_PREFIX, MIN_RANGE_YEAR};
use crate::isbn::validate_isbn;
use crate::record::{BookData, DocData, MetadataRecord, Payload, RecordKind, TestData};

// ============================================================================
// FieldError
// ============================================================================

/// A problem with one field, addressed by its path in the record
/// (`data.isbn[1]`, `data.time`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ============================================================================
// Years
// ============================================================================

/// Calendar year, rolled forward from August on.
pub fn current_academic_year(clock: &dyn Clock) -> i32 {
    let now = clock.now();
    if now.month() >= ACADEMIC_YEAR_ROLLOVER_MONTH {
        now.year() + 1
    } else {
        now.year()
    }
}

fn parse_year(s: &str) -> Option<i32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Single-year field: a positive integer not after the current calendar year.
///
/// Unlike [`validate_year_range`] this does not roll over in August.
pub fn validate_year(s: &str, clock: &dyn Clock) -> bool {
    parse_year(s.trim())
        .map(|year| year > 0 && year <= clock.now().year())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YearRangeError {
    #[error("Start year is required")]
    MissingStart,

    #[error("End year is required")]
    MissingEnd,

    #[error("{field} year must be an integer")]
    NotInteger { field: &'static str },

    #[error("{field} year must be between {min} and {max}")]
    OutOfBounds {
        field: &'static str,
        min: i32,
        max: i32,
    },

    #[error("End year must equal the start year or the year after it")]
    BadRelation,
}

/// Academic year range of an exam.
///
/// Both years are required integers in `[2000, current academic year]` and
/// `end` is `start` or `start + 1`.
pub fn validate_year_range(
    start: &str,
    end: &str,
    clock: &dyn Clock,
) -> Result<(i32, i32), YearRangeError> {
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() {
        return Err(YearRangeError::MissingStart);
    }
    if end.is_empty() {
        return Err(YearRangeError::MissingEnd);
    }

    let start_year = parse_year(start).ok_or(YearRangeError::NotInteger { field: "Start" })?;
    let end_year = parse_year(end).ok_or(YearRangeError::NotInteger { field: "End" })?;

    let max = current_academic_year(clock);
    for (field, year) in [("Start", start_year), ("End", end_year)] {
        if !(MIN_RANGE_YEAR..=max).contains(&year) {
            return Err(YearRangeError::OutOfBounds {
                field,
                min: MIN_RANGE_YEAR,
                max,
            });
        }
    }

    if end_year != start_year && end_year != start_year + 1 {
        return Err(YearRangeError::BadRelation);
    }
    Ok((start_year, end_year))
}

// ============================================================================
// URL
// ============================================================================

/// Components of a valid record URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub md5: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL must have the form {prefix}<md5>.<extension>", prefix = FILE_URL_PREFIX)]
    Malformed,

    #[error("URL does not contain a valid 32-character MD5")]
    InvalidMd5,

    #[error("URL is missing a file extension")]
    MissingExtension,

    #[error("Extension `{extension}` is not allowed for {kind} records")]
    ExtensionNotAllowed {
        extension: String,
        kind: RecordKind,
    },
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://byrdocs\.org/files/([^/.]*)(?:\.([^/]*))?$").expect("Invalid regex")
    })
}

fn md5_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{32}$").expect("Invalid regex"))
}

/// Whether `s` is a lowercase 32-hex md5.
pub fn is_md5(s: &str) -> bool {
    md5_regex().is_match(s)
}

/// Check `url` against `https://byrdocs.org/files/<md5>.<ext>` for `kind`.
///
/// The URL must already be clean: a query string or fragment makes it
/// malformed.
pub fn validate_url(url: &str, kind: RecordKind) -> Result<UrlParts, UrlError> {
    let cleaned = url.split(['?', '#']).next().unwrap_or_default();
    if cleaned != url {
        return Err(UrlError::Malformed);
    }

    let caps = url_regex().captures(cleaned).ok_or(UrlError::Malformed)?;
    let md5 = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    if !is_md5(md5) {
        return Err(UrlError::InvalidMd5);
    }

    let extension = caps
        .get(2)
        .map(|m| m.as_str())
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .ok_or(UrlError::MissingExtension)?;

    if !kind
        .allowed_filetypes()
        .iter()
        .any(|ft| ft.as_str() == extension)
    {
        return Err(UrlError::ExtensionNotAllowed {
            extension: extension.to_string(),
            kind,
        });
    }

    Ok(UrlParts {
        md5: md5.to_string(),
        extension: extension.to_string(),
    })
}

// ============================================================================
// Record
// ============================================================================

/// Run every field rule against `record`. An empty result means valid.
pub fn validate_record(record: &MetadataRecord, clock: &dyn Clock) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let kind = record.kind();

    if !is_md5(&record.id) {
        errors.push(FieldError::new("id", "ID must be a 32-character lowercase MD5"));
    }

    match validate_url(&record.url, kind) {
        Ok(parts) => {
            if parts.md5 != record.id {
                errors.push(FieldError::new("url", "URL does not match the record ID"));
            }
            if parts.extension != record.payload.filetype().as_str() {
                errors.push(FieldError::new(
                    "data.filetype",
                    format!(
                        "File type `{}` does not match the URL extension `{}`",
                        record.payload.filetype(),
                        parts.extension
                    ),
                ));
            }
        }
        Err(e) => errors.push(FieldError::new("url", e.to_string())),
    }

    if !kind.allowed_filetypes().contains(&record.payload.filetype()) {
        errors.push(FieldError::new(
            "data.filetype",
            format!(
                "File type `{}` is not allowed for {} records",
                record.payload.filetype(),
                kind
            ),
        ));
    }

    match &record.payload {
        Payload::Book(data) => validate_book(data, clock, &mut errors),
        Payload::Test(data) => validate_test(data, clock, &mut errors),
        Payload::Doc(data) => validate_doc(data, &mut errors),
    }

    errors
}

/// Result of checking a metadata document as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// The parsed record, when the text parsed at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<MetadataRecord>,
    pub errors: Vec<FieldError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.record.is_some() && self.errors.is_empty()
    }
}

/// Parse `text` and run [`validate_record`] on it. A parse failure is
/// reported as a `yaml` field error.
pub fn validate_text(text: &str, clock: &dyn Clock) -> ValidationOutcome {
    match crate::yaml::parse_record(text) {
        Ok(record) => ValidationOutcome {
            errors: validate_record(&record, clock),
            record: Some(record),
        },
        Err(e) => ValidationOutcome {
            record: None,
            errors: vec![FieldError::new("yaml", e.to_string())],
        },
    }
}

fn non_blank<S: AsRef<str>>(items: &[S]) -> impl Iterator<Item = (usize, &str)> {
    items
        .iter()
        .map(|s| s.as_ref())
        .enumerate()
        .filter(|(_, s)| !s.trim().is_empty())
}

fn validate_book(data: &BookData, clock: &dyn Clock, errors: &mut Vec<FieldError>) {
    if data.title.trim().is_empty() {
        errors.push(FieldError::new("data.title", "Title is required"));
    }
    if non_blank(&data.authors).next().is_none() {
        errors.push(FieldError::new("data.authors", "At least one author is required"));
    }
    if let Some(year) = data.publish_year.as_deref().filter(|y| !y.trim().is_empty()) {
        if !validate_year(year, clock) {
            errors.push(FieldError::new(
                "data.publish_year",
                "Publish year must be a positive year not in the future",
            ));
        }
    }

    let mut isbn_count = 0;
    for (i, isbn) in non_blank(&data.isbn) {
        isbn_count += 1;
        if !validate_isbn(isbn) {
            errors.push(FieldError::new(
                format!("data.isbn[{}]", i),
                format!("`{}` is not a valid ISBN-10 or ISBN-13", isbn),
            ));
        }
    }
    if isbn_count == 0 {
        errors.push(FieldError::new("data.isbn", "At least one ISBN is required"));
    }
}

fn validate_test(data: &TestData, clock: &dyn Clock, errors: &mut Vec<FieldError>) {
    if data.course.name.trim().is_empty() {
        errors.push(FieldError::new("data.course.name", "Course name is required"));
    }
    if let Err(e) = validate_year_range(&data.time.start, &data.time.end, clock) {
        errors.push(FieldError::new("data.time", e.to_string()));
    }
    if data.content.is_empty() {
        errors.push(FieldError::new("data.content", "Select at least one content type"));
    }
}

fn validate_doc(data: &DocData, errors: &mut Vec<FieldError>) {
    if data.title.trim().is_empty() {
        errors.push(FieldError::new("data.title", "Title is required"));
    }
    for (i, course) in data.course.iter().enumerate() {
        if course.name.trim().is_empty() {
            errors.push(FieldError::new(
                format!("data.course[{}].name", i),
                "Course name is required",
            ));
        }
    }
    if data.content.is_empty() {
        errors.push(FieldError::new("data.content", "Select at least one content type"));
    }
}
