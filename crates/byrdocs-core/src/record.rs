//! Metadata records.
//!
//! A [`MetadataRecord`] describes one archived file. The shape of its
//! [`Payload`] is tied to its kind by construction: [`MetadataRecord::kind`]
//! is derived from the payload variant, so a book can never carry test data.
//!
//! Records are read from archive YAML files and from the JSON feed through the
//! same raw `{id, url, type, data}` shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{metadata_filename, metadata_path};

// ============================================================================
// Enumerations
// ============================================================================

/// The closed set of record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Book,
    Test,
    Doc,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [Self::Book, Self::Test, Self::Doc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Test => "test",
            Self::Doc => "doc",
        }
    }

    /// File types a record of this kind may describe.
    pub fn allowed_filetypes(&self) -> &'static [FileType] {
        match self {
            Self::Book | Self::Test => &[FileType::Pdf],
            Self::Doc => &[FileType::Pdf, FileType::Zip],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(Self::Book),
            "test" => Ok(Self::Test),
            "doc" => Ok(Self::Doc),
            other => Err(format!(
                "Unknown record type: '{}'. Use 'book', 'test', or 'doc'.",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Zip,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Zip => "zip",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "zip" => Ok(Self::Zip),
            other => Err(format!("Unsupported file type: '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "First",
            Self::Second => "Second",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::First => "第一学期",
            Self::Second => "第二学期",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExamStage {
    #[serde(rename = "期中")]
    Midterm,
    #[serde(rename = "期末")]
    Final,
}

impl ExamStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Midterm => "期中",
            Self::Final => "期末",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseType {
    #[serde(rename = "本科")]
    Undergraduate,
    #[serde(rename = "研究生")]
    Graduate,
}

impl CourseType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Undergraduate => "本科",
            Self::Graduate => "研究生",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestContent {
    #[serde(rename = "原题")]
    Original,
    #[serde(rename = "答案")]
    Answer,
}

impl TestContent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Original => "原题",
            Self::Answer => "答案",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocContent {
    #[serde(rename = "思维导图")]
    MindMap,
    #[serde(rename = "题库")]
    QuestionBank,
    #[serde(rename = "答案")]
    Answer,
    #[serde(rename = "知识点")]
    KnowledgePoints,
    #[serde(rename = "课件")]
    Courseware,
}

impl DocContent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MindMap => "思维导图",
            Self::QuestionBank => "题库",
            Self::Answer => "答案",
            Self::KnowledgePoints => "知识点",
            Self::Courseware => "课件",
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translators: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub edition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub isbn: Vec<String>,
    pub filetype: FileType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CourseType>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTime {
    #[serde(default, deserialize_with = "lenient_string")]
    pub start: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<Semester>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<ExamStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub college: Vec<String>,
    #[serde(default)]
    pub course: Course,
    #[serde(default)]
    pub time: TestTime,
    pub filetype: FileType,
    #[serde(default)]
    pub content: Vec<TestContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocData {
    #[serde(default)]
    pub title: String,
    pub filetype: FileType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub course: Vec<Course>,
    #[serde(default)]
    pub content: Vec<DocContent>,
}

/// Kind-specific fields of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Book(BookData),
    Test(TestData),
    Doc(DocData),
}

impl Payload {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Book(_) => RecordKind::Book,
            Self::Test(_) => RecordKind::Test,
            Self::Doc(_) => RecordKind::Doc,
        }
    }

    pub fn filetype(&self) -> FileType {
        match self {
            Self::Book(data) => data.filetype,
            Self::Test(data) => data.filetype,
            Self::Doc(data) => data.filetype,
        }
    }
}

// ============================================================================
// MetadataRecord
// ============================================================================

/// One archived file's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecord", into = "RawRecord")]
pub struct MetadataRecord {
    /// 32-hex md5 of the file.
    pub id: String,
    /// Download URL, `https://byrdocs.org/files/<id>.<ext>`.
    pub url: String,
    pub payload: Payload,
}

impl MetadataRecord {
    pub fn new(id: impl Into<String>, url: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            payload,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    /// `<id>.yml`
    pub fn filename(&self) -> String {
        metadata_filename(&self.id)
    }

    /// `metadata/<id>.yml`
    pub fn path(&self) -> String {
        metadata_path(&self.filename())
    }

    /// Human-readable name used in commit messages and listings.
    ///
    /// Books and docs use their title. Tests are named from their year range,
    /// semester, course, stage, and whether the file is only an answer key.
    pub fn display_name(&self) -> String {
        match &self.payload {
            Payload::Book(data) => data.title.clone(),
            Payload::Doc(data) => data.title.clone(),
            Payload::Test(data) => {
                let time = &data.time;
                let years = if time.start == time.end {
                    time.start.clone()
                } else {
                    format!("{}-{}", time.start, time.end)
                };
                let semester = time.semester.map(|s| s.label()).unwrap_or_default();
                let stage = time.stage.map(|s| s.label()).unwrap_or_default();
                let content_type = if data.content == [TestContent::Answer] {
                    "答案"
                } else {
                    "试卷"
                };
                format!(
                    "{}{} {}{}{}",
                    years, semester, data.course.name, stage, content_type
                )
            }
        }
    }
}

/// Wire shape shared by YAML files and the JSON feed.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawRecord {
    Book { id: String, url: String, data: BookData },
    Test { id: String, url: String, data: TestData },
    Doc { id: String, url: String, data: DocData },
}

impl From<RawRecord> for MetadataRecord {
    fn from(raw: RawRecord) -> Self {
        match raw {
            RawRecord::Book { id, url, data } => Self::new(id, url, Payload::Book(data)),
            RawRecord::Test { id, url, data } => Self::new(id, url, Payload::Test(data)),
            RawRecord::Doc { id, url, data } => Self::new(id, url, Payload::Doc(data)),
        }
    }
}

impl From<MetadataRecord> for RawRecord {
    fn from(record: MetadataRecord) -> Self {
        let MetadataRecord { id, url, payload } = record;
        match payload {
            Payload::Book(data) => Self::Book { id, url, data },
            Payload::Test(data) => Self::Test { id, url, data },
            Payload::Doc(data) => Self::Doc { id, url, data },
        }
    }
}

// ============================================================================
// Lenient scalars
// ============================================================================

/// Hand-written YAML often leaves years and ISBNs unquoted.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn lenient_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(Vec::<Scalar>::deserialize(deserializer)?
        .into_iter()
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(start: &str, end: &str, content: Vec<TestContent>) -> MetadataRecord {
        MetadataRecord::new(
            "0123456789abcdef0123456789abcdef",
            "https://byrdocs.org/files/0123456789abcdef0123456789abcdef.pdf",
            Payload::Test(TestData {
                college: vec!["计算机学院".to_string()],
                course: Course {
                    kind: Some(CourseType::Undergraduate),
                    name: "高等数学".to_string(),
                },
                time: TestTime {
                    start: start.to_string(),
                    end: end.to_string(),
                    semester: Some(Semester::First),
                    stage: Some(ExamStage::Final),
                },
                filetype: FileType::Pdf,
                content,
            }),
        )
    }

    #[test]
    fn test_display_name_for_exam_paper() {
        let record = test_record("2023", "2024", vec![TestContent::Original]);
        assert_eq!(record.display_name(), "2023-2024第一学期 高等数学期末试卷");
    }

    #[test]
    fn test_display_name_for_answer_only_single_year() {
        let record = test_record("2023", "2023", vec![TestContent::Answer]);
        assert_eq!(record.display_name(), "2023第一学期 高等数学期末答案");

        let both = test_record("2023", "2023", vec![TestContent::Original, TestContent::Answer]);
        assert!(both.display_name().ends_with("试卷"));
    }

    #[test]
    fn test_paths() {
        let record = test_record("2023", "2024", vec![TestContent::Original]);
        assert_eq!(record.kind(), RecordKind::Test);
        assert_eq!(record.path(), "metadata/0123456789abcdef0123456789abcdef.yml");
    }

    #[test]
    fn test_feed_json_entry_deserializes() {
        let json = r#"{
            "id": "0123456789abcdef0123456789abcdef",
            "url": "https://byrdocs.org/files/0123456789abcdef0123456789abcdef.zip",
            "type": "doc",
            "data": {
                "title": "数据结构复习",
                "filetype": "zip",
                "course": [{"name": "数据结构"}],
                "content": ["思维导图", "知识点"]
            }
        }"#;
        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind(), RecordKind::Doc);
        match &record.payload {
            Payload::Doc(data) => {
                assert_eq!(data.course[0].name, "数据结构");
                assert_eq!(
                    data.content,
                    vec![DocContent::MindMap, DocContent::KnowledgePoints]
                );
            }
            other => panic!("Unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_unquoted_year_is_accepted() {
        let yaml = "id: a\nurl: b\ntype: book\ndata:\n  title: T\n  authors: [A]\n  publish_year: 2020\n  isbn: [9787040230697]\n  filetype: pdf\n";
        let record: MetadataRecord = serde_yaml::from_str(yaml).unwrap();
        match record.payload {
            Payload::Book(data) => {
                assert_eq!(data.publish_year.as_deref(), Some("2020"));
                assert_eq!(data.isbn, vec!["9787040230697".to_string()]);
            }
            other => panic!("Unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let yaml = "id: a\nurl: b\ntype: video\ndata: {}\n";
        assert!(serde_yaml::from_str::<MetadataRecord>(yaml).is_err());
    }
}
