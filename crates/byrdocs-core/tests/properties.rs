//! Generated-input checks for the YAML codec and the line diff.

use byrdocs_core::diff::split_lines;
use byrdocs_core::{
    diff_lines, BookData, Course, CourseType, DiffKind, DocContent, DocData, ExamStage, FileType,
    MetadataRecord, Payload, Semester, TestContent, TestData, TestTime, YamlCodec,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Any characters, controls and non-characters included.
fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..24).prop_map(|chars| chars.into_iter().collect())
}

/// Text the writer keeps: blank entries and blank optionals are dropped.
fn kept_text() -> impl Strategy<Value = String> {
    (text(), "[a-z0-9数学]", text()).prop_map(|(head, anchor, tail)| format!("{head}{anchor}{tail}"))
}

fn kept_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(kept_text(), 0..4)
}

fn filetype() -> impl Strategy<Value = FileType> {
    prop_oneof![Just(FileType::Pdf), Just(FileType::Zip)]
}

fn course_type() -> impl Strategy<Value = Option<CourseType>> {
    prop::option::of(prop_oneof![
        Just(CourseType::Undergraduate),
        Just(CourseType::Graduate)
    ])
}

fn book() -> impl Strategy<Value = Payload> {
    (
        text(),
        kept_list(),
        kept_list(),
        prop::option::of(kept_text()),
        prop::option::of(kept_text()),
        prop::option::of(kept_text()),
        kept_list(),
        filetype(),
    )
        .prop_map(
            |(title, authors, translators, edition, publisher, publish_year, isbn, filetype)| {
                Payload::Book(BookData {
                    title,
                    authors,
                    translators,
                    edition,
                    publisher,
                    publish_year,
                    isbn,
                    filetype,
                })
            },
        )
}

fn test_paper() -> impl Strategy<Value = Payload> {
    (
        kept_list(),
        course_type(),
        text(),
        (text(), text()),
        prop::option::of(prop_oneof![Just(Semester::First), Just(Semester::Second)]),
        prop::option::of(prop_oneof![Just(ExamStage::Midterm), Just(ExamStage::Final)]),
        filetype(),
        prop::collection::vec(
            prop_oneof![Just(TestContent::Original), Just(TestContent::Answer)],
            0..3,
        ),
    )
        .prop_map(
            |(college, kind, name, (start, end), semester, stage, filetype, content)| {
                Payload::Test(TestData {
                    college,
                    course: Course { kind, name },
                    time: TestTime {
                        start,
                        end,
                        semester,
                        stage,
                    },
                    filetype,
                    content,
                })
            },
        )
}

fn doc() -> impl Strategy<Value = Payload> {
    let course = (course_type(), kept_text()).prop_map(|(kind, name)| Course { kind, name });
    (
        text(),
        filetype(),
        prop::collection::vec(course, 0..3),
        prop::collection::vec(
            prop_oneof![
                Just(DocContent::MindMap),
                Just(DocContent::QuestionBank),
                Just(DocContent::Answer),
                Just(DocContent::KnowledgePoints),
                Just(DocContent::Courseware),
            ],
            0..4,
        ),
    )
        .prop_map(|(title, filetype, course, content)| {
            Payload::Doc(DocData {
                title,
                filetype,
                course,
                content,
            })
        })
}

fn record() -> impl Strategy<Value = MetadataRecord> {
    (text(), text(), prop_oneof![book(), test_paper(), doc()])
        .prop_map(|(id, url, payload)| MetadataRecord::new(id, url, payload))
}

/// Short lines from a small alphabet so old and new share lines often.
fn lines() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[abc]{0,2}", 0..12)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_yaml_parse_inverts_serialize(record in record()) {
        let codec = YamlCodec::default();
        let text = codec.serialize(&record);
        let parsed = codec.parse(&text);
        prop_assert!(parsed.is_ok(), "{:?}\n{}", parsed, text);
        let parsed = parsed.unwrap();
        prop_assert_eq!(&parsed, &record);
        prop_assert_eq!(codec.serialize(&parsed), text);
    }

    #[test]
    fn prop_diff_numbering(old in lines(), new in lines()) {
        let old_text = old.join("\n");
        let new_text = new.join("\n");
        let diff = diff_lines(&old_text, &new_text);

        let mut old_seen = Vec::new();
        let mut new_seen = Vec::new();
        let mut old_rebuilt = Vec::new();
        let mut new_rebuilt = Vec::new();

        for line in &diff {
            match line.kind {
                DiffKind::Unchanged => {
                    prop_assert!(line.old_line_number.is_some() && line.new_line_number.is_some());
                    old_rebuilt.push(line.content.as_str());
                    new_rebuilt.push(line.content.as_str());
                }
                DiffKind::Added => {
                    prop_assert!(line.old_line_number.is_none());
                    prop_assert!(line.new_line_number.is_some());
                    new_rebuilt.push(line.content.as_str());
                }
                DiffKind::Removed => {
                    prop_assert!(line.new_line_number.is_none());
                    prop_assert!(line.old_line_number.is_some());
                    old_rebuilt.push(line.content.as_str());
                }
            }
            old_seen.extend(line.old_line_number);
            new_seen.extend(line.new_line_number);
        }

        // Each side is numbered 1..=n in order and reassembles exactly.
        let old_lines = split_lines(&old_text);
        let new_lines = split_lines(&new_text);
        prop_assert_eq!(old_seen, (1..=old_lines.len()).collect::<Vec<_>>());
        prop_assert_eq!(new_seen, (1..=new_lines.len()).collect::<Vec<_>>());
        prop_assert_eq!(old_rebuilt, old_lines);
        prop_assert_eq!(new_rebuilt, new_lines);
    }

    #[test]
    fn prop_identical_texts_diff_unchanged(lines in lines()) {
        let text = lines.join("\n");
        let diff = diff_lines(&text, &text);
        prop_assert!(diff.iter().all(|l| l.kind == DiffKind::Unchanged));
        prop_assert_eq!(diff.len(), split_lines(&text).len());
    }
}
