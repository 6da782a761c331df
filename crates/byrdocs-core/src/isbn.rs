//! ISBN validation, conversion and hyphenation.
//!
//! Hyphenation uses an embedded subset of the ISBN range table covering the
//! registration groups that make up nearly all of the archive: 978-0 and 978-1
//! (English) and 978-7 (China). Other groups are split after the prefix only.

/// Digits (and a trailing `X`) with separators removed.
pub fn normalize(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn digit(c: char) -> Option<u32> {
    c.to_digit(10)
}

pub fn is_valid_isbn10(isbn: &str) -> bool {
    let chars: Vec<char> = normalize(isbn).chars().collect();
    if chars.len() != 10 {
        return false;
    }
    let mut sum = 0;
    for (i, c) in chars.into_iter().enumerate() {
        let value = match (i, c) {
            (9, 'X') => 10,
            (_, c) => match digit(c) {
                Some(d) => d,
                None => return false,
            },
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

pub fn is_valid_isbn13(isbn: &str) -> bool {
    let normalized = normalize(isbn);
    if normalized.len() != 13 || !(normalized.starts_with("978") || normalized.starts_with("979"))
    {
        return false;
    }
    let digits: Option<Vec<u32>> = normalized.chars().map(digit).collect();
    match digits {
        Some(digits) => isbn13_check_digit(&digits[..12]) == digits[12],
        None => false,
    }
}

fn isbn13_check_digit(first12: &[u32]) -> u32 {
    let sum: u32 = first12
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

/// True iff `isbn` is a valid ISBN-10 or ISBN-13, checksum included.
pub fn validate_isbn(isbn: &str) -> bool {
    is_valid_isbn10(isbn) || is_valid_isbn13(isbn)
}

/// Bare 13-digit form of a valid ISBN.
pub fn to_isbn13(isbn: &str) -> Option<String> {
    let normalized = normalize(isbn);
    if is_valid_isbn13(&normalized) {
        return Some(normalized);
    }
    if !is_valid_isbn10(&normalized) {
        return None;
    }
    let mut digits: Vec<u32> = vec![9, 7, 8];
    digits.extend(normalized.chars().take(9).filter_map(digit));
    let check = isbn13_check_digit(&digits);
    digits.push(check);
    Some(digits.iter().map(|d| d.to_string()).collect())
}

// ============================================================================
// Hyphenation
// ============================================================================

/// Publisher ranges of one registration group. Bounds are the first seven
/// digits after the group; `len` is the publisher code length.
struct PublisherRange {
    lo: u32,
    hi: u32,
    len: usize,
}

const fn range(lo: u32, hi: u32, len: usize) -> PublisherRange {
    PublisherRange { lo, hi, len }
}

const GROUP_0: &[PublisherRange] = &[
    range(0, 1_999_999, 2),
    range(2_000_000, 6_999_999, 3),
    range(7_000_000, 8_499_999, 4),
    range(8_500_000, 8_999_999, 5),
    range(9_000_000, 9_499_999, 6),
    range(9_500_000, 9_999_999, 7),
];

const GROUP_1: &[PublisherRange] = &[
    range(0, 999_999, 2),
    range(1_000_000, 3_999_999, 3),
    range(4_000_000, 5_499_999, 4),
    range(5_500_000, 8_697_999, 5),
    range(8_698_000, 9_989_999, 6),
    range(9_990_000, 9_999_999, 7),
];

const GROUP_7: &[PublisherRange] = &[
    range(0, 999_999, 2),
    range(1_000_000, 4_999_999, 3),
    range(5_000_000, 7_999_999, 4),
    range(8_000_000, 8_999_999, 5),
    range(9_000_000, 9_999_999, 6),
];

fn publisher_ranges(prefix: &str, group: char) -> Option<&'static [PublisherRange]> {
    match (prefix, group) {
        ("978", '0') => Some(GROUP_0),
        ("978", '1') => Some(GROUP_1),
        ("978", '7') => Some(GROUP_7),
        _ => None,
    }
}

/// Hyphenated ISBN-13, e.g. `978-7-04-023069-7`.
///
/// Returns `None` for an invalid ISBN. Groups outside the embedded table are
/// rendered as `<prefix>-<rest>`.
pub fn format_isbn(isbn: &str) -> Option<String> {
    let isbn13 = to_isbn13(isbn)?;
    let (prefix, rest) = isbn13.split_at(3);
    let group = rest.chars().next()?;

    let Some(ranges) = publisher_ranges(prefix, group) else {
        return Some(format!("{}-{}", prefix, rest));
    };

    // rest = group(1) + publisher + title + check(1)
    let body = &rest[1..rest.len() - 1];
    let check = &rest[rest.len() - 1..];
    let lead: u32 = body[..7].parse().ok()?;
    let len = ranges
        .iter()
        .find(|r| lead >= r.lo && lead <= r.hi)
        .map(|r| r.len)?;
    let (publisher, title) = body.split_at(len);

    Some(format!("{}-{}-{}-{}-{}", prefix, group, publisher, title, check))
}
