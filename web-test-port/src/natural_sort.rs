//! "Natural" ordering of test names: runs of ASCII digits compare by numeric value, so that
//! `foo_2.html` sorts before `foo_10.html`.

use std::cmp::Ordering;

use crate::path::split_test;

/// A string split into alternating text and number chunks, starting and ending with a (possibly
/// empty) text chunk. Because chunks alternate, two keys compared position by position always
/// compare chunks of the same kind.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct NaturalSortKey(Vec<Chunk>);

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Chunk {
    Number(Digits),
    Text(String),
}

/// A run of ASCII digits with leading zeros stripped, ordered by numeric value without any
/// upper bound on its magnitude.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Digits(String);

impl Ord for Digits {
    fn cmp(&self, other: &Self) -> Ordering {
        let (Self(this), Self(other)) = (self, other);
        this.len().cmp(&other.len()).then_with(|| this.cmp(other))
    }
}

impl PartialOrd for Digits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl NaturalSortKey {
    pub fn new(s: &str) -> Self {
        let mut chunks = Vec::new();
        let mut rest = s;
        loop {
            let text_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
            let (text, after_text) = rest.split_at(text_len);
            chunks.push(Chunk::Text(text.to_owned()));
            if after_text.is_empty() {
                break;
            }

            let digits_len = after_text
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_text.len());
            let (digits, after_digits) = after_text.split_at(digits_len);
            chunks.push(Chunk::Number(Digits(
                digits.trim_start_matches('0').to_owned(),
            )));
            rest = after_digits;
        }
        Self(chunks)
    }
}

pub fn natural_compare(a: &str, b: &str) -> Ordering {
    NaturalSortKey::new(a).cmp(&NaturalSortKey::new(b))
}

/// The sort key for test names: the natural key of the directory (with a trailing separator)
/// followed by that of the base name, which keeps the files of a directory together instead of
/// interleaving them with those of its subdirectories.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct TestKey {
    dirname: NaturalSortKey,
    basename: NaturalSortKey,
}

pub fn test_key(test_name: &str) -> TestKey {
    let (dirname, basename) = split_test(test_name);
    TestKey {
        dirname: NaturalSortKey::new(&format!("{dirname}/")),
        basename: NaturalSortKey::new(basename),
    }
}

pub fn compare_test_names(a: &str, b: &str) -> Ordering {
    test_key(a).cmp(&test_key(b))
}

#[test]
fn natural_compare_cases() {
    use Ordering::*;

    for (a, b, expected) in [
        ("a", "a", Equal),
        ("ab", "a", Greater),
        ("a", "ab", Less),
        ("", "", Equal),
        ("", "ab", Less),
        ("1", "2", Less),
        ("2", "1", Greater),
        ("1", "10", Less),
        ("2", "10", Less),
        ("foo_1.html", "foo_2.html", Less),
        ("foo_1.1.html", "foo_2.html", Less),
        ("foo_1.html", "foo_10.html", Less),
        ("foo_2.html", "foo_10.html", Less),
        ("foo_23.html", "foo_10.html", Greater),
        ("foo_23.html", "foo_100.html", Less),
        ("foo_007.html", "foo_7.html", Equal),
        ("99999999999999999999999", "100000000000000000000000", Less),
    ] {
        assert_eq!(natural_compare(a, b), expected, "comparing {a:?} to {b:?}");
    }
}

#[test]
fn test_key_cases() {
    use Ordering::*;

    for (a, b, expected) in [
        ("/a", "/a", Equal),
        ("/a", "/b", Less),
        ("/a2", "/a10", Less),
        ("/a2/foo", "/a10/foo", Less),
        ("/a/foo11", "/a/foo2", Greater),
        ("/ab", "/a/a/b", Less),
        ("/a/a/b", "/ab", Greater),
        ("/foo-bar/baz", "/foo/baz", Less),
    ] {
        assert_eq!(compare_test_names(a, b), expected, "comparing {a:?} to {b:?}");
    }
}

#[test]
fn sorting_is_stable_and_natural() {
    let mut names = vec![
        "fast/dom/test10.html",
        "fast/dom/test2.html",
        "fast/test1.html",
        "fast/dom/sub/test1.html",
    ];
    names.sort_by(|a, b| compare_test_names(a, b));
    assert_eq!(
        names,
        [
            "fast/test1.html",
            "fast/dom/test2.html",
            "fast/dom/test10.html",
            "fast/dom/sub/test1.html",
        ]
    );
}
