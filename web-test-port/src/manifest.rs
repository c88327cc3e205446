//! An index over the `MANIFEST.json` of a WPT directory, which decides which files of the
//! directory are tests, and under which URLs.
//!
//! One source file may produce more than one test: `foo.any.js` is served as both `foo.any.html`
//! and `foo.any.worker.html`, and `parse.html` may be run once per query string variant. Each URL
//! is its own test with its own metadata.

use std::fmt::{self, Display, Formatter};

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::path::{split_test, wpt_url_prefix};

/// Whether a reference (or baseline) must match the test's rendering, or must differ from it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Relation {
    #[serde(rename = "==")]
    Match,
    #[serde(rename = "!=")]
    Mismatch,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "==",
            Self::Mismatch => "!=",
        }
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ItemMetadata {
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ItemMetadata {
    pub fn is_slow(&self) -> bool {
        self.timeout.as_deref() == Some("long")
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestKind {
    Testharness,
    Reftest { references: Vec<(String, Relation)> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestItem {
    /// The path of the file this test is generated from, relative to the WPT directory.
    pub source: String,
    pub kind: TestKind,
    pub metadata: ItemMetadata,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    items: ManifestItems,
}

/// Item types other than these (`manual`, `crashtest`, ...) are not run, and are ignored.
#[derive(Debug, Deserialize)]
struct ManifestItems {
    #[serde(default)]
    testharness: IndexMap<String, Vec<(String, ItemMetadata)>>,
    #[serde(default)]
    reftest: IndexMap<String, Vec<(String, Vec<(String, Relation)>, ItemMetadata)>>,
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum ManifestError {
    #[error("{dir:?} is not a WPT directory")]
    NotAWptDir { dir: String },
    #[error("failed to read WPT manifest at `{path}`")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse WPT manifest at `{path}`")]
    Parse {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },
}

/// The tests of one WPT directory, keyed by URL relative to that directory.
#[derive(Clone, Debug, Default)]
pub struct WptManifest {
    wpt_dir: &'static str,
    tests: IndexMap<String, TestItem>,
    urls_by_source: IndexMap<String, Vec<String>>,
}

impl WptManifest {
    /// An index with no tests, for a WPT directory without a manifest.
    pub fn empty(wpt_dir: &'static str) -> Self {
        Self {
            wpt_dir,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str, wpt_dir: &'static str) -> Result<Self, serde_json::Error> {
        let ManifestFile {
            items:
                ManifestItems {
                    testharness,
                    reftest,
                },
        } = serde_json::from_str(json)?;

        let mut manifest = Self::empty(wpt_dir);
        for (source, variants) in testharness {
            for (url, metadata) in variants {
                manifest.insert(&source, url, TestKind::Testharness, metadata);
            }
        }
        for (source, variants) in reftest {
            for (url, references, metadata) in variants {
                manifest.insert(&source, url, TestKind::Reftest { references }, metadata);
            }
        }
        Ok(manifest)
    }

    fn insert(&mut self, source: &str, url: String, kind: TestKind, metadata: ItemMetadata) {
        let url = self.strip_url_prefix(&url).to_owned();
        self.urls_by_source
            .entry(source.to_owned())
            .or_default()
            .push(url.clone());
        self.tests.insert(
            url,
            TestItem {
                source: source.to_owned(),
                kind,
                metadata,
            },
        );
    }

    /// Makes a URL relative to this WPT directory, if it is not already.
    fn strip_url_prefix<'a>(&self, url: &'a str) -> &'a str {
        wpt_url_prefix(self.wpt_dir)
            .and_then(|prefix| url.strip_prefix(prefix))
            .or_else(|| url.strip_prefix('/'))
            .unwrap_or(url)
    }

    pub fn wpt_dir(&self) -> &'static str {
        self.wpt_dir
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn all_urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.tests.keys().map(|url| url.as_str())
    }

    pub fn get(&self, url: &str) -> Option<&TestItem> {
        self.tests.get(url)
    }

    pub fn is_test_url(&self, url: &str) -> bool {
        self.tests.contains_key(url)
    }

    /// Whether `path_in_wpt` is a source file that tests are generated from.
    pub fn is_test_file(&self, path_in_wpt: &str) -> bool {
        self.urls_by_source.contains_key(path_in_wpt)
    }

    pub fn urls_for_file(&self, path_in_wpt: &str) -> &[String] {
        self.urls_by_source
            .get(path_in_wpt)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn file_path_for_test_url(&self, url: &str) -> Option<&str> {
        self.tests.get(url).map(|item| item.source.as_str())
    }

    pub fn is_slow_test(&self, url: &str) -> bool {
        self.tests
            .get(url)
            .is_some_and(|item| item.metadata.is_slow())
    }

    /// The references of a reftest, as written in the manifest.
    pub fn extract_reference_list(&self, url: &str) -> &[(String, Relation)] {
        match self.tests.get(url).map(|item| &item.kind) {
            Some(TestKind::Reftest { references }) => references,
            _ => &[],
        }
    }

    /// The references of a reftest, as paths relative to the web tests directory.
    ///
    /// Absolute reference URLs are resolved against this directory's URL prefix; relative ones
    /// against the directory of the test.
    pub fn reference_paths(&self, url: &str) -> Vec<(Relation, String)> {
        let (test_dir, _) = split_test(url);
        self.extract_reference_list(url)
            .iter()
            .map(|(reference, relation)| {
                let path_in_wpt = if reference.starts_with('/') {
                    self.strip_url_prefix(reference).to_owned()
                } else if test_dir.is_empty() {
                    reference.clone()
                } else {
                    format!("{test_dir}/{reference}")
                };
                (*relation, format!("{}/{path_in_wpt}", self.wpt_dir))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) const EXTERNAL_WPT_MANIFEST: &str = r#"{
    "items": {
        "testharness": {
            "dom/ranges/Range-attributes.html": [
                ["dom/ranges/Range-attributes.html", {}]
            ],
            "dom/ranges/Range-attributes-slow.html": [
                ["dom/ranges/Range-attributes-slow.html", {"timeout": "long"}]
            ],
            "console/console-is-a-namespace.any.js": [
                ["console/console-is-a-namespace.any.html", {}],
                ["console/console-is-a-namespace.any.worker.html", {"timeout": "long"}]
            ],
            "html/parse.html": [
                ["html/parse.html?run_type=uri", {}],
                ["html/parse.html?run_type=write", {"timeout": "long"}]
            ]
        },
        "manual": {},
        "reftest": {
            "html/dom/elements/global-attributes/dir_auto-EN-L.html": [
                [
                    "html/dom/elements/global-attributes/dir_auto-EN-L.html",
                    [["/html/dom/elements/global-attributes/dir_auto-EN-L-ref.html", "=="]],
                    {"timeout": "long"}
                ]
            ]
        }
    }
}"#;

#[cfg(test)]
pub(crate) const WPT_INTERNAL_MANIFEST: &str = r#"{
    "items": {
        "testharness": {
            "dom/bar.html": [["dom/bar.html", {}]]
        }
    }
}"#;

#[test]
fn variants_are_independent_tests() {
    let manifest = WptManifest::from_json(EXTERNAL_WPT_MANIFEST, "external/wpt").unwrap();

    insta::assert_debug_snapshot!(manifest.all_urls().collect::<Vec<_>>(), @r###"
    [
        "dom/ranges/Range-attributes.html",
        "dom/ranges/Range-attributes-slow.html",
        "console/console-is-a-namespace.any.html",
        "console/console-is-a-namespace.any.worker.html",
        "html/parse.html?run_type=uri",
        "html/parse.html?run_type=write",
        "html/dom/elements/global-attributes/dir_auto-EN-L.html",
    ]
    "###);

    assert!(!manifest.is_slow_test("console/console-is-a-namespace.any.html"));
    assert!(manifest.is_slow_test("console/console-is-a-namespace.any.worker.html"));
    assert!(!manifest.is_slow_test("html/parse.html?run_type=uri"));
    assert!(manifest.is_slow_test("html/parse.html?run_type=write"));
    assert!(manifest.is_slow_test("html/dom/elements/global-attributes/dir_auto-EN-L.html"));
    assert!(!manifest.is_slow_test("dom/ranges/Range-attributes.html"));
    assert!(!manifest.is_slow_test("not/a/test.html"));

    assert_eq!(
        manifest.file_path_for_test_url("console/console-is-a-namespace.any.worker.html"),
        Some("console/console-is-a-namespace.any.js")
    );
    assert!(manifest.is_test_file("console/console-is-a-namespace.any.js"));
    assert!(!manifest.is_test_file("console/console-is-a-namespace.any.html"));
    assert!(!manifest.is_test_url("console/console-is-a-namespace.any.js"));
    assert_eq!(
        manifest.urls_for_file("html/parse.html"),
        ["html/parse.html?run_type=uri", "html/parse.html?run_type=write"]
    );
    assert!(manifest.urls_for_file("common/blank.html").is_empty());
}

#[test]
fn references() {
    let manifest = WptManifest::from_json(EXTERNAL_WPT_MANIFEST, "external/wpt").unwrap();
    let url = "html/dom/elements/global-attributes/dir_auto-EN-L.html";
    assert_eq!(
        manifest.extract_reference_list(url),
        [(
            "/html/dom/elements/global-attributes/dir_auto-EN-L-ref.html".to_owned(),
            Relation::Match
        )]
    );
    assert_eq!(
        manifest.reference_paths(url),
        [(
            Relation::Match,
            "external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L-ref.html".to_owned()
        )]
    );
    assert!(manifest
        .extract_reference_list("dom/ranges/Range-attributes.html")
        .is_empty());

    let internal = WptManifest::from_json(
        r#"{"items": {"reftest": {
            "a/b.html": [["/wpt_internal/a/b.html", [
                ["/wpt_internal/a/b-ref.html", "=="],
                ["b-notref.html", "!="]
            ], {}]]
        }}}"#,
        "wpt_internal",
    )
    .unwrap();
    assert!(internal.is_test_url("a/b.html"));
    assert_eq!(
        internal.reference_paths("a/b.html"),
        [
            (Relation::Match, "wpt_internal/a/b-ref.html".to_owned()),
            (Relation::Mismatch, "wpt_internal/a/b-notref.html".to_owned()),
        ]
    );
}

#[test]
fn malformed_manifests() {
    assert!(WptManifest::from_json("{", "external/wpt").is_err());
    assert!(WptManifest::from_json(r#"{"items": {"testharness": []}}"#, "external/wpt").is_err());
    assert!(WptManifest::from_json(
        r#"{"items": {"testharness": {"a.html": [["a.html"]]}}}"#,
        "external/wpt"
    )
    .is_err());
    assert!(WptManifest::from_json(r#"{"items": {}}"#, "external/wpt")
        .unwrap()
        .is_empty());
}
