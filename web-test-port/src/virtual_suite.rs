//! Virtual test suites: namespaces under `virtual/<prefix>/` that rerun the tests of a base
//! directory with extra command-line arguments.

use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::path::{is_test_path_prefix, VIRTUAL_TEST_DIR};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VirtualTestSuite {
    name: String,
    prefix: String,
    base: String,
    args: Vec<String>,
    references_use_default_args: bool,
}

#[derive(Clone, Debug, Diagnostic, Eq, PartialEq, thiserror::Error)]
#[error("virtual test suite prefixes may not contain `/`, but got {prefix:?}")]
pub struct InvalidPrefixError {
    pub prefix: String,
}

impl VirtualTestSuite {
    pub fn new(
        prefix: String,
        base: String,
        args: Vec<String>,
        references_use_default_args: bool,
    ) -> Result<Self, InvalidPrefixError> {
        if prefix.contains('/') {
            return Err(InvalidPrefixError { prefix });
        }
        Ok(Self {
            name: format!("{VIRTUAL_TEST_DIR}/{prefix}/{base}"),
            prefix,
            base,
            args,
            references_use_default_args,
        })
    }

    /// `virtual/<prefix>/<base>`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn references_use_default_args(&self) -> bool {
        self.references_use_default_args
    }

    /// The arguments that references of this suite's tests are run with.
    pub fn reference_args(&self) -> &[String] {
        if self.references_use_default_args {
            &[]
        } else {
            &self.args
        }
    }

    /// Strips `virtual/<prefix>/` from `test_name`, if it is there.
    fn strip_virtual_dir<'a>(&self, test_name: &'a str) -> Option<&'a str> {
        test_name
            .strip_prefix(VIRTUAL_TEST_DIR)?
            .strip_prefix('/')?
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')
    }
}

/// An entry of a `VirtualTestSuites` file. Bare strings are separators and comments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VirtualTestSuitesEntry {
    Suite {
        prefix: String,
        base: String,
        args: Vec<String>,
        #[serde(default)]
        references_use_default_args: bool,
    },
    Comment(#[allow(dead_code)] String),
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum VirtualTestSuitesError {
    #[error("no virtual test suite definitions found at `{path}`")]
    #[diagnostic(help("every web tests directory needs a `VirtualTestSuites` file, even if it is just `[]`"))]
    Missing { path: camino::Utf8PathBuf },
    #[error("failed to read virtual test suite definitions from `{path}`")]
    Read {
        path: camino::Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse virtual test suite definitions")]
    Parse { source: serde_json::Error },
    #[error("more than one virtual test suite has the prefix {prefix:?}")]
    DuplicatePrefix { prefix: String },
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidPrefix(#[from] InvalidPrefixError),
}

/// A validated set of [`VirtualTestSuite`]s with unique prefixes, in definition order.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct VirtualTestSuites {
    suites: Vec<VirtualTestSuite>,
}

impl VirtualTestSuites {
    pub fn new(suites: Vec<VirtualTestSuite>) -> Result<Self, VirtualTestSuitesError> {
        if let Some(prefix) = suites.iter().map(|suite| suite.prefix()).duplicates().next() {
            return Err(VirtualTestSuitesError::DuplicatePrefix {
                prefix: prefix.to_owned(),
            });
        }
        Ok(Self { suites })
    }

    /// Parses the contents of a `VirtualTestSuites` file: a JSON array of
    /// `{"prefix", "base", "args", "references_use_default_args"?}` objects.
    pub fn from_json(json: &str) -> Result<Self, VirtualTestSuitesError> {
        let entries = serde_json::from_str::<Vec<VirtualTestSuitesEntry>>(json)
            .map_err(|source| VirtualTestSuitesError::Parse { source })?;
        let suites = entries
            .into_iter()
            .filter_map(|entry| match entry {
                VirtualTestSuitesEntry::Comment(_) => None,
                VirtualTestSuitesEntry::Suite {
                    prefix,
                    base,
                    args,
                    references_use_default_args,
                } => Some(VirtualTestSuite::new(
                    prefix,
                    base,
                    args,
                    references_use_default_args,
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(suites)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VirtualTestSuite> + '_ {
        self.suites.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Finds the suite whose name is the longest `/`-separated prefix of `test_name`. A suite
    /// named after a single test also holds its query string variants.
    pub fn find_for_test(&self, test_name: &str) -> Option<&VirtualTestSuite> {
        if !test_name.starts_with(VIRTUAL_TEST_DIR) {
            return None;
        }
        self.suites
            .iter()
            .filter(|suite| is_test_path_prefix(suite.name(), test_name))
            .max_by_key(|suite| suite.name().len())
    }

    /// The non-virtual test that `test_name` reruns, or `None` if `test_name` is not in any suite.
    pub fn lookup_base<'a>(&self, test_name: &'a str) -> Option<&'a str> {
        self.find_for_test(test_name)
            .and_then(|suite| suite.strip_virtual_dir(test_name))
    }

    /// Like [`Self::lookup_base`], but returns `test_name` itself for non-virtual tests.
    pub fn base_test<'a>(&self, test_name: &'a str) -> &'a str {
        self.lookup_base(test_name).unwrap_or(test_name)
    }

    pub fn args_for_test(&self, test_name: &str) -> &[String] {
        self.find_for_test(test_name)
            .map(VirtualTestSuite::args)
            .unwrap_or_default()
    }

    pub fn reference_args_for_test(&self, test_name: &str) -> &[String] {
        self.find_for_test(test_name)
            .map(VirtualTestSuite::reference_args)
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a VirtualTestSuites {
    type Item = &'a VirtualTestSuite;
    type IntoIter = std::slice::Iter<'a, VirtualTestSuite>;

    fn into_iter(self) -> Self::IntoIter {
        self.suites.iter()
    }
}

#[cfg(test)]
fn suite(prefix: &str, base: &str, args: &[&str]) -> VirtualTestSuite {
    VirtualTestSuite::new(
        prefix.to_owned(),
        base.to_owned(),
        args.iter().map(|&arg| arg.to_owned()).collect(),
        false,
    )
    .unwrap()
}

#[test]
fn basic() {
    let suite = suite("suite", "base/foo", &["--args"]);
    assert_eq!(suite.name(), "virtual/suite/base/foo");
    assert_eq!(suite.base(), "base/foo");
    assert_eq!(suite.args(), ["--args"]);
    assert_eq!(suite.reference_args(), suite.args());
}

#[test]
fn reference_args() {
    let new = |references_use_default_args| {
        VirtualTestSuite::new(
            "suite".to_owned(),
            "base/foo".to_owned(),
            vec!["--args".to_owned()],
            references_use_default_args,
        )
        .unwrap()
    };

    let suite = new(true);
    assert_eq!(suite.args(), ["--args"]);
    assert!(suite.reference_args().is_empty());

    let suite = new(false);
    assert_eq!(suite.args(), ["--args"]);
    assert_eq!(suite.reference_args(), suite.args());
}

#[test]
fn no_slash_in_prefix() {
    insta::assert_debug_snapshot!(
        VirtualTestSuite::new(
            "suite/bar".to_owned(),
            "base/foo".to_owned(),
            vec!["--args".to_owned()],
            false,
        ),
        @r###"
    Err(
        InvalidPrefixError {
            prefix: "suite/bar",
        },
    )
    "###
    );
}

#[test]
fn parse_suites() {
    let suites = VirtualTestSuites::from_json(
        r#"[
            "comments are skipped",
            {"prefix": "bar", "base": "fast/bar", "args": ["--bar"]},
            {"prefix": "ref", "base": "fast/ref", "args": ["--ref"], "references_use_default_args": true}
        ]"#,
    )
    .unwrap();
    assert_eq!(
        suites.iter().map(|suite| suite.name()).collect::<Vec<_>>(),
        ["virtual/bar/fast/bar", "virtual/ref/fast/ref"]
    );
    assert!(!suites.iter().next().unwrap().references_use_default_args());
    assert!(suites
        .reference_args_for_test("virtual/ref/fast/ref/a.html")
        .is_empty());
    assert_eq!(suites.args_for_test("virtual/ref/fast/ref/a.html"), ["--ref"]);
    assert!(suites.args_for_test("fast/ref/a.html").is_empty());
}

#[test]
fn parse_errors() {
    assert!(matches!(
        VirtualTestSuites::from_json("{[{["),
        Err(VirtualTestSuitesError::Parse { .. })
    ));
    assert!(matches!(
        VirtualTestSuites::from_json(r#"{"prefix": "bar"}"#),
        Err(VirtualTestSuitesError::Parse { .. })
    ));
    assert!(matches!(
        VirtualTestSuites::from_json(r#"[{"prefix": "bar", "base": "fast/bar"}]"#),
        Err(VirtualTestSuitesError::Parse { .. })
    ));
    assert!(matches!(
        VirtualTestSuites::from_json(r#"[{"prefix": "a/b", "base": "fast", "args": []}]"#),
        Err(VirtualTestSuitesError::InvalidPrefix(InvalidPrefixError { prefix })) if prefix == "a/b"
    ));
}

#[test]
fn duplicate_prefixes() {
    let identical = r#"[
        {"prefix": "bar", "base": "fast/bar", "args": ["--bar"]},
        {"prefix": "bar", "base": "fast/bar", "args": ["--bar"]}
    ]"#;
    assert!(matches!(
        VirtualTestSuites::from_json(identical),
        Err(VirtualTestSuitesError::DuplicatePrefix { prefix }) if prefix == "bar"
    ));

    let same_prefix_only = vec![
        suite("bar", "fast/bar", &["--bar"]),
        suite("bar", "fast/baz", &["--baz"]),
    ];
    assert!(matches!(
        VirtualTestSuites::new(same_prefix_only),
        Err(VirtualTestSuitesError::DuplicatePrefix { .. })
    ));
}

#[test]
fn find_and_strip() {
    let suites = VirtualTestSuites::new(vec![
        suite("flag", "fast", &["--flag"]),
        suite("flag2", "fast/dom", &["--flag2"]),
        suite("files", "fast/a.html", &["--files"]),
    ])
    .unwrap();

    assert_eq!(
        suites.find_for_test("virtual/flag/fast/test.html").map(|s| s.prefix()),
        Some("flag")
    );
    assert_eq!(
        suites.find_for_test("virtual/flag2/fast/dom/test.html").map(|s| s.prefix()),
        Some("flag2")
    );
    assert_eq!(
        suites.find_for_test("virtual/files/fast/a.html").map(|s| s.prefix()),
        Some("files")
    );
    assert_eq!(suites.find_for_test("virtual/flag/fastest/test.html"), None);
    assert_eq!(suites.find_for_test("virtual/flag2/fast/test.html"), None);
    assert_eq!(suites.find_for_test("fast/test.html"), None);

    assert_eq!(suites.base_test("virtual/flag/fast/test.html"), "fast/test.html");
    assert_eq!(suites.base_test("fast/test.html"), "fast/test.html");
    assert_eq!(suites.base_test("virtual/unknown/fast/test.html"), "virtual/unknown/fast/test.html");
    assert_eq!(suites.lookup_base("virtual/unknown/fast/test.html"), None);
    assert_eq!(suites.lookup_base("virtual/flag/fast"), Some("fast"));
}

#[test]
fn serialize_suites() {
    let suites = VirtualTestSuites::new(vec![suite("flag", "fast", &["--flag"])]).unwrap();
    assert_eq!(
        serde_json::to_string(&suites).unwrap(),
        r#"[{"name":"virtual/flag/fast","prefix":"flag","base":"fast","args":["--flag"],"references_use_default_args":false}]"#
    );
}
