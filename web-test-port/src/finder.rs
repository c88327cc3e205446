//! Enumeration of test names under a set of paths.
//!
//! Tests come from three places, in this order:
//!
//! 1. Files under the web tests directory that [`is_non_wpt_test_file`] accepts.
//! 2. URLs listed in the manifests of the [`WPT_DIRS`].
//! 3. Virtual tests: the tests of each virtual suite's base, renamed under `virtual/<prefix>/`.
//!
//! Paths may end with `/`, and may contain `*` globs. `?` never starts a glob, since it starts the
//! query string of WPT variants.

use indexmap::IndexSet;
use itertools::Itertools;
use miette::Diagnostic;
use wax::{Glob, Pattern};

use crate::{
    fs::FileSystem,
    manifest::WptManifest,
    natural_sort::test_key,
    path::{
        is_non_wpt_test_file, is_path_prefix, is_test_path_prefix, self_and_ancestors, split_test,
        split_wpt_test, VIRTUAL_TEST_DIR, WPT_DIRS,
    },
    port::{Port, PortError},
};

/// Directories that never contain tests, wherever they are.
pub const SKIPPED_DIRECTORIES: &[&str] = &[
    "platform",
    "resources",
    "support",
    "script-tests",
    "reference",
    "reftest",
];

/// Top-level directories of baselines and other per-configuration data.
const SKIPPED_TOP_LEVEL_DIRECTORIES: &[&str] = &[VIRTUAL_TEST_DIR, "flag-specific"];

#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("invalid test path glob {glob:?}")]
pub struct TestGlobError {
    pub glob: String,
    #[diagnostic_source]
    pub source: wax::BuildError,
}

/// A test path given on the command line.
enum TestFilter<'a> {
    Path(&'a str),
    Glob { expr: &'a str, glob: Glob<'a> },
}

impl<'a> TestFilter<'a> {
    fn new(path: &'a str) -> Result<Self, TestGlobError> {
        let path = path.trim_end_matches('/');
        if !path.contains('*') {
            return Ok(Self::Path(path));
        }
        let glob = Glob::new(path).map_err(|source| TestGlobError {
            glob: path.to_owned(),
            source,
        })?;
        Ok(Self::Glob { expr: path, glob })
    }

    /// The directory under which everything this filter matches lives.
    fn walk_root(&self) -> &'a str {
        match self {
            Self::Path(path) => path,
            Self::Glob { expr, .. } => {
                let literal_len = expr
                    .split('/')
                    .take_while(|component| !component.contains('*'))
                    .map(|component| component.len() + 1)
                    .sum::<usize>();
                expr[..literal_len.min(expr.len())].trim_end_matches('/')
            }
        }
    }

    /// Whether `test_name` (or a directory containing it) is what this filter names.
    fn matches(&self, test_name: &str) -> bool {
        match self {
            Self::Path(path) => is_path_prefix(path, test_name),
            Self::Glob { glob, .. } => {
                self_and_ancestors(test_name).any(|candidate| glob.is_match(candidate))
            }
        }
    }
}

fn is_skipped_directory(rel_dir: &str) -> bool {
    let mut components = rel_dir.split('/').filter(|c| !c.is_empty());
    let Some(first) = components.next() else {
        return false;
    };
    SKIPPED_TOP_LEVEL_DIRECTORIES.contains(&first)
        || WPT_DIRS
            .iter()
            .any(|&(wpt_dir, _)| is_path_prefix(wpt_dir, rel_dir))
        || std::iter::once(first)
            .chain(components)
            .any(|component| SKIPPED_DIRECTORIES.contains(&component))
}

fn sort_tests(tests: &mut Vec<String>) {
    tests.sort_by_cached_key(|test| test_key(test));
    tests.dedup();
}

impl<Fs> Port<Fs>
where
    Fs: FileSystem,
{
    /// All tests under `paths`, or in the whole web tests directory if `paths` is empty.
    pub fn tests(&self, paths: &[&str]) -> Result<Vec<String>, PortError> {
        let mut tests = self.real_tests(paths)?;
        tests.extend(self.virtual_tests(paths)?);
        Ok(tests.into_iter().collect::<IndexSet<_>>().into_iter().collect())
    }

    /// Tests under `paths` that are not virtual: non-WPT test files, sorted, followed by WPT
    /// tests, sorted.
    pub fn real_tests(&self, paths: &[&str]) -> Result<Vec<String>, PortError> {
        let filters = paths
            .iter()
            .map(|path| TestFilter::new(path))
            .collect::<Result<Vec<_>, _>>()?;

        let mut non_wpt_tests = Vec::new();
        if filters.is_empty() {
            self.find_non_wpt_tests("", &mut non_wpt_tests)?;
        }
        for filter in &filters {
            let root = filter.walk_root();
            let mut found = Vec::new();
            self.find_non_wpt_tests(root, &mut found)?;
            non_wpt_tests.extend(found.into_iter().filter(|test| filter.matches(test)));
        }
        sort_tests(&mut non_wpt_tests);

        let mut wpt_tests = Vec::new();
        for &(wpt_dir, _url_prefix) in WPT_DIRS {
            let manifest = self.wpt_manifest(wpt_dir)?;
            wpt_tests.extend(
                manifest
                    .all_urls()
                    .filter(|url| {
                        filters.is_empty()
                            || filters
                                .iter()
                                .any(|filter| wpt_filter_matches(filter, manifest, url))
                    })
                    .map(|url| format!("{wpt_dir}/{url}")),
            );
        }
        sort_tests(&mut wpt_tests);

        log::debug!(
            "found {} non-WPT and {} WPT test(s) under {:?}",
            non_wpt_tests.len(),
            wpt_tests.len(),
            paths
        );
        non_wpt_tests.extend(wpt_tests);
        Ok(non_wpt_tests)
    }

    /// Collects test files at or under `rel_path`, which may name a file or a directory.
    fn find_non_wpt_tests(&self, rel_path: &str, found: &mut Vec<String>) -> Result<(), PortError> {
        let abs_path = self.abspath_for_test(rel_path);
        if !rel_path.is_empty() && self.fs().is_file(&abs_path) {
            let (dirname, basename) = split_test(rel_path);
            let basename = basename.trim_start_matches('/');
            if !is_skipped_directory(dirname) && is_non_wpt_test_file(dirname, basename) {
                found.push(rel_path.to_owned());
            }
            return Ok(());
        }
        if !self.fs().is_dir(&abs_path) || is_skipped_directory(rel_path) {
            return Ok(());
        }

        let names = self.fs().read_dir(&abs_path).map_err(|source| PortError::Io {
            path: abs_path.clone(),
            source,
        })?;
        for name in names {
            let child = if rel_path.is_empty() {
                name
            } else {
                format!("{rel_path}/{name}")
            };
            self.find_non_wpt_tests(&child, found)?;
        }
        Ok(())
    }

    /// Tests of virtual suites under `paths`, or of all virtual suites if `paths` is empty.
    ///
    /// A path that names a virtual suite or one of its ancestors selects the whole suite. A path
    /// under a virtual suite selects the tests under the same path below the suite's base.
    pub fn virtual_tests(&self, paths: &[&str]) -> Result<Vec<String>, PortError> {
        let mut tests = Vec::new();
        for suite in self.virtual_test_suites()? {
            let base_paths = if paths.is_empty() {
                vec![suite.base().to_owned()]
            } else {
                paths
                    .iter()
                    .map(|path| path.trim_end_matches('/'))
                    .filter_map(|path| {
                        if is_path_prefix(path, suite.name()) {
                            Some(suite.base().to_owned())
                        } else if is_test_path_prefix(suite.name(), path) {
                            let rest = &path[suite.name().trim_end_matches('/').len()..];
                            Some(format!("{}{rest}", suite.base().trim_end_matches('/')))
                        } else {
                            None
                        }
                    })
                    .unique()
                    .collect()
            };
            if base_paths.is_empty() {
                continue;
            }

            let base_paths = base_paths.iter().map(String::as_str).collect::<Vec<_>>();
            let prefix = format!("{VIRTUAL_TEST_DIR}/{}/", suite.prefix());
            tests.extend(
                self.real_tests(&base_paths)?
                    .into_iter()
                    .filter(|test| is_test_path_prefix(suite.base(), test))
                    .map(|test| format!("{prefix}{test}")),
            );
        }
        Ok(tests)
    }

    /// Directories at the top of the web tests directory.
    pub fn test_dirs(&self) -> Result<Vec<String>, PortError> {
        let web_tests_dir = self.web_tests_dir();
        let names = self
            .fs()
            .read_dir(web_tests_dir)
            .map_err(|source| PortError::Io {
                path: web_tests_dir.to_owned(),
                source,
            })?;
        Ok(names
            .into_iter()
            .filter(|name| self.fs().is_dir(&web_tests_dir.join(name)))
            .collect())
    }

    /// Whether `test_name` is a single test: a test file, a URL in a WPT manifest, or a virtual
    /// test whose base is one of those.
    pub fn test_isfile(&self, test_name: &str) -> Result<bool, PortError> {
        if let Some(base) = self.lookup_virtual_test_base(test_name)? {
            return self.test_isfile(base);
        }
        if let Some((wpt_dir, url)) = split_wpt_test(test_name) {
            if !test_name.starts_with(VIRTUAL_TEST_DIR) {
                return Ok(self.wpt_manifest(wpt_dir)?.is_test_url(url));
            }
        }
        Ok(self.fs().is_file(&self.abspath_for_test(test_name)))
    }

    /// Whether `test_name` is a directory of tests, including the directories that virtual
    /// suites are named after.
    pub fn test_isdir(&self, test_name: &str) -> Result<bool, PortError> {
        let test_name = test_name.trim_end_matches('/');
        if self.fs().is_dir(&self.abspath_for_test(test_name)) {
            return Ok(true);
        }
        let suites = self.virtual_test_suites()?;
        if suites
            .iter()
            .any(|suite| is_path_prefix(test_name, suite.name()) && test_name != suite.name())
        {
            return Ok(true);
        }
        match suites.lookup_base(test_name) {
            Some(base) => self.test_isdir(base),
            None => Ok(false),
        }
    }

    pub fn test_exists(&self, test_name: &str) -> Result<bool, PortError> {
        Ok(self.test_isfile(test_name)? || self.test_isdir(test_name)?)
    }
}

/// Whether `filter` selects the test at `url` of `manifest`, directly, through its source file,
/// or through a directory containing either.
fn wpt_filter_matches(filter: &TestFilter<'_>, manifest: &WptManifest, url: &str) -> bool {
    let wpt_dir = manifest.wpt_dir();
    let test_name = format!("{wpt_dir}/{url}");
    let source = manifest
        .file_path_for_test_url(url)
        .map(|source| format!("{wpt_dir}/{source}"));
    match filter {
        TestFilter::Path(path) => {
            *path == test_name
                || source.as_deref() == Some(*path)
                || is_path_prefix(path, &test_name)
                || source
                    .as_deref()
                    .is_some_and(|source| is_path_prefix(path, source))
        }
        TestFilter::Glob { .. } => {
            filter.matches(&test_name) || source.as_deref().is_some_and(|source| filter.matches(source))
        }
    }
}

#[cfg(test)]
use crate::port::{mock_port, write_mock_file};

#[cfg(test)]
fn port_with_tests() -> Port<crate::fs::MockFileSystem> {
    let port = mock_port(Default::default());
    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[
            {"prefix": "virtual_passes", "base": "passes", "args": ["--virtual-arg"]},
            {"prefix": "virtual_passes_two", "base": "passes_two", "args": ["--virtual-arg"]},
            {"prefix": "virtual_wpt", "base": "external/wpt", "args": ["--virtual-wpt"]},
            {"prefix": "virtual_wpt_dom", "base": "external/wpt/dom", "args": ["--virtual-wpt-dom"]},
            {"prefix": "virtual_wpt_internal", "base": "wpt_internal", "args": ["--internal"]}
        ]"#,
    );
    for path in [
        "passes/text.html",
        "passes/image.html",
        "passes/image-expected.png",
        "passes/reftest.html",
        "passes/reftest-expected.html",
        "passes/virtual_passes/test-virtual-passes.html",
        "passes/test-virtual-passes.html",
        "passes/platform/not-a-test.html",
        "passes_two/test-virtual-passes.html",
        "failures/expected/image.html",
        "failures/expected/image_checksum.html",
        "failures/expected/crash.html",
        "failures/unexpected/text-image-checksum.html",
        "userscripts/first-test.html",
        "userscripts/resources/iframe.html",
        "http/tests/devtools/a.js",
        "fast/script.js",
        "platform/foo/passes/text-expected.txt",
        "flag-specific/flag/passes/new.html",
        "virtual/virtual_passes/passes/text-expected.txt",
        "external/wpt/dom/ranges/Range-attributes.html",
        "external/wpt/dom/ranges/Range-attributes-slow.html",
        "external/wpt/console/console-is-a-namespace.any.js",
        "external/wpt/common/blank.html",
        "wpt_internal/dom/bar.html",
    ] {
        write_mock_file(&port, path, "");
    }
    write_mock_file(
        &port,
        "external/wpt/MANIFEST.json",
        crate::manifest::EXTERNAL_WPT_MANIFEST,
    );
    write_mock_file(
        &port,
        "wpt_internal/MANIFEST.json",
        crate::manifest::WPT_INTERNAL_MANIFEST,
    );
    port
}

#[cfg(test)]
const ALL_WPT: &[&str] = &[
    "external/wpt/console/console-is-a-namespace.any.html",
    "external/wpt/console/console-is-a-namespace.any.worker.html",
    "external/wpt/dom/ranges/Range-attributes-slow.html",
    "external/wpt/dom/ranges/Range-attributes.html",
    "external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L.html",
    "external/wpt/html/parse.html?run_type=uri",
    "external/wpt/html/parse.html?run_type=write",
];

#[cfg(test)]
fn sorted(mut tests: Vec<String>) -> Vec<String> {
    tests.sort();
    tests
}

#[test]
fn find_tests() {
    let port = port_with_tests();
    let tests = port.tests(&[]).unwrap();
    assert!(tests.contains(&"passes/text.html".to_owned()));
    assert!(tests.contains(&"virtual/virtual_passes/passes/text.html".to_owned()));
    assert!(tests.contains(&"http/tests/devtools/a.js".to_owned()));
    assert!(!tests.contains(&"fast/script.js".to_owned()));
    assert!(!tests.contains(&"passes/reftest-expected.html".to_owned()));
    assert!(!tests.contains(&"passes/platform/not-a-test.html".to_owned()));
    assert!(!tests.contains(&"flag-specific/flag/passes/new.html".to_owned()));
    assert!(!tests.contains(&"external/wpt/common/blank.html".to_owned()));
    assert!(!tests.contains(&"external/wpt/console/console-is-a-namespace.any.js".to_owned()));
    assert!(tests.contains(&"external/wpt/console/console-is-a-namespace.any.html".to_owned()));
    assert!(tests.contains(&"external/wpt/dom/ranges/Range-attributes.html".to_owned()));

    assert_eq!(port.tests(&["failures/expected/image.html"]).unwrap().len(), 1);
    assert_eq!(
        port.tests(&["failures/expected/im*"]).unwrap(),
        [
            "failures/expected/image.html",
            "failures/expected/image_checksum.html"
        ]
    );
    assert_eq!(
        port.tests(&["failures/*"]).unwrap().len(),
        4,
        "a glob matching directories selects everything in them"
    );
}

#[test]
fn find_with_skipped_directories() {
    let port = port_with_tests();
    let tests = port.tests(&["userscripts"]).unwrap();
    assert_eq!(tests, ["userscripts/first-test.html"]);
    assert!(port.tests(&["userscripts/resources"]).unwrap().is_empty());
    assert!(port
        .tests(&["userscripts/resources/iframe.html"])
        .unwrap()
        .is_empty());
}

#[test]
fn non_wpt_tests_are_naturally_sorted() {
    let port = port_with_tests();
    for path in ["order/test10.html", "order/test2.html", "order/sub/test1.html", "order/test1.html"] {
        write_mock_file(&port, path, "");
    }
    assert_eq!(
        port.tests(&["order"]).unwrap(),
        [
            "order/test1.html",
            "order/test2.html",
            "order/test10.html",
            "order/sub/test1.html",
        ]
    );
}

#[test]
fn wpt_tests_paths() {
    let port = port_with_tests();
    let tests = |paths: &[&str]| port.tests(paths).unwrap();

    // `test.any.js` shows up on the file system as one file, but it becomes two tests.
    for path in ["external", "external/", "external/wpt", "external/wpt/"] {
        assert_eq!(sorted(tests(&[path])), ALL_WPT, "{path:?}");
    }
    assert!(tests(&["external/csswg-test"]).is_empty());
    for path in [
        "external/wpt/console",
        "external/wpt/console/",
        "external/wpt/console/console-is-a-namespace.any.js",
    ] {
        assert_eq!(
            tests(&[path]),
            [
                "external/wpt/console/console-is-a-namespace.any.html",
                "external/wpt/console/console-is-a-namespace.any.worker.html",
            ],
            "{path:?}"
        );
    }
    assert_eq!(
        tests(&["external/wpt/console/console-is-a-namespace.any.html"]),
        ["external/wpt/console/console-is-a-namespace.any.html"]
    );
    for path in ["external/wpt/dom", "external/wpt/dom/"] {
        assert_eq!(
            tests(&[path]),
            [
                "external/wpt/dom/ranges/Range-attributes-slow.html",
                "external/wpt/dom/ranges/Range-attributes.html",
            ]
        );
    }
    assert_eq!(
        tests(&["external/wpt/dom/ranges/Range-attributes.html"]),
        ["external/wpt/dom/ranges/Range-attributes.html"]
    );
    assert_eq!(
        tests(&["external/wpt/html/parse.html"]),
        [
            "external/wpt/html/parse.html?run_type=uri",
            "external/wpt/html/parse.html?run_type=write",
        ]
    );
    assert_eq!(
        tests(&["external/wpt/html/parse.html?run_type=write"]),
        ["external/wpt/html/parse.html?run_type=write"]
    );
    assert_eq!(
        tests(&["external/wpt/console/*.worker.html"]),
        ["external/wpt/console/console-is-a-namespace.any.worker.html"]
    );

    assert_eq!(tests(&["wpt_internal"]), ["wpt_internal/dom/bar.html"]);
}

#[test]
fn virtual_wpt_tests_paths() {
    let port = port_with_tests();
    let tests = |paths: &[&str]| port.tests(paths).unwrap();
    let all_virtual_wpt = ALL_WPT
        .iter()
        .map(|test| format!("virtual/virtual_wpt/{test}"))
        .collect::<Vec<_>>();
    let dom_wpt = [
        "virtual/virtual_wpt_dom/external/wpt/dom/ranges/Range-attributes-slow.html",
        "virtual/virtual_wpt_dom/external/wpt/dom/ranges/Range-attributes.html",
    ];

    assert_eq!(sorted(tests(&["virtual/virtual_wpt/external/"])), all_virtual_wpt);
    assert_eq!(sorted(tests(&["virtual/virtual_wpt/external/wpt/"])), all_virtual_wpt);
    // Ordered by test key, which puts `.any.html` before `.any.worker.html`.
    assert_eq!(
        tests(&["virtual/virtual_wpt/external/wpt/console"]),
        [
            "virtual/virtual_wpt/external/wpt/console/console-is-a-namespace.any.html",
            "virtual/virtual_wpt/external/wpt/console/console-is-a-namespace.any.worker.html",
        ]
    );

    assert_eq!(tests(&["virtual/virtual_wpt_dom/external/wpt/dom/"]), dom_wpt);
    assert_eq!(tests(&["virtual/virtual_wpt_dom/external/wpt/dom/ranges/"]), dom_wpt);
    assert_eq!(tests(&["virtual/virtual_wpt_dom/"]), dom_wpt);
    assert_eq!(
        tests(&["virtual/virtual_wpt_dom/external/wpt/dom/ranges/Range-attributes.html"]),
        ["virtual/virtual_wpt_dom/external/wpt/dom/ranges/Range-attributes.html"]
    );

    assert_eq!(
        tests(&["virtual/virtual_wpt_internal/wpt_internal"]),
        ["virtual/virtual_wpt_internal/wpt_internal/dom/bar.html"]
    );
}

#[test]
fn virtual_suite_of_one_test_holds_its_variants() {
    let port = mock_port(Default::default());
    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[{"prefix": "parse", "base": "external/wpt/html/parse.html", "args": ["--parse"]}]"#,
    );
    write_mock_file(
        &port,
        "external/wpt/MANIFEST.json",
        crate::manifest::EXTERNAL_WPT_MANIFEST,
    );
    write_mock_file(&port, "external/wpt/html/parse_run_type=write-expected.txt", "");

    let test = "virtual/parse/external/wpt/html/parse.html?run_type=write";
    assert_eq!(
        port.lookup_virtual_test_base(test).unwrap(),
        Some("external/wpt/html/parse.html?run_type=write")
    );
    assert_eq!(
        sorted(port.virtual_tests(&["virtual/parse"]).unwrap()),
        [
            "virtual/parse/external/wpt/html/parse.html?run_type=uri",
            "virtual/parse/external/wpt/html/parse.html?run_type=write",
        ]
    );
    assert_eq!(
        port.virtual_tests(&[test]).unwrap(),
        ["virtual/parse/external/wpt/html/parse.html?run_type=write"]
    );
    assert!(port.test_isfile(test).unwrap());
    assert_eq!(
        port.expected_filename(test, ".txt", Default::default()).unwrap(),
        Some(camino::Utf8PathBuf::from(format!(
            "{}/external/wpt/html/parse_run_type=write-expected.txt",
            crate::port::MOCK_WEB_TESTS
        )))
    );
}

#[test]
fn virtual_tests() {
    let port = port_with_tests();

    let tests = port.tests(&["passes"]).unwrap();
    assert!(tests.contains(&"passes/text.html".to_owned()));
    assert!(tests.contains(&"passes/virtual_passes/test-virtual-passes.html".to_owned()));
    assert!(!tests.contains(&"virtual/virtual_passes/passes/text.html".to_owned()));

    for path in ["virtual/virtual_passes", "virtual/virtual_passes/"] {
        let tests = port.tests(&[path]).unwrap();
        assert!(tests.contains(&"virtual/virtual_passes/passes/test-virtual-passes.html".to_owned()));
        assert!(!tests.contains(&"passes/test-virtual-passes.html".to_owned()));
    }

    let tests = port.tests(&["virtual"]).unwrap();
    assert!(tests.contains(&"virtual/virtual_passes/passes/test-virtual-passes.html".to_owned()));
    assert!(
        tests.contains(&"virtual/virtual_passes_two/passes_two/test-virtual-passes.html".to_owned())
    );

    let tests = port.tests(&["virtual/virtual_passes/passes"]).unwrap();
    assert!(!tests.contains(&"passes/text.html".to_owned()));
    assert!(tests.contains(&"virtual/virtual_passes/passes/test-virtual-passes.html".to_owned()));
    assert!(
        !tests.contains(&"virtual/virtual_passes_two/passes_two/test-virtual-passes.html".to_owned())
    );
    assert!(!tests.contains(&"passes/test-virtual-passes.html".to_owned()));
    assert!(!tests
        .contains(&"virtual/virtual_passes/passes/virtual_passes/passes/test-virtual-passes.html".to_owned()));
    assert!(tests
        .contains(&"virtual/virtual_passes/passes/virtual_passes/test-virtual-passes.html".to_owned()));

    assert_eq!(
        port.tests(&["virtual/virtual_passes/passes/text.html"]).unwrap(),
        ["virtual/virtual_passes/passes/text.html"]
    );
    assert!(port.tests(&["virtual/nonexistent"]).unwrap().is_empty());
}

#[test]
fn test_isfile_and_isdir() {
    let port = port_with_tests();
    let isfile = |test: &str| port.test_isfile(test).unwrap();
    let isdir = |test: &str| port.test_isdir(test).unwrap();
    let exists = |test: &str| port.test_exists(test).unwrap();

    assert!(exists("passes"));
    assert!(exists("passes/text.html"));
    assert!(!exists("passes/does_not_exist.html"));
    assert!(exists("virtual"));
    assert!(!exists("virtual/does_not_exist.html"));
    assert!(exists("virtual/virtual_passes/passes/text.html"));

    assert!(!isfile("passes"));
    assert!(isfile("passes/text.html"));
    assert!(!isfile("passes/does_not_exist.html"));
    assert!(!isfile("virtual"));
    assert!(isfile("virtual/virtual_passes/passes/text.html"));
    assert!(!isfile("virtual/does_not_exist.html"));
    assert!(isfile("external/wpt/console/console-is-a-namespace.any.worker.html"));
    assert!(isfile("external/wpt/html/parse.html?run_type=uri"));
    assert!(!isfile("external/wpt/common/blank.html"));
    assert!(isfile(
        "virtual/virtual_wpt/external/wpt/console/console-is-a-namespace.any.html"
    ));

    assert!(isdir("passes"));
    assert!(!isdir("passes/text.html"));
    assert!(!isdir("passes/does_not_exist.html"));
    assert!(!isdir("passes/does_not_exist/"));
    assert!(isdir("virtual"));
    assert!(isdir("virtual/virtual_passes"));
    assert!(isdir("virtual/virtual_passes/passes"));
    assert!(!isdir("virtual/does_not_exist.html"));
    assert!(!isdir("virtual/does_not_exist/"));
    assert!(!isdir("virtual/virtual_passes/passes/text.html"));
}

#[test]
fn test_dirs() {
    let port = port_with_tests();
    let dirs = port.test_dirs().unwrap();
    assert!(dirs.contains(&"passes".to_owned()));
    assert!(dirs.contains(&"external".to_owned()));
    assert!(!dirs.contains(&"VirtualTestSuites".to_owned()));
}

#[test]
fn invalid_globs() {
    let port = port_with_tests();
    assert!(matches!(
        port.tests(&["passes/{a,*"]),
        Err(PortError::Glob(_))
    ));
}
