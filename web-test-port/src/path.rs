//! Pure classification of test names and paths relative to the web tests root.
//!
//! Test names always use `/` as their separator, regardless of platform. A test name may:
//!
//! - be _virtual_, i.e., start with `virtual/<prefix>/`, in which case it names the same test as
//!   the remainder of the name, but run with different command-line arguments (see
//!   [`crate::virtual_suite`]).
//! - live in one of the [`WPT_DIRS`], in which case it is a URL generated from a WPT manifest
//!   (see [`crate::manifest`]) and may carry a query string, like `html/parse.html?run_type=uri`.

/// Directories (relative to the web tests root) whose tests are enumerated by a WPT manifest
/// rather than by listing files, paired with the URL prefix their tests are served under.
///
/// Keys have no trailing slash; only the last URL prefix is the bare `/`.
pub const WPT_DIRS: &[(&str, &str)] = &[("wpt_internal", "/wpt_internal/"), ("external/wpt", "/")];

/// The directory namespace of virtual tests.
pub const VIRTUAL_TEST_DIR: &str = "virtual";

/// Extensions of files that are collected as tests outside of [`WPT_DIRS`].
pub const SUPPORTED_TEST_EXTENSIONS: &[&str] = &[
    ".html", ".xml", ".xhtml", ".xht", ".pl", ".htm", ".php", ".svg", ".mht", ".pdf",
];

/// Directories whose `.js` files are tests in their own right.
const SCRIPT_TEST_DIR_MARKERS: &[&str] = &["devtools", "inspector-protocol"];

/// Splits `virtual/<prefix>/<rest>` into `(prefix, rest)`.
pub fn split_virtual_prefix(test_name: &str) -> Option<(&str, &str)> {
    let rest = test_name.strip_prefix(VIRTUAL_TEST_DIR)?.strip_prefix('/')?;
    match rest.split_once('/') {
        Some((prefix, rest)) if !prefix.is_empty() => Some((prefix, rest)),
        _ => None,
    }
}

/// Strips a leading `virtual/<prefix>/` segment, if any.
pub fn devirtualize(test_name: &str) -> &str {
    split_virtual_prefix(test_name).map_or(test_name, |(_prefix, rest)| rest)
}

/// Splits a (possibly virtual) WPT test name into its WPT directory (one of the keys of
/// [`WPT_DIRS`]) and the path inside of it.
pub fn split_wpt_test(test_name: &str) -> Option<(&'static str, &str)> {
    let test_name = devirtualize(test_name);
    WPT_DIRS.iter().find_map(|&(wpt_dir, _url_prefix)| {
        test_name
            .strip_prefix(wpt_dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|path_in_wpt| (wpt_dir, path_in_wpt))
    })
}

pub fn is_wpt_test(test_name: &str) -> bool {
    split_wpt_test(test_name).is_some()
}

/// Whether the test must be served by `wptserve`. `wpt_internal` tests run through the WPT
/// harness, but are served like any other web test.
pub fn should_use_wptserve(test_name: &str) -> bool {
    matches!(split_wpt_test(test_name), Some(("external/wpt", _)))
}

/// Returns the URL prefix a WPT directory's tests are served under.
pub fn wpt_url_prefix(wpt_dir: &str) -> Option<&'static str> {
    WPT_DIRS
        .iter()
        .find(|&&(dir, _)| dir == wpt_dir)
        .map(|&(_, url_prefix)| url_prefix)
}

/// Whether `ancestor` is `path` or one of its parent directories, comparing whole `/`-separated
/// components. The empty string is the ancestor of every path.
pub fn is_path_prefix(ancestor: &str, path: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    ancestor.is_empty()
        || path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Like [`is_path_prefix`], but a test named by `ancestor` also covers its query string
/// variants, so `html/parse.html` covers `html/parse.html?run_type=uri`.
pub fn is_test_path_prefix(ancestor: &str, path: &str) -> bool {
    is_path_prefix(ancestor, path)
        || path
            .strip_prefix(ancestor.trim_end_matches('/'))
            .is_some_and(|rest| rest.starts_with('?'))
}

/// Iterates over `path` and then each of its ancestors, nearest first.
pub fn self_and_ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::once(path).chain(path.rmatch_indices('/').map(move |(idx, _)| &path[..idx]))
}

/// Splits a path into its stem and extension following the conventions of Python's
/// `os.path.splitext`: the extension starts at the last `.` of the last component, unless that
/// component consists only of leading dots up to that point.
pub fn splitext(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |idx| idx + 1);
    let name = &path[name_start..];
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => {
            let dot = name_start + dot;
            (&path[..dot], &path[dot..])
        }
        _ => (path, ""),
    }
}

/// Splits a test name into its directory and its base name. The base name keeps its leading
/// separator, so that `a/b` and `ab` sort apart from each other in [`crate::natural_sort`].
pub fn split_test(test_name: &str) -> (&str, &str) {
    match test_name.rfind('/') {
        Some(idx) if idx >= 1 => (&test_name[..idx], &test_name[idx..]),
        _ => ("", test_name),
    }
}

/// Computes the name of an output file (a baseline, an actual result, a diff…) for a test.
///
/// The test's extension is replaced by `suffix` + `extension`. A query string is kept, with
/// every character except ASCII alphanumerics, `=`, `_` and `.` replaced by `_`.
///
/// ```
/// # use web_test_port::path::output_filename;
/// assert_eq!(
///     output_filename("fast/test.html?wss&run_type=1", "-expected", ".txt"),
///     "fast/test_wss_run_type=1-expected.txt",
/// );
/// ```
pub fn output_filename(test_name: &str, suffix: &str, extension: &str) -> String {
    let (path, query) = match test_name.find('?') {
        Some(idx) => test_name.split_at(idx),
        None => (test_name, ""),
    };
    let (stem, _extension) = splitext(path);
    let sanitized_query = query.chars().map(|c| match c {
        'A'..='Z' | 'a'..='z' | '0'..='9' | '=' | '_' | '.' => c,
        _ => '_',
    });

    let mut filename = String::with_capacity(test_name.len() + suffix.len() + extension.len());
    filename.push_str(stem);
    filename.extend(sanitized_query);
    filename.push_str(suffix);
    filename.push_str(extension);
    filename
}

/// Whether a file is a reference or expectation of another test, judging by its name alone.
pub fn is_reference_file(filename: &str) -> bool {
    if filename.starts_with("ref-") || filename.starts_with("notref-") {
        return true;
    }
    let (stem, _extension) = splitext(filename);
    ["-expected", "-expected-mismatch", "-ref", "-notref"]
        .iter()
        .any(|suffix| stem.ends_with(suffix))
}

fn has_supported_test_extension(dirname: &str, filename: &str) -> bool {
    let (_stem, extension) = splitext(filename);
    if extension == ".js" {
        return SCRIPT_TEST_DIR_MARKERS
            .iter()
            .any(|marker| dirname.contains(marker));
    }
    SUPPORTED_TEST_EXTENSIONS.contains(&extension)
}

/// Whether `filename` in `dirname` (relative to the web tests root) is a test that is collected
/// by listing files. Files in [`WPT_DIRS`] are never such tests: their manifest decides instead.
pub fn is_non_wpt_test_file(dirname: &str, filename: &str) -> bool {
    let dirname = dirname.trim_matches('/');
    if WPT_DIRS
        .iter()
        .any(|&(wpt_dir, _)| is_path_prefix(wpt_dir, dirname))
    {
        return false;
    }
    has_supported_test_extension(dirname, filename) && !is_reference_file(filename)
}

#[test]
fn wpt_dirs_shape() {
    for (wpt_dir, _) in WPT_DIRS {
        assert!(!wpt_dir.ends_with('/'));
    }
    let (last, rest) = WPT_DIRS.split_last().unwrap();
    for (_, url_prefix) in rest {
        assert_ne!(*url_prefix, "/");
    }
    assert_eq!(last.1, "/");
}

#[test]
fn split_wpt_tests() {
    assert_eq!(
        split_wpt_test("external/wpt/foo/bar.html"),
        Some(("external/wpt", "foo/bar.html"))
    );
    assert_eq!(
        split_wpt_test("virtual/test/external/wpt/foo/bar.html"),
        Some(("external/wpt", "foo/bar.html"))
    );
    assert_eq!(
        split_wpt_test("wpt_internal/foo/bar.html"),
        Some(("wpt_internal", "foo/bar.html"))
    );
    assert_eq!(
        split_wpt_test("virtual/test/wpt_internal/foo/bar.html"),
        Some(("wpt_internal", "foo/bar.html"))
    );
    assert_eq!(split_wpt_test("external/wpt_automation/foo.html"), None);
}

#[test]
fn wpt_classification() {
    assert!(is_wpt_test("external/wpt/dom/ranges/Range-attributes.html"));
    assert!(is_wpt_test(
        "external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L.html"
    ));
    assert!(!is_wpt_test("dom/domparsing/namespaces-1.html"));
    assert!(!is_wpt_test("rutabaga"));

    assert!(is_wpt_test("virtual/a-name/external/wpt/baz/qux.htm"));
    assert!(!is_wpt_test("virtual/external/wpt/baz/qux.htm"));
    assert!(!is_wpt_test("not-virtual/a-name/external/wpt/baz/qux.htm"));

    assert!(should_use_wptserve("external/wpt/dom/interfaces.html"));
    assert!(should_use_wptserve(
        "virtual/a-name/external/wpt/dom/interfaces.html"
    ));
    assert!(!should_use_wptserve("wpt_internal/dom/bar.html"));
    assert!(!should_use_wptserve("harness-tests/wpt/console_logging.html"));
    assert!(!should_use_wptserve("dom/domparsing/namespaces-1.html"));
}

#[test]
fn output_filenames() {
    let test_file = "fast/test.html";
    assert_eq!(
        output_filename(test_file, "-expected", ".txt"),
        "fast/test-expected.txt"
    );
    assert_eq!(
        output_filename(test_file, "-expected-mismatch", ".png"),
        "fast/test-expected-mismatch.png"
    );

    let test_file = "fast/test.html?wss&run_type=1";
    assert_eq!(
        output_filename(test_file, "-expected", ".txt"),
        "fast/test_wss_run_type=1-expected.txt"
    );
    assert_eq!(
        output_filename(test_file, "-actual", ".png"),
        "fast/test_wss_run_type=1-actual.png"
    );

    let test_file = "fast/test.html?include=HTML.*";
    assert_eq!(
        output_filename(test_file, "-expected", ".txt"),
        "fast/test_include=HTML._-expected.txt"
    );
    assert_eq!(
        output_filename(test_file, "-actual", ".png"),
        "fast/test_include=HTML._-actual.png"
    );

    assert_eq!(
        output_filename("console/console-is-a-namespace.any.worker.html", "-expected", ".txt"),
        "console/console-is-a-namespace.any.worker-expected.txt"
    );
}

#[test]
fn splitext_like_python() {
    assert_eq!(splitext("fast/test.html"), ("fast/test", ".html"));
    assert_eq!(splitext("fast/test"), ("fast/test", ""));
    assert_eq!(splitext("fast.dir/test"), ("fast.dir/test", ""));
    assert_eq!(splitext("a/.hidden"), ("a/.hidden", ""));
    assert_eq!(splitext("a/..b.c"), ("a/..b", ".c"));
    assert_eq!(splitext("a.any.js"), ("a.any", ".js"));
}

#[test]
fn non_wpt_test_files() {
    assert!(is_non_wpt_test_file("", "foo.html"));
    assert!(is_non_wpt_test_file("", "foo.svg"));
    assert!(is_non_wpt_test_file("", "test-ref-test.html"));
    assert!(is_non_wpt_test_file("devtools", "a.js"));
    assert!(is_non_wpt_test_file("http/tests/inspector-protocol/dom", "a.js"));
    assert!(!is_non_wpt_test_file("fast", "a.js"));
    assert!(!is_non_wpt_test_file("", "foo.png"));
    assert!(!is_non_wpt_test_file("", "foo-expected.html"));
    assert!(!is_non_wpt_test_file("", "foo-expected.svg"));
    assert!(!is_non_wpt_test_file("", "foo-expected.xht"));
    assert!(!is_non_wpt_test_file("", "foo-expected-mismatch.html"));
    assert!(!is_non_wpt_test_file("", "foo-expected-mismatch.svg"));
    assert!(!is_non_wpt_test_file("", "foo-expected-mismatch.xhtml"));
    assert!(!is_non_wpt_test_file("", "foo-ref.html"));
    assert!(!is_non_wpt_test_file("", "foo-notref.html"));
    assert!(!is_non_wpt_test_file("", "foo-notref.xht"));
    assert!(!is_non_wpt_test_file("", "foo-ref.xhtml"));
    assert!(!is_non_wpt_test_file("", "ref-foo.html"));
    assert!(!is_non_wpt_test_file("", "notref-foo.xhr"));

    assert!(!is_non_wpt_test_file("external/wpt/common", "blank.html"));
    assert!(!is_non_wpt_test_file(
        "external/wpt/console",
        "console-is-a-namespace.any.js"
    ));
    assert!(!is_non_wpt_test_file("external/wpt", "testharness_runner.html"));
    // `wpt_automation` is only a sibling of `wpt`, so its files are collected like any other.
    assert!(is_non_wpt_test_file("external/wpt_automation", "foo.html"));
    assert!(!is_non_wpt_test_file(
        "wpt_internal/console",
        "console-is-a-namespace.any.js"
    ));
}

#[test]
fn path_prefixes() {
    assert!(is_path_prefix("", "a/b"));
    assert!(is_path_prefix("a", "a/b"));
    assert!(is_path_prefix("a/", "a/b"));
    assert!(is_path_prefix("a/b", "a/b"));
    assert!(!is_path_prefix("a/b", "a/b?x=1"));
    assert!(is_path_prefix("html", "html/parse.html?run_type=uri"));
    assert!(!is_path_prefix("a/b", "a/bc"));
    assert!(!is_path_prefix("a/b/c", "a/b"));

    assert!(is_test_path_prefix("a/b", "a/b?x=1"));
    assert!(is_test_path_prefix("a", "a/b?x=1"));
    assert!(is_test_path_prefix("a/b", "a/b"));
    assert!(!is_test_path_prefix("a/b", "a/bc?x=1"));
    assert!(!is_test_path_prefix("a/b?x=1", "a/b"));

    assert_eq!(
        self_and_ancestors("a/b/c").collect::<Vec<_>>(),
        ["a/b/c", "a/b", "a"]
    );
}

#[test]
fn virtual_prefixes() {
    assert_eq!(
        split_virtual_prefix("virtual/flag/fast/test.html"),
        Some(("flag", "fast/test.html"))
    );
    assert_eq!(split_virtual_prefix("virtual/flag"), None);
    assert_eq!(split_virtual_prefix("virtual//fast"), None);
    assert_eq!(split_virtual_prefix("virtualized/flag/fast"), None);
    assert_eq!(devirtualize("fast/test.html"), "fast/test.html");
    assert_eq!(devirtualize("virtual/flag/fast/test.html"), "fast/test.html");
}
