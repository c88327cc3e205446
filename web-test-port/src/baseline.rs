//! Resolution of the expected output ("baseline") of a test through the baseline search path.
//!
//! For a test `fast/test.html` and an extension `.txt`, the baseline is named
//! `fast/test-expected.txt` (or `fast/test-expected-mismatch.txt` for mismatch references), and
//! is looked up in each directory of [`Port::baseline_search_path`], and finally in the web tests
//! directory itself. The first directory that has it wins.

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::{
    fs::FileSystem,
    manifest::Relation,
    path::{output_filename, split_wpt_test},
    port::{Port, PortError},
};

/// Extensions that references of non-WPT tests may have, in order of preference.
pub const REFERENCE_EXTENSIONS: &[&str] = &[".svg", ".xht", ".html"];

/// A baseline and the directory it was found in. A `search_root` of `None` means that no
/// baseline exists yet, and `path` is where a new generic one would go.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Baseline {
    pub search_root: Option<Utf8PathBuf>,
    /// Relative to `search_root`.
    pub path: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExpectedFilenameOptions {
    /// Return the path of a new generic baseline when none exists.
    pub return_default: bool,
    /// Resolve the base test of a virtual test that has no baseline of its own.
    pub fallback_base_for_virtual: bool,
    pub relation: Relation,
}

impl Default for ExpectedFilenameOptions {
    fn default() -> Self {
        Self {
            return_default: true,
            fallback_base_for_virtual: true,
            relation: Relation::Match,
        }
    }
}

fn baseline_suffix(relation: Relation) -> &'static str {
    match relation {
        Relation::Match => "-expected",
        Relation::Mismatch => "-expected-mismatch",
    }
}

impl<Fs> Port<Fs>
where
    Fs: FileSystem,
{
    /// Directories searched for baselines before the web tests directory, most specific first:
    /// additional platform directories (the last one specified first), then, if there is a
    /// primary driver flag, the flag-specific platform directories followed by the flag-specific
    /// directory, and finally the platform directories of the fallback chain.
    pub fn baseline_search_path(&self) -> Result<Vec<Utf8PathBuf>, PortError> {
        let web_tests_dir = self.web_tests_dir();
        let fallback_chain = &self.config().fallback_chain;

        let mut search_path = self
            .options()
            .additional_platform_directory
            .iter()
            .rev()
            .cloned()
            .collect::<Vec<_>>();

        if let Some(flag) = self.flag_specific_config_name()? {
            let flag_dir = web_tests_dir.join("flag-specific").join(flag);
            search_path.extend(
                fallback_chain
                    .iter()
                    .map(|platform| flag_dir.join("platform").join(platform)),
            );
            search_path.push(flag_dir);
        }

        search_path.extend(
            fallback_chain
                .iter()
                .map(|platform| web_tests_dir.join("platform").join(platform)),
        );

        Ok(search_path)
    }

    /// The directory that new baselines for this configuration go into.
    pub fn baseline_version_dir(&self) -> Result<Utf8PathBuf, PortError> {
        Ok(self
            .baseline_search_path()?
            .into_iter()
            .next()
            .unwrap_or_else(|| self.web_tests_dir().to_owned()))
    }

    /// The existing baselines of `test_name`, most specific first. Only the first is returned
    /// unless `all_baselines` is set, and a single placeholder with no `search_root` is returned
    /// when there are none.
    ///
    /// Virtual tests are resolved under their own name only. See [`Self::expected_filename`] for
    /// lookups that fall back to the base test.
    pub fn expected_baselines(
        &self,
        test_name: &str,
        extension: &str,
        relation: Relation,
        all_baselines: bool,
    ) -> Result<Vec<Baseline>, PortError> {
        let baseline_filename = output_filename(test_name, baseline_suffix(relation), extension);

        let mut search_path = self.baseline_search_path()?;
        search_path.push(self.web_tests_dir().to_owned());

        let mut baselines = Vec::new();
        for search_root in search_path {
            if self.fs().exists(&search_root.join(&baseline_filename)) {
                log::trace!("found {baseline_filename} in {search_root}");
                baselines.push(Baseline {
                    search_root: Some(search_root),
                    path: baseline_filename.clone(),
                });
                if !all_baselines {
                    break;
                }
            }
        }

        if baselines.is_empty() {
            baselines.push(Baseline {
                search_root: None,
                path: baseline_filename,
            });
        }
        Ok(baselines)
    }

    /// The absolute path of the baseline a test's output is compared against.
    pub fn expected_filename(
        &self,
        test_name: &str,
        extension: &str,
        options: ExpectedFilenameOptions,
    ) -> Result<Option<Utf8PathBuf>, PortError> {
        let ExpectedFilenameOptions {
            return_default,
            fallback_base_for_virtual,
            relation,
        } = options;

        let mut baselines = self.expected_baselines(test_name, extension, relation, false)?;
        let Baseline { search_root, path } = baselines.remove(0);
        if let Some(search_root) = search_root {
            return Ok(Some(search_root.join(path)));
        }

        if fallback_base_for_virtual {
            if let Some(base) = self.lookup_virtual_test_base(test_name)? {
                return self.expected_filename(base, extension, options);
            }
        }

        Ok(return_default.then(|| self.web_tests_dir().join(path)))
    }

    /// The baseline that would be used if the one currently used were removed.
    ///
    /// Nothing is returned when only one baseline exists for a non-virtual test, even when that
    /// baseline is platform-specific.
    pub fn fallback_expected_filename(
        &self,
        test_name: &str,
        extension: &str,
    ) -> Result<Option<Utf8PathBuf>, PortError> {
        let baselines = self.expected_baselines(test_name, extension, Relation::Match, true)?;
        match baselines.get(1) {
            Some(Baseline {
                search_root: Some(search_root),
                path,
            }) => Ok(Some(search_root.join(path))),
            _ => match self.lookup_virtual_test_base(test_name)? {
                Some(base) => self.expected_filename(
                    base,
                    extension,
                    ExpectedFilenameOptions {
                        return_default: false,
                        ..Default::default()
                    },
                ),
                None => Ok(None),
            },
        }
    }

    /// The references a test's rendering is compared to, along with how they are compared.
    ///
    /// WPT tests take theirs from the manifest. Other tests use their `-expected` and
    /// `-expected-mismatch` baselines of any of the [`REFERENCE_EXTENSIONS`].
    pub fn reference_files(&self, test_name: &str) -> Result<Vec<(Relation, Utf8PathBuf)>, PortError> {
        if let Some((wpt_dir, url)) = split_wpt_test(test_name) {
            let references = self
                .wpt_manifest(wpt_dir)?
                .reference_paths(url)
                .into_iter()
                .map(|(relation, path)| (relation, self.web_tests_dir().join(path)))
                .collect();
            return Ok(references);
        }

        let mut references = Vec::new();
        for relation in [Relation::Match, Relation::Mismatch] {
            for extension in REFERENCE_EXTENSIONS {
                let options = ExpectedFilenameOptions {
                    return_default: false,
                    fallback_base_for_virtual: true,
                    relation,
                };
                if let Some(path) = self.expected_filename(test_name, extension, options)? {
                    if self.fs().exists(&path) {
                        references.push((relation, path));
                    }
                }
            }
        }
        Ok(references)
    }
}

#[cfg(test)]
use crate::port::{mock_port, write_mock_file, PortOptions, MOCK_WEB_TESTS};

#[cfg(test)]
fn mock_path(rel: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{MOCK_WEB_TESTS}/{rel}"))
}

#[cfg(test)]
const NO_DEFAULT: ExpectedFilenameOptions = ExpectedFilenameOptions {
    return_default: false,
    fallback_base_for_virtual: true,
    relation: Relation::Match,
};

#[cfg(test)]
fn found(search_root: impl Into<Utf8PathBuf>, path: &str) -> Vec<Baseline> {
    vec![Baseline {
        search_root: Some(search_root.into()),
        path: path.to_owned(),
    }]
}

#[cfg(test)]
fn not_found(path: &str) -> Vec<Baseline> {
    vec![Baseline {
        search_root: None,
        path: path.to_owned(),
    }]
}

#[test]
fn expected_baselines_basic() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "VirtualTestSuites", "[]");
    let test_file = "fast/test.html";
    let expected = |options: ExpectedFilenameOptions| port.expected_filename(test_file, ".txt", options).unwrap();

    // The default baseline doesn't exist.
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        not_found("fast/test-expected.txt")
    );
    assert_eq!(expected(NO_DEFAULT), None);
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("fast/test-expected.txt"))
    );
    assert_eq!(port.fallback_expected_filename(test_file, ".txt").unwrap(), None);

    // The default baseline exists.
    write_mock_file(&port, "fast/test-expected.txt", "foo");
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found(MOCK_WEB_TESTS, "fast/test-expected.txt")
    );
    assert_eq!(expected(NO_DEFAULT), Some(mock_path("fast/test-expected.txt")));
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("fast/test-expected.txt"))
    );
    assert_eq!(port.fallback_expected_filename(test_file, ".txt").unwrap(), None);
}

#[test]
fn expected_baselines_mismatch() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "VirtualTestSuites", "[]");
    let test_file = "fast/test.html";

    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Mismatch, false)
            .unwrap(),
        not_found("fast/test-expected-mismatch.txt")
    );
    assert_eq!(
        port.expected_filename(
            test_file,
            ".txt",
            ExpectedFilenameOptions {
                relation: Relation::Mismatch,
                ..Default::default()
            }
        )
        .unwrap(),
        Some(mock_path("fast/test-expected-mismatch.txt"))
    );
}

#[test]
fn expected_baselines_platform_specific() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "VirtualTestSuites", "[]");
    let test_file = "fast/test.html";
    let expected = |options: ExpectedFilenameOptions| port.expected_filename(test_file, ".txt", options).unwrap();

    assert_eq!(port.baseline_version_dir().unwrap(), mock_path("platform/foo"));
    write_mock_file(&port, "platform/foo/fast/test-expected.txt", "foo");

    // The default baseline doesn't exist.
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found(mock_path("platform/foo"), "fast/test-expected.txt")
    );
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );
    assert_eq!(
        expected(NO_DEFAULT),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );
    assert_eq!(port.fallback_expected_filename(test_file, ".txt").unwrap(), None);

    // The default baseline exists.
    write_mock_file(&port, "fast/test-expected.txt", "foo");
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found(mock_path("platform/foo"), "fast/test-expected.txt")
    );
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );
    assert_eq!(
        port.fallback_expected_filename(test_file, ".txt").unwrap(),
        Some(mock_path("fast/test-expected.txt"))
    );

    insta::assert_debug_snapshot!(
        port.expected_baselines(test_file, ".txt", Relation::Match, true).unwrap(),
        @r###"
    [
        Baseline {
            search_root: Some(
                "/mock-checkout/third_party/blink/web_tests/platform/foo",
            ),
            path: "fast/test-expected.txt",
        },
        Baseline {
            search_root: Some(
                "/mock-checkout/third_party/blink/web_tests",
            ),
            path: "fast/test-expected.txt",
        },
    ]
    "###
    );
}

#[test]
fn expected_baselines_flag_specific() {
    let port = mock_port(PortOptions {
        additional_driver_flag: vec!["--special-flag".to_owned()],
        ..Default::default()
    });
    write_mock_file(&port, "VirtualTestSuites", "[]");
    let test_file = "fast/test.html";
    let expected = |options: ExpectedFilenameOptions| port.expected_filename(test_file, ".txt", options).unwrap();

    assert_eq!(
        port.baseline_search_path().unwrap(),
        [
            mock_path("flag-specific/special-flag/platform/foo"),
            mock_path("flag-specific/special-flag"),
            mock_path("platform/foo"),
        ]
    );
    assert_eq!(
        port.baseline_version_dir().unwrap(),
        mock_path("flag-specific/special-flag/platform/foo")
    );

    // Flag-specific baseline
    write_mock_file(&port, "platform/foo/fast/test-expected.txt", "foo");
    write_mock_file(&port, "flag-specific/special-flag/fast/test-expected.txt", "foo");
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found(mock_path("flag-specific/special-flag"), "fast/test-expected.txt")
    );
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("flag-specific/special-flag/fast/test-expected.txt"))
    );
    assert_eq!(
        expected(NO_DEFAULT),
        Some(mock_path("flag-specific/special-flag/fast/test-expected.txt"))
    );
    assert_eq!(
        port.fallback_expected_filename(test_file, ".txt").unwrap(),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );

    // Flag-specific platform-specific baseline
    write_mock_file(
        &port,
        "flag-specific/special-flag/platform/foo/fast/test-expected.txt",
        "foo",
    );
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found(
            mock_path("flag-specific/special-flag/platform/foo"),
            "fast/test-expected.txt"
        )
    );
    assert_eq!(
        expected(Default::default()),
        Some(mock_path(
            "flag-specific/special-flag/platform/foo/fast/test-expected.txt"
        ))
    );
    assert_eq!(
        port.fallback_expected_filename(test_file, ".txt").unwrap(),
        Some(mock_path("flag-specific/special-flag/fast/test-expected.txt"))
    );
}

#[test]
fn expected_baselines_virtual() {
    let port = mock_port(Default::default());
    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[{ "prefix": "flag", "base": "fast", "args": ["--flag"]}]"#,
    );
    let virtual_test = "virtual/flag/fast/test.html";
    let expected = |options: ExpectedFilenameOptions| port.expected_filename(virtual_test, ".txt", options).unwrap();
    let no_base = ExpectedFilenameOptions {
        fallback_base_for_virtual: false,
        ..Default::default()
    };
    let no_base_no_default = ExpectedFilenameOptions {
        return_default: false,
        fallback_base_for_virtual: false,
        ..Default::default()
    };
    let baselines = || {
        port.expected_baselines(virtual_test, ".txt", Relation::Match, false)
            .unwrap()
    };

    // The default baseline for base test
    assert_eq!(baselines(), not_found("virtual/flag/fast/test-expected.txt"));
    assert_eq!(expected(NO_DEFAULT), None);
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("fast/test-expected.txt"))
    );
    assert_eq!(expected(no_base_no_default), None);
    assert_eq!(
        expected(no_base),
        Some(mock_path("virtual/flag/fast/test-expected.txt"))
    );
    assert_eq!(
        port.fallback_expected_filename(virtual_test, ".txt").unwrap(),
        None
    );

    // Platform-specific baseline for base test
    write_mock_file(&port, "platform/foo/fast/test-expected.txt", "foo");
    assert_eq!(baselines(), not_found("virtual/flag/fast/test-expected.txt"));
    assert_eq!(
        expected(NO_DEFAULT),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );
    assert_eq!(
        expected(Default::default()),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );
    assert_eq!(expected(no_base_no_default), None);
    assert_eq!(
        expected(no_base),
        Some(mock_path("virtual/flag/fast/test-expected.txt"))
    );
    assert_eq!(
        port.fallback_expected_filename(virtual_test, ".txt").unwrap(),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );

    // The default baseline for virtual test
    write_mock_file(&port, "virtual/flag/fast/test-expected.txt", "foo");
    assert_eq!(
        baselines(),
        found(MOCK_WEB_TESTS, "virtual/flag/fast/test-expected.txt")
    );
    for options in [Default::default(), NO_DEFAULT, no_base, no_base_no_default] {
        assert_eq!(
            expected(options),
            Some(mock_path("virtual/flag/fast/test-expected.txt"))
        );
    }
    assert_eq!(
        port.fallback_expected_filename(virtual_test, ".txt").unwrap(),
        Some(mock_path("platform/foo/fast/test-expected.txt"))
    );

    // Platform-specific baseline for virtual test
    write_mock_file(
        &port,
        "platform/foo/virtual/flag/fast/test-expected.txt",
        "foo",
    );
    assert_eq!(
        baselines(),
        found(
            mock_path("platform/foo"),
            "virtual/flag/fast/test-expected.txt"
        )
    );
    for options in [Default::default(), NO_DEFAULT, no_base, no_base_no_default] {
        assert_eq!(
            expected(options),
            Some(mock_path("platform/foo/virtual/flag/fast/test-expected.txt"))
        );
    }
    assert_eq!(
        port.fallback_expected_filename(virtual_test, ".txt").unwrap(),
        Some(mock_path("virtual/flag/fast/test-expected.txt"))
    );
}

#[test]
fn additional_platform_directory() {
    let test_file = "fast/test.html";

    // Simple additional platform directory
    let port = mock_port(PortOptions {
        additional_platform_directory: vec!["/tmp/local-baselines".into()],
        ..Default::default()
    });
    write_mock_file(&port, "VirtualTestSuites", "[]");
    assert_eq!(
        port.baseline_version_dir().unwrap(),
        Utf8PathBuf::from("/tmp/local-baselines")
    );
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        not_found("fast/test-expected.txt")
    );
    assert_eq!(
        port.expected_filename(test_file, ".txt", NO_DEFAULT).unwrap(),
        None
    );
    assert_eq!(
        port.expected_filename(test_file, ".txt", Default::default())
            .unwrap(),
        Some(mock_path("fast/test-expected.txt"))
    );

    port.fs()
        .write_text_file("/tmp/local-baselines/fast/test-expected.txt", "foo");
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found("/tmp/local-baselines", "fast/test-expected.txt")
    );
    assert_eq!(
        port.expected_filename(test_file, ".txt", Default::default())
            .unwrap(),
        Some("/tmp/local-baselines/fast/test-expected.txt".into())
    );

    // Multiple additional platform directories: the last one specified is searched first.
    let port = mock_port(PortOptions {
        additional_platform_directory: vec!["/tmp/local-baselines".into(), "/foo".into()],
        ..Default::default()
    });
    write_mock_file(&port, "VirtualTestSuites", "[]");
    port.fs()
        .write_text_file("/tmp/local-baselines/fast/test-expected.txt", "foo");
    assert_eq!(
        port.baseline_version_dir().unwrap(),
        Utf8PathBuf::from("/foo")
    );
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found("/tmp/local-baselines", "fast/test-expected.txt")
    );

    port.fs().write_text_file("/foo/fast/test-expected.txt", "foo");
    assert_eq!(
        port.expected_baselines(test_file, ".txt", Relation::Match, false)
            .unwrap(),
        found("/foo", "fast/test-expected.txt")
    );
    assert_eq!(
        port.expected_filename(test_file, ".txt", Default::default())
            .unwrap(),
        Some("/foo/fast/test-expected.txt".into())
    );
}

#[test]
fn reference_files() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "VirtualTestSuites", "[]");
    for (path, contents) in [
        ("passes/svgreftest.svg", ""),
        ("passes/svgreftest-expected.svg", ""),
        ("passes/xhtreftest.svg", ""),
        ("passes/xhtreftest-expected.html", ""),
        ("passes/phpreftest.php", ""),
        ("passes/phpreftest-expected-mismatch.svg", ""),
        ("passes/text.html", ""),
    ] {
        write_mock_file(&port, path, contents);
    }

    assert_eq!(
        port.reference_files("passes/svgreftest.svg").unwrap(),
        [(Relation::Match, mock_path("passes/svgreftest-expected.svg"))]
    );
    assert_eq!(
        port.reference_files("passes/xhtreftest.svg").unwrap(),
        [(Relation::Match, mock_path("passes/xhtreftest-expected.html"))]
    );
    assert_eq!(
        port.reference_files("passes/phpreftest.php").unwrap(),
        [(
            Relation::Mismatch,
            mock_path("passes/phpreftest-expected-mismatch.svg")
        )]
    );
    assert!(port.reference_files("passes/text.html").unwrap().is_empty());
}

#[test]
fn reference_files_prefer_svg_then_xht_then_html() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "VirtualTestSuites", "[]");
    for path in [
        "passes/both.html",
        "passes/both-expected.html",
        "passes/both-expected.svg",
        "passes/both-expected-mismatch.xht",
    ] {
        write_mock_file(&port, path, "");
    }

    assert_eq!(
        port.reference_files("passes/both.html").unwrap(),
        [
            (Relation::Match, mock_path("passes/both-expected.svg")),
            (Relation::Match, mock_path("passes/both-expected.html")),
            (Relation::Mismatch, mock_path("passes/both-expected-mismatch.xht")),
        ]
    );
}

#[test]
fn reference_files_from_manifest() {
    let port = mock_port(Default::default());
    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[{"prefix": "layout_ng", "base": "external/wpt/html", "args": ["--layout-ng"]}]"#,
    );
    write_mock_file(
        &port,
        "external/wpt/MANIFEST.json",
        crate::manifest::EXTERNAL_WPT_MANIFEST,
    );

    let expected = [(
        Relation::Match,
        mock_path("external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L-ref.html"),
    )];
    assert_eq!(
        port.reference_files("external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L.html")
            .unwrap(),
        expected
    );
    assert_eq!(
        port.reference_files(
            "virtual/layout_ng/external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L.html"
        )
        .unwrap(),
        expected
    );
}
