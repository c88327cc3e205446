//! Collection of the raw text of the `TestExpectations`-style files that apply to a port.

use std::{io, iter::Peekable, str::SplitWhitespace};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;

use crate::{
    fs::FileSystem,
    path::is_path_prefix,
    port::{Port, PortError},
};

/// Expectation file contents keyed by absolute path, in order of precedence.
pub type ExpectationsDict = IndexMap<Utf8PathBuf, String>;

/// Expectation files at the root of the web tests directory that apply to every configuration.
pub const GENERIC_EXPECTATIONS_FILES: &[&str] = &[
    "TestExpectations",
    NEVER_FIX_TESTS_FILE,
    "StaleTestExpectations",
    "SlowTests",
];

/// The directory of per-flag expectation files, named after the flag without leading dashes.
pub const FLAG_EXPECTATIONS_DIR: &str = "FlagExpectations";

/// The list of tests that a port running only smoke tests runs, one per line.
pub const SMOKE_TESTS_FILE: &str = "SmokeTests";

/// The generic file of tests that are never expected to pass, and are therefore never run.
pub const NEVER_FIX_TESTS_FILE: &str = "NeverFixTests";

/// Files in [`FLAG_EXPECTATIONS_DIR`] that do not hold expectations.
const NON_EXPECTATIONS_FILES: &[&str] = &["README.txt", "PRESUBMIT.py"];

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum ExpectationsError {
    #[error("failed to read expectations file `{path}`")]
    Read { path: Utf8PathBuf, source: io::Error },
    #[error("expectations file `{path}` is not valid UTF-8")]
    Decode { path: Utf8PathBuf, source: io::Error },
}

impl<Fs> Port<Fs>
where
    Fs: FileSystem,
{
    pub fn flag_expectations_dir(&self) -> Utf8PathBuf {
        self.web_tests_dir().join(FLAG_EXPECTATIONS_DIR)
    }

    fn read_expectations_file(&self, path: &Utf8Path) -> Result<String, ExpectationsError> {
        log::debug!("reading expectations from {path}");
        self.fs().read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::InvalidData {
                log::error!("Failed to read expectations file: '{path}'");
                ExpectationsError::Decode {
                    path: path.to_owned(),
                    source,
                }
            } else {
                ExpectationsError::Read {
                    path: path.to_owned(),
                    source,
                }
            }
        })
    }

    /// The expectation files used by this configuration, most specific first: the flag-specific
    /// file of the primary driver flag, then `--additional-expectations` files in the order
    /// given, then the [`GENERIC_EXPECTATIONS_FILES`] unless they are ignored.
    ///
    /// Files that do not exist are left out.
    pub fn expectations_dict(&self) -> Result<ExpectationsDict, PortError> {
        let options = self.options();
        let mut expectations = ExpectationsDict::new();

        if let Some(flag) = self.flag_specific_config_name()? {
            let path = self.flag_expectations_dir().join(flag);
            if self.fs().exists(&path) {
                let contents = self.read_expectations_file(&path)?;
                expectations.insert(path, contents);
            }
        }

        for path in &options.additional_expectations {
            if self.fs().exists(path) {
                let contents = self.read_expectations_file(path)?;
                expectations.entry(path.clone()).or_insert(contents);
            } else {
                log::debug!("additional expectations file `{path}` does not exist, skipping it");
            }
        }

        if !options.ignore_default_expectations {
            for name in GENERIC_EXPECTATIONS_FILES {
                let path = self.web_tests_dir().join(name);
                if self.fs().exists(&path) {
                    let contents = self.read_expectations_file(&path)?;
                    expectations.entry(path).or_insert(contents);
                }
            }
        }

        Ok(expectations)
    }

    /// [`Self::expectations_dict`], followed by the flag-specific expectations of every flag, in
    /// natural order of their names.
    pub fn all_expectations_dict(&self) -> Result<ExpectationsDict, PortError> {
        let mut expectations = self.expectations_dict()?;

        let dir = self.flag_expectations_dir();
        if !self.fs().is_dir(&dir) {
            return Ok(expectations);
        }
        let mut names = self.fs().read_dir(&dir).map_err(|source| PortError::Io {
            path: dir.clone(),
            source,
        })?;
        names.sort_by(|a, b| natord::compare(a, b));

        for name in names {
            if NON_EXPECTATIONS_FILES.contains(&name.as_str()) {
                continue;
            }
            let path = dir.join(&name);
            if expectations.contains_key(&path) || !self.fs().is_file(&path) {
                continue;
            }
            let contents = self.read_expectations_file(&path)?;
            expectations.insert(path, contents);
        }

        Ok(expectations)
    }

    pub fn path_to_smoke_tests_file(&self) -> Utf8PathBuf {
        match &self.options().smoke_tests_file {
            Some(path) => path.clone(),
            None => self.web_tests_dir().join(SMOKE_TESTS_FILE),
        }
    }

    /// Whether `test_name` is never run by this port: either it is missing from the smoke tests
    /// file of a port that only runs smoke tests, or it is marked `WontFix` in the
    /// [`NEVER_FIX_TESTS_FILE`]. A `Skip` in any other expectations file does not count.
    pub fn skips_test(&self, test_name: &str) -> Result<bool, PortError> {
        if self.options().smoke_tests_only {
            let path = self.path_to_smoke_tests_file();
            if self.fs().exists(&path) {
                let smoke_tests = self.read_to_string(&path)?;
                if !smoke_tests
                    .lines()
                    .map(|line| strip_comment(line).trim())
                    .any(|line| line == test_name)
                {
                    log::debug!("skipping {test_name}, which is not a smoke test");
                    return Ok(true);
                }
            }
        }

        let path = self.web_tests_dir().join(NEVER_FIX_TESTS_FILE);
        if !self.fs().exists(&path) {
            return Ok(false);
        }
        let never_fix_tests = self.read_expectations_file(&path)?;
        let wont_fix = never_fix_tests
            .lines()
            .filter_map(ExpectationLine::parse)
            .filter(|line| line.applies_to(self.config().fallback_chain.as_slice()))
            .any(|line| line.covers(test_name) && line.results.contains(&"WontFix"));
        Ok(wont_fix)
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _comment)| before)
}

/// Consumes a `[ ... ]` group, if the next token opens one.
fn bracketed_group<'a>(tokens: &mut Peekable<SplitWhitespace<'a>>) -> Vec<&'a str> {
    let mut group = Vec::new();
    if tokens.next_if_eq(&"[").is_some() {
        for token in tokens.by_ref() {
            if token == "]" {
                break;
            }
            group.push(token);
        }
    }
    group
}

/// The parts of an expectations line that decide whether it applies to a test, like
/// `crbug.com/123 [ Mac ] fast/test.html [ WontFix ]`.
#[derive(Debug, Eq, PartialEq)]
struct ExpectationLine<'a> {
    tags: Vec<&'a str>,
    test: &'a str,
    results: Vec<&'a str>,
}

impl<'a> ExpectationLine<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let mut tokens = strip_comment(line).split_whitespace().peekable();
        while tokens
            .peek()
            .is_some_and(|token| token.starts_with("crbug.com/") || token.starts_with("Bug("))
        {
            tokens.next();
        }

        let tags = bracketed_group(&mut tokens);
        let test = tokens.next()?;
        let results = bracketed_group(&mut tokens);
        Some(Self {
            tags,
            test,
            results,
        })
    }

    /// Lines without tags apply everywhere. Tags are matched against the baseline directories of
    /// the port, so `[ Mac ]` applies to a port falling back on `mac`.
    fn applies_to(&self, fallback_chain: &[String]) -> bool {
        self.tags.is_empty()
            || self.tags.iter().any(|tag| {
                let tag = tag.to_ascii_lowercase();
                fallback_chain.iter().any(|dir| dir.starts_with(&tag))
            })
    }

    /// Entries name a test, a directory with a trailing `/`, or a prefix with a trailing `*`.
    fn covers(&self, test_name: &str) -> bool {
        if let Some(prefix) = self.test.strip_suffix('*') {
            test_name.starts_with(prefix)
        } else if self.test.ends_with('/') {
            is_path_prefix(self.test, test_name)
        } else {
            self.test == test_name
        }
    }
}

#[cfg(test)]
use crate::port::{mock_port, write_mock_file, PortOptions};

#[cfg(test)]
fn joined_values(expectations: &ExpectationsDict) -> String {
    use joinery::JoinableIterator;

    expectations.values().join_with('\n').to_string()
}

#[test]
fn additional_expectations() {
    let port_with = |additional_expectations: &[&str], additional_driver_flag: &[&str]| {
        let port = mock_port(PortOptions {
            additional_expectations: additional_expectations
                .iter()
                .map(|&path| path.into())
                .collect(),
            additional_driver_flag: additional_driver_flag
                .iter()
                .map(|&flag| flag.to_owned())
                .collect(),
            ..Default::default()
        });
        write_mock_file(&port, "platform/foo/TestExpectations", "");
        port.fs()
            .write_text_file("/tmp/additional-expectations-1.txt", "content1\n");
        port.fs()
            .write_text_file("/tmp/additional-expectations-2.txt", "content2\n");
        write_mock_file(&port, "FlagExpectations/special-flag", "content3");
        port
    };
    let joined = |additional_expectations: &[&str], additional_driver_flag: &[&str]| {
        joined_values(
            &port_with(additional_expectations, additional_driver_flag)
                .expectations_dict()
                .unwrap(),
        )
    };

    assert_eq!(joined(&[], &[]), "");
    assert_eq!(
        joined(&["/tmp/additional-expectations-1.txt"], &[]),
        "content1\n"
    );
    assert_eq!(
        joined(
            &["/tmp/nonexistent-file", "/tmp/additional-expectations-1.txt"],
            &[]
        ),
        "content1\n"
    );
    assert_eq!(
        joined(
            &[
                "/tmp/additional-expectations-1.txt",
                "/tmp/additional-expectations-2.txt"
            ],
            &[]
        ),
        "content1\n\ncontent2\n"
    );
    assert_eq!(
        joined(
            &[
                "/tmp/additional-expectations-1.txt",
                "/tmp/additional-expectations-2.txt"
            ],
            &["--special-flag"]
        ),
        "content3\ncontent1\n\ncontent2\n"
    );

    let port = port_with(&["/tmp/additional-expectations-1.txt"], &["--special-flag"]);
    insta::assert_debug_snapshot!(port.expectations_dict().unwrap(), @r###"
    {
        "/mock-checkout/third_party/blink/web_tests/FlagExpectations/special-flag": "content3",
        "/tmp/additional-expectations-1.txt": "content1\n",
    }
    "###);
}

#[test]
fn missing_additional_expectations_are_skipped_quietly() {
    let _ = env_logger::builder().is_test(true).try_init();

    let port = mock_port(PortOptions {
        additional_expectations: vec!["/tmp/nonexistent-file".into()],
        ..Default::default()
    });
    write_mock_file(&port, "TestExpectations", "generic");
    insta::assert_debug_snapshot!(port.expectations_dict().unwrap(), @r###"
    {
        "/mock-checkout/third_party/blink/web_tests/TestExpectations": "generic",
    }
    "###);
}

#[test]
fn generic_expectations() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "SlowTests", "slow");
    write_mock_file(&port, "TestExpectations", "generic");
    write_mock_file(&port, "NeverFixTests", "never");
    assert_eq!(
        joined_values(&port.expectations_dict().unwrap()),
        "generic\nnever\nslow"
    );

    let port = mock_port(PortOptions {
        ignore_default_expectations: true,
        ..Default::default()
    });
    write_mock_file(&port, "TestExpectations", "generic");
    assert!(port.expectations_dict().unwrap().is_empty());
}

#[test]
fn expectations_dict_is_idempotent() {
    let port = mock_port(PortOptions {
        additional_expectations: vec!["/tmp/extra".into()],
        additional_driver_flag: vec!["--flag".to_owned()],
        ..Default::default()
    });
    write_mock_file(&port, "TestExpectations", "generic");
    write_mock_file(&port, "FlagExpectations/flag", "flag");
    port.fs().write_text_file("/tmp/extra", "extra");

    let first = port.expectations_dict().unwrap();
    let second = port.expectations_dict().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.keys().collect::<Vec<_>>(),
        second.keys().collect::<Vec<_>>()
    );
}

#[test]
fn flag_specific_expectations() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "FlagExpectations/special-flag-b", "bb");
    write_mock_file(&port, "FlagExpectations/special-flag-10", "10");
    write_mock_file(&port, "FlagExpectations/special-flag-a", "aa");
    write_mock_file(&port, "FlagExpectations/special-flag-9", "9");
    write_mock_file(&port, "FlagExpectations/README.txt", "cc");
    write_mock_file(&port, "FlagExpectations/PRESUBMIT.py", "dd");

    assert_eq!(joined_values(&port.expectations_dict().unwrap()), "");
    assert_eq!(
        joined_values(&port.all_expectations_dict().unwrap()),
        "9\n10\naa\nbb"
    );
}

#[test]
fn all_expectations_dict_keeps_active_flag_first() {
    let port = mock_port(PortOptions {
        additional_driver_flag: vec!["--special-flag-b".to_owned()],
        ..Default::default()
    });
    write_mock_file(&port, "FlagExpectations/special-flag-a", "aa");
    write_mock_file(&port, "FlagExpectations/special-flag-b", "bb");
    assert_eq!(
        joined_values(&port.all_expectations_dict().unwrap()),
        "bb\naa"
    );
}

#[test]
fn flag_specific_expectations_identify_unreadable_file() {
    let _ = env_logger::builder().is_test(true).try_init();

    let port = mock_port(Default::default());
    let non_utf8_file = port.flag_expectations_dir().join("non-utf8-file");
    port.fs().write_binary_file(&non_utf8_file, b"\xC0");

    match port.all_expectations_dict() {
        Err(PortError::Expectations(ExpectationsError::Decode { path, .. })) => {
            assert_eq!(path, non_utf8_file)
        }
        other => panic!("expected a decoding error, got {other:?}"),
    }
}

#[cfg(test)]
fn smoke_test_port(smoke_tests_only: bool) -> Port<crate::fs::MockFileSystem> {
    mock_port(PortOptions {
        smoke_tests_only,
        ..Default::default()
    })
}

#[test]
fn skips_test_missing_from_smoke_tests() {
    let port = smoke_test_port(true);
    write_mock_file(&port, SMOKE_TESTS_FILE, "# Smoke tests\npasses/text.html\n");
    assert!(port.skips_test("failures/expected/image.html").unwrap());
    assert!(!port.skips_test("passes/text.html").unwrap());
}

#[test]
fn skips_test_without_smoke_tests_file() {
    let port = smoke_test_port(true);
    assert!(!port.skips_test("failures/expected/image.html").unwrap());
}

#[test]
fn skips_test_with_custom_smoke_tests_file() {
    let port = mock_port(PortOptions {
        smoke_tests_only: true,
        smoke_tests_file: Some("/tmp/smoke.txt".into()),
        ..Default::default()
    });
    assert_eq!(port.path_to_smoke_tests_file(), Utf8PathBuf::from("/tmp/smoke.txt"));
    write_mock_file(&port, SMOKE_TESTS_FILE, "failures/expected/image.html
");
    port.fs().write_text_file("/tmp/smoke.txt", "passes/text.html
");
    assert!(port.skips_test("failures/expected/image.html").unwrap());
    assert!(!port.skips_test("passes/text.html").unwrap());
}

#[test]
fn skips_test_unless_only_smoke_tests_run() {
    let port = smoke_test_port(false);
    write_mock_file(&port, SMOKE_TESTS_FILE, "passes/text.html\n");
    assert!(!port.skips_test("failures/expected/image.html").unwrap());
}

#[test]
fn skips_test_ignores_skip_in_test_expectations() {
    let port = smoke_test_port(false);
    write_mock_file(
        &port,
        "TestExpectations",
        "Bug(test) failures/expected/image.html [ Skip ]\n",
    );
    assert!(!port.skips_test("failures/expected/image.html").unwrap());
}

#[test]
fn skips_test_marked_wont_fix() {
    let port = smoke_test_port(false);
    write_mock_file(
        &port,
        NEVER_FIX_TESTS_FILE,
        "\
# Tests that will never pass.
Bug(test) failures/expected/image.html [ WontFix ]
crbug.com/1 [ Foo ] failures/expected/crash.html [ WontFix ]
crbug.com/2 [ Mac ] failures/expected/text.html [ WontFix ]
crbug.com/3 external/wpt/portals/ [ WontFix ]
crbug.com/4 failures/expected/timeout.html [ Skip ]
",
    );
    assert!(port.skips_test("failures/expected/image.html").unwrap());
    assert!(port.skips_test("failures/expected/crash.html").unwrap());
    assert!(!port.skips_test("failures/expected/text.html").unwrap());
    assert!(port.skips_test("external/wpt/portals/a.html").unwrap());
    assert!(!port.skips_test("failures/expected/timeout.html").unwrap());
    assert!(!port.skips_test("passes/text.html").unwrap());
}

#[test]
fn expectation_lines() {
    assert_eq!(
        ExpectationLine::parse("crbug.com/1 [ Mac Win ] a/b.html [ WontFix Skip ] # why"),
        Some(ExpectationLine {
            tags: vec!["Mac", "Win"],
            test: "a/b.html",
            results: vec!["WontFix", "Skip"],
        })
    );
    assert_eq!(ExpectationLine::parse("# only a comment"), None);
    assert_eq!(ExpectationLine::parse(""), None);
}
