use std::{
    cell::OnceCell,
    fmt::{self, Display, Formatter},
    io,
};

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;

use crate::{
    expectations::ExpectationsError,
    finder::TestGlobError,
    fs::{FileSystem, OsFileSystem},
    manifest::{ManifestError, WptManifest},
    path::{split_wpt_test, WPT_DIRS},
    virtual_suite::{VirtualTestSuite, VirtualTestSuites, VirtualTestSuitesError},
};

/// Flags passed to the driver in every run, after any additional ones.
pub const DEFAULT_DRIVER_FLAGS: &[&str] = &["--run-web-tests"];

/// A file whose contents, if any, override `--additional-driver-flag` as the primary driver flag.
pub const DRIVER_FLAG_SETTING_FILE: &str = "additional-driver-flag.setting";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Platform {
    Linux,
    Mac,
    Win,
    Android,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Win => "win",
            Self::Android => "android",
        }
    }

    /// Directories under `platform/`, most specific first.
    pub fn default_fallback_chain(self) -> &'static [&'static str] {
        match self {
            Self::Linux => &["linux", "win"],
            Self::Mac => &["mac"],
            Self::Win => &["win"],
            Self::Android => &["android", "linux", "win"],
        }
    }

    /// The platform this binary was built for, if it has baselines of its own.
    pub fn host() -> Option<Self> {
        if cfg!(target_os = "android") {
            Some(Self::Android)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::Mac)
        } else if cfg!(target_os = "windows") {
            Some(Self::Win)
        } else {
            None
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options that are usually set from the command line of a test run.
#[derive(Clone, Debug, Default)]
pub struct PortOptions {
    /// Extra baseline directories, in the order they were specified. The last one specified takes
    /// precedence over the others.
    pub additional_platform_directory: Vec<Utf8PathBuf>,
    pub additional_driver_flag: Vec<String>,
    pub additional_expectations: Vec<Utf8PathBuf>,
    pub ignore_default_expectations: bool,
    /// Run only the tests listed in the smoke tests file, when there is one.
    pub smoke_tests_only: bool,
    /// Overrides the default `SmokeTests` file at the root of the web tests directory.
    pub smoke_tests_file: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug)]
pub struct PortConfig {
    pub port_name: String,
    pub web_tests_dir: Utf8PathBuf,
    /// Directories under `platform/` to search for baselines, most specific first.
    pub fallback_chain: Vec<String>,
    pub options: PortOptions,
}

impl PortConfig {
    pub fn for_platform(platform: Platform, web_tests_dir: Utf8PathBuf, options: PortOptions) -> Self {
        Self {
            port_name: platform.name().to_owned(),
            web_tests_dir,
            fallback_chain: platform
                .default_fallback_chain()
                .iter()
                .map(|&dir| dir.to_owned())
                .collect(),
            options,
        }
    }
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum PortError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    VirtualTestSuites(#[from] VirtualTestSuitesError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expectations(#[from] ExpectationsError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Glob(#[from] TestGlobError),
    #[error("failed to read `{path}`")]
    Io { path: Utf8PathBuf, source: io::Error },
}

/// The web tests of one checkout, as seen by one configuration of a test run.
///
/// Virtual test suites and WPT manifests are loaded from the file system on first use, and are
/// not reloaded afterwards.
#[derive(Debug)]
pub struct Port<Fs = OsFileSystem> {
    config: PortConfig,
    fs: Fs,
    virtual_test_suites: OnceCell<VirtualTestSuites>,
    wpt_manifests: [OnceCell<WptManifest>; WPT_DIRS.len()],
}

impl<Fs> Port<Fs>
where
    Fs: FileSystem,
{
    pub fn new(config: PortConfig, fs: Fs) -> Self {
        Self {
            config,
            fs,
            virtual_test_suites: OnceCell::new(),
            wpt_manifests: Default::default(),
        }
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn options(&self) -> &PortOptions {
        &self.config.options
    }

    pub fn fs(&self) -> &Fs {
        &self.fs
    }

    pub fn port_name(&self) -> &str {
        &self.config.port_name
    }

    pub fn web_tests_dir(&self) -> &Utf8Path {
        &self.config.web_tests_dir
    }

    pub fn abspath_for_test(&self, test_name: &str) -> Utf8PathBuf {
        self.web_tests_dir().join(test_name)
    }

    /// The test name of a path under the web tests directory.
    pub fn relative_test_filename<'a>(&self, path: &'a Utf8Path) -> Option<&'a str> {
        path.strip_prefix(self.web_tests_dir())
            .ok()
            .map(|rel| rel.as_str())
    }

    pub(crate) fn read_to_string(&self, path: &Utf8Path) -> Result<String, PortError> {
        log::debug!("reading {path}");
        self.fs.read_to_string(path).map_err(|source| PortError::Io {
            path: path.to_owned(),
            source,
        })
    }

    pub fn virtual_test_suites(&self) -> Result<&VirtualTestSuites, VirtualTestSuitesError> {
        if let Some(suites) = self.virtual_test_suites.get() {
            return Ok(suites);
        }

        let path = self.web_tests_dir().join("VirtualTestSuites");
        if !self.fs.is_file(&path) {
            return Err(VirtualTestSuitesError::Missing { path });
        }
        log::debug!("loading virtual test suites from {path}");
        let json = self
            .fs
            .read_to_string(&path)
            .map_err(|source| VirtualTestSuitesError::Read {
                path: path.clone(),
                source,
            })?;
        let suites = VirtualTestSuites::from_json(&json)?;
        log::debug!("loaded {} virtual test suite(s)", suites.iter().count());
        Ok(self.virtual_test_suites.get_or_init(|| suites))
    }

    pub fn lookup_virtual_suite(
        &self,
        test_name: &str,
    ) -> Result<Option<&VirtualTestSuite>, VirtualTestSuitesError> {
        Ok(self.virtual_test_suites()?.find_for_test(test_name))
    }

    /// The non-virtual test that `test_name` reruns, if it is a virtual test.
    pub fn lookup_virtual_test_base<'a>(
        &self,
        test_name: &'a str,
    ) -> Result<Option<&'a str>, VirtualTestSuitesError> {
        Ok(self.virtual_test_suites()?.lookup_base(test_name))
    }

    /// The manifest of one of the [`WPT_DIRS`]. A directory without a `MANIFEST.json` has no
    /// tests.
    pub fn wpt_manifest(&self, wpt_dir: &str) -> Result<&WptManifest, ManifestError> {
        let (idx, &(wpt_dir, _url_prefix)) = WPT_DIRS
            .iter()
            .enumerate()
            .find(|(_idx, (dir, _))| *dir == wpt_dir)
            .ok_or_else(|| ManifestError::NotAWptDir {
                dir: wpt_dir.to_owned(),
            })?;

        let cell = &self.wpt_manifests[idx];
        if let Some(manifest) = cell.get() {
            return Ok(manifest);
        }

        let path = self.web_tests_dir().join(wpt_dir).join("MANIFEST.json");
        let manifest = if self.fs.is_file(&path) {
            log::debug!("loading WPT manifest from {path}");
            let json = self
                .fs
                .read_to_string(&path)
                .map_err(|source| ManifestError::Read {
                    path: path.clone(),
                    source,
                })?;
            WptManifest::from_json(&json, wpt_dir)
                .map_err(|source| ManifestError::Parse { path, source })?
        } else {
            log::warn!("no WPT manifest found at {path}; assuming `{wpt_dir}` has no tests");
            WptManifest::empty(wpt_dir)
        };
        Ok(cell.get_or_init(|| manifest))
    }

    /// Whether `test_name` (possibly virtual) is a WPT test listed in its directory's manifest.
    pub fn wpt_manifest_contains(&self, test_name: &str) -> Result<bool, ManifestError> {
        match split_wpt_test(test_name) {
            Some((wpt_dir, url)) => Ok(self.wpt_manifest(wpt_dir)?.is_test_url(url)),
            None => Ok(false),
        }
    }

    /// Whether the manifest marks `test_name` as slow. Always false for non-WPT tests.
    pub fn is_slow_wpt_test(&self, test_name: &str) -> Result<bool, ManifestError> {
        match split_wpt_test(test_name) {
            Some((wpt_dir, url)) => Ok(self.wpt_manifest(wpt_dir)?.is_slow_test(url)),
            None => Ok(false),
        }
    }

    /// Like [`crate::path::is_non_wpt_test_file`], but also accepts a `dirname` that is an
    /// absolute path under the web tests directory.
    pub fn is_non_wpt_test_file(&self, dirname: &str, filename: &str) -> bool {
        let dirname = self
            .relative_test_filename(Utf8Path::new(dirname))
            .unwrap_or(dirname);
        crate::path::is_non_wpt_test_file(dirname, filename)
    }

    /// The flag that selects flag-specific baselines and expectations, if any.
    pub fn primary_driver_flag(&self) -> Result<Option<String>, PortError> {
        if let Some(flag) = self.driver_flag_from_setting_file()? {
            return Ok(Some(flag));
        }
        Ok(self.options().additional_driver_flag.first().cloned())
    }

    fn driver_flag_from_setting_file(&self) -> Result<Option<String>, PortError> {
        let path = self.web_tests_dir().join(DRIVER_FLAG_SETTING_FILE);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }
        let contents = self.read_to_string(&path)?;
        let flag = contents.trim();
        Ok((!flag.is_empty()).then(|| flag.to_owned()))
    }

    /// The primary driver flag, without leading dashes, as used for directory names under
    /// `flag-specific/` and `FlagExpectations/`.
    pub fn flag_specific_config_name(&self) -> Result<Option<String>, PortError> {
        Ok(self
            .primary_driver_flag()?
            .map(|flag| flag.trim_start_matches('-').to_owned()))
    }

    /// Driver flags other than the primary one, followed by [`DEFAULT_DRIVER_FLAGS`].
    pub fn additional_driver_flags(&self) -> Result<Vec<String>, PortError> {
        let mut flags = self.options().additional_driver_flag.clone();
        if let Some(flag) = self.driver_flag_from_setting_file()? {
            if !flags.contains(&flag) {
                flags.insert(0, flag);
            }
        }
        let primary = self.primary_driver_flag()?;
        if primary.is_some() && flags.first() == primary.as_ref() {
            flags.remove(0);
        }
        flags.extend(DEFAULT_DRIVER_FLAGS.iter().map(|&flag| flag.to_owned()));
        Ok(flags)
    }
}

#[cfg(test)]
pub(crate) const MOCK_WEB_TESTS: &str = "/mock-checkout/third_party/blink/web_tests";

#[cfg(test)]
pub(crate) fn mock_port(options: PortOptions) -> Port<crate::fs::MockFileSystem> {
    let config = PortConfig {
        port_name: "foo".to_owned(),
        web_tests_dir: MOCK_WEB_TESTS.into(),
        fallback_chain: vec!["foo".to_owned()],
        options,
    };
    Port::new(config, crate::fs::MockFileSystem::new())
}

#[cfg(test)]
pub(crate) fn write_mock_file(port: &Port<crate::fs::MockFileSystem>, rel_path: &str, contents: &str) {
    port.fs()
        .write_text_file(port.abspath_for_test(rel_path), contents);
}

#[cfg(test)]
fn driver_flags(flags: &[&str]) -> PortOptions {
    PortOptions {
        additional_driver_flag: flags.iter().map(|&flag| flag.to_owned()).collect(),
        ..Default::default()
    }
}

#[test]
fn platform_fallback_chains() {
    let config = PortConfig::for_platform(Platform::Android, "/wt".into(), Default::default());
    assert_eq!(config.port_name, "android");
    assert_eq!(config.fallback_chain, ["android", "linux", "win"]);
    assert_eq!(Platform::Mac.default_fallback_chain(), ["mac"]);
}

#[test]
fn virtual_test_suite_file() {
    let port = mock_port(Default::default());
    assert!(matches!(
        port.virtual_test_suites(),
        Err(VirtualTestSuitesError::Missing { path })
            if path.as_str() == format!("{MOCK_WEB_TESTS}/VirtualTestSuites")
    ));

    write_mock_file(&port, "VirtualTestSuites", "{[{[");
    assert!(matches!(
        port.virtual_test_suites(),
        Err(VirtualTestSuitesError::Parse { .. })
    ));

    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[{"prefix": "bar", "base": "fast/bar", "args": ["--bar"]}]"#,
    );
    let suites = port.virtual_test_suites().unwrap();
    assert_eq!(suites.iter().count(), 1);
    assert_eq!(
        port.lookup_virtual_test_base("virtual/bar/fast/bar/a.html").unwrap(),
        Some("fast/bar/a.html")
    );
    assert_eq!(
        port.lookup_virtual_suite("virtual/bar/fast/bar/a.html")
            .unwrap()
            .map(|suite| suite.args()),
        Some(&["--bar".to_owned()][..])
    );

    // Loaded once per port.
    write_mock_file(&port, "VirtualTestSuites", "[]");
    assert_eq!(port.virtual_test_suites().unwrap().iter().count(), 1);
}

#[test]
fn duplicate_virtual_test_suite_in_file() {
    let port = mock_port(Default::default());
    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[
            {"prefix": "bar", "base": "fast/bar", "args": ["--bar"]},
            {"prefix": "bar", "base": "fast/bar", "args": ["--bar"]}
        ]"#,
    );
    assert!(matches!(
        port.virtual_test_suites(),
        Err(VirtualTestSuitesError::DuplicatePrefix { .. })
    ));
}

#[cfg(test)]
fn port_with_manifests() -> Port<crate::fs::MockFileSystem> {
    let port = mock_port(Default::default());
    write_mock_file(
        &port,
        "VirtualTestSuites",
        r#"[
            {"prefix": "virtual_wpt", "base": "external/wpt", "args": ["--virtual-wpt"]},
            {"prefix": "virtual_wpt_dom", "base": "external/wpt/dom", "args": ["--virtual-wpt-dom"]}
        ]"#,
    );
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

#[test]
fn slow_wpt_tests() {
    let port = port_with_manifests();

    assert!(!port
        .is_slow_wpt_test("external/wpt/dom/ranges/Range-attributes.html")
        .unwrap());
    assert!(port
        .is_slow_wpt_test("external/wpt/dom/ranges/Range-attributes-slow.html")
        .unwrap());
    assert!(port
        .is_slow_wpt_test("external/wpt/html/dom/elements/global-attributes/dir_auto-EN-L.html")
        .unwrap());

    assert!(!port
        .is_slow_wpt_test("external/wpt/console/console-is-a-namespace.any.html")
        .unwrap());
    assert!(port
        .is_slow_wpt_test("external/wpt/console/console-is-a-namespace.any.worker.html")
        .unwrap());
    assert!(!port
        .is_slow_wpt_test("external/wpt/html/parse.html?run_type=uri")
        .unwrap());
    assert!(port
        .is_slow_wpt_test("external/wpt/html/parse.html?run_type=write")
        .unwrap());

    assert!(!port
        .is_slow_wpt_test("virtual/virtual_wpt/external/wpt/dom/ranges/Range-attributes.html")
        .unwrap());
    assert!(port
        .is_slow_wpt_test("virtual/virtual_wpt/external/wpt/dom/ranges/Range-attributes-slow.html")
        .unwrap());

    for illegal in [
        "dom/ranges/Range-attributes.html",
        "dom/ranges/Range-attributes-slow.html",
        "/dom/ranges/Range-attributes.html",
        "/dom/ranges/Range-attributes-slow.html",
    ] {
        assert!(!port.is_slow_wpt_test(illegal).unwrap(), "{illegal:?}");
    }
}

#[test]
fn manifest_membership() {
    let port = port_with_manifests();
    assert!(port
        .wpt_manifest_contains("external/wpt/console/console-is-a-namespace.any.html")
        .unwrap());
    assert!(!port
        .wpt_manifest_contains("external/wpt/console/console-is-a-namespace.any.js")
        .unwrap());
    assert!(!port
        .wpt_manifest_contains("external/wpt/common/blank.html")
        .unwrap());
    assert!(port.wpt_manifest_contains("wpt_internal/dom/bar.html").unwrap());
    assert!(!port.wpt_manifest_contains("fast/dom/bar.html").unwrap());
    assert!(port.wpt_manifest("not_wpt").is_err());
}

#[test]
fn missing_manifest_is_empty() {
    let port = mock_port(Default::default());
    assert!(port.wpt_manifest("external/wpt").unwrap().is_empty());
    assert!(!port
        .is_slow_wpt_test("external/wpt/dom/ranges/Range-attributes-slow.html")
        .unwrap());
}

#[test]
fn malformed_manifest() {
    let port = mock_port(Default::default());
    write_mock_file(&port, "external/wpt/MANIFEST.json", "not json");
    assert!(matches!(
        port.wpt_manifest("external/wpt"),
        Err(ManifestError::Parse { path, .. }) if path.as_str().ends_with("external/wpt/MANIFEST.json")
    ));
}

#[test]
fn absolute_dirnames_for_non_wpt_test_files() {
    let port = mock_port(Default::default());
    let abs = |rel| format!("{MOCK_WEB_TESTS}/{rel}");
    assert!(!port.is_non_wpt_test_file(&abs("external/wpt/common"), "blank.html"));
    assert!(!port.is_non_wpt_test_file(
        &abs("external/wpt/console"),
        "console-is-a-namespace.any.js"
    ));
    assert!(!port.is_non_wpt_test_file(&abs("external/wpt"), "testharness_runner.html"));
    assert!(port.is_non_wpt_test_file(&abs("external/wpt_automation"), "foo.html"));
    assert!(!port.is_non_wpt_test_file(
        &abs("wpt_internal/console"),
        "console-is-a-namespace.any.js"
    ));
    assert!(port.is_non_wpt_test_file("", "foo.html"));
}

#[cfg(test)]
fn with_default_flags(flags: &[&str]) -> Vec<String> {
    flags
        .iter()
        .chain(DEFAULT_DRIVER_FLAGS)
        .map(|&flag| flag.to_owned())
        .collect()
}

#[test]
fn driver_flag_from_file() {
    let port_a = mock_port(driver_flags(&[]));
    let port_b = mock_port(driver_flags(&["--bb"]));
    let port_c = mock_port(driver_flags(&["--bb", "--cc"]));

    assert_eq!(port_a.primary_driver_flag().unwrap(), None);
    assert_eq!(port_b.primary_driver_flag().unwrap().as_deref(), Some("--bb"));
    assert_eq!(port_c.primary_driver_flag().unwrap().as_deref(), Some("--bb"));

    let default_flags = port_a.additional_driver_flags().unwrap();
    assert_eq!(default_flags, DEFAULT_DRIVER_FLAGS);
    assert_eq!(port_b.additional_driver_flags().unwrap(), default_flags);
    assert_eq!(
        port_c.additional_driver_flags().unwrap(),
        with_default_flags(&["--cc"])
    );

    write_mock_file(&port_a, DRIVER_FLAG_SETTING_FILE, "--aa");
    write_mock_file(&port_b, DRIVER_FLAG_SETTING_FILE, "--aa");
    write_mock_file(&port_c, DRIVER_FLAG_SETTING_FILE, "--bb\n");

    assert_eq!(port_a.primary_driver_flag().unwrap().as_deref(), Some("--aa"));
    assert_eq!(port_b.primary_driver_flag().unwrap().as_deref(), Some("--aa"));
    assert_eq!(port_c.primary_driver_flag().unwrap().as_deref(), Some("--bb"));
    assert_eq!(
        port_c.flag_specific_config_name().unwrap().as_deref(),
        Some("bb")
    );

    assert_eq!(port_a.additional_driver_flags().unwrap(), default_flags);
    assert_eq!(
        port_b.additional_driver_flags().unwrap(),
        with_default_flags(&["--bb"])
    );
    assert_eq!(
        port_c.additional_driver_flags().unwrap(),
        with_default_flags(&["--cc"])
    );

    write_mock_file(&port_a, DRIVER_FLAG_SETTING_FILE, "  \n");
    assert_eq!(port_a.primary_driver_flag().unwrap(), None);
}
