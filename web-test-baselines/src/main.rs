use std::{
    fmt::Display,
    io::{self, Write as _},
    path::{Path, PathBuf},
    process::ExitCode,
};

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use joinery::JoinableIterator;
use lazy_format::make_lazy_format;
use miette::{miette, Diagnostic, IntoDiagnostic, Report, WrapErr};
use path_dsl::path;
use serde::Serialize;
use web_test_port::{
    path::{is_wpt_test, should_use_wptserve},
    ExpectedFilenameOptions, OsFileSystem, Platform, Port, PortConfig, PortOptions, Relation,
};

/// Answers questions about the tests and baselines of a Blink-style web tests checkout, the same
/// way a test run configured with the same options would.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// The root of the checkout. Found by searching up from the current directory when omitted.
    #[clap(long)]
    checkout: Option<PathBuf>,
    /// The web tests directory. Defaults to `third_party/blink/web_tests` under the checkout.
    #[clap(long)]
    web_tests_dir: Option<PathBuf>,
    /// The platform whose baselines are used. Defaults to the one this binary runs on.
    #[clap(value_enum, long)]
    platform: Option<PlatformArg>,
    /// Directories under `platform/` to search for baselines, most specific first. Overrides the
    /// platform's own fallback chain.
    #[clap(long = "fallback")]
    fallback_chain: Vec<String>,
    #[clap(flatten)]
    port_options: PortOptionsArgs,
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, Parser)]
struct PortOptionsArgs {
    /// An extra directory to search for baselines before all others. May be repeated, in which
    /// case the last one is searched first.
    #[clap(long)]
    additional_platform_directory: Vec<Utf8PathBuf>,
    /// A flag to pass to the driver. The first one selects flag-specific baselines and
    /// expectations, unless `additional-driver-flag.setting` names another.
    #[clap(long, allow_hyphen_values = true)]
    additional_driver_flag: Vec<String>,
    /// An extra expectations file, applied before the generic ones.
    #[clap(long)]
    additional_expectations: Vec<Utf8PathBuf>,
    /// Do not apply the generic expectations files.
    #[clap(long)]
    ignore_default_expectations: bool,
    /// Skip every test not listed in the `SmokeTests` file, if the checkout has one.
    #[clap(long)]
    smoke_tests_only: bool,
    /// The list of smoke tests, instead of `SmokeTests` in the web tests directory.
    #[clap(long)]
    smoke_tests_file: Option<Utf8PathBuf>,
}

impl From<PortOptionsArgs> for PortOptions {
    fn from(value: PortOptionsArgs) -> Self {
        let PortOptionsArgs {
            additional_platform_directory,
            additional_driver_flag,
            additional_expectations,
            ignore_default_expectations,
            smoke_tests_only,
            smoke_tests_file,
        } = value;
        Self {
            additional_platform_directory,
            additional_driver_flag,
            additional_expectations,
            ignore_default_expectations,
            smoke_tests_only,
            smoke_tests_file,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlatformArg {
    Linux,
    Mac,
    Win,
    Android,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Linux => Self::Linux,
            PlatformArg::Mac => Self::Mac,
            PlatformArg::Win => Self::Win,
            PlatformArg::Android => Self::Android,
        }
    }
}

#[derive(Debug, Parser)]
struct BaselineArgs {
    /// The test, relative to the web tests directory.
    test: String,
    /// The extension of the baseline, including its leading `.`.
    #[clap(long, default_value = ".txt")]
    extension: String,
}

#[derive(Debug, Parser)]
enum Subcommand {
    /// Print the directories searched for baselines before the web tests directory, most specific
    /// first.
    SearchPath,
    /// Print the path of the baseline that a test's output is compared against.
    Expected {
        #[clap(flatten)]
        baseline: BaselineArgs,
        /// Look up the `-expected-mismatch` baseline instead.
        #[clap(long)]
        mismatch: bool,
        /// Print nothing, instead of the path of a new generic baseline, when none exists.
        #[clap(long)]
        no_default: bool,
        /// Do not look up the base test of a virtual test that has no baseline of its own.
        #[clap(long)]
        no_virtual_fallback: bool,
    },
    /// Print the existing baselines of a test as JSON, most specific first.
    Baselines {
        #[clap(flatten)]
        baseline: BaselineArgs,
        #[clap(long)]
        mismatch: bool,
        /// Print every baseline instead of only the one that is used.
        #[clap(long)]
        all: bool,
    },
    /// Print the baseline that would be used if the one currently used were removed.
    Fallback {
        #[clap(flatten)]
        baseline: BaselineArgs,
    },
    /// Print the references of a reftest, each preceded by `==` or `!=`.
    References { test: String },
    /// Print what is known about tests as JSON.
    Classify {
        #[clap(required = true)]
        tests: Vec<String>,
    },
    /// List the tests under the given paths, or all tests when none are given.
    ///
    /// Paths may contain `*` globs.
    Tests { paths: Vec<String> },
    /// List the expectations files that apply, most specific first.
    Expectations {
        /// Include the expectations of every flag, not only the primary driver flag.
        #[clap(long)]
        all: bool,
        /// Print a JSON object of contents keyed by path instead.
        #[clap(long)]
        contents: bool,
    },
    /// Print the virtual test suites of the checkout as JSON.
    VirtualSuites,
    /// Print the primary driver flag and the other flags passed to the driver as JSON.
    DriverFlags,
}

fn main() -> ExitCode {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AlreadyReportedToCommandline) => ExitCode::FAILURE,
    }
}

fn run(cli: Cli) -> Result<(), AlreadyReportedToCommandline> {
    let Cli {
        checkout,
        web_tests_dir,
        platform,
        fallback_chain,
        port_options,
        subcommand,
    } = cli;

    let web_tests_dir: PathBuf = match web_tests_dir {
        Some(dir) => dir,
        None => {
            let checkout = checkout.map(Ok).unwrap_or_else(search_for_repo_root)?;
            path!(&checkout | "third_party" | "blink" | "web_tests").into()
        }
    };
    let web_tests_dir = to_utf8_absolute(web_tests_dir)?;
    log::debug!("using web tests directory {web_tests_dir}");

    let Some(platform) = platform.map(Platform::from).or_else(Platform::host) else {
        log::error!("no default platform for this host, please specify one with `--platform`");
        return Err(AlreadyReportedToCommandline);
    };
    let mut config = PortConfig::for_platform(platform, web_tests_dir, port_options.into());
    if !fallback_chain.is_empty() {
        config.fallback_chain = fallback_chain;
    }
    log::debug!(
        "resolving for `{}` with fallback chain {:?}",
        config.port_name,
        config.fallback_chain
    );
    let port = Port::new(config, OsFileSystem);

    match subcommand {
        Subcommand::SearchPath => {
            let search_path = port.baseline_search_path().map_err(report)?;
            print_lines(search_path)
        }
        Subcommand::Expected {
            baseline: BaselineArgs { test, extension },
            mismatch,
            no_default,
            no_virtual_fallback,
        } => {
            let options = ExpectedFilenameOptions {
                return_default: !no_default,
                fallback_base_for_virtual: !no_virtual_fallback,
                relation: relation(mismatch),
            };
            match port
                .expected_filename(&test, &extension, options)
                .map_err(report)?
            {
                Some(path) => print_lines([path]),
                None => {
                    log::info!("no `{extension}` baseline found for `{test}`");
                    Ok(())
                }
            }
        }
        Subcommand::Baselines {
            baseline: BaselineArgs { test, extension },
            mismatch,
            all,
        } => {
            let baselines = port
                .expected_baselines(&test, &extension, relation(mismatch), all)
                .map_err(report)?;
            print_json(&baselines)
        }
        Subcommand::Fallback {
            baseline: BaselineArgs { test, extension },
        } => match port
            .fallback_expected_filename(&test, &extension)
            .map_err(report)?
        {
            Some(path) => print_lines([path]),
            None => {
                log::info!("nothing to fall back to from the current `{extension}` baseline of `{test}`");
                Ok(())
            }
        },
        Subcommand::References { test } => {
            let references = port.reference_files(&test).map_err(report)?;
            if references.is_empty() {
                log::info!("no references found for `{test}`");
            }
            print_lines(
                references
                    .iter()
                    .map(|(relation, path)| make_lazy_format!(|f| write!(f, "{relation} {path}"))),
            )
        }
        Subcommand::Classify { tests } => {
            let classified = tests
                .iter()
                .map(|test| classify(&port, test).map(|classified| (test.as_str(), classified)))
                .collect::<Result<IndexMap<_, _>, web_test_port::PortError>>()
                .map_err(report)?;
            print_json(&classified)
        }
        Subcommand::Tests { paths } => {
            let paths = paths.iter().map(String::as_str).collect::<Vec<_>>();
            let tests = port.tests(&paths).map_err(report)?;
            log::info!("found {} test(s)", tests.len());
            print_lines(tests)
        }
        Subcommand::Expectations { all, contents } => {
            let expectations = if all {
                port.all_expectations_dict()
            } else {
                port.expectations_dict()
            }
            .map_err(report)?;
            if contents {
                print_json(&expectations)
            } else {
                print_lines(expectations.keys())
            }
        }
        Subcommand::VirtualSuites => {
            let suites = port.virtual_test_suites().map_err(report)?;
            print_json(suites)
        }
        Subcommand::DriverFlags => {
            #[derive(Serialize)]
            struct DriverFlags {
                primary: Option<String>,
                additional: Vec<String>,
            }
            let flags = DriverFlags {
                primary: port.primary_driver_flag().map_err(report)?,
                additional: port.additional_driver_flags().map_err(report)?,
            };
            print_json(&flags)
        }
    }
}

fn relation(mismatch: bool) -> Relation {
    if mismatch {
        Relation::Mismatch
    } else {
        Relation::Match
    }
}

#[derive(Debug, Serialize)]
struct Classification<'a> {
    is_wpt: bool,
    uses_wptserve: bool,
    virtual_suite: Option<&'a str>,
    base: &'a str,
    driver_args: &'a [String],
    is_slow: bool,
    exists: bool,
    skipped: bool,
}

fn classify<'a>(
    port: &'a Port,
    test: &'a str,
) -> Result<Classification<'a>, web_test_port::PortError> {
    let suites = port.virtual_test_suites()?;
    Ok(Classification {
        is_wpt: is_wpt_test(test),
        uses_wptserve: should_use_wptserve(test),
        virtual_suite: suites.find_for_test(test).map(|suite| suite.prefix()),
        base: suites.base_test(test),
        driver_args: suites.args_for_test(test),
        is_slow: port.is_slow_wpt_test(test)?,
        exists: port.test_exists(test)?,
        skipped: port.skips_test(test)?,
    })
}

fn report(e: impl Diagnostic + Send + Sync + 'static) -> AlreadyReportedToCommandline {
    log::error!("{:?}", Report::new(e));
    AlreadyReportedToCommandline
}

fn print_lines<T>(lines: impl IntoIterator<Item = T>) -> Result<(), AlreadyReportedToCommandline>
where
    T: Display,
{
    let lines = lines.into_iter().collect::<Vec<_>>();
    let lines = lines
        .iter()
        .map(|line| make_lazy_format!(|f| writeln!(f, "{line}")))
        .join_with("");
    write!(io::stdout().lock(), "{lines}")
        .into_diagnostic()
        .wrap_err("failed to write to standard output")
        .map_err(|e| {
            log::error!("{e:?}");
            AlreadyReportedToCommandline
        })
}

fn print_json(value: &impl Serialize) -> Result<(), AlreadyReportedToCommandline> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)
        .into_diagnostic()
        .and_then(|()| writeln!(stdout).into_diagnostic())
        .wrap_err("failed to write JSON to standard output")
        .map_err(|e| {
            log::error!("{e:?}");
            AlreadyReportedToCommandline
        })
}

fn to_utf8_absolute(path: PathBuf) -> Result<Utf8PathBuf, AlreadyReportedToCommandline> {
    let report_to_cmd_line = |e: Report| {
        log::error!("{e:?}");
        AlreadyReportedToCommandline
    };
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .into_diagnostic()
            .wrap_err("failed to get the current working directory")
            .map_err(report_to_cmd_line)?
            .join(path)
    };
    Utf8PathBuf::try_from(path)
        .map_err(|e| miette!("web tests directory `{}` is not valid UTF-8", e.as_path().display()))
        .map_err(report_to_cmd_line)
}

/// Search for a Mercurial, Git or Jujutsu repository root, starting from the current working
/// directory and moving up through its parents.
///
/// This function reports to `log` automatically, so no meaningful [`Err`] value is returned.
fn search_for_repo_root() -> Result<PathBuf, AlreadyReportedToCommandline> {
    use lets_find_up::{find_up_with, FindUpKind, FindUpOptions};

    let find_up = |repo_tech_name, root_dir_name| {
        log::debug!("searching for {repo_tech_name} repository root…");
        let err = || {
            miette!(
                "failed to find a {repo_tech_name} repository ({root_dir_name:?}) in the current \
                working directory or any of its parents",
            )
        };
        let options = FindUpOptions {
            cwd: Path::new("."),
            kind: FindUpKind::Dir,
        };
        find_up_with(root_dir_name, options)
            .map_err(Report::msg)
            .wrap_err_with(err)
            .and_then(|found| found.ok_or_else(err))
            .map(|mut dir| {
                dir.pop();
                dir
            })
    };

    let mut errs = Vec::new();
    for (repo_tech_name, root_dir_name) in [("Git", ".git"), ("Mercurial", ".hg"), ("Jujutsu", ".jj")]
    {
        match find_up(repo_tech_name, root_dir_name) {
            Ok(root) => {
                for err in errs {
                    log::debug!("{err:?}");
                }
                log::debug!("detected repository root at {}", root.display());
                return Ok(root);
            }
            Err(e) => errs.push(e),
        }
    }
    for err in errs {
        log::warn!("{err:?}");
    }
    log::error!("failed to automatically find a checkout, please specify one with `--checkout`");
    Err(AlreadyReportedToCommandline)
}

struct AlreadyReportedToCommandline;

#[test]
fn cli_definition() {
    use clap::CommandFactory;

    Cli::command().debug_assert();
}

#[test]
fn driver_flags_take_hyphen_values() {
    let cli = Cli::try_parse_from([
        "web-test-baselines",
        "--web-tests-dir",
        "/wt",
        "--additional-driver-flag",
        "--enable-features=Foo",
        "--additional-platform-directory",
        "/a",
        "--additional-platform-directory",
        "/b",
        "driver-flags",
    ])
    .unwrap();
    let options = PortOptions::from(cli.port_options);
    assert_eq!(options.additional_driver_flag, ["--enable-features=Foo"]);
    assert_eq!(
        options.additional_platform_directory,
        [Utf8PathBuf::from("/a"), Utf8PathBuf::from("/b")]
    );
    assert!(matches!(cli.subcommand, Subcommand::DriverFlags));
    assert!(!options.smoke_tests_only);

    let cli = Cli::try_parse_from([
        "web-test-baselines",
        "--web-tests-dir",
        "/wt",
        "--smoke-tests-only",
        "--smoke-tests-file",
        "/smoke.txt",
        "classify",
        "fast/test.html",
    ])
    .unwrap();
    let options = PortOptions::from(cli.port_options);
    assert!(options.smoke_tests_only);
    assert_eq!(options.smoke_tests_file, Some(Utf8PathBuf::from("/smoke.txt")));
}
