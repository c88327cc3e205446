//! Resolution of test identities and baselines in a checkout of Blink-style web tests.
//!
//! The entry point is [`Port`], which answers questions about the web tests directory of one
//! checkout, as seen by one test configuration ([`PortConfig`]):
//!
//! - which tests exist under a set of paths ([`Port::tests`]), including WPT tests listed in
//!   [`manifest`]s and tests rerun by [`virtual_suite`]s,
//! - which expected-output file a test is compared against ([`Port::expected_filename`]),
//! - which `TestExpectations`-style files apply ([`Port::expectations_dict`]).
//!
//! Everything is read through a [`FileSystem`], so that the same logic can run against an
//! in-memory [`MockFileSystem`].

pub mod baseline;
pub mod expectations;
pub mod finder;
pub mod fs;
pub mod manifest;
pub mod natural_sort;
pub mod path;
pub mod port;
pub mod virtual_suite;

pub use self::{
    baseline::{Baseline, ExpectedFilenameOptions},
    fs::{FileSystem, MockFileSystem, OsFileSystem},
    manifest::Relation,
    port::{Platform, Port, PortConfig, PortError, PortOptions},
    virtual_suite::{VirtualTestSuite, VirtualTestSuites},
};
