//! Common test utilities for integration tests.
//!
//! Helpers for building throwaway directory hierarchies of fragments and
//! for locating the static fixtures.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use strata::{CollectingSink, Loader};
use tempfile::TempDir;

/// Path to a static fixture under `tests/fixtures`.
#[allow(dead_code)]
pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

/// A loader that collects warnings instead of printing them.
#[allow(dead_code)]
pub fn quiet_loader() -> (Loader, Rc<CollectingSink>) {
    let sink = Rc::new(CollectingSink::new());
    let loader = Loader::new().with_diagnostics(sink.clone());
    (loader, sink)
}

/// A temporary directory hierarchy that is removed on drop.
///
/// # Examples
///
/// ```no_run
/// # use common::Hierarchy;
/// let tree = Hierarchy::new();
/// tree.fragment("a/strata_data.strata", "{ x: 1 }");
/// let leaf = tree.dir("a/b/c");
/// ```
pub struct Hierarchy {
    temp: TempDir,
}

#[allow(dead_code)]
impl Hierarchy {
    /// Creates an empty hierarchy.
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    /// The top of the hierarchy.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Creates (if needed) and returns the directory at `relative`.
    pub fn dir(&self, relative: &str) -> PathBuf {
        let dir = self.temp.path().join(relative);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes a fragment at `relative`, creating parent directories.
    pub fn fragment(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.temp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// A loader bounded by the top of this hierarchy.
    pub fn loader(&self) -> (Loader, Rc<CollectingSink>) {
        let (loader, sink) = quiet_loader();
        (loader.with_stop_dir(self.path()), sink)
    }
}
