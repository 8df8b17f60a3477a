//! Fragment discovery and layered loading.
//!
//! Starting from a directory, the loader walks up the lexical parent chain
//! to the stop directory (or the filesystem root), then evaluates fragments
//! top-down so that data closer to the start directory wins the merge.
//! Within one directory, fragments in the reserved sub-directory are merged
//! before the directory's own fragments, each group in file-name order.
//!
//! # Examples
//!
//! ```no_run
//! use strata::Loader;
//! use std::path::Path;
//!
//! let root = Loader::new()
//!     .with_stop_dir("/srv/courses")
//!     .load(Path::new("/srv/courses/cis162/week01"))
//!     .unwrap();
//! println!("{}", root.lookup("course.title").unwrap());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::{EnvironmentConfig, LoaderConfig};
use crate::context::Context;
use crate::diagnostics::{DiagnosticSink, Logger};
use crate::error::{Error, Result};
use crate::fragment::{self, FragmentFormat};
use crate::merge::merge_into;
use crate::path;
use crate::tree::{check_reserved_keys, Node};
use crate::value::{Mapping, Value};

/// Builder-style entry point for loading a data tree.
pub struct Loader {
    config: LoaderConfig,
    current: Mapping,
    context: Option<Context>,
    sink: Rc<dyn DiagnosticSink>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// A loader with default configuration, no initial data and a fresh
    /// context, reporting warnings to a default [`Logger`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
            current: Mapping::new(),
            context: None,
            sink: Rc::new(Logger::default()),
        }
    }

    /// A loader whose configuration has the `STRATA_*` environment
    /// overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if an environment variable is invalid.
    pub fn from_environment() -> Result<Self> {
        let mut config = LoaderConfig::default();
        EnvironmentConfig::apply_overrides(&mut config)?;
        Ok(Self::new().with_config(config))
    }

    /// Replace the discovery configuration.
    #[must_use]
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Data the fragments are merged onto.
    #[must_use]
    pub fn with_current(mut self, current: Mapping) -> Self {
        self.current = current;
        self
    }

    /// Context shared by every fragment and the resulting tree.
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Stop walking upward at `dir` (inclusive).
    #[must_use]
    pub fn with_stop_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.stop_dir = Some(dir.into());
        self
    }

    /// Where the tree reports warnings.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: Rc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads every fragment from the filesystem root (or stop directory)
    /// down to `start` and returns the root of the resulting tree.
    ///
    /// `start` may name a file, in which case its directory is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathNotFound`] if `start` or the stop directory does
    /// not exist, and any error raised while reading or evaluating a
    /// fragment or building the tree.
    pub fn load(&self, start: &Path) -> Result<Node> {
        self.config.validate()?;
        let context = self.context.clone().unwrap_or_default();

        let start = path::normalize(start)?;
        path::canonicalize(&start)?;
        let dir = path::containing_dir(&start);

        let stop = self.canonical_stop_dir()?;
        let data = self.walk(&dir, self.current.clone(), &context, stop.as_deref())?;
        log::debug!("loaded {} top-level keys for {}", data.len(), dir.display());

        Node::build(data, Some(context), Rc::clone(&self.sink))
    }

    /// Merges the fragments of `dir` and its ancestors onto `current`.
    ///
    /// # Errors
    ///
    /// Same as [`Loader::load`], minus tree construction.
    pub fn load_directory(
        &self,
        dir: &Path,
        current: Mapping,
        context: &Context,
    ) -> Result<Mapping> {
        let dir = path::normalize(dir)?;
        let stop = self.canonical_stop_dir()?;
        self.walk(&dir, current, context, stop.as_deref())
    }

    /// Evaluates the fragment at `path` and merges its result onto `current`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read (including a missing
    /// file), [`Error::Loading`] if it does not produce a mapping,
    /// [`Error::InvalidKey`] if it uses a reserved key, and any syntax or
    /// evaluation error raised by the fragment itself.
    pub fn load_fragment(
        &self,
        path: &Path,
        mut current: Mapping,
        context: &Context,
    ) -> Result<Mapping> {
        let format = FragmentFormat::from_path(path);
        log::debug!("loading fragment {}", path.display());
        let source = fs::read_to_string(path)?;
        let data = evaluate_fragment(&source, path, format, context, Rc::clone(&self.sink))?;
        merge_into(&mut current, data);
        Ok(current)
    }

    /// Fragment files of `dir`: the reserved sub-directory's first, then the
    /// directory's own, each sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a directory cannot be listed.
    pub fn fragment_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let reserved = dir.join(&self.config.fragment_dir);
        if reserved.is_dir() {
            files.extend(self.list_fragments(&reserved)?);
        }
        files.extend(self.list_fragments(dir)?);
        Ok(files)
    }

    fn list_fragments(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if self.config.matches(&name).is_some() && file_path.is_file() {
                found.push(file_path);
            }
        }
        found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(found)
    }

    fn canonical_stop_dir(&self) -> Result<Option<PathBuf>> {
        self.config
            .stop_dir
            .as_deref()
            .map(|stop| path::normalize(stop).and_then(|stop| path::canonicalize(&stop)))
            .transpose()
    }

    fn walk(
        &self,
        dir: &Path,
        current: Mapping,
        context: &Context,
        stop: Option<&Path>,
    ) -> Result<Mapping> {
        let canonical = path::canonicalize(dir)?;
        let at_boundary = stop == Some(canonical.as_path()) || canonical.parent().is_none();

        let mut data = match dir.parent() {
            Some(parent) if !at_boundary => self.walk(parent, current, context, stop)?,
            _ => current,
        };

        log::trace!("scanning {} for fragments", dir.display());
        for file in self.fragment_files(dir)? {
            data = self.load_fragment(&file, data, context)?;
        }
        Ok(data)
    }
}

fn evaluate_fragment(
    source: &str,
    path: &Path,
    format: FragmentFormat,
    context: &Context,
    sink: Rc<dyn DiagnosticSink>,
) -> Result<Mapping> {
    let data = match fragment::evaluate(source, path, format, context, sink)? {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map,
        other => {
            return Err(Error::Loading {
                path: path.to_path_buf(),
                found: other.repr(),
            })
        }
    };
    check_reserved_keys(&data, &path.display().to_string())?;
    Ok(data)
}

/// Loads the tree for `start` with an explicit initial mapping, context and
/// stop directory. See [`Loader::load`].
///
/// # Errors
///
/// Same as [`Loader::load`].
pub fn load(
    start: &Path,
    current: Mapping,
    context: Option<Context>,
    stop_dir: Option<&Path>,
) -> Result<Node> {
    let mut loader = Loader::new().with_current(current);
    if let Some(context) = context {
        loader = loader.with_context(context);
    }
    if let Some(stop) = stop_dir {
        loader = loader.with_stop_dir(stop);
    }
    loader.load(start)
}

/// Merges the fragments of `dir` and its ancestors onto `current`.
///
/// # Errors
///
/// Same as [`Loader::load_directory`].
pub fn load_directory(
    dir: &Path,
    current: Mapping,
    context: &Context,
    stop_dir: Option<&Path>,
) -> Result<Mapping> {
    let mut loader = Loader::new();
    if let Some(stop) = stop_dir {
        loader = loader.with_stop_dir(stop);
    }
    loader.load_directory(dir, current, context)
}

/// Evaluates one fragment file and merges it onto `current`.
///
/// # Errors
///
/// Same as [`Loader::load_fragment`].
pub fn load_fragment(path: &Path, current: Mapping, context: &Context) -> Result<Mapping> {
    Loader::new().load_fragment(path, current, context)
}

/// Evaluates fragment `source` as if it had been read from `path`.
///
/// The format follows the extension of `path`.
///
/// # Errors
///
/// Same as [`Loader::load_fragment`], minus I/O.
pub fn load_fragment_source(source: &str, path: &Path, context: &Context) -> Result<Mapping> {
    let sink = Rc::new(Logger::default());
    evaluate_fragment(source, path, FragmentFormat::from_path(path), context, sink)
}
