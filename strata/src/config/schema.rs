//! Loader configuration schema.
//!
//! Controls which files count as fragments and where directory walks stop.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fragment::FragmentFormat;

/// Default file-name prefix of fragment files.
pub const DEFAULT_FRAGMENT_PREFIX: &str = "strata_data";

/// Default name of the reserved fragments sub-directory.
pub const DEFAULT_FRAGMENT_DIR: &str = "StrataData";

/// Extension of fragment-language files.
pub const SCRIPT_EXTENSION: &str = "strata";

/// Extensions of YAML fragment files.
pub const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Settings for fragment discovery.
///
/// # Examples
///
/// ```
/// use strata::config::LoaderConfig;
///
/// let config = LoaderConfig::from_yaml_str("fragment_prefix: course_data\n").unwrap();
/// assert_eq!(config.fragment_prefix, "course_data");
/// assert_eq!(config.fragment_dir, "StrataData");
/// assert!(config.yaml_fragments);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct LoaderConfig {
    /// File names of fragments start with this prefix.
    pub fragment_prefix: String,

    /// Name of the sub-directory scanned before a directory's own fragments.
    pub fragment_dir: String,

    /// Whether `.yaml`/`.yml` fragments are picked up alongside scripts.
    pub yaml_fragments: bool,

    /// Directory at which the upward walk stops (inclusive).
    pub stop_dir: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fragment_prefix: DEFAULT_FRAGMENT_PREFIX.to_string(),
            fragment_dir: DEFAULT_FRAGMENT_DIR.to_string(),
            yaml_fragments: true,
            stop_dir: None,
        }
    }
}

impl LoaderConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Yaml`] if
    /// it is not a valid configuration document, and [`Error::Validation`]
    /// if a field holds an unusable value.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`LoaderConfig::from_yaml_file`], minus I/O.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config = if source.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(source).map_err(|source| Error::Yaml {
                path: PathBuf::from("<config>"),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the prefix and directory name are usable as file names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.fragment_prefix.is_empty() {
            return Err(Error::Validation {
                field: "fragment_prefix".into(),
                message: "must not be empty".into(),
            });
        }
        if self.fragment_prefix.contains(['/', '\\']) {
            return Err(Error::Validation {
                field: "fragment_prefix".into(),
                message: format!("`{}` must not contain path separators", self.fragment_prefix),
            });
        }

        let mut components = Path::new(&self.fragment_dir).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single {
            return Err(Error::Validation {
                field: "fragment_dir".into(),
                message: format!("`{}` must be a single directory name", self.fragment_dir),
            });
        }
        Ok(())
    }

    /// The format of `file_name` if it names a fragment under this
    /// configuration.
    ///
    /// ```
    /// use strata::config::LoaderConfig;
    /// use strata::FragmentFormat;
    ///
    /// let config = LoaderConfig::default();
    /// assert_eq!(config.matches("strata_data_course.strata"), Some(FragmentFormat::Script));
    /// assert_eq!(config.matches("strata_data.yml"), Some(FragmentFormat::Yaml));
    /// assert_eq!(config.matches("notes.strata"), None);
    /// ```
    #[must_use]
    pub fn matches(&self, file_name: &str) -> Option<FragmentFormat> {
        if !file_name.starts_with(&self.fragment_prefix) {
            return None;
        }
        let (_, extension) = file_name.rsplit_once('.')?;
        if extension == SCRIPT_EXTENSION {
            Some(FragmentFormat::Script)
        } else if self.yaml_fragments && YAML_EXTENSIONS.contains(&extension) {
            Some(FragmentFormat::Yaml)
        } else {
            None
        }
    }
}
