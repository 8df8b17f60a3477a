//! Error types for the strata library.
//!
//! Failures fall into three groups:
//!
//! - construction-time: a reserved name used as a field key ([`Error::InvalidKey`]);
//! - load-time: unreadable or malformed fragments ([`Error::Io`], [`Error::Loading`],
//!   [`Error::Syntax`], [`Error::Yaml`]);
//! - access-time: unknown fields and evaluation problems ([`Error::NoKey`] and friends).
//!
//! Access-time errors are ordinary values. Callers decide whether they abort a
//! render or are counted and skipped.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for operations that may fail with a strata error.
///
/// # Examples
///
/// ```
/// use strata::{Error, Result};
///
/// fn example_operation() -> Result<i64> {
///     Ok(42)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the strata library.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred while reading a fragment or directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path does not exist.
    #[error("path not found: {}", path.display())]
    PathNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied accessing a path.
    #[error("permission denied: {}", path.display())]
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// An invalid filesystem path was provided.
    #[error("invalid path {}: {reason}", path.display())]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
        /// The reason the path is invalid.
        reason: String,
    },

    /// A fragment evaluated to something other than a mapping.
    #[error("data file {} did not return a mapping; it returned {found}", path.display())]
    Loading {
        /// The offending fragment.
        path: PathBuf,
        /// Description of what the fragment produced instead.
        found: String,
    },

    /// A fragment could not be parsed.
    #[error("syntax error in {} at {line}:{column}: {message}", path.display())]
    Syntax {
        /// The fragment being parsed.
        path: PathBuf,
        /// 1-based line of the error.
        line: usize,
        /// 1-based column of the error.
        column: usize,
        /// What the parser expected or found.
        message: String,
    },

    /// A YAML fragment or configuration file could not be parsed.
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        /// The file being parsed.
        path: PathBuf,
        /// The underlying parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A reserved name was used as a field key.
    #[error("invalid key: `{key}` may not be used as a key (in {location})")]
    InvalidKey {
        /// The reserved key.
        key: String,
        /// Fragment file or node where the key appeared.
        location: String,
    },

    /// A field was requested that does not exist.
    #[error("unrecognized key: {name}")]
    NoKey {
        /// Fully qualified name of the missing field.
        name: String,
    },

    /// A name inside a helper function resolved to nothing.
    #[error("undefined variable `{name}`")]
    UndefinedVariable {
        /// The unresolved name.
        name: String,
    },

    /// Arguments did not match a function's parameters.
    #[error("bad arguments for `{function}`: {message}")]
    Argument {
        /// The function being invoked.
        function: String,
        /// What went wrong while binding.
        message: String,
    },

    /// An operation was applied to values of the wrong type.
    #[error("type error in {operation}: {details}")]
    Type {
        /// The operation that failed.
        operation: String,
        /// The types involved.
        details: String,
    },

    /// Evaluation failed for a reason other than typing or lookup.
    #[error("evaluation error: {message}")]
    Evaluation {
        /// Description of the failure.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// A description of the validation failure.
        message: String,
    },
}

impl Error {
    /// Check if error is an unknown-field lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::Error;
    ///
    /// let err = Error::NoKey { name: "a.b.c".to_string() };
    /// assert!(err.is_no_key());
    /// ```
    #[must_use]
    pub fn is_no_key(&self) -> bool {
        matches!(self, Self::NoKey { .. })
    }

    /// The qualified field name carried by a [`Error::NoKey`].
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::Error;
    ///
    /// let err = Error::NoKey { name: "nest1.address.zip".to_string() };
    /// assert_eq!(err.key_name(), Some("nest1.address.zip"));
    /// ```
    #[must_use]
    pub fn key_name(&self) -> Option<&str> {
        match self {
            Self::NoKey { name } => Some(name),
            _ => None,
        }
    }

    /// Check if error indicates a path or file does not exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::Error;
    /// use std::path::PathBuf;
    ///
    /// let err = Error::PathNotFound { path: PathBuf::from("/nonexistent") };
    /// assert!(err.is_not_found());
    /// ```
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::PathNotFound { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
