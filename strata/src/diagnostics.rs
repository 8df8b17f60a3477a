//! Warnings and logging.
//!
//! Non-fatal authoring mistakes (arguments passed to a plain field, a
//! parameter named `root`) are reported through a [`DiagnosticSink`]. The
//! sink is injected per tree so tests can capture what would otherwise go to
//! stderr. Library tracing uses the `log` facade.

use std::cell::RefCell;
use std::fmt;

/// Receiver for non-fatal warnings raised while evaluating a tree.
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink {
    /// Report a warning. Must not fail.
    fn warn(&self, message: &str);
}

/// Logging level for controlling output verbosity.
///
/// Log levels are ordered from least verbose (Quiet) to most verbose (Verbose).
///
/// # Examples
///
/// ```
/// use strata::LogLevel;
///
/// assert!(LogLevel::Quiet < LogLevel::Normal);
/// assert!(LogLevel::Normal < LogLevel::Verbose);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Suppress all non-essential output, warnings included.
    Quiet,
    /// Errors and warnings.
    Normal,
    /// Errors, warnings, info, and debug messages.
    Verbose,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiet => write!(f, "quiet"),
            Self::Normal => write!(f, "normal"),
            Self::Verbose => write!(f, "verbose"),
        }
    }
}

/// A stderr sink filtered by [`LogLevel`].
///
/// This is the default sink for trees built by the loader.
///
/// # Examples
///
/// ```
/// use strata::{Logger, LogLevel};
///
/// let logger = Logger::new(LogLevel::Normal);
/// assert_eq!(logger.level(), LogLevel::Normal);
/// logger.warn("field `a` is not a function and ignores arguments");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    level: LogLevel,
}

impl Logger {
    /// Creates a new logger with the specified log level.
    #[must_use]
    pub const fn new(level: LogLevel) -> Self {
        Self { level }
    }

    /// Returns the current log level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Logs a warning message at Normal and Verbose levels.
    pub fn warn(&self, message: &str) {
        if self.level >= LogLevel::Normal {
            eprintln!("WARN: {message}");
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Normal)
    }
}

impl DiagnosticSink for Logger {
    fn warn(&self, message: &str) {
        log::debug!("diagnostic: {message}");
        Logger::warn(self, message);
    }
}

/// A sink that records every warning in memory.
///
/// # Examples
///
/// ```
/// use strata::{CollectingSink, DiagnosticSink};
///
/// let sink = CollectingSink::new();
/// sink.warn("first");
/// sink.warn("second");
/// assert_eq!(sink.messages(), vec!["first".to_string(), "second".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: RefCell<Vec<String>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of all recorded messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// Removes and returns all recorded messages.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }
}

impl DiagnosticSink for CollectingSink {
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
