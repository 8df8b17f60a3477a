#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # strata
//!
//! Hierarchical, layered configuration data for directory trees.
//!
//! Data files ("fragments") placed at any level of a directory hierarchy are
//! deep-merged from the top down, so a more specific directory overrides
//! what its ancestors say. The merged result is exposed as a read-only tree
//! of [`Node`]s whose fields may be computed: a fragment can store a lambda
//! that is evaluated on access, with the enclosing node's siblings, the tree
//! root and a shared [`Context`] in scope.
//!
//! ## Core Types
//!
//! - [`Loader`]: discovers and merges fragments, builds the tree
//! - [`Node`]: a read-only view of one mapping in the tree
//! - [`Value`], [`Mapping`] and [`Arguments`]: the data model
//! - [`Context`]: a mutable scope shared by fragments and computed fields
//! - [`Error`] and [`Result`]: error handling types
//! - [`DiagnosticSink`] and [`Logger`]: warning delivery
//!
//! ## Examples
//!
//! ```
//! use strata::{mapping, Arguments, Context, Node, Value};
//!
//! let context = Context::new();
//! context.set("term", "Fall 2020");
//!
//! let root = Node::build(
//!     mapping! { "course" => mapping! { "number" => "CIS 162" } },
//!     Some(context),
//!     std::rc::Rc::new(strata::CollectingSink::new()),
//! )
//! .unwrap();
//!
//! assert_eq!(root.lookup("course.number").unwrap(), Value::from("CIS 162"));
//! assert_eq!(
//!     root.evaluate("course.number + ' ' + term").unwrap(),
//!     Value::from("CIS 162 Fall 2020")
//! );
//! assert!(root.call("missing", &Arguments::new()).unwrap_err().is_no_key());
//! ```

pub mod config;
mod context;
mod diagnostics;
pub mod error;
mod fragment;
mod loader;
mod merge;
pub mod path;
mod tree;
mod value;

// Re-export key types at crate root for convenience
pub use config::{EnvironmentConfig, LoaderConfig};
pub use context::{Context, WeakContext};
pub use diagnostics::{CollectingSink, DiagnosticSink, LogLevel, Logger};
pub use error::{Error, Result};
pub use fragment::{FragmentFormat, Function, MAX_CALL_DEPTH};
pub use loader::{load, load_directory, load_fragment, load_fragment_source, Loader};
pub use merge::{merge, merge_all, merge_into};
pub use tree::{Node, RESERVED_KEYS};
pub use value::{Arguments, Mapping, Value};
