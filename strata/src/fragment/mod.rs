//! The fragment language.
//!
//! Fragments are small programs whose final expression is the data they
//! contribute. Mapping entries whose value is a lambda become computed
//! fields once the merged data is wrapped in a [`Node`](crate::Node).
//!
//! ```text
//! # strata_data_course.strata
//! let term = "Fall 2020";
//!
//! {
//!   course: { number: "CIS 162", title: fn() => "${number} (${term})" },
//!   add: fn(a, b = 7, scale: 1) => (a + b) * scale,
//! }
//! ```
//!
//! YAML fragments are also accepted; see the `yaml` submodule for the tags
//! it understands.

mod ast;
mod builtins;
mod eval;
mod lexer;
mod ops;
mod parser;
mod yaml;

use std::path::Path;
use std::rc::Rc;

pub use eval::{Function, MAX_CALL_DEPTH};
pub(crate) use eval::invoke;

use crate::context::Context;
use crate::diagnostics::DiagnosticSink;
use crate::error::{Error, Result};
use crate::tree::Node;
use crate::value::Value;
use eval::Scope;
use parser::SyntaxError;

/// How a fragment file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFormat {
    /// The fragment language.
    Script,
    /// Plain YAML with `!fn` and `!date` tags.
    Yaml,
}

impl FragmentFormat {
    /// Picks the format from a file extension; anything not YAML is a script.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Script,
        }
    }
}

pub(crate) fn syntax_error(path: &Path, error: SyntaxError) -> Error {
    Error::Syntax {
        path: path.to_path_buf(),
        line: error.line,
        column: error.column,
        message: error.message,
    }
}

/// Evaluates fragment `source` read from `path`, returning its result.
///
/// Top-level `let` bindings are written into `context`.
pub(crate) fn evaluate(
    source: &str,
    path: &Path,
    format: FragmentFormat,
    context: &Context,
    sink: Rc<dyn DiagnosticSink>,
) -> Result<Value> {
    match format {
        FragmentFormat::Yaml => yaml::evaluate(source, path, context),
        FragmentFormat::Script => {
            let fragment = parser::parse_fragment(source).map_err(|e| syntax_error(path, e))?;
            eval::run(&fragment, &Scope::top_level(context, sink))
        }
    }
}

/// Evaluates a single expression with `node` as the defining node.
pub(crate) fn evaluate_in(
    node: &Node,
    source: &str,
    sink: Rc<dyn DiagnosticSink>,
) -> Result<Value> {
    let expr = parser::parse_expression(source)
        .map_err(|e| syntax_error(Path::new("<expression>"), e))?;
    eval::eval(&expr, &Scope::for_node(node, sink))
}
