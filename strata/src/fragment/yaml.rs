//! YAML fragments.
//!
//! Plain YAML data, plus two tags: `!fn` turns a string into a function
//! (either a full `fn(...) => ...` lambda or a bare expression taking no
//! parameters) and `!date` turns a `YYYY-MM-DD` string into a date.

use std::path::Path;
use std::rc::Rc;

use chrono::NaiveDate;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value as Yaml;

use super::ast::{Expr, Lambda};
use super::eval::{Env, Function};
use super::{parser, syntax_error};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::tree::WeakNode;
use crate::value::{Mapping, Value};

/// Evaluates the YAML document in `source`. An empty document is null.
pub(crate) fn evaluate(source: &str, path: &Path, context: &Context) -> Result<Value> {
    let has_content = source
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#') && line != "---");
    if !has_content {
        return Ok(Value::Null);
    }
    let document: Yaml = serde_yaml::from_str(source).map_err(|source| Error::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    convert(document, path, context)
}

fn convert(yaml: Yaml, path: &Path, context: &Context) -> Result<Value> {
    let value = match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Yaml::String(s) => Value::Str(s),
        Yaml::Sequence(items) => Value::List(
            items
                .into_iter()
                .map(|item| convert(item, path, context))
                .collect::<Result<_>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut map = Mapping::new();
            for (key, value) in entries {
                map.insert(key_string(key, path)?, convert(value, path, context)?);
            }
            Value::Mapping(map)
        }
        Yaml::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            let Yaml::String(text) = value else {
                return Err(invalid(path, format!("`{tag}` must tag a string")));
            };
            if tag == "fn" {
                function(&text, path, context)?
            } else if tag == "date" {
                let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map_err(|e| invalid(path, format!("`!date {text}`: {e}")))?;
                Value::Date(date)
            } else {
                return Err(invalid(path, format!("unsupported tag `{tag}`")));
            }
        }
    };
    Ok(value)
}

fn invalid(path: &Path, message: String) -> Error {
    Error::Validation {
        field: path.display().to_string(),
        message,
    }
}

fn key_string(key: Yaml, path: &Path) -> Result<String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(invalid(path, format!("unsupported mapping key {other:?}"))),
    }
}

fn function(source: &str, path: &Path, context: &Context) -> Result<Value> {
    let lambda = match parser::parse_expression(source).map_err(|e| syntax_error(path, e))? {
        Expr::Lambda(lambda) => lambda,
        body => Rc::new(Lambda::thunk(body)),
    };
    let function = Function::new(lambda, Env::default(), context.downgrade(), WeakNode::default());
    Ok(Value::Function(Rc::new(function)))
}
