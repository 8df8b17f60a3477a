//! Builtin functions, reachable in call position when no field, parameter,
//! or context binding of the same name exists.

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::value::{Arguments, Value};

/// Calls the builtin `name`, or returns `None` if there is no such builtin.
pub(crate) fn call(name: &str, args: &Arguments) -> Option<Result<Value>> {
    let result = match name {
        "date" => date(args),
        "len" => len(args),
        "str" => positional(name, args, 1).map(|a| Value::Str(a[0].to_string())),
        "upper" => text(name, args).map(|s| Value::Str(s.to_uppercase())),
        "lower" => text(name, args).map(|s| Value::Str(s.to_lowercase())),
        "join" => join(args),
        "env" => text(name, args).map(|s| std::env::var(s).map_or(Value::Null, Value::Str)),
        _ => return None,
    };
    Some(result)
}

fn argument_error(function: &str, message: impl Into<String>) -> Error {
    Error::Argument {
        function: function.to_string(),
        message: message.into(),
    }
}

fn positional<'a>(name: &str, args: &'a Arguments, count: usize) -> Result<&'a [Value]> {
    if let Some((key, _)) = args.named_args().first() {
        return Err(argument_error(name, format!("unknown named argument `{key}`")));
    }
    let given = args.positional();
    if given.len() != count {
        return Err(argument_error(
            name,
            format!("expected {count} positional arguments, got {}", given.len()),
        ));
    }
    Ok(given)
}

fn text<'a>(name: &str, args: &'a Arguments) -> Result<&'a str> {
    let value = &positional(name, args, 1)?[0];
    value
        .as_str()
        .ok_or_else(|| {
            argument_error(name, format!("expected a string, got {}", value.type_name()))
        })
}

fn date(args: &Arguments) -> Result<Value> {
    let parsed = match args.positional() {
        [Value::Str(text)] => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|e| argument_error("date", format!("cannot parse `{text}`: {e}")))?,
        [Value::Int(y), Value::Int(m), Value::Int(d)] => {
            let year = i32::try_from(*y)
                .map_err(|_| argument_error("date", format!("year {y} out of range")))?;
            let month = u32::try_from(*m).ok();
            let day = u32::try_from(*d).ok();
            month
                .zip(day)
                .and_then(|(month, day)| NaiveDate::from_ymd_opt(year, month, day))
                .ok_or_else(|| argument_error("date", format!("{y}-{m}-{d} is not a valid date")))?
        }
        _ => {
            return Err(argument_error(
                "date",
                "expected (year, month, day) or a \"YYYY-MM-DD\" string",
            ))
        }
    };
    Ok(Value::Date(parsed))
}

fn len(args: &Arguments) -> Result<Value> {
    let value = &positional("len", args, 1)?[0];
    let count = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Mapping(map) => map.len(),
        Value::Node(node) => node.len(),
        other => {
            return Err(Error::Type {
                operation: "len".to_string(),
                details: format!("{} has no length", other.type_name()),
            })
        }
    };
    i64::try_from(count).map(Value::Int).map_err(|_| Error::Evaluation {
        message: "length out of range".to_string(),
    })
}

fn join(args: &Arguments) -> Result<Value> {
    let (items, separator) = match args.positional() {
        [Value::List(items)] => (items, String::new()),
        [Value::List(items), separator] => (items, separator.to_string()),
        _ => return Err(argument_error("join", "expected a list and an optional separator")),
    };
    let joined = items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::Str(joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, args: Arguments) -> Result<Value> {
        call(name, &args).expect("builtin exists")
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(call("nope", &Arguments::new()).is_none());
    }

    #[test]
    fn test_date_forms() {
        let expected = Value::Date(NaiveDate::from_ymd_opt(2020, 10, 22).unwrap());
        assert_eq!(run("date", Arguments::new().arg(2020).arg(10).arg(22)).unwrap(), expected);
        assert_eq!(run("date", Arguments::new().arg("2020-10-22")).unwrap(), expected);
        assert!(run("date", Arguments::new().arg(2020).arg(2).arg(30)).is_err());
        assert!(run("date", Arguments::new().arg("yesterday")).is_err());
    }

    #[test]
    fn test_len() {
        let list = Value::List(vec![Value::from(1), Value::from(2)]);
        assert_eq!(run("len", Arguments::new().arg(list)).unwrap(), Value::from(2));
        assert_eq!(run("len", Arguments::new().arg("héllo")).unwrap(), Value::from(5));
        assert!(run("len", Arguments::new().arg(3)).is_err());
    }

    #[test]
    fn test_text_builtins() {
        assert_eq!(run("upper", Arguments::new().arg("cis")).unwrap(), Value::from("CIS"));
        assert_eq!(run("lower", Arguments::new().arg("CIS")).unwrap(), Value::from("cis"));
        assert_eq!(run("str", Arguments::new().arg(2.0)).unwrap(), Value::from("2.0"));
        assert!(run("upper", Arguments::new().arg(1)).is_err());
    }

    #[test]
    fn test_join() {
        let list = Value::List(vec![Value::from("a"), Value::from(1)]);
        assert_eq!(run("join", Arguments::new().arg(list.clone())).unwrap(), Value::from("a1"));
        assert_eq!(run("join", Arguments::new().arg(list).arg(", ")).unwrap(), Value::from("a, 1"));
    }

    #[test]
    fn test_named_arguments_rejected() {
        let err = run("str", Arguments::new().arg(1).named("x", 2)).unwrap_err();
        assert!(format!("{err}").contains("`x`"));
    }

    #[test]
    fn test_env_missing_is_null() {
        let result = run("env", Arguments::new().arg("STRATA_TEST_SURELY_UNSET_VARIABLE")).unwrap();
        assert!(result.is_null());
    }
}
