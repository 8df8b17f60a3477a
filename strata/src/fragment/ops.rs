//! Operator semantics for evaluated values.

use chrono::Duration;

use super::ast::{BinaryOp, UnaryOp};
use crate::error::{Error, Result};
use crate::value::Value;

fn type_error(op: &str, details: String) -> Error {
    Error::Type {
        operation: format!("`{op}`"),
        details,
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> Error {
    type_error(
        op.symbol(),
        format!("unsupported operands {} and {}", left.type_name(), right.type_name()),
    )
}

fn overflow(op: BinaryOp) -> Error {
    Error::Evaluation {
        message: format!("integer overflow in `{}`", op.symbol()),
    }
}

fn division_by_zero(op: BinaryOp) -> Error {
    Error::Evaluation {
        message: format!("division by zero in `{}`", op.symbol()),
    }
}

pub(crate) fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => {
            i.checked_neg()
                .map(Value::Int)
                .ok_or_else(|| Error::Evaluation {
                    message: "integer overflow in negation".to_string(),
                })
        }
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, other) => Err(type_error(
            "-",
            format!("cannot negate {}", other.type_name()),
        )),
    }
}

/// Applies a non-short-circuiting binary operator.
pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, left, right),
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => subtract(left, right),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, left, right),
        // Short-circuit operators are handled by the evaluator.
        BinaryOp::And => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        BinaryOp::Or => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                type_error(op.symbol(), "cannot order NaN".to_string())
            })?,
            _ => return Err(mismatch(op, left, right)),
        },
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    };
    Ok(Value::Bool(result))
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| overflow(BinaryOp::Add)),
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{left}{right}"))),
        (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
        (Value::Date(date), Value::Int(days)) | (Value::Int(days), Value::Date(date)) => {
            shift_date(*date, *days, BinaryOp::Add)
        }
        _ => float_op(BinaryOp::Add, left, right, |a, b| a + b),
    }
}

fn subtract(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_sub(*b)
            .map(Value::Int)
            .ok_or_else(|| overflow(BinaryOp::Sub)),
        (Value::Date(a), Value::Date(b)) => Ok(Value::Int((*a - *b).num_days())),
        (Value::Date(date), Value::Int(days)) => {
            let days = days.checked_neg().ok_or_else(|| overflow(BinaryOp::Sub))?;
            shift_date(*date, days, BinaryOp::Sub)
        }
        _ => float_op(BinaryOp::Sub, left, right, |a, b| a - b),
    }
}

fn shift_date(date: chrono::NaiveDate, days: i64, op: BinaryOp) -> Result<Value> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .map(Value::Date)
        .ok_or_else(|| Error::Evaluation {
            message: format!("date out of range in `{}`", op.symbol()),
        })
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if *b == 0 && op != BinaryOp::Mul {
            return Err(division_by_zero(op));
        }
        let result = match op {
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Div => a.checked_div(*b),
            _ => a.checked_rem(*b),
        };
        return result.map(Value::Int).ok_or_else(|| overflow(op));
    }
    if op != BinaryOp::Mul && right.as_float() == Some(0.0) {
        return Err(division_by_zero(op));
    }
    match op {
        BinaryOp::Mul => float_op(op, left, right, |a, b| a * b),
        BinaryOp::Div => float_op(op, left, right, |a, b| a / b),
        _ => float_op(op, left, right, |a, b| a % b),
    }
}

fn float_op(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
        _ => Err(mismatch(op, left, right)),
    }
}

/// `target[index]` for lists, strings and mappings. Out-of-range positions yield null.
pub(crate) fn index(target: &Value, index: &Value) -> Result<Value> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => Ok(position(items.len(), *i)
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(position(chars.len(), *i)
                .and_then(|i| chars.get(i))
                .map_or(Value::Null, |c| Value::Str(c.to_string())))
        }
        (Value::Mapping(map), Value::Str(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        (Value::Node(node), Value::Str(key)) => node.get(key),
        _ => Err(type_error(
            "[]",
            format!("cannot index {} with {}", target.type_name(), index.type_name()),
        )),
    }
}

// Negative positions count from the end.
fn position(len: usize, i: i64) -> Option<usize> {
    if i >= 0 {
        usize::try_from(i).ok()
    } else {
        let back = usize::try_from(i.checked_neg()?).ok()?;
        len.checked_sub(back)
    }
}
