//! Row-level expression evaluation with three-valued logic.

use std::cmp::Ordering;

use crate::error::{Result, SyncError};
use crate::statement::expr::{BinaryOp, Expr};
use crate::value::{Row, Value};

/// One candidate tuple: a row per FromRef, `None` for an unmatched LEFT JOIN.
pub(crate) type Tuple<'r> = [Option<&'r Row>];

/// Evaluates a bound expression against `tuple`.
///
/// Parameters must have been replaced with literals beforehand; a leftover
/// `@name` is reported as a missing parameter.
pub(crate) fn eval(expr: &Expr, tuple: &Tuple<'_>) -> Result<Value> {
    match expr {
        Expr::Column(column) => Ok(column_value(tuple, column.source, &column.name)),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Param(name) => Err(SyncError::MissingParam { name: name.clone() }),
        Expr::Nested(inner) => eval(inner, tuple),
        Expr::Binary { left, op, right } => match op {
            BinaryOp::And => {
                let left = truth(&eval(left, tuple)?)?;
                if left == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let right = truth(&eval(right, tuple)?)?;
                Ok(from_truth(match (left, right) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }))
            }
            BinaryOp::Or => {
                let left = truth(&eval(left, tuple)?)?;
                if left == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let right = truth(&eval(right, tuple)?)?;
                Ok(from_truth(match (left, right) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }))
            }
            op if op.is_comparison() => {
                let left = eval(left, tuple)?;
                let right = eval(right, tuple)?;
                Ok(from_truth(compare(&left, &right).map(|ordering| match op {
                    BinaryOp::Eq => ordering == Ordering::Equal,
                    BinaryOp::NotEq => ordering != Ordering::Equal,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                })))
            }
            op => arithmetic(*op, &eval(left, tuple)?, &eval(right, tuple)?),
        },
        Expr::Not(inner) => Ok(from_truth(truth(&eval(inner, tuple)?)?.map(|b| !b))),
        Expr::Negate(inner) => match eval(inner, tuple)? {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(mismatch("number", &other)),
        },
        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, tuple)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        Expr::InList { expr, list, negated } => {
            let needle = eval(expr, tuple)?;
            if needle.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            let mut found = false;
            for item in list {
                for candidate in flatten(eval(item, tuple)?) {
                    match compare(&needle, &candidate) {
                        Some(Ordering::Equal) => found = true,
                        None => saw_null = true,
                        _ => {}
                    }
                }
                if found {
                    break;
                }
            }
            let result = if found {
                Some(true)
            } else if saw_null {
                None
            } else {
                Some(false)
            };
            Ok(from_truth(result.map(|b| b != *negated)))
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let value = eval(expr, tuple)?;
            let pattern = eval(pattern, tuple)?;
            if value.is_null() || pattern.is_null() {
                return Ok(Value::Null);
            }
            let matched = like(&value.to_string(), &pattern.to_string());
            Ok(Value::Bool(matched != *negated))
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let value = eval(expr, tuple)?;
            let low = compare(&value, &eval(low, tuple)?);
            let high = compare(&value, &eval(high, tuple)?);
            let inside = match (low, high) {
                (Some(low), Some(high)) => Some(low != Ordering::Less && high != Ordering::Greater),
                (Some(Ordering::Less), None) | (None, Some(Ordering::Greater)) => Some(false),
                _ => None,
            };
            Ok(from_truth(inside.map(|b| b != *negated)))
        }
    }
}

/// `true` only when the expression evaluates to TRUE; NULL counts as false.
pub(crate) fn is_true(expr: &Expr, tuple: &Tuple<'_>) -> Result<bool> {
    Ok(truth(&eval(expr, tuple)?)? == Some(true))
}

fn column_value(tuple: &Tuple<'_>, source: Option<usize>, name: &str) -> Value {
    let found = match source {
        Some(index) => tuple
            .get(index)
            .copied()
            .flatten()
            .and_then(|row| row.get(name)),
        None => tuple.iter().flatten().find_map(|row| row.get(name)),
    };
    found.cloned().unwrap_or(Value::Null)
}

fn truth(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Int(i) => Ok(Some(*i != 0)),
        other => Err(mismatch("boolean", other)),
    }
}

fn from_truth(truth: Option<bool>) -> Value {
    truth.map(Value::Bool).unwrap_or(Value::Null)
}

fn flatten(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) => items,
        other => vec![other],
    }
}

fn mismatch(expected: &str, got: &Value) -> SyncError {
    SyncError::TypeMismatch {
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

/// SQL comparison: `None` when either side is NULL.
///
/// Text is coerced towards the other side's type, so `'2024-01-01'`
/// compares as a date against a date field and `'7'` as a number against
/// a numeric field.
pub(crate) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Text(text), other @ (Value::Int(_) | Value::Float(_)))
        | (other @ (Value::Int(_) | Value::Float(_)), Value::Text(text))
            if text.trim().parse::<f64>().is_ok() =>
        {
            let parsed = Value::Float(text.trim().parse::<f64>().ok()?);
            Some(if matches!(left, Value::Text(_)) {
                parsed.cmp(other)
            } else {
                other.cmp(&parsed)
            })
        }
        (Value::Text(text), Value::DateTime(dt)) => {
            Value::parse_date_time(text).map(|parsed| parsed.cmp(dt))
        }
        (Value::DateTime(dt), Value::Text(text)) => {
            Value::parse_date_time(text).map(|parsed| dt.cmp(&parsed))
        }
        (Value::Bool(b), Value::Int(i)) => Some(b.cmp(&(*i != 0))),
        (Value::Int(i), Value::Bool(b)) => Some((*i != 0).cmp(b)),
        _ => Some(left.cmp(right)),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if op == BinaryOp::Add {
        if let (Value::Text(a), Value::Text(b)) = (left, right) {
            return Ok(Value::Text(format!("{}{}", a, b)));
        }
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                _ if *b == 0 => return Ok(Value::Null),
                _ => a.checked_div(*b),
            };
            result.map(Value::Int).ok_or_else(|| SyncError::TypeMismatch {
                expected: "integer in range".to_string(),
                got: format!("{} {} {}", a, op.symbol(), b),
            })
        }
        _ => {
            let a = left.as_f64().ok_or_else(|| mismatch("number", left))?;
            let b = right.as_f64().ok_or_else(|| mismatch("number", right))?;
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ if b == 0.0 => return Ok(Value::Null),
                _ => a / b,
            }))
        }
    }
}

/// `%` matches any run, `_` one character. Case-sensitive.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
