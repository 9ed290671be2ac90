//! Parameter binding and native filter text for the in-memory executor.

use std::fmt;

use crate::error::{Result, SyncError};
use crate::statement::expr::Expr;
use crate::value::{Params, Value, DATE_TIME_FORMAT};

/// Replaces every `@name` in `expr` with the bound value.
///
/// Inside `IN (...)` a list-valued parameter expands to one literal per
/// element.
///
/// # Errors
/// `MissingParam` when a referenced parameter is not in `params`.
pub(crate) fn bind(expr: &Expr, params: &Params) -> Result<Expr> {
    let lookup = |name: &str| {
        params
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::MissingParam {
                name: name.to_string(),
            })
    };
    let bind_box = |inner: &Expr| bind(inner, params).map(Box::new);

    Ok(match expr {
        Expr::Param(name) => Expr::Literal(lookup(name)?),
        Expr::Column(_) | Expr::Literal(_) => expr.clone(),
        Expr::Binary { left, op, right } => Expr::Binary {
            left: bind_box(left)?,
            op: *op,
            right: bind_box(right)?,
        },
        Expr::Not(inner) => Expr::Not(bind_box(inner)?),
        Expr::Negate(inner) => Expr::Negate(bind_box(inner)?),
        Expr::Nested(inner) => Expr::Nested(bind_box(inner)?),
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: bind_box(expr)?,
            negated: *negated,
        },
        Expr::InList { expr, list, negated } => {
            let mut items = Vec::with_capacity(list.len());
            for item in list {
                match item {
                    Expr::Param(name) => match lookup(name)? {
                        Value::List(values) => items.extend(values.into_iter().map(Expr::Literal)),
                        value => items.push(Expr::Literal(value)),
                    },
                    other => items.push(bind(other, params)?),
                }
            }
            Expr::InList {
                expr: bind_box(expr)?,
                list: items,
                negated: *negated,
            }
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => Expr::Like {
            expr: bind_box(expr)?,
            pattern: bind_box(pattern)?,
            negated: *negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: bind_box(expr)?,
            low: bind_box(low)?,
            high: bind_box(high)?,
            negated: *negated,
        },
    })
}

/// Filter text in the in-memory engine's own dialect.
///
/// Dates render as `#...#`, text is single-quoted with `''` escaping and
/// inequality is `<>`. Used for trace output.
pub(crate) fn native_filter(expr: &Expr) -> String {
    let mut text = String::new();
    // Writing into a String cannot fail.
    let _ = expr.render(&mut text, &write_native_literal);
    text
}

fn write_native_literal(f: &mut dyn fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::DateTime(dt) => write!(f, "#{}#", dt.format(DATE_TIME_FORMAT)),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_native_literal(f, item)?;
            }
            Ok(())
        }
        other => crate::statement::expr::write_literal(f, other),
    }
}
