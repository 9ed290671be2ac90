//! SELECT execution over a committed snapshot.

use std::cmp::Ordering;

use tracing::trace;

use crate::error::Result;
use crate::statement::expr::Expr;
use crate::statement::from_ref::JoinKind;
use crate::statement::SelectStatement;
use crate::value::{Params, Row, Value};

use super::eval::{eval, is_true};
use super::store::StoreSnapshot;
use super::translate::{bind, native_filter};

/// Runs `statement` against `store`.
///
/// Joins are nested loops in FromRef order; a LEFT JOIN without a match
/// keeps the tuple with a gap. Rows keep insertion order unless the
/// statement has an ORDER BY, which sorts stably.
///
/// # Errors
/// `MissingParam` for an unbound parameter, `TypeMismatch` for expressions
/// that cannot be evaluated.
pub(crate) fn select(store: &StoreSnapshot, statement: &SelectStatement, params: &Params) -> Result<Vec<Row>> {
    let from_refs = statement.from_refs();
    let conditions = from_refs
        .iter()
        .map(|r| r.join_condition.as_ref().map(|c| bind(c, params)).transpose())
        .collect::<Result<Vec<Option<Expr>>>>()?;
    let where_clause = statement
        .where_clause()
        .map(|w| bind(w, params))
        .transpose()?;
    let order_by = statement
        .order_by()
        .iter()
        .map(|item| Ok((bind(&item.expr, params)?, item.descending)))
        .collect::<Result<Vec<(Expr, bool)>>>()?;

    if tracing::enabled!(tracing::Level::TRACE) {
        trace!(
            table = %statement.anchor().table.name,
            version = store.version,
            filter = %where_clause.as_ref().map(native_filter).unwrap_or_default(),
            "scanning"
        );
    }

    let mut tuples: Vec<Vec<Option<&Row>>> = store
        .rows(&statement.anchor().table.name)
        .map(|row| vec![Some(row)])
        .collect();

    for (index, from_ref) in from_refs.iter().enumerate().skip(1) {
        let candidates: Vec<&Row> = store.rows(&from_ref.table.name).collect();
        let mut joined = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            let mut matched = false;
            for row in &candidates {
                let mut candidate = tuple.clone();
                candidate.push(Some(*row));
                let keep = match &conditions[index] {
                    Some(condition) => is_true(condition, &candidate)?,
                    None => true,
                };
                if keep {
                    joined.push(candidate);
                    matched = true;
                }
            }
            if !matched && from_ref.join_kind == JoinKind::Left {
                let mut gap = tuple;
                gap.push(None);
                joined.push(gap);
            }
        }
        tuples = joined;
    }

    if let Some(condition) = &where_clause {
        let mut kept = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            if is_true(condition, &tuple)? {
                kept.push(tuple);
            }
        }
        tuples = kept;
    }

    if !order_by.is_empty() {
        let mut keyed = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            let keys = order_by
                .iter()
                .map(|(expr, _)| eval(expr, &tuple))
                .collect::<Result<Vec<Value>>>()?;
            keyed.push((keys, tuple));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, (_, descending)) in order_by.iter().enumerate() {
                let ordering = a[i].cmp(&b[i]);
                if ordering != Ordering::Equal {
                    return if *descending { ordering.reverse() } else { ordering };
                }
            }
            Ordering::Equal
        });
        tuples = keyed.into_iter().map(|(_, tuple)| tuple).collect();
    }

    Ok(tuples
        .iter()
        .map(|tuple| {
            statement
                .columns()
                .iter()
                .map(|column| {
                    let value = tuple
                        .get(column.from_ref)
                        .copied()
                        .flatten()
                        .and_then(|row| row.get(&column.field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    (column.name.clone(), value)
                })
                .collect()
        })
        .collect())
}
